//! `cogloop serve` — run the cognitive loop and the gateway together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cogloop_agent::{
    CognitiveLoopDriver, LoopSettings, ToolCallingDecider, initial_history, load_system_prompt,
};
use cogloop_config::AppConfig;
use cogloop_core::{Provider, RuntimeContext};
use cogloop_providers::{OpenAiCompatProvider, resolve_context_window};
use cogloop_tools::{ShellOptions, default_registry};
use tracing::{info, warn};

/// How long shutdown waits for the loop thread before exiting anyway.
const WORKER_JOIN_GRACE: Duration = Duration::from_secs(5);

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("cogloop");
    println!("   Model:     {}", config.provider.model);
    println!("   Endpoint:  {}", config.provider.base_url);
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);

    let ctx = RuntimeContext::new(config.queues.depths(), config.provider.model.clone());
    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::from_config(&config.provider));
    resolve_context_window(provider.as_ref(), &ctx.control).await;

    let tools = Arc::new(default_registry(
        &ctx,
        ShellOptions::from(&config.shell),
        Duration::from_secs(config.agent_loop.input_timeout_secs),
    ));
    let decider = Arc::new(
        ToolCallingDecider::new(provider, tools, ctx.bus.clone(), config.provider.model.clone())
            .with_max_iterations(config.agent_loop.max_iterations)
            .with_temperature(config.provider.temperature)
            .with_max_tokens(config.provider.max_tokens),
    );

    let system_prompt = load_system_prompt(&config.system_prompt_path);
    let driver = CognitiveLoopDriver::new(
        ctx.clone(),
        decider,
        LoopSettings::from(&config.agent_loop),
        initial_history(system_prompt),
    )?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let worker = driver.spawn(shutdown.clone())?;

    let signal = {
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Interrupted, shutting down");
            shutdown.store(true, Ordering::Relaxed);
        }
    };

    let served = cogloop_gateway::start(&config, ctx, signal).await;
    shutdown.store(true, Ordering::Relaxed);

    let joined = tokio::time::timeout(
        WORKER_JOIN_GRACE,
        tokio::task::spawn_blocking(move || worker.join()),
    )
    .await;
    match joined {
        Ok(Ok(Ok(history))) => info!(turns = history.len(), "Cognitive loop joined"),
        Ok(_) => warn!("Cognitive loop thread panicked"),
        Err(_) => warn!("Cognitive loop still busy, exiting without it"),
    }

    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
