//! `cogloop doctor` — diagnose configuration, prompt and model endpoint.

use cogloop_config::AppConfig;
use cogloop_core::Provider;
use cogloop_providers::OpenAiCompatProvider;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("cogloop doctor");
    println!("==============\n");

    let mut issues = 0;

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            return Ok(());
        }
    };

    if config.system_prompt_path.is_file() {
        println!(
            "  ✅ System prompt found at {}",
            config.system_prompt_path.display()
        );
    } else {
        println!(
            "  ⚠️  No system prompt at {} (fallback prompt will be used)",
            config.system_prompt_path.display()
        );
        issues += 1;
    }

    let provider = OpenAiCompatProvider::from_config(&config.provider);
    match provider.list_models().await {
        Ok(models) => {
            println!(
                "  ✅ Endpoint {} reachable ({} models)",
                provider.base_url(),
                models.len()
            );
            if !models.iter().any(|m| m == &config.provider.model) {
                println!("  ⚠️  Model {} not listed by the endpoint", config.provider.model);
                issues += 1;
            }
        }
        Err(e) => {
            println!("  ❌ Endpoint {} unreachable: {e}", provider.base_url());
            issues += 1;
        }
    }

    match provider.context_window(&config.provider.model).await {
        Ok(Some(tokens)) => println!("  ✅ Context window: {tokens} tokens"),
        Ok(None) | Err(_) => println!("  ⚠️  Context window unknown, default will be used"),
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
