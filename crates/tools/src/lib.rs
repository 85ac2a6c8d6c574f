//! Built-in tool implementations for cogloop.
//!
//! - `say`: speak to connected users
//! - `request_user_input`: ask a question and wait for the answer
//! - `shell`: run a command in the agent's environment

pub mod request_input;
pub mod say;
pub mod shell;

use std::time::Duration;

use cogloop_core::context::RuntimeContext;
use cogloop_core::tool::ToolRegistry;

pub use request_input::RequestUserInputTool;
pub use say::SayTool;
pub use shell::{ShellOptions, ShellTool, run_shell};

/// The registry the cognitive loop runs with.
pub fn default_registry(
    ctx: &RuntimeContext,
    shell: ShellOptions,
    input_timeout: Duration,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SayTool::new(ctx.bus.clone())));
    registry.register(Box::new(RequestUserInputTool::new(
        ctx.correlator.clone(),
        input_timeout,
    )));
    registry.register(Box::new(ShellTool::new(shell)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use cogloop_core::context::QueueDepths;

    #[test]
    fn default_registry_has_all_tools() {
        let ctx = RuntimeContext::new(QueueDepths::default(), "m");
        let registry = default_registry(&ctx, ShellOptions::default(), Duration::from_secs(300));
        assert_eq!(registry.names(), vec!["request_user_input", "say", "shell"]);
    }
}
