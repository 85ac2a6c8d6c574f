//! Fixed turns the loop injects: system prompt, bootstrap and heartbeat.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use cogloop_core::message::{ConversationHistory, Message};
use tracing::{info, warn};

/// Used when the system prompt file cannot be read.
pub const FALLBACK_SYSTEM_PROMPT: &str = "You are an AI assistant.";

/// First user turn of every fresh history.
pub const BOOTSTRAP_PROMPT: &str = "You have just been initialized. Take a moment to:
1. Read your system prompt to understand your purpose
2. Check if you have any stored memories
3. Prepare to receive user input

Begin by reflecting on who you are and what you're meant to do.";

/// Read the system prompt, falling back to a one-line default.
pub fn load_system_prompt(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(prompt) => {
            info!(path = %path.display(), chars = prompt.len(), "System prompt loaded");
            prompt
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read system prompt, using fallback");
            FALLBACK_SYSTEM_PROMPT.to_string()
        }
    }
}

/// The synthetic turn appended when the loop wakes itself up.
pub fn heartbeat_prompt(now: DateTime<Utc>) -> String {
    format!(
        "[HEARTBEAT {}] No new user input. You may continue any ongoing tasks, reflect, or wait for input.",
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// System turn plus the bootstrap turn.
pub fn initial_history(system_prompt: impl Into<String>) -> ConversationHistory {
    let mut history = ConversationHistory::new(system_prompt);
    history.push(Message::user(BOOTSTRAP_PROMPT));
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cogloop_core::message::Role;

    #[test]
    fn missing_file_uses_fallback() {
        let prompt = load_system_prompt(Path::new("/nonexistent/SYSTEM_PROMPT.md"));
        assert_eq!(prompt, FALLBACK_SYSTEM_PROMPT);
    }

    #[test]
    fn prompt_file_is_read_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("SYSTEM_PROMPT.md");
        std::fs::write(&path, "You watch the build.\n").unwrap();
        assert_eq!(load_system_prompt(&path), "You watch the build.\n");
    }

    #[test]
    fn heartbeat_carries_timestamp() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            heartbeat_prompt(now),
            "[HEARTBEAT 2026-03-01T12:00:00Z] No new user input. You may continue any ongoing tasks, reflect, or wait for input."
        );
    }

    #[test]
    fn initial_history_is_system_then_bootstrap() {
        let history = initial_history("sys");
        assert_eq!(history.len(), 2);
        assert_eq!(history.system().content, "sys");
        assert_eq!(history.last().role, Role::User);
        assert!(history.last().content.starts_with("You have just been initialized."));
    }
}
