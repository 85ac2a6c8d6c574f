//! `cogloop config` — validate and print the effective configuration.

use cogloop_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    };

    println!("   ✅ Config parsed successfully");
    for w in warnings(&config) {
        println!("   ⚠️  {w}");
    }
    println!();
    println!("{}", render_redacted(&config));
    Ok(())
}

fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.system_prompt_path.exists() {
        warnings.push(format!(
            "System prompt {} not found, the fallback prompt will be used",
            config.system_prompt_path.display()
        ));
    }
    if config.shell.working_dir.as_ref().is_some_and(|d| !d.is_dir()) {
        warnings.push("shell.working_dir does not exist".into());
    }
    warnings
}

/// TOML rendering with the API key masked.
fn render_redacted(config: &AppConfig) -> String {
    let mut shown = config.clone();
    if shown.provider.bearer_token().is_some() {
        shown.provider.api_key = "[REDACTED]".into();
    }
    shown.to_toml()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendering_masks_api_key() {
        let mut config = AppConfig::default();
        config.provider.api_key = "sk-secret".into();
        let rendered = render_redacted(&config);
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn placeholder_key_is_shown() {
        let rendered = render_redacted(&AppConfig::default());
        assert!(rendered.contains("not-needed"));
    }

    #[test]
    fn missing_prompt_is_warned() {
        let mut config = AppConfig::default();
        config.system_prompt_path = "/nonexistent/prompt.md".into();
        assert_eq!(warnings(&config).len(), 1);
    }
}
