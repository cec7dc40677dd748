//! `crabot config` — Configuration management commands.

use crabot_config::AppConfig;

use super::load_config;

pub async fn validate() -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match AppConfig::load() {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let warnings = warnings(&config);
            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Provider:  {}", config.default_provider);
            println!("   Model:     {}", crabot_providers::model_for(&config));
            println!("   Report:    {}", crabot_providers::report_model_for(&config));
            println!("   Window:    {} turns", config.history_window);
            println!("   Knowledge: {}", config.knowledge.path.display());
            println!("   Exports:   {}", config.export.dir.display());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

/// Settings that load fine but will cause trouble.
fn warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();

    if !config.has_api_key()
        && !config
            .providers
            .get(&config.default_provider)
            .is_some_and(|p| p.api_key.is_some())
        && config.default_provider != "ollama"
    {
        warnings.push("No API key set (set CRABOT_API_KEY or OPENAI_API_KEY env var)");
    }

    if config.knowledge.report_prefix_chars == 0 {
        warnings.push("knowledge.report_prefix_chars is 0; reports will get no reference text");
    }

    if config.report.min_turns == 0 {
        warnings.push("report.min_turns is 0; reports will be offered before any conversation");
    }

    warnings
}

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let toml_str = toml::to_string_pretty(&config.redacted())?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
