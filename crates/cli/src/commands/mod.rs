pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod onboard;
pub mod prompt;

use crabot_config::AppConfig;

/// Printed whenever a model call is attempted without an API key.
pub fn print_missing_key_help() {
    eprintln!();
    eprintln!("  ERROR: No API key configured!");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export CRABOT_API_KEY='sk-...'");
    eprintln!("    export OPENAI_API_KEY='sk-...'");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
    eprintln!("  Get an OpenAI key at: https://platform.openai.com/api-keys");
    eprintln!();
}

/// Load configuration, turning failures into a readable message.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}
