//! `crabot onboard` — First-time setup wizard.

use crabot_config::AppConfig;

const KNOWLEDGE_TEMPLATE: &str = concat!(
    "# Community Risk Assessment Knowledge Base\n\n",
    "<!-- Everything in this file is given to the consultant as reference. -->\n",
    "<!-- Only the first part is included when generating reports. -->\n\n",
    "## Department\n\n",
    "- Name:\n",
    "- Type (career / combination / volunteer):\n",
    "- Stations and apparatus:\n\n",
    "## Data sources available\n\n",
    "- OFIRMS incident exports (years covered):\n",
    "- SVI census tracts for the response area:\n",
    "- GIS layers (hydrants, land use, road network):\n",
    "- Inspection reports and pre-incident plans:\n",
    "- EMS call data:\n\n",
    "## Known local risks\n\n",
    "- \n",
);

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("🚒 crabot — First-Time Setup");
    println!("============================\n");

    // Create directories
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    // Knowledge base template, resolved the same way `chat` resolves it
    let knowledge_path = AppConfig::load()
        .map(|c| c.knowledge.path)
        .unwrap_or_else(|_| AppConfig::default().knowledge.path);
    if knowledge_path.exists() {
        println!("  Knowledge base exists: {}", knowledge_path.display());
    } else {
        std::fs::write(&knowledge_path, KNOWLEDGE_TEMPLATE)?;
        println!("✅ Created knowledge base template: {}", knowledge_path.display());
    }

    // Create config file
    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        let default_toml = AppConfig::default_toml();
        std::fs::write(&config_path, &default_toml)?;
        println!("✅ Created config.toml at: {}", config_path.display());
        println!("\n📝 Next steps:");
        println!("   1. Edit {} and add your API key", config_path.display());
        println!("   2. Fill in {} with your local data", knowledge_path.display());
        println!("   3. Run: crabot chat\n");
    }

    println!("🎉 Setup complete! Run `crabot chat` to start an assessment.\n");

    Ok(())
}
