//! `crabot doctor` — Diagnose system health.

use crabot_agent::{KnowledgeLoader, KnowledgeSource};
use crabot_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 crabot Doctor — System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    // Check config
    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — run `crabot onboard` (defaults in use)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config file invalid: {e}");
            println!("\n  ⚠️  Fix the config file and run doctor again.");
            return Ok(());
        }
    };

    // Check API key
    let provider = crabot_providers::build_from_config(&config);
    if provider.has_credential() {
        println!("  ✅ API key configured for {}", provider.name());
        match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider reachable"),
            Ok(false) => {
                println!("  ⚠️  Provider answered but rejected the health check");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider check failed: {e}");
                issues += 1;
            }
        }
    } else {
        println!("  ❌ No API key — set CRABOT_API_KEY or OPENAI_API_KEY");
        issues += 1;
    }

    // Check knowledge base
    let knowledge = KnowledgeLoader::new(&config.knowledge.path);
    match knowledge.source() {
        KnowledgeSource::File(path) => println!(
            "  ✅ Knowledge base loaded from {} ({} chars)",
            path.display(),
            knowledge.load().chars().count()
        ),
        _ => {
            println!(
                "  ⚠️  No knowledge base at {} — built-in reference in use",
                config.knowledge.path.display()
            );
            issues += 1;
        }
    }

    // Check export directory
    if config.export.dir.is_dir() {
        println!("  ✅ Export directory: {}", config.export.dir.display());
    } else {
        println!(
            "  ⚠️  Export directory {} does not exist yet (created on first save)",
            config.export.dir.display()
        );
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
