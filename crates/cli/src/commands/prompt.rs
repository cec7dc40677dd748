//! `crabot prompt` — Print the system instruction the consultant sends.

use crabot_agent::{KnowledgeLoader, build_system_instruction};

use super::load_config;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let knowledge = KnowledgeLoader::new(&config.knowledge.path);

    eprintln!("  Knowledge: {:?}", knowledge.source());
    println!("{}", build_system_instruction(knowledge.load()));
    Ok(())
}
