//! `blossom sync` — Reconcile the FAQ index.

use blossom_agent::Assistant;
use blossom_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() {
        return Err("No API key found. Set BLOSSOM_API_KEY or OPENAI_API_KEY.".into());
    }

    let mut assistant = Assistant::from_config(&config)?;
    let summary = assistant.sync_index().await?;

    if summary.is_unchanged() {
        println!("FAQ index is up to date.");
    } else {
        println!("FAQ index updated:");
        println!("  Added:   {}", summary.added);
        println!("  Removed: {}", summary.removed);
        println!("  Updated: {}", summary.updated);
    }

    let report = assistant.costs().await;
    println!("  Embedding cost: ${:.6}", report.embed_cost);

    Ok(())
}
