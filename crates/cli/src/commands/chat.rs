//! `blossom chat` — Interactive or single-message chat mode.

use std::io::Write;

use blossom_agent::Assistant;
use blossom_config::AppConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    BLOSSOM_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let mut assistant = Assistant::from_config(&config)?;

    if config.faq_path().exists() {
        assistant.sync_index().await?;
    } else {
        warn!(path = %config.faq_path().display(), "No FAQ file, answering without it");
    }

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let response = assistant.chat(&msg).await;
        eprint!("\r              \r");
        println!("{}", response?);
    } else {
        // Interactive mode
        println!();
        println!("  {} from {}", config.assistant.name, config.assistant.centre);
        println!("  Model: {}", config.models.primary);
        println!();
        println!("  Type your message and press Enter.");
        println!("  Type 'exit' or Ctrl+D to quit.");
        println!();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        print!("  You > ");
        std::io::stdout().flush()?;

        while let Some(line) = lines.next_line().await? {
            let text = line.trim();
            if text.eq_ignore_ascii_case("exit") || text.eq_ignore_ascii_case("quit") {
                break;
            }

            if !text.is_empty() {
                eprint!("  ...");
                match assistant.chat(text).await {
                    Ok(response) => {
                        eprint!("\r     \r");
                        println!();
                        for line in response.lines() {
                            println!("  {} > {line}", config.assistant.name);
                        }
                        println!();
                    }
                    Err(e) => {
                        eprint!("\r     \r");
                        eprintln!("  [Error] {e}");
                        println!();
                    }
                }
            }

            print!("  You > ");
            std::io::stdout().flush()?;
        }
        println!();
    }

    let report = assistant.costs().await;
    eprintln!("  Cost: {report}");

    Ok(())
}
