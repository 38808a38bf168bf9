//! `blossom init` — Write a starter config and create the data directory.

use blossom_config::AppConfig;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");

    if AppConfig::write_default(&config_path)? {
        println!("Created {}", config_path.display());
    } else {
        println!("  Config file exists: {}", config_path.display());
    }

    let config = AppConfig::load()?;
    if !config.data_dir.exists() {
        std::fs::create_dir_all(&config.data_dir)?;
        println!("Created data directory: {}", config.data_dir.display());
    }

    println!("\nNext steps:");
    println!("  1. Set BLOSSOM_API_KEY (or api_key in config.toml)");
    println!("  2. Put faq.json and therapists.json in {}", config.data_dir.display());
    println!("  3. Run `blossom sync`, then `blossom chat`");

    Ok(())
}
