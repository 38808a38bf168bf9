//! `blossom lookup` — Offline therapist profile lookup.

use blossom_config::AppConfig;
use blossom_directory::TherapistDirectory;

pub fn run(name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let directory = TherapistDirectory::load(&config.therapists_path())?;

    let Some((resolved, profile)) = directory.lookup_provider(name) else {
        println!("No therapists listed in {}", config.therapists_path().display());
        return Ok(());
    };

    if resolved != name {
        println!("  (closest match for \"{name}\")");
    }
    println!("{resolved}");
    println!("{}", serde_json::to_string_pretty(&profile)?);

    Ok(())
}
