//! `goalward init`: write a default configuration file.

use goalward_config::AppConfig;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_path);

    if config_path.exists() {
        return Err(format!(
            "Config already exists at {}. Edit it or delete it and re-run init.",
            config_path.display()
        )
        .into());
    }

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&config_path, AppConfig::default_toml())?;

    println!("Created {}", config_path.display());
    println!("\nNext steps:");
    println!("  1. Describe your goal under [goal]");
    println!("  2. Set GOALWARD_API_KEY or add api_key under [reasoner]");
    println!("  3. Run: goalward once   (or goalward run)");

    Ok(())
}
