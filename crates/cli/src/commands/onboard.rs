//! `pennywise onboard` — First-time setup.

use pennywise_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = AppConfig::config_path();

    println!("💰 Pennywise — First-Time Setup");
    println!("===============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let config = super::load_config()?;
    let ledger = pennywise_ledger::open(&config.ledger).await?;
    println!(
        "✅ {} ledger ready at {}",
        ledger.name(),
        config.ledger.resolved_url()
    );

    if !config.has_api_key() {
        println!("\n📝 Next steps:");
        println!("   1. Add your API key to {} (or set OPENAI_API_KEY)", config_path.display());
        println!("   2. Run: pennywise agent");
    }

    println!("\n🎉 Setup complete! Run `pennywise agent` to start tracking.\n");

    Ok(())
}
