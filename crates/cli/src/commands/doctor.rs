//! `pennywise doctor` — Diagnose system health.

use pennywise_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Pennywise Doctor — System Diagnostics");
    println!("=======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if !config_path.exists() {
        println!("  ⚠️  No config file — using defaults (run `pennywise onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    match pennywise_ledger::open(&config.ledger).await {
        Ok(ledger) => match ledger.health_check().await {
            Ok(true) => println!("  ✅ Database connected ({})", ledger.name()),
            Ok(false) => {
                println!("  ❌ Database not responding ({})", ledger.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Database error: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  ❌ Cannot open database: {e}");
            issues += 1;
        }
    }

    if config.has_api_key() || config.default_provider == "ollama" {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key configured — set OPENAI_API_KEY or api_key in config.toml");
        issues += 1;
    }

    match pennywise_providers::build_from_config(&config).default() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider reachable ({})", provider.name()),
            Ok(false) => {
                println!("  ⚠️  Provider unhealthy ({})", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider error ({}): {e}", provider.name());
                issues += 1;
            }
        },
        None => {
            println!("  ❌ No default provider configured");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
