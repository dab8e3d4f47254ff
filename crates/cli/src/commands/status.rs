//! `goalward status`: configuration overview and the last decision.

use chrono::Utc;
use goalward_config::{AppConfig, MemoryBackend};
use std::path::Path;

use crate::runtime;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(AppConfig::default_path);

    println!("Goalward Status");
    println!("===============");
    println!("  Config:     {}", path.display());
    println!("  Goal:       {} ({})", config.goal.description, config.goal.id);
    println!("  Reasoner:   {} @ {}", config.reasoner.model, config.reasoner.api_url);
    println!(
        "  API key:    {}",
        if config.has_api_key() { "set" } else { "missing" }
    );
    match config.memory.backend {
        MemoryBackend::Sqlite => println!("  Memory:     sqlite ({})", config.memory.db_path().display()),
        MemoryBackend::InMemory => println!("  Memory:     in_memory"),
    }
    println!(
        "  Interval:   {}s base, {}s max, x{} backoff",
        config.scheduler.base_interval_secs,
        config.scheduler.max_interval_secs,
        config.scheduler.backoff_multiplier
    );

    if !path.exists() {
        println!("\n  No config file; run `goalward init` first");
    }

    let store = runtime::open_store(&config).await?.memory;
    println!(
        "\n  Notes: {}   Decisions: {}",
        store.note_count().await?,
        store.decision_count().await?
    );

    match store.last_decision().await? {
        Some(decision) => {
            let record = &decision.record;
            let due = i64::try_from(record.next_interval_secs)
                .ok()
                .and_then(chrono::Duration::try_seconds)
                .and_then(|wait| record.timestamp.checked_add_signed(wait))
                .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
            println!("\n  Last decision #{}", decision.id);
            println!("    At:       {}", record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("    Tool:     {}", record.plan.tool);
            println!("    Outcome:  {}", record.outcome.label());
            if let Some(error) = &record.error {
                println!("    Error:    {error}");
            }
            let remaining = (due - Utc::now()).num_seconds();
            if remaining > 0 {
                println!("    Next due: {} (in {remaining}s)", due.format("%Y-%m-%d %H:%M:%S UTC"));
            } else {
                println!("    Next due: now");
            }
        }
        None => println!("\n  No decisions recorded yet"),
    }

    Ok(())
}
