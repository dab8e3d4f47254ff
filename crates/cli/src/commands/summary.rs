//! `goalward summary`: aggregate a recent period.

use chrono::Utc;
use goalward_core::memory::SummaryPeriod;
use std::path::Path;

use crate::runtime;

pub async fn run(
    config_path: Option<&Path>,
    period: SummaryPeriod,
    save: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let store = runtime::open_store(&config).await?.memory;

    let summary = store.summarize(period, Utc::now()).await?;

    println!("{} summary", capitalize(period.as_str()));
    println!("==============");
    println!(
        "  Window:     {} → {}",
        summary.window.since.format("%Y-%m-%d %H:%M"),
        summary.window.until.format("%Y-%m-%d %H:%M")
    );
    println!(
        "  Notes:      {} ({:+} vs previous)",
        summary.note_count, summary.trend.notes
    );
    for (category, count) in &summary.notes_by_category {
        println!("    {category:<14} {count}");
    }
    println!(
        "  Decisions:  {} ({:+} vs previous)",
        summary.decision_count, summary.trend.decisions
    );
    for (outcome, count) in &summary.decisions_by_outcome {
        println!("    {outcome:<14} {count}");
    }
    println!(
        "  Failures:   {} ({:+} vs previous)",
        summary.failure_count, summary.trend.failures
    );
    println!(
        "  Success:    {:+.1} pts vs previous",
        summary.trend.success_rate * 100.0
    );

    if !summary.highlights.is_empty() {
        println!("\n  Highlights:");
        for h in &summary.highlights {
            println!(
                "    [{}] ({}, {:.2}) {}",
                h.note_id, h.category, h.importance, h.content
            );
        }
    }

    if save {
        let id = store.record_summary(&summary).await?;
        println!("\nSaved as summary #{id}");
    }

    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
