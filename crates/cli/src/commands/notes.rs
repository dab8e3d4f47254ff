//! `goalward notes`: show ranked context.

use chrono::{Duration, Utc};
use goalward_core::memory::{ContextQuery, TimeWindow};
use std::path::Path;

use crate::runtime;

pub async fn run(
    config_path: Option<&Path>,
    limit: usize,
    category: Option<String>,
    hours: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let store = runtime::open_store(&config).await?.memory;

    let now = Utc::now();
    store.rescore(now).await?;
    let mut query = ContextQuery::new(
        limit,
        TimeWindow::ending_at(now, Duration::hours(i64::from(hours))),
    );
    if let Some(category) = category {
        query = query.with_categories(vec![category]);
    }

    let notes = store.retrieve_context(query).await?;
    if notes.is_empty() {
        println!("No notes in the last {hours} hour(s).");
        return Ok(());
    }

    for note in &notes {
        println!(
            "  [{:>4}] {:.3}  {}  {:<12} {}",
            note.id.0,
            note.importance,
            note.timestamp.format("%Y-%m-%d %H:%M"),
            note.category,
            note.content
        );
    }
    println!("\n{} of {} note(s)", notes.len(), store.note_count().await?);

    Ok(())
}
