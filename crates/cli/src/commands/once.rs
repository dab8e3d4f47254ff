//! `goalward once`: run a single decision cycle.

use goalward_agent::CycleScheduler;
use goalward_core::decision::Outcome;
use std::path::Path;
use std::sync::Arc;

use crate::runtime;

pub async fn run(config_path: Option<&Path>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let reasoner = runtime::reasoner(&config)?;
    let stores = runtime::open_store(&config).await?;
    let engine = Arc::new(runtime::build_engine(&config, stores, reasoner)?);

    let mut scheduler = CycleScheduler::new(engine, runtime::interval_policy(&config));
    scheduler.restore().await?;
    let report = scheduler.run_once().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Cycle {} → decision #{}", report.cycle, report.decision_id);
    println!("  Context:   {} note(s)", report.context_size);
    println!("  Attempts:  {}", report.attempts);
    println!("  Tool:      {} {}", report.plan.tool, report.plan.arguments);
    println!("  Reasoning: {}", report.plan.rationale);
    if let Some(analysis) = &report.plan.analysis {
        println!("  Analysis:  {analysis}");
    }
    match &report.outcome {
        Outcome::Executed { output, .. } => println!("  Result:    {output}"),
        other => println!(
            "  Outcome:   {} ({})",
            other.label(),
            other.error().unwrap_or_default()
        ),
    }
    println!("  Next in:   {}s", report.next_interval.as_secs());

    Ok(())
}
