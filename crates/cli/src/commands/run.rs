//! `goalward run`: the long-running agent.

use goalward_agent::CycleScheduler;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::runtime;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = runtime::load_config(config_path)?;
    let reasoner = runtime::reasoner(&config)?;
    let stores = runtime::open_store(&config).await?;
    let engine = Arc::new(runtime::build_engine(&config, stores, reasoner)?);

    let mut scheduler = CycleScheduler::new(engine, runtime::interval_policy(&config));
    scheduler.restore().await?;

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), cancel.clone()));

    info!(
        goal = %config.goal.id,
        model = %config.reasoner.model,
        backend = %config.memory.backend,
        "Goalward running (Ctrl-C to stop)"
    );
    scheduler.run_forever(cancel).await;

    let state = scheduler.state();
    println!(
        "Stopped after {} cycle(s); {} consecutive failure(s).",
        state.cycles_run, state.consecutive_failures
    );
    Ok(())
}

/// Cancel `token` once `signal` fires. If the handler cannot be installed
/// the agent keeps running and must be stopped some other way.
async fn cancel_on_signal(
    signal: impl Future<Output = std::io::Result<()>>,
    token: CancellationToken,
) {
    match signal.await {
        Ok(()) => {
            info!("Shutdown requested, finishing current cycle");
            token.cancel();
        }
        Err(e) => warn!(
            error = %e,
            "Cannot listen for Ctrl-C; the agent keeps running until the process is stopped"
        ),
    }
}
