use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::app::counters::{CounterSync, RepairStrategy};
use crate::infra::store::EntityStore;

/// Periodically repairs drifted post amounts. Runs until the task is dropped.
pub async fn run(store: Arc<dyn EntityStore>, strategy: RepairStrategy, interval: Duration) -> Result<()> {
    info!(strategy = strategy.repairer().name(), "counter reconciler started");
    let counters = CounterSync::new(store);
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;
        match counters.reconcile_all(strategy.repairer()).await {
            Ok(report) if report.repaired.is_empty() => {
                info!(checked = report.checked, "reconcile pass found no drift");
            }
            Ok(report) => {
                info!(
                    checked = report.checked,
                    repaired = report.repaired.len(),
                    "reconcile pass repaired drifted posts"
                );
            }
            Err(err) => {
                error!(error = ?err, "reconcile pass failed");
            }
        }
    }
}
