//! Periodic reconciliation driver.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::Controller;

/// Calls [`Controller::reconcile_all`] once per interval until cancelled.
///
/// # Usage
///
/// ```ignore
/// let runner = ReconcileRunner::new(controller, settings.reconcile_interval());
///
/// let cancel = CancellationToken::new();
/// tokio::spawn(runner.start(cancel.clone()));
/// ```
pub struct ReconcileRunner {
  controller: Arc<Controller>,
  interval: Duration,
}

impl ReconcileRunner {
  pub fn new(controller: Arc<Controller>, interval: Duration) -> Self {
    Self {
      controller,
      interval,
    }
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Run the loop. The first tick fires one interval after start.
  pub async fn start(self, cancel: CancellationToken) {
    info!(
      interval_ms = self.interval.as_millis() as u64,
      "starting reconcile runner"
    );

    let start = tokio::time::Instant::now() + self.interval;
    let mut ticker = tokio::time::interval_at(start, self.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
      tokio::select! {
          _ = cancel.cancelled() => {
              info!("reconcile runner cancelled");
              break;
          }
          _ = ticker.tick() => {
              let reports = self.controller.reconcile_all().await;
              debug!(workflows = reports.len(), "reconciliation tick finished");
          }
      }
    }
  }
}
