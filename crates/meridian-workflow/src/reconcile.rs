use meridian_site::Outcome;
use tracing::{debug, error, info, warn};

use crate::workflow::is_empty_status;
use crate::{OrchestratorError, Workflow, WorkflowGuard};

/// What one reconciliation tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
  /// Non-empty statuses collected from the refreshed sites.
  pub status: Vec<serde_json::Value>,
  /// Whether the aggregate status was handed to the notification sink.
  pub notified: bool,
  pub retried: usize,
  pub completed: usize,
  pub deferred_again: usize,
  pub dropped: usize,
}

impl Workflow {
  /// Run one reconciliation tick, taking the lock for its duration.
  pub async fn reconcile(&self) -> ReconcileReport {
    self.lock().await.reconcile().await
  }
}

impl WorkflowGuard<'_> {
  /// Refresh every site, publish the aggregate status if any site asked
  /// for it, then retry deferred requests.
  ///
  /// Only requests queued before the tick started are retried; a request
  /// deferred again goes to the back of its queue for the next tick, and a
  /// request that fails is dropped.
  pub async fn reconcile(&mut self) -> ReconcileReport {
    let mut report = ReconcileReport::default();
    if self.state.stopped {
      debug!(workflow_id = %self.workflow_id, "workflow stopped, skipping reconciliation");
      return report;
    }
    let mut notify = false;

    for (site, context) in self.state.registry.iter_mut() {
      match context.periodic_refresh().await {
        Ok(Some(status)) if !is_empty_status(&status) => report.status.push(status),
        Ok(_) => {}
        Err(e) => warn!(
          workflow_id = %self.workflow_id,
          site = %site,
          error = %e,
          "periodic refresh failed"
        ),
      }
      notify |= context.take_notification_request();
    }

    if notify {
      let payload = serde_json::Value::Array(report.status.clone());
      let notifier = self.env.notifier();
      if notifier.is_connected() {
        notifier.push(self.workflow_id, &payload);
        report.notified = true;
        info!(workflow_id = %self.workflow_id, "status notification published");
      } else {
        warn!(
          workflow_id = %self.workflow_id,
          payload = %payload,
          "notification sink disconnected, dropping notification"
        );
      }
    }

    self.retry_deferred(&mut report).await;
    report
  }

  async fn retry_deferred(&mut self, report: &mut ReconcileReport) {
    for _ in 0..self.state.deferred.compute_len() {
      let Some(request) = self.state.deferred.pop_compute() else {
        break;
      };
      report.retried += 1;
      let result = self.process_compute(&request, true).await.map(|o| o.map(|_| ()));
      self.tally(report, "compute", result);
    }

    for _ in 0..self.state.deferred.storage_len() {
      let Some(request) = self.state.deferred.pop_storage() else {
        break;
      };
      report.retried += 1;
      let result = self.process_storage(&request, true).await.map(|o| o.map(|_| ()));
      self.tally(report, "storage", result);
    }

    for _ in 0..self.state.deferred.stitch_len() {
      let Some(request) = self.state.deferred.pop_stitch() else {
        break;
      };
      report.retried += 1;
      let result = self.process_stitch(&request, true).await.map(|o| o.map(|_| ()));
      self.tally(report, "stitch", result);
    }
  }

  fn tally(
    &self,
    report: &mut ReconcileReport,
    kind: &str,
    result: Result<Outcome<()>, OrchestratorError>,
  ) {
    match result {
      Ok(Outcome::Completed(())) => {
        report.completed += 1;
        info!(workflow_id = %self.workflow_id, kind, "deferred request completed");
      }
      Ok(Outcome::Deferred) => {
        report.deferred_again += 1;
        debug!(workflow_id = %self.workflow_id, kind, "deferred request still waiting");
      }
      Err(e) => {
        report.dropped += 1;
        error!(
          workflow_id = %self.workflow_id,
          kind,
          error = %e,
          "dropping deferred request"
        );
      }
    }
  }
}
