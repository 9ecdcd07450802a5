//! Drains the commission-accrual outbox.
//!
//! Capture commits write an outbox row in the same transaction as the
//! payment, then nudge this worker. A periodic sweep picks up anything a
//! nudge missed, including tasks left over from a previous process.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::{
    config::WorkerConfig,
    error::Result,
    repository::{OutboxRepository, OutboxTask, TaskKind},
    service::commission_service::CommissionService,
};

const MAX_BACKOFF_SECS: i64 = 300;

/// Delay before the next try after `attempts` failures: 2^attempts seconds, capped.
pub fn backoff_delay(attempts: i64) -> chrono::Duration {
    let exp = attempts.clamp(0, 16) as u32;
    chrono::Duration::seconds(2i64.pow(exp).min(MAX_BACKOFF_SECS))
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub completed: usize,
    pub retried: usize,
    pub abandoned: usize,
}

pub struct AccrualWorker {
    outbox_repo: Arc<dyn OutboxRepository>,
    commission_service: Arc<CommissionService>,
    signal: Arc<Notify>,
    config: WorkerConfig,
}

impl AccrualWorker {
    pub fn new(
        outbox_repo: Arc<dyn OutboxRepository>,
        commission_service: Arc<CommissionService>,
        signal: Arc<Notify>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            outbox_repo,
            commission_service,
            signal,
            config,
        }
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));
        tracing::info!(poll_interval_secs = self.config.poll_interval_secs, "Accrual worker started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Accrual worker shutting down");
                    break;
                }
                _ = self.signal.notified() => {}
                _ = interval.tick() => {}
            }

            if let Err(e) = self.process_due().await {
                tracing::error!("Accrual sweep failed: {}", e);
            }
        }
    }

    /// Runs every task that is due now. Failures are rescheduled or abandoned,
    /// never propagated; only outbox bookkeeping errors surface.
    pub async fn process_due(&self) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for task in self.outbox_repo.claim_due(self.config.batch_size).await? {
            match self.execute(&task).await {
                Ok(()) => {
                    self.outbox_repo.mark_done(task.id).await?;
                    report.completed += 1;
                }
                Err(e) => {
                    let error = e.to_string();
                    if task.attempts + 1 >= self.config.max_attempts {
                        tracing::error!(
                            order_id = %task.order_id,
                            attempts = task.attempts + 1,
                            "Giving up on commission accrual: {}",
                            error
                        );
                        self.outbox_repo.mark_abandoned(task.id, &error).await?;
                        report.abandoned += 1;
                    } else {
                        let retry_at = Utc::now() + backoff_delay(task.attempts + 1);
                        tracing::warn!(
                            order_id = %task.order_id,
                            attempts = task.attempts + 1,
                            %retry_at,
                            "Commission accrual failed: {}",
                            error
                        );
                        self.outbox_repo.reschedule(task.id, &error, retry_at).await?;
                        report.retried += 1;
                    }
                }
            }
        }

        Ok(report)
    }

    async fn execute(&self, task: &OutboxTask) -> Result<()> {
        match task.kind {
            TaskKind::CommissionAccrual => {
                self.commission_service.accrue_for_order(task.order_id).await?;
            }
        }
        Ok(())
    }
}
