//! Follow-up queue worker
//!
//! Drains queued follow-ups through the same [`Refresher`] entry point as
//! any caller. Failed items go back on the queue with an incremented
//! attempt counter; input errors are dropped since retrying cannot help.

use crate::error::RefreshError;
use crate::inventory::QueueItem;
use crate::refresh::Refresher;

/// Counts of one drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub processed: usize,
    pub succeeded: usize,
    pub requeued: usize,
    pub dropped: usize,
}

pub struct Worker<'a> {
    refresher: &'a Refresher,
    max_attempts: u32,
}

impl<'a> Worker<'a> {
    pub fn new(refresher: &'a Refresher, max_attempts: u32) -> Self {
        Self {
            refresher,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Process items until the queue is empty or `limit` items were handled
    pub async fn drain(&self, limit: Option<usize>) -> Result<DrainReport, RefreshError> {
        let queue = self.refresher.queue();
        let mut report = DrainReport::default();

        while limit.map_or(true, |max| report.processed < max) {
            let Some(item) = queue.dequeue()? else {
                break;
            };
            report.processed += 1;
            self.process(item, &mut report).await?;
        }

        tracing::info!(
            "Drained {} follow-ups: {} succeeded, {} requeued, {} dropped",
            report.processed,
            report.succeeded,
            report.requeued,
            report.dropped
        );
        Ok(report)
    }

    async fn process(&self, item: QueueItem, report: &mut DrainReport) -> Result<(), RefreshError> {
        let target = item.target();
        tracing::debug!("Processing follow-up {} ({})", target, item.reason);
        let outcome = self.refresher.refresh_many(&[target.clone()]).await;

        if let Some(rejected) = outcome.rejected.first() {
            tracing::warn!("Dropping follow-up {}: {}", target, rejected.error);
            report.dropped += 1;
            return Ok(());
        }

        let Some(error) = outcome.errors().next() else {
            report.succeeded += 1;
            return Ok(());
        };

        if item.attempts + 1 >= self.max_attempts {
            tracing::error!(
                "Giving up on follow-up {} after {} attempts: {}",
                target,
                item.attempts + 1,
                error
            );
            report.dropped += 1;
        } else {
            tracing::warn!("Follow-up {} failed, requeueing: {}", target, error);
            self.refresher.queue().enqueue(item.retry())?;
            report.requeued += 1;
        }
        Ok(())
    }
}
