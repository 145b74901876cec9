//! Follow-up work queue
//!
//! Queue items are targets for a later, independent refresh invocation.
//! At most one item per `(manager, association, natural key)` is outstanding;
//! enqueueing a duplicate is a no-op.

use super::ManagerId;
use crate::error::{StoreError, StoreResult};
use crate::identity::NaturalKey;
use crate::target::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// A persisted unit of follow-up work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: Uuid,
    pub manager: ManagerId,
    pub association: String,
    pub natural_key: String,
    /// Why the item was scheduled, for logs
    pub reason: String,
    #[serde(default)]
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(target: Target, reason: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            manager: target.manager,
            association: target.association,
            natural_key: target.natural_key,
            reason: reason.into(),
            attempts: 0,
            enqueued_at: Utc::now(),
        }
    }

    pub fn target(&self) -> Target {
        Target::new(self.manager, &self.association, &self.natural_key)
    }

    /// Copy scheduled again after a failed attempt
    pub fn retry(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            attempts: self.attempts + 1,
            enqueued_at: Utc::now(),
            ..self.clone()
        }
    }

    fn coalesce_key(&self) -> (ManagerId, String, NaturalKey) {
        (
            self.manager,
            self.association.to_lowercase(),
            NaturalKey::new(&self.natural_key),
        )
    }
}

/// Queue boundary
pub trait WorkQueue: Send + Sync {
    /// Add an item; returns false when an equivalent item is already queued
    fn enqueue(&self, item: QueueItem) -> StoreResult<bool>;

    fn dequeue(&self) -> StoreResult<Option<QueueItem>>;

    fn len(&self) -> StoreResult<usize>;

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Outstanding items in queue order
    fn items(&self) -> StoreResult<Vec<QueueItem>>;
}

/// FIFO queue held in memory
#[derive(Debug, Default)]
pub struct MemoryQueue {
    items: Mutex<VecDeque<QueueItem>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<QueueItem>) -> Self {
        Self {
            items: Mutex::new(items.into()),
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, VecDeque<QueueItem>>> {
        self.items.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl WorkQueue for MemoryQueue {
    fn enqueue(&self, item: QueueItem) -> StoreResult<bool> {
        let mut items = self.lock()?;
        let key = item.coalesce_key();
        if items.iter().any(|queued| queued.coalesce_key() == key) {
            tracing::debug!(
                "Coalesced follow-up {} {} for manager {}",
                item.association,
                item.natural_key,
                item.manager
            );
            return Ok(false);
        }
        items.push_back(item);
        Ok(true)
    }

    fn dequeue(&self) -> StoreResult<Option<QueueItem>> {
        Ok(self.lock()?.pop_front())
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.len())
    }

    fn items(&self) -> StoreResult<Vec<QueueItem>> {
        Ok(self.lock()?.iter().cloned().collect())
    }
}
