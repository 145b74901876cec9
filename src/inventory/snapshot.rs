//! JSON snapshots of the in-memory store and queue
//!
//! The CLI loads a snapshot at start, runs one command, and writes it back.

use super::queue::{MemoryQueue, QueueItem, WorkQueue};
use super::store::{MemoryStore, Record, RecordKey, StoreState};
use super::{Manager, Relation};
use crate::error::StoreResult;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordRow {
    key: RecordKey,
    record: Record,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssociationRow {
    owner: RecordKey,
    relation: Relation,
    targets: Vec<RecordKey>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    managers: Vec<Manager>,
    #[serde(default)]
    records: Vec<RecordRow>,
    #[serde(default)]
    associations: Vec<AssociationRow>,
    #[serde(default)]
    queue: Vec<QueueItem>,
}

/// Write store and queue to `path`
pub fn save(path: &Path, store: &MemoryStore, queue: &MemoryQueue) -> StoreResult<()> {
    let snapshot = {
        let state = store.read()?;
        Snapshot {
            managers: state.managers.values().cloned().collect(),
            records: state
                .records
                .iter()
                .map(|(key, record)| RecordRow {
                    key: key.clone(),
                    record: record.clone(),
                })
                .collect(),
            associations: state
                .associations
                .iter()
                .map(|((owner, relation), targets)| AssociationRow {
                    owner: owner.clone(),
                    relation: *relation,
                    targets: targets.iter().cloned().collect(),
                })
                .collect(),
            queue: queue.items()?,
        }
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(&snapshot)?;
    std::fs::write(path, content)?;
    tracing::debug!(
        "Saved snapshot with {} records to {:?}",
        snapshot.records.len(),
        path
    );
    Ok(())
}

/// Load store and queue from `path`; a missing file yields empty ones
pub fn load(path: &Path) -> StoreResult<(MemoryStore, MemoryQueue)> {
    if !path.exists() {
        return Ok((MemoryStore::new(), MemoryQueue::new()));
    }

    let content = std::fs::read_to_string(path)?;
    let snapshot: Snapshot = serde_json::from_str(&content)?;

    let mut state = StoreState::default();
    for manager in snapshot.managers {
        state.managers.insert(manager.id, manager);
    }
    for row in snapshot.records {
        state.records.insert(row.key, row.record);
    }
    for row in snapshot.associations {
        state
            .associations
            .insert((row.owner, row.relation), row.targets.into_iter().collect());
    }

    Ok((
        MemoryStore::from_state(state),
        MemoryQueue::from_items(snapshot.queue),
    ))
}
