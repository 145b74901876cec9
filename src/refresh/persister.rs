//! Persister
//!
//! Reconciles one pass's [`EntityGraph`] into the store as a single
//! [`ChangeSet`]. Only declared owned relations are replaced, so edges the
//! pass did not re-derive stay untouched. Nothing is pruned scope-wide:
//! records go away only as vanished explicit targets or as composed parts
//! dropped from a refreshed owner.

use crate::error::{RefreshError, StoreResult};
use crate::inventory::{ChangeSet, EntityGraph, EntityRef, InventoryStore, ManagerPair, RecordKey};
use std::collections::BTreeSet;

/// Counts of what one persist call wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistResult {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    pub associations_replaced: usize,
}

impl PersistResult {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.removed == 0 && self.associations_replaced == 0
    }
}

pub struct Persister<'a> {
    store: &'a dyn InventoryStore,
}

impl<'a> Persister<'a> {
    pub fn new(store: &'a dyn InventoryStore) -> Self {
        Self { store }
    }

    /// Write the graph. The caller holds the manager's reconciliation lock.
    pub fn persist(&self, graph: &EntityGraph, pair: &ManagerPair) -> Result<PersistResult, RefreshError> {
        let mut result = PersistResult::default();
        let mut changes = ChangeSet::new();

        for (entity, attrs) in &graph.nodes {
            let key = pair.record_key(entity);
            match self.store.get(&key)? {
                None => {
                    result.created += 1;
                    changes.upsert(key, attrs.clone());
                }
                Some(record) if record.attrs != *attrs => {
                    result.updated += 1;
                    changes.upsert(key, attrs.clone());
                }
                Some(_) => result.unchanged += 1,
            }
        }

        let mut removals = BTreeSet::new();
        for ((owner, relation), targets) in &graph.edges {
            let owner_key = pair.record_key(owner);
            let wanted: BTreeSet<RecordKey> = targets.iter().map(|t| pair.record_key(t)).collect();
            let current = self.store.association(&owner_key, *relation)?;
            if current == wanted {
                continue;
            }

            if owner.kind.composes(*relation) {
                for dropped in current.difference(&wanted) {
                    if !graph.contains(&entity_of(dropped)) {
                        self.collect_parts(dropped, &mut removals)?;
                    }
                }
            }
            result.associations_replaced += 1;
            changes.replace_association(owner_key, *relation, wanted);
        }

        for entity in &graph.vanished {
            let key = pair.record_key(entity);
            if self.store.get(&key)?.is_some() {
                tracing::info!("Removing vanished target {}", key);
                self.collect_parts(&key, &mut removals)?;
            }
        }

        // A part still present in the graph under a new owner must survive
        removals.retain(|key| !graph.contains(&entity_of(key)));
        result.removed = removals.len();
        for key in removals {
            changes.remove(key);
        }

        if changes.is_empty() {
            tracing::debug!("Nothing to persist for manager {}", pair.cloud.id);
        } else {
            self.store.apply(&changes)?;
        }

        tracing::info!(
            "Persisted manager {}: {} created, {} updated, {} unchanged, {} removed, {} associations replaced",
            pair.cloud.id,
            result.created,
            result.updated,
            result.unchanged,
            result.removed,
            result.associations_replaced
        );
        Ok(result)
    }

    /// A record and every part it composes, transitively
    fn collect_parts(&self, key: &RecordKey, out: &mut BTreeSet<RecordKey>) -> StoreResult<()> {
        if !out.insert(key.clone()) {
            return Ok(());
        }
        for relation in key.kind.owned_relations() {
            if !key.kind.composes(*relation) {
                continue;
            }
            for part in self.store.association(key, *relation)? {
                self.collect_parts(&part, out)?;
            }
        }
        Ok(())
    }
}

fn entity_of(key: &RecordKey) -> EntityRef {
    EntityRef {
        kind: key.kind,
        key: key.key.clone(),
    }
}
