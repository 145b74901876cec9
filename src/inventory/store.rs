//! Inventory store
//!
//! Records are addressed by `(manager, kind, natural key)`. Associations are
//! sets of record keys per `(owner, relation)`; targets may name records that
//! do not exist yet, which is how an edge to a not-yet-refreshed VM survives
//! until that VM arrives.
//!
//! All writes go through [`InventoryStore::apply`], which validates the whole
//! [`ChangeSet`] before touching anything.

use super::{Attributes, EntityKind, Manager, ManagerId, ManagerPair, ManagerRole, Relation};
use crate::error::{StoreError, StoreResult};
use crate::identity::NaturalKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Store address of one record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub manager: ManagerId,
    pub kind: EntityKind,
    pub key: NaturalKey,
}

impl RecordKey {
    pub fn new(manager: ManagerId, kind: EntityKind, key: impl AsRef<str>) -> Self {
        Self {
            manager,
            kind,
            key: NaturalKey::new(key),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.manager, self.kind, self.key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub attrs: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One write operation
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Upsert {
        key: RecordKey,
        attrs: Attributes,
    },
    ReplaceAssociation {
        owner: RecordKey,
        relation: Relation,
        targets: BTreeSet<RecordKey>,
    },
    /// Remove a record, its outgoing associations, and every edge pointing
    /// at it
    Remove { key: RecordKey },
}

/// An ordered batch of writes applied atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, key: RecordKey, attrs: Attributes) {
        self.changes.push(Change::Upsert { key, attrs });
    }

    pub fn replace_association(
        &mut self,
        owner: RecordKey,
        relation: Relation,
        targets: BTreeSet<RecordKey>,
    ) {
        self.changes.push(Change::ReplaceAssociation {
            owner,
            relation,
            targets,
        });
    }

    pub fn remove(&mut self, key: RecordKey) {
        self.changes.push(Change::Remove { key });
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn removals(&self) -> impl Iterator<Item = &RecordKey> {
        self.changes.iter().filter_map(|c| match c {
            Change::Remove { key } => Some(key),
            _ => None,
        })
    }
}

/// Timestamp-free view of the store for equality assertions
#[derive(Debug, Clone, PartialEq)]
pub struct Fingerprint {
    pub records: BTreeMap<RecordKey, Attributes>,
    pub associations: BTreeMap<(RecordKey, Relation), BTreeSet<RecordKey>>,
}

/// Persistence boundary
pub trait InventoryStore: Send + Sync {
    fn managers(&self) -> StoreResult<Vec<Manager>>;

    /// Register a cloud manager and its network manager
    fn create_manager_pair(
        &self,
        name: &str,
        subscription: &str,
        provider_region: &str,
    ) -> StoreResult<ManagerPair>;

    fn get(&self, key: &RecordKey) -> StoreResult<Option<Record>>;

    /// Keys of records of `kind` whose string attribute equals `value` exactly
    fn find_by_attr(
        &self,
        manager: ManagerId,
        kind: EntityKind,
        attr: &str,
        value: &str,
    ) -> StoreResult<Vec<RecordKey>>;

    fn association(&self, owner: &RecordKey, relation: Relation) -> StoreResult<BTreeSet<RecordKey>>;

    /// Owners whose `relation` contains `target`
    fn referrers(&self, target: &RecordKey, relation: Relation) -> StoreResult<BTreeSet<RecordKey>>;

    /// Record count for a kind, across all managers when `manager` is `None`
    fn count(&self, manager: Option<ManagerId>, kind: EntityKind) -> StoreResult<usize>;

    fn records(&self, manager: ManagerId, kind: EntityKind) -> StoreResult<Vec<(RecordKey, Record)>>;

    /// Validate and apply a change set; nothing is written on error
    fn apply(&self, changes: &ChangeSet) -> StoreResult<()>;

    fn fingerprint(&self) -> StoreResult<Fingerprint>;

    /// The pair containing manager `id`, from either side
    fn manager_pair(&self, id: ManagerId) -> StoreResult<Option<ManagerPair>> {
        let managers = self.managers()?;
        let Some(found) = managers.iter().find(|m| m.id == id) else {
            return Ok(None);
        };
        let (cloud, network) = match found.role {
            ManagerRole::Cloud => {
                let network = managers
                    .iter()
                    .find(|m| m.role == ManagerRole::Network && m.parent == Some(found.id));
                (Some(found), network)
            }
            ManagerRole::Network => {
                let cloud = managers.iter().find(|m| Some(m.id) == found.parent);
                (cloud, Some(found))
            }
        };
        Ok(match (cloud, network) {
            (Some(cloud), Some(network)) => Some(ManagerPair {
                cloud: cloud.clone(),
                network: network.clone(),
            }),
            _ => None,
        })
    }

    fn manager_by_name(&self, name: &str) -> StoreResult<Option<Manager>> {
        Ok(self
            .managers()?
            .into_iter()
            .find(|m| m.role == ManagerRole::Cloud && m.name == name))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct StoreState {
    pub(crate) managers: BTreeMap<ManagerId, Manager>,
    pub(crate) records: BTreeMap<RecordKey, Record>,
    pub(crate) associations: BTreeMap<(RecordKey, Relation), BTreeSet<RecordKey>>,
}

impl StoreState {
    fn next_manager_id(&self) -> ManagerId {
        ManagerId(self.managers.keys().map(|id| id.0).max().unwrap_or(0) + 1)
    }

    fn validate(&self, changes: &ChangeSet) -> StoreResult<()> {
        let upserted: BTreeSet<&RecordKey> = changes
            .changes
            .iter()
            .filter_map(|c| match c {
                Change::Upsert { key, .. } => Some(key),
                _ => None,
            })
            .collect();
        let removed: BTreeSet<&RecordKey> = changes.removals().collect();

        for change in &changes.changes {
            match change {
                Change::Upsert { key, .. } => {
                    let Some(manager) = self.managers.get(&key.manager) else {
                        return Err(StoreError::Constraint(format!(
                            "record {} names unknown manager",
                            key
                        )));
                    };
                    if manager.role != key.kind.role() {
                        return Err(StoreError::Constraint(format!(
                            "{} cannot be owned by a {:?} manager",
                            key.kind, manager.role
                        )));
                    }
                    if removed.contains(key) {
                        return Err(StoreError::Constraint(format!(
                            "record {} is both upserted and removed",
                            key
                        )));
                    }
                }
                Change::ReplaceAssociation {
                    owner, relation, ..
                } => {
                    if !owner.kind.owns(*relation) {
                        return Err(StoreError::Constraint(format!(
                            "{} does not own {}",
                            owner.kind, relation
                        )));
                    }
                    let exists = self.records.contains_key(owner) || upserted.contains(owner);
                    if !exists || removed.contains(owner) {
                        return Err(StoreError::Constraint(format!(
                            "association owner {} does not exist",
                            owner
                        )));
                    }
                }
                Change::Remove { .. } => {}
            }
        }
        Ok(())
    }

    fn apply(&mut self, changes: &ChangeSet, now: DateTime<Utc>) {
        for change in &changes.changes {
            match change {
                Change::Upsert { key, attrs } => match self.records.get_mut(key) {
                    Some(record) if record.attrs == *attrs => {}
                    Some(record) => {
                        record.attrs = attrs.clone();
                        record.updated_at = now;
                    }
                    None => {
                        self.records.insert(
                            key.clone(),
                            Record {
                                attrs: attrs.clone(),
                                created_at: now,
                                updated_at: now,
                            },
                        );
                    }
                },
                Change::ReplaceAssociation {
                    owner,
                    relation,
                    targets,
                } => {
                    if targets.is_empty() {
                        self.associations.remove(&(owner.clone(), *relation));
                    } else {
                        self.associations
                            .insert((owner.clone(), *relation), targets.clone());
                    }
                }
                Change::Remove { key } => {
                    self.records.remove(key);
                    self.associations.retain(|(owner, _), targets| {
                        targets.remove(key);
                        owner != key && !targets.is_empty()
                    });
                }
            }
        }
    }
}

/// In-memory store guarded by a read/write lock
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_state(state: StoreState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub(crate) fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| StoreError::Poisoned)
    }
}

impl InventoryStore for MemoryStore {
    fn managers(&self) -> StoreResult<Vec<Manager>> {
        Ok(self.read()?.managers.values().cloned().collect())
    }

    fn create_manager_pair(
        &self,
        name: &str,
        subscription: &str,
        provider_region: &str,
    ) -> StoreResult<ManagerPair> {
        let mut state = self.write()?;
        if state
            .managers
            .values()
            .any(|m| m.role == ManagerRole::Cloud && m.name == name)
        {
            return Err(StoreError::Constraint(format!(
                "manager '{}' already exists",
                name
            )));
        }

        let cloud = Manager {
            id: state.next_manager_id(),
            name: name.to_string(),
            role: ManagerRole::Cloud,
            parent: None,
            subscription: subscription.to_string(),
            provider_region: provider_region.to_string(),
        };
        state.managers.insert(cloud.id, cloud.clone());

        let network = Manager {
            id: state.next_manager_id(),
            name: format!("{} Network Manager", name),
            role: ManagerRole::Network,
            parent: Some(cloud.id),
            subscription: subscription.to_string(),
            provider_region: provider_region.to_string(),
        };
        state.managers.insert(network.id, network.clone());

        tracing::info!("Registered manager pair {} ({}/{})", name, cloud.id, network.id);
        Ok(ManagerPair { cloud, network })
    }

    fn get(&self, key: &RecordKey) -> StoreResult<Option<Record>> {
        Ok(self.read()?.records.get(key).cloned())
    }

    fn find_by_attr(
        &self,
        manager: ManagerId,
        kind: EntityKind,
        attr: &str,
        value: &str,
    ) -> StoreResult<Vec<RecordKey>> {
        let state = self.read()?;
        Ok(state
            .records
            .iter()
            .filter(|(k, _)| k.manager == manager && k.kind == kind)
            .filter(|(_, r)| r.attrs.get_str(attr) == Some(value))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn association(&self, owner: &RecordKey, relation: Relation) -> StoreResult<BTreeSet<RecordKey>> {
        Ok(self
            .read()?
            .associations
            .get(&(owner.clone(), relation))
            .cloned()
            .unwrap_or_default())
    }

    fn referrers(&self, target: &RecordKey, relation: Relation) -> StoreResult<BTreeSet<RecordKey>> {
        let state = self.read()?;
        Ok(state
            .associations
            .iter()
            .filter(|((_, rel), targets)| *rel == relation && targets.contains(target))
            .map(|((owner, _), _)| owner.clone())
            .collect())
    }

    fn count(&self, manager: Option<ManagerId>, kind: EntityKind) -> StoreResult<usize> {
        let state = self.read()?;
        Ok(state
            .records
            .keys()
            .filter(|k| k.kind == kind && manager.map_or(true, |m| k.manager == m))
            .count())
    }

    fn records(&self, manager: ManagerId, kind: EntityKind) -> StoreResult<Vec<(RecordKey, Record)>> {
        let state = self.read()?;
        Ok(state
            .records
            .iter()
            .filter(|(k, _)| k.manager == manager && k.kind == kind)
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect())
    }

    fn apply(&self, changes: &ChangeSet) -> StoreResult<()> {
        let mut state = self.write()?;
        state.validate(changes)?;
        state.apply(changes, Utc::now());
        tracing::debug!("Applied {} changes", changes.len());
        Ok(())
    }

    fn fingerprint(&self) -> StoreResult<Fingerprint> {
        let state = self.read()?;
        Ok(Fingerprint {
            records: state
                .records
                .iter()
                .map(|(k, r)| (k.clone(), r.attrs.clone()))
                .collect(),
            associations: state.associations.clone(),
        })
    }
}
