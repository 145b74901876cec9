//! Target Resolver
//!
//! Turns targets into scope entries before any collection starts, and
//! expands fetched payloads through the declared relations table while the
//! collector runs.

use crate::error::RefreshError;
use crate::identity::{vm_key, ArmResourceId, Reference};
use crate::inventory::{EntityKind, EntityRef, InventoryStore, ManagerPair};
use crate::resource::path::{extract_string, extract_strings};
use crate::resource::relations::{relations_from, Follow, RefTransform};
use crate::resource::{
    kind_for_arm_type, CollectionScope, RawKind, RawResource, ScopeEntry, ScopeKey,
};
use crate::target::{Association, RejectedTarget, Target};
use std::collections::BTreeMap;

/// Where an image's unmanaged source VHD lives
pub const IMAGE_BLOB_PATH: &str = "properties.storageProfile.osDisk.blobUri";

/// Resolved fetch scope for one manager pair
#[derive(Debug)]
pub struct ScopeDescriptor {
    pub pair: ManagerPair,
    pub entries: BTreeMap<ScopeKey, ScopeEntry>,
    /// Targets that produced an entry
    pub accepted: Vec<Target>,
    pub rejected: Vec<RejectedTarget>,
}

impl ScopeDescriptor {
    pub fn new(pair: ManagerPair) -> Self {
        Self {
            pair,
            entries: BTreeMap::new(),
            accepted: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Add an entry, coalescing with an existing one for the same key
    pub fn insert(&mut self, entry: ScopeEntry) {
        match self.entries.get_mut(&entry.key) {
            Some(existing) => {
                existing.explicit |= entry.explicit;
                existing.depth = existing.depth.min(entry.depth);
                if existing.entity.is_none() {
                    existing.entity = entry.entity;
                }
            }
            None => {
                self.entries.insert(entry.key.clone(), entry);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Canonical entity produced by fetching `kind` at `id`
pub fn entity_for(kind: RawKind, id: &ArmResourceId) -> Option<EntityRef> {
    let entity_kind = match kind {
        RawKind::VirtualMachine => {
            return vm_key(id).map(|key| EntityRef::new(EntityKind::VmOrTemplate, key));
        }
        RawKind::LoadBalancer => EntityKind::LoadBalancer,
        RawKind::Deployment => EntityKind::OrchestrationStack,
        RawKind::VirtualNetwork => EntityKind::CloudNetwork,
        RawKind::NetworkSecurityGroup => EntityKind::SecurityGroup,
        RawKind::NetworkInterface => EntityKind::NetworkPort,
        RawKind::ResourceGroup => EntityKind::ResourceGroup,
        _ => return None,
    };
    Some(EntityRef::new(entity_kind, id.to_string()))
}

fn arm_kind(id: &ArmResourceId) -> Option<RawKind> {
    kind_for_arm_type(&id.resource_type()?)
}

pub struct Resolver<'a> {
    store: &'a dyn InventoryStore,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a dyn InventoryStore) -> Self {
        Self { store }
    }

    /// Resolve every target before collection begins. Input errors reject
    /// only the offending target.
    pub fn resolve(&self, pair: &ManagerPair, targets: &[Target]) -> ScopeDescriptor {
        let mut scope = ScopeDescriptor::new(pair.clone());
        for target in targets {
            match self.resolve_target(pair, target) {
                Ok(entry) => {
                    tracing::debug!("Target {} resolved to {}", target, entry.key);
                    scope.insert(entry);
                    scope.accepted.push(target.clone());
                }
                Err(error) => {
                    tracing::warn!("Rejected target {}: {}", target, error);
                    scope.rejected.push(RejectedTarget {
                        target: target.clone(),
                        error,
                    });
                }
            }
        }
        scope
    }

    fn resolve_target(&self, pair: &ManagerPair, target: &Target) -> Result<ScopeEntry, RefreshError> {
        let association: Association = target.association.parse()?;
        let reference = Reference::parse(&target.natural_key);

        if let Some(entry) = self.entry_for(pair, association, &reference)? {
            return Ok(entry.explicit());
        }

        // Not a usable provider reference; fall back to a lookup by name
        let fallback = self.lookup_by_name(pair, association, &target.natural_key)?;
        self.entry_for(pair, association, &fallback)?
            .map(ScopeEntry::explicit)
            .ok_or_else(|| RefreshError::AmbiguousReference {
                reference: target.natural_key.clone(),
                matches: 0,
            })
    }

    fn entry_for(
        &self,
        pair: &ManagerPair,
        association: Association,
        reference: &Reference,
    ) -> Result<Option<ScopeEntry>, RefreshError> {
        if let (Association::MiqTemplates, Reference::BlobUrl(url)) = (association, reference) {
            let scope = CollectionScope::Images {
                subscription: pair.subscription().to_string(),
            };
            let entry = ScopeEntry::list_and_filter(RawKind::Image, url, scope, IMAGE_BLOB_PATH, url)
                .with_entity(EntityRef::new(EntityKind::VmOrTemplate, url));
            return Ok(Some(entry));
        }

        let Some(id) = reference.arm_id() else {
            return Ok(None);
        };
        let raw_kind = association.raw_kind();
        if arm_kind(id) != Some(raw_kind) {
            return Ok(None);
        }

        let entity = match association {
            Association::MiqTemplates => self.template_entity(pair, id)?,
            _ => entity_for(raw_kind, id),
        };
        let mut entry = ScopeEntry::by_id(raw_kind, id.to_string());
        if let Some(entity) = entity {
            entry = entry.with_entity(entity);
        }
        Ok(Some(entry))
    }

    /// Templates backed by a VHD are keyed by blob URL, so look up the stored
    /// record for the image id before falling back to the id itself
    fn template_entity(
        &self,
        pair: &ManagerPair,
        id: &ArmResourceId,
    ) -> Result<Option<EntityRef>, RefreshError> {
        let image_id = id.key();
        let found = self.store.find_by_attr(
            pair.cloud.id,
            EntityKind::VmOrTemplate,
            "image_id",
            image_id.as_str(),
        )?;
        Ok(Some(match found.into_iter().next() {
            Some(record) => EntityRef {
                kind: record.kind,
                key: record.key,
            },
            None => EntityRef::new(EntityKind::VmOrTemplate, image_id.as_str()),
        }))
    }

    fn lookup_by_name(
        &self,
        pair: &ManagerPair,
        association: Association,
        name: &str,
    ) -> Result<Reference, RefreshError> {
        let kind = association.entity_kind();
        let mut matches = Vec::new();
        for key in self.store.find_by_attr(pair.owner_of(kind), kind, "name", name)? {
            let Some(record) = self.store.get(&key)? else {
                continue;
            };
            if kind == EntityKind::VmOrTemplate {
                let is_template = record.attrs.get_bool("template").unwrap_or(false);
                if is_template != (association == Association::MiqTemplates) {
                    continue;
                }
            }
            let reference = record
                .attrs
                .get_str("ems_ref")
                .map(str::to_string)
                .unwrap_or_else(|| key.key.to_string());
            matches.push(reference);
        }

        if matches.len() != 1 {
            return Err(RefreshError::AmbiguousReference {
                reference: name.to_string(),
                matches: matches.len(),
            });
        }
        Ok(Reference::parse(&matches[0]))
    }
}

/// Scope entries to fetch next for a collected resource
pub fn expand(entry: &ScopeEntry, resource: &RawResource) -> Vec<ScopeEntry> {
    let depth = entry.depth + 1;
    let payload = &resource.payload;
    let mut out = Vec::new();

    for relation in relations_from(resource.kind) {
        let values = extract_strings(payload, relation.path);
        if relation.follow == Follow::Defer {
            if !values.is_empty() {
                tracing::trace!(
                    "Deferring {} references of {} via {}",
                    values.len(),
                    entry.key,
                    relation.name
                );
            }
            continue;
        }

        for value in values {
            let child = match relation.transform {
                RefTransform::Id | RefTransform::ParentId => {
                    let Some(mut id) = ArmResourceId::parse(&value) else {
                        continue;
                    };
                    if relation.transform == RefTransform::ParentId {
                        let Some(parent) = id.parent() else {
                            continue;
                        };
                        id = parent;
                    }
                    let Some(kind) = arm_kind(&id).filter(|k| relation.accepts.contains(k)) else {
                        continue;
                    };
                    let mut child = ScopeEntry::by_id(kind, id.to_string());
                    if let Some(entity) = entity_for(kind, &id) {
                        child = child.with_entity(entity);
                    }
                    child
                }
                RefTransform::ResourceGroup => {
                    let Some(group) = ArmResourceId::parse(&value)
                        .and_then(|id| id.resource_group_id())
                        .and_then(|g| ArmResourceId::parse(&g))
                    else {
                        continue;
                    };
                    let mut child = ScopeEntry::by_id(RawKind::ResourceGroup, group.to_string());
                    if let Some(entity) = entity_for(RawKind::ResourceGroup, &group) {
                        child = child.with_entity(entity);
                    }
                    child
                }
                RefTransform::VmSize => {
                    let Some(subscription) = extract_string(payload, "id")
                        .and_then(|id| ArmResourceId::parse(&id))
                        .map(|id| id.subscription)
                    else {
                        continue;
                    };
                    let Some(location) = extract_string(payload, "location") else {
                        continue;
                    };
                    let scope = CollectionScope::VmSizes {
                        subscription,
                        location: location.clone(),
                    };
                    ScopeEntry::list_and_filter(
                        RawKind::VmSize,
                        format!("{}/{}", location, value),
                        scope,
                        "name",
                        value.clone(),
                    )
                    .with_entity(EntityRef::new(EntityKind::Flavor, &value))
                }
                RefTransform::SameId => {
                    let Some(kind) = relation.accepts.first() else {
                        continue;
                    };
                    ScopeEntry::by_id(*kind, value.clone())
                }
            };
            out.push(child.with_depth(depth));
        }
    }

    out
}
