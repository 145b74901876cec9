//! Managers
//!
//! A cloud manager and its child network manager share one subscription and
//! credential. Every record belongs to exactly one of the two.

use super::{EntityKind, EntityRef, RecordKey};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManagerId(pub u64);

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerRole {
    Cloud,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manager {
    pub id: ManagerId,
    pub name: String,
    pub role: ManagerRole,
    /// Cloud manager of a network manager
    #[serde(default)]
    pub parent: Option<ManagerId>,
    pub subscription: String,
    pub provider_region: String,
}

/// A cloud manager together with its network manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerPair {
    pub cloud: Manager,
    pub network: Manager,
}

impl ManagerPair {
    /// Manager owning records of `kind`
    pub fn owner_of(&self, kind: EntityKind) -> ManagerId {
        match kind.role() {
            ManagerRole::Cloud => self.cloud.id,
            ManagerRole::Network => self.network.id,
        }
    }

    pub fn record_key(&self, entity: &EntityRef) -> RecordKey {
        RecordKey {
            manager: self.owner_of(entity.kind),
            kind: entity.kind,
            key: entity.key.clone(),
        }
    }

    pub fn contains(&self, id: ManagerId) -> bool {
        self.cloud.id == id || self.network.id == id
    }

    pub fn subscription(&self) -> &str {
        &self.cloud.subscription
    }

    pub fn region(&self) -> &str {
        &self.cloud.provider_region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> ManagerPair {
        ManagerPair {
            cloud: Manager {
                id: ManagerId(1),
                name: "Azure".into(),
                role: ManagerRole::Cloud,
                parent: None,
                subscription: "sub".into(),
                provider_region: "eastus".into(),
            },
            network: Manager {
                id: ManagerId(2),
                name: "Azure Network".into(),
                role: ManagerRole::Network,
                parent: Some(ManagerId(1)),
                subscription: "sub".into(),
                provider_region: "eastus".into(),
            },
        }
    }

    #[test]
    fn test_record_key_routes_by_role() {
        let pair = pair();
        let vm = EntityRef::new(EntityKind::VmOrTemplate, "s\\rg\\microsoft.compute/virtualmachines\\vm");
        let lb = EntityRef::new(EntityKind::LoadBalancer, "/lb");
        assert_eq!(pair.record_key(&vm).manager, ManagerId(1));
        assert_eq!(pair.record_key(&lb).manager, ManagerId(2));
        assert!(pair.contains(ManagerId(2)));
        assert!(!pair.contains(ManagerId(3)));
    }
}
