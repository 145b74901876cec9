//! Canonical inventory model
//!
//! The graph builder produces an [`EntityGraph`] of canonical entities keyed
//! by natural key. The persister reconciles that graph into an
//! [`InventoryStore`], which is the only durable state in the crate.
//!
//! # Architecture
//!
//! - [`manager`] - Managers (cloud/network pairs) owning every record
//! - [`store`] - Store trait, change sets and the in-memory implementation
//! - [`queue`] - Follow-up work items and the work queue
//! - [`query`] - Reverse traversals (back-references are never stored)
//! - [`snapshot`] - JSON persistence of store and queue

pub mod manager;
pub mod query;
pub mod queue;
pub mod snapshot;
pub mod store;

pub use manager::{Manager, ManagerId, ManagerPair, ManagerRole};
pub use queue::{MemoryQueue, QueueItem, WorkQueue};
pub use store::{Change, ChangeSet, InventoryStore, MemoryStore, Record, RecordKey};

use crate::error::RefreshError;
use crate::identity::NaturalKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Canonical entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    VmOrTemplate,
    Hardware,
    Disk,
    Network,
    OperatingSystem,
    Flavor,
    AvailabilityZone,
    ResourceGroup,
    CloudNetwork,
    CloudSubnet,
    NetworkPort,
    FloatingIp,
    SecurityGroup,
    FirewallRule,
    LoadBalancer,
    LoadBalancerPool,
    LoadBalancerPoolMember,
    LoadBalancerListener,
    LoadBalancerHealthCheck,
    OrchestrationTemplate,
    OrchestrationStack,
    OrchestrationStackParameter,
    OrchestrationStackOutput,
    OrchestrationStackResource,
}

impl EntityKind {
    pub const ALL: &'static [EntityKind] = &[
        EntityKind::VmOrTemplate,
        EntityKind::Hardware,
        EntityKind::Disk,
        EntityKind::Network,
        EntityKind::OperatingSystem,
        EntityKind::Flavor,
        EntityKind::AvailabilityZone,
        EntityKind::ResourceGroup,
        EntityKind::CloudNetwork,
        EntityKind::CloudSubnet,
        EntityKind::NetworkPort,
        EntityKind::FloatingIp,
        EntityKind::SecurityGroup,
        EntityKind::FirewallRule,
        EntityKind::LoadBalancer,
        EntityKind::LoadBalancerPool,
        EntityKind::LoadBalancerPoolMember,
        EntityKind::LoadBalancerListener,
        EntityKind::LoadBalancerHealthCheck,
        EntityKind::OrchestrationTemplate,
        EntityKind::OrchestrationStack,
        EntityKind::OrchestrationStackParameter,
        EntityKind::OrchestrationStackOutput,
        EntityKind::OrchestrationStackResource,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::VmOrTemplate => "vm_or_template",
            EntityKind::Hardware => "hardware",
            EntityKind::Disk => "disk",
            EntityKind::Network => "network",
            EntityKind::OperatingSystem => "operating_system",
            EntityKind::Flavor => "flavor",
            EntityKind::AvailabilityZone => "availability_zone",
            EntityKind::ResourceGroup => "resource_group",
            EntityKind::CloudNetwork => "cloud_network",
            EntityKind::CloudSubnet => "cloud_subnet",
            EntityKind::NetworkPort => "network_port",
            EntityKind::FloatingIp => "floating_ip",
            EntityKind::SecurityGroup => "security_group",
            EntityKind::FirewallRule => "firewall_rule",
            EntityKind::LoadBalancer => "load_balancer",
            EntityKind::LoadBalancerPool => "load_balancer_pool",
            EntityKind::LoadBalancerPoolMember => "load_balancer_pool_member",
            EntityKind::LoadBalancerListener => "load_balancer_listener",
            EntityKind::LoadBalancerHealthCheck => "load_balancer_health_check",
            EntityKind::OrchestrationTemplate => "orchestration_template",
            EntityKind::OrchestrationStack => "orchestration_stack",
            EntityKind::OrchestrationStackParameter => "orchestration_stack_parameter",
            EntityKind::OrchestrationStackOutput => "orchestration_stack_output",
            EntityKind::OrchestrationStackResource => "orchestration_stack_resource",
        }
    }

    /// Which manager of the pair owns records of this kind
    pub fn role(&self) -> ManagerRole {
        match self {
            EntityKind::CloudNetwork
            | EntityKind::CloudSubnet
            | EntityKind::NetworkPort
            | EntityKind::FloatingIp
            | EntityKind::SecurityGroup
            | EntityKind::FirewallRule
            | EntityKind::LoadBalancer
            | EntityKind::LoadBalancerPool
            | EntityKind::LoadBalancerPoolMember
            | EntityKind::LoadBalancerListener
            | EntityKind::LoadBalancerHealthCheck => ManagerRole::Network,
            _ => ManagerRole::Cloud,
        }
    }

    /// Relations whose edge set is derived from this kind's own payload
    pub fn owned_relations(&self) -> &'static [Relation] {
        use Relation::*;
        match self {
            EntityKind::VmOrTemplate => &[
                Hardware,
                OperatingSystem,
                AvailabilityZone,
                Flavor,
                ResourceGroup,
            ],
            EntityKind::Hardware => &[Disks, Networks],
            EntityKind::CloudNetwork => &[CloudSubnets],
            EntityKind::CloudSubnet => &[AvailabilityZone],
            EntityKind::NetworkPort => &[Device, CloudSubnets, SecurityGroups],
            EntityKind::FloatingIp => &[NetworkPort],
            EntityKind::SecurityGroup => &[FirewallRules],
            EntityKind::LoadBalancer => &[Pools, Listeners, HealthChecks, NetworkPorts],
            EntityKind::LoadBalancerPool => &[Members],
            EntityKind::LoadBalancerPoolMember => &[NetworkPort],
            EntityKind::LoadBalancerListener => &[Pools, HealthChecks],
            EntityKind::LoadBalancerHealthCheck => &[Members],
            EntityKind::OrchestrationStack => &[
                Template,
                Parameters,
                Outputs,
                Resources,
                Children,
                Vms,
                CloudNetworks,
                LoadBalancers,
                SecurityGroups,
            ],
            _ => &[],
        }
    }

    pub fn owns(&self, relation: Relation) -> bool {
        self.owned_relations().contains(&relation)
    }

    /// True when targets of `relation` are parts of this kind and disappear
    /// with it
    pub fn composes(&self, relation: Relation) -> bool {
        use Relation::*;
        matches!(
            (self, relation),
            (EntityKind::VmOrTemplate, Hardware | OperatingSystem)
                | (EntityKind::Hardware, Disks | Networks)
                | (EntityKind::CloudNetwork, CloudSubnets)
                | (EntityKind::SecurityGroup, FirewallRules)
                | (
                    EntityKind::LoadBalancer,
                    Pools | Listeners | HealthChecks | NetworkPorts
                )
                | (EntityKind::LoadBalancerPool, Members)
                | (
                    EntityKind::OrchestrationStack,
                    Parameters | Outputs | Resources
                )
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Association kinds, named from the owner's side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Hardware,
    OperatingSystem,
    AvailabilityZone,
    Flavor,
    ResourceGroup,
    Disks,
    Networks,
    CloudSubnets,
    Device,
    SecurityGroups,
    NetworkPort,
    FirewallRules,
    Pools,
    Listeners,
    HealthChecks,
    NetworkPorts,
    Members,
    Template,
    Parameters,
    Outputs,
    Resources,
    Children,
    Vms,
    CloudNetworks,
    LoadBalancers,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A manager-independent reference to a canonical entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub key: NaturalKey,
}

impl EntityRef {
    pub fn new(kind: EntityKind, key: impl AsRef<str>) -> Self {
        Self {
            kind,
            key: NaturalKey::new(key),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// Entity attributes. Ordered so equality and serialization are stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an attribute; `None`-like values are stored as JSON null
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|v| !v.is_null())
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(|v| v.as_i64())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(|v| v.as_bool())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// The canonical subgraph produced by one refresh pass
#[derive(Debug, Default)]
pub struct EntityGraph {
    pub nodes: BTreeMap<EntityRef, Attributes>,
    /// Declared owned relations. A present key with an empty set means the
    /// owner's payload declared no targets and the association is cleared.
    pub edges: BTreeMap<(EntityRef, Relation), BTreeSet<EntityRef>>,
    /// Explicit targets the provider reported as gone
    pub vanished: BTreeSet<EntityRef>,
    /// Reachable entities the provider reported as gone
    pub absent: BTreeSet<EntityRef>,
    pub warnings: Vec<RefreshError>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_node(&mut self, entity: EntityRef, attrs: Attributes) {
        self.nodes.insert(entity, attrs);
    }

    /// Declare an owned relation without adding targets
    pub fn declare(&mut self, owner: &EntityRef, relation: Relation) {
        debug_assert!(
            owner.kind.owns(relation),
            "{} does not own {}",
            owner.kind,
            relation
        );
        self.edges.entry((owner.clone(), relation)).or_default();
    }

    pub fn link(&mut self, owner: &EntityRef, relation: Relation, target: EntityRef) {
        self.declare(owner, relation);
        if let Some(targets) = self.edges.get_mut(&(owner.clone(), relation)) {
            targets.insert(target);
        }
    }

    pub fn targets(&self, owner: &EntityRef, relation: Relation) -> Option<&BTreeSet<EntityRef>> {
        self.edges.get(&(owner.clone(), relation))
    }

    pub fn contains(&self, entity: &EntityRef) -> bool {
        self.nodes.contains_key(entity)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.nodes.keys().filter(|e| e.kind == kind).count()
    }

    pub fn attrs(&self, entity: &EntityRef) -> Option<&Attributes> {
        self.nodes.get(entity)
    }
}
