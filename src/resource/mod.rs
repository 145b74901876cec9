//! Raw provider resource layer
//!
//! Everything here deals with ARM payloads before they become inventory.
//! Raw kind definitions are loaded from JSON at compile time; the relations
//! between kinds are an explicit static table.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches raw kind definitions from embedded JSON
//! - [`relations`] - The declared-relations table driving scope expansion
//! - [`path`] - Dot-path extraction over JSON payloads
//! - [`fetcher`] - The wave-based collector over a [`ProviderApi`]

pub mod fetcher;
pub mod path;
pub mod registry;
pub mod relations;

pub use fetcher::{Collector, RetryPolicy};
pub use registry::{get_kind, kind_for_arm_type};

use crate::error::ProviderError;
use crate::identity::NaturalKey;
use crate::inventory::EntityRef;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kinds of raw ARM payloads the collector can fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RawKind {
    ResourceGroup,
    VirtualMachine,
    VmSize,
    Image,
    ManagedDisk,
    NetworkInterface,
    PublicIpAddress,
    VirtualNetwork,
    NetworkSecurityGroup,
    LoadBalancer,
    Deployment,
    DeploymentOperations,
    DeploymentTemplate,
}

impl RawKind {
    pub const ALL: &'static [RawKind] = &[
        RawKind::ResourceGroup,
        RawKind::VirtualMachine,
        RawKind::VmSize,
        RawKind::Image,
        RawKind::ManagedDisk,
        RawKind::NetworkInterface,
        RawKind::PublicIpAddress,
        RawKind::VirtualNetwork,
        RawKind::NetworkSecurityGroup,
        RawKind::LoadBalancer,
        RawKind::Deployment,
        RawKind::DeploymentOperations,
        RawKind::DeploymentTemplate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RawKind::ResourceGroup => "resource_group",
            RawKind::VirtualMachine => "virtual_machine",
            RawKind::VmSize => "vm_size",
            RawKind::Image => "image",
            RawKind::ManagedDisk => "managed_disk",
            RawKind::NetworkInterface => "network_interface",
            RawKind::PublicIpAddress => "public_ip_address",
            RawKind::VirtualNetwork => "virtual_network",
            RawKind::NetworkSecurityGroup => "network_security_group",
            RawKind::LoadBalancer => "load_balancer",
            RawKind::Deployment => "deployment",
            RawKind::DeploymentOperations => "deployment_operations",
            RawKind::DeploymentTemplate => "deployment_template",
        }
    }
}

impl fmt::Display for RawKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bounded provider collection used for list-and-filter lookups
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionScope {
    /// VM sizes offered in one location
    VmSizes {
        subscription: String,
        location: String,
    },
    /// Managed images in the subscription
    Images { subscription: String },
}

impl CollectionScope {
    /// Registry name of the collection
    pub fn name(&self) -> &'static str {
        match self {
            CollectionScope::VmSizes { .. } => "vm_sizes",
            CollectionScope::Images { .. } => "images",
        }
    }
}

impl fmt::Display for CollectionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionScope::VmSizes {
                subscription,
                location,
            } => write!(f, "vm_sizes({}/{})", subscription, location),
            CollectionScope::Images { subscription } => write!(f, "images({})", subscription),
        }
    }
}

/// How one scope entry is retrieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchPlan {
    /// Direct lookup by ARM id (provider casing is kept for the request)
    ById(String),
    /// List a collection and keep the first item whose `path` equals `value`
    /// (compared case-insensitively)
    ListAndFilter {
        scope: CollectionScope,
        path: &'static str,
        value: String,
    },
}

/// Identity of a scope entry. Overlapping requests share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    pub kind: RawKind,
    pub key: NaturalKey,
}

impl ScopeKey {
    pub fn new(kind: RawKind, key: impl AsRef<str>) -> Self {
        Self {
            kind,
            key: NaturalKey::new(key),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// One provider call the collector has to make
#[derive(Debug, Clone)]
pub struct ScopeEntry {
    pub key: ScopeKey,
    pub plan: FetchPlan,
    /// Number of relation hops from the named target
    pub depth: u32,
    /// Canonical entity this entry yields, when known up front
    pub entity: Option<EntityRef>,
    /// Named directly by a target (drives vanish removal)
    pub explicit: bool,
}

impl ScopeEntry {
    pub fn by_id(kind: RawKind, id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            key: ScopeKey::new(kind, &id),
            plan: FetchPlan::ById(id),
            depth: 0,
            entity: None,
            explicit: false,
        }
    }

    pub fn list_and_filter(
        kind: RawKind,
        key: impl AsRef<str>,
        scope: CollectionScope,
        path: &'static str,
        value: impl Into<String>,
    ) -> Self {
        Self {
            key: ScopeKey::new(kind, key),
            plan: FetchPlan::ListAndFilter {
                scope,
                path,
                value: value.into(),
            },
            depth: 0,
            entity: None,
            explicit: false,
        }
    }

    pub fn with_entity(mut self, entity: EntityRef) -> Self {
        self.entity = Some(entity);
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    pub fn explicit(mut self) -> Self {
        self.explicit = true;
        self
    }
}

/// A fetched raw payload
#[derive(Debug, Clone)]
pub struct RawResource {
    pub kind: RawKind,
    pub payload: Value,
}

/// Output of one collection pass
#[derive(Debug, Default)]
pub struct RawInventory {
    pub resources: BTreeMap<ScopeKey, RawResource>,
    /// Entries the provider reported as gone
    pub not_found: BTreeSet<ScopeKey>,
    /// The full expanded scope, including entries added by relation waves
    pub entries: BTreeMap<ScopeKey, ScopeEntry>,
}

impl RawInventory {
    pub fn of_kind(&self, kind: RawKind) -> impl Iterator<Item = (&ScopeKey, &RawResource)> {
        self.resources.iter().filter(move |(k, _)| k.kind == kind)
    }
}

/// Capability boundary to the cloud provider
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Fetch one resource; `Ok(None)` when the provider reports not found
    async fn fetch_by_id(&self, kind: RawKind, id: &str) -> Result<Option<Value>, ProviderError>;

    /// List every item of a bounded collection, following pagination
    async fn list_collection(&self, scope: &CollectionScope) -> Result<Vec<Value>, ProviderError>;
}
