//! Refresh targets
//!
//! A target names one entity by manager, association and natural-key
//! reference. Targets are never persisted; a queued follow-up stores the
//! same three fields and turns back into a target when it is drained.

use crate::error::RefreshError;
use crate::inventory::{EntityKind, ManagerId};
use crate::resource::RawKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A request to refresh one entity and its dependency closure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub manager: ManagerId,
    pub association: String,
    pub natural_key: String,
}

impl Target {
    pub fn new(manager: ManagerId, association: &str, natural_key: &str) -> Self {
        Self {
            manager,
            association: association.to_string(),
            natural_key: natural_key.to_string(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}={}", self.manager, self.association, self.natural_key)
    }
}

/// Supported target associations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Association {
    Vms,
    MiqTemplates,
    LoadBalancers,
    OrchestrationStacks,
    CloudNetworks,
    SecurityGroups,
    NetworkPorts,
}

impl Association {
    pub const ALL: &'static [Association] = &[
        Association::Vms,
        Association::MiqTemplates,
        Association::LoadBalancers,
        Association::OrchestrationStacks,
        Association::CloudNetworks,
        Association::SecurityGroups,
        Association::NetworkPorts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Association::Vms => "vms",
            Association::MiqTemplates => "miq_templates",
            Association::LoadBalancers => "load_balancers",
            Association::OrchestrationStacks => "orchestration_stacks",
            Association::CloudNetworks => "cloud_networks",
            Association::SecurityGroups => "security_groups",
            Association::NetworkPorts => "network_ports",
        }
    }

    /// Canonical kind of the targeted entity
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            Association::Vms | Association::MiqTemplates => EntityKind::VmOrTemplate,
            Association::LoadBalancers => EntityKind::LoadBalancer,
            Association::OrchestrationStacks => EntityKind::OrchestrationStack,
            Association::CloudNetworks => EntityKind::CloudNetwork,
            Association::SecurityGroups => EntityKind::SecurityGroup,
            Association::NetworkPorts => EntityKind::NetworkPort,
        }
    }

    /// Raw kind fetched for the target
    pub fn raw_kind(&self) -> RawKind {
        match self {
            Association::Vms => RawKind::VirtualMachine,
            Association::MiqTemplates => RawKind::Image,
            Association::LoadBalancers => RawKind::LoadBalancer,
            Association::OrchestrationStacks => RawKind::Deployment,
            Association::CloudNetworks => RawKind::VirtualNetwork,
            Association::SecurityGroups => RawKind::NetworkSecurityGroup,
            Association::NetworkPorts => RawKind::NetworkInterface,
        }
    }
}

impl FromStr for Association {
    type Err = RefreshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Association::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| RefreshError::UnknownAssociation(s.to_string()))
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A target refused before collection, with the reason
#[derive(Debug)]
pub struct RejectedTarget {
    pub target: Target,
    pub error: RefreshError,
}
