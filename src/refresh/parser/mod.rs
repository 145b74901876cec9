//! Graph Builder
//!
//! Decodes every raw payload once into a [`ProviderResource`] and maps it to
//! canonical entities. Every edge comes from the owner's own payload; joins
//! across payloads only ever read resources fetched in the same pass (a VM
//! reading its NICs, a stack reading its operations).
//!
//! - [`compute`] - VMs, templates, flavors, resource groups
//! - [`network`] - NICs, public IPs, virtual networks, security groups, load balancers
//! - [`orchestration`] - Deployments and their templates, parameters, outputs, resources

pub mod compute;
pub mod network;
pub mod orchestration;
pub mod payload;

pub use payload::ProviderResource;

use crate::error::RefreshError;
use crate::inventory::{Attributes, EntityGraph, EntityKind, EntityRef, ManagerPair};
use crate::resource::{RawInventory, RawKind, ScopeKey};
use payload::{
    DeploymentPayload, ManagedDiskPayload, NicPayload, OperationPayload, PublicIpPayload,
    TemplatePayload, VmSizePayload,
};
use std::collections::BTreeMap;

pub(crate) const MB: i64 = 1024 * 1024;
pub(crate) const GB: i64 = 1024 * MB;

/// Lookup context shared by the per-domain mappers
pub struct Context<'a> {
    pub pair: &'a ManagerPair,
    resources: BTreeMap<ScopeKey, ProviderResource>,
}

impl<'a> Context<'a> {
    fn lookup(&self, kind: RawKind, key: &str) -> Option<&ProviderResource> {
        self.resources.get(&ScopeKey::new(kind, key))
    }

    pub fn vm_size(&self, location: &str, size: &str) -> Option<&VmSizePayload> {
        match self.lookup(RawKind::VmSize, &format!("{}/{}", location, size)) {
            Some(ProviderResource::VmSize(s)) => Some(s),
            _ => None,
        }
    }

    pub fn managed_disk(&self, id: &str) -> Option<&ManagedDiskPayload> {
        match self.lookup(RawKind::ManagedDisk, id) {
            Some(ProviderResource::ManagedDisk(d)) => Some(d),
            _ => None,
        }
    }

    pub fn nic(&self, id: &str) -> Option<&NicPayload> {
        match self.lookup(RawKind::NetworkInterface, id) {
            Some(ProviderResource::NetworkInterface(n)) => Some(n),
            _ => None,
        }
    }

    pub fn public_ip(&self, id: &str) -> Option<&PublicIpPayload> {
        match self.lookup(RawKind::PublicIpAddress, id) {
            Some(ProviderResource::PublicIpAddress(p)) => Some(p),
            _ => None,
        }
    }

    pub fn operations(&self, deployment: &DeploymentPayload) -> Option<&[OperationPayload]> {
        match self.lookup(RawKind::DeploymentOperations, &deployment.id) {
            Some(ProviderResource::DeploymentOperations(ops)) => Some(ops),
            _ => None,
        }
    }

    pub fn template(&self, deployment: &DeploymentPayload) -> Option<&TemplatePayload> {
        match self.lookup(RawKind::DeploymentTemplate, &deployment.id) {
            Some(ProviderResource::DeploymentTemplate(t)) => Some(t),
            _ => None,
        }
    }

    /// The manager's availability zone, inserted on first use
    pub fn availability_zone(&self, graph: &mut EntityGraph) -> EntityRef {
        let region = self.pair.region();
        let zone = EntityRef::new(EntityKind::AvailabilityZone, region);
        if !graph.contains(&zone) {
            graph.insert_node(
                zone.clone(),
                Attributes::new()
                    .with("name", self.pair.cloud.name.as_str())
                    .with("ems_ref", region),
            );
        }
        zone
    }
}

pub(crate) fn malformed(kind: RawKind, id: &str, reason: impl Into<String>) -> RefreshError {
    RefreshError::MalformedResource {
        kind: kind.to_string(),
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Build the canonical graph for one collection pass
pub fn parse(raw: &RawInventory, pair: &ManagerPair) -> EntityGraph {
    let mut graph = EntityGraph::new();
    let mut resources = BTreeMap::new();

    for (key, resource) in &raw.resources {
        match ProviderResource::decode(resource.kind, &resource.payload) {
            Ok(decoded) => {
                resources.insert(key.clone(), decoded);
            }
            Err(e) => {
                let error = malformed(resource.kind, key.key.as_str(), e.to_string());
                tracing::warn!("Dropping resource: {}", error);
                graph.warnings.push(error);
            }
        }
    }

    let ctx = Context { pair, resources };
    for (key, resource) in &ctx.resources {
        let result = match resource {
            ProviderResource::ResourceGroup(rg) => compute::resource_group(&mut graph, rg),
            ProviderResource::VirtualMachine(vm) => compute::virtual_machine(&ctx, &mut graph, vm),
            ProviderResource::VmSize(size) => compute::flavor(&mut graph, size),
            ProviderResource::Image(image) => compute::template(&mut graph, image),
            ProviderResource::NetworkInterface(nic) => network::network_port(&mut graph, nic),
            ProviderResource::PublicIpAddress(ip) => network::floating_ip(&mut graph, ip),
            ProviderResource::VirtualNetwork(vnet) => network::cloud_network(&ctx, &mut graph, vnet),
            ProviderResource::NetworkSecurityGroup(nsg) => network::security_group(&mut graph, nsg),
            ProviderResource::LoadBalancer(lb) => network::load_balancer(&mut graph, lb),
            ProviderResource::Deployment(deployment) => {
                orchestration::stack(&ctx, &mut graph, deployment)
            }
            // Read through their owners only
            ProviderResource::ManagedDisk(_)
            | ProviderResource::DeploymentOperations(_)
            | ProviderResource::DeploymentTemplate(_) => Ok(()),
        };
        if let Err(error) = result {
            tracing::warn!("Dropping {}: {}", key, error);
            graph.warnings.push(error);
        }
    }

    for key in &raw.not_found {
        let Some(entry) = raw.entries.get(key) else {
            continue;
        };
        let Some(entity) = entry.entity.clone() else {
            continue;
        };
        if entry.explicit {
            graph.vanished.insert(entity);
        } else {
            graph.absent.insert(entity);
        }
    }

    tracing::info!(
        "Parsed {} resources into {} entities ({} warnings)",
        raw.resources.len(),
        graph.nodes.len(),
        graph.warnings.len()
    );
    graph
}
