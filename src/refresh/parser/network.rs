//! Network entities
//!
//! The load balancer aggregate is built purely from the LB payload: listener
//! to pool to member to NIC port. The VM behind a port comes from the NIC's
//! own `virtualMachine` reference.

use super::payload::{LbPayload, NicPayload, NsgPayload, PublicIpPayload, VnetPayload};
use super::{malformed, Context};
use crate::error::RefreshError;
use crate::identity::{parent_id, vm_key, ArmResourceId};
use crate::inventory::{Attributes, EntityGraph, EntityKind, EntityRef, Relation};
use crate::resource::{kind_for_arm_type, RawKind};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Attribute value for a port range `start..end` (end exclusive)
pub fn port_range(port: Option<i64>) -> Value {
    match port {
        Some(p) => json!({"start": p, "end": p.saturating_add(1)}),
        None => Value::Null,
    }
}

/// Parse an NSG port spec (`22`, `80-90`, `*`) into `(port, end_port)`
pub fn port_bounds(spec: Option<&str>) -> (Option<i64>, Option<i64>) {
    let Some(spec) = spec.map(str::trim).filter(|s| *s != "*" && !s.is_empty()) else {
        return (None, None);
    };
    match spec.split_once('-') {
        Some((start, end)) => (start.trim().parse().ok(), end.trim().parse().ok()),
        None => {
            let port = spec.parse().ok();
            (port, port)
        }
    }
}

fn vm_entity(id: &str) -> Option<EntityRef> {
    let id = ArmResourceId::parse(id)?;
    vm_key(&id).map(|key| EntityRef::new(EntityKind::VmOrTemplate, key))
}

pub fn network_port(graph: &mut EntityGraph, nic: &NicPayload) -> Result<(), RefreshError> {
    let props = &nic.properties;
    let port = EntityRef::new(EntityKind::NetworkPort, &nic.id);
    graph.insert_node(
        port.clone(),
        Attributes::new()
            .with("name", nic.name.as_str())
            .with("ems_ref", nic.id.as_str())
            .with("status", props.provisioning_state.clone())
            .with("mac_address", props.mac_address.clone())
            .with("device_type", "VmOrTemplate"),
    );

    graph.declare(&port, Relation::Device);
    if let Some(vm) = props.virtual_machine.as_ref().and_then(|r| vm_entity(&r.id)) {
        graph.link(&port, Relation::Device, vm);
    }

    graph.declare(&port, Relation::CloudSubnets);
    for config in &props.ip_configurations {
        if let Some(subnet) = &config.properties.subnet {
            graph.link(&port, Relation::CloudSubnets, EntityRef::new(EntityKind::CloudSubnet, &subnet.id));
        }
    }

    graph.declare(&port, Relation::SecurityGroups);
    if let Some(nsg) = &props.network_security_group {
        graph.link(&port, Relation::SecurityGroups, EntityRef::new(EntityKind::SecurityGroup, &nsg.id));
    }
    Ok(())
}

pub fn floating_ip(graph: &mut EntityGraph, ip: &PublicIpPayload) -> Result<(), RefreshError> {
    let props = &ip.properties;
    let entity = EntityRef::new(EntityKind::FloatingIp, &ip.id);
    let address = props.ip_address.clone().unwrap_or_else(|| ip.name.clone());
    graph.insert_node(
        entity.clone(),
        Attributes::new()
            .with("ems_ref", ip.id.as_str())
            .with("address", address)
            .with("status", props.provisioning_state.clone()),
    );

    // NIC ip configurations attach to the NIC port; LB frontends are ports
    // themselves
    graph.declare(&entity, Relation::NetworkPort);
    if let Some(config) = &props.ip_configuration {
        let port_key = match parent_id(&config.id) {
            Some(parent) if is_kind(&parent, RawKind::LoadBalancer) => Some(config.id.clone()),
            Some(parent) => Some(parent),
            None => None,
        };
        if let Some(key) = port_key {
            graph.link(&entity, Relation::NetworkPort, EntityRef::new(EntityKind::NetworkPort, key));
        }
    }
    Ok(())
}

fn is_kind(id: &str, kind: RawKind) -> bool {
    ArmResourceId::parse(id)
        .and_then(|id| id.resource_type())
        .and_then(|t| kind_for_arm_type(&t))
        == Some(kind)
}

pub fn cloud_network(ctx: &Context, graph: &mut EntityGraph, vnet: &VnetPayload) -> Result<(), RefreshError> {
    let props = &vnet.properties;
    let network = EntityRef::new(EntityKind::CloudNetwork, &vnet.id);
    let cidr = props
        .address_space
        .as_ref()
        .and_then(|s| s.address_prefixes.first().cloned());
    graph.insert_node(
        network.clone(),
        Attributes::new()
            .with("name", vnet.name.as_str())
            .with("ems_ref", vnet.id.as_str())
            .with("cidr", cidr)
            .with("enabled", true),
    );

    graph.declare(&network, Relation::CloudSubnets);
    for subnet in &props.subnets {
        let entity = EntityRef::new(EntityKind::CloudSubnet, &subnet.id);
        graph.insert_node(
            entity.clone(),
            Attributes::new()
                .with("name", subnet.name.as_str())
                .with("ems_ref", subnet.id.as_str())
                .with("cidr", subnet.properties.address_prefix.clone()),
        );
        let zone = ctx.availability_zone(graph);
        graph.link(&entity, Relation::AvailabilityZone, zone);
        graph.link(&network, Relation::CloudSubnets, entity);
    }
    Ok(())
}

pub fn security_group(graph: &mut EntityGraph, nsg: &NsgPayload) -> Result<(), RefreshError> {
    let group = ArmResourceId::parse(&nsg.id)
        .and_then(|id| id.resource_group)
        .ok_or_else(|| malformed(RawKind::NetworkSecurityGroup, &nsg.id, "id has no resource group"))?;
    let entity = EntityRef::new(EntityKind::SecurityGroup, &nsg.id);
    graph.insert_node(
        entity.clone(),
        Attributes::new()
            .with("name", nsg.name.as_str())
            .with("ems_ref", nsg.id.as_str())
            .with(
                "description",
                format!("{}-{}", group, nsg.location.as_deref().unwrap_or_default()),
            ),
    );

    graph.declare(&entity, Relation::FirewallRules);
    for rule in &nsg.properties.security_rules {
        let props = &rule.properties;
        let (port, end_port) = port_bounds(props.destination_port_range.as_deref());
        let node = EntityRef::new(EntityKind::FirewallRule, &rule.id);
        graph.insert_node(
            node.clone(),
            Attributes::new()
                .with("name", rule.name.as_str())
                .with("ems_ref", rule.id.as_str())
                .with("host_protocol", props.protocol.as_deref().map(str::to_uppercase))
                .with("direction", props.direction.clone())
                .with("access", props.access.clone())
                .with("port", port)
                .with("end_port", end_port)
                .with("source_ip_range", props.source_address_prefix.clone())
                .with("priority", props.priority),
        );
        graph.link(&entity, Relation::FirewallRules, node);
    }
    Ok(())
}

pub fn load_balancer(graph: &mut EntityGraph, lb: &LbPayload) -> Result<(), RefreshError> {
    let props = &lb.properties;
    let entity = EntityRef::new(EntityKind::LoadBalancer, &lb.id);
    graph.insert_node(
        entity.clone(),
        Attributes::new()
            .with("name", lb.name.as_str())
            .with("ems_ref", lb.id.as_str()),
    );

    // Frontend ip configurations are the LB's own ports
    graph.declare(&entity, Relation::NetworkPorts);
    for frontend in &props.frontend_ip_configurations {
        let port = EntityRef::new(EntityKind::NetworkPort, &frontend.id);
        graph.insert_node(
            port.clone(),
            Attributes::new()
                .with("name", frontend.name.as_str())
                .with("ems_ref", frontend.id.as_str())
                .with("device_type", "LoadBalancer"),
        );
        graph.link(&port, Relation::Device, entity.clone());
        graph.declare(&port, Relation::CloudSubnets);
        if let Some(subnet) = &frontend.properties.subnet {
            graph.link(&port, Relation::CloudSubnets, EntityRef::new(EntityKind::CloudSubnet, &subnet.id));
        }
        graph.declare(&port, Relation::SecurityGroups);
        graph.link(&entity, Relation::NetworkPorts, port);
    }

    graph.declare(&entity, Relation::Pools);
    let mut pool_members: BTreeMap<EntityRef, BTreeSet<EntityRef>> = BTreeMap::new();
    for pool in &props.backend_address_pools {
        let node = EntityRef::new(EntityKind::LoadBalancerPool, &pool.id);
        graph.insert_node(
            node.clone(),
            Attributes::new()
                .with("name", pool.name.as_str())
                .with("ems_ref", pool.id.as_str()),
        );
        graph.declare(&node, Relation::Members);

        let members = pool_members.entry(node.clone()).or_default();
        for config in &pool.properties.backend_ip_configurations {
            let member = EntityRef::new(EntityKind::LoadBalancerPoolMember, &config.id);
            graph.insert_node(
                member.clone(),
                Attributes::new().with("ems_ref", config.id.as_str()),
            );
            graph.declare(&member, Relation::NetworkPort);
            if let Some(nic) = parent_id(&config.id) {
                graph.link(&member, Relation::NetworkPort, EntityRef::new(EntityKind::NetworkPort, nic));
            }
            graph.link(&node, Relation::Members, member.clone());
            members.insert(member);
        }
        graph.link(&entity, Relation::Pools, node);
    }

    graph.declare(&entity, Relation::Listeners);
    let mut probe_members: BTreeMap<EntityRef, BTreeSet<EntityRef>> = BTreeMap::new();
    for rule in &props.load_balancing_rules {
        let rp = &rule.properties;
        let listener = EntityRef::new(EntityKind::LoadBalancerListener, &rule.id);
        graph.insert_node(
            listener.clone(),
            Attributes::new()
                .with("name", rule.name.as_str())
                .with("ems_ref", rule.id.as_str())
                .with("load_balancer_protocol", rp.protocol.clone())
                .with("load_balancer_port_range", port_range(rp.frontend_port))
                .with("instance_protocol", rp.protocol.clone())
                .with("instance_port_range", port_range(rp.backend_port)),
        );

        graph.declare(&listener, Relation::Pools);
        let pool = rp
            .backend_address_pool
            .as_ref()
            .map(|p| EntityRef::new(EntityKind::LoadBalancerPool, &p.id));
        if let Some(pool) = &pool {
            graph.link(&listener, Relation::Pools, pool.clone());
        }

        graph.declare(&listener, Relation::HealthChecks);
        if let Some(probe) = &rp.probe {
            let check = EntityRef::new(EntityKind::LoadBalancerHealthCheck, &probe.id);
            graph.link(&listener, Relation::HealthChecks, check.clone());
            let members = probe_members.entry(check).or_default();
            if let Some(found) = pool.as_ref().and_then(|p| pool_members.get(p)) {
                members.extend(found.iter().cloned());
            }
        }
        graph.link(&entity, Relation::Listeners, listener);
    }

    graph.declare(&entity, Relation::HealthChecks);
    for probe in &props.probes {
        let pp = &probe.properties;
        let check = EntityRef::new(EntityKind::LoadBalancerHealthCheck, &probe.id);
        graph.insert_node(
            check.clone(),
            Attributes::new()
                .with("name", probe.name.as_str())
                .with("ems_ref", probe.id.as_str())
                .with("protocol", pp.protocol.clone())
                .with("port", pp.port)
                .with("url_path", pp.request_path.clone())
                .with("interval", pp.interval_in_seconds)
                .with("unhealthy_threshold", pp.number_of_probes),
        );
        graph.declare(&check, Relation::Members);
        for member in probe_members.remove(&check).unwrap_or_default() {
            graph.link(&check, Relation::Members, member);
        }
        graph.link(&entity, Relation::HealthChecks, check);
    }
    Ok(())
}
