//! Orchestration stacks
//!
//! A deployment is a stack. Its operations become stack resources and also
//! yield the stack's edges to the VMs, networks, load balancers, security
//! groups and nested deployments it created. Templates are content
//! addressed, so stacks deployed from the same template share one record.

use super::payload::{DeploymentPayload, OperationPayload, TemplatePayload};
use super::{malformed, Context};
use crate::error::RefreshError;
use crate::identity::{vm_key, ArmResourceId, NaturalKey};
use crate::inventory::{Attributes, EntityGraph, EntityKind, EntityRef, Relation};
use crate::resource::path::value_to_string;
use crate::resource::{kind_for_arm_type, RawKind};
use chrono::{DateTime, FixedOffset};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub fn stack(ctx: &Context, graph: &mut EntityGraph, deployment: &DeploymentPayload) -> Result<(), RefreshError> {
    let id = ArmResourceId::parse(&deployment.id)
        .ok_or_else(|| malformed(RawKind::Deployment, &deployment.id, "unparseable id"))?;
    let props = &deployment.properties;
    let entity = EntityRef::new(EntityKind::OrchestrationStack, &deployment.id);

    graph.insert_node(
        entity.clone(),
        Attributes::new()
            .with("name", deployment.name.as_str())
            .with("description", deployment.name.as_str())
            .with("ems_ref", deployment.id.as_str())
            .with("status", props.provisioning_state.clone())
            .with("status_reason", props.error.as_ref().and_then(|e| e.message.clone()))
            .with("resource_group", id.resource_group.clone()),
    );

    graph.declare(&entity, Relation::Parameters);
    for (name, param) in &props.parameters {
        let ems_ref = format!("{}\\{}", deployment.id, name);
        let node = EntityRef::new(EntityKind::OrchestrationStackParameter, &ems_ref);
        graph.insert_node(
            node.clone(),
            Attributes::new()
                .with("name", name.as_str())
                .with("value", value_to_string(&param.value))
                .with("ems_ref", ems_ref.as_str()),
        );
        graph.link(&entity, Relation::Parameters, node);
    }

    graph.declare(&entity, Relation::Outputs);
    for (key, output) in &props.outputs {
        let ems_ref = format!("{}\\{}", deployment.id, key);
        let node = EntityRef::new(EntityKind::OrchestrationStackOutput, &ems_ref);
        graph.insert_node(
            node.clone(),
            Attributes::new()
                .with("key", key.as_str())
                .with("value", value_to_string(&output.value))
                .with("description", key.as_str())
                .with("ems_ref", ems_ref.as_str()),
        );
        graph.link(&entity, Relation::Outputs, node);
    }

    if let Some(template) = ctx.template(deployment) {
        let node = orchestration_template(graph, deployment, template)?;
        graph.link(&entity, Relation::Template, node);
    }

    if let Some(operations) = ctx.operations(deployment) {
        resources(graph, &entity, operations);
    }
    Ok(())
}

fn orchestration_template(
    graph: &mut EntityGraph,
    deployment: &DeploymentPayload,
    template: &TemplatePayload,
) -> Result<EntityRef, RefreshError> {
    let content = serde_json::to_string(&template.template)
        .map_err(|e| malformed(RawKind::DeploymentTemplate, &deployment.id, e.to_string()))?;
    let hash = format!("{:x}", Sha256::digest(content.as_bytes()));
    let version = template
        .template
        .get("contentVersion")
        .map(value_to_string)
        .unwrap_or_default();

    let node = EntityRef::new(EntityKind::OrchestrationTemplate, &hash);
    graph.insert_node(
        node.clone(),
        Attributes::new()
            .with("name", deployment.name.as_str())
            .with("description", format!("contentVersion: {}", version))
            .with("content", content)
            .with("content_hash", hash.as_str())
            .with("ems_ref", hash.as_str()),
    );
    Ok(node)
}

fn timestamp(op: &OperationPayload) -> Option<DateTime<FixedOffset>> {
    op.properties
        .timestamp
        .as_deref()
        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
}

/// Keep the latest operation per target resource
fn latest_per_target(operations: &[OperationPayload]) -> BTreeMap<NaturalKey, &OperationPayload> {
    let mut latest: BTreeMap<NaturalKey, &OperationPayload> = BTreeMap::new();
    for op in operations {
        let Some(target) = &op.properties.target_resource else {
            continue;
        };
        let key = NaturalKey::new(&target.id);
        match latest.get(&key) {
            Some(existing) if timestamp(existing) >= timestamp(op) => {}
            _ => {
                latest.insert(key, op);
            }
        }
    }
    latest
}

fn resources(graph: &mut EntityGraph, stack: &EntityRef, operations: &[OperationPayload]) {
    for relation in [
        Relation::Resources,
        Relation::Children,
        Relation::Vms,
        Relation::CloudNetworks,
        Relation::LoadBalancers,
        Relation::SecurityGroups,
    ] {
        graph.declare(stack, relation);
    }

    for op in latest_per_target(operations).into_values() {
        let props = &op.properties;
        let Some(target) = &props.target_resource else {
            continue;
        };
        let reason = props
            .status_code
            .clone()
            .or_else(|| props.status_message.as_ref().map(value_to_string));

        let node = EntityRef::new(EntityKind::OrchestrationStackResource, &target.id);
        graph.insert_node(
            node.clone(),
            Attributes::new()
                .with("name", target.resource_name.clone())
                .with("logical_resource", target.resource_name.clone())
                .with("physical_resource", props.tracking_id.clone())
                .with("resource_category", target.resource_type.clone())
                .with("resource_status", props.provisioning_state.clone())
                .with("resource_status_reason", reason)
                .with("ems_ref", target.id.as_str()),
        );
        graph.link(stack, Relation::Resources, node);

        let Some(id) = ArmResourceId::parse(&target.id) else {
            continue;
        };
        let kind = id.resource_type().and_then(|t| kind_for_arm_type(&t));
        let edge = match kind {
            Some(RawKind::VirtualMachine) => vm_key(&id)
                .map(|key| (Relation::Vms, EntityRef::new(EntityKind::VmOrTemplate, key))),
            Some(RawKind::VirtualNetwork) => {
                Some((Relation::CloudNetworks, EntityRef::new(EntityKind::CloudNetwork, &target.id)))
            }
            Some(RawKind::LoadBalancer) => {
                Some((Relation::LoadBalancers, EntityRef::new(EntityKind::LoadBalancer, &target.id)))
            }
            Some(RawKind::NetworkSecurityGroup) => {
                Some((Relation::SecurityGroups, EntityRef::new(EntityKind::SecurityGroup, &target.id)))
            }
            Some(RawKind::Deployment) => {
                Some((Relation::Children, EntityRef::new(EntityKind::OrchestrationStack, &target.id)))
            }
            _ => None,
        };
        if let Some((relation, target)) = edge {
            graph.link(stack, relation, target);
        }
    }
}
