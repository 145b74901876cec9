//! Cascade Scheduler
//!
//! Edges to targetable entities that this pass did not collect become
//! queued follow-up targets. The queue coalesces duplicates, so scheduling
//! the same entity twice is harmless.

use super::resolver::ScopeDescriptor;
use crate::identity::ArmResourceId;
use crate::inventory::{EntityGraph, EntityKind, EntityRef, QueueItem, WorkQueue};
use crate::resource::{kind_for_arm_type, RawKind};
use crate::target::{Association, Target};
use std::collections::BTreeSet;

/// Association a follow-up for `entity` is filed under, if it is targetable
pub fn association_for(entity: &EntityRef) -> Option<Association> {
    Some(match entity.kind {
        EntityKind::VmOrTemplate if entity.key.as_str().starts_with("https://") => {
            Association::MiqTemplates
        }
        EntityKind::VmOrTemplate => Association::Vms,
        EntityKind::LoadBalancer => Association::LoadBalancers,
        EntityKind::OrchestrationStack => Association::OrchestrationStacks,
        EntityKind::CloudNetwork => Association::CloudNetworks,
        EntityKind::SecurityGroup => Association::SecurityGroups,
        // LB frontend ports live and die with their load balancer
        EntityKind::NetworkPort if is_interface(entity) => Association::NetworkPorts,
        _ => return None,
    })
}

fn is_interface(entity: &EntityRef) -> bool {
    ArmResourceId::parse(entity.key.as_str())
        .and_then(|id| id.resource_type())
        .and_then(|t| kind_for_arm_type(&t))
        == Some(RawKind::NetworkInterface)
}

/// Follow-up items for every referenced entity whose own state was not
/// collected in this pass
pub fn schedule_followups(graph: &EntityGraph, scope: &ScopeDescriptor) -> Vec<QueueItem> {
    let mut seen = BTreeSet::new();
    let mut items = Vec::new();

    for ((owner, relation), targets) in &graph.edges {
        for target in targets {
            let Some(association) = association_for(target) else {
                continue;
            };
            if graph.contains(target) || graph.absent.contains(target) || graph.vanished.contains(target) {
                continue;
            }
            if !seen.insert(target.clone()) {
                continue;
            }
            let followup = Target::new(scope.pair.cloud.id, association.as_str(), target.key.as_str());
            items.push(QueueItem::new(followup, format!("{} of {}", relation, owner)));
        }
    }
    items
}

/// Enqueue follow-ups. A queue failure is logged and never fails the
/// refresh that produced the items.
pub fn enqueue(queue: &dyn WorkQueue, items: Vec<QueueItem>) -> usize {
    let mut enqueued = 0;
    for item in items {
        let target = item.target();
        match queue.enqueue(item) {
            Ok(true) => {
                tracing::debug!("Queued follow-up {}", target);
                enqueued += 1;
            }
            Ok(false) => tracing::trace!("Follow-up {} already queued", target),
            Err(e) => tracing::warn!("Failed to queue follow-up {}: {}", target, e),
        }
    }
    enqueued
}
