//! Reverse traversals
//!
//! Back-references (VM to stack, stack to parent, floating IP to VM,
//! listener to VMs) are never stored on the referenced side. They are
//! answered here by walking owned associations backwards.

use super::store::{InventoryStore, RecordKey};
use super::{EntityKind, Relation};
use crate::error::StoreResult;
use std::collections::BTreeSet;

fn single(keys: BTreeSet<RecordKey>) -> Option<RecordKey> {
    keys.into_iter().next()
}

/// Stack whose resources created this VM
pub fn vm_orchestration_stack(
    store: &dyn InventoryStore,
    vm: &RecordKey,
) -> StoreResult<Option<RecordKey>> {
    Ok(single(store.referrers(vm, Relation::Vms)?))
}

/// Parent of a nested stack
pub fn stack_parent(store: &dyn InventoryStore, stack: &RecordKey) -> StoreResult<Option<RecordKey>> {
    Ok(single(store.referrers(stack, Relation::Children)?))
}

/// Stack that created this cloud network
pub fn cloud_network_orchestration_stack(
    store: &dyn InventoryStore,
    network: &RecordKey,
) -> StoreResult<Option<RecordKey>> {
    Ok(single(store.referrers(network, Relation::CloudNetworks)?))
}

/// Network ports whose device is this VM or load balancer
pub fn device_ports(store: &dyn InventoryStore, device: &RecordKey) -> StoreResult<BTreeSet<RecordKey>> {
    store.referrers(device, Relation::Device)
}

/// Floating IPs attached to any port of this VM
pub fn vm_floating_ips(store: &dyn InventoryStore, vm: &RecordKey) -> StoreResult<BTreeSet<RecordKey>> {
    let mut out = BTreeSet::new();
    for port in device_ports(store, vm)? {
        out.extend(
            store
                .referrers(&port, Relation::NetworkPort)?
                .into_iter()
                .filter(|k| k.kind == EntityKind::FloatingIp),
        );
    }
    Ok(out)
}

/// Cloud networks reachable through this VM's ports and subnets
pub fn vm_cloud_networks(store: &dyn InventoryStore, vm: &RecordKey) -> StoreResult<BTreeSet<RecordKey>> {
    let mut out = BTreeSet::new();
    for port in device_ports(store, vm)? {
        for subnet in store.association(&port, Relation::CloudSubnets)? {
            out.extend(store.referrers(&subnet, Relation::CloudSubnets)?);
        }
    }
    Ok(out)
}

/// Existing VMs owning the network ports of these pool members
fn member_vms(
    store: &dyn InventoryStore,
    members: impl IntoIterator<Item = RecordKey>,
) -> StoreResult<BTreeSet<RecordKey>> {
    let mut out = BTreeSet::new();
    for member in members {
        for port in store.association(&member, Relation::NetworkPort)? {
            for device in store.association(&port, Relation::Device)? {
                if device.kind == EntityKind::VmOrTemplate && store.get(&device)?.is_some() {
                    out.insert(device);
                }
            }
        }
    }
    Ok(out)
}

fn pool_members(
    store: &dyn InventoryStore,
    pools: impl IntoIterator<Item = RecordKey>,
) -> StoreResult<Vec<RecordKey>> {
    let mut members = Vec::new();
    for pool in pools {
        members.extend(store.association(&pool, Relation::Members)?);
    }
    Ok(members)
}

/// VMs behind a listener, derived through its pools' members
pub fn listener_vms(store: &dyn InventoryStore, listener: &RecordKey) -> StoreResult<BTreeSet<RecordKey>> {
    let pools = store.association(listener, Relation::Pools)?;
    member_vms(store, pool_members(store, pools)?)
}

/// VMs behind any pool of a load balancer
pub fn load_balancer_vms(store: &dyn InventoryStore, lb: &RecordKey) -> StoreResult<BTreeSet<RecordKey>> {
    let pools = store.association(lb, Relation::Pools)?;
    member_vms(store, pool_members(store, pools)?)
}

/// VMs probed by a health check
pub fn health_check_vms(store: &dyn InventoryStore, check: &RecordKey) -> StoreResult<BTreeSet<RecordKey>> {
    member_vms(store, store.association(check, Relation::Members)?)
}
