//! Declared relations between raw kinds
//!
//! Scope expansion never walks a payload generically. Each row names the
//! source kind, the dot path holding the reference, how to turn the value
//! into a target id, which kinds it may point at, and whether the target is
//! fetched in the same pass or left to the cascade scheduler.

use super::RawKind;

/// Whether a relation is expanded in-pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Follow {
    /// Fetch the target in the next collector wave
    Fetch,
    /// Leave the target for a queued follow-up refresh
    Defer,
}

/// How the extracted value becomes the target's identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTransform {
    /// The value is the target's ARM id
    Id,
    /// The value is the ARM id of a child of the target
    ParentId,
    /// The value is the source's own id; the target is its resource group
    ResourceGroup,
    /// The value is a VM size name, looked up in the source's location
    VmSize,
    /// The target is addressed by the source's own id
    SameId,
}

#[derive(Debug, Clone, Copy)]
pub struct DeclaredRelation {
    pub name: &'static str,
    pub from: RawKind,
    pub path: &'static str,
    pub transform: RefTransform,
    pub accepts: &'static [RawKind],
    pub follow: Follow,
}

const OPERATION_TARGET: &str = "*.properties.targetResource.id";

pub static RELATIONS: &[DeclaredRelation] = &[
    // Virtual machines
    DeclaredRelation {
        name: "vm_resource_group",
        from: RawKind::VirtualMachine,
        path: "id",
        transform: RefTransform::ResourceGroup,
        accepts: &[RawKind::ResourceGroup],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "vm_size",
        from: RawKind::VirtualMachine,
        path: "properties.hardwareProfile.vmSize",
        transform: RefTransform::VmSize,
        accepts: &[RawKind::VmSize],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "vm_network_interfaces",
        from: RawKind::VirtualMachine,
        path: "properties.networkProfile.networkInterfaces.*.id",
        transform: RefTransform::Id,
        accepts: &[RawKind::NetworkInterface],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "vm_os_managed_disk",
        from: RawKind::VirtualMachine,
        path: "properties.storageProfile.osDisk.managedDisk.id",
        transform: RefTransform::Id,
        accepts: &[RawKind::ManagedDisk],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "vm_data_managed_disks",
        from: RawKind::VirtualMachine,
        path: "properties.storageProfile.dataDisks.*.managedDisk.id",
        transform: RefTransform::Id,
        accepts: &[RawKind::ManagedDisk],
        follow: Follow::Fetch,
    },
    // Images
    DeclaredRelation {
        name: "image_resource_group",
        from: RawKind::Image,
        path: "id",
        transform: RefTransform::ResourceGroup,
        accepts: &[RawKind::ResourceGroup],
        follow: Follow::Fetch,
    },
    // Network interfaces
    DeclaredRelation {
        name: "nic_public_ips",
        from: RawKind::NetworkInterface,
        path: "properties.ipConfigurations.*.properties.publicIPAddress.id",
        transform: RefTransform::Id,
        accepts: &[RawKind::PublicIpAddress],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "nic_virtual_networks",
        from: RawKind::NetworkInterface,
        path: "properties.ipConfigurations.*.properties.subnet.id",
        transform: RefTransform::ParentId,
        accepts: &[RawKind::VirtualNetwork],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "nic_security_group",
        from: RawKind::NetworkInterface,
        path: "properties.networkSecurityGroup.id",
        transform: RefTransform::Id,
        accepts: &[RawKind::NetworkSecurityGroup],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "nic_virtual_machine",
        from: RawKind::NetworkInterface,
        path: "properties.virtualMachine.id",
        transform: RefTransform::Id,
        accepts: &[RawKind::VirtualMachine],
        follow: Follow::Defer,
    },
    // Load balancers
    DeclaredRelation {
        name: "lb_public_ips",
        from: RawKind::LoadBalancer,
        path: "properties.frontendIPConfigurations.*.properties.publicIPAddress.id",
        transform: RefTransform::Id,
        accepts: &[RawKind::PublicIpAddress],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "lb_backend_interfaces",
        from: RawKind::LoadBalancer,
        path: "properties.backendAddressPools.*.properties.backendIPConfigurations.*.id",
        transform: RefTransform::ParentId,
        accepts: &[RawKind::NetworkInterface],
        follow: Follow::Defer,
    },
    // Deployments
    DeclaredRelation {
        name: "deployment_operations",
        from: RawKind::Deployment,
        path: "id",
        transform: RefTransform::SameId,
        accepts: &[RawKind::DeploymentOperations],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "deployment_template",
        from: RawKind::Deployment,
        path: "id",
        transform: RefTransform::SameId,
        accepts: &[RawKind::DeploymentTemplate],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "operation_resources",
        from: RawKind::DeploymentOperations,
        path: OPERATION_TARGET,
        transform: RefTransform::Id,
        accepts: &[
            RawKind::VirtualMachine,
            RawKind::VirtualNetwork,
            RawKind::LoadBalancer,
            RawKind::Deployment,
        ],
        follow: Follow::Fetch,
    },
    DeclaredRelation {
        name: "operation_deferred_resources",
        from: RawKind::DeploymentOperations,
        path: OPERATION_TARGET,
        transform: RefTransform::Id,
        accepts: &[RawKind::NetworkSecurityGroup],
        follow: Follow::Defer,
    },
];

/// Relations declared on a source kind
pub fn relations_from(kind: RawKind) -> impl Iterator<Item = &'static DeclaredRelation> {
    RELATIONS.iter().filter(move |r| r.from == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_relation_names_are_unique() {
        let mut seen = HashSet::new();
        for relation in RELATIONS {
            assert!(seen.insert(relation.name), "duplicate {}", relation.name);
            assert!(!relation.accepts.is_empty());
        }
    }

    #[test]
    fn test_fetch_and_defer_targets_do_not_overlap() {
        for a in RELATIONS {
            for b in RELATIONS {
                if a.from == b.from && a.path == b.path && a.follow != b.follow {
                    assert!(a.accepts.iter().all(|k| !b.accepts.contains(k)));
                }
            }
        }
    }

    fn accepted(kind: RawKind, follow: Follow) -> Vec<RawKind> {
        relations_from(kind)
            .filter(|r| r.follow == follow)
            .flat_map(|r| r.accepts.iter().copied())
            .collect()
    }

    #[test]
    fn test_stack_fetches_load_balancers_and_defers_security_groups() {
        let fetched = accepted(RawKind::DeploymentOperations, Follow::Fetch);
        assert!(fetched.contains(&RawKind::LoadBalancer));
        assert!(fetched.contains(&RawKind::VirtualMachine));
        assert_eq!(
            accepted(RawKind::DeploymentOperations, Follow::Defer),
            vec![RawKind::NetworkSecurityGroup]
        );
    }

    #[test]
    fn test_load_balancer_defers_backend_interfaces() {
        assert_eq!(accepted(RawKind::LoadBalancer, Follow::Fetch), vec![RawKind::PublicIpAddress]);
        assert_eq!(accepted(RawKind::LoadBalancer, Follow::Defer), vec![RawKind::NetworkInterface]);
    }

    #[test]
    fn test_leaf_kinds_declare_nothing() {
        assert_eq!(relations_from(RawKind::VmSize).count(), 0);
        assert_eq!(relations_from(RawKind::PublicIpAddress).count(), 0);
        assert_eq!(relations_from(RawKind::DeploymentTemplate).count(), 0);
    }
}
