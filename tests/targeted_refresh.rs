//! Full-pipeline refresh scenarios against the fixture provider
//!
//! Each test builds a fresh store and queue, runs one or more refresh
//! invocations and checks the persisted inventory.

mod common;

use azrefresh::inventory::query::{
    cloud_network_orchestration_stack, health_check_vms, listener_vms, load_balancer_vms,
    vm_orchestration_stack,
};
use azrefresh::inventory::{
    EntityKind, EntityRef, InventoryStore, QueueItem, Relation, WorkQueue,
};
use azrefresh::resource::RawKind;
use azrefresh::worker::Worker;
use azrefresh::{CancellationToken, RefreshError, Target};
use common::*;
use serde_json::json;

fn lb_ref() -> EntityRef {
    EntityRef::new(EntityKind::LoadBalancer, lb_id("lb1"))
}

fn stack_ref() -> EntityRef {
    EntityRef::new(EntityKind::OrchestrationStack, deployment_id("deploy1"))
}

fn listener_ref() -> EntityRef {
    EntityRef::new(EntityKind::LoadBalancerListener, lb_rule_id("lb1"))
}

async fn refresh_ok(h: &Harness, targets: &[Target]) {
    let report = h.refresher.refresh_many(targets).await;
    assert!(report.rejected.is_empty(), "rejected: {:?}", report.rejected);
    assert!(report.is_success(), "errors: {:?}", report.errors().collect::<Vec<_>>());
}

mod idempotence {
    use super::*;

    #[tokio::test]
    async fn test_second_refresh_changes_nothing() {
        let h = Harness::new(FixtureProvider::azure());
        let targets = [h.target("vms", &vm_id("vm1"))];

        refresh_ok(&h, &targets).await;
        let before = h.store.fingerprint().unwrap();
        let vm_before = h.store.get(&h.key(&vm_ref("vm1"))).unwrap().unwrap();

        let report = h.refresher.refresh_many(&targets).await;
        let pass = report.managers[0].result.as_ref().unwrap();
        assert!(pass.persisted.is_noop(), "{:?}", pass.persisted);
        assert_eq!(h.store.fingerprint().unwrap(), before);

        let vm_after = h.store.get(&h.key(&vm_ref("vm1"))).unwrap().unwrap();
        assert_eq!(vm_after.updated_at, vm_before.updated_at);
    }

    #[tokio::test]
    async fn test_vm_closure_is_complete() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("vms", &vm_id("vm1"))]).await;

        assert_eq!(h.count(EntityKind::VmOrTemplate), 1);
        assert_eq!(h.count(EntityKind::Hardware), 1);
        assert_eq!(h.count(EntityKind::OperatingSystem), 1);
        assert_eq!(h.count(EntityKind::Disk), 1);
        // one private and one public address
        assert_eq!(h.count(EntityKind::Network), 2);
        assert_eq!(h.count(EntityKind::NetworkPort), 1);
        assert_eq!(h.count(EntityKind::FloatingIp), 1);
        assert_eq!(h.count(EntityKind::CloudNetwork), 1);
        assert_eq!(h.count(EntityKind::CloudSubnet), 1);
        assert_eq!(h.count(EntityKind::ResourceGroup), 1);
        assert!(h.queue.is_empty().unwrap());

        let vm = h.store.get(&h.key(&vm_ref("vm1"))).unwrap().unwrap();
        assert_eq!(vm.attrs.get_str("power_state"), Some("on"));
        assert_eq!(vm.attrs.get_str("name"), Some("vm1"));
    }
}

mod scope_isolation {
    use super::*;

    #[tokio::test]
    async fn test_other_manager_is_untouched() {
        let h = Harness::new(FixtureProvider::azure());
        let other = h.store.create_manager_pair("Other", SUB, REGION).unwrap();
        let other_ids = [other.cloud.id, other.network.id];

        let report = h
            .refresher
            .refresh_many(&[Target::new(other.cloud.id, "vms", &vm_id("vm1"))])
            .await;
        assert!(report.is_success());

        let snapshot = |store: &dyn InventoryStore| {
            let mut out = Vec::new();
            for id in other_ids {
                for kind in EntityKind::ALL {
                    out.extend(store.records(id, *kind).unwrap());
                }
            }
            out
        };
        let before = snapshot(h.store.as_ref());
        assert!(!before.is_empty());

        refresh_ok(
            &h,
            &[
                h.target("vms", &vm_id("vm1")),
                h.target("vms", &vm_id("vm2")),
                h.target("load_balancers", &lb_id("lb1")),
            ],
        )
        .await;

        assert_eq!(snapshot(h.store.as_ref()), before);
    }

    #[tokio::test]
    async fn test_unrelated_target_leaves_vm_alone() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("vms", &vm_id("vm1"))]).await;
        let vm_before = h.store.get(&h.key(&vm_ref("vm1"))).unwrap().unwrap();
        let vms_before = h.count(EntityKind::VmOrTemplate);

        refresh_ok(&h, &[h.target("security_groups", &nsg_id("nsg1"))]).await;

        assert_eq!(h.count(EntityKind::VmOrTemplate), vms_before);
        assert_eq!(h.store.get(&h.key(&vm_ref("vm1"))).unwrap().unwrap(), vm_before);
        assert_eq!(h.count(EntityKind::SecurityGroup), 1);
        assert_eq!(h.count(EntityKind::FirewallRule), 2);
    }
}

mod orchestration {
    use super::*;

    #[tokio::test]
    async fn test_stack_pulls_in_its_dependencies() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("orchestration_stacks", &deployment_id("deploy1"))]).await;

        assert_eq!(h.count(EntityKind::OrchestrationStack), 1);
        assert_eq!(h.count(EntityKind::OrchestrationStackResource), 9);
        assert_eq!(h.count(EntityKind::OrchestrationStackParameter), 14);
        assert_eq!(h.count(EntityKind::OrchestrationStackOutput), 1);
        assert_eq!(h.count(EntityKind::OrchestrationTemplate), 1);
        assert_eq!(h.count(EntityKind::VmOrTemplate), 2);
        assert_eq!(h.count(EntityKind::Hardware), 2);
        assert_eq!(h.count(EntityKind::OperatingSystem), 2);
        assert_eq!(h.count(EntityKind::Disk), 2);
        assert_eq!(h.count(EntityKind::Network), 4);
        assert_eq!(h.count(EntityKind::CloudNetwork), 1);
        assert_eq!(h.count(EntityKind::LoadBalancer), 1);
        // two VM interfaces and the LB frontend
        assert_eq!(h.count(EntityKind::NetworkPort), 3);
        assert_eq!(h.count(EntityKind::FloatingIp), 3);
        assert_eq!(listener_vms(h.store.as_ref(), &h.key(&listener_ref())).unwrap().len(), 2);

        let stack = h.key(&stack_ref());
        for vm in ["vm1", "vm2"] {
            let found = vm_orchestration_stack(h.store.as_ref(), &h.key(&vm_ref(vm))).unwrap();
            assert_eq!(found.as_ref(), Some(&stack));
        }
        let network = h.key(&EntityRef::new(EntityKind::CloudNetwork, vnet_id("vnet1")));
        assert_eq!(
            cloud_network_orchestration_stack(h.store.as_ref(), &network).unwrap(),
            Some(stack.clone())
        );
        assert_eq!(h.store.association(&stack, Relation::Vms).unwrap().len(), 2);
        assert_eq!(h.store.association(&stack, Relation::LoadBalancers).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deferred_stack_resources_become_followups() {
        let h = Harness::new(FixtureProvider::azure());
        let report = h
            .refresher
            .refresh_many(&[h.target("orchestration_stacks", &deployment_id("deploy1"))])
            .await;
        assert_eq!(report.managers[0].result.as_ref().unwrap().followups, 1);

        assert_eq!(h.count(EntityKind::SecurityGroup), 0);
        let expected: std::collections::BTreeSet<_> =
            [("security_groups".to_string(), nsg_id("nsg1").to_lowercase())].into();
        assert_eq!(h.queued(), expected);
    }

    #[tokio::test]
    async fn test_stack_attributes() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("orchestration_stacks", &deployment_id("deploy1"))]).await;

        let stack = h.store.get(&h.key(&stack_ref())).unwrap().unwrap();
        assert_eq!(stack.attrs.get_str("name"), Some("deploy1"));
        assert_eq!(stack.attrs.get_str("status"), Some("Succeeded"));

        let templates = h.store.association(&h.key(&stack_ref()), Relation::Template).unwrap();
        assert_eq!(templates.len(), 1);
    }
}

mod load_balancers {
    use super::*;

    #[tokio::test]
    async fn test_aggregate_counts() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;

        assert_eq!(h.count(EntityKind::LoadBalancer), 1);
        assert_eq!(h.count(EntityKind::LoadBalancerPool), 1);
        assert_eq!(h.count(EntityKind::LoadBalancerPoolMember), 2);
        assert_eq!(h.count(EntityKind::LoadBalancerListener), 1);
        assert_eq!(h.count(EntityKind::LoadBalancerHealthCheck), 1);

        let pool = h.key(&EntityRef::new(EntityKind::LoadBalancerPool, lb_pool_id("lb1")));
        let pools = h.store.association(&h.key(&listener_ref()), Relation::Pools).unwrap();
        assert_eq!(pools.into_iter().collect::<Vec<_>>(), vec![pool]);

        let listener = h.store.get(&h.key(&listener_ref())).unwrap().unwrap();
        assert_eq!(
            listener.attrs.get("load_balancer_port_range"),
            Some(&json!({"start": 80, "end": 81}))
        );
    }

    #[tokio::test]
    async fn test_lb_closure_leaves_backends_to_followups() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;

        assert_eq!(h.count(EntityKind::NetworkPort), 1);
        assert_eq!(h.count(EntityKind::FloatingIp), 1);
        assert_eq!(h.count(EntityKind::VmOrTemplate), 0);
        assert_eq!(h.count(EntityKind::CloudNetwork), 0);
        assert_eq!(h.provider.calls(&nic_id("nic1")), 0);

        let expected: std::collections::BTreeSet<_> = ["nic1", "nic2"]
            .iter()
            .map(|nic| ("network_ports".to_string(), nic_id(nic).to_lowercase()))
            .collect();
        assert_eq!(h.queued(), expected);
    }

    #[tokio::test]
    async fn test_vms_refreshed_after_the_lb() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;
        assert!(listener_vms(h.store.as_ref(), &h.key(&listener_ref())).unwrap().is_empty());

        refresh_ok(
            &h,
            &[h.target("vms", &vm_id("vm1")), h.target("vms", &vm_id("vm2"))],
        )
        .await;

        let expected = [h.key(&vm_ref("vm1")), h.key(&vm_ref("vm2"))];
        let vms = listener_vms(h.store.as_ref(), &h.key(&listener_ref())).unwrap();
        assert_eq!(vms.into_iter().collect::<Vec<_>>(), expected.to_vec());
    }

    #[tokio::test]
    async fn test_vms_refreshed_before_the_lb() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(
            &h,
            &[h.target("vms", &vm_id("vm2")), h.target("vms", &vm_id("vm1"))],
        )
        .await;
        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;

        let store = h.store.as_ref();
        assert_eq!(listener_vms(store, &h.key(&listener_ref())).unwrap().len(), 2);
        assert_eq!(load_balancer_vms(store, &h.key(&lb_ref())).unwrap().len(), 2);
        let check = h.key(&EntityRef::new(EntityKind::LoadBalancerHealthCheck, lb_probe_id("lb1")));
        assert_eq!(health_check_vms(store, &check).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_vanished_lb_takes_its_parts() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;
        assert_eq!(h.count(EntityKind::NetworkPort), 1);

        h.provider.remove(RawKind::LoadBalancer, &lb_id("lb1"));
        let report = h
            .refresher
            .refresh_many(&[h.target("load_balancers", &lb_id("lb1"))])
            .await;
        let pass = report.managers[0].result.as_ref().unwrap();
        assert_eq!(pass.not_found, 1);

        assert!(!h.exists(&lb_ref()));
        for kind in [
            EntityKind::LoadBalancerPool,
            EntityKind::LoadBalancerPoolMember,
            EntityKind::LoadBalancerListener,
            EntityKind::LoadBalancerHealthCheck,
        ] {
            assert_eq!(h.count(kind), 0, "{} left behind", kind);
        }
        // the frontend port goes with it
        assert_eq!(h.count(EntityKind::NetworkPort), 0);
    }
}

mod natural_keys {
    use super::*;

    #[tokio::test]
    async fn test_flavor_lookup_is_lower_case() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("vms", &vm_id("vm1"))]).await;

        assert_eq!(h.count(EntityKind::Flavor), 1);
        let cloud = h.pair.cloud.id;
        let mixed = h
            .store
            .find_by_attr(cloud, EntityKind::Flavor, "name", "Standard_A1")
            .unwrap();
        assert!(mixed.is_empty());
        let lower = h
            .store
            .find_by_attr(cloud, EntityKind::Flavor, "name", "standard_a1")
            .unwrap();
        assert_eq!(lower.len(), 1);
    }

    #[tokio::test]
    async fn test_resource_group_in_another_region() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("vms", &vm_id("vm1"))]).await;
        let vm = h.key(&vm_ref("vm1"));

        let groups = h.store.association(&vm, Relation::ResourceGroup).unwrap();
        let group = groups.iter().next().unwrap();
        assert_eq!(group.key.as_str(), rg_id().to_lowercase());
        let record = h.store.get(group).unwrap().unwrap();
        assert_eq!(record.attrs.get_str("location"), Some(RG_REGION));

        let zones = h.store.association(&vm, Relation::AvailabilityZone).unwrap();
        let zone = zones.iter().next().unwrap();
        assert_eq!(zone.key.as_str(), REGION);
        let vm_record = h.store.get(&vm).unwrap().unwrap();
        assert_eq!(vm_record.attrs.get_str("location"), Some(REGION));
    }

    #[tokio::test]
    async fn test_target_by_stored_name() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("vms", &vm_id("vm1"))]).await;

        let report = h.refresher.refresh_many(&[h.target("vms", "vm1")]).await;
        assert!(report.rejected.is_empty());
        assert_eq!(report.managers[0].result.as_ref().unwrap().accepted.len(), 1);
    }

    #[tokio::test]
    async fn test_mixed_case_ids_merge() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;
        let before = h.store.fingerprint().unwrap();

        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1").to_uppercase())]).await;
        assert_eq!(h.store.fingerprint().unwrap(), before);
    }
}

mod convergence {
    use super::*;

    #[tokio::test]
    async fn test_stack_then_vm_matches_combined() {
        let separate = Harness::new(FixtureProvider::azure());
        refresh_ok(
            &separate,
            &[separate.target("orchestration_stacks", &deployment_id("deploy1"))],
        )
        .await;
        refresh_ok(&separate, &[separate.target("vms", &vm_id("vm1"))]).await;

        let combined = Harness::new(FixtureProvider::azure());
        refresh_ok(
            &combined,
            &[
                combined.target("orchestration_stacks", &deployment_id("deploy1")),
                combined.target("vms", &vm_id("vm1")),
            ],
        )
        .await;

        assert_eq!(
            separate.store.fingerprint().unwrap(),
            combined.store.fingerprint().unwrap()
        );
        assert_eq!(separate.queued(), combined.queued());
    }

    #[tokio::test]
    async fn test_drained_followups_match_combined() {
        let cascaded = Harness::new(FixtureProvider::azure());
        refresh_ok(&cascaded, &[cascaded.target("load_balancers", &lb_id("lb1"))]).await;
        assert_eq!(cascaded.queue.len().unwrap(), 2);
        let drained = Worker::new(&cascaded.refresher, 3).drain(None).await.unwrap();
        assert_eq!(drained.succeeded, 4);
        assert!(cascaded.queue.is_empty().unwrap());

        let combined = Harness::new(FixtureProvider::azure());
        refresh_ok(
            &combined,
            &[
                combined.target("load_balancers", &lb_id("lb1")),
                combined.target("vms", &vm_id("vm1")),
                combined.target("vms", &vm_id("vm2")),
            ],
        )
        .await;

        assert_eq!(
            cascaded.store.fingerprint().unwrap(),
            combined.store.fingerprint().unwrap()
        );
    }

    #[tokio::test]
    async fn test_target_order_does_not_matter() {
        let forward = Harness::new(FixtureProvider::azure());
        let backward = Harness::new(FixtureProvider::azure());
        let targets = |h: &Harness| {
            vec![
                h.target("load_balancers", &lb_id("lb1")),
                h.target("vms", &vm_id("vm1")),
                h.target("security_groups", &nsg_id("nsg1")),
                h.target("orchestration_stacks", &deployment_id("deploy1")),
            ]
        };

        refresh_ok(&forward, &targets(&forward)).await;
        let mut reversed = targets(&backward);
        reversed.reverse();
        refresh_ok(&backward, &reversed).await;

        assert_eq!(
            forward.store.fingerprint().unwrap(),
            backward.store.fingerprint().unwrap()
        );
        assert_eq!(forward.queued(), backward.queued());
    }

    #[tokio::test]
    async fn test_full_cascade_drains_to_empty() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("orchestration_stacks", &deployment_id("deploy1"))]).await;

        let report = Worker::new(&h.refresher, 3).drain(None).await.unwrap();
        assert_eq!(report.dropped, 0);
        assert!(h.queue.is_empty().unwrap());
        assert!(h.exists(&lb_ref()));
        assert_eq!(h.count(EntityKind::SecurityGroup), 1);
        assert_eq!(listener_vms(h.store.as_ref(), &h.key(&listener_ref())).unwrap().len(), 2);
    }
}

mod failures {
    use super::*;

    #[tokio::test]
    async fn test_exhausted_retries_persist_nothing() {
        let h = Harness::new(FixtureProvider::azure());
        // the VM itself succeeds; its NIC never does
        h.provider.fail(&nic_id("nic2"), None);

        let report = h.refresher.refresh_many(&[h.target("vms", &vm_id("vm2"))]).await;
        assert!(!report.is_success());
        assert!(matches!(
            report.errors().next(),
            Some(RefreshError::CollectionFailed { .. })
        ));
        assert_eq!(h.provider.calls(&nic_id("nic2")), 3);
        assert!(h.store.fingerprint().unwrap().records.is_empty());
        assert!(h.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_transient_failure_recovers() {
        let h = Harness::new(FixtureProvider::azure());
        h.provider.fail(&lb_id("lb1"), Some(2));

        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;
        assert_eq!(h.provider.calls(&lb_id("lb1")), 3);
        assert!(h.exists(&lb_ref()));
    }

    #[tokio::test]
    async fn test_malformed_resource_is_a_warning() {
        let provider = FixtureProvider::azure();
        provider.insert(RawKind::NetworkInterface, &nic_id("nic2"), json!({"id": nic_id("nic2")}));
        let h = Harness::new(provider);

        let report = h.refresher.refresh_many(&[h.target("vms", &vm_id("vm2"))]).await;
        assert!(report.is_success());
        let warnings: Vec<_> = report.warnings().collect();
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], RefreshError::MalformedResource { .. }));

        assert!(h.exists(&vm_ref("vm2")));
        assert_eq!(h.count(EntityKind::NetworkPort), 0);
        assert_eq!(h.count(EntityKind::Hardware), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_persistence() {
        let h = Harness::new(FixtureProvider::azure());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = h
            .refresher
            .refresh_many_with_cancel(&[h.target("vms", &vm_id("vm1"))], &cancel)
            .await;
        assert!(matches!(report.errors().next(), Some(RefreshError::Cancelled)));
        assert!(h.store.fingerprint().unwrap().records.is_empty());
    }
}

mod input_errors {
    use super::*;
    use azrefresh::inventory::ManagerId;

    #[tokio::test]
    async fn test_unknown_manager_is_rejected() {
        let h = Harness::new(FixtureProvider::azure());
        let report = h
            .refresher
            .refresh_many(&[Target::new(ManagerId(99), "vms", &vm_id("vm1"))])
            .await;
        assert_eq!(report.rejected.len(), 1);
        assert!(matches!(report.rejected[0].error, RefreshError::UnknownManager(99)));
        assert!(report.managers.is_empty());
    }

    #[tokio::test]
    async fn test_bad_target_does_not_block_the_batch() {
        let h = Harness::new(FixtureProvider::azure());
        let report = h
            .refresher
            .refresh_many(&[
                h.target("flavors", "standard_a1"),
                h.target("vms", &vm_id("vm1")),
                h.target("vms", "no-such-vm"),
            ])
            .await;

        assert_eq!(report.rejected.len(), 2);
        assert!(report
            .rejected
            .iter()
            .any(|r| matches!(r.error, RefreshError::UnknownAssociation(_))));
        assert!(report
            .rejected
            .iter()
            .any(|r| matches!(r.error, RefreshError::AmbiguousReference { matches: 0, .. })));
        assert!(report.is_success());
        assert!(h.exists(&vm_ref("vm1")));
    }
}

mod queue {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_followups_coalesce() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;
        let expected: std::collections::BTreeSet<_> = ["nic1", "nic2"]
            .iter()
            .map(|nic| ("network_ports".to_string(), nic_id(nic).to_lowercase()))
            .collect();
        assert_eq!(h.queued(), expected);

        let report = h
            .refresher
            .refresh_many(&[h.target("load_balancers", &lb_id("lb1"))])
            .await;
        assert_eq!(report.managers[0].result.as_ref().unwrap().followups, 0);
        assert_eq!(h.queue.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_worker_requeues_then_gives_up() {
        let h = Harness::new(FixtureProvider::azure());
        refresh_ok(&h, &[h.target("load_balancers", &lb_id("lb1"))]).await;
        h.provider.fail(&vm_id("vm2"), None);

        let report = Worker::new(&h.refresher, 3).drain(None).await.unwrap();
        // both interfaces, vm1, then vm2 three times
        assert_eq!(report.processed, 6);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.requeued, 2);
        assert_eq!(report.dropped, 1);
        assert!(h.queue.is_empty().unwrap());
        assert!(h.exists(&vm_ref("vm1")));
        assert!(!h.exists(&vm_ref("vm2")));
    }

    #[tokio::test]
    async fn test_worker_drops_invalid_items() {
        let h = Harness::new(FixtureProvider::azure());
        h.queue
            .enqueue(QueueItem::new(h.target("flavors", "basic_a0"), "manual"))
            .unwrap();
        h.queue
            .enqueue(QueueItem::new(h.target("vms", &vm_id("vm1")), "manual"))
            .unwrap();

        let report = Worker::new(&h.refresher, 3).drain(Some(1)).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.dropped, 1);
        assert_eq!(h.queue.len().unwrap(), 1);
    }
}
