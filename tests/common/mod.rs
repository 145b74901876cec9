//! Shared fixtures for pipeline integration tests
//!
//! [`FixtureProvider`] replays canned ARM payloads from memory. Ids are
//! matched case-insensitively like ARM does, and any id can be made to fail
//! with a transient error a fixed number of times (or forever).

#![allow(dead_code)]

use async_trait::async_trait;
use azrefresh::error::ProviderError;
use azrefresh::identity::{vm_key, ArmResourceId};
use azrefresh::inventory::{
    EntityKind, EntityRef, InventoryStore, ManagerPair, MemoryQueue, MemoryStore, RecordKey,
    WorkQueue,
};
use azrefresh::resource::{CollectionScope, ProviderApi, RawKind, RetryPolicy};
use azrefresh::{RefreshSettings, Refresher, Target};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SUB: &str = "sub-1";
pub const RG: &str = "rg1";
pub const REGION: &str = "eastus";
pub const RG_REGION: &str = "westus";

pub fn rg_id() -> String {
    format!("/subscriptions/{}/resourceGroups/{}", SUB, RG)
}

pub fn arm_id(resource_type: &str, name: &str) -> String {
    format!("{}/providers/{}/{}", rg_id(), resource_type, name)
}

pub fn vm_id(name: &str) -> String {
    arm_id("Microsoft.Compute/virtualMachines", name)
}

pub fn nic_id(name: &str) -> String {
    arm_id("Microsoft.Network/networkInterfaces", name)
}

pub fn ip_id(name: &str) -> String {
    arm_id("Microsoft.Network/publicIPAddresses", name)
}

pub fn vnet_id(name: &str) -> String {
    arm_id("Microsoft.Network/virtualNetworks", name)
}

pub fn subnet_id(vnet: &str, name: &str) -> String {
    format!("{}/subnets/{}", vnet_id(vnet), name)
}

pub fn nsg_id(name: &str) -> String {
    arm_id("Microsoft.Network/networkSecurityGroups", name)
}

pub fn lb_id(name: &str) -> String {
    arm_id("Microsoft.Network/loadBalancers", name)
}

pub fn deployment_id(name: &str) -> String {
    arm_id("Microsoft.Resources/deployments", name)
}

pub fn ip_config_id(nic: &str) -> String {
    format!("{}/ipConfigurations/ipconfig1", nic_id(nic))
}

/// Composite inventory key of a VM
pub fn vm_ref(name: &str) -> EntityRef {
    let id = ArmResourceId::parse(&vm_id(name)).expect("valid vm id");
    EntityRef::new(EntityKind::VmOrTemplate, vm_key(&id).expect("vm key"))
}

pub fn vm_size_scope() -> CollectionScope {
    CollectionScope::VmSizes {
        subscription: SUB.to_string(),
        location: REGION.to_string(),
    }
}

// =========================================================================
// Payload builders
// =========================================================================

pub fn resource_group() -> Value {
    json!({"id": rg_id(), "name": RG, "location": RG_REGION})
}

pub fn vm_size(name: &str, cores: i64, memory_mb: i64) -> Value {
    json!({
        "name": name,
        "numberOfCores": cores,
        "memoryInMB": memory_mb,
        "osDiskSizeInMB": 1047552,
        "resourceDiskSizeInMB": 20480
    })
}

pub fn vm(name: &str, size: &str, nic: &str) -> Value {
    json!({
        "id": vm_id(name),
        "name": name,
        "location": REGION,
        "properties": {
            "vmId": format!("{}-0000", name),
            "hardwareProfile": {"vmSize": size},
            "storageProfile": {
                "imageReference": {"publisher": "RedHat", "offer": "RHEL", "sku": "7.2"},
                "osDisk": {
                    "name": format!("{}-os", name),
                    "osType": "Linux",
                    "diskSizeGB": 32,
                    "vhd": {"uri": format!("https://acct.blob.core.windows.net/vhds/{}.vhd", name)}
                },
                "dataDisks": []
            },
            "networkProfile": {"networkInterfaces": [{"id": nic_id(nic)}]},
            "instanceView": {"statuses": [
                {"code": "ProvisioningState/succeeded", "displayStatus": "Provisioning succeeded"},
                {"code": "PowerState/running", "displayStatus": "VM running"}
            ]}
        }
    })
}

pub fn nic(name: &str, vm: &str, public_ip: &str) -> Value {
    json!({
        "id": nic_id(name),
        "name": name,
        "properties": {
            "provisioningState": "Succeeded",
            "macAddress": "00-0D-3A-00-00-01",
            "virtualMachine": {"id": vm_id(vm)},
            "ipConfigurations": [{
                "id": ip_config_id(name),
                "name": "ipconfig1",
                "properties": {
                    "privateIPAddress": "10.0.0.4",
                    "publicIPAddress": {"id": ip_id(public_ip)},
                    "subnet": {"id": subnet_id("vnet1", "default")}
                }
            }]
        }
    })
}

pub fn public_ip(name: &str, address: &str, config: &str) -> Value {
    json!({
        "id": ip_id(name),
        "name": name,
        "properties": {
            "provisioningState": "Succeeded",
            "ipAddress": address,
            "ipConfiguration": {"id": config}
        }
    })
}

pub fn vnet(name: &str) -> Value {
    json!({
        "id": vnet_id(name),
        "name": name,
        "properties": {
            "addressSpace": {"addressPrefixes": ["10.0.0.0/16"]},
            "subnets": [{
                "id": subnet_id(name, "default"),
                "name": "default",
                "properties": {"addressPrefix": "10.0.0.0/24"}
            }]
        }
    })
}

pub fn nsg(name: &str) -> Value {
    json!({
        "id": nsg_id(name),
        "name": name,
        "location": REGION,
        "properties": {"securityRules": [
            {
                "id": format!("{}/securityRules/ssh", nsg_id(name)),
                "name": "ssh",
                "properties": {"protocol": "Tcp", "direction": "Inbound", "access": "Allow",
                    "priority": 1000, "destinationPortRange": "22", "sourceAddressPrefix": "*"}
            },
            {
                "id": format!("{}/securityRules/web", nsg_id(name)),
                "name": "web",
                "properties": {"protocol": "Tcp", "direction": "Inbound", "access": "Allow",
                    "priority": 1010, "destinationPortRange": "80-81", "sourceAddressPrefix": "*"}
            }
        ]}
    })
}

pub fn lb_frontend_id(lb: &str) -> String {
    format!("{}/frontendIPConfigurations/fe1", lb_id(lb))
}

pub fn lb_pool_id(lb: &str) -> String {
    format!("{}/backendAddressPools/pool1", lb_id(lb))
}

pub fn lb_rule_id(lb: &str) -> String {
    format!("{}/loadBalancingRules/http", lb_id(lb))
}

pub fn lb_probe_id(lb: &str) -> String {
    format!("{}/probes/http-probe", lb_id(lb))
}

pub fn load_balancer(name: &str, members: &[&str]) -> Value {
    let backends: Vec<Value> = members.iter().map(|nic| json!({"id": ip_config_id(nic)})).collect();
    json!({
        "id": lb_id(name),
        "name": name,
        "properties": {
            "frontendIPConfigurations": [{
                "id": lb_frontend_id(name),
                "name": "fe1",
                "properties": {"publicIPAddress": {"id": ip_id("lb-ip")}}
            }],
            "backendAddressPools": [{
                "id": lb_pool_id(name),
                "name": "pool1",
                "properties": {"backendIPConfigurations": backends}
            }],
            "loadBalancingRules": [{
                "id": lb_rule_id(name),
                "name": "http",
                "properties": {
                    "protocol": "Tcp",
                    "frontendPort": 80,
                    "backendPort": 8080,
                    "backendAddressPool": {"id": lb_pool_id(name)},
                    "probe": {"id": lb_probe_id(name)}
                }
            }],
            "probes": [{
                "id": lb_probe_id(name),
                "name": "http-probe",
                "properties": {"protocol": "Http", "port": 8080, "requestPath": "/health",
                    "intervalInSeconds": 5, "numberOfProbes": 2}
            }]
        }
    })
}

pub fn deployment(name: &str, parameters: usize, outputs: usize) -> Value {
    let parameters: serde_json::Map<String, Value> = (0..parameters)
        .map(|i| (format!("param{}", i), json!({"type": "String", "value": format!("value{}", i)})))
        .collect();
    let outputs: serde_json::Map<String, Value> = (0..outputs)
        .map(|i| (format!("output{}", i), json!({"type": "String", "value": format!("out{}", i)})))
        .collect();
    json!({
        "id": deployment_id(name),
        "name": name,
        "properties": {
            "provisioningState": "Succeeded",
            "parameters": parameters,
            "outputs": outputs
        }
    })
}

pub fn operation(deployment: &str, index: usize, target: &str, resource_type: &str) -> Value {
    let name = target.rsplit('/').next().unwrap_or_default();
    json!({
        "id": format!("{}/operations/op{}", deployment_id(deployment), index),
        "operationId": format!("op{}", index),
        "properties": {
            "provisioningState": "Succeeded",
            "timestamp": format!("2026-01-01T00:00:{:02}Z", index),
            "trackingId": format!("tracking-{}", index),
            "statusCode": "OK",
            "targetResource": {"id": target, "resourceType": resource_type, "resourceName": name}
        }
    })
}

pub fn template() -> Value {
    json!({"template": {
        "$schema": "https://schema.management.azure.com/schemas/2015-01-01/deploymentTemplate.json#",
        "contentVersion": "1.0.0.0",
        "resources": []
    }})
}

// =========================================================================
// Provider
// =========================================================================

#[derive(Default)]
pub struct FixtureProvider {
    resources: Mutex<HashMap<(RawKind, String), Value>>,
    collections: Mutex<HashMap<CollectionScope, Vec<Value>>>,
    /// Remaining transient failures per id; `None` fails forever
    failures: Mutex<HashMap<String, Option<u32>>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: RawKind, id: &str, payload: Value) {
        self.resources
            .lock()
            .unwrap()
            .insert((kind, id.to_lowercase()), payload);
    }

    pub fn remove(&self, kind: RawKind, id: &str) {
        self.resources.lock().unwrap().remove(&(kind, id.to_lowercase()));
    }

    pub fn set_collection(&self, scope: CollectionScope, items: Vec<Value>) {
        self.collections.lock().unwrap().insert(scope, items);
    }

    /// Fail requests for `id` transiently; `times == None` never recovers
    pub fn fail(&self, id: &str, times: Option<u32>) {
        self.failures.lock().unwrap().insert(id.to_lowercase(), times);
    }

    pub fn calls(&self, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&id.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    fn check_failure(&self, id: &str) -> Result<(), ProviderError> {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(id) {
            Some(None) => Err(ProviderError::Transient(format!("connection reset for {}", id))),
            Some(Some(0)) => Ok(()),
            Some(Some(remaining)) => {
                *remaining -= 1;
                Err(ProviderError::Transient(format!("timeout for {}", id)))
            }
            None => Ok(()),
        }
    }

    /// The standard fixture subscription: two VMs behind one load balancer,
    /// a deployment that created most of it, and an unattached NSG
    pub fn azure() -> Self {
        let provider = Self::new();
        provider.insert(RawKind::ResourceGroup, &rg_id(), resource_group());
        provider.set_collection(
            vm_size_scope(),
            vec![
                vm_size("Basic_A0", 1, 768),
                vm_size("Standard_A1", 1, 1792),
            ],
        );

        provider.insert(RawKind::VirtualMachine, &vm_id("vm1"), vm("vm1", "Standard_A1", "nic1"));
        provider.insert(RawKind::VirtualMachine, &vm_id("vm2"), vm("vm2", "Basic_A0", "nic2"));
        provider.insert(RawKind::NetworkInterface, &nic_id("nic1"), nic("nic1", "vm1", "ip1"));
        provider.insert(RawKind::NetworkInterface, &nic_id("nic2"), nic("nic2", "vm2", "ip2"));
        provider.insert(
            RawKind::PublicIpAddress,
            &ip_id("ip1"),
            public_ip("ip1", "40.0.0.1", &ip_config_id("nic1")),
        );
        provider.insert(
            RawKind::PublicIpAddress,
            &ip_id("ip2"),
            public_ip("ip2", "40.0.0.2", &ip_config_id("nic2")),
        );
        provider.insert(
            RawKind::PublicIpAddress,
            &ip_id("lb-ip"),
            public_ip("lb-ip", "40.0.0.100", &lb_frontend_id("lb1")),
        );
        provider.insert(RawKind::VirtualNetwork, &vnet_id("vnet1"), vnet("vnet1"));
        provider.insert(RawKind::NetworkSecurityGroup, &nsg_id("nsg1"), nsg("nsg1"));
        provider.insert(
            RawKind::LoadBalancer,
            &lb_id("lb1"),
            load_balancer("lb1", &["nic1", "nic2"]),
        );

        let deploy = deployment_id("deploy1");
        provider.insert(RawKind::Deployment, &deploy, deployment("deploy1", 14, 1));
        let targets = [
            (vm_id("vm1"), "Microsoft.Compute/virtualMachines"),
            (vm_id("vm2"), "Microsoft.Compute/virtualMachines"),
            (nic_id("nic1"), "Microsoft.Network/networkInterfaces"),
            (nic_id("nic2"), "Microsoft.Network/networkInterfaces"),
            (ip_id("ip1"), "Microsoft.Network/publicIPAddresses"),
            (ip_id("ip2"), "Microsoft.Network/publicIPAddresses"),
            (vnet_id("vnet1"), "Microsoft.Network/virtualNetworks"),
            (lb_id("lb1"), "Microsoft.Network/loadBalancers"),
            (nsg_id("nsg1"), "Microsoft.Network/networkSecurityGroups"),
        ];
        let operations: Vec<Value> = targets
            .iter()
            .enumerate()
            .map(|(i, (id, kind))| operation("deploy1", i, id, kind))
            .collect();
        provider.insert(RawKind::DeploymentOperations, &deploy, Value::Array(operations));
        provider.insert(RawKind::DeploymentTemplate, &deploy, template());
        provider
    }
}

#[async_trait]
impl ProviderApi for FixtureProvider {
    async fn fetch_by_id(&self, kind: RawKind, id: &str) -> Result<Option<Value>, ProviderError> {
        let id = id.to_lowercase();
        *self.calls.lock().unwrap().entry(id.clone()).or_default() += 1;
        self.check_failure(&id)?;
        Ok(self.resources.lock().unwrap().get(&(kind, id)).cloned())
    }

    async fn list_collection(&self, scope: &CollectionScope) -> Result<Vec<Value>, ProviderError> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }
}

// =========================================================================
// Harness
// =========================================================================

pub fn settings() -> RefreshSettings {
    RefreshSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
        },
        ..RefreshSettings::default()
    }
}

pub struct Harness {
    pub provider: Arc<FixtureProvider>,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryQueue>,
    pub pair: ManagerPair,
    pub refresher: Refresher,
}

impl Harness {
    pub fn new(provider: FixtureProvider) -> Self {
        let provider = Arc::new(provider);
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryQueue::new());
        let pair = store
            .create_manager_pair("Azure", SUB, REGION)
            .expect("manager pair");
        let refresher = Refresher::new(provider.clone(), store.clone(), queue.clone(), settings());
        Self {
            provider,
            store,
            queue,
            pair,
            refresher,
        }
    }

    pub fn target(&self, association: &str, key: &str) -> Target {
        Target::new(self.pair.cloud.id, association, key)
    }

    pub fn key(&self, entity: &EntityRef) -> RecordKey {
        self.pair.record_key(entity)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.store
            .count(Some(self.pair.owner_of(kind)), kind)
            .expect("count")
    }

    pub fn exists(&self, entity: &EntityRef) -> bool {
        self.store.get(&self.key(entity)).expect("get").is_some()
    }

    /// Queued follow-ups as (association, natural key)
    pub fn queued(&self) -> BTreeSet<(String, String)> {
        self.queue
            .items()
            .expect("queue items")
            .into_iter()
            .map(|item| (item.association, item.natural_key))
            .collect()
    }
}
