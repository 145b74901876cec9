//! Typed ARM payloads
//!
//! Each raw payload is decoded once into a [`ProviderResource`]. Required
//! identifying fields are non-optional, so a payload missing them fails to
//! decode and is reported as malformed.

use crate::resource::RawKind;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct SubResource {
    pub id: String,
}

// =========================================================================
// Compute
// =========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceGroupPayload {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VmPayload {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    #[serde(default)]
    pub properties: VmProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProperties {
    pub vm_id: Option<String>,
    pub hardware_profile: Option<HardwareProfile>,
    pub storage_profile: Option<StorageProfile>,
    pub network_profile: Option<NetworkProfile>,
    pub instance_view: Option<InstanceView>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    pub image_reference: Option<ImageReference>,
    pub os_disk: Option<OsDisk>,
    #[serde(default)]
    pub data_disks: Vec<OsDisk>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageReference {
    pub publisher: Option<String>,
    pub offer: Option<String>,
    pub sku: Option<String>,
    pub id: Option<String>,
}

/// OS or data disk entry of a VM or image storage profile
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    pub name: Option<String>,
    pub os_type: Option<String>,
    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: Option<i64>,
    pub vhd: Option<Vhd>,
    pub managed_disk: Option<SubResource>,
    pub blob_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vhd {
    pub uri: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    #[serde(default)]
    pub network_interfaces: Vec<SubResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstanceView {
    #[serde(default)]
    pub statuses: Vec<InstanceStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    pub code: Option<String>,
    pub display_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmSizePayload {
    pub name: String,
    #[serde(default)]
    pub number_of_cores: i64,
    #[serde(rename = "memoryInMB", default)]
    pub memory_in_mb: i64,
    #[serde(rename = "osDiskSizeInMB", default)]
    pub os_disk_size_in_mb: i64,
    #[serde(rename = "resourceDiskSizeInMB", default)]
    pub resource_disk_size_in_mb: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImagePayload {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    #[serde(default)]
    pub properties: ImageProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageProperties {
    pub storage_profile: Option<StorageProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagedDiskPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: ManagedDiskProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ManagedDiskProperties {
    #[serde(rename = "diskSizeGB")]
    pub disk_size_gb: Option<i64>,
}

// =========================================================================
// Network
// =========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct NicPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: NicProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicProperties {
    pub provisioning_state: Option<String>,
    pub mac_address: Option<String>,
    pub virtual_machine: Option<SubResource>,
    pub network_security_group: Option<SubResource>,
    #[serde(default)]
    pub ip_configurations: Vec<IpConfiguration>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IpConfiguration {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: IpConfigurationProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpConfigurationProperties {
    #[serde(rename = "privateIPAddress")]
    pub private_ip_address: Option<String>,
    #[serde(rename = "publicIPAddress")]
    pub public_ip_address: Option<SubResource>,
    pub subnet: Option<SubResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublicIpPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: PublicIpProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpProperties {
    pub provisioning_state: Option<String>,
    pub ip_address: Option<String>,
    pub ip_configuration: Option<SubResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VnetPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: VnetProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VnetProperties {
    pub address_space: Option<AddressSpace>,
    #[serde(default)]
    pub subnets: Vec<SubnetPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    #[serde(default)]
    pub address_prefixes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubnetPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: SubnetProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    pub address_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NsgPayload {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    #[serde(default)]
    pub properties: NsgProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NsgProperties {
    #[serde(default)]
    pub security_rules: Vec<SecurityRule>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: SecurityRuleProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRuleProperties {
    pub protocol: Option<String>,
    pub direction: Option<String>,
    pub access: Option<String>,
    pub priority: Option<i64>,
    pub destination_port_range: Option<String>,
    pub source_address_prefix: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LbPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: LbProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LbProperties {
    #[serde(rename = "frontendIPConfigurations", default)]
    pub frontend_ip_configurations: Vec<IpConfiguration>,
    #[serde(default)]
    pub backend_address_pools: Vec<BackendPool>,
    #[serde(default)]
    pub load_balancing_rules: Vec<LbRule>,
    #[serde(default)]
    pub probes: Vec<Probe>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendPool {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: BackendPoolProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendPoolProperties {
    #[serde(rename = "backendIPConfigurations", default)]
    pub backend_ip_configurations: Vec<SubResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LbRule {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: LbRuleProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LbRuleProperties {
    pub protocol: Option<String>,
    pub frontend_port: Option<i64>,
    pub backend_port: Option<i64>,
    pub backend_address_pool: Option<SubResource>,
    pub probe: Option<SubResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Probe {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: ProbeProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeProperties {
    pub protocol: Option<String>,
    pub port: Option<i64>,
    pub request_path: Option<String>,
    pub interval_in_seconds: Option<i64>,
    pub number_of_probes: Option<i64>,
}

// =========================================================================
// Orchestration
// =========================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub properties: DeploymentProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentProperties {
    pub provisioning_state: Option<String>,
    pub error: Option<ErrorDetail>,
    #[serde(default)]
    pub parameters: BTreeMap<String, TypedValue>,
    #[serde(default)]
    pub outputs: BTreeMap<String, TypedValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TypedValue {
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OperationPayload {
    #[serde(rename = "operationId")]
    pub operation_id: Option<String>,
    #[serde(default)]
    pub properties: OperationProperties,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationProperties {
    pub provisioning_state: Option<String>,
    pub timestamp: Option<String>,
    pub tracking_id: Option<String>,
    pub status_code: Option<String>,
    pub status_message: Option<Value>,
    pub target_resource: Option<TargetResource>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetResource {
    pub id: String,
    pub resource_type: Option<String>,
    pub resource_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplatePayload {
    pub template: Value,
}

/// A decoded provider resource, one variant per raw kind
#[derive(Debug, Clone)]
pub enum ProviderResource {
    ResourceGroup(ResourceGroupPayload),
    VirtualMachine(VmPayload),
    VmSize(VmSizePayload),
    Image(ImagePayload),
    ManagedDisk(ManagedDiskPayload),
    NetworkInterface(NicPayload),
    PublicIpAddress(PublicIpPayload),
    VirtualNetwork(VnetPayload),
    NetworkSecurityGroup(NsgPayload),
    LoadBalancer(LbPayload),
    Deployment(DeploymentPayload),
    DeploymentOperations(Vec<OperationPayload>),
    DeploymentTemplate(TemplatePayload),
}

impl ProviderResource {
    pub fn decode(kind: RawKind, payload: &Value) -> Result<Self, serde_json::Error> {
        fn de<T: serde::de::DeserializeOwned>(v: &Value) -> Result<T, serde_json::Error> {
            T::deserialize(v)
        }

        Ok(match kind {
            RawKind::ResourceGroup => Self::ResourceGroup(de(payload)?),
            RawKind::VirtualMachine => Self::VirtualMachine(de(payload)?),
            RawKind::VmSize => Self::VmSize(de(payload)?),
            RawKind::Image => Self::Image(de(payload)?),
            RawKind::ManagedDisk => Self::ManagedDisk(de(payload)?),
            RawKind::NetworkInterface => Self::NetworkInterface(de(payload)?),
            RawKind::PublicIpAddress => Self::PublicIpAddress(de(payload)?),
            RawKind::VirtualNetwork => Self::VirtualNetwork(de(payload)?),
            RawKind::NetworkSecurityGroup => Self::NetworkSecurityGroup(de(payload)?),
            RawKind::LoadBalancer => Self::LoadBalancer(de(payload)?),
            RawKind::Deployment => Self::Deployment(de(payload)?),
            RawKind::DeploymentOperations => Self::DeploymentOperations(de(payload)?),
            RawKind::DeploymentTemplate => Self::DeploymentTemplate(de(payload)?),
        })
    }
}
