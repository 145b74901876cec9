//! Compute entities: VMs, templates, flavors, resource groups

use super::payload::{ImagePayload, InstanceView, OsDisk, ResourceGroupPayload, VmPayload, VmSizePayload};
use super::{malformed, Context, GB, MB};
use crate::error::RefreshError;
use crate::identity::{vm_key, ArmResourceId, NaturalKey};
use crate::inventory::{Attributes, EntityGraph, EntityKind, EntityRef, Relation};
use crate::resource::RawKind;
use serde_json::Value;

pub const VENDOR: &str = "azure";

pub fn resource_group(graph: &mut EntityGraph, rg: &ResourceGroupPayload) -> Result<(), RefreshError> {
    graph.insert_node(
        EntityRef::new(EntityKind::ResourceGroup, &rg.id),
        Attributes::new()
            .with("name", rg.name.as_str())
            .with("ems_ref", rg.id.as_str())
            .with("location", rg.location.clone()),
    );
    Ok(())
}

/// Flavors are keyed and named by the lower-cased size name
pub fn flavor(graph: &mut EntityGraph, size: &VmSizePayload) -> Result<(), RefreshError> {
    let name = size.name.to_lowercase();
    graph.insert_node(
        EntityRef::new(EntityKind::Flavor, &name),
        Attributes::new()
            .with("name", name.as_str())
            .with("ems_ref", name.as_str())
            .with("cpus", size.number_of_cores)
            .with("cpu_cores", size.number_of_cores)
            .with("memory", size.memory_in_mb * MB)
            .with("root_disk_size", size.os_disk_size_in_mb * MB)
            .with("swap_disk_size", size.resource_disk_size_in_mb * MB)
            .with("enabled", true),
    );
    Ok(())
}

/// Map the instance view to `(power_state, raw_power_state)`
pub fn power_state(view: Option<&InstanceView>) -> (&'static str, Option<String>) {
    let status = view.and_then(|v| {
        v.statuses
            .iter()
            .find(|s| s.code.as_deref().is_some_and(|c| c.starts_with("PowerState/")))
    });
    let Some(status) = status else {
        return ("unknown", None);
    };

    let code = status
        .code
        .as_deref()
        .and_then(|c| c.strip_prefix("PowerState/"))
        .unwrap_or_default()
        .to_lowercase();
    let state = match code.as_str() {
        "running" => "on",
        "stopped" | "deallocated" => "off",
        "starting" | "stopping" | "deallocating" => "suspended",
        _ => "unknown",
    };
    (state, status.display_status.clone())
}

pub fn virtual_machine(ctx: &Context, graph: &mut EntityGraph, vm: &VmPayload) -> Result<(), RefreshError> {
    let id = ArmResourceId::parse(&vm.id)
        .ok_or_else(|| malformed(RawKind::VirtualMachine, &vm.id, "unparseable id"))?;
    let key = vm_key(&id)
        .ok_or_else(|| malformed(RawKind::VirtualMachine, &vm.id, "not a virtual machine id"))?;
    let entity = EntityRef::new(EntityKind::VmOrTemplate, &key);
    let props = &vm.properties;
    let (state, raw_state) = power_state(props.instance_view.as_ref());

    graph.insert_node(
        entity.clone(),
        Attributes::new()
            .with("name", vm.name.as_str())
            .with("ems_ref", key.as_str())
            .with("uid_ems", key.as_str())
            .with("vm_id", props.vm_id.clone())
            .with("vendor", VENDOR)
            .with("location", vm.location.clone())
            .with("power_state", state)
            .with("raw_power_state", raw_state)
            .with("template", false),
    );

    let zone = ctx.availability_zone(graph);
    graph.link(&entity, Relation::AvailabilityZone, zone);

    match id.resource_group_id() {
        Some(group) => graph.link(&entity, Relation::ResourceGroup, EntityRef::new(EntityKind::ResourceGroup, group)),
        None => graph.declare(&entity, Relation::ResourceGroup),
    }

    let size_name = props
        .hardware_profile
        .as_ref()
        .and_then(|h| h.vm_size.as_deref());
    let size = match (size_name, vm.location.as_deref()) {
        (Some(name), Some(location)) => ctx.vm_size(location, name),
        _ => None,
    };
    match size_name {
        Some(name) => graph.link(&entity, Relation::Flavor, EntityRef::new(EntityKind::Flavor, name)),
        None => graph.declare(&entity, Relation::Flavor),
    }

    // Hardware and operating system share the VM's key
    let hardware = EntityRef::new(EntityKind::Hardware, &key);
    graph.insert_node(
        hardware.clone(),
        Attributes::new()
            .with("cpu_sockets", 1)
            .with("cpu_total_cores", size.map(|s| s.number_of_cores))
            .with("memory_mb", size.map(|s| s.memory_in_mb))
            .with(
                "disk_capacity",
                size.map(|s| (s.os_disk_size_in_mb + s.resource_disk_size_in_mb) * MB),
            )
            .with("guest_os", Value::Null),
    );
    graph.link(&entity, Relation::Hardware, hardware.clone());

    let storage = props.storage_profile.as_ref();
    let image = storage.and_then(|s| s.image_reference.as_ref());
    let os_disk = storage.and_then(|s| s.os_disk.as_ref());
    let product_name = match image.and_then(|i| i.offer.as_ref().zip(i.sku.as_ref())) {
        Some((offer, sku)) => Some(format!("{} {}", offer, sku)),
        None => os_disk.and_then(|d| d.os_type.clone()),
    };
    let os = EntityRef::new(EntityKind::OperatingSystem, &key);
    graph.insert_node(
        os.clone(),
        Attributes::new().with("product_name", product_name),
    );
    graph.link(&entity, Relation::OperatingSystem, os);

    graph.declare(&hardware, Relation::Disks);
    let disks = os_disk
        .into_iter()
        .chain(storage.into_iter().flat_map(|s| s.data_disks.iter()));
    for os_or_data in disks {
        if let Some((node, attrs)) = disk(ctx, &key, os_or_data) {
            graph.insert_node(node.clone(), attrs);
            graph.link(&hardware, Relation::Disks, node);
        }
    }

    graph.declare(&hardware, Relation::Networks);
    let nics = props
        .network_profile
        .as_ref()
        .map(|p| p.network_interfaces.as_slice())
        .unwrap_or_default();
    for nic in nics.iter().filter_map(|r| ctx.nic(&r.id)) {
        for config in &nic.properties.ip_configurations {
            let private = EntityRef::new(
                EntityKind::Network,
                format!("{}\\{}\\private", key, config.id),
            );
            graph.insert_node(
                private.clone(),
                Attributes::new()
                    .with("description", "private")
                    .with("ipaddress", config.properties.private_ip_address.clone())
                    .with("hostname", config.name.as_str()),
            );
            graph.link(&hardware, Relation::Networks, private);

            let public = config
                .properties
                .public_ip_address
                .as_ref()
                .and_then(|ip| ctx.public_ip(&ip.id));
            if let Some(ip) = public {
                let network = EntityRef::new(
                    EntityKind::Network,
                    format!("{}\\{}\\public", key, config.id),
                );
                graph.insert_node(
                    network.clone(),
                    Attributes::new()
                        .with("description", "public")
                        .with("ipaddress", ip.properties.ip_address.clone())
                        .with("hostname", ip.name.as_str()),
                );
                graph.link(&hardware, Relation::Networks, network);
            }
        }
    }

    Ok(())
}

fn disk(ctx: &Context, vm_key: &str, disk: &OsDisk) -> Option<(EntityRef, Attributes)> {
    let name = disk.name.as_deref()?;
    let managed = disk.managed_disk.as_ref();
    let location = disk
        .vhd
        .as_ref()
        .map(|v| v.uri.clone())
        .or_else(|| managed.map(|m| m.id.clone()));
    let size_gb = managed
        .and_then(|m| ctx.managed_disk(&m.id))
        .and_then(|d| d.properties.disk_size_gb)
        .or(disk.disk_size_gb);

    Some((
        EntityRef::new(EntityKind::Disk, format!("{}\\{}", vm_key, name)),
        Attributes::new()
            .with("device_name", name)
            .with("device_type", "disk")
            .with("controller_type", VENDOR)
            .with("location", location)
            .with("size", size_gb.map(|gb| gb * GB)),
    ))
}

/// Templates backed by an unmanaged VHD are keyed by the blob URL, managed
/// images by their id
pub fn template(graph: &mut EntityGraph, image: &ImagePayload) -> Result<(), RefreshError> {
    let id = ArmResourceId::parse(&image.id)
        .ok_or_else(|| malformed(RawKind::Image, &image.id, "unparseable id"))?;
    let os_disk = image
        .properties
        .storage_profile
        .as_ref()
        .and_then(|s| s.os_disk.as_ref());
    let reference = os_disk
        .and_then(|d| d.blob_uri.clone())
        .unwrap_or_else(|| image.id.clone());

    let entity = EntityRef::new(EntityKind::VmOrTemplate, &reference);
    graph.insert_node(
        entity.clone(),
        Attributes::new()
            .with("name", image.name.as_str())
            .with("ems_ref", reference.as_str())
            .with("uid_ems", reference.as_str())
            .with("image_id", NaturalKey::new(&image.id).as_str())
            .with("vendor", VENDOR)
            .with("location", image.location.clone())
            .with("power_state", "never")
            .with("raw_power_state", "never")
            .with("template", true),
    );

    let guest_os = match os_disk.and_then(|d| d.os_type.as_deref()) {
        Some(t) if t.eq_ignore_ascii_case("windows") => "windows_generic",
        _ => "linux_generic",
    };
    let hardware = EntityRef::new(EntityKind::Hardware, &reference);
    graph.insert_node(
        hardware.clone(),
        Attributes::new()
            .with("guest_os", guest_os)
            .with("bitness", 64),
    );
    graph.link(&entity, Relation::Hardware, hardware);

    match id.resource_group_id() {
        Some(group) => graph.link(&entity, Relation::ResourceGroup, EntityRef::new(EntityKind::ResourceGroup, group)),
        None => graph.declare(&entity, Relation::ResourceGroup),
    }
    Ok(())
}
