//! Resource identity model
//!
//! Azure identifies resources three ways: ARM resource paths
//! (`/subscriptions/{s}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`),
//! the composite VM key used by the inventory
//! (`{s}\{rg}\microsoft.compute/virtualmachines\{name}`), and blob URLs for
//! images backed by unmanaged disks. Everything is folded into a
//! [`NaturalKey`], which is the only identity the store understands.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical merge key. ARM treats identifiers case-insensitively, so the
/// key is always lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NaturalKey(String);

impl NaturalKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parsed ARM resource path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArmResourceId {
    pub subscription: String,
    pub resource_group: Option<String>,
    pub namespace: Option<String>,
    /// `(type, name)` pairs, outermost first
    pub segments: Vec<(String, String)>,
}

impl ArmResourceId {
    /// Parse an ARM path. Segment keywords match case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw.trim().split('/').filter(|p| !p.is_empty()).collect();
        let mut iter = parts.into_iter();

        if !iter.next()?.eq_ignore_ascii_case("subscriptions") {
            return None;
        }
        let subscription = iter.next()?.to_string();

        let mut resource_group = None;
        let mut namespace = None;
        let mut segments = Vec::new();

        let rest: Vec<&str> = iter.collect();
        let mut i = 0;
        if rest.len() >= 2 && rest[0].eq_ignore_ascii_case("resourcegroups") {
            resource_group = Some(rest[1].to_string());
            i = 2;
        }
        if i < rest.len() {
            if !rest[i].eq_ignore_ascii_case("providers") || i + 1 >= rest.len() {
                return None;
            }
            namespace = Some(rest[i + 1].to_string());
            i += 2;
            let pairs = &rest[i..];
            if pairs.is_empty() || pairs.len() % 2 != 0 {
                return None;
            }
            for pair in pairs.chunks(2) {
                segments.push((pair[0].to_string(), pair[1].to_string()));
            }
        }

        Some(Self {
            subscription,
            resource_group,
            namespace,
            segments,
        })
    }

    /// Full lower-cased resource type, e.g. `microsoft.network/loadbalancers/probes`
    pub fn resource_type(&self) -> Option<String> {
        let Some(namespace) = self.namespace.as_ref() else {
            return self
                .resource_group
                .as_ref()
                .map(|_| "microsoft.resources/resourcegroups".to_string());
        };
        let mut out = namespace.to_lowercase();
        for (kind, _) in &self.segments {
            out.push('/');
            out.push_str(&kind.to_lowercase());
        }
        Some(out)
    }

    /// Name of the innermost resource
    pub fn name(&self) -> Option<&str> {
        match self.segments.last() {
            Some((_, name)) => Some(name.as_str()),
            None if self.namespace.is_none() => self.resource_group.as_deref(),
            None => None,
        }
    }

    /// The owning resource, e.g. a NIC for an ip configuration id
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() < 2 {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    /// ARM path of the enclosing resource group
    pub fn resource_group_id(&self) -> Option<String> {
        let group = self.resource_group.as_ref()?;
        Some(format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription, group
        ))
    }

    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(self.to_string())
    }
}

impl fmt::Display for ArmResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/subscriptions/{}", self.subscription)?;
        if let Some(group) = &self.resource_group {
            write!(f, "/resourceGroups/{}", group)?;
        }
        if let Some(namespace) = &self.namespace {
            write!(f, "/providers/{}", namespace)?;
            for (kind, name) in &self.segments {
                write!(f, "/{}/{}", kind, name)?;
            }
        }
        Ok(())
    }
}

const VM_TYPE: &str = "microsoft.compute/virtualmachines";

/// Build the composite inventory key for a VM from its ARM id
pub fn vm_key(id: &ArmResourceId) -> Option<String> {
    if id.resource_type()? != VM_TYPE {
        return None;
    }
    Some(format!(
        "{}\\{}\\{}\\{}",
        id.subscription,
        id.resource_group.as_deref()?,
        VM_TYPE,
        id.name()?
    ))
}

/// Turn a composite VM key back into an ARM id
pub fn parse_vm_key(raw: &str) -> Option<ArmResourceId> {
    let parts: Vec<&str> = raw.trim().split('\\').collect();
    let [subscription, group, provider_path, name] = parts.as_slice() else {
        return None;
    };
    let (namespace, kind) = provider_path.split_once('/')?;
    if provider_path.to_lowercase() != VM_TYPE || name.is_empty() {
        return None;
    }
    Some(ArmResourceId {
        subscription: subscription.to_string(),
        resource_group: Some(group.to_string()),
        namespace: Some(namespace.to_string()),
        segments: vec![(kind.to_string(), name.to_string())],
    })
}

/// A natural-key reference as supplied by a caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Arm(ArmResourceId),
    VmKey(ArmResourceId),
    BlobUrl(String),
    Name(String),
}

impl Reference {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('/') {
            if let Some(id) = ArmResourceId::parse(trimmed) {
                return Reference::Arm(id);
            }
        }
        if trimmed.contains('\\') {
            if let Some(id) = parse_vm_key(trimmed) {
                return Reference::VmKey(id);
            }
        }
        if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
            return Reference::BlobUrl(trimmed.to_string());
        }
        Reference::Name(trimmed.to_string())
    }

    /// The ARM id behind this reference, if it has one
    pub fn arm_id(&self) -> Option<&ArmResourceId> {
        match self {
            Reference::Arm(id) | Reference::VmKey(id) => Some(id),
            _ => None,
        }
    }
}

/// Resolve an ARM id string to the parent id (`…/networkInterfaces/nic1` for
/// `…/networkInterfaces/nic1/ipConfigurations/ipconfig1`)
pub fn parent_id(raw: &str) -> Option<String> {
    ArmResourceId::parse(raw)?.parent().map(|p| p.to_string())
}
