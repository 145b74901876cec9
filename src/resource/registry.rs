//! Resource Registry - Load ARM resource definitions from JSON
//!
//! This module loads the raw kind and collection definitions from embedded
//! JSON files and provides lookup functions for the collector and ARM client.

use super::RawKind;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[include_str!("../resources/azure.json")];

/// How a kind is retrieved from ARM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMethod {
    /// Plain GET of a single resource
    #[default]
    Get,
    /// GET of a paginated `value` list under the resource
    List,
    /// POST action under the resource
    Post,
}

/// Raw kind definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct KindDef {
    pub display_name: String,
    /// Lower-cased ARM resource type, absent for kinds only reachable via
    /// another resource or a collection
    #[serde(default)]
    pub arm_type: Option<String>,
    pub api_version: String,
    /// Extra query parameters for single-resource requests
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub method: RequestMethod,
    /// Path appended to the owning resource id
    #[serde(default)]
    pub suffix: Option<String>,
}

/// Collection definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionDef {
    /// Path template with `{subscription}` and `{location}` placeholders
    pub path: String,
    pub api_version: String,
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub kinds: HashMap<String, KindDef>,
    #[serde(default)]
    pub collections: HashMap<String, CollectionDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig {
            kinds: HashMap::new(),
            collections: HashMap::new(),
        };

        for content in RESOURCE_FILES {
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.kinds.extend(partial.kinds);
            final_config.collections.extend(partial.collections);
        }

        final_config
    })
}

/// Get a kind definition
pub fn get_kind(kind: RawKind) -> Option<&'static KindDef> {
    get_registry().kinds.get(kind.as_str())
}

/// Get a collection definition by name
pub fn get_collection(name: &str) -> Option<&'static CollectionDef> {
    get_registry().collections.get(name)
}

/// Map a lower-cased ARM resource type to the raw kind fetched for it
pub fn kind_for_arm_type(arm_type: &str) -> Option<RawKind> {
    let arm_type = arm_type.to_lowercase();
    RawKind::ALL.iter().copied().find(|kind| {
        get_kind(*kind)
            .and_then(|def| def.arm_type.as_deref())
            .is_some_and(|t| t == arm_type)
    })
}
