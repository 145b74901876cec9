//! Azure region catalogue
//!
//! A static table of public and government regions. Configuration can
//! disable regions and add custom ones; a disabled name always wins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const REGIONS: &[(&str, &str)] = &[
    ("australiacentral", "Australia Central"),
    ("australiacentral2", "Australia Central 2"),
    ("australiaeast", "Australia East"),
    ("australiasoutheast", "Australia Southeast"),
    ("brazilsouth", "Brazil South"),
    ("canadacentral", "Canada Central"),
    ("canadaeast", "Canada East"),
    ("centralindia", "Central India"),
    ("centralus", "Central US"),
    ("eastasia", "East Asia"),
    ("eastus", "East US"),
    ("eastus2", "East US 2"),
    ("francecentral", "France Central"),
    ("francesouth", "France South"),
    ("germanycentral", "Germany Central"),
    ("germanynorth", "Germany North"),
    ("germanynortheast", "Germany Northeast"),
    ("germanywestcentral", "Germany West Central"),
    ("japaneast", "Japan East"),
    ("japanwest", "Japan West"),
    ("koreacentral", "Korea Central"),
    ("koreasouth", "Korea South"),
    ("northcentralus", "North Central US"),
    ("northeurope", "North Europe"),
    ("southcentralus", "South Central US"),
    ("southeastasia", "Southeast Asia"),
    ("southindia", "South India"),
    ("uksouth", "UK South"),
    ("ukwest", "UK West"),
    ("usgovarizona", "US Gov Arizona"),
    ("usgoviowa", "US Gov Iowa"),
    ("usgovtexas", "US Gov Texas"),
    ("usgovvirginia", "US Gov Virginia"),
    ("westcentralus", "West Central US"),
    ("westeurope", "West Europe"),
    ("westindia", "West India"),
    ("westus", "West US"),
    ("westus2", "West US 2"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Region {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalRegion {
    pub name: String,
}

/// Region overrides from configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSettings {
    #[serde(default)]
    pub disabled_regions: Vec<String>,
    /// Custom regions keyed by region name; `name` is the description
    #[serde(default)]
    pub additional_regions: BTreeMap<String, AdditionalRegion>,
}

impl RegionSettings {
    fn is_disabled(&self, name: &str) -> bool {
        self.disabled_regions.iter().any(|d| d.eq_ignore_ascii_case(name))
    }

    /// Every enabled region, built-in first
    pub fn all(&self) -> Vec<Region> {
        let builtin = REGIONS.iter().map(|(name, description)| Region {
            name: name.to_string(),
            description: description.to_string(),
        });
        let custom = self.additional_regions.iter().map(|(name, region)| Region {
            name: name.clone(),
            description: region.name.clone(),
        });

        let mut regions: Vec<Region> = Vec::new();
        for region in builtin.chain(custom) {
            if self.is_disabled(&region.name) || regions.iter().any(|r| r.name == region.name) {
                continue;
            }
            regions.push(region);
        }
        regions
    }

    pub fn names(&self) -> Vec<String> {
        self.all().into_iter().map(|r| r.name).collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Region> {
        self.all().into_iter().find(|r| r.name == name)
    }
}
