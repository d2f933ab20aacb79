//! Engine configuration: region groups and fixed lookup units.

use crate::error::CoreError;

/// Region groups used when no env override is given.
pub const DEFAULT_REGION_GROUPS: &str = "HK+MO=HK_MO";

/// Activity unit every vehicle fuel factor is looked up with.
pub const DEFAULT_VEHICLE_FUEL_UNIT: &str = "L";

/// Regions sharing a combined-region factor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionGroup {
    pub members: Vec<String>,
    pub combined: String,
}

/// The set of known region groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionGroups(Vec<RegionGroup>);

impl RegionGroups {
    pub fn new(groups: Vec<RegionGroup>) -> Self {
        Self(groups)
    }

    /// Parse `"A+B=AB;C+D=CD"`. Blank input yields no groups.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let mut groups = Vec::new();
        for entry in text.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (members, combined) = entry.split_once('=').ok_or_else(|| {
                CoreError::Validation(format!(
                    "Region group '{entry}' must look like 'A+B=COMBINED'"
                ))
            })?;
            let members: Vec<String> = members
                .split('+')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect();
            let combined = combined.trim();
            if members.len() < 2 || combined.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Region group '{entry}' needs at least two members and a combined name"
                )));
            }
            groups.push(RegionGroup {
                members,
                combined: combined.to_string(),
            });
        }
        Ok(Self(groups))
    }

    /// The combined region for `region`, if it belongs to a group.
    pub fn combined_region_for(&self, region: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|g| g.members.iter().any(|m| m == region))
            .map(|g| g.combined.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Tunables shared by the resolver and the strategies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub region_groups: RegionGroups,
    pub vehicle_fuel_unit: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            region_groups: RegionGroups::parse(DEFAULT_REGION_GROUPS).unwrap_or_default(),
            vehicle_fuel_unit: DEFAULT_VEHICLE_FUEL_UNIT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_groups_parse() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.region_groups.combined_region_for("MO"), Some("HK_MO"));
        assert_eq!(cfg.vehicle_fuel_unit, "L");
    }

    #[test]
    fn parse_multiple_groups() {
        let groups = RegionGroups::parse("A+B=AB; C + D + E = CDE").unwrap();
        assert_eq!(groups.combined_region_for("B"), Some("AB"));
        assert_eq!(groups.combined_region_for("E"), Some("CDE"));
        assert_eq!(groups.combined_region_for("Z"), None);
    }

    #[test]
    fn blank_spec_has_no_groups() {
        assert!(RegionGroups::parse("  ").unwrap().is_empty());
    }

    #[test]
    fn malformed_group_is_rejected() {
        assert!(RegionGroups::parse("A+B").is_err());
        assert!(RegionGroups::parse("A=AB").is_err());
    }
}
