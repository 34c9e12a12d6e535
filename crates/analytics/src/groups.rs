use crate::error::AnalyticsError;
use configuration::{GroupDefinition, ReferenceDefinition};
use core_types::PriceSeries;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Display;

/// Reference group labels offered out of the box. Membership always comes
/// from configuration.
pub const BUILT_IN_GROUPS: [&str; 11] = [
    "Equities - Magnificent Seven",
    "Equities - Sector Constituents",
    "Market Indices",
    "Currencies",
    "Cryptocurrency",
    "Commodities",
    "ETFs - Popular",
    "ETFs - Sectors",
    "ETFs - Countries",
    "Short-Term Bonds",
    "Long-Term Bonds",
];

/// A labelled set of reference instruments. Ad hoc uploads use the same constructor.
#[derive(Debug, Clone)]
pub struct AssetGroup {
    label: String,
    members: Vec<PriceSeries>,
}

impl AssetGroup {
    pub fn new(
        label: impl Into<String>,
        members: Vec<PriceSeries>,
    ) -> Result<Self, AnalyticsError> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(AnalyticsError::Group("group label must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for member in &members {
            if !seen.insert(member.symbol()) {
                return Err(AnalyticsError::Group(format!(
                    "'{}' appears twice in group '{label}'",
                    member.symbol()
                )));
            }
        }

        Ok(Self { label, members })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn members(&self) -> &[PriceSeries] {
        &self.members
    }

    pub fn is_built_in(&self) -> bool {
        BUILT_IN_GROUPS.contains(&self.label.as_str())
    }
}

/// Immutable lookup of groups by label, built once and passed to each analysis.
#[derive(Debug, Clone, Default)]
pub struct AssetGroupRegistry {
    groups: BTreeMap<String, AssetGroup>,
}

impl AssetGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds every configured group, loading members through `loader`.
    pub fn from_definitions<F, E>(
        definitions: &[GroupDefinition],
        mut loader: F,
    ) -> Result<Self, AnalyticsError>
    where
        F: FnMut(&ReferenceDefinition) -> Result<PriceSeries, E>,
        E: Display,
    {
        let mut registry = Self::new();
        for definition in definitions {
            let members = definition
                .members
                .iter()
                .map(|reference| {
                    loader(reference).map_err(|e| {
                        AnalyticsError::Group(format!(
                            "failed to load '{}' for group '{}': {e}",
                            reference.name, definition.label
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let group = AssetGroup::new(definition.label.clone(), members)?;
            registry = registry.with_group(group)?;
        }

        tracing::info!(groups = registry.groups.len(), "Asset group registry built.");
        Ok(registry)
    }

    /// Returns a registry that also holds `group`.
    pub fn with_group(mut self, group: AssetGroup) -> Result<Self, AnalyticsError> {
        if self.groups.contains_key(group.label()) {
            return Err(AnalyticsError::Group(format!(
                "group '{}' is already registered",
                group.label()
            )));
        }
        self.groups.insert(group.label.clone(), group);
        Ok(self)
    }

    pub fn get(&self, label: &str) -> Result<&AssetGroup, AnalyticsError> {
        self.groups
            .get(label)
            .ok_or_else(|| AnalyticsError::UnknownGroup(label.to_string()))
    }

    pub fn groups(&self) -> impl Iterator<Item = &AssetGroup> {
        self.groups.values()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::linear_series;
    use std::path::PathBuf;

    fn definition(label: &str, names: &[&str]) -> GroupDefinition {
        GroupDefinition {
            label: label.to_string(),
            members: names
                .iter()
                .map(|name| ReferenceDefinition {
                    name: name.to_string(),
                    path: PathBuf::from(format!("{name}.json")),
                })
                .collect(),
        }
    }

    #[test]
    fn builds_groups_through_the_loader() {
        let defs = vec![
            definition("Market Indices", &["SPX", "NDX"]),
            definition("Uploads", &["MINE"]),
        ];
        let registry = AssetGroupRegistry::from_definitions(&defs, |r| {
            Ok::<_, String>(linear_series(&r.name, 5, 100.0, 1.0))
        })
        .unwrap();

        assert_eq!(registry.len(), 2);
        let indices = registry.get("Market Indices").unwrap();
        assert!(indices.is_built_in());
        assert_eq!(indices.members()[1].symbol(), "NDX");
        assert!(!registry.get("Uploads").unwrap().is_built_in());
    }

    #[test]
    fn loader_failures_name_the_member() {
        let defs = vec![definition("Currencies", &["EURUSD"])];
        let err =
            AssetGroupRegistry::from_definitions(&defs, |_| Err("file not found")).unwrap_err();
        assert!(err.to_string().contains("EURUSD"));
    }

    #[test]
    fn unknown_labels_are_reported() {
        let registry = AssetGroupRegistry::new();
        assert!(matches!(
            registry.get("Commodities"),
            Err(AnalyticsError::UnknownGroup(label)) if label == "Commodities"
        ));
    }

    #[test]
    fn duplicate_members_and_labels_are_rejected() {
        let a = linear_series("BTC", 3, 100.0, 1.0);
        assert!(AssetGroup::new("Cryptocurrency", vec![a.clone(), a.clone()]).is_err());

        let group = AssetGroup::new("Cryptocurrency", vec![a]).unwrap();
        let registry = AssetGroupRegistry::new().with_group(group.clone()).unwrap();
        assert!(registry.with_group(group).is_err());
    }
}
