use std::collections::{BTreeMap, BTreeSet};

use crate::domain::entities::merge::SheetMergeConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("sheet dependencies form a cycle: {}", .0.join(", "))]
    Cycle(Vec<String>),
}

/// Orders enabled sheets so every sheet comes after the sheets it depends on.
///
/// A sheet consuming extracted keys depends on every enabled key-producing
/// sheet. Dependencies on disabled or unknown sheets are ignored. Sheets that
/// are free to go in any order are taken by name.
pub fn order_sheets(
    configs: &BTreeMap<String, SheetMergeConfig>,
) -> Result<Vec<&SheetMergeConfig>, PlanError> {
    let enabled: BTreeMap<&str, &SheetMergeConfig> = configs
        .iter()
        .filter(|(_, config)| config.enabled)
        .map(|(name, config)| (name.as_str(), config))
        .collect();

    let producers: Vec<&str> = enabled
        .iter()
        .filter(|(_, config)| config.extract_keys)
        .map(|(name, _)| *name)
        .collect();

    let mut prerequisites: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (name, config) in &enabled {
        let mut needs: BTreeSet<&str> = config
            .depends_on
            .iter()
            .map(String::as_str)
            .filter(|dep| enabled.contains_key(dep) && dep != name)
            .collect();
        if config.use_extracted_keys {
            needs.extend(producers.iter().copied().filter(|p| p != name));
        }
        prerequisites.insert(*name, needs);
    }

    let mut ordered = Vec::with_capacity(enabled.len());
    let mut done: BTreeSet<&str> = BTreeSet::new();

    while ordered.len() < enabled.len() {
        let next = prerequisites
            .iter()
            .find(|(name, needs)| !done.contains(*name) && needs.is_subset(&done))
            .map(|(name, _)| *name);

        let Some(name) = next else {
            let remaining = prerequisites
                .keys()
                .filter(|name| !done.contains(*name))
                .map(|name| name.to_string())
                .collect();
            return Err(PlanError::Cycle(remaining));
        };

        done.insert(name);
        ordered.push(enabled[name]);
    }

    Ok(ordered)
}
