//! Gene-to-pathway mapping stage.
//!
//! Expands the normalized gene-family table into per-reaction evidence
//! through the static gene-to-reaction adjacency. The expansion is purely
//! additive and order-independent: each (gene family, reaction) pair
//! contributes once no matter how many mapping rules connect them, and the
//! output is sorted by reaction id.

use indexmap::IndexMap;
use log::debug;

use crate::normalization::{FeatureAbundance, UNMAPPED_FEATURE};
use crate::reference::ReactionMap;

/// Aggregated per-reaction abundance evidence for one sample.
#[derive(Debug, Default, Clone)]
pub struct ReactionEvidence {
    /// reaction_id -> summed gene-family abundance.
    pub values: IndexMap<String, f64>,
}

impl ReactionEvidence {
    pub fn get(&self, reaction: &str) -> f64 {
        self.values.get(reaction).copied().unwrap_or(0.0)
    }

    /// Reactions with strictly positive evidence.
    pub fn detected(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values
            .iter()
            .filter(|(_, &v)| v > 0.0)
            .map(|(k, &v)| (k.as_str(), v))
    }
}

/// Sums each gene family's abundance into every reaction it maps to.
///
/// The adjacency in [`ReactionMap`] already collapses duplicate mapping
/// rules, so a gene family reaching the same reaction via several rules is
/// counted once. The UNMAPPED pseudo-feature never maps to a reaction.
pub fn map_to_reactions(abundance: &FeatureAbundance, mapping: &ReactionMap) -> ReactionEvidence {
    let mut values: IndexMap<String, f64> = IndexMap::new();
    for (feature, &value) in &abundance.values {
        if feature == UNMAPPED_FEATURE {
            continue;
        }
        for reaction in mapping.reactions_for(feature) {
            *values.entry(reaction.clone()).or_insert(0.0) += value;
        }
    }
    values.sort_keys();
    debug!("mapped gene families onto {} reactions", values.len());
    ReactionEvidence { values }
}

/// Restricts a stratified abundance table to one organism and expands it the
/// same way, so per-organism pathway results use organism-restricted
/// reaction evidence.
pub fn map_stratum_to_reactions(
    abundance: &FeatureAbundance,
    organism: &str,
    mapping: &ReactionMap,
) -> ReactionEvidence {
    let mut values: IndexMap<String, f64> = IndexMap::new();
    if let Some(strata) = abundance.stratified.as_ref() {
        for ((feature, tag), &value) in strata {
            if tag != organism || feature == UNMAPPED_FEATURE {
                continue;
            }
            for reaction in mapping.reactions_for(feature) {
                *values.entry(reaction.clone()).or_insert(0.0) += value;
            }
        }
    }
    values.sort_keys();
    ReactionEvidence { values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::Unit;
    use crate::reference::ReactionMap;
    use approx::assert_relative_eq;
    use indexmap::IndexMap;

    fn abundance(entries: &[(&str, f64)]) -> FeatureAbundance {
        FeatureAbundance {
            unit: Unit::Rpk,
            values: entries.iter().map(|(id, v)| (id.to_string(), *v)).collect(),
            stratified: None,
        }
    }

    fn mapping(pairs: &[(&str, &str)]) -> ReactionMap {
        ReactionMap::from_pairs(
            pairs
                .iter()
                .map(|(r, f)| (r.to_string(), f.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    #[test]
    fn test_many_to_many_expansion() {
        let table = abundance(&[("F1", 2.0), ("F2", 3.0)]);
        let map = mapping(&[("R1", "F1"), ("R1", "F2"), ("R2", "F1")]);

        let evidence = map_to_reactions(&table, &map);
        assert_relative_eq!(evidence.get("R1"), 5.0);
        assert_relative_eq!(evidence.get("R2"), 2.0);
    }

    #[test]
    fn test_duplicate_mapping_rules_count_once() {
        let table = abundance(&[("F1", 2.0)]);
        // The same edge stated twice collapses inside ReactionMap.
        let map = mapping(&[("R1", "F1"), ("R1", "F1")]);

        let evidence = map_to_reactions(&table, &map);
        assert_relative_eq!(evidence.get("R1"), 2.0);
    }

    #[test]
    fn test_unmapped_pseudo_feature_excluded() {
        let table = abundance(&[("UNMAPPED", 100.0), ("F1", 1.0)]);
        let map = mapping(&[("R1", "F1"), ("R1", "UNMAPPED")]);

        let evidence = map_to_reactions(&table, &map);
        assert_relative_eq!(evidence.get("R1"), 1.0);
    }

    #[test]
    fn test_order_independence() {
        let forward = abundance(&[("F1", 2.0), ("F2", 3.0)]);
        let reversed = abundance(&[("F2", 3.0), ("F1", 2.0)]);
        let map = mapping(&[("R1", "F1"), ("R1", "F2"), ("R2", "F2")]);

        let a = map_to_reactions(&forward, &map);
        let b = map_to_reactions(&reversed, &map);

        assert_eq!(
            a.values.keys().collect::<Vec<_>>(),
            b.values.keys().collect::<Vec<_>>()
        );
        for (reaction, &value) in &a.values {
            assert_relative_eq!(b.values[reaction], value);
        }
    }

    #[test]
    fn test_feature_without_mapping_is_ignored() {
        let table = abundance(&[("F9", 7.0)]);
        let map = mapping(&[("R1", "F1")]);

        let evidence = map_to_reactions(&table, &map);
        assert!(evidence.values.is_empty());
    }

    #[test]
    fn test_stratum_restriction() {
        let mut table = abundance(&[("F1", 5.0)]);
        let mut strata: IndexMap<(String, String), f64> = IndexMap::new();
        strata.insert(("F1".to_string(), "g__A".to_string()), 3.0);
        strata.insert(("F1".to_string(), "g__B".to_string()), 2.0);
        table.stratified = Some(strata);
        let map = mapping(&[("R1", "F1")]);

        let a = map_stratum_to_reactions(&table, "g__A", &map);
        let b = map_stratum_to_reactions(&table, "g__B", &map);
        assert_relative_eq!(a.get("R1"), 3.0);
        assert_relative_eq!(b.get("R1"), 2.0);
    }
}
