//! Provides functions for normalizing raw gene-family counts.
//!
//! Raw hit counts are first length-normalized to reads-per-kilobase (RPK),
//! then optionally rescaled to relative abundance or copies-per-million.
//! The unmapped-read bucket stays in every denominator so relative values
//! reflect the whole community, not only the classified fraction.

use clap::ValueEnum;
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::reference::FeatureLengths;
use crate::resolver::FeatureCounts;

/// Reserved feature id for the unmapped-read pseudo-feature. Carried through
/// every unit so the reported table always accounts for the full read total.
pub const UNMAPPED_FEATURE: &str = "UNMAPPED";

/// Reporting unit for gene-family abundance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Reads per kilobase of feature length.
    Rpk,
    /// Fraction of total community RPK (sums to 1 across the table).
    Relab,
    /// Relative abundance scaled to copies per million.
    Cpm,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Rpk => "RPK",
            Unit::Relab => "relab",
            Unit::Cpm => "CPM",
        }
    }
}

/// Normalized per-feature abundance for one sample, tagged with its unit.
/// Immutable once computed; requesting a different unit means recomputing
/// from the raw counts, never mutating a previously returned table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureAbundance {
    pub unit: Unit,
    /// feature_id -> abundance; includes the UNMAPPED pseudo-feature.
    pub values: IndexMap<String, f64>,
    /// (feature_id, organism) -> abundance, when stratification is on.
    pub stratified: Option<IndexMap<(String, String), f64>>,
}

/// Converts raw counts to the requested unit.
///
/// RPK(f) = count(f) / length_kb(f). The unmapped pseudo-feature has RPK
/// equal to the unmapped read count (length 1 kb by definition). relab
/// divides by the total RPK including UNMAPPED; CPM is relab scaled by 1e6.
/// An empty sample produces an all-zero table, never an error.
pub fn normalize(counts: &FeatureCounts, lengths: &FeatureLengths, unit: Unit) -> FeatureAbundance {
    let mut rpk: IndexMap<String, f64> = IndexMap::with_capacity(counts.counts.len() + 1);
    for (feature, &count) in &counts.counts {
        rpk.insert(feature.clone(), rpk_value(feature, count, lengths));
    }
    rpk.insert(UNMAPPED_FEATURE.to_string(), counts.unmapped_reads as f64);

    let mut stratified_rpk = counts.stratified.as_ref().map(|strata| {
        strata
            .iter()
            .map(|((feature, organism), &count)| {
                (
                    (feature.clone(), organism.clone()),
                    rpk_value(feature, count, lengths),
                )
            })
            .collect::<IndexMap<(String, String), f64>>()
    });

    match unit {
        Unit::Rpk => {}
        Unit::Relab | Unit::Cpm => {
            let total: f64 = rpk.values().sum();
            let scale = if unit == Unit::Cpm { 1_000_000.0 } else { 1.0 };
            if total > 0.0 {
                for value in rpk.values_mut() {
                    *value = *value / total * scale;
                }
                // Stratified values share the community denominator so the
                // per-organism rows of a feature sum to its community row.
                if let Some(strata) = stratified_rpk.as_mut() {
                    for value in strata.values_mut() {
                        *value = *value / total * scale;
                    }
                }
            } else {
                warn!(
                    "sample has zero total RPK; emitting all-zero {} table",
                    unit.as_str()
                );
                for value in rpk.values_mut() {
                    *value = 0.0;
                }
                if let Some(strata) = stratified_rpk.as_mut() {
                    for value in strata.values_mut() {
                        *value = 0.0;
                    }
                }
            }
        }
    }

    FeatureAbundance {
        unit,
        values: rpk,
        stratified: stratified_rpk,
    }
}

fn rpk_value(feature: &str, count: f64, lengths: &FeatureLengths) -> f64 {
    match lengths.get(feature) {
        Some(length_bases) if length_bases > 0 => count / (length_bases as f64 / 1000.0),
        Some(_) => {
            warn!(
                "feature '{}' has zero length; treating as zero evidence",
                feature
            );
            0.0
        }
        None => {
            // Absent from the reference length table: zero evidence, not an error.
            warn!(
                "feature '{}' missing from length table; treating as zero evidence",
                feature
            );
            0.0
        }
    }
}
