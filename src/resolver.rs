//! Gene-family resolution stage.
//!
//! Turns the per-read candidate hits from ingestion into per-feature raw
//! counts. Each read contributes exactly one unit of evidence: the hits
//! within the score-tie tolerance of the read's best hit form its tied set,
//! and each tied hit receives weight 1/|tied set|. When stratification is
//! enabled the same weights are also accumulated per (feature, organism),
//! so a tied set spanning several organisms splits the read across them.

use indexmap::IndexMap;
use log::debug;

use crate::ingest::IngestedHits;

/// Organism label used for hits that carry no organism tag.
pub const UNCLASSIFIED_ORGANISM: &str = "unclassified";

/// Raw per-feature hit counts for one sample. Counts are fractional because
/// multi-mapped reads split their weight among tied features.
#[derive(Debug, Default)]
pub struct FeatureCounts {
    /// feature_id -> summed weight across all reads.
    pub counts: IndexMap<String, f64>,

    /// (feature_id, organism) -> summed weight; only populated when
    /// stratification is enabled.
    pub stratified: Option<IndexMap<(String, String), f64>>,

    pub unmapped_reads: u64,
    pub total_reads: u64,
}

impl FeatureCounts {
    /// Sum of all per-feature weights. With weight conservation this equals
    /// the number of classified reads.
    pub fn classified_total(&self) -> f64 {
        self.counts.values().sum()
    }
}

/// Resolves every read's candidate hits into feature counts.
///
/// Ties: all hits whose score is within `score_tie_tolerance` of the read's
/// best score share the read uniformly. The weights assigned for a single
/// read always sum to exactly 1.
pub fn resolve_features(
    ingested: &IngestedHits,
    score_tie_tolerance: f64,
    stratify: bool,
) -> FeatureCounts {
    let mut counts: IndexMap<String, f64> = IndexMap::new();
    let mut stratified: Option<IndexMap<(String, String), f64>> =
        stratify.then(IndexMap::new);

    for hits in ingested.candidates.values() {
        if hits.is_empty() {
            continue;
        }
        let best = hits
            .iter()
            .map(|h| h.score)
            .fold(f64::NEG_INFINITY, f64::max);
        let tied: Vec<_> = hits
            .iter()
            .filter(|h| best - h.score <= score_tie_tolerance)
            .collect();
        let weight = 1.0 / tied.len() as f64;

        for hit in tied {
            *counts.entry(hit.feature_id.clone()).or_insert(0.0) += weight;
            if let Some(strata) = stratified.as_mut() {
                let organism = hit
                    .organism
                    .clone()
                    .unwrap_or_else(|| UNCLASSIFIED_ORGANISM.to_string());
                *strata
                    .entry((hit.feature_id.clone(), organism))
                    .or_insert(0.0) += weight;
            }
        }
    }

    counts.sort_keys();
    if let Some(strata) = stratified.as_mut() {
        strata.sort_keys();
    }

    debug!(
        "resolved {} features from {} classified reads",
        counts.len(),
        ingested.candidates.len()
    );

    FeatureCounts {
        counts,
        stratified,
        unmapped_reads: ingested.unmapped_reads,
        total_reads: ingested.total_reads,
    }
}
