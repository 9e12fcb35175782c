//! Per-sample quantification processor.
//!
//! Runs one sample through ingestion, gene-family resolution,
//! normalization, reaction mapping, pathway reconciliation, and pathway
//! evaluation, against a shared read-only reference context. `run_samples`
//! distributes a batch across rayon workers; per-sample failures are
//! isolated and reported individually.

use itertools::Itertools;
use log::{info, warn};
use rayon::prelude::*;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::ingest::{ingest_hits, AlignmentHit, HitFilter};
use crate::normalization::{normalize, FeatureAbundance};
use crate::pathways::calculator::{evaluate_pathways, EvalOptions, PathwayResult};
use crate::pathways::minpath::reconcile;
use crate::pipeline::EngineError;
use crate::reactions::{map_stratum_to_reactions, map_to_reactions};
use crate::reference::ReferenceContext;
use crate::resolver::resolve_features;

/// Reserved pathway id for detected reaction evidence that no pathway
/// covers after reconciliation. Reported, never silently dropped.
pub const UNINTEGRATED_PATHWAY: &str = "UNINTEGRATED";

/// Everything the engine needs for one sample. Hits are already parsed by
/// the input feed; `total_reads`, when the aligner reports it, accounts for
/// reads that never aligned at all.
#[derive(Debug, Default)]
pub struct SampleInput {
    pub sample_id: String,
    pub nucleotide_hits: Vec<AlignmentHit>,
    pub translated_hits: Vec<AlignmentHit>,
    pub total_reads: Option<u64>,
}

/// Complete per-sample output: the gene-family table and the pathway table,
/// with stratified rows carried inside each.
#[derive(Debug)]
pub struct SampleOutput {
    pub sample_id: String,
    pub gene_families: FeatureAbundance,
    pub pathways: Vec<PathwayResult>,
    pub total_reads: u64,
    pub unmapped_reads: u64,
    /// Community-level orphan reaction evidence (also present as the
    /// UNINTEGRATED row of `pathways`).
    pub unintegrated_evidence: f64,
}

/// One processor drives any number of samples; it owns the validated
/// configuration and a handle to the shared reference context.
pub struct SampleProcessor {
    config: EngineConfig,
    reference: Arc<ReferenceContext>,
}

impl SampleProcessor {
    /// Validates the configuration up front; a bad configuration never gets
    /// as far as touching sample data.
    pub fn new(
        config: EngineConfig,
        reference: Arc<ReferenceContext>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(SampleProcessor { config, reference })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs every stage for one sample.
    pub fn process(&self, input: &SampleInput) -> Result<SampleOutput, EngineError> {
        info!("processing sample '{}'", input.sample_id);

        let filter = HitFilter {
            min_identity: self.config.identity_threshold,
            min_length: self.config.length_threshold,
        };
        let ingested = ingest_hits(
            &input.nucleotide_hits,
            &input.translated_hits,
            input.total_reads,
            filter,
        )?;
        if ingested.candidates.is_empty() {
            warn!(
                "sample '{}' has no usable evidence; emitting zero tables",
                input.sample_id
            );
        }

        let counts = resolve_features(
            &ingested,
            self.config.score_tie_tolerance,
            self.config.stratify,
        );
        let gene_families = normalize(
            &counts,
            &self.reference.lengths,
            self.config.normalization_unit,
        );

        let options = EvalOptions {
            gapfill_enabled: self.config.gapfill_enabled,
            min_coverage_threshold: self.config.min_coverage_threshold,
        };

        // Community-level pathway quantification.
        let evidence = map_to_reactions(&gene_families, &self.reference.reactions);
        let reconciliation = reconcile(&self.reference.pathways, &evidence);
        let unintegrated_evidence = reconciliation.orphan_total();
        let mut pathways = Vec::new();
        if !(self.config.omit_zero_pathways && unintegrated_evidence == 0.0) {
            pathways.push(PathwayResult {
                pathway_id: UNINTEGRATED_PATHWAY.to_string(),
                abundance: unintegrated_evidence,
                coverage: 0.0,
                organism: None,
            });
        }
        pathways.extend(evaluate_pathways(
            &reconciliation.selected,
            &self.reference.pathways,
            &evidence,
            options,
            self.config.omit_zero_pathways,
            None,
        ));

        // Stratified quantification: the same algorithms on each organism's
        // restricted evidence, tagged with the organism.
        if self.config.stratify {
            let organisms: Vec<String> = gene_families
                .stratified
                .iter()
                .flat_map(|strata| strata.keys().map(|(_, organism)| organism.clone()))
                .unique()
                .sorted_unstable()
                .collect();

            for organism in &organisms {
                let stratum_evidence =
                    map_stratum_to_reactions(&gene_families, organism, &self.reference.reactions);
                let stratum_reconciliation =
                    reconcile(&self.reference.pathways, &stratum_evidence);
                let stratum_orphans = stratum_reconciliation.orphan_total();
                if !(self.config.omit_zero_pathways && stratum_orphans == 0.0) {
                    pathways.push(PathwayResult {
                        pathway_id: UNINTEGRATED_PATHWAY.to_string(),
                        abundance: stratum_orphans,
                        coverage: 0.0,
                        organism: Some(organism.clone()),
                    });
                }
                pathways.extend(evaluate_pathways(
                    &stratum_reconciliation.selected,
                    &self.reference.pathways,
                    &stratum_evidence,
                    options,
                    self.config.omit_zero_pathways,
                    Some(organism),
                ));
            }
        }

        info!(
            "sample '{}': {} gene families, {} pathway rows, {} unmapped of {} reads",
            input.sample_id,
            gene_families.values.len().saturating_sub(1),
            pathways.len(),
            counts.unmapped_reads,
            counts.total_reads
        );

        Ok(SampleOutput {
            sample_id: input.sample_id.clone(),
            gene_families,
            pathways,
            total_reads: counts.total_reads,
            unmapped_reads: counts.unmapped_reads,
            unintegrated_evidence,
        })
    }
}

/// Processes a batch of samples in parallel. Every sample gets its own
/// worker and private intermediate tables; results and failures come back
/// per sample, in input order, so one structural error cannot abort the
/// rest of the batch.
pub fn run_samples(
    processor: &SampleProcessor,
    inputs: &[SampleInput],
) -> Vec<(String, Result<SampleOutput, EngineError>)> {
    inputs
        .par_iter()
        .map(|input| (input.sample_id.clone(), processor.process(input)))
        .collect()
}
