//! Command-line front-end.
//!
//! Loads the reference tables, reads each sample's hit feeds, runs the
//! quantification pipeline across samples in parallel, and writes one
//! gene-family table and one pathway table per sample. Per-sample failures
//! are reported and reflected in the exit status without aborting the rest
//! of the batch.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::io::{read_hits, write_gene_families, write_pathway_results};
use crate::normalization::Unit;
use crate::pipeline::{run_samples, SampleInput, SampleProcessor};
use crate::reference::{
    load_pathways_json, load_pathways_tsv, FeatureLengths, ReactionMap, ReferenceContext,
};

/// Quantifies gene-family and pathway abundance from alignment evidence.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Feature length table (TSV: feature_id, length in bases).
    #[arg(long)]
    pub lengths: PathBuf,

    /// Gene-to-reaction mapping (TSV: reaction_id, gene families...).
    #[arg(long)]
    pub reactions: PathBuf,

    /// Pathway definitions: TSV (pathway_id, structure text) or JSON
    /// (by .json extension).
    #[arg(long)]
    pub pathways: PathBuf,

    /// Sample spec `ID=nucleotide_hits[,translated_hits]`; repeatable.
    /// Hit feeds may be gzip-compressed (.gz).
    #[arg(long = "sample", required = true)]
    pub samples: Vec<String>,

    /// Output directory for per-sample result tables.
    #[arg(short, long)]
    pub output: PathBuf,

    /// JSON engine configuration file; when given, the threshold flags
    /// below are ignored in its favor.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minimum alignment identity (fraction, 0-1).
    #[arg(long, default_value_t = 0.5)]
    pub identity_threshold: f64,

    /// Minimum alignment length (bases).
    #[arg(long, default_value_t = 20)]
    pub length_threshold: usize,

    /// Reporting unit for gene-family abundance.
    #[arg(long, value_enum, default_value = "rpk")]
    pub unit: Unit,

    /// Disable gap-filling of optional pathway steps.
    #[arg(long)]
    pub no_gapfill: bool,

    /// Coverage fraction at or above which a structure node counts as covered.
    #[arg(long, default_value_t = 0.5)]
    pub min_coverage: f64,

    /// Score distance from the per-read best hit within which hits tie.
    #[arg(long, default_value_t = 0.0)]
    pub tie_tolerance: f64,

    /// Also produce per-organism stratified rows.
    #[arg(long)]
    pub stratify: bool,

    /// Drop zero-abundance pathways from the output.
    #[arg(long)]
    pub omit_zero_pathways: bool,

    /// Number of worker threads (0 = all cores).
    #[arg(short = 't', long, default_value_t = 0)]
    pub threads: usize,
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig> {
        let config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => {
                let config = EngineConfig {
                    identity_threshold: self.identity_threshold,
                    length_threshold: self.length_threshold,
                    normalization_unit: self.unit,
                    gapfill_enabled: !self.no_gapfill,
                    min_coverage_threshold: self.min_coverage,
                    score_tie_tolerance: self.tie_tolerance,
                    stratify: self.stratify,
                    omit_zero_pathways: self.omit_zero_pathways,
                };
                config.validate()?;
                config
            }
        };
        Ok(config)
    }
}

/// One parsed `--sample` spec.
struct SampleSpec {
    id: String,
    nucleotide: PathBuf,
    translated: Option<PathBuf>,
}

fn parse_sample_spec(spec: &str) -> Result<SampleSpec> {
    let (id, feeds) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("sample spec '{}' is not ID=hits[,translated_hits]", spec))?;
    if id.is_empty() {
        bail!("sample spec '{}' has an empty sample id", spec);
    }
    let mut parts = feeds.splitn(2, ',');
    let nucleotide = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| anyhow!("sample spec '{}' names no hit feed", spec))?;
    let translated = parts.next().filter(|p| !p.is_empty());
    Ok(SampleSpec {
        id: id.to_string(),
        nucleotide: PathBuf::from(nucleotide),
        translated: translated.map(PathBuf::from),
    })
}

/// Main entry point for the CLI.
pub fn run_cli(cli: Cli) -> Result<()> {
    let config = cli.engine_config()?;

    info!("loading reference tables");
    let lengths = FeatureLengths::load_tsv(&cli.lengths)
        .with_context(|| format!("loading feature lengths from {}", cli.lengths.display()))?;
    let reactions = ReactionMap::load_tsv(&cli.reactions)
        .with_context(|| format!("loading gene-reaction mapping from {}", cli.reactions.display()))?;
    let pathways = if cli.pathways.extension().is_some_and(|ext| ext == "json") {
        load_pathways_json(&cli.pathways)
    } else {
        load_pathways_tsv(&cli.pathways)
    }
    .with_context(|| format!("loading pathway definitions from {}", cli.pathways.display()))?;

    let reference = Arc::new(ReferenceContext::new(lengths, reactions, pathways));
    let processor = SampleProcessor::new(config, reference)?;

    std::fs::create_dir_all(&cli.output)
        .with_context(|| format!("creating output directory {}", cli.output.display()))?;

    // Read each sample's feeds up front; a feed that fails to read marks
    // only that sample as failed.
    let mut inputs = Vec::new();
    let mut failures: Vec<(String, String)> = Vec::new();
    for spec in &cli.samples {
        let spec = parse_sample_spec(spec)?;
        let loaded = read_hits(&spec.nucleotide).and_then(|nucleotide_hits| {
            let translated_hits = match &spec.translated {
                Some(path) => read_hits(path)?,
                None => Vec::new(),
            };
            Ok(SampleInput {
                sample_id: spec.id.clone(),
                nucleotide_hits,
                translated_hits,
                total_reads: None,
            })
        });
        match loaded {
            Ok(input) => inputs.push(input),
            Err(e) => {
                error!("sample '{}' failed to load: {}", spec.id, e);
                failures.push((spec.id, e.to_string()));
            }
        }
    }

    info!("processing {} samples", inputs.len());
    for (sample_id, result) in run_samples(&processor, &inputs) {
        match result {
            Ok(output) => {
                let gene_path = cli.output.join(format!("{}_genefamilies.tsv", sample_id));
                let pathway_path = cli.output.join(format!("{}_pathways.tsv", sample_id));
                write_gene_families(&output, &gene_path)?;
                write_pathway_results(&output, &pathway_path)?;
                info!(
                    "sample '{}': wrote {} and {}",
                    sample_id,
                    gene_path.display(),
                    pathway_path.display()
                );
            }
            Err(e) => {
                error!("sample '{}' failed: {}", sample_id, e);
                failures.push((sample_id, e.to_string()));
            }
        }
    }

    if !failures.is_empty() {
        let summary = failures
            .iter()
            .map(|(id, reason)| format!("{}: {}", id, reason))
            .join("\n  ");
        bail!("{} sample(s) failed:\n  {}", failures.len(), summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_spec_full() {
        let spec = parse_sample_spec("S1=nuc.tsv,trans.tsv.gz").unwrap();
        assert_eq!(spec.id, "S1");
        assert_eq!(spec.nucleotide, PathBuf::from("nuc.tsv"));
        assert_eq!(spec.translated, Some(PathBuf::from("trans.tsv.gz")));
    }

    #[test]
    fn test_parse_sample_spec_nucleotide_only() {
        let spec = parse_sample_spec("S1=nuc.tsv").unwrap();
        assert_eq!(spec.translated, None);
    }

    #[test]
    fn test_parse_sample_spec_errors() {
        assert!(parse_sample_spec("no-equals").is_err());
        assert!(parse_sample_spec("=nuc.tsv").is_err());
        assert!(parse_sample_spec("S1=").is_err());
    }
}
