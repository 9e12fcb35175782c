//! Main entry point for the pathquant application.
//!
//! pathquant converts alignment evidence (nucleotide hits against
//! pangenomes, translated-search hits against a protein catalog) into
//! gene-family and metabolic-pathway abundance and coverage tables for a
//! microbial community sample:
//! 1. Ingest and quality-filter alignment hits.
//! 2. Resolve multi-mapped reads into per-gene-family counts.
//! 3. Normalize counts (RPK, relative abundance, or copies-per-million).
//! 4. Expand gene families into per-reaction evidence.
//! 5. Reconcile pathways with a greedy minimal set cover (MinPath).
//! 6. Evaluate pathway abundance and coverage over structure trees.

mod cli;
mod config;
mod ingest;
mod io;
mod normalization;
mod pathways;
mod pipeline;
mod reactions;
mod reference;
mod resolver;

use anyhow::Result;
use clap::Parser;
use cli::{run_cli, Cli};
use log::info;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    // Worker pool for sample-level parallelism; 0 lets rayon pick.
    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()?;
        info!("using {} threads", cli.threads);
    }

    run_cli(cli)
}
