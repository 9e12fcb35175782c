//! Hit ingestion stage.
//!
//! Consumes the raw alignment hit records produced by the upstream aligners
//! (nucleotide alignments against pangenomes, translated-search alignments
//! against the protein catalog), applies per-hit quality thresholds, and
//! groups the survivors per read. Nucleotide evidence takes precedence: a
//! read with any surviving nucleotide hit discards its translated hits
//! entirely, since the pangenome alignment already explains it.

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("malformed hit record at position {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
}

/// A single alignment hit as delivered by the aligner feed. Immutable once
/// constructed; identity is a fraction in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentHit {
    pub read_id: String,
    pub feature_id: String,
    pub score: f64,
    pub identity: f64,
    pub alignment_length: usize,
    pub organism: Option<String>,
}

impl AlignmentHit {
    /// Structural validation of a single record. Silent acceptance of a bad
    /// record would corrupt weight conservation downstream, so the whole
    /// ingestion aborts on the first failure.
    fn check(&self, index: usize) -> Result<(), IngestError> {
        if self.read_id.is_empty() {
            return Err(IngestError::MalformedRecord {
                index,
                reason: "empty read id".to_string(),
            });
        }
        if self.feature_id.is_empty() {
            return Err(IngestError::MalformedRecord {
                index,
                reason: format!("read '{}' has an empty feature id", self.read_id),
            });
        }
        if !(0.0..=1.0).contains(&self.identity) || !self.identity.is_finite() {
            return Err(IngestError::MalformedRecord {
                index,
                reason: format!(
                    "read '{}': identity {} outside [0, 1]",
                    self.read_id, self.identity
                ),
            });
        }
        if !self.score.is_finite() {
            return Err(IngestError::MalformedRecord {
                index,
                reason: format!("read '{}': non-finite score", self.read_id),
            });
        }
        Ok(())
    }
}

/// Surviving candidate hits grouped per read, plus the counters needed to
/// keep the total-read denominator honest.
#[derive(Debug, Default)]
pub struct IngestedHits {
    /// read_id -> hits that passed quality filtering, one entry per read
    /// that had at least one surviving hit.
    pub candidates: IndexMap<String, Vec<AlignmentHit>>,

    /// Reads seen in the feed that lost every hit to filtering, plus any
    /// reads the caller reported as never aligned.
    pub unmapped_reads: u64,

    /// Total usable reads: classified + unmapped.
    pub total_reads: u64,
}

/// Quality filter applied to each incoming hit.
#[derive(Debug, Clone, Copy)]
pub struct HitFilter {
    pub min_identity: f64,
    pub min_length: usize,
}

impl HitFilter {
    fn accepts(&self, hit: &AlignmentHit) -> bool {
        hit.identity >= self.min_identity && hit.alignment_length >= self.min_length
    }
}

/// Filters and merges the nucleotide and translated hit feeds for one sample.
///
/// `total_input_reads`, when known by the caller (the aligner knows how many
/// reads it attempted), sets the denominator; reads in that total that never
/// appear in either feed are counted as unmapped. When absent, the
/// denominator is the number of distinct reads observed in the feeds.
pub fn ingest_hits(
    nucleotide_hits: &[AlignmentHit],
    translated_hits: &[AlignmentHit],
    total_input_reads: Option<u64>,
    filter: HitFilter,
) -> Result<IngestedHits, IngestError> {
    let mut candidates: IndexMap<String, Vec<AlignmentHit>> = IndexMap::new();
    let mut seen_reads: IndexMap<String, ()> = IndexMap::new();
    let mut dropped = 0usize;

    for (index, hit) in nucleotide_hits.iter().enumerate() {
        hit.check(index)?;
        seen_reads.insert(hit.read_id.clone(), ());
        if filter.accepts(hit) {
            candidates
                .entry(hit.read_id.clone())
                .or_default()
                .push(hit.clone());
        } else {
            dropped += 1;
        }
    }

    // The nucleotide tier claims a read only when at least one nucleotide
    // hit survives filtering; translated hits for claimed reads are
    // discarded (the read is already explained).
    let nucleotide_claimed: std::collections::HashSet<String> =
        candidates.keys().cloned().collect();

    for (index, hit) in translated_hits.iter().enumerate() {
        hit.check(index)?;
        seen_reads.insert(hit.read_id.clone(), ());
        if nucleotide_claimed.contains(&hit.read_id) {
            continue;
        }
        if filter.accepts(hit) {
            candidates
                .entry(hit.read_id.clone())
                .or_default()
                .push(hit.clone());
        } else {
            dropped += 1;
        }
    }

    let classified = candidates.len() as u64;
    let observed = seen_reads.len() as u64;
    let total_reads = match total_input_reads {
        Some(total) if total >= observed => total,
        Some(total) => {
            warn!(
                "caller-reported total reads ({}) below observed reads ({}); using observed",
                total, observed
            );
            observed
        }
        None => observed,
    };
    let unmapped_reads = total_reads - classified;

    debug!(
        "ingested {} reads ({} classified, {} unmapped, {} hits dropped by filter)",
        total_reads, classified, unmapped_reads, dropped
    );
    if classified == 0 {
        warn!("sample has zero usable hits; downstream tables will be all-zero");
    }

    // Deterministic read order regardless of feed ordering.
    candidates.sort_keys();

    Ok(IngestedHits {
        candidates,
        unmapped_reads,
        total_reads,
    })
}
