//! Pathway reconciliation (MinPath core).
//!
//! A single detected gene family can structurally support reactions in
//! dozens of pathways, so raw reaction evidence is full of false-positive
//! pathway signals. This stage keeps only a minimal set of pathways that
//! explains every detected reaction: a greedy set cover over the bipartite
//! pathway-reaction evidence graph. Greedy cover is the standard
//! log-approximation to the NP-hard minimum cover; here precision (dropping
//! promiscuous pathways) matters more than optimality, and the greedy rule
//! is deterministic and fast.
//!
//! Tie-break order when several pathways cover equally many uncovered
//! reactions: fewer total reactions first (prefer the more specific
//! pathway), then lexically smaller pathway id. Detected reactions that no
//! pathway references are reported as orphan evidence, never dropped.

use indexmap::{IndexMap, IndexSet};
use log::{debug, info};

use crate::pathways::PathwayStructure;
use crate::reactions::ReactionEvidence;

/// Outcome of reconciliation for one sample.
#[derive(Debug, Default)]
pub struct Reconciliation {
    /// Pathways retained by the greedy cover, sorted by pathway id.
    pub selected: Vec<String>,

    /// Detected reactions referenced by no pathway definition, with their
    /// evidence. Summed into the UNINTEGRATED output row downstream.
    pub orphan_evidence: IndexMap<String, f64>,
}

impl Reconciliation {
    pub fn orphan_total(&self) -> f64 {
        self.orphan_evidence.values().sum()
    }
}

/// Selects the minimal pathway set covering all detected reactions.
pub fn reconcile(
    pathways: &IndexMap<String, PathwayStructure>,
    evidence: &ReactionEvidence,
) -> Reconciliation {
    // Edge set of the bipartite graph: pathway -> detected reactions its
    // structure references. Pathways with no detected reaction never enter
    // the candidate pool.
    let detected: IndexSet<&str> = evidence.detected().map(|(id, _)| id).collect();
    let mut candidates: Vec<(&str, IndexSet<&str>, usize)> = Vec::new();
    let mut coverable: IndexSet<&str> = IndexSet::new();
    for (pathway_id, structure) in pathways {
        let reactions = structure.reactions();
        let present: IndexSet<&str> = reactions
            .iter()
            .copied()
            .filter(|r| detected.contains(r))
            .collect();
        if !present.is_empty() {
            coverable.extend(present.iter().copied());
            candidates.push((pathway_id.as_str(), present, reactions.len()));
        }
    }

    let orphan_evidence: IndexMap<String, f64> = evidence
        .detected()
        .filter(|(id, _)| !coverable.contains(id))
        .map(|(id, v)| (id.to_string(), v))
        .collect();
    if !orphan_evidence.is_empty() {
        info!(
            "{} detected reactions are covered by no pathway; reporting as unintegrated",
            orphan_evidence.len()
        );
    }

    let mut uncovered = coverable;
    let mut selected = Vec::new();
    while !uncovered.is_empty() {
        // Greedy step: most newly covered reactions wins; ties fall to the
        // pathway with fewer total reactions, then the lexically smaller id.
        let best = candidates
            .iter()
            .enumerate()
            .map(|(index, (id, present, size))| {
                let gain = present.iter().filter(|r| uncovered.contains(**r)).count();
                (gain, *size, *id, index)
            })
            .filter(|(gain, _, _, _)| *gain > 0)
            .min_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(b.2)));

        let Some((gain, _, winner, index)) = best else {
            break; // nothing covers the remainder
        };
        debug!("selected pathway '{}' covering {} new reactions", winner, gain);

        for reaction in &candidates[index].1 {
            uncovered.swap_remove(reaction);
        }
        selected.push(winner.to_string());
    }

    selected.sort_unstable();
    debug!(
        "reconciliation kept {} of {} pathways",
        selected.len(),
        pathways.len()
    );

    Reconciliation {
        selected,
        orphan_evidence,
    }
}
