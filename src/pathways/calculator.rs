//! Pathway abundance and coverage evaluation.
//!
//! Walks a retained pathway's combinator tree against the reaction evidence
//! attributed to it. AND nodes take the minimum of their children
//! (limiting-reactant semantics), OR nodes the maximum. OPTIONAL steps with
//! no evidence contribute nothing to abundance; with gap-filling enabled an
//! undetected optional step is treated as covered on the assumption that
//! the organism carries the step undetected.
//!
//! Pathway coverage is the fraction of structural leaf positions covered
//! after gap-filling, with one refinement: a satisfied OR subtree counts as
//! fully covered, since any one alternative satisfies the step.

use serde::{Deserialize, Serialize};

use crate::pathways::PathwayStructure;
use crate::reactions::ReactionEvidence;

/// Final per-pathway output entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathwayResult {
    pub pathway_id: String,
    pub abundance: f64,
    pub coverage: f64,
    pub organism: Option<String>,
}

/// Evaluation knobs, taken from the engine configuration.
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    pub gapfill_enabled: bool,
    /// Coverage fraction at or above which a node counts as covered.
    pub min_coverage_threshold: f64,
}

struct NodeEval {
    /// None means the node contributes nothing to the parent's abundance
    /// aggregation (an absent or gap-filled optional step).
    abundance: Option<f64>,
    covered_leaves: usize,
    total_leaves: usize,
    covered: bool,
}

/// Evaluates one pathway structure, returning (abundance, coverage).
///
/// Coverage always lies in [0, 1] and abundance is never negative; a
/// structure with no evidence evaluates to (0, 0) rather than failing.
pub fn evaluate(
    structure: &PathwayStructure,
    evidence: &ReactionEvidence,
    options: EvalOptions,
) -> (f64, f64) {
    let eval = eval_node(structure, evidence, options);
    let abundance = eval.abundance.unwrap_or(0.0).max(0.0);
    let coverage = if eval.total_leaves == 0 {
        0.0
    } else {
        eval.covered_leaves as f64 / eval.total_leaves as f64
    };
    (abundance, coverage.clamp(0.0, 1.0))
}

fn eval_node(node: &PathwayStructure, evidence: &ReactionEvidence, options: EvalOptions) -> NodeEval {
    match node {
        PathwayStructure::Reaction(id) => {
            let value = evidence.get(id);
            let covered = value > 0.0;
            NodeEval {
                abundance: Some(value),
                covered_leaves: covered as usize,
                total_leaves: 1,
                covered,
            }
        }
        PathwayStructure::And(children) => {
            let evals: Vec<NodeEval> = children
                .iter()
                .map(|c| eval_node(c, evidence, options))
                .collect();
            // Bottleneck step limits the whole sequence; optional steps
            // without evidence are skipped rather than zeroing the minimum.
            let abundance = evals
                .iter()
                .filter_map(|e| e.abundance)
                .fold(None, |acc: Option<f64>, v| {
                    Some(acc.map_or(v, |a| a.min(v)))
                });
            let covered_leaves = evals.iter().map(|e| e.covered_leaves).sum();
            let total_leaves = evals.iter().map(|e| e.total_leaves).sum();
            // AND coverage: fraction of children individually covered.
            let covered_children = evals.iter().filter(|e| e.covered).count();
            let fraction = if evals.is_empty() {
                0.0
            } else {
                covered_children as f64 / evals.len() as f64
            };
            NodeEval {
                abundance,
                covered_leaves,
                total_leaves,
                covered: fraction >= options.min_coverage_threshold && !evals.is_empty(),
            }
        }
        PathwayStructure::Or(children) => {
            let evals: Vec<NodeEval> = children
                .iter()
                .map(|c| eval_node(c, evidence, options))
                .collect();
            let abundance = evals
                .iter()
                .filter_map(|e| e.abundance)
                .fold(None, |acc: Option<f64>, v| {
                    Some(acc.map_or(v, |a| a.max(v)))
                });
            let any_covered = evals.iter().any(|e| e.covered);
            let total_leaves = evals.iter().map(|e| e.total_leaves).sum();
            // A satisfied alternation covers the whole subtree; otherwise
            // partial credit flows up from the children.
            let covered_leaves = if any_covered {
                total_leaves
            } else {
                evals.iter().map(|e| e.covered_leaves).sum()
            };
            NodeEval {
                abundance,
                covered_leaves,
                total_leaves,
                covered: any_covered,
            }
        }
        PathwayStructure::Optional(child) => {
            let eval = eval_node(child, evidence, options);
            if eval.covered {
                return eval;
            }
            if options.gapfill_enabled {
                // Assume the undetected step is present: covered for the
                // coverage ratio, absent from the abundance aggregation.
                NodeEval {
                    abundance: None,
                    covered_leaves: eval.total_leaves,
                    total_leaves: eval.total_leaves,
                    covered: true,
                }
            } else {
                NodeEval {
                    abundance: None,
                    ..eval
                }
            }
        }
    }
}

/// Evaluates every retained pathway against the sample's reaction evidence.
/// Zero-abundance pathways stay in the output unless `omit_zero` is set.
pub fn evaluate_pathways(
    retained: &[String],
    definitions: &indexmap::IndexMap<String, PathwayStructure>,
    evidence: &ReactionEvidence,
    options: EvalOptions,
    omit_zero: bool,
    organism: Option<&str>,
) -> Vec<PathwayResult> {
    let mut results = Vec::with_capacity(retained.len());
    for pathway_id in retained {
        let Some(structure) = definitions.get(pathway_id) else {
            continue;
        };
        let (abundance, coverage) = evaluate(structure, evidence, options);
        if omit_zero && abundance == 0.0 {
            continue;
        }
        results.push(PathwayResult {
            pathway_id: pathway_id.clone(),
            abundance,
            coverage,
            organism: organism.map(|o| o.to_string()),
        });
    }
    results
}
