//! Reference data loading.
//!
//! Holds the static tables the engine needs: per-feature reference lengths,
//! the many-to-many gene-family-to-reaction mapping, and pathway structure
//! definitions. Everything here is loaded once per run and then shared
//! read-only across concurrently processed samples (via `Arc`), so no
//! locking is needed. The mapping is stored as adjacency tables indexed in
//! both directions rather than an object graph.
//!
//! Missing entries are never errors: a feature absent from the length table
//! or a reaction no pathway references simply contributes zero evidence.

use indexmap::IndexMap;
use log::{info, warn};
use std::path::Path;
use thiserror::Error;

use crate::pathways::{PathwayStructure, StructureParseError};

#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("I/O error reading reference table: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed reference table row: {0}")]
    Malformed(#[from] csv::Error),

    #[error("{path}, line {line}: {reason}")]
    BadRow {
        path: String,
        line: u64,
        reason: String,
    },

    #[error("pathway '{pathway}': {source}")]
    BadStructure {
        pathway: String,
        source: StructureParseError,
    },

    #[error("failed to parse JSON pathway definitions: {0}")]
    Json(#[from] serde_json::Error),
}

/// feature_id -> reference length in bases.
#[derive(Debug, Default)]
pub struct FeatureLengths {
    lengths: IndexMap<String, u64>,
}

impl FeatureLengths {
    pub fn from_entries(lengths: IndexMap<String, u64>) -> Self {
        FeatureLengths { lengths }
    }

    /// Loads a two-column TSV: feature_id, length in bases.
    pub fn load_tsv(path: &Path) -> Result<Self, ReferenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .comment(Some(b'#'))
            .from_path(path)?;
        let mut lengths = IndexMap::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let line = index as u64 + 1;
            let feature = field(&record, 0, path, line, "feature id")?;
            let length: u64 = field(&record, 1, path, line, "length")?
                .parse()
                .map_err(|_| ReferenceError::BadRow {
                    path: path.display().to_string(),
                    line,
                    reason: "length is not a non-negative integer".to_string(),
                })?;
            if lengths.insert(feature.to_string(), length).is_some() {
                warn!("duplicate length entry for feature '{}'; keeping the last", feature);
            }
        }
        info!("loaded {} feature lengths from {}", lengths.len(), path.display());
        Ok(FeatureLengths { lengths })
    }

    pub fn get(&self, feature: &str) -> Option<u64> {
        self.lengths.get(feature).copied()
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }
}

/// Many-to-many gene-family <-> reaction adjacency, indexed both ways.
#[derive(Debug, Default)]
pub struct ReactionMap {
    feature_to_reactions: IndexMap<String, Vec<String>>,
    reaction_to_features: IndexMap<String, Vec<String>>,
}

impl ReactionMap {
    /// Builds both indexes from (reaction, feature) pairs. Duplicate pairs
    /// collapse to one edge so no gene family can feed the same reaction
    /// twice through redundant mapping rules.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut map = ReactionMap::default();
        for (reaction, feature) in pairs {
            let reactions = map.feature_to_reactions.entry(feature.clone()).or_default();
            if !reactions.contains(&reaction) {
                reactions.push(reaction.clone());
            }
            let features = map.reaction_to_features.entry(reaction).or_default();
            if !features.contains(&feature) {
                features.push(feature);
            }
        }
        map.feature_to_reactions.sort_keys();
        map.reaction_to_features.sort_keys();
        map
    }

    /// Loads a TSV where the first column is a reaction id and every
    /// remaining column is a gene family capable of catalyzing it.
    pub fn load_tsv(path: &Path) -> Result<Self, ReferenceError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .from_path(path)?;
        let mut pairs = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let line = index as u64 + 1;
            let reaction = field(&record, 0, path, line, "reaction id")?;
            for feature in record.iter().skip(1).filter(|f| !f.is_empty()) {
                pairs.push((reaction.to_string(), feature.to_string()));
            }
        }
        let map = Self::from_pairs(pairs);
        info!(
            "loaded gene-reaction mapping from {}: {} reactions, {} gene families",
            path.display(),
            map.reaction_to_features.len(),
            map.feature_to_reactions.len()
        );
        Ok(map)
    }

    pub fn reactions_for(&self, feature: &str) -> &[String] {
        self.feature_to_reactions
            .get(feature)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn features_for(&self, reaction: &str) -> &[String] {
        self.reaction_to_features
            .get(reaction)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// All reference tables for a run, shared read-only by every sample worker.
#[derive(Debug, Default)]
pub struct ReferenceContext {
    pub lengths: FeatureLengths,
    pub reactions: ReactionMap,
    /// pathway_id -> structure, sorted by id for deterministic iteration.
    pub pathways: IndexMap<String, PathwayStructure>,
}

impl ReferenceContext {
    pub fn new(
        lengths: FeatureLengths,
        reactions: ReactionMap,
        mut pathways: IndexMap<String, PathwayStructure>,
    ) -> Self {
        pathways.sort_keys();
        ReferenceContext {
            lengths,
            reactions,
            pathways,
        }
    }
}

/// Loads pathway definitions from a two-column TSV: pathway_id, structure
/// text in the grammar described in [`crate::pathways`].
pub fn load_pathways_tsv(path: &Path) -> Result<IndexMap<String, PathwayStructure>, ReferenceError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .comment(Some(b'#'))
        .from_path(path)?;
    let mut pathways = IndexMap::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = index as u64 + 1;
        let pathway = field(&record, 0, path, line, "pathway id")?;
        let text = field(&record, 1, path, line, "structure")?;
        let structure =
            PathwayStructure::parse(text).map_err(|source| ReferenceError::BadStructure {
                pathway: pathway.to_string(),
                source,
            })?;
        if pathways.insert(pathway.to_string(), structure).is_some() {
            warn!("duplicate pathway definition for '{}'; keeping the last", pathway);
        }
    }
    pathways.sort_keys();
    info!("loaded {} pathway definitions from {}", pathways.len(), path.display());
    Ok(pathways)
}

/// Loads pathway definitions from JSON: an object mapping pathway_id to a
/// structure tree in the serde encoding of [`PathwayStructure`].
pub fn load_pathways_json(
    path: &Path,
) -> Result<IndexMap<String, PathwayStructure>, ReferenceError> {
    let text = std::fs::read_to_string(path)?;
    let mut pathways: IndexMap<String, PathwayStructure> = serde_json::from_str(&text)?;
    pathways.sort_keys();
    info!("loaded {} pathway definitions from {}", pathways.len(), path.display());
    Ok(pathways)
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    path: &Path,
    line: u64,
    what: &str,
) -> Result<&'r str, ReferenceError> {
    match record.get(index).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ReferenceError::BadRow {
            path: path.display().to_string(),
            line,
            reason: format!("missing {}", what),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }

    #[test]
    fn test_load_feature_lengths() {
        let dir = tempdir().unwrap();
        let path = write_file(&dir, "lengths.tsv", "F1\t1000\nF2\t2500\n# comment\nF3\t300\n");

        let lengths = FeatureLengths::load_tsv(&path).unwrap();
        assert_eq!(lengths.len(), 3);
        assert_eq!(lengths.get("F2"), Some(2500));
        assert_eq!(lengths.get("missing"), None);
    }

    #[test]
    fn test_bad_length_row_is_an_error() {
        let dir = tempdir().unwrap();
        let path = write_file(&dir, "lengths.tsv", "F1\tnot-a-number\n");
        assert!(FeatureLengths::load_tsv(&path).is_err());
    }

    #[test]
    fn test_reaction_map_both_directions() {
        let map = ReactionMap::from_pairs(vec![
            ("R1".to_string(), "F1".to_string()),
            ("R1".to_string(), "F2".to_string()),
            ("R2".to_string(), "F1".to_string()),
        ]);

        assert_eq!(map.reactions_for("F1"), ["R1", "R2"]);
        assert_eq!(map.features_for("R1"), ["F1", "F2"]);
        assert!(map.reactions_for("unknown").is_empty());
    }

    #[test]
    fn test_duplicate_pairs_collapse() {
        let map = ReactionMap::from_pairs(vec![
            ("R1".to_string(), "F1".to_string()),
            ("R1".to_string(), "F1".to_string()),
        ]);
        assert_eq!(map.reactions_for("F1"), ["R1"]);
        assert_eq!(map.features_for("R1"), ["F1"]);
    }

    #[test]
    fn test_load_reaction_map_tsv() {
        let dir = tempdir().unwrap();
        let path = write_file(&dir, "map.tsv", "R1\tF1\tF2\nR2\tF1\n");

        let map = ReactionMap::load_tsv(&path).unwrap();
        assert_eq!(map.features_for("R1"), ["F1", "F2"]);
        assert_eq!(map.reactions_for("F1"), ["R1", "R2"]);
    }

    #[test]
    fn test_load_pathways_tsv() {
        let dir = tempdir().unwrap();
        let path = write_file(
            &dir,
            "pathways.tsv",
            "PWY-2\tR1 ( R2 | R3 )\nPWY-1\tR4 -R5\n",
        );

        let pathways = load_pathways_tsv(&path).unwrap();
        // Sorted by pathway id for deterministic iteration.
        let ids: Vec<_> = pathways.keys().collect();
        assert_eq!(ids, ["PWY-1", "PWY-2"]);
        assert_eq!(pathways["PWY-2"].reactions(), vec!["R1", "R2", "R3"]);
    }

    #[test]
    fn test_load_pathways_bad_structure() {
        let dir = tempdir().unwrap();
        let path = write_file(&dir, "pathways.tsv", "PWY-1\tR1 ( R2\n");
        assert!(load_pathways_tsv(&path).is_err());
    }

    #[test]
    fn test_load_pathways_json() {
        let dir = tempdir().unwrap();
        let path = write_file(
            &dir,
            "pathways.json",
            r#"{"PWY-1": {"and": [{"reaction": "R1"}, {"optional": {"reaction": "R2"}}]}}"#,
        );

        let pathways = load_pathways_json(&path).unwrap();
        assert_eq!(pathways["PWY-1"].reactions(), vec!["R1", "R2"]);
    }
}
