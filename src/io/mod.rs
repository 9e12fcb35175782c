//! Input/Output operations module.
//!
//! Reads alignment hit feeds (plain or gzip-compressed TSV) and writes the
//! gene-family and pathway result tables. The core engine never touches
//! files; everything here belongs to the calling layer.
//!
//! Hit feed format, one hit per row, tab-separated:
//!
//! ```text
//! read_id  feature_id  identity(0-1)  alignment_length  score  [organism]
//! ```

use flate2::read::MultiGzDecoder;
use log::info;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::ingest::AlignmentHit;
use crate::normalization::UNMAPPED_FEATURE;
use crate::pipeline::{EngineError, SampleOutput};

/// Opens a hit feed, transparently decompressing `.gz` paths.
fn open_feed(path: &Path) -> Result<Box<dyn Read>, EngineError> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Reads one alignment hit feed into memory. Any malformed row is a
/// structural input error that fails the whole feed: silently skipping rows
/// would corrupt the downstream read denominator.
pub fn read_hits(path: &Path) -> Result<Vec<AlignmentHit>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(open_feed(path)?);

    let mut hits = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let line = index + 1;
        let record = record.map_err(|e| {
            EngineError::StructuralInput(format!("{}, line {}: {}", path.display(), line, e))
        })?;
        if record.len() < 5 {
            return Err(EngineError::StructuralInput(format!(
                "{}, line {}: expected at least 5 columns, got {}",
                path.display(),
                line,
                record.len()
            )));
        }
        let field = |i: usize| record.get(i).unwrap_or("").trim();
        let parse_f64 = |i: usize, what: &str| -> Result<f64, EngineError> {
            field(i).parse().map_err(|_| {
                EngineError::StructuralInput(format!(
                    "{}, line {}: {} '{}' is not a number",
                    path.display(),
                    line,
                    what,
                    field(i)
                ))
            })
        };
        let alignment_length: usize = field(3).parse().map_err(|_| {
            EngineError::StructuralInput(format!(
                "{}, line {}: alignment length '{}' is not a non-negative integer",
                path.display(),
                line,
                field(3)
            ))
        })?;

        hits.push(AlignmentHit {
            read_id: field(0).to_string(),
            feature_id: field(1).to_string(),
            identity: parse_f64(2, "identity")?,
            alignment_length,
            score: parse_f64(4, "score")?,
            organism: record
                .get(5)
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(|o| o.to_string()),
        });
    }
    info!("read {} hits from {}", hits.len(), path.display());
    Ok(hits)
}

/// Writes the gene-family abundance table as TSV. The UNMAPPED row comes
/// first, then features in sorted order; stratified rows follow their
/// community row as `feature|organism`.
pub fn write_gene_families(output: &SampleOutput, path: &Path) -> Result<(), EngineError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let table = &output.gene_families;

    writeln!(
        writer,
        "# gene_family\t{}_{}",
        output.sample_id,
        table.unit.as_str()
    )?;
    if let Some(&unmapped) = table.values.get(UNMAPPED_FEATURE) {
        writeln!(writer, "{}\t{}", UNMAPPED_FEATURE, unmapped)?;
    }
    for (feature, value) in &table.values {
        if feature == UNMAPPED_FEATURE {
            continue;
        }
        writeln!(writer, "{}\t{}", feature, value)?;
        if let Some(strata) = table.stratified.as_ref() {
            for ((f, organism), stratum_value) in strata {
                if f == feature {
                    writeln!(writer, "{}|{}\t{}", feature, organism, stratum_value)?;
                }
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes the pathway result table as TSV: pathway, abundance, coverage.
/// Stratified rows are rendered as `pathway|organism`.
pub fn write_pathway_results(output: &SampleOutput, path: &Path) -> Result<(), EngineError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "# pathway\tabundance\tcoverage")?;
    for result in &output.pathways {
        match result.organism.as_deref() {
            Some(organism) => writeln!(
                writer,
                "{}|{}\t{}\t{}",
                result.pathway_id, organism, result.abundance, result.coverage
            )?,
            None => writeln!(
                writer,
                "{}\t{}\t{}",
                result.pathway_id, result.abundance, result.coverage
            )?,
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::{FeatureAbundance, Unit};
    use crate::pathways::calculator::PathwayResult;
    use approx::assert_relative_eq;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use tempfile::tempdir;

    fn write_feed(dir: &tempfile::TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_hits_basic() {
        let dir = tempdir().unwrap();
        let path = write_feed(
            &dir,
            "hits.tsv",
            "r1\tF1\t0.95\t80\t120.5\tg__Eco\nr2\tF2\t0.80\t60\t90\n",
        );
        let hits = read_hits(&path).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].read_id, "r1");
        assert_eq!(hits[0].organism.as_deref(), Some("g__Eco"));
        assert_relative_eq!(hits[0].identity, 0.95);
        assert_eq!(hits[1].organism, None);
        assert_relative_eq!(hits[1].score, 90.0);
    }

    #[test]
    fn test_read_hits_gzip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hits.tsv.gz");
        let file = File::create(&path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder
            .write_all(b"r1\tF1\t0.9\t50\t100\nr2\tF1\t0.8\t40\t80\n")
            .unwrap();
        encoder.finish().unwrap();

        let hits = read_hits(&path).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].alignment_length, 40);
    }

    #[test]
    fn test_read_hits_malformed_row_fails() {
        let dir = tempdir().unwrap();
        let short = write_feed(&dir, "short.tsv", "r1\tF1\t0.9\n");
        assert!(matches!(
            read_hits(&short),
            Err(EngineError::StructuralInput(_))
        ));

        let bad_number = write_feed(&dir, "bad.tsv", "r1\tF1\tnot-a-number\t50\t100\n");
        assert!(matches!(
            read_hits(&bad_number),
            Err(EngineError::StructuralInput(_))
        ));
    }

    fn sample_output() -> SampleOutput {
        SampleOutput {
            sample_id: "S1".to_string(),
            gene_families: FeatureAbundance {
                unit: Unit::Rpk,
                values: [
                    ("F1".to_string(), 2.0),
                    ("F2".to_string(), 1.0),
                    ("UNMAPPED".to_string(), 3.0),
                ]
                .into_iter()
                .collect(),
                stratified: Some(
                    [
                        (("F1".to_string(), "g__A".to_string()), 1.5),
                        (("F1".to_string(), "g__B".to_string()), 0.5),
                    ]
                    .into_iter()
                    .collect(),
                ),
            },
            pathways: vec![
                PathwayResult {
                    pathway_id: "UNINTEGRATED".to_string(),
                    abundance: 0.25,
                    coverage: 0.0,
                    organism: None,
                },
                PathwayResult {
                    pathway_id: "PWY-A".to_string(),
                    abundance: 1.0,
                    coverage: 1.0,
                    organism: None,
                },
                PathwayResult {
                    pathway_id: "PWY-A".to_string(),
                    abundance: 0.5,
                    coverage: 0.5,
                    organism: Some("g__A".to_string()),
                },
            ],
            total_reads: 6,
            unmapped_reads: 3,
            unintegrated_evidence: 0.25,
        }
    }

    #[test]
    fn test_write_gene_families_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genefamilies.tsv");
        write_gene_families(&sample_output(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let expected = "\
# gene_family\tS1_RPK\n\
UNMAPPED\t3\n\
F1\t2\n\
F1|g__A\t1.5\n\
F1|g__B\t0.5\n\
F2\t1\n";
        assert_eq!(content, expected);
    }

    #[test]
    fn test_write_pathway_results_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pathways.tsv");
        write_pathway_results(&sample_output(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let expected = "\
# pathway\tabundance\tcoverage\n\
UNINTEGRATED\t0.25\t0\n\
PWY-A\t1\t1\n\
PWY-A|g__A\t0.5\t0.5\n";
        assert_eq!(content, expected);
    }
}
