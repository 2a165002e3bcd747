//! Cross-file statistics processor.
//!
//! Merges structurally identical result files column by column. Selected
//! columns are replaced by their cross-file mean (or mean, max and min);
//! every other cell, and every `#` comment line, is copied from the
//! reference file.
//!
//! A `notFound` cell marks a job that failed. It is left out of the
//! reduction; a cell missing from every file stays `notFound`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use critsim_core::NOT_FOUND;

use crate::error::{Result, SweepError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Zero-based indices of the columns to reduce.
    pub columns: Vec<usize>,
    /// Index into the file list of the file other cells are copied from.
    #[serde(default)]
    pub reference: usize,
    /// Write mean, max and min instead of the mean alone.
    #[serde(default)]
    pub statistic: bool,
}

impl MergeConfig {
    pub fn new(columns: Vec<usize>) -> Self {
        Self {
            columns,
            reference: 0,
            statistic: false,
        }
    }

    pub fn with_reference(mut self, reference: usize) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_statistic(mut self, statistic: bool) -> Self {
        self.statistic = statistic;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Comment(String),
    Blank,
    Row(Vec<String>),
}

struct Table {
    path: PathBuf,
    lines: Vec<Line>,
}

impl Table {
    fn parse(path: &Path, content: &str) -> Self {
        let lines = content
            .lines()
            .map(|line| {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    Line::Blank
                } else if trimmed.starts_with('#') {
                    Line::Comment(line.to_string())
                } else {
                    Line::Row(trimmed.split_whitespace().map(str::to_string).collect())
                }
            })
            .collect();
        Self {
            path: path.to_path_buf(),
            lines,
        }
    }

    /// The numeric value of a cell, `None` for the `notFound` sentinel.
    fn cell(&self, line: usize, column: usize) -> Result<Option<f64>> {
        let Line::Row(cells) = &self.lines[line] else {
            return Err(self.mismatch(line, "expected a data row"));
        };
        let cell = cells
            .get(column)
            .ok_or_else(|| self.mismatch(line, &format!("column {column} out of range")))?;
        if cell == NOT_FOUND {
            return Ok(None);
        }
        cell.parse().map(Some).map_err(|_| {
            SweepError::aggregation(format!(
                "{}:{}: column {column} is not numeric: {cell:?}",
                self.path.display(),
                line + 1
            ))
        })
    }

    fn mismatch(&self, line: usize, reason: &str) -> SweepError {
        SweepError::aggregation(format!("{}:{}: {reason}", self.path.display(), line + 1))
    }
}

/// Merge the contents of `files` (path, content) into one table.
pub fn merge_contents(files: &[(PathBuf, String)], config: &MergeConfig) -> Result<String> {
    if files.is_empty() {
        return Err(SweepError::aggregation("no input files"));
    }
    if config.reference >= files.len() {
        return Err(SweepError::aggregation(format!(
            "reference index {} out of range for {} files",
            config.reference,
            files.len()
        )));
    }
    if config.columns.is_empty() {
        return Err(SweepError::aggregation("no columns selected"));
    }

    let tables: Vec<Table> = files.iter().map(|(p, c)| Table::parse(p, c)).collect();
    let layout = &tables[0];
    for table in &tables[1..] {
        if table.lines.len() != layout.lines.len() {
            return Err(SweepError::aggregation(format!(
                "{} has {} lines, {} has {}",
                table.path.display(),
                table.lines.len(),
                layout.path.display(),
                layout.lines.len()
            )));
        }
        for (i, (line, expected)) in table.lines.iter().zip(&layout.lines).enumerate() {
            match (line, expected) {
                (Line::Row(a), Line::Row(b)) if a.len() != b.len() => {
                    return Err(table.mismatch(
                        i,
                        &format!("{} columns, expected {}", a.len(), b.len()),
                    ));
                }
                (Line::Row(_), Line::Row(_))
                | (Line::Comment(_), Line::Comment(_))
                | (Line::Blank, Line::Blank) => {}
                _ => return Err(table.mismatch(i, "layout differs from the first file")),
            }
        }
    }

    let reference = &tables[config.reference];
    let mut excluded = 0usize;
    let mut out = String::new();
    for (i, line) in reference.lines.iter().enumerate() {
        match line {
            Line::Comment(text) => out.push_str(text),
            Line::Blank => {}
            Line::Row(cells) => {
                if let Some(&c) = config.columns.iter().find(|&&c| c >= cells.len()) {
                    return Err(reference.mismatch(
                        i,
                        &format!("column {c} out of range ({} columns)", cells.len()),
                    ));
                }
                let mut row: Vec<String> = Vec::with_capacity(cells.len() + 2 * config.columns.len());
                for (c, cell) in cells.iter().enumerate() {
                    if !config.columns.contains(&c) {
                        row.push(cell.clone());
                        continue;
                    }
                    let column = tables
                        .iter()
                        .map(|t| t.cell(i, c))
                        .collect::<Result<Vec<Option<f64>>>>()?;
                    let values: Vec<f64> = column.iter().flatten().copied().collect();
                    excluded += column.len() - values.len();
                    let width = if config.statistic { 3 } else { 1 };
                    if values.is_empty() {
                        row.extend(std::iter::repeat_n(NOT_FOUND.to_string(), width));
                        continue;
                    }
                    let mean = values.iter().sum::<f64>() / values.len() as f64;
                    row.push(format!("{mean:.6e}"));
                    if config.statistic {
                        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
                        row.push(format!("{max:.6e}"));
                        row.push(format!("{min:.6e}"));
                    }
                }
                out.push_str(&row.join("\t"));
            }
        }
        out.push('\n');
    }
    if excluded > 0 {
        log::warn!("merge excluded {excluded} {NOT_FOUND} cells");
    }
    Ok(out)
}

/// Read and merge `paths`.
pub fn merge_files(paths: &[PathBuf], config: &MergeConfig) -> Result<String> {
    let files = paths
        .iter()
        .map(|p| -> Result<(PathBuf, String)> {
            Ok((p.clone(), std::fs::read_to_string(p)?))
        })
        .collect::<Result<Vec<_>>>()?;
    merge_contents(&files, config)
}

/// Merge `paths` into `output`.
pub fn merge_to_file(paths: &[PathBuf], config: &MergeConfig, output: &Path) -> Result<()> {
    let merged = merge_files(paths, config)?;
    std::fs::write(output, merged)?;
    log::info!("merged {} files into {}", paths.len(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(contents: &[&str]) -> Vec<(PathBuf, String)> {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| (PathBuf::from(format!("run_{i}.txt")), c.to_string()))
            .collect()
    }

    const A: &str = "# index\tvdd\tcritical\tclass\n0\t1.0\t2.0\tfound\n1\t2.0\t4.0\tfound\n";
    const B: &str = "# other header\n0\t1.0\t4.0\tbounded_by_max\n1\t2.0\t8.0\tfound\n";

    #[test]
    fn test_mean_of_selected_columns() {
        let merged = merge_contents(&files(&[A, B]), &MergeConfig::new(vec![2])).unwrap();
        assert_eq!(
            merged,
            "# index\tvdd\tcritical\tclass\n0\t1.0\t3.000000e0\tfound\n1\t2.0\t6.000000e0\tfound\n"
        );
    }

    #[test]
    fn test_statistic_and_reference() {
        let config = MergeConfig::new(vec![2]).with_statistic(true).with_reference(1);
        let merged = merge_contents(&files(&[A, B]), &config).unwrap();
        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(lines[0], "# other header");
        assert_eq!(
            lines[1],
            "0\t1.0\t3.000000e0\t4.000000e0\t2.000000e0\tbounded_by_max"
        );
    }

    #[test]
    fn test_identical_inputs_are_byte_identical() {
        let first = merge_contents(&files(&[A, B, A]), &MergeConfig::new(vec![1, 2])).unwrap();
        let second = merge_contents(&files(&[A, B, A]), &MergeConfig::new(vec![1, 2])).unwrap();
        assert_eq!(first, second);

        let single = merge_contents(&files(&[A]), &MergeConfig::new(vec![2])).unwrap();
        let again =
            merge_contents(&files(&[single.as_str(), single.as_str()]), &MergeConfig::new(vec![2]))
                .unwrap();
        assert_eq!(single, again);
    }

    #[test]
    fn test_aggregation_errors() {
        let aggregation = |r: Result<String>| {
            matches!(r, Err(SweepError::Aggregation(_)))
        };
        let config = MergeConfig::new(vec![2]);

        assert!(aggregation(merge_contents(&[], &config)));
        assert!(aggregation(merge_contents(&files(&[A]), &config.clone().with_reference(1))));
        assert!(aggregation(merge_contents(&files(&[A]), &MergeConfig::new(vec![7]))));
        assert!(aggregation(merge_contents(&files(&[A]), &MergeConfig::new(vec![3]))));
        assert!(aggregation(merge_contents(
            &files(&[A, "# index\n0\t1.0\t2.0\tfound\n"]),
            &config
        )));
        assert!(aggregation(merge_contents(
            &files(&[A, "0\t1.0\t2.0\tfound\n# moved\n1\t2.0\t4.0\tfound\n"]),
            &config
        )));
        assert!(aggregation(merge_contents(
            &files(&[A, "# h\n0\t1.0\t2.0\n1\t2.0\t4.0\n"]),
            &config
        )));
    }

    #[test]
    fn test_not_found_cells_are_excluded() {
        let failed = "# h\n0\t1.0\tnotFound\tnotFound\n1\t2.0\t10.0\tfound\n";
        let config = MergeConfig::new(vec![2]).with_statistic(true);
        let merged = merge_contents(&files(&[A, failed]), &config).unwrap();
        let lines: Vec<&str> = merged.lines().collect();
        assert_eq!(lines[1], "0\t1.0\t2.000000e0\t2.000000e0\t2.000000e0\tfound");
        assert_eq!(lines[2], "1\t2.0\t7.000000e0\t1.000000e1\t4.000000e0\tfound");

        let merged = merge_contents(&files(&[failed, failed]), &config).unwrap();
        assert!(merged.contains("0\t1.0\tnotFound\tnotFound\tnotFound\tnotFound"));

        let garbage = "# h\n0\t1.0\tmissing\tfound\n1\t2.0\t4.0\tfound\n";
        assert!(matches!(
            merge_contents(&files(&[A, garbage]), &config),
            Err(SweepError::Aggregation(_))
        ));
    }

    #[test]
    fn test_merge_files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = [A, B]
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let p = dir.path().join(format!("s{i}.txt"));
                std::fs::write(&p, c).unwrap();
                p
            })
            .collect();
        let out = dir.path().join("merged.txt");
        merge_to_file(&paths, &MergeConfig::new(vec![2]), &out).unwrap();
        assert!(std::fs::read_to_string(&out).unwrap().contains("6.000000e0"));

        let missing = vec![dir.path().join("absent.txt")];
        assert!(matches!(
            merge_files(&missing, &MergeConfig::new(vec![0])),
            Err(SweepError::Io(_))
        ));
    }
}
