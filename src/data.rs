use crate::error::{GaKnnError, Result};
use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One sample: its feature vector and its class label
#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct Row {
    pub features: Vec<f64>,
    pub label: String,
}

impl Row {
    pub fn new(features: Vec<f64>, label: &str) -> Row {
        Row {
            features,
            label: label.to_string(),
        }
    }
}

/// Labelled samples sharing the same number of features. Immutable once loaded.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub rows: Vec<Row>,
    pub features: Vec<String>, // Feature names (header line or generated)
    pub classes: Vec<String>,  // Distinct labels, first-seen order
    pub feature_len: usize,
    pub sample_len: usize,
    pub path: String,
}

impl Data {
    /// Create a new `Data` instance with default values
    pub fn new() -> Data {
        Data {
            rows: Vec::new(),
            features: Vec::new(),
            classes: Vec::new(),
            feature_len: 0,
            sample_len: 0,
            path: String::new(),
        }
    }

    /// Build a dataset from in-memory rows; every row must have the same number of finite features
    pub fn from_rows(rows: Vec<Row>) -> Result<Data> {
        let mut data = Data::new();
        for (n, row) in rows.into_iter().enumerate() {
            if n > 0 && row.features.len() != data.feature_len {
                return Err(GaKnnError::InconsistentFeatures {
                    path: "<memory>".to_string(),
                    line: n + 1,
                    expected: data.feature_len,
                    found: row.features.len(),
                });
            }
            if let Some(column) = row.features.iter().position(|v| !v.is_finite()) {
                return Err(GaKnnError::Parse {
                    path: "<memory>".to_string(),
                    line: n + 1,
                    column: column + 1,
                    value: row.features[column].to_string(),
                });
            }
            data.push(row);
        }
        data.features = default_feature_names(data.feature_len);
        Ok(data)
    }

    /// Load a delimited text file: one sample per line, last field is the label,
    /// every preceding field a real-valued feature.
    pub fn load_data(&mut self, path: &str, delimiter: u8, has_header: bool) -> Result<()> {
        info!("Loading file {}...", path);
        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(has_header)
            .trim(Trim::All)
            .flexible(true)
            .from_path(path)?;

        let mut header: Vec<String> = Vec::new();
        if has_header {
            header = reader.headers()?.iter().map(String::from).collect();
        }

        for record in reader.records() {
            let record = record?;
            let line = record
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(self.sample_len + 1);

            if record.len() < 2 {
                return Err(GaKnnError::MissingLabel {
                    path: path.to_string(),
                    line,
                });
            }

            let n_features = record.len() - 1;
            if self.sample_len > 0 && n_features != self.feature_len {
                return Err(GaKnnError::InconsistentFeatures {
                    path: path.to_string(),
                    line,
                    expected: self.feature_len,
                    found: n_features,
                });
            }

            let mut features = Vec::with_capacity(n_features);
            for (column, field) in record.iter().take(n_features).enumerate() {
                // NaN and infinities would break the distance ordering
                let value = field
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| GaKnnError::Parse {
                        path: path.to_string(),
                        line,
                        column: column + 1,
                        value: field.to_string(),
                    })?;
                features.push(value);
            }

            self.push(Row::new(features, &record[n_features]));
        }

        self.features = if header.len() == self.feature_len + 1 {
            header.truncate(self.feature_len);
            header
        } else {
            default_feature_names(self.feature_len)
        };
        self.path = path.to_string();

        debug!(
            "{} samples of {} features loaded from {} ({} classes)",
            self.sample_len,
            self.feature_len,
            path,
            self.classes.len()
        );

        Ok(())
    }

    fn push(&mut self, row: Row) {
        if self.sample_len == 0 {
            self.feature_len = row.features.len();
        }
        if !self.classes.contains(&row.label) {
            self.classes.push(row.label.clone());
        }
        self.rows.push(row);
        self.sample_len += 1;
    }

    /// Check if another dataset can be classified against this one
    pub fn check_compatibility(&self, other: &Data) -> bool {
        self.feature_len == other.feature_len
    }

    /// Fails with `EmptyDataset` when there is no sample
    pub fn check_not_empty(&self, name: &str) -> Result<()> {
        if self.sample_len == 0 {
            return Err(GaKnnError::EmptyDataset(name.to_string()));
        }
        Ok(())
    }

    /// Restrict the dataset to the features selected by `genome`
    pub fn mask(&self, genome: &[bool]) -> Result<MaskedView<'_>> {
        if genome.len() != self.feature_len {
            return Err(GaKnnError::DimensionMismatch {
                expected: genome.len(),
                found: self.feature_len,
            });
        }
        Ok(MaskedView {
            data: self,
            selected: selected_indices(genome),
        })
    }

    /// Names of the features selected by `genome`
    pub fn selected_feature_names(&self, genome: &[bool]) -> Vec<String> {
        selected_indices(genome)
            .into_iter()
            .filter_map(|i| self.features.get(i).cloned())
            .collect()
    }
}

/// A dataset seen through a feature mask: only the selected dimensions take part in distances
pub struct MaskedView<'a> {
    data: &'a Data,
    selected: Vec<usize>,
}

impl<'a> MaskedView<'a> {
    pub fn rows(&self) -> &'a [Row] {
        &self.data.rows
    }

    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    /// Euclidean distance over the selected dimensions; 0 when nothing is selected.
    /// Both vectors must have the dataset's feature length.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        self.selected
            .iter()
            .map(|&i| (a[i] - b[i]).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

pub fn selected_indices(genome: &[bool]) -> Vec<usize> {
    genome
        .iter()
        .enumerate()
        .filter(|(_, bit)| **bit)
        .map(|(i, _)| i)
        .collect()
}

/// Cut `text` to at most `max` characters, ending with "..." when something was dropped
fn truncate_display(text: String, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max - 3).collect::<String>())
    } else {
        text
    }
}

fn default_feature_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("feature_{}", i)).collect()
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Features: {}   Samples: {}   Classes: {}",
            self.feature_len,
            self.sample_len,
            self.classes.join(", ")
        )?;

        let header = self.features.join("\t");
        let truncated_header = truncate_display(header, 100);
        writeln!(f, "{:<12} {}", "label", truncated_header)?;

        // Limit to the first 10 rows
        for row in self.rows.iter().take(10) {
            let row_display = row
                .features
                .iter()
                .map(|v| format!("{:.2}", v))
                .collect::<Vec<_>>()
                .join("\t");
            writeln!(f, "{:<12} {}", row.label, truncate_display(row_display, 100))?;
        }

        Ok(())
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}
