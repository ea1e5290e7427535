//! Sample sources for auto mode and sample-driven predictions
//!
//! A dataset-backed source reads a CSV export of processed connection records
//! (numeric columns with a header row, label column dropped). A synthetic
//! source draws every schema feature uniformly from [-2, 2], matching the
//! range of standardized features, for demos without a dataset.

use crate::error::SampleError;
use crate::models::{FeatureSchema, RawFeatureMap, RawValue};
use rand::Rng;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

/// Column holding the ground-truth label in processed datasets
pub const TARGET_COLUMN: &str = "target";

/// Range of the synthetic feature values
const SYNTHETIC_RANGE: std::ops::RangeInclusive<f64> = -2.0..=2.0;

/// Supplies raw feature maps on request
pub trait SampleSource: Send + Sync {
    fn sample(&self) -> Result<RawFeatureMap, SampleError>;

    /// Short description for logs and status output
    fn describe(&self) -> String;
}

/// How rows are drawn from a dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplingMode {
    /// Uniformly with replacement; never exhausts
    #[default]
    Random,
    /// Each row once in file order, then `Exhausted`
    Sequential,
}

/// Rows of a CSV dataset held in memory
pub struct CsvSampleSource {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    mode: SamplingMode,
    cursor: AtomicUsize,
}

impl CsvSampleSource {
    pub fn from_path(path: &Path, mode: SamplingMode) -> Result<Self, SampleError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SampleError::Io(format!("{}: {}", path.display(), e)))?;
        let source = Self::parse(&content, mode)?;
        info!(
            path = %path.display(),
            rows = source.rows.len(),
            columns = source.columns.len(),
            "Loaded sample dataset"
        );
        Ok(source)
    }

    pub fn parse(content: &str, mode: SamplingMode) -> Result<Self, SampleError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let header = reader.headers().map_err(parse_error)?.clone();
        let target_idx = header.iter().position(|c| c == TARGET_COLUMN);
        let columns: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != target_idx)
            .map(|(_, c)| c.to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(parse_error)?;
            let line = record.position().map_or(0, |p| p.line() as usize);
            let mut row = Vec::with_capacity(columns.len());
            for (col, field) in record.iter().enumerate() {
                if Some(col) == target_idx {
                    continue;
                }
                let value = field.parse::<f64>().map_err(|_| SampleError::Parse {
                    line,
                    message: format!("column '{}' is not numeric: '{}'", &header[col], field),
                })?;
                row.push(value);
            }
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(SampleError::Empty);
        }

        Ok(Self {
            columns,
            rows,
            mode,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn row_to_map(&self, row: &[f64]) -> RawFeatureMap {
        self.columns
            .iter()
            .cloned()
            .zip(row.iter().map(|v| RawValue::Number(*v)))
            .collect()
    }
}

impl SampleSource for CsvSampleSource {
    fn sample(&self) -> Result<RawFeatureMap, SampleError> {
        let idx = match self.mode {
            SamplingMode::Random => rand::thread_rng().gen_range(0..self.rows.len()),
            SamplingMode::Sequential => {
                let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
                if idx >= self.rows.len() {
                    return Err(SampleError::Exhausted {
                        rows: self.rows.len(),
                    });
                }
                idx
            }
        };
        Ok(self.row_to_map(&self.rows[idx]))
    }

    fn describe(&self) -> String {
        format!("dataset ({} rows, {:?})", self.rows.len(), self.mode).to_lowercase()
    }
}

fn parse_error(err: csv::Error) -> SampleError {
    let line = err.position().map_or(0, |p| p.line() as usize);
    let message = match err.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("expected {} fields, found {}", expected_len, len)
        }
        _ => err.to_string(),
    };
    SampleError::Parse { line, message }
}

/// Synthetic feature maps over a schema
pub struct RandomSampleSource {
    schema: FeatureSchema,
}

impl RandomSampleSource {
    pub fn new(schema: FeatureSchema) -> Self {
        Self { schema }
    }
}

impl SampleSource for RandomSampleSource {
    fn sample(&self) -> Result<RawFeatureMap, SampleError> {
        let mut rng = rand::thread_rng();
        Ok(self
            .schema
            .names()
            .iter()
            .map(|name| (name.clone(), RawValue::Number(rng.gen_range(SYNTHETIC_RANGE))))
            .collect())
    }

    fn describe(&self) -> String {
        format!("synthetic ({} features)", self.schema.len())
    }
}
