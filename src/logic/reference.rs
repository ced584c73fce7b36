//! Reference dataset (held-out test set)
//!
//! Same seven columns as the model input. Loaded once, summarized for the
//! model info endpoint; never touched on the prediction path.

use std::path::Path;

use serde::Serialize;

use crate::error::ArtifactLoadError;
use crate::logic::layout::{FEATURE_COUNT, FEATURE_LAYOUT};

#[derive(Debug, Clone)]
pub struct ReferenceDataset {
    rows: Vec<[f64; FEATURE_COUNT]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub name: &'static str,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceSummary {
    pub row_count: usize,
    pub columns: Vec<ColumnSummary>,
}

/// Load the dataset. A missing file is not an error.
pub fn load_reference(path: &Path) -> Result<Option<ReferenceDataset>, ArtifactLoadError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!("Reference dataset not found at {}, skipping", path.display());
            return Ok(None);
        }
        Err(source) => {
            return Err(ArtifactLoadError::Io { path: path.to_path_buf(), source });
        }
    };

    let dataset = ReferenceDataset::parse(&text)?;
    tracing::info!("Reference dataset loaded: {} rows from {}", dataset.len(), path.display());
    Ok(Some(dataset))
}

impl ReferenceDataset {
    pub fn parse(text: &str) -> Result<Self, ArtifactLoadError> {
        let mut lines = text.lines().filter(|l| !l.trim().is_empty());

        let header: Vec<&str> = lines
            .next()
            .ok_or_else(|| reference_error("empty file"))?
            .split(',')
            .map(|h| h.trim().trim_matches('"'))
            .collect();

        if header != FEATURE_LAYOUT {
            return Err(reference_error(format!(
                "header {:?} does not match feature layout {:?}",
                header, FEATURE_LAYOUT
            )));
        }

        let mut rows = Vec::new();
        for (i, line) in lines.enumerate() {
            let cells: Vec<&str> = line.split(',').map(str::trim).collect();
            if cells.len() != FEATURE_COUNT {
                return Err(reference_error(format!(
                    "row {} has {} columns, expected {}",
                    i + 1,
                    cells.len(),
                    FEATURE_COUNT
                )));
            }

            let mut row = [0.0; FEATURE_COUNT];
            for (slot, cell) in row.iter_mut().zip(cells) {
                *slot = cell
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .ok_or_else(|| reference_error(format!("row {}: bad value '{}'", i + 1, cell)))?;
            }
            rows.push(row);
        }

        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> ReferenceSummary {
        let columns = FEATURE_LAYOUT
            .iter()
            .enumerate()
            .map(|(j, &name)| {
                let values = self.rows.iter().map(|r| r[j]);
                let (min, max, sum) = values.fold(
                    (f64::INFINITY, f64::NEG_INFINITY, 0.0),
                    |(lo, hi, sum), v| (lo.min(v), hi.max(v), sum + v),
                );
                let n = self.rows.len();
                ColumnSummary {
                    name,
                    mean: if n > 0 { sum / n as f64 } else { 0.0 },
                    min: if n > 0 { min } else { 0.0 },
                    max: if n > 0 { max } else { 0.0 },
                }
            })
            .collect();

        ReferenceSummary { row_count: self.rows.len(), columns }
    }
}

fn reference_error(msg: impl Into<String>) -> ArtifactLoadError {
    ArtifactLoadError::Reference(msg.into())
}
