//! CSV ingest for query-grouped data.
//!
//! Schema (header row required, names case-insensitive):
//!
//! - `qid`: query id, any string
//! - `label`, `label_*`, `label2`, ...: one or more label columns
//! - every other column: a numeric feature, kept in file order
//!
//! Unlike a lenient loader, a row that does not parse aborts the load: a
//! silently dropped row would shift the query partition under the model.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use nalgebra::DMatrix;

use crate::domain::QueryDataset;
use crate::error::AppError;

pub const QID_COLUMN: &str = "qid";

/// Whether the file must carry label columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelColumns {
    Required,
    Optional,
}

/// Load a query CSV from disk.
pub fn load_query_csv(path: &Path, labels: LabelColumns) -> Result<QueryDataset, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_query_csv(file, labels)
}

/// Parse query CSV data from any reader.
pub fn read_query_csv<R: Read>(input: R, labels: LabelColumns) -> Result<QueryDataset, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let layout = ColumnLayout::from_headers(&headers)?;

    if labels == LabelColumns::Required && layout.labels.is_empty() {
        return Err(AppError::new(2, "Missing required column: `label`"));
    }
    if layout.features.is_empty() {
        return Err(AppError::new(2, "CSV has no feature columns."));
    }

    let mut x_rows: Vec<f64> = Vec::new();
    let mut y_rows: Vec<f64> = Vec::new();
    let mut qids = Vec::new();

    for (idx, result) in reader.records().enumerate() {
        // +2: records start after the header and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;

        let qid = record
            .get(layout.qid)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::new(2, format!("Line {line}: missing `qid` value.")))?;
        qids.push(qid.to_string());

        for (col, name) in &layout.labels {
            y_rows.push(parse_cell(&record, *col, name, line)?);
        }
        for (col, name) in &layout.features {
            x_rows.push(parse_cell(&record, *col, name, line)?);
        }
    }

    let m = qids.len();
    if m == 0 {
        return Err(AppError::new(3, "CSV contains no data rows."));
    }
    log::info!(
        "loaded {m} rows, {} features, {} label column(s)",
        layout.features.len(),
        layout.labels.len()
    );

    Ok(QueryDataset {
        x: DMatrix::from_row_slice(m, layout.features.len(), &x_rows),
        y: DMatrix::from_row_slice(m, layout.labels.len(), &y_rows),
        feature_names: layout.features.into_iter().map(|(_, n)| n).collect(),
        label_names: layout.labels.into_iter().map(|(_, n)| n).collect(),
        qids,
    })
}

/// Reorder `data`'s features to match `names` (by column name).
///
/// Used at prediction time so the scoring CSV may list features in any order.
pub fn align_features(data: &QueryDataset, names: &[String]) -> Result<DMatrix<f64>, AppError> {
    if data.feature_names.as_slice() == names {
        return Ok(data.x.clone());
    }

    let positions: HashMap<&str, usize> = data
        .feature_names
        .iter()
        .enumerate()
        .map(|(i, n)| (n.as_str(), i))
        .collect();
    let mut columns = Vec::with_capacity(names.len());
    for name in names {
        let col = positions
            .get(name.as_str())
            .ok_or_else(|| AppError::new(2, format!("Missing feature column `{name}` required by the model.")))?;
        columns.push(*col);
    }
    if data.feature_names.len() != names.len() {
        log::warn!(
            "ignoring {} feature column(s) unknown to the model",
            data.feature_names.len() - names.len()
        );
    }
    Ok(data.x.select_columns(&columns))
}

struct ColumnLayout {
    qid: usize,
    labels: Vec<(usize, String)>,
    features: Vec<(usize, String)>,
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Result<Self, AppError> {
        let mut qid = None;
        let mut labels = Vec::new();
        let mut features = Vec::new();

        for (idx, raw) in headers.iter().enumerate() {
            let name = normalize_header_name(raw);
            if name.is_empty() {
                return Err(AppError::new(2, format!("Column {} has an empty header.", idx + 1)));
            }
            if name == QID_COLUMN {
                if qid.replace(idx).is_some() {
                    return Err(AppError::new(2, "Duplicate `qid` column."));
                }
            } else if is_label_column(&name) {
                labels.push((idx, name));
            } else {
                features.push((idx, name));
            }
        }

        let qid = qid.ok_or_else(|| AppError::new(2, "Missing required column: `qid`"))?;
        Ok(Self { qid, labels, features })
    }
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports may prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn is_label_column(name: &str) -> bool {
    match name.strip_prefix("label") {
        Some(rest) => rest.is_empty() || rest.starts_with('_') || rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

fn parse_cell(record: &StringRecord, col: usize, name: &str, line: usize) -> Result<f64, AppError> {
    let raw = record.get(col).unwrap_or("");
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(AppError::new(
            2,
            format!("Line {line}: invalid numeric value '{raw}' in column `{name}`."),
        )),
    }
}
