//! Export predictions, CV results and datasets to CSV.
//!
//! The exports are meant to be easy to consume in spreadsheets or downstream scripts.

use std::path::Path;

use nalgebra::DMatrix;

use crate::domain::QueryDataset;
use crate::error::AppError;
use crate::fit::{CvOutcome, PointStatus};

/// Write one prediction row per sample: `row,qid,prediction[_<label>...]`.
pub fn write_predictions_csv(
    path: &Path,
    qids: &[String],
    predictions: &DMatrix<f64>,
    label_names: &[String],
) -> Result<(), AppError> {
    if qids.len() != predictions.nrows() {
        return Err(AppError::new(
            4,
            format!(
                "Prediction count {} does not match row count {}.",
                predictions.nrows(),
                qids.len()
            ),
        ));
    }

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create predictions CSV '{}': {e}", path.display())))?;
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write predictions CSV: {e}"));

    let mut header = vec!["row".to_string(), "qid".to_string()];
    header.extend(prediction_columns(predictions.ncols(), label_names));
    writer.write_record(&header).map_err(write_err)?;

    for (i, qid) in qids.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push((i + 1).to_string());
        record.push(qid.clone());
        record.extend(predictions.row(i).iter().map(|v| format!("{v:.10}")));
        writer.write_record(&record).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush predictions CSV: {e}")))?;
    Ok(())
}

/// Write the grid search table: `regparam,performance,status,selected`.
pub fn write_cv_csv(path: &Path, outcome: &CvOutcome) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CV CSV '{}': {e}", path.display())))?;
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write CV CSV: {e}"));

    writer
        .write_record(["regparam", "performance", "status", "selected"])
        .map_err(write_err)?;
    for (i, point) in outcome.points.iter().enumerate() {
        let (performance, status) = match &point.status {
            PointStatus::Scored(v) => (format!("{v:.10}"), "scored"),
            PointStatus::Undefined => (String::new(), "undefined"),
            PointStatus::Failed(_) => (String::new(), "failed"),
        };
        let regparam = format!("{:e}", point.regparam);
        let selected = (i == outcome.best_index).to_string();
        writer
            .write_record([regparam.as_str(), performance.as_str(), status, selected.as_str()])
            .map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CV CSV: {e}")))?;
    Ok(())
}

/// Write a dataset in the schema `load_query_csv` reads.
pub fn write_query_csv(path: &Path, data: &QueryDataset) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create CSV '{}': {e}", path.display())))?;
    let write_err = |e: csv::Error| AppError::new(2, format!("Failed to write CSV: {e}"));

    let mut header = vec!["qid".to_string()];
    header.extend(data.label_names.iter().cloned());
    header.extend(data.feature_names.iter().cloned());
    writer.write_record(&header).map_err(write_err)?;

    for (i, qid) in data.qids.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(qid.clone());
        record.extend(data.y.row(i).iter().map(|v| v.to_string()));
        record.extend(data.x.row(i).iter().map(|v| v.to_string()));
        writer.write_record(&record).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush CSV: {e}")))?;
    Ok(())
}

fn prediction_columns(n_labels: usize, label_names: &[String]) -> Vec<String> {
    if n_labels == 1 {
        return vec!["prediction".to_string()];
    }
    (0..n_labels)
        .map(|j| match label_names.get(j) {
            Some(name) => format!("prediction_{name}"),
            None => format!("prediction_{}", j + 1),
        })
        .collect()
}
