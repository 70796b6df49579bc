//! Read/write model JSON files.
//!
//! A model file is the portable form of a trained ranker:
//! - the predictor (primal weights or dual coefficients + kernel rows)
//! - the solver configuration it was trained with
//! - feature and label names so scoring data can be aligned
//! - the cross-validation summary when the regparam came from `cv`

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{MeasureName, RankConfig};
use crate::error::AppError;
use crate::predictor::Predictor;

/// Summary of the grid search that selected `config.regparam`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub measure: MeasureName,
    pub grid: Vec<f64>,
    pub performances: Vec<Option<f64>>,
    pub best_performance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub created_at: DateTime<Utc>,
    pub config: RankConfig,
    pub feature_names: Vec<String>,
    pub label_names: Vec<String>,
    pub n_queries: usize,
    pub n_samples: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cv: Option<CvSummary>,
    pub predictor: Predictor,
}

impl ModelFile {
    pub fn new(
        config: RankConfig,
        predictor: Predictor,
        feature_names: Vec<String>,
        label_names: Vec<String>,
        n_queries: usize,
        n_samples: usize,
    ) -> Self {
        Self {
            tool: "rankrls".to_string(),
            created_at: Utc::now(),
            config,
            feature_names,
            label_names,
            n_queries,
            n_samples,
            cv: None,
            predictor,
        }
    }

    pub fn with_cv(mut self, cv: CvSummary) -> Self {
        self.cv = Some(cv);
        self
    }
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, model: &ModelFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, model)
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let model: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    if model.predictor.n_inputs() != model.feature_names.len() {
        return Err(AppError::new(
            2,
            format!(
                "Model JSON lists {} features but its predictor expects {}.",
                model.feature_names.len(),
                model.predictor.n_inputs()
            ),
        ));
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelKind;
    use crate::predictor::KernelPredictor;
    use nalgebra::DMatrix;

    fn model() -> ModelFile {
        let predictor = Predictor::Kernel(KernelPredictor::new(
            KernelKind::Gaussian { gamma: 0.5 },
            DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]),
            DMatrix::from_column_slice(2, 1, &[0.25, -0.25]),
        ));
        ModelFile::new(
            RankConfig::default(),
            predictor,
            vec!["a".to_string(), "b".to_string()],
            vec!["label".to_string()],
            1,
            2,
        )
    }

    #[test]
    fn model_json_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let original = model().with_cv(CvSummary {
            measure: MeasureName::Cindex,
            grid: vec![0.5, 1.0],
            performances: vec![Some(0.75), None],
            best_performance: Some(0.75),
        });

        write_model_json(&path, &original).unwrap();
        let back = read_model_json(&path).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn inconsistent_feature_list_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut broken = model();
        broken.feature_names.pop();
        write_model_json(&path, &broken).unwrap();
        assert_eq!(read_model_json(&path).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn missing_file_is_input_error() {
        let err = read_model_json(Path::new("/nonexistent/model.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
