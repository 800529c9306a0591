//! Serialized model and encoder files shared by trainer and predictor.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;

use crate::encoder::EncoderTable;
use crate::error::{ArtifactError, ForestError};
use crate::forest::RandomForest;

/// File name of the fitted model.
pub const MODEL_FILE: &str = "fitness_model.json";

/// File name of the column → encoder table.
pub const ENCODERS_FILE: &str = "label_encoders.json";

/// The fitted forest plus the column layout it was trained with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitnessModel {
    pub forest: RandomForest,
    pub feature_columns: Vec<String>,
    pub target_columns: Vec<String>,
    pub n_train: usize,
    pub trained_at: DateTime<Utc>,
}

impl FitnessModel {
    /// Predicts all targets for one feature row.
    pub fn predict(&self, features: &[f64]) -> Result<Vec<f64>, ForestError> {
        self.forest.predict(features)
    }
}

/// Writes both artifacts into `dir`, returning their paths.
pub fn save_artifacts(
    dir: &Path,
    model: &FitnessModel,
    encoders: &EncoderTable,
) -> Result<(PathBuf, PathBuf), ArtifactError> {
    std::fs::create_dir_all(dir).map_err(|source| ArtifactError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let model_path = dir.join(MODEL_FILE);
    let encoders_path = dir.join(ENCODERS_FILE);

    write_json(&model_path, model)?;
    write_json(&encoders_path, encoders)?;

    Ok((model_path, encoders_path))
}

/// Reads both artifacts from `dir`.
pub fn load_artifacts(dir: &Path) -> Result<(FitnessModel, EncoderTable), ArtifactError> {
    let model = read_json(&dir.join(MODEL_FILE))?;
    let encoders = read_json(&dir.join(ENCODERS_FILE))?;
    Ok((model, encoders))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    writer.flush().map_err(io_err)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let file = File::open(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}
