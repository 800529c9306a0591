//! Error types for the fitmate application.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::Step;

/// Errors that can occur when reading the training dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("cannot read file: {0}")]
    CannotRead(String),

    #[error("unsupported dataset format: {0} (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    #[error("invalid dataset: {0}")]
    InvalidFormat(String),

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("invalid number in row {row}, column {column}: {value}")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("empty label in row {row}, column {column}")]
    EmptyLabel { row: usize, column: String },
}

/// Errors raised when mapping category labels to integer codes.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("no encoder for column '{0}'")]
    UnknownColumn(String),

    #[error("y contains previously unseen label '{label}' for column '{column}'")]
    UnseenLabel { column: String, label: String },
}

/// Errors that can occur while fitting or querying the forest.
#[derive(Debug, Error)]
pub enum ForestError {
    #[error("empty training set")]
    EmptyTrainingSet,

    #[error("shape mismatch: {features} feature rows but {targets} target rows")]
    ShapeMismatch { features: usize, targets: usize },

    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    #[error("invalid forest configuration: {0}")]
    InvalidConfig(String),
}

/// Errors reading or writing the serialized model and encoders.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("cannot access artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt artifact {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifacts disagree: {0}")]
    Mismatch(String),
}

/// A step submission that cannot be accepted as-is.
///
/// Recovered locally: the wizard stays on the same step and the message is
/// shown inline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{}", incomplete_message(.step))]
    Incomplete { step: Step },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        value: f64,
        min: f64,
    },

    #[error("{field} must be a whole number, got {value}")]
    NotWholeNumber { field: &'static str, value: f64 },

    #[error("'{value}' is not a valid choice for {field}")]
    InvalidChoice { field: &'static str, value: String },

    #[error("cannot submit {submitted} while on {current}")]
    WrongStep { current: Step, submitted: Step },
}

fn incomplete_message(step: &Step) -> String {
    match step {
        Step::Goal => "Please complete all fields to generate your plan.".to_string(),
        other => format!("Please complete all fields in {}.", other.display_name()),
    }
}

/// Failure anywhere between the validated answers and the model output.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Model(#[from] ForestError),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Outcome of a failed final-step submission.
#[derive(Debug, Error)]
pub enum GoalError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Error: {0}")]
    Prediction(#[from] PredictionError),
}
