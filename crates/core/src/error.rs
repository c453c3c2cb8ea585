//! Error types for braian detection handling.

use itertools::Itertools;
use thiserror::Error;

use crate::detections::DetectorError;
use crate::hierarchy::ObjectId;
use crate::label::Label;

/// Primary error type for detection grouping, indexing and classification.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no '{container}' containers were found in the hierarchy")]
    NoContainersFound { container: String },

    #[error(
        "classifier '{classifier}' is incompatible: expected [{}], got [{}]",
        .expected.iter().join(", "),
        .got.iter().join(", ")
    )]
    IncompatibleClassifier {
        classifier: String,
        expected: Vec<Label>,
        got: Vec<Label>,
    },

    #[error("detections are incompatible: {left} and {right}")]
    IncompatibleDetections { left: String, right: String },

    #[error("illegal configuration: {0}")]
    IllegalConfiguration(String),

    #[error("cannot index a points ROI with {points} points")]
    UnsupportedObjectShape { points: usize },

    #[error("object not found in hierarchy: {0}")]
    UnknownObject(ObjectId),

    #[error("detections belong to a different hierarchy")]
    HierarchyMismatch,

    #[error("there are multiple annotations called '{name}'")]
    MultipleFullImageAnnotations { name: String },

    #[error("cell detection failed: {0}")]
    Detector(#[from] DetectorError),
}

/// Convenience Result type alias for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
