//! braian - spatial bookkeeping of cell detections in whole-slide images.
//!
//! Detections (cell bodies found on an image channel) live below named
//! container annotations of an object hierarchy. This crate keeps those
//! containers consistent as they are recomputed, resized or merged, indexes
//! their detections for overlap lookups and applies sequences of classifiers
//! to them.

pub mod classify;
pub mod detections;
pub mod error;
pub mod geometry;
pub mod hierarchy;
pub mod label;
pub mod params;
pub mod spatial;
pub mod utils;

pub use classify::{
    ClassificationReport, ClassifierScope, ObjectClassifier, PartialClassifier, SingleClassifier,
    ThresholdClassifier,
};
pub use detections::{CellDetector, ContainerKind, Detection, DetectionGroup, DetectorError};
pub use error::{Error, Result};
pub use geometry::Roi;
pub use hierarchy::{MemoryHierarchy, ObjectHierarchy, ObjectId, PathObject};
pub use label::Label;
pub use params::{ClassifierConfig, DetectionParams, GroupParams, ProjectConfig};
pub use spatial::{DEFAULT_MAX_DEPTH, Located, SpatialIndex};
