//! Run configuration.
//!
//! Plain structs with public fields and sensible defaults; every struct reads
//! from partial JSON (or any serde format) with missing keys defaulted.

use serde::{Deserialize, Serialize};

use crate::classify::ClassifierScope;
use crate::error::{Error, Result};
use crate::hierarchy::ObjectHierarchy;
use crate::spatial::DEFAULT_MAX_DEPTH;

/// Name of the classifier configuration that accepts every detection.
pub const ACCEPT_ALL_CLASSIFIER: &str = "ALL";

/// Parameters of a detection group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GroupParams {
    /// Maximum depth of the group's spatial index.
    pub max_depth: usize,
}

impl Default for GroupParams {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl GroupParams {
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::IllegalConfiguration(
                "maxDepth must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Watershed cell detection parameters, in microns where applicable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionParams {
    pub requested_pixel_size_microns: f64,
    pub background_radius_microns: f64,
    pub background_by_reconstruction: bool,
    pub median_radius_microns: f64,
    pub sigma_microns: f64,
    pub min_area_microns: f64,
    pub max_area_microns: f64,
    pub threshold: f64,
    pub watershed_post_process: bool,
    pub cell_expansion_microns: f64,
    pub include_nuclei: bool,
    pub smooth_boundaries: bool,
    pub make_measurements: bool,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            requested_pixel_size_microns: 0.5,
            background_radius_microns: 8.0,
            background_by_reconstruction: true,
            median_radius_microns: 0.0,
            sigma_microns: 1.5,
            min_area_microns: 10.0,
            max_area_microns: 400.0,
            threshold: 100.0,
            watershed_post_process: true,
            cell_expansion_microns: 5.0,
            include_nuclei: false,
            smooth_boundaries: true,
            make_measurements: true,
        }
    }
}

/// One classification step of a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClassifierConfig {
    pub name: String,
    /// Names of the annotations to classify; `None` classifies the whole image.
    pub annotations_to_classify: Option<Vec<String>>,
    /// Measurement and threshold of a threshold classifier.
    pub measurement: Option<String>,
    pub threshold: Option<f64>,
}

impl ClassifierConfig {
    /// Whether this step accepts every detection (`"ALL"`, in any case).
    pub fn is_single(&self) -> bool {
        self.name.eq_ignore_ascii_case(ACCEPT_ALL_CLASSIFIER)
    }

    /// Resolves the annotation names against `hierarchy`. Names matching no
    /// annotation are skipped.
    pub fn scope(&self, hierarchy: &dyn ObjectHierarchy) -> ClassifierScope {
        let Some(names) = &self.annotations_to_classify else {
            return ClassifierScope::WholeImage;
        };
        ClassifierScope::Annotations(
            hierarchy
                .annotations()
                .into_iter()
                .filter(|&a| {
                    hierarchy
                        .get(a)
                        .and_then(|o| o.name.as_ref())
                        .is_some_and(|name| names.contains(name))
                })
                .collect(),
        )
    }
}

/// Detection settings of an image channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChannelConfig {
    pub name: String,
    pub parameters: DetectionParams,
    pub classifiers: Vec<ClassifierConfig>,
}

/// Whether to check channel detections against a control channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionsCheck {
    pub apply: bool,
    pub control_channel: Option<String>,
}

/// Settings shared by all images of a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectConfig {
    /// Label of the annotations to compute detections in; `None` means the
    /// whole image.
    pub class_for_detections: Option<String>,
    pub detections_check: DetectionsCheck,
    pub channel_detections: Vec<ChannelConfig>,
}

impl ProjectConfig {
    /// The control channel, when the detections check applies. Without an
    /// explicit one the first channel is the control. A single channel has
    /// nothing to be checked against.
    pub fn control_channel(&self) -> Option<&str> {
        if !self.detections_check.apply || self.channel_detections.len() < 2 {
            return None;
        }
        self.detections_check
            .control_channel
            .as_deref()
            .or_else(|| self.channel_detections.first().map(|c| c.name.as_str()))
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelConfig> {
        self.channel_detections.iter().find(|c| c.name == name)
    }

    /// Annotations labeled `class_for_detections`; empty when unset.
    pub fn annotations_for_detections(
        &self,
        hierarchy: &dyn ObjectHierarchy,
    ) -> Vec<crate::hierarchy::ObjectId> {
        let Some(class) = &self.class_for_detections else {
            return Vec::new();
        };
        hierarchy
            .annotations()
            .into_iter()
            .filter(|&a| {
                hierarchy
                    .get(a)
                    .and_then(|o| o.label.as_ref())
                    .is_some_and(|label| label.as_str() == class)
            })
            .collect()
    }
}
