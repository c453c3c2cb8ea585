use thiserror::Error;
use tracing::{debug, warn};

use super::container::{create_container, full_image_annotation};
use super::{ContainerKind, DetectionGroup};
use crate::error::Result;
use crate::hierarchy::{ObjectHierarchy, ObjectId};
use crate::label::Label;
use crate::params::{DetectionParams, GroupParams};

/// Failure of a cell detection run.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("cell detection was interrupted")]
    Interrupted,

    #[error("{0}")]
    Failed(String),
}

/// A cell detection algorithm.
///
/// Detections are added to the hierarchy as children of `container`.
pub trait CellDetector {
    fn detect(
        &mut self,
        hierarchy: &mut dyn ObjectHierarchy,
        container: ObjectId,
        params: &DetectionParams,
    ) -> std::result::Result<usize, DetectorError>;
}

impl DetectionGroup {
    /// Runs `detector` inside each of `annotations`, or inside the whole-image
    /// annotation when none is given, and returns the detections of `channel`.
    ///
    /// Every annotation is locked and receives a `"<channel> cells"` container
    /// (an existing one is cleared and reused). An interrupted run leaves its
    /// container empty; any other detector failure is returned.
    pub fn compute(
        hierarchy: &mut dyn ObjectHierarchy,
        channel: &str,
        detector: &mut dyn CellDetector,
        params: &DetectionParams,
        annotations: &[ObjectId],
        group: &GroupParams,
    ) -> Result<Self> {
        group.validate()?;
        let targets = if annotations.is_empty() {
            vec![full_image_annotation(hierarchy)?]
        } else {
            annotations.to_vec()
        };
        let name = ContainerKind::Cells.container_name(channel);
        let label = Label::new(channel);

        for annotation in targets {
            hierarchy.set_locked(annotation, true)?;
            let container = create_container(hierarchy, annotation, &name, &label, true)?;
            match detector.detect(hierarchy, container, params) {
                Ok(found) => debug!(%annotation, found, channel, "cell detection done"),
                Err(DetectorError::Interrupted) => {
                    warn!(%annotation, channel, "cell detection interrupted, no detections kept");
                    let partial = hierarchy.children(container).to_vec();
                    hierarchy.remove_objects(&partial, false);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            for detection in hierarchy.child_detections(container) {
                hierarchy.set_label(detection, Some(label.clone()))?;
            }
        }

        Self::with_params(channel, vec![label], ContainerKind::Cells, hierarchy, group)
    }
}
