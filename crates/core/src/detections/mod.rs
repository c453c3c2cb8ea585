//! Groups of detections living inside container annotations.
//!
//! A [`DetectionGroup`] tracks every annotation named after its naming
//! convention (`"cFos cells"`, `"cFos overlaps"`) together with the detection
//! children of those containers that carry one of its labels. The detections
//! are kept in a [`SpatialIndex`] for overlap lookups.
//!
//! - `reconcile` - refresh, pairwise container reconciliation and merging
//! - `container` - creation of container annotations
//! - `channel` - running a cell detector on annotations
//! - `overlap` - double/multiple positive detections between groups

mod channel;
mod container;
mod overlap;
mod reconcile;

use std::fmt;

use itertools::Itertools;
use rustc_hash::FxHashSet;
use smol_str::SmolStr;

pub use channel::{CellDetector, DetectorError};
pub use container::{FULL_IMAGE_ANNOTATION_NAME, create_container, full_image_annotation};
pub use overlap::{OVERLAP_DELIMITER, all_overlapping_class_names, overlap_labels};

use crate::error::{Error, Result};
use crate::geometry::Roi;
use crate::hierarchy::{HierarchyId, ObjectHierarchy, ObjectId, PathObject};
use crate::label::Label;
use crate::params::GroupParams;
use crate::spatial::{Iter, Located, SpatialIndex};

/// Snapshot of a detection object, as stored in a group's index.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub id: ObjectId,
    pub label: Option<Label>,
    pub roi: Roi,
}

impl Detection {
    pub fn snapshot(hierarchy: &dyn ObjectHierarchy, id: ObjectId) -> Result<Self> {
        let object = hierarchy.object(id)?;
        Ok(Self {
            id,
            label: object.label.clone(),
            roi: object.roi.clone(),
        })
    }
}

impl Located for Detection {
    fn roi(&self) -> &Roi {
        &self.roi
    }
}

/// Naming convention of the containers of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Detections computed on a single image channel.
    Cells,
    /// Copies of detections positive on several channels.
    Overlaps,
}

impl ContainerKind {
    pub fn container_name(self, id: &str) -> String {
        match self {
            Self::Cells => format!("{id} cells"),
            Self::Overlaps => format!("{id} overlaps"),
        }
    }
}

/// Detections of one kind grouped under container annotations.
#[derive(Debug, Clone)]
pub struct DetectionGroup {
    id: SmolStr,
    kind: ContainerKind,
    labels: Vec<Label>,
    discarded: Label,
    hierarchy: HierarchyId,
    containers: Vec<ObjectId>,
    index: SpatialIndex<Detection>,
    max_depth: usize,
}

impl DetectionGroup {
    /// Collects the containers of `kind` named after `id` and the detections
    /// they own.
    ///
    /// # Errors
    ///
    /// [`Error::NoContainersFound`] when the hierarchy has no such container.
    pub fn new(
        id: &str,
        labels: Vec<Label>,
        kind: ContainerKind,
        hierarchy: &mut dyn ObjectHierarchy,
    ) -> Result<Self> {
        Self::with_params(id, labels, kind, hierarchy, &GroupParams::default())
    }

    pub fn with_params(
        id: &str,
        labels: Vec<Label>,
        kind: ContainerKind,
        hierarchy: &mut dyn ObjectHierarchy,
        params: &GroupParams,
    ) -> Result<Self> {
        params.validate()?;
        let mut group = Self {
            id: SmolStr::new(id),
            kind,
            labels: labels.into_iter().unique().collect(),
            discarded: Label::discarded(id),
            hierarchy: hierarchy.id(),
            containers: Vec::new(),
            index: SpatialIndex::empty(),
            max_depth: params.max_depth,
        };
        group.refresh(hierarchy)?;
        Ok(group)
    }

    /// The detections of a single channel: `"<id> cells"` containers and the
    /// `<id>` label.
    pub fn channel(id: &str, hierarchy: &mut dyn ObjectHierarchy) -> Result<Self> {
        Self::new(id, vec![Label::new(id)], ContainerKind::Cells, hierarchy)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub const fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Labels identifying the detections of this group.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    /// Label of the detections a classifier rejected.
    pub const fn discarded_label(&self) -> &Label {
        &self.discarded
    }

    /// Label of the container annotations.
    pub fn container_label(&self) -> Label {
        Label::new(&self.id)
    }

    pub fn container_name(&self) -> String {
        self.kind.container_name(&self.id)
    }

    pub const fn hierarchy_id(&self) -> HierarchyId {
        self.hierarchy
    }

    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Container annotations, in hierarchy order.
    pub fn containers(&self) -> &[ObjectId] {
        &self.containers
    }

    pub const fn index(&self) -> &SpatialIndex<Detection> {
        &self.index
    }

    pub fn iter(&self) -> Iter<'_, Detection> {
        self.index.iter()
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The detection whose centroid lies inside `roi`, closest to its centroid.
    pub fn overlapping(&self, roi: &Roi) -> Option<&Detection> {
        self.index.overlapping(roi)
    }

    /// Same id, naming convention, hierarchy and set of labels.
    pub fn is_compatible_with(&self, other: &DetectionGroup) -> bool {
        self.id == other.id
            && self.kind == other.kind
            && self.hierarchy == other.hierarchy
            && self.labels.iter().collect::<FxHashSet<_>>()
                == other.labels.iter().collect::<FxHashSet<_>>()
    }

    pub fn is_container(&self, object: &PathObject) -> bool {
        object.is_annotation() && object.has_name(&self.container_name())
    }

    /// Whether `object` is a detection of this group. With `include_discarded`
    /// the discarded label counts as well.
    pub fn is_group_detection(&self, object: &PathObject, include_discarded: bool) -> bool {
        object.is_detection()
            && object.label.as_ref().is_some_and(|label| {
                self.labels.contains(label) || (include_discarded && *label == self.discarded)
            })
    }

    pub(crate) fn check_hierarchy(&self, hierarchy: &dyn ObjectHierarchy) -> Result<()> {
        if hierarchy.id() == self.hierarchy {
            Ok(())
        } else {
            Err(Error::HierarchyMismatch)
        }
    }

    pub(crate) fn search_containers(&self, hierarchy: &dyn ObjectHierarchy) -> Vec<ObjectId> {
        hierarchy
            .annotations()
            .into_iter()
            .filter(|&a| hierarchy.get(a).is_some_and(|o| self.is_container(o)))
            .collect()
    }

    /// Direct detection children of `containers` belonging to this group.
    pub(crate) fn container_detections(
        &self,
        hierarchy: &dyn ObjectHierarchy,
        containers: &[ObjectId],
        include_discarded: bool,
    ) -> Result<Vec<ObjectId>> {
        if containers.is_empty() {
            return Err(self.no_containers());
        }
        Ok(containers
            .iter()
            .flat_map(|&c| hierarchy.child_detections(c))
            .filter(|&d| {
                hierarchy
                    .get(d)
                    .is_some_and(|o| self.is_group_detection(o, include_discarded))
            })
            .collect())
    }

    pub(crate) fn build_index(
        &self,
        hierarchy: &dyn ObjectHierarchy,
        detections: &[ObjectId],
    ) -> Result<SpatialIndex<Detection>> {
        let snapshots = detections
            .iter()
            .map(|&d| Detection::snapshot(hierarchy, d))
            .collect::<Result<Vec<_>>>()?;
        SpatialIndex::build(snapshots, self.max_depth)
    }

    pub(crate) fn replace_index(&mut self, index: SpatialIndex<Detection>) {
        self.index = index;
    }

    pub(crate) fn no_containers(&self) -> Error {
        Error::NoContainersFound {
            container: self.container_name(),
        }
    }
}

impl<'a> IntoIterator for &'a DetectionGroup {
    type Item = &'a Detection;
    type IntoIter = Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Two groups are functionally the same when they are compatible and track
/// the same containers.
impl PartialEq for DetectionGroup {
    fn eq(&self, other: &Self) -> bool {
        self.is_compatible_with(other)
            && self.containers.iter().collect::<FxHashSet<_>>()
                == other.containers.iter().collect::<FxHashSet<_>>()
    }
}

impl fmt::Display for DetectionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' [{}] ({} containers, {} detections)",
            self.container_name(),
            self.labels.iter().join(", "),
            self.containers.len(),
            self.index.len()
        )
    }
}
