use std::fmt;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::geometry::Roi;
use crate::label::Label;

/// Identifier of an object stored in a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identity of a hierarchy instance, used to tell whether two groups work on
/// the same image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HierarchyId(u64);

impl HierarchyId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Root,
    Annotation,
    Detection,
}

/// An annotation or a detection with its shape, classification and
/// measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct PathObject {
    pub kind: ObjectKind,
    pub name: Option<String>,
    pub label: Option<Label>,
    pub roi: Roi,
    pub locked: bool,
    pub measurements: IndexMap<SmolStr, f64>,
}

impl PathObject {
    pub fn new(kind: ObjectKind, roi: Roi) -> Self {
        Self {
            kind,
            name: None,
            label: None,
            roi,
            locked: false,
            measurements: IndexMap::new(),
        }
    }

    pub fn annotation(roi: Roi) -> Self {
        Self::new(ObjectKind::Annotation, roi)
    }

    pub fn detection(roi: Roi) -> Self {
        Self::new(ObjectKind::Detection, roi)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<Label>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_measurement(mut self, name: impl AsRef<str>, value: f64) -> Self {
        self.measurements.insert(SmolStr::new(name.as_ref()), value);
        self
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn is_annotation(&self) -> bool {
        self.kind == ObjectKind::Annotation
    }

    pub fn is_detection(&self) -> bool {
        self.kind == ObjectKind::Detection
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
    }

    pub fn measurement(&self, name: &str) -> Option<f64> {
        self.measurements.get(name).copied()
    }
}
