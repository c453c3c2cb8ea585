//! Object classifiers and their sequencing over detection groups.
//!
//! A [`PartialClassifier`] pairs a classifier with the region it works on.
//! Sequences are applied in order, so where two steps cover the same
//! detections the later step decides (see `sequence`).

mod sequence;

pub use sequence::{ClassificationReport, relevant_steps};

use crate::error::Result;
use crate::hierarchy::{ObjectHierarchy, ObjectId};
use crate::label::Label;

/// A classification model assigning labels to hierarchy objects.
pub trait ObjectClassifier {
    fn name(&self) -> &str;

    /// Every label the classifier may assign.
    fn output_labels(&self) -> Vec<Label>;

    /// Whether the classifier assigns a single label to everything.
    fn is_pass_through(&self) -> bool {
        false
    }

    /// Classifies `objects`, returning how many changed label.
    fn classify(
        &self,
        hierarchy: &mut dyn ObjectHierarchy,
        objects: &[ObjectId],
    ) -> Result<usize>;
}

/// Part of the image a classifier is applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifierScope {
    WholeImage,
    /// Only detections inside these annotations.
    Annotations(Vec<ObjectId>),
}

/// A classifier restricted to a scope.
#[derive(Clone)]
pub struct PartialClassifier<'a> {
    pub classifier: &'a dyn ObjectClassifier,
    pub scope: ClassifierScope,
}

impl<'a> PartialClassifier<'a> {
    pub const fn new(classifier: &'a dyn ObjectClassifier, scope: ClassifierScope) -> Self {
        Self { classifier, scope }
    }

    pub const fn whole_image(classifier: &'a dyn ObjectClassifier) -> Self {
        Self {
            classifier,
            scope: ClassifierScope::WholeImage,
        }
    }

    pub fn covers_full_image(&self) -> bool {
        matches!(self.scope, ClassifierScope::WholeImage)
    }
}

fn relabel(hierarchy: &mut dyn ObjectHierarchy, id: ObjectId, label: &Label) -> Result<bool> {
    if hierarchy.object(id)?.label.as_ref() == Some(label) {
        return Ok(false);
    }
    hierarchy.set_label(id, Some(label.clone()))?;
    Ok(true)
}

/// Assigns the same label to every object.
#[derive(Debug, Clone)]
pub struct SingleClassifier {
    name: String,
    label: Label,
}

impl SingleClassifier {
    pub fn new(label: impl Into<Label>) -> Self {
        let label = label.into();
        Self {
            name: format!("all {label}"),
            label,
        }
    }
}

impl ObjectClassifier for SingleClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_labels(&self) -> Vec<Label> {
        vec![self.label.clone()]
    }

    fn is_pass_through(&self) -> bool {
        true
    }

    fn classify(
        &self,
        hierarchy: &mut dyn ObjectHierarchy,
        objects: &[ObjectId],
    ) -> Result<usize> {
        let mut changed = 0;
        for &id in objects {
            changed += usize::from(relabel(hierarchy, id, &self.label)?);
        }
        Ok(changed)
    }
}

/// Splits objects on a measurement: `above` when the value reaches the
/// threshold, `below` otherwise (missing measurements included).
#[derive(Debug, Clone)]
pub struct ThresholdClassifier {
    pub name: String,
    pub measurement: String,
    pub threshold: f64,
    pub above: Label,
    pub below: Label,
}

impl ThresholdClassifier {
    pub fn new(
        measurement: impl Into<String>,
        threshold: f64,
        above: impl Into<Label>,
        below: impl Into<Label>,
    ) -> Self {
        let measurement = measurement.into();
        Self {
            name: format!("{measurement} >= {threshold}"),
            measurement,
            threshold,
            above: above.into(),
            below: below.into(),
        }
    }
}

impl ObjectClassifier for ThresholdClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn output_labels(&self) -> Vec<Label> {
        vec![self.above.clone(), self.below.clone()]
    }

    fn classify(
        &self,
        hierarchy: &mut dyn ObjectHierarchy,
        objects: &[ObjectId],
    ) -> Result<usize> {
        let mut changed = 0;
        for &id in objects {
            let value = hierarchy.object(id)?.measurement(&self.measurement);
            let label = if value.is_some_and(|v| v >= self.threshold) {
                &self.above
            } else {
                &self.below
            };
            changed += usize::from(relabel(hierarchy, id, label)?);
        }
        Ok(changed)
    }
}
