use itertools::Itertools;
use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use super::{ClassifierScope, ObjectClassifier, PartialClassifier};
use crate::detections::DetectionGroup;
use crate::error::{Error, Result};
use crate::hierarchy::{ObjectHierarchy, ObjectId};
use crate::label::Label;

/// Outcome of [`DetectionGroup::apply_classifiers`].
#[derive(Debug, Default)]
pub struct ClassificationReport {
    /// Steps that ran to completion.
    pub steps_applied: usize,
    /// Detections indexed after classification.
    pub detections: usize,
    /// The incompatibility that stopped the sequence, if any.
    pub aborted: Option<Error>,
}

impl ClassificationReport {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

/// Drops the steps a later whole-image step would override anyway: keeps
/// the suffix starting at the last whole-image step.
pub fn relevant_steps<'s, 'a>(steps: &'s [PartialClassifier<'a>]) -> &'s [PartialClassifier<'a>] {
    let start = steps
        .iter()
        .rposition(PartialClassifier::covers_full_image)
        .unwrap_or(0);
    &steps[start..]
}

impl DetectionGroup {
    /// Whether `classifier` can label the detections of this group.
    ///
    /// It must output exactly two labels, covering the group's labels and its
    /// discarded label, or be a pass-through classifier assigning one of the
    /// group's labels.
    pub fn check_classifier(&self, classifier: &dyn ObjectClassifier) -> Result<()> {
        let got: Vec<Label> = classifier.output_labels().into_iter().unique().collect();
        let outputs: FxHashSet<&Label> = got.iter().collect();
        let full = outputs.len() == 2
            && self.labels().iter().all(|l| outputs.contains(l))
            && outputs.contains(self.discarded_label());
        let pass_through = classifier.is_pass_through()
            && got.len() == 1
            && self.labels().contains(&got[0]);
        if full || pass_through {
            return Ok(());
        }
        Err(Error::IncompatibleClassifier {
            classifier: classifier.name().to_string(),
            expected: self
                .labels()
                .iter()
                .chain(std::iter::once(self.discarded_label()))
                .cloned()
                .collect(),
            got,
        })
    }

    /// Applies `steps` in order to the detections of this group, discarded
    /// ones included, then re-indexes the detections still accepted.
    ///
    /// Where scopes overlap, the later step wins. An incompatible classifier
    /// stops the sequence; it is reported in
    /// [`ClassificationReport::aborted`] and the steps before it are kept.
    pub fn apply_classifiers(
        &mut self,
        hierarchy: &mut dyn ObjectHierarchy,
        steps: &[PartialClassifier<'_>],
    ) -> Result<ClassificationReport> {
        self.check_hierarchy(hierarchy)?;
        let mut report = ClassificationReport::default();
        let mut accumulated: Vec<ObjectId> = Vec::new();
        let mut seen: FxHashSet<ObjectId> = FxHashSet::default();

        for step in relevant_steps(steps) {
            if let Err(e) = self.check_classifier(step.classifier) {
                warn!(
                    classifier = step.classifier.name(),
                    container = %self.container_name(),
                    "skipping classifier: {e}"
                );
                report.aborted = Some(e);
                break;
            }
            let targets = self.classification_targets(hierarchy, &step.scope)?;
            let changed = step.classifier.classify(hierarchy, &targets)?;
            if changed > 0 {
                hierarchy.fire_classifications_changed(&targets);
            }
            debug!(
                classifier = step.classifier.name(),
                targets = targets.len(),
                changed,
                "classifier applied"
            );
            for id in targets {
                let accepted = hierarchy
                    .get(id)
                    .is_some_and(|o| self.is_group_detection(o, false));
                if accepted && seen.insert(id) {
                    accumulated.push(id);
                }
            }
            report.steps_applied += 1;
        }

        if report.steps_applied > 0 {
            // scoped steps may reach detections outside every container
            let containers: FxHashSet<ObjectId> = self.containers().iter().copied().collect();
            accumulated.retain(|&id| {
                hierarchy
                    .parent(id)
                    .is_some_and(|p| containers.contains(&p))
                    && hierarchy
                        .get(id)
                        .is_some_and(|o| self.is_group_detection(o, false))
            });
            let index = self.build_index(hierarchy, &accumulated)?;
            report.detections = index.len();
            self.replace_index(index);
        }
        Ok(report)
    }

    fn classification_targets(
        &self,
        hierarchy: &dyn ObjectHierarchy,
        scope: &ClassifierScope,
    ) -> Result<Vec<ObjectId>> {
        match scope {
            ClassifierScope::WholeImage => {
                self.container_detections(hierarchy, self.containers(), true)
            }
            ClassifierScope::Annotations(annotations) => {
                let mut targets = Vec::new();
                for &annotation in annotations {
                    let roi = hierarchy.roi(annotation)?;
                    targets.extend(hierarchy.detections_inside(roi).into_iter().filter(|&d| {
                        hierarchy
                            .get(d)
                            .is_some_and(|o| self.is_group_detection(o, true))
                    }));
                }
                Ok(targets.into_iter().unique().collect())
            }
        }
    }
}
