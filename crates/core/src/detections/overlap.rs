use itertools::Itertools;
use tracing::{debug, warn};

use super::container::create_container;
use super::{ContainerKind, DetectionGroup};
use crate::error::{Error, Result};
use crate::hierarchy::{ObjectHierarchy, ObjectId, PathObject};
use crate::label::Label;
use crate::params::GroupParams;

/// Separator of channel ids in the label of an overlapping detection.
pub const OVERLAP_DELIMITER: &str = "~";

/// Every combination of `names` joined by [`OVERLAP_DELIMITER`], keeping the
/// order of `names` inside each combination.
///
/// For `[a, b, c]`: `a`, then the combinations of `[b, c]`, then `a~` followed
/// by each of those, i.e. `[a, b, c, b~c, a~b, a~c, a~b~c]`.
pub fn all_overlapping_class_names<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let Some((first, rest)) = names.split_first() else {
        return Vec::new();
    };
    let first = first.as_ref();
    let tail = all_overlapping_class_names(rest);
    std::iter::once(first.to_string())
        .chain(tail.iter().cloned())
        .chain(tail.iter().map(|t| format!("{first}{OVERLAP_DELIMITER}{t}")))
        .collect()
}

/// Labels an overlap group between `control` and `others` may assign.
///
/// # Errors
///
/// [`Error::IllegalConfiguration`] when `others` is empty.
pub fn overlap_labels<S: AsRef<str>>(control: &str, others: &[S]) -> Result<Vec<Label>> {
    if others.is_empty() {
        return Err(Error::IllegalConfiguration(
            "overlapping detections need at least one group besides the control".into(),
        ));
    }
    Ok(all_overlapping_class_names(others)
        .into_iter()
        .map(|name| Label::new(format!("{control}{OVERLAP_DELIMITER}{name}")))
        .collect())
}

impl DetectionGroup {
    /// Copies every detection of `control` overlapping a detection of at least
    /// one of `others` into `"<control> overlaps"` containers.
    ///
    /// A copy is labeled with the control id followed by the ids of the
    /// overlapping groups, e.g. `cFos~Arc`. Overlap containers are created next
    /// to each control container (below the same parent), replacing previous
    /// results.
    pub fn compute_overlaps(
        hierarchy: &mut dyn ObjectHierarchy,
        control: &DetectionGroup,
        others: &[&DetectionGroup],
    ) -> Result<Self> {
        let other_ids: Vec<&str> = others.iter().map(|o| o.id()).collect();
        let labels = overlap_labels(control.id(), &other_ids)?;
        control.check_hierarchy(hierarchy)?;
        for other in others {
            other.check_hierarchy(hierarchy)?;
        }

        let mut copies: Vec<Option<PathObject>> = control
            .iter()
            .filter_map(|cell| {
                let positive: Vec<&str> = others
                    .iter()
                    .filter(|o| o.overlapping(&cell.roi).is_some())
                    .map(|o| o.id())
                    .collect();
                if positive.is_empty() {
                    return None;
                }
                let label = std::iter::once(control.id())
                    .chain(positive)
                    .join(OVERLAP_DELIMITER);
                Some(PathObject::detection(cell.roi.clone()).with_label(label))
            })
            .map(Some)
            .collect();
        let total = copies.len();

        let name = ContainerKind::Overlaps.container_name(control.id());
        let container_label = control.container_label();
        let parents: Vec<ObjectId> = control
            .containers()
            .iter()
            .map(|&c| hierarchy.parent(c).unwrap_or_else(|| hierarchy.root()))
            .unique()
            .collect();
        for parent in parents {
            let container = create_container(hierarchy, parent, &name, &container_label, true)?;
            let region = hierarchy.roi(container)?.clone();
            for slot in &mut copies {
                if slot
                    .as_ref()
                    .is_some_and(|copy| region.contains_point(copy.roi.centroid()))
                    && let Some(copy) = slot.take()
                {
                    hierarchy.add_object(container, copy)?;
                }
            }
        }

        let undelivered = copies.iter().flatten().count();
        if undelivered > 0 {
            warn!(
                container = %name,
                undelivered,
                "overlapping detections outside every overlap container were dropped"
            );
        }
        debug!(container = %name, overlaps = total - undelivered, "computed overlaps");

        Self::with_params(
            control.id(),
            labels,
            ContainerKind::Overlaps,
            hierarchy,
            &GroupParams {
                max_depth: control.max_depth(),
            },
        )
    }

    /// Loads overlaps computed earlier between `control_id` and `other_ids`.
    pub fn load_overlaps<S: AsRef<str>>(
        hierarchy: &mut dyn ObjectHierarchy,
        control_id: &str,
        other_ids: &[S],
    ) -> Result<Self> {
        let labels = overlap_labels(control_id, other_ids)?;
        Self::new(control_id, labels, ContainerKind::Overlaps, hierarchy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_follow_the_recursive_order() {
        assert_eq!(
            all_overlapping_class_names(&["a", "b", "c"]),
            ["a", "b", "c", "b~c", "a~b", "a~c", "a~b~c"]
        );
        assert!(all_overlapping_class_names::<&str>(&[]).is_empty());
    }

    #[test]
    fn overlap_labels_are_prefixed_by_the_control() {
        let labels = overlap_labels("cFos", &["Arc", "NeuN"]).unwrap();
        let names: Vec<&str> = labels.iter().map(Label::as_str).collect();
        assert_eq!(
            names,
            ["cFos~Arc", "cFos~NeuN", "cFos~Arc~NeuN"]
        );
        assert!(overlap_labels::<&str>("cFos", &[]).is_err());
    }
}
