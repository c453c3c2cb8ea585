use crate::error::{Error, Result};
use crate::geometry::Roi;
use crate::hierarchy::{ObjectHierarchy, ObjectId, PathObject};
use crate::label::Label;

/// Name of the annotation covering the whole image, used when detections are
/// computed without a region.
pub const FULL_IMAGE_ANNOTATION_NAME: &str = "AllDetections";

/// Returns the whole-image annotation, creating it below the root if absent.
///
/// # Errors
///
/// [`Error::MultipleFullImageAnnotations`] when more than one exists.
pub fn full_image_annotation(hierarchy: &mut dyn ObjectHierarchy) -> Result<ObjectId> {
    let found: Vec<ObjectId> = hierarchy
        .annotations()
        .into_iter()
        .filter(|&a| {
            hierarchy
                .get(a)
                .is_some_and(|o| o.has_name(FULL_IMAGE_ANNOTATION_NAME))
        })
        .collect();
    match found.as_slice() {
        [] => {
            let (x0, y0, x1, y1) = hierarchy.image_bounds();
            let annotation = PathObject::annotation(Roi::Rectangle((x0, y0, x1, y1)))
                .with_name(FULL_IMAGE_ANNOTATION_NAME);
            let root = hierarchy.root();
            hierarchy.add_object(root, annotation)
        }
        [single] => Ok(*single),
        _ => Err(Error::MultipleFullImageAnnotations {
            name: FULL_IMAGE_ANNOTATION_NAME.to_string(),
        }),
    }
}

/// Creates a locked copy of `parent` named `name` and labeled `label`, as a
/// child of `parent`.
///
/// With `overwrite`, a child of `parent` with the same name, label and shape
/// is reused instead, after deleting everything below it.
pub fn create_container(
    hierarchy: &mut dyn ObjectHierarchy,
    parent: ObjectId,
    name: &str,
    label: &Label,
    overwrite: bool,
) -> Result<ObjectId> {
    let parent_roi = hierarchy.roi(parent)?.clone();
    if overwrite {
        let existing = hierarchy.children(parent).iter().copied().find(|&c| {
            hierarchy.get(c).is_some_and(|o| {
                o.is_annotation()
                    && o.has_name(name)
                    && o.label.as_ref() == Some(label)
                    && o.roi == parent_roi
            })
        });
        if let Some(container) = existing {
            let children = hierarchy.children(container).to_vec();
            hierarchy.remove_objects(&children, false);
            return Ok(container);
        }
    }
    let container = PathObject::annotation(parent_roi)
        .with_name(name)
        .with_label(label.clone())
        .locked(true);
    hierarchy.add_object(parent, container)
}
