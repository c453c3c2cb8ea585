//! Host object hierarchy.
//!
//! Detection groups never own the annotations and detections they work on:
//! every operation receives the hierarchy as an explicit `&mut dyn
//! ObjectHierarchy` handle. `MemoryHierarchy` is the in-crate implementation.

mod memory;
mod object;

pub use memory::MemoryHierarchy;
pub use object::{HierarchyId, ObjectId, ObjectKind, PathObject};

use crate::error::{Error, Result};
use crate::geometry::Roi;
use crate::label::Label;
use crate::utils::Rect;

/// Storage of annotations and detections organised as a tree.
pub trait ObjectHierarchy {
    /// Identity of this hierarchy instance.
    fn id(&self) -> HierarchyId;

    /// The root object; it has no parent and cannot be removed.
    fn root(&self) -> ObjectId;

    /// Bounds of the whole image.
    fn image_bounds(&self) -> Rect;

    fn get(&self, id: ObjectId) -> Option<&PathObject>;

    fn parent(&self, id: ObjectId) -> Option<ObjectId>;

    /// Direct children, in insertion order. Unknown ids have no children.
    fn children(&self, id: ObjectId) -> &[ObjectId];

    /// All annotations, in hierarchy order.
    fn annotations(&self) -> Vec<ObjectId>;

    /// Detections whose centroid lies inside `roi`, sorted by id.
    fn detections_inside(&self, roi: &Roi) -> Vec<ObjectId>;

    fn add_object(&mut self, parent: ObjectId, object: PathObject) -> Result<ObjectId>;

    /// Moves `child` (with its descendants) below `parent`.
    fn move_object(&mut self, parent: ObjectId, child: ObjectId) -> Result<()>;

    fn set_roi(&mut self, id: ObjectId, roi: Roi) -> Result<()>;

    fn set_label(&mut self, id: ObjectId, label: Option<Label>) -> Result<()>;

    fn set_locked(&mut self, id: ObjectId, locked: bool) -> Result<()>;

    /// Removes the given objects. Unless `keep_children` is set, descendants
    /// are removed too; otherwise they move up to the removed object's parent.
    /// Unknown ids are ignored.
    fn remove_objects(&mut self, ids: &[ObjectId], keep_children: bool);

    fn fire_hierarchy_changed(&mut self);

    fn fire_classifications_changed(&mut self, ids: &[ObjectId]);

    fn object(&self, id: ObjectId) -> Result<&PathObject> {
        self.get(id).ok_or(Error::UnknownObject(id))
    }

    fn roi(&self, id: ObjectId) -> Result<&Roi> {
        self.object(id).map(|o| &o.roi)
    }

    /// Direct children that are detections.
    fn child_detections(&self, id: ObjectId) -> Vec<ObjectId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.get(c).is_some_and(PathObject::is_detection))
            .collect()
    }
}
