use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use itertools::Itertools;
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use rustc_hash::FxHashSet;

use super::object::{HierarchyId, ObjectId, ObjectKind, PathObject};
use super::ObjectHierarchy;
use crate::error::{Error, Result};
use crate::geometry::Roi;
use crate::label::Label;
use crate::utils::{HasBBox, Point, Rect};

static NEXT_HIERARCHY_ID: AtomicU64 = AtomicU64::new(1);

/// Detection centroid entry of the lookup tree.
type CentroidEntry = GeomWithData<[f64; 2], ObjectId>;

fn centroid_entry(id: ObjectId, (x, y): Point) -> CentroidEntry {
    GeomWithData::new([x, y], id)
}

#[derive(Debug, Clone)]
struct Node {
    object: PathObject,
    parent: Option<ObjectId>,
    children: Vec<ObjectId>,
}

/// In-memory object hierarchy.
///
/// Objects are listed in insertion order. Detection centroids are mirrored in
/// an rstar R-tree, updated on every add, move, reshape and removal, so that
/// `detections_inside` does not scan the whole image.
pub struct MemoryHierarchy {
    id: HierarchyId,
    bounds: Rect,
    root: ObjectId,
    next_id: u64,
    nodes: IndexMap<ObjectId, Node>,
    centroids: RTree<CentroidEntry>,
    hierarchy_events: usize,
    classification_events: usize,
}

impl MemoryHierarchy {
    /// Creates an empty hierarchy for an image of the given size.
    pub fn new(width: f64, height: f64) -> Self {
        let root = ObjectId::new(0);
        let mut nodes = IndexMap::new();
        nodes.insert(
            root,
            Node {
                object: PathObject::new(ObjectKind::Root, Roi::rectangle(0.0, 0.0, width, height)),
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            id: HierarchyId::new(NEXT_HIERARCHY_ID.fetch_add(1, Ordering::Relaxed)),
            bounds: (0.0, 0.0, width, height),
            root,
            next_id: 1,
            nodes,
            centroids: RTree::new(),
            hierarchy_events: 0,
            classification_events: 0,
        }
    }

    /// Number of objects, root excluded.
    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All detections, in hierarchy order.
    pub fn detections(&self) -> Vec<ObjectId> {
        self.sorted_ids(PathObject::is_detection)
    }

    /// How many times "hierarchy changed" was fired.
    pub fn hierarchy_events(&self) -> usize {
        self.hierarchy_events
    }

    /// How many times "classifications changed" was fired.
    pub fn classification_events(&self) -> usize {
        self.classification_events
    }

    fn node_mut(&mut self, id: ObjectId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(Error::UnknownObject(id))
    }

    fn is_descendant(&self, id: ObjectId, ancestor: ObjectId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.nodes.get(&c).and_then(|n| n.parent);
        }
        false
    }

    fn detach(&mut self, id: ObjectId) {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|&c| c != id);
        }
    }

    fn collect_subtree(&self, id: ObjectId, out: &mut Vec<ObjectId>) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                out.push(current);
                stack.extend(node.children.iter().copied());
            }
        }
    }

    /// Moves the children of `id` that survive the removal up to its closest
    /// surviving ancestor.
    fn lift_children(&mut self, id: ObjectId, removed: &FxHashSet<ObjectId>) {
        let mut parent = self.parent(id).unwrap_or(self.root);
        while removed.contains(&parent) {
            parent = self.parent(parent).unwrap_or(self.root);
        }
        let children: Vec<ObjectId> = self
            .nodes
            .get_mut(&id)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default()
            .into_iter()
            .filter(|c| !removed.contains(c))
            .collect();
        for &child in &children {
            if let Some(node) = self.nodes.get_mut(&child) {
                node.parent = Some(parent);
            }
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.extend(children);
        }
    }

    /// Order of `nodes` is not kept past a removal; ids sort in insertion order.
    fn sorted_ids(&self, keep: impl Fn(&PathObject) -> bool) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .nodes
            .iter()
            .filter(|(_, node)| keep(&node.object))
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }

    fn drop_node(&mut self, id: ObjectId) {
        if let Some(node) = self.nodes.swap_remove(&id)
            && node.object.is_detection()
        {
            self.centroids
                .remove(&centroid_entry(id, node.object.roi.centroid()));
        }
    }
}

impl ObjectHierarchy for MemoryHierarchy {
    fn id(&self) -> HierarchyId {
        self.id
    }

    fn root(&self) -> ObjectId {
        self.root
    }

    fn image_bounds(&self) -> Rect {
        self.bounds
    }

    fn get(&self, id: ObjectId) -> Option<&PathObject> {
        self.nodes.get(&id).map(|n| &n.object)
    }

    fn parent(&self, id: ObjectId) -> Option<ObjectId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    fn children(&self, id: ObjectId) -> &[ObjectId] {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    fn annotations(&self) -> Vec<ObjectId> {
        self.sorted_ids(PathObject::is_annotation)
    }

    fn detections_inside(&self, roi: &Roi) -> Vec<ObjectId> {
        let mut found: Vec<ObjectId> = match roi {
            Roi::Points(points) => points
                .iter()
                .flat_map(|&(x, y)| self.centroids.locate_all_at_point(&[x, y]))
                .map(|entry| entry.data)
                .collect(),
            _ => {
                let (x0, y0, x1, y1) = roi.bbox();
                let envelope = AABB::from_corners([x0, y0], [x1, y1]);
                self.centroids
                    .locate_in_envelope(&envelope)
                    .filter(|entry| {
                        let [x, y] = *entry.geom();
                        roi.contains_point((x, y))
                    })
                    .map(|entry| entry.data)
                    .collect()
            }
        };
        found.sort_unstable();
        found.dedup();
        found
    }

    fn add_object(&mut self, parent: ObjectId, object: PathObject) -> Result<ObjectId> {
        if !self.nodes.contains_key(&parent) {
            return Err(Error::UnknownObject(parent));
        }
        let id = ObjectId::new(self.next_id);
        self.next_id += 1;
        if object.is_detection() {
            self.centroids
                .insert(centroid_entry(id, object.roi.centroid()));
        }
        self.nodes.insert(
            id,
            Node {
                object,
                parent: Some(parent),
                children: Vec::new(),
            },
        );
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn move_object(&mut self, parent: ObjectId, child: ObjectId) -> Result<()> {
        if !self.nodes.contains_key(&parent) {
            return Err(Error::UnknownObject(parent));
        }
        if !self.nodes.contains_key(&child) {
            return Err(Error::UnknownObject(child));
        }
        if child == self.root || self.is_descendant(parent, child) {
            return Err(Error::IllegalConfiguration(format!(
                "cannot move {child} below {parent}"
            )));
        }
        if self.parent(child) == Some(parent) {
            return Ok(());
        }
        self.detach(child);
        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        Ok(())
    }

    fn set_roi(&mut self, id: ObjectId, roi: Roi) -> Result<()> {
        let node = self.node_mut(id)?;
        let is_detection = node.object.is_detection();
        let previous = std::mem::replace(&mut node.object.roi, roi);
        if is_detection {
            let current = node.object.roi.centroid();
            self.centroids
                .remove(&centroid_entry(id, previous.centroid()));
            self.centroids.insert(centroid_entry(id, current));
        }
        Ok(())
    }

    fn set_label(&mut self, id: ObjectId, label: Option<Label>) -> Result<()> {
        self.node_mut(id)?.object.label = label;
        Ok(())
    }

    fn set_locked(&mut self, id: ObjectId, locked: bool) -> Result<()> {
        self.node_mut(id)?.object.locked = locked;
        Ok(())
    }

    fn remove_objects(&mut self, ids: &[ObjectId], keep_children: bool) {
        let requested: Vec<ObjectId> = ids
            .iter()
            .copied()
            .filter(|&id| id != self.root && self.nodes.contains_key(&id))
            .unique()
            .collect();
        if requested.is_empty() {
            return;
        }

        let removed: FxHashSet<ObjectId> = if keep_children {
            let removed: FxHashSet<ObjectId> = requested.iter().copied().collect();
            for &id in &requested {
                self.lift_children(id, &removed);
            }
            removed
        } else {
            let mut subtree = Vec::new();
            for &id in &requested {
                self.collect_subtree(id, &mut subtree);
            }
            subtree.into_iter().collect()
        };

        let parents: FxHashSet<ObjectId> = removed
            .iter()
            .filter_map(|id| self.parent(*id))
            .filter(|p| !removed.contains(p))
            .collect();
        for parent in parents {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.retain(|c| !removed.contains(c));
            }
        }
        for id in removed {
            self.drop_node(id);
        }
    }

    fn fire_hierarchy_changed(&mut self) {
        self.hierarchy_events += 1;
    }

    fn fire_classifications_changed(&mut self, _ids: &[ObjectId]) {
        self.classification_events += 1;
    }
}
