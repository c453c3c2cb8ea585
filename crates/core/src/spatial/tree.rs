//! BVH arena.
//!
//! The tree is built top-down: the union box of the objects is split in four
//! equally sized squares and every object goes to the square holding its
//! centroid. Nodes live in a flat `Vec` and refer to their children by index.

use ordered_float::OrderedFloat;
use smallvec::SmallVec;

use super::Located;
use crate::error::{Error, Result};
use crate::geometry::Roi;
use crate::utils::{Point, Rect, bbox_is_degenerate, bbox_may_overlap, bbox_union, distance};

/// Node of the hierarchy.
#[derive(Clone, Debug)]
pub enum BvhNode {
    /// A single stored object, with the box and centroid of its ROI.
    Leaf {
        item: usize,
        bbox: Rect,
        centroid: Point,
    },
    /// Union box of the subtree and up to four children (more when the
    /// subdivision stopped at the depth limit).
    Internal {
        bbox: Rect,
        children: SmallVec<[usize; 4]>,
    },
}

impl BvhNode {
    pub const fn bbox(&self) -> Rect {
        match self {
            Self::Leaf { bbox, .. } | Self::Internal { bbox, .. } => *bbox,
        }
    }

    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

/// Bounding volume hierarchy over objects with a ROI.
///
/// Build once, query many times: the construction cost pays off as soon as
/// more than a couple of lookups are made.
#[derive(Clone, Debug)]
pub struct SpatialIndex<T> {
    items: Vec<T>,
    nodes: Vec<BvhNode>,
    root: Option<usize>,
}

impl<T> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> SpatialIndex<T> {
    /// An index over nothing.
    pub const fn empty() -> Self {
        Self {
            items: Vec::new(),
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Box enclosing every stored ROI.
    pub fn bbox(&self) -> Option<Rect> {
        self.root.map(|r| self.nodes[r].bbox())
    }

    /// Maximum depth: a leaf counts 0, an internal node one more than its
    /// deepest child. An empty index has depth -1.
    pub fn depth(&self) -> i32 {
        self.root.map_or(-1, |r| self.node_depth(r))
    }

    fn node_depth(&self, idx: usize) -> i32 {
        match &self.nodes[idx] {
            BvhNode::Leaf { .. } => 0,
            BvhNode::Internal { children, .. } => {
                1 + children
                    .iter()
                    .map(|&c| self.node_depth(c))
                    .max()
                    .unwrap_or(-2)
            }
        }
    }

    /// The node arena, root first.
    pub fn nodes(&self) -> &[BvhNode] {
        &self.nodes
    }

    /// Depth-first walk over every stored object.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            index: self,
            stack: self.root.into_iter().collect(),
        }
    }

    /// Consumes the index, returning the stored objects in insertion order.
    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}

impl<T: Located> SpatialIndex<T> {
    /// Builds the hierarchy. `max_depth` bounds how many times the space is
    /// split; below it all remaining objects hang from one node.
    pub fn build(objects: Vec<T>, max_depth: usize) -> Result<Self> {
        if max_depth == 0 {
            return Err(Error::IllegalConfiguration(
                "the maximum depth of a spatial index must be at least 1".into(),
            ));
        }
        if let Some(multi) = objects.iter().find(|o| o.roi().is_multi_point()) {
            return Err(Error::UnsupportedObjectShape {
                points: multi.roi().n_points(),
            });
        }
        if objects.is_empty() {
            return Ok(Self::empty());
        }

        let geometry: Vec<(Rect, Point)> = objects
            .iter()
            .map(|o| (o.roi().bounds(), o.centroid()))
            .collect();
        let mut nodes = Vec::with_capacity(objects.len() * 2);
        let root = build_range(&geometry, (0..objects.len()).collect(), max_depth, &mut nodes);

        Ok(Self {
            items: objects,
            nodes,
            root: Some(root),
        })
    }

    /// The stored object whose centroid lies inside `query`, choosing the one
    /// closest to the query's centroid when several do.
    ///
    /// A point (or empty) query matches an object only when the query's
    /// minimum corner is exactly the object's centroid.
    pub fn overlapping(&self, query: &Roi) -> Option<&T> {
        let root = self.root?;
        let exact = query.is_point() || query.is_empty();
        let query_bbox = query.bounds();
        let query_centroid = query.centroid();

        let mut hits: Vec<(OrderedFloat<f64>, usize)> = Vec::new();
        let mut stack = vec![root];
        while let Some(idx) = stack.pop() {
            match &self.nodes[idx] {
                BvhNode::Internal { bbox, children } => {
                    if !exact && !bbox_may_overlap(*bbox, query_bbox) {
                        continue;
                    }
                    stack.extend(children.iter().rev().copied());
                }
                BvhNode::Leaf {
                    item,
                    bbox,
                    centroid,
                } => {
                    let hit = if exact {
                        (query_bbox.0, query_bbox.1) == *centroid
                    } else {
                        bbox_may_overlap(*bbox, query_bbox) && query.contains_point(*centroid)
                    };
                    if !hit {
                        continue;
                    }
                    hits.push((OrderedFloat(distance(query_centroid, *centroid)), *item));
                }
            }
        }
        // first of the closest, in traversal order
        hits.into_iter()
            .min_by_key(|&(d, _)| d)
            .map(|(_, item)| &self.items[item])
    }
}

fn leaf(geometry: &[(Rect, Point)], item: usize, nodes: &mut Vec<BvhNode>) -> usize {
    let (bbox, centroid) = geometry[item];
    nodes.push(BvhNode::Leaf {
        item,
        bbox,
        centroid,
    });
    nodes.len() - 1
}

fn build_range(
    geometry: &[(Rect, Point)],
    indices: Vec<usize>,
    max_depth: usize,
    nodes: &mut Vec<BvhNode>,
) -> usize {
    let bbox = indices
        .iter()
        .map(|&i| geometry[i].0)
        .reduce(bbox_union)
        .unwrap_or_default();

    let node_idx = nodes.len();
    nodes.push(BvhNode::Internal {
        bbox,
        children: SmallVec::new(),
    });

    let children: SmallVec<[usize; 4]> = if max_depth == 1 || bbox_is_degenerate(bbox) {
        indices.into_iter().map(|i| leaf(geometry, i, nodes)).collect()
    } else {
        // Square quadrants of side `length` anchored at the minimum corner.
        // Centroids on the far edge fall in the last row/column.
        let length = (bbox.2 - bbox.0).max(bbox.3 - bbox.1) / 2.0;
        let (mid_x, mid_y) = (bbox.0 + length, bbox.1 + length);
        let mut quadrants: [Vec<usize>; 4] = Default::default();
        for i in indices {
            let (cx, cy) = geometry[i].1;
            let q = usize::from(cx >= mid_x) + 2 * usize::from(cy >= mid_y);
            quadrants[q].push(i);
        }
        quadrants
            .into_iter()
            .filter(|q| !q.is_empty())
            .map(|q| {
                if q.len() == 1 {
                    leaf(geometry, q[0], nodes)
                } else {
                    build_range(geometry, q, max_depth - 1, nodes)
                }
            })
            .collect()
    };

    if let BvhNode::Internal { children: slot, .. } = &mut nodes[node_idx] {
        *slot = children;
    }
    node_idx
}

/// Depth-first iterator over a [`SpatialIndex`].
pub struct Iter<'a, T> {
    index: &'a SpatialIndex<T>,
    stack: Vec<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(idx) = self.stack.pop() {
            match &self.index.nodes[idx] {
                BvhNode::Leaf { item, .. } => return Some(&self.index.items[*item]),
                BvhNode::Internal { children, .. } => {
                    self.stack.extend(children.iter().rev().copied());
                }
            }
        }
        None
    }
}

impl<'a, T> IntoIterator for &'a SpatialIndex<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quadrant_assignment_covers_the_far_edge() {
        // centroids at 0.5 and 9.5 on a 10x10 box: the far one must still land
        // in the last quadrant
        let rois = vec![
            Roi::rectangle(0.0, 0.0, 1.0, 1.0),
            Roi::rectangle(9.0, 9.0, 1.0, 1.0),
            Roi::point(10.0, 10.0),
        ];
        let index = SpatialIndex::build(rois, 3).unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.iter().count(), 3);
        assert_eq!(index.bbox(), Some((0.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn leaves_hold_one_object_each() {
        let rois: Vec<Roi> = (0..5)
            .map(|i| Roi::rectangle(i as f64 * 3.0, 0.0, 1.0, 1.0))
            .collect();
        let index = SpatialIndex::build(rois, 4).unwrap();
        let leaves = index.nodes().iter().filter(|n| n.is_leaf()).count();
        assert_eq!(leaves, 5);
        assert!(!index.nodes()[0].is_leaf());
    }
}
