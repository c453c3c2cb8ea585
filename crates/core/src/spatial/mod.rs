//! Spatial indexing of detections.
//!
//! A bounding volume hierarchy answering "which stored object's centroid lies
//! inside this region, and which of them is closest to the region's centroid".
//!
//! - `tree` - arena of BVH nodes, construction and queries
//! - `Located` - anything with a ROI can be indexed

mod tree;

pub use tree::{BvhNode, Iter, SpatialIndex};

use crate::geometry::Roi;
use crate::utils::Point;

/// Depth used when the caller does not choose one.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// An object with a region of interest.
pub trait Located {
    fn roi(&self) -> &Roi;

    fn centroid(&self) -> Point {
        self.roi().centroid()
    }
}

impl Located for Roi {
    fn roi(&self) -> &Roi {
        self
    }
}

impl<T: Located> Located for &T {
    fn roi(&self) -> &Roi {
        (**self).roi()
    }
}
