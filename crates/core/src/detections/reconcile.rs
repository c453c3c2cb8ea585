use rustc_hash::FxHashSet;
use tracing::debug;

use super::DetectionGroup;
use crate::error::{Error, Result};
use crate::hierarchy::{ObjectHierarchy, ObjectId};

impl DetectionGroup {
    /// Brings the group up to date with the hierarchy.
    ///
    /// Containers that appeared since the last refresh are reconciled with the
    /// known ones they overlap: the known container takes over the new
    /// detections falling inside it, stale detections in the shared area are
    /// deleted and the new container shrinks to the part outside the known
    /// one. Containers left empty or without children are then removed and
    /// the index is rebuilt.
    ///
    /// On error the tracked containers and the index are left as they were.
    pub fn refresh(&mut self, hierarchy: &mut dyn ObjectHierarchy) -> Result<()> {
        self.check_hierarchy(hierarchy)?;
        let mut all = self.search_containers(hierarchy);
        let tracked: FxHashSet<ObjectId> = self.containers.iter().copied().collect();
        let (known, new): (Vec<ObjectId>, Vec<ObjectId>) =
            all.iter().copied().partition(|c| tracked.contains(c));

        for &old in &known {
            for &fresh in &new {
                if hierarchy.roi(old)?.intersects(hierarchy.roi(fresh)?) {
                    self.reconcile_pair(hierarchy, old, fresh)?;
                }
            }
        }

        let dropped: Vec<ObjectId> = all
            .iter()
            .copied()
            .filter(|&c| {
                hierarchy.children(c).is_empty()
                    || hierarchy.get(c).is_none_or(|o| o.roi.is_empty())
            })
            .collect();
        if !dropped.is_empty() {
            debug!(
                container = %self.container_name(),
                removed = dropped.len(),
                "removing empty containers"
            );
            hierarchy.remove_objects(&dropped, false);
            all.retain(|c| !dropped.contains(c));
        }
        hierarchy.fire_hierarchy_changed();

        let detections = self.container_detections(hierarchy, &all, false)?;
        let index = self.build_index(hierarchy, &detections)?;
        debug!(
            container = %self.container_name(),
            containers = all.len(),
            detections = index.len(),
            depth = index.depth(),
            "rebuilt detection index"
        );
        self.containers = all;
        self.index = index;
        Ok(())
    }

    /// Resolves the overlap between a known container `old` and a newly
    /// found container `new`.
    ///
    /// Detections of this group in `old ∩ new` that are not children of `new`
    /// are deleted. Children of `new` whose centroid lies inside `old` move
    /// below `old`, and `new` is reshaped to `new − old`.
    pub fn reconcile_pair(
        &self,
        hierarchy: &mut dyn ObjectHierarchy,
        old: ObjectId,
        new: ObjectId,
    ) -> Result<()> {
        self.check_hierarchy(hierarchy)?;
        let old_roi = hierarchy.roi(old)?.clone();
        let new_roi = hierarchy.roi(new)?.clone();
        let shared = old_roi.intersection(&new_roi);

        let new_children = hierarchy.child_detections(new);
        let keep: FxHashSet<ObjectId> = new_children.iter().copied().collect();
        let stale: Vec<ObjectId> = hierarchy
            .detections_inside(&shared)
            .into_iter()
            .filter(|d| !keep.contains(d))
            .filter(|&d| {
                hierarchy
                    .get(d)
                    .is_some_and(|o| self.is_group_detection(o, true))
            })
            .collect();
        hierarchy.remove_objects(&stale, false);

        let mut moved = 0;
        for child in new_children {
            if old_roi.contains_point(hierarchy.roi(child)?.centroid()) {
                hierarchy.move_object(old, child)?;
                moved += 1;
            }
        }
        hierarchy.set_roi(new, new_roi.difference(&old_roi))?;
        debug!(
            %old,
            %new,
            stale = stale.len(),
            moved,
            "reconciled overlapping containers"
        );
        Ok(())
    }

    /// Merges `other` into this group. Both groups track the same containers
    /// afterwards.
    ///
    /// Containers of `other` unknown to this group are cleared of detections
    /// `other` does not index. Every detection indexed by `other` then moves
    /// below the container of this group holding its centroid, and containers
    /// of `other` left without children are removed.
    ///
    /// # Errors
    ///
    /// [`Error::IncompatibleDetections`] unless the two groups are compatible.
    pub fn merge(
        &mut self,
        other: &mut DetectionGroup,
        hierarchy: &mut dyn ObjectHierarchy,
    ) -> Result<()> {
        if !self.is_compatible_with(other) {
            return Err(Error::IncompatibleDetections {
                left: self.to_string(),
                right: other.to_string(),
            });
        }
        self.check_hierarchy(hierarchy)?;
        if self == other {
            return Ok(());
        }

        let indexed: FxHashSet<ObjectId> = other.iter().map(|d| d.id).collect();
        let tracked: FxHashSet<ObjectId> = self.containers.iter().copied().collect();
        for &container in other.containers.iter().filter(|c| !tracked.contains(*c)) {
            let roi = hierarchy.roi(container)?.clone();
            let stale: Vec<ObjectId> = hierarchy
                .detections_inside(&roi)
                .into_iter()
                .filter(|d| !indexed.contains(d))
                .filter(|&d| {
                    hierarchy
                        .get(d)
                        .is_some_and(|o| self.is_group_detection(o, false))
                })
                .collect();
            hierarchy.remove_objects(&stale, false);
        }

        for &container in &self.containers {
            let roi = hierarchy.roi(container)?.clone();
            for detection in other.iter() {
                if hierarchy.get(detection.id).is_some()
                    && roi.contains_point(detection.roi.centroid())
                {
                    hierarchy.move_object(container, detection.id)?;
                }
            }
        }

        let emptied: Vec<ObjectId> = other
            .containers
            .iter()
            .copied()
            .filter(|&c| hierarchy.children(c).is_empty())
            .collect();
        hierarchy.remove_objects(&emptied, false);
        debug!(
            container = %self.container_name(),
            removed = emptied.len(),
            "merged detection groups"
        );

        self.refresh(hierarchy)?;
        other.refresh(hierarchy)?;
        if *self != *other {
            self.refresh(hierarchy)?;
        }
        Ok(())
    }
}
