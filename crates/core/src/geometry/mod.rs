//! Geometry of hierarchy objects.
//!
//! `Roi` wraps the `geo` crate for area shapes (intersection, difference,
//! containment) and adds the point and rectangle cases cell detection needs.

mod roi;

pub use roi::Roi;
