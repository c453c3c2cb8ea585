//! Tests for detections positive on several channels.

use braian_core::hierarchy::{MemoryHierarchy, ObjectHierarchy, ObjectId, PathObject};
use braian_core::{ContainerKind, DetectionGroup, Error, Label, Roi};

fn add_channel(
    h: &mut MemoryHierarchy,
    region: ObjectId,
    channel: &str,
    cells: &[(f64, f64)],
) -> ObjectId {
    let roi = h.roi(region).unwrap().clone();
    let container = h
        .add_object(
            region,
            PathObject::annotation(roi)
                .with_name(format!("{channel} cells"))
                .with_label(channel)
                .locked(true),
        )
        .unwrap();
    for &(x, y) in cells {
        let cell = PathObject::detection(Roi::rectangle(x - 0.5, y - 0.5, 1.0, 1.0)).with_label(channel);
        h.add_object(container, cell).unwrap();
    }
    container
}

struct Channels {
    h: MemoryHierarchy,
    region: ObjectId,
    cfos: DetectionGroup,
    arc: DetectionGroup,
    neun: DetectionGroup,
}

/// Three channels in one region: the cFos cell at (10,10) is positive on both
/// other channels, the one at (50,50) on Arc only.
fn channels() -> Channels {
    let mut h = MemoryHierarchy::new(100.0, 100.0);
    let root = h.root();
    let region = h
        .add_object(root, PathObject::annotation(Roi::rectangle(0.0, 0.0, 100.0, 100.0)))
        .unwrap();
    add_channel(&mut h, region, "cFos", &[(10.0, 10.0), (30.0, 30.0), (50.0, 50.0), (70.0, 70.0)]);
    add_channel(&mut h, region, "Arc", &[(10.3, 10.2), (50.0, 50.4)]);
    add_channel(&mut h, region, "NeuN", &[(10.0, 10.4), (90.0, 90.0)]);
    let cfos = DetectionGroup::channel("cFos", &mut h).unwrap();
    let arc = DetectionGroup::channel("Arc", &mut h).unwrap();
    let neun = DetectionGroup::channel("NeuN", &mut h).unwrap();
    Channels {
        h,
        region,
        cfos,
        arc,
        neun,
    }
}

fn overlap_labels_by_position(h: &MemoryHierarchy, group: &DetectionGroup) -> Vec<(String, String)> {
    let mut found: Vec<(String, String)> = group
        .iter()
        .map(|d| {
            let label = h.get(d.id).unwrap().label.clone().unwrap();
            (format!("{:?}", d.roi.centroid()), label.to_string())
        })
        .collect();
    found.sort();
    found
}

#[test]
fn test_overlaps_are_labeled_by_positive_channels() {
    let Channels {
        mut h,
        region,
        cfos,
        arc,
        neun,
    } = channels();

    let overlaps = DetectionGroup::compute_overlaps(&mut h, &cfos, &[&arc, &neun]).unwrap();

    assert_eq!(overlaps.kind(), ContainerKind::Overlaps);
    assert_eq!(overlaps.container_name(), "cFos overlaps");
    assert_eq!(overlaps.containers().len(), 1);
    let container = overlaps.containers()[0];
    assert_eq!(h.parent(container), Some(region));
    assert!(h.get(container).unwrap().locked);
    assert_eq!(
        h.get(container).unwrap().label,
        Some(Label::new("cFos"))
    );

    assert_eq!(
        overlap_labels_by_position(&h, &overlaps),
        vec![
            ("(10.0, 10.0)".to_string(), "cFos~Arc~NeuN".to_string()),
            ("(50.0, 50.0)".to_string(), "cFos~Arc".to_string()),
        ]
    );
    // the channel detections are left untouched
    assert_eq!(cfos.len(), 4);
    assert_eq!(DetectionGroup::channel("cFos", &mut h).unwrap().len(), 4);
}

#[test]
fn test_recomputing_overlaps_reuses_the_container() {
    let Channels {
        mut h,
        cfos,
        arc,
        neun,
        ..
    } = channels();

    let first = DetectionGroup::compute_overlaps(&mut h, &cfos, &[&arc, &neun]).unwrap();
    let objects = h.len();
    let second = DetectionGroup::compute_overlaps(&mut h, &cfos, &[&arc, &neun]).unwrap();

    assert_eq!(first.containers(), second.containers());
    assert_eq!(second.len(), 2);
    assert_eq!(h.len(), objects);
}

#[test]
fn test_single_other_channel() {
    let Channels {
        mut h, cfos, neun, ..
    } = channels();
    let overlaps = DetectionGroup::compute_overlaps(&mut h, &cfos, &[&neun]).unwrap();
    assert_eq!(overlaps.labels(), &[Label::new("cFos~NeuN")]);
    assert_eq!(
        overlap_labels_by_position(&h, &overlaps),
        vec![("(10.0, 10.0)".to_string(), "cFos~NeuN".to_string())]
    );
}

#[test]
fn test_loaded_overlaps_equal_computed_ones() {
    let Channels {
        mut h,
        cfos,
        arc,
        neun,
        ..
    } = channels();
    let computed = DetectionGroup::compute_overlaps(&mut h, &cfos, &[&arc, &neun]).unwrap();
    let loaded = DetectionGroup::load_overlaps(&mut h, "cFos", &["Arc", "NeuN"]).unwrap();

    assert!(loaded == computed);
    assert_eq!(loaded.len(), computed.len());
    assert_eq!(
        loaded.labels(),
        &[
            Label::new("cFos~Arc"),
            Label::new("cFos~NeuN"),
            Label::new("cFos~Arc~NeuN"),
        ]
    );
}

#[test]
fn test_loading_missing_overlaps() {
    let Channels { mut h, .. } = channels();
    assert!(matches!(
        DetectionGroup::load_overlaps(&mut h, "cFos", &["Arc"]),
        Err(Error::NoContainersFound { .. })
    ));
}

#[test]
fn test_overlaps_need_another_channel() {
    let Channels { mut h, cfos, .. } = channels();
    assert!(matches!(
        DetectionGroup::compute_overlaps(&mut h, &cfos, &[]),
        Err(Error::IllegalConfiguration(_))
    ));
    assert!(matches!(
        DetectionGroup::load_overlaps::<&str>(&mut h, "cFos", &[]),
        Err(Error::IllegalConfiguration(_))
    ));
}

#[test]
fn test_one_overlap_container_per_region() {
    let mut h = MemoryHierarchy::new(100.0, 100.0);
    let root = h.root();
    let left = h
        .add_object(root, PathObject::annotation(Roi::rectangle(0.0, 0.0, 50.0, 100.0)))
        .unwrap();
    let right = h
        .add_object(root, PathObject::annotation(Roi::rectangle(50.0, 0.0, 50.0, 100.0)))
        .unwrap();
    add_channel(&mut h, left, "cFos", &[(10.0, 10.0)]);
    add_channel(&mut h, right, "cFos", &[(60.0, 60.0), (80.0, 80.0)]);
    add_channel(&mut h, left, "Arc", &[(10.0, 10.0)]);
    add_channel(&mut h, right, "Arc", &[(60.0, 60.0), (80.0, 80.0)]);
    let cfos = DetectionGroup::channel("cFos", &mut h).unwrap();
    let arc = DetectionGroup::channel("Arc", &mut h).unwrap();

    let overlaps = DetectionGroup::compute_overlaps(&mut h, &cfos, &[&arc]).unwrap();

    assert_eq!(overlaps.containers().len(), 2);
    let parents: Vec<Option<ObjectId>> =
        overlaps.containers().iter().map(|&c| h.parent(c)).collect();
    assert_eq!(parents, vec![Some(left), Some(right)]);
    assert_eq!(h.child_detections(overlaps.containers()[0]).len(), 1);
    assert_eq!(h.child_detections(overlaps.containers()[1]).len(), 2);
}
