//! Tests for classifier sequences applied to detection groups.

use braian_core::classify::{
    ClassifierScope, ObjectClassifier, PartialClassifier, SingleClassifier, ThresholdClassifier,
};
use braian_core::hierarchy::{MemoryHierarchy, ObjectHierarchy, ObjectId, PathObject};
use braian_core::{DetectionGroup, Error, Label, Roi};

const CHANNEL: &str = "cFos";
const DISCARDED: &str = "Other: cFos";

struct Scene {
    h: MemoryHierarchy,
    left: ObjectId,
    cells: Vec<ObjectId>,
}

/// One `(0,0,20,20)` container with four cells; the `left` annotation covers
/// the first two.
fn scene() -> Scene {
    let mut h = MemoryHierarchy::new(100.0, 100.0);
    let root = h.root();
    let region = h
        .add_object(root, PathObject::annotation(Roi::rectangle(0.0, 0.0, 20.0, 20.0)))
        .unwrap();
    let left = h
        .add_object(
            root,
            PathObject::annotation(Roi::rectangle(0.0, 0.0, 10.0, 20.0)).with_name("left"),
        )
        .unwrap();
    let container = h
        .add_object(
            region,
            PathObject::annotation(Roi::rectangle(0.0, 0.0, 20.0, 20.0))
                .with_name("cFos cells")
                .with_label(CHANNEL)
                .locked(true),
        )
        .unwrap();
    let cells = [(3.0, 5.0, 10.0), (6.0, 12.0, 60.0), (14.0, 5.0, 80.0), (16.0, 15.0, 30.0)]
        .into_iter()
        .map(|(x, y, intensity)| {
            let cell = PathObject::detection(Roi::rectangle(x - 0.5, y - 0.5, 1.0, 1.0))
                .with_label(CHANNEL)
                .with_measurement("intensity", intensity);
            h.add_object(container, cell).unwrap()
        })
        .collect();
    Scene { h, left, cells }
}

fn threshold(value: f64) -> ThresholdClassifier {
    ThresholdClassifier::new("intensity", value, CHANNEL, DISCARDED)
}

fn labels(h: &MemoryHierarchy, ids: &[ObjectId]) -> Vec<Option<Label>> {
    ids.iter()
        .map(|&id| h.get(id).unwrap().label.clone())
        .collect()
}

#[test]
fn test_threshold_classifier_on_whole_image() {
    let Scene { mut h, cells, .. } = scene();
    let mut group = DetectionGroup::channel(CHANNEL, &mut h).unwrap();
    let classifier = threshold(50.0);

    let events = h.classification_events();
    let report = group
        .apply_classifiers(&mut h, &[PartialClassifier::whole_image(&classifier)])
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.steps_applied, 1);
    assert_eq!(report.detections, 2);
    assert_eq!(group.len(), 2);
    assert_eq!(h.classification_events(), events + 1);
    assert_eq!(
        labels(&h, &cells),
        vec![
            Some(Label::new(DISCARDED)),
            Some(Label::new(CHANNEL)),
            Some(Label::new(CHANNEL)),
            Some(Label::new(DISCARDED)),
        ]
    );
}

#[test]
fn test_steps_before_a_whole_image_step_do_not_matter() {
    let scoped = threshold(0.0);
    let full = threshold(50.0);

    let Scene {
        h: mut first,
        left,
        cells,
    } = scene();
    let mut a = DetectionGroup::channel(CHANNEL, &mut first).unwrap();
    a.apply_classifiers(
        &mut first,
        &[
            PartialClassifier::new(&scoped, ClassifierScope::Annotations(vec![left])),
            PartialClassifier::whole_image(&full),
        ],
    )
    .unwrap();

    let Scene { h: mut second, .. } = scene();
    let mut b = DetectionGroup::channel(CHANNEL, &mut second).unwrap();
    b.apply_classifiers(&mut second, &[PartialClassifier::whole_image(&full)])
        .unwrap();

    assert_eq!(labels(&first, &cells), labels(&second, &cells));
    assert_eq!(a.len(), b.len());
}

#[test]
fn test_later_scoped_step_overrides_earlier_step() {
    let Scene {
        mut h, left, cells, ..
    } = scene();
    let mut group = DetectionGroup::channel(CHANNEL, &mut h).unwrap();
    let strict = threshold(50.0);
    let everything = SingleClassifier::new(CHANNEL);

    let report = group
        .apply_classifiers(
            &mut h,
            &[
                PartialClassifier::whole_image(&strict),
                PartialClassifier::new(&everything, ClassifierScope::Annotations(vec![left])),
            ],
        )
        .unwrap();

    assert_eq!(report.steps_applied, 2);
    // cells[0] was discarded by the first step, then accepted inside `left`
    assert_eq!(h.get(cells[0]).unwrap().label, Some(Label::new(CHANNEL)));
    assert_eq!(h.get(cells[3]).unwrap().label, Some(Label::new(DISCARDED)));
    assert_eq!(group.len(), 3);
    let mut indexed: Vec<ObjectId> = group.iter().map(|d| d.id).collect();
    indexed.sort();
    assert_eq!(indexed, vec![cells[0], cells[1], cells[2]]);
}

#[test]
fn test_scoped_step_indexes_container_children_only() {
    let Scene {
        mut h, left, cells, ..
    } = scene();
    let mut group = DetectionGroup::channel(CHANNEL, &mut h).unwrap();
    let container = group.containers()[0];
    // inside `left`, but not below any container
    let stray = h
        .add_object(
            left,
            PathObject::detection(Roi::rectangle(4.5, 17.5, 1.0, 1.0)).with_label(CHANNEL),
        )
        .unwrap();
    let everything = SingleClassifier::new(CHANNEL);

    let report = group
        .apply_classifiers(
            &mut h,
            &[PartialClassifier::new(
                &everything,
                ClassifierScope::Annotations(vec![left]),
            )],
        )
        .unwrap();

    assert_eq!(report.steps_applied, 1);
    let mut indexed: Vec<ObjectId> = group.iter().map(|d| d.id).collect();
    indexed.sort();
    assert_eq!(indexed, vec![cells[0], cells[1]]);
    assert!(!indexed.contains(&stray));
    assert!(group.iter().all(|d| h.parent(d.id) == Some(container)));
    assert_eq!(h.parent(stray), Some(left));
}

#[test]
fn test_incompatible_classifier_stops_the_sequence() {
    let Scene { mut h, left, .. } = scene();
    let mut group = DetectionGroup::channel(CHANNEL, &mut h).unwrap();
    let strict = threshold(50.0);
    let wrong = ThresholdClassifier::new("intensity", 0.0, "Arc", "Other: Arc");
    let everything = SingleClassifier::new(CHANNEL);

    let report = group
        .apply_classifiers(
            &mut h,
            &[
                PartialClassifier::whole_image(&strict),
                PartialClassifier::new(&wrong, ClassifierScope::Annotations(vec![left])),
                PartialClassifier::new(&everything, ClassifierScope::Annotations(vec![left])),
            ],
        )
        .unwrap();

    assert_eq!(report.steps_applied, 1);
    match report.aborted {
        Some(Error::IncompatibleClassifier {
            classifier,
            expected,
            got,
        }) => {
            assert_eq!(classifier, wrong.name());
            assert_eq!(expected, vec![Label::new(CHANNEL), Label::new(DISCARDED)]);
            assert_eq!(got, vec![Label::new("Arc"), Label::new("Other: Arc")]);
        }
        other => panic!("expected an incompatible classifier, got {other:?}"),
    }
    // the first step is kept
    assert_eq!(group.len(), 2);
}

#[test]
fn test_nothing_applied_keeps_the_index() {
    let Scene { mut h, .. } = scene();
    let mut group = DetectionGroup::channel(CHANNEL, &mut h).unwrap();
    let wrong = SingleClassifier::new("Arc");

    let report = group
        .apply_classifiers(&mut h, &[PartialClassifier::whole_image(&wrong)])
        .unwrap();
    assert_eq!(report.steps_applied, 0);
    assert!(report.aborted.is_some());
    assert_eq!(group.len(), 4);
}

#[test]
fn test_whole_image_step_reconsiders_discarded_detections() {
    let Scene { mut h, .. } = scene();
    let mut group = DetectionGroup::channel(CHANNEL, &mut h).unwrap();
    let strict = threshold(50.0);
    group
        .apply_classifiers(&mut h, &[PartialClassifier::whole_image(&strict)])
        .unwrap();
    assert_eq!(group.len(), 2);

    let everything = SingleClassifier::new(CHANNEL);
    group
        .apply_classifiers(&mut h, &[PartialClassifier::whole_image(&everything)])
        .unwrap();
    assert_eq!(group.len(), 4);
}

#[test]
fn test_classifier_compatibility() {
    let Scene { mut h, .. } = scene();
    let group = DetectionGroup::channel(CHANNEL, &mut h).unwrap();

    assert!(group.check_classifier(&threshold(1.0)).is_ok());
    assert!(group.check_classifier(&SingleClassifier::new(CHANNEL)).is_ok());
    assert!(group.check_classifier(&SingleClassifier::new(DISCARDED)).is_err());

    let missing_discarded = ThresholdClassifier::new("intensity", 1.0, CHANNEL, "Arc");
    assert!(group.check_classifier(&missing_discarded).is_err());
}

#[test]
fn test_classifying_on_another_hierarchy() {
    let Scene { mut h, .. } = scene();
    let mut group = DetectionGroup::channel(CHANNEL, &mut h).unwrap();
    let mut other = MemoryHierarchy::new(10.0, 10.0);
    let classifier = threshold(50.0);
    assert!(matches!(
        group.apply_classifiers(&mut other, &[PartialClassifier::whole_image(&classifier)]),
        Err(Error::HierarchyMismatch)
    ));
    assert_eq!(group.len(), 4);
}
