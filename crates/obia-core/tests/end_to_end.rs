//! Full run on a synthetic scene: four quadrant segments, two training
//! classes, classification painted back to pixels.

use obia_core::classification::{assess_accuracy, paint, NearestCentroid};
use obia_core::{
    ClassificationDriver, Image, ObiaError, ObjectPipeline, PipelineParams, Polygon,
    PrecomputedSegments, RasterGeometry, SegmentMap, Stage, TrainingClass,
};

const N: usize = 10;
const BANDS: usize = 3;

/// Quadrant brightness: top-left dark, top-right dim, bottom-left light,
/// bottom-right bright. Each quadrant is flat.
fn scene() -> Image {
    let base = [[0.1f32, 0.3], [0.6, 0.9]];
    let mut img = Image::filled(N, N, BANDS, 0.0);
    for r in 0..N {
        for c in 0..N {
            for b in 0..BANDS {
                let v = base[r / 5][c / 5] * (b + 1) as f32 / BANDS as f32;
                img.set(r, c, b, v);
            }
        }
    }
    img
}

fn quadrants() -> SegmentMap {
    let data = (0..N * N)
        .map(|i| {
            let (r, c) = (i / N, i % N);
            1 + (r / 5 * 2 + c / 5) as u32
        })
        .collect();
    SegmentMap::new(data, N, N).unwrap()
}

fn classes() -> Vec<TrainingClass> {
    vec![
        TrainingClass::new("water", vec![Polygon::rect(1.0, 1.0, 4.0, 4.0)]),
        TrainingClass::new("urban", vec![Polygon::rect(6.0, 6.0, 9.0, 9.0)]),
    ]
}

#[test]
fn quadrant_scene_is_ready_for_classification() {
    let geom = RasterGeometry::pixel_grid(N, N);
    let out = ObjectPipeline::new(PipelineParams::default())
        .run(scene(), &geom, &classes(), &PrecomputedSegments::new(quadrants()))
        .unwrap();

    assert_eq!(out.stage, Stage::ReadyForClassification);
    assert_eq!(out.table.len(), 4);
    assert_eq!(out.table.n_bands(), BANDS);
    assert_eq!(out.table.n_labeled(), 2);
    assert_eq!(out.table.get(1).and_then(|o| o.label), Some(1));
    assert_eq!(out.table.get(4).and_then(|o| o.label), Some(2));
    assert!(out.assignment.empty_classes.is_empty());
    assert_eq!(out.ground_truth.overlap_count(), 0);
    assert_eq!(out.ground_truth.class_pixel_counts(2), vec![9, 9]);
}

#[test]
fn quadrant_scene_classifies_by_brightness() {
    let geom = RasterGeometry::pixel_grid(N, N);
    let segments = quadrants();
    let out = ObjectPipeline::default()
        .run(scene(), &geom, &classes(), &PrecomputedSegments::new(segments.clone()))
        .unwrap();

    let mut model = NearestCentroid::default();
    let predictions = ClassificationDriver::run(&out.table, &mut model).unwrap();
    let codes: Vec<(u32, u32)> = predictions.iter().map(|p| (p.segment_id, p.class_code)).collect();
    assert_eq!(codes, vec![(1, 1), (2, 1), (3, 2), (4, 2)]);

    let classified = paint(&segments, &predictions);
    assert_eq!(classified.get(0, 9), 1);
    assert_eq!(classified.get(9, 0), 2);

    let report = assess_accuracy(&out.ground_truth, &classified).unwrap();
    assert_eq!(report.evaluated_pixels, 18);
    assert_eq!(report.correct_pixels, 18);
}

#[test]
fn polygon_straddling_two_segments_of_different_classes_aborts() {
    let geom = RasterGeometry::pixel_grid(N, N);
    let classes = vec![
        TrainingClass::new("water", vec![Polygon::rect(1.0, 1.0, 4.0, 4.0)]),
        // Reaches from quadrant 2 back into quadrant 1.
        TrainingClass::new("urban", vec![Polygon::rect(3.0, 0.0, 9.0, 2.0)]),
    ];
    let err = ObjectPipeline::default()
        .run(scene(), &geom, &classes, &PrecomputedSegments::new(quadrants()))
        .unwrap_err();
    let ObiaError::AmbiguousSegmentation(report) = err else {
        panic!("expected a conflict, got {err:?}");
    };
    assert!(report.segments.contains(&1));
    assert_eq!(report.class_pairs.len(), 1);
    assert_eq!(report.class_pairs[0].first_name, "water");
    assert_eq!(report.class_pairs[0].second_name, "urban");
}
