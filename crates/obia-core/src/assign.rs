//! Segment ↔ ground-truth intersection and label-conflict detection.
//!
//! Object-based classification assumes one label per segment. A segment
//! touching ground truth of two classes has no trustworthy label, and the
//! run is aborted with [`ObiaError::AmbiguousSegmentation`] rather than
//! resolved by vote. The caller re-segments (finer or differently tuned) or
//! cleans the ground truth, then reruns from scratch.
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ObiaError, Result};
use crate::overlay::{class_code, class_name, GroundTruthRaster, TrainingClass};
use crate::segments::SegmentMap;

/// Class code → ids of segments holding at least one pixel of that class.
pub type SegmentClassSet = BTreeMap<u32, BTreeSet<u32>>;

/// Two classes that share at least one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassPair {
    pub first_code: u32,
    pub first_name: String,
    pub second_code: u32,
    pub second_name: String,
    pub shared_segments: usize,
}

/// Everything an operator needs to re-tune segmentation after an abort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConflictReport {
    /// Every segment id with an ambiguous label.
    pub segments: BTreeSet<u32>,
    /// Class pairs sharing segments, ascending by code.
    pub class_pairs: Vec<ClassPair>,
    /// Segments containing pixels burned by more than one class.
    pub overlap_segments: BTreeSet<u32>,
}

/// Conflict-free result of the assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// One entry per class code `1..=n`, possibly empty.
    pub class_sets: SegmentClassSet,
    /// Codes whose ground truth touches no segment.
    pub empty_classes: Vec<u32>,
}

impl Assignment {
    /// Class label of `segment_id`, if it is covered by a class.
    pub fn label_of(&self, segment_id: u32) -> Option<u32> {
        self.class_sets
            .iter()
            .find(|(_, ids)| ids.contains(&segment_id))
            .map(|(&code, _)| code)
    }

    pub fn labeled_segments(&self) -> usize {
        self.class_sets.values().map(BTreeSet::len).sum()
    }
}

/// Segments appearing in more than one class set.
///
/// Classes are visited in ascending code order while accumulating the union
/// of all sets seen so far and the union of each set's intersection with
/// that running union.
pub fn find_conflicts(class_sets: &SegmentClassSet) -> BTreeSet<u32> {
    let mut accum: BTreeSet<u32> = BTreeSet::new();
    let mut intersection: BTreeSet<u32> = BTreeSet::new();
    for class_segments in class_sets.values() {
        intersection.extend(accum.intersection(class_segments).copied());
        accum.extend(class_segments.iter().copied());
    }
    intersection
}

/// Intersect `segments` with `ground_truth` for every class in `classes`.
///
/// Only single-coverage pixels count towards a class. A segment holding an
/// overlap pixel is a conflict in its own right.
pub fn assign_segments(
    segments: &SegmentMap,
    ground_truth: &GroundTruthRaster,
    classes: &[TrainingClass],
) -> Result<Assignment> {
    segments.ensure_shape(ground_truth.shape())?;

    let n_classes = classes.len();
    let mut class_sets: SegmentClassSet =
        (0..n_classes).map(|i| (class_code(i), BTreeSet::new())).collect();
    let mut overlap_segments = BTreeSet::new();
    // Segment id → codes meeting on its overlap pixels.
    let mut overlap_codes: SegmentClassSet = BTreeMap::new();
    let mut stray_pixels = 0usize;

    for (idx, &segment_id) in segments.data.iter().enumerate() {
        if let Some(code) = ground_truth.single_class_at(idx) {
            match class_sets.get_mut(&code) {
                Some(set) => {
                    set.insert(segment_id);
                }
                None => stray_pixels += 1,
            }
        } else if ground_truth.is_overlap(idx) {
            overlap_segments.insert(segment_id);
            if let Some(codes) = ground_truth.classes_at(idx) {
                overlap_codes.entry(segment_id).or_default().extend(codes.iter().copied());
            }
        }
    }
    if stray_pixels > 0 {
        warn!(stray_pixels, n_classes, "ground-truth pixels carry codes outside the class list; ignored");
    }

    let mut conflicts = find_conflicts(&class_sets);
    conflicts.extend(overlap_segments.iter().copied());

    if !conflicts.is_empty() {
        let report = ConflictReport {
            class_pairs: conflicting_pairs(&class_sets, &overlap_codes, classes),
            segments: conflicts,
            overlap_segments,
        };
        return Err(ObiaError::AmbiguousSegmentation(report));
    }

    let empty_classes: Vec<u32> = class_sets
        .iter()
        .filter(|(_, ids)| ids.is_empty())
        .map(|(&code, _)| code)
        .collect();
    for &code in &empty_classes {
        warn!(
            class = class_name(classes, code).unwrap_or("?"),
            code, "training class intersects no segment; it contributes no training samples"
        );
    }
    for (code, ids) in &class_sets {
        debug!(code, segments = ids.len(), "class segment set");
    }

    Ok(Assignment {
        class_sets,
        empty_classes,
    })
}

/// Class pairs sharing segments. A class touches a segment through its
/// single-coverage pixels or through an overlap pixel it helped burn.
fn conflicting_pairs(
    class_sets: &SegmentClassSet,
    overlap_codes: &SegmentClassSet,
    classes: &[TrainingClass],
) -> Vec<ClassPair> {
    let mut touched = class_sets.clone();
    for (&segment_id, codes) in overlap_codes {
        for code in codes {
            if let Some(set) = touched.get_mut(code) {
                set.insert(segment_id);
            }
        }
    }
    let entries: Vec<(&u32, &BTreeSet<u32>)> = touched.iter().collect();
    let mut pairs = Vec::new();
    for i in 0..entries.len() {
        let (&a, set_a) = entries[i];
        for &(&b, set_b) in &entries[i + 1..] {
            let shared = set_a.intersection(set_b).count();
            if shared > 0 {
                pairs.push(ClassPair {
                    first_code: a,
                    first_name: class_name(classes, a).unwrap_or_default().to_string(),
                    second_code: b,
                    second_name: class_name(classes, b).unwrap_or_default().to_string(),
                    shared_segments: shared,
                });
            }
        }
    }
    pairs
}
