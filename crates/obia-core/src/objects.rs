//! Object table: one feature vector per segment plus the labeled subset
//! used for training.
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::info;

use crate::assign::Assignment;
use crate::error::{ObiaError, Result};
use crate::features::{extract_all, FeatureVector};
use crate::image::Image;
use crate::segments::SegmentMap;

/// One segment of the image, described as a classification object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentObject {
    pub segment_id: u32,
    pub n_pixels: usize,
    pub features: FeatureVector,
    /// Training class code when the segment is covered by exactly one class.
    pub label: Option<u32>,
}

/// Immutable table of all segment objects, ordered by ascending segment id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectTable {
    objects: Vec<SegmentObject>,
    /// Indices into `objects`, ordered by (class code, segment id).
    training_order: Vec<usize>,
    n_bands: usize,
}

impl ObjectTable {
    pub fn objects(&self) -> &[SegmentObject] {
        &self.objects
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn n_bands(&self) -> usize {
        self.n_bands
    }

    pub fn n_labeled(&self) -> usize {
        self.training_order.len()
    }

    /// Object carrying `segment_id`, if present.
    pub fn get(&self, segment_id: u32) -> Option<&SegmentObject> {
        self.objects
            .binary_search_by_key(&segment_id, |o| o.segment_id)
            .ok()
            .map(|i| &self.objects[i])
    }

    /// Labeled objects in training order: ascending class code, then
    /// ascending segment id within a class.
    pub fn training_objects(&self) -> impl Iterator<Item = &SegmentObject> + '_ {
        self.training_order.iter().map(|&i| &self.objects[i])
    }

    pub fn training_features(&self) -> Vec<&[f64]> {
        self.training_objects().map(|o| o.features.as_slice()).collect()
    }

    pub fn training_labels(&self) -> Vec<u32> {
        self.training_objects().filter_map(|o| o.label).collect()
    }

    /// Objects without a training label (prediction only).
    pub fn unlabeled(&self) -> impl Iterator<Item = &SegmentObject> + '_ {
        self.objects.iter().filter(|o| o.label.is_none())
    }

    /// Training sample count per class code.
    pub fn class_counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for label in self.training_objects().filter_map(|o| o.label) {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }
}

/// Build the object table from a conflict-free assignment.
pub fn build_object_table(
    image: &Image,
    segments: &SegmentMap,
    assignment: &Assignment,
) -> Result<ObjectTable> {
    if image.n_pixels() == 0 || image.bands == 0 {
        return Err(ObiaError::EmptyImage);
    }
    segments.ensure_shape(image.shape())?;

    let features = extract_all(image, segments)?;

    let mut pixel_counts: BTreeMap<u32, usize> = BTreeMap::new();
    for &id in &segments.data {
        *pixel_counts.entry(id).or_insert(0) += 1;
    }

    let mut labels: HashMap<u32, u32> = HashMap::new();
    for (&code, ids) in &assignment.class_sets {
        for &id in ids {
            labels.insert(id, code);
        }
    }

    let objects: Vec<SegmentObject> = features
        .into_iter()
        .map(|(segment_id, features)| SegmentObject {
            segment_id,
            n_pixels: pixel_counts.get(&segment_id).copied().unwrap_or(0),
            features,
            label: labels.get(&segment_id).copied(),
        })
        .collect();

    let index_of: HashMap<u32, usize> = objects
        .iter()
        .enumerate()
        .map(|(i, o)| (o.segment_id, i))
        .collect();
    let training_order: Vec<usize> = assignment
        .class_sets
        .values()
        .flat_map(|ids| ids.iter().filter_map(|id| index_of.get(id).copied()))
        .collect();

    info!(
        objects = objects.len(),
        labeled = training_order.len(),
        bands = image.bands,
        "object table built"
    );

    Ok(ObjectTable {
        objects,
        training_order,
        n_bands: image.bands,
    })
}
