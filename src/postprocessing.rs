// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Post-processing of raw pose model output.
//!
//! Decodes the YOLO pose head into [`PoseCandidate`]s in original frame
//! coordinates and picks the single person to follow with [`select_pose`].

#![allow(clippy::cast_precision_loss)]

use ndarray::{Array2, s};

use crate::pose::Thresholds;
use crate::preprocessing::{PreprocessResult, clip_coords, scale_coords, scale_point};
use crate::utils::calculate_iou;
use crate::warn;

/// Keypoints per person in the COCO layout.
pub const NUM_KEYPOINTS: usize = 17;

/// Values per keypoint: x, y, confidence.
const KPT_DIM: usize = 3;

/// Box (4) + person score (1) + keypoints.
const POSE_FEATURES: usize = 4 + 1 + NUM_KEYPOINTS * KPT_DIM;

/// One person hypothesis in original frame pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseCandidate {
    /// Bounding box `[x1, y1, x2, y2]`.
    pub bbox: [f32; 4],
    /// Person confidence.
    pub score: f32,
    /// Keypoints as `[x, y, confidence]`.
    pub keypoints: Vec<[f32; 3]>,
}

/// Work out `(num_preds, is_transposed)` from the output shape.
///
/// Accepts `[1, features, preds]`, `[1, preds, features]` and their 2-D forms.
fn parse_pose_shape(shape: &[usize]) -> (usize, bool) {
    let (a, b) = match shape {
        [_, a, b] | [a, b] => (*a, *b),
        _ => return (0, false),
    };
    if a == POSE_FEATURES || (a < b && a >= POSE_FEATURES) {
        (b, false)
    } else {
        (a, true)
    }
}

/// Decode all candidates whose score reaches `min_score`.
///
/// # Arguments
///
/// * `output` - Flat output tensor data.
/// * `output_shape` - Shape of the output tensor.
/// * `preprocess` - Letterbox transform used for this frame.
/// * `min_score` - Minimum person confidence to keep.
#[must_use]
pub fn decode_pose(
    output: &[f32],
    output_shape: &[usize],
    preprocess: &PreprocessResult,
    min_score: f32,
) -> Vec<PoseCandidate> {
    let (num_preds, is_transposed) = parse_pose_shape(output_shape);
    if output.is_empty() || num_preds == 0 {
        return Vec::new();
    }

    let features = output.len() / num_preds;
    if features < POSE_FEATURES {
        warn!("Pose model has insufficient features ({features}), expected at least {POSE_FEATURES}");
        return Vec::new();
    }

    let data = output[..features * num_preds].to_vec();
    let Ok(out) = (if is_transposed {
        Array2::from_shape_vec((num_preds, features), data)
    } else {
        Array2::from_shape_vec((features, num_preds), data).map(|a| a.t().to_owned())
    }) else {
        return Vec::new();
    };

    // Person score(s) sit between the box and the keypoints.
    let num_classes = features - 4 - NUM_KEYPOINTS * KPT_DIM;
    let kpt_start = 4 + num_classes;
    let (oh, ow) = preprocess.orig_shape;

    let mut candidates = Vec::new();
    for i in 0..num_preds {
        let score = out
            .slice(s![i, 4..kpt_start])
            .iter()
            .copied()
            .map(|v| if v.is_nan() { 0.0 } else { v })
            .fold(0.0_f32, f32::max);
        if score < min_score {
            continue;
        }

        let (cx, cy, w, h) = (out[[i, 0]], out[[i, 1]], out[[i, 2]], out[[i, 3]]);
        let xyxy = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];
        let bbox = clip_coords(
            &scale_coords(&xyxy, preprocess.scale, preprocess.padding),
            preprocess.orig_shape,
        );

        let keypoints = (0..NUM_KEYPOINTS)
            .map(|k| {
                let off = kpt_start + k * KPT_DIM;
                let raw = [out[[i, off]], out[[i, off + 1]], out[[i, off + 2]]];
                // Non-finite keypoints are reported as unseen at the origin.
                if raw.iter().any(|v| !v.is_finite()) {
                    return [0.0; 3];
                }
                let (x, y) = scale_point((raw[0], raw[1]), preprocess.scale, preprocess.padding);
                [
                    x.clamp(0.0, ow as f32),
                    y.clamp(0.0, oh as f32),
                    raw[2].clamp(0.0, 1.0),
                ]
            })
            .collect();

        candidates.push(PoseCandidate {
            bbox,
            score,
            keypoints,
        });
    }
    candidates
}

/// Pick the person to report for this frame.
///
/// With a previous box, the candidate at or above the tracking threshold that
/// overlaps it most is kept. Otherwise, or when nothing overlaps, the best
/// candidate at or above the detection threshold is chosen.
#[must_use]
pub fn select_pose(
    candidates: Vec<PoseCandidate>,
    previous: Option<&[f32; 4]>,
    thresholds: &Thresholds,
) -> Option<PoseCandidate> {
    let by_score = |a: &&PoseCandidate, b: &&PoseCandidate| a.score.total_cmp(&b.score);

    let tracked = previous.and_then(|prev| {
        candidates
            .iter()
            .filter(|c| c.score >= thresholds.tracking)
            .map(|c| (calculate_iou(prev, &c.bbox), c))
            .filter(|(iou, _)| *iou > 0.0)
            .max_by(|(a, ca), (b, cb)| a.total_cmp(b).then_with(|| ca.score.total_cmp(&cb.score)))
            .map(|(_, c)| c)
    });

    tracked
        .or_else(|| {
            candidates
                .iter()
                .filter(|c| c.score >= thresholds.detection)
                .max_by(by_score)
        })
        .cloned()
}
