// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The pose model seam.
//!
//! The extractor only talks to a [`PoseModel`]. The ONNX adapter in
//! [`crate::model`] is the production implementation; tests substitute
//! scripted models.

use image::DynamicImage;

use crate::error::Result;
use crate::landmarks::JointObservation;

/// Limb pairs of the 17-keypoint COCO layout.
pub const COCO_CONNECTIONS: [[u32; 2]; 19] = [
    [15, 13],
    [13, 11],
    [16, 14],
    [14, 12],
    [11, 12],
    [5, 11],
    [6, 12],
    [5, 6],
    [5, 7],
    [6, 8],
    [7, 9],
    [8, 10],
    [1, 2],
    [0, 1],
    [0, 2],
    [1, 3],
    [2, 4],
    [3, 5],
    [4, 6],
];

/// Confidence thresholds applied on every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Minimum confidence for a new detection.
    pub detection: f32,
    /// Minimum confidence to keep following the tracked person.
    pub tracking: f32,
}

/// A single-person pose landmarker.
///
/// Implementations may keep tracking state between calls; frames are always
/// supplied in order, once each, from a single thread.
pub trait PoseModel {
    /// Detect the landmarks of the most prominent person in a frame.
    ///
    /// Returns `Ok(None)` when nobody is found.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails to run on the frame.
    fn detect(
        &mut self,
        frame: &DynamicImage,
        thresholds: &Thresholds,
    ) -> Result<Option<Vec<JointObservation>>>;

    /// Landmark id pairs drawn as limbs on annotated output.
    fn connections(&self) -> &[[u32; 2]] {
        &[]
    }

    /// Forget any tracking state before a new sequence.
    fn reset(&mut self) {}
}

impl<M: PoseModel + ?Sized> PoseModel for &mut M {
    fn detect(
        &mut self,
        frame: &DynamicImage,
        thresholds: &Thresholds,
    ) -> Result<Option<Vec<JointObservation>>> {
        (**self).detect(frame, thresholds)
    }

    fn connections(&self) -> &[[u32; 2]] {
        (**self).connections()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

impl<M: PoseModel + ?Sized> PoseModel for Box<M> {
    fn detect(
        &mut self,
        frame: &DynamicImage,
        thresholds: &Thresholds,
    ) -> Result<Option<Vec<JointObservation>>> {
        (**self).detect(frame, thresholds)
    }

    fn connections(&self) -> &[[u32; 2]] {
        (**self).connections()
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}
