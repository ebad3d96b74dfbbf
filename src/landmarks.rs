// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Per-frame landmark records.
//!
//! These types are the data contract between the pose model, the extractor,
//! the interchange file and the animation encoder.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Frame rate assumed when a source does not report one.
pub const DEFAULT_FPS: f64 = 30.0;

/// One detected landmark for one joint in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointObservation {
    /// Index into the pose model's fixed landmark ordering.
    pub id: u32,
    /// Horizontal position, normalized to the frame width.
    pub x: f64,
    /// Vertical position, normalized to the frame height.
    pub y: f64,
    /// Relative depth estimate, unit-less and centered near 0.
    pub z: f64,
    /// Confidence in [0, 1] that the joint is visible.
    pub visibility: f64,
}

impl JointObservation {
    /// Create a new observation.
    #[must_use]
    pub const fn new(id: u32, x: f64, y: f64, z: f64, visibility: f64) -> Self {
        Self {
            id,
            x,
            y,
            z,
            visibility,
        }
    }
}

/// The observations of a single frame.
///
/// Empty when the pose model found nobody in the frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FrameLandmarks(Vec<JointObservation>);

impl FrameLandmarks {
    /// A frame without any detection.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a frame from a set of observations.
    ///
    /// # Errors
    ///
    /// Returns an error if two observations share the same landmark id.
    pub fn new(observations: Vec<JointObservation>) -> Result<Self> {
        match first_duplicate(&observations) {
            Some(id) => Err(PipelineError::MalformedInterchange(format!(
                "duplicate landmark id {id} in one frame"
            ))),
            None => Ok(Self(observations)),
        }
    }

    /// Find the observation for a landmark id.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&JointObservation> {
        self.0.iter().find(|obs| obs.id == id)
    }

    /// Number of observations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the frame holds no detection.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the observations in order.
    pub fn iter(&self) -> std::slice::Iter<'_, JointObservation> {
        self.0.iter()
    }
}

impl<'de> Deserialize<'de> for FrameLandmarks {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let observations = Vec::<JointObservation>::deserialize(deserializer)?;
        match first_duplicate(&observations) {
            Some(id) => Err(serde::de::Error::custom(format!(
                "duplicate landmark id {id} in one frame"
            ))),
            None => Ok(Self(observations)),
        }
    }
}

fn first_duplicate(observations: &[JointObservation]) -> Option<u32> {
    let mut seen = HashSet::with_capacity(observations.len());
    observations
        .iter()
        .find(|obs| !seen.insert(obs.id))
        .map(|obs| obs.id)
}

impl<'a> IntoIterator for &'a FrameLandmarks {
    type Item = &'a JointObservation;
    type IntoIter = std::slice::Iter<'a, JointObservation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Recording parameters of the source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceMetadata {
    /// Frame width in pixels.
    pub original_width: u32,
    /// Frame height in pixels.
    pub original_height: u32,
    /// Number of frames in the sequence.
    pub frame_count: usize,
    /// Frames per second.
    pub fps: f64,
}

impl SequenceMetadata {
    /// Check that the metadata can describe a sequence of `len` frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame rate is not positive or the frame count
    /// disagrees with `len`.
    pub fn check(&self, len: usize) -> Result<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(PipelineError::MalformedInterchange(format!(
                "frame rate must be positive, got {}",
                self.fps
            )));
        }
        if self.frame_count != len {
            return Err(PipelineError::MalformedInterchange(format!(
                "metadata declares {} frames but {len} are present",
                self.frame_count
            )));
        }
        Ok(())
    }
}

/// Landmarks of a whole video.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LandmarkSequence {
    /// Recording parameters; absent for sequences read from a legacy document.
    pub metadata: Option<SequenceMetadata>,
    /// One entry per frame, in frame order.
    pub frames: Vec<FrameLandmarks>,
}

impl LandmarkSequence {
    /// Create a sequence with metadata.
    #[must_use]
    pub const fn new(metadata: SequenceMetadata, frames: Vec<FrameLandmarks>) -> Self {
        Self {
            metadata: Some(metadata),
            frames,
        }
    }

    /// Create a sequence without metadata.
    #[must_use]
    pub const fn bare(frames: Vec<FrameLandmarks>) -> Self {
        Self {
            metadata: None,
            frames,
        }
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the sequence has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame rate from the metadata, or [`DEFAULT_FPS`].
    #[must_use]
    pub fn frame_rate(&self) -> f64 {
        self.metadata.map_or(DEFAULT_FPS, |m| m.fps)
    }

    /// Number of frames in which the pose model found somebody.
    #[must_use]
    pub fn detected_frames(&self) -> usize {
        self.frames.iter().filter(|f| !f.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_ids_rejected() {
        let obs = JointObservation::new(3, 0.1, 0.2, 0.0, 0.9);
        assert!(FrameLandmarks::new(vec![obs, obs]).is_err());
    }

    #[test]
    fn test_get_by_id() {
        let frame = FrameLandmarks::new(vec![
            JointObservation::new(1, 0.1, 0.2, 0.0, 0.9),
            JointObservation::new(0, 0.5, 0.6, 0.1, 0.8),
        ])
        .unwrap();
        assert_eq!(frame.get(0).map(|o| o.x), Some(0.5));
        assert!(frame.get(7).is_none());
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn test_frame_rate_default() {
        let seq = LandmarkSequence::bare(vec![FrameLandmarks::empty()]);
        assert!((seq.frame_rate() - DEFAULT_FPS).abs() < f64::EPSILON);
        assert_eq!(seq.detected_frames(), 0);
    }

    #[test]
    fn test_metadata_check() {
        let meta = SequenceMetadata {
            original_width: 640,
            original_height: 480,
            frame_count: 2,
            fps: 25.0,
        };
        assert!(meta.check(2).is_ok());
        assert!(meta.check(3).is_err());

        let bad = SequenceMetadata { fps: 0.0, ..meta };
        assert!(bad.check(2).is_err());
    }
}
