// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Extraction configuration.
//!
//! [`ExtractConfig`] controls the pose model thresholds, the model input size
//! and the ONNX Runtime thread count. It uses a builder pattern and is checked
//! with [`ExtractConfig::validate`] before any frame is read.

use crate::error::{PipelineError, Result};
use crate::pose::Thresholds;

/// Default detection confidence, matching the landmarking runtime defaults.
pub const DEFAULT_DETECTION_THRESHOLD: f32 = 0.2;
/// Default tracking confidence.
pub const DEFAULT_TRACKING_THRESHOLD: f32 = 0.2;
/// Default square model input size.
pub const DEFAULT_IMGSZ: usize = 640;

/// Configuration for landmark extraction.
///
/// # Example
///
/// ```rust
/// use pose_animation::ExtractConfig;
///
/// let config = ExtractConfig::new()
///     .with_detection_threshold(0.5)
///     .with_tracking_threshold(0.3)
///     .with_imgsz(480, 640);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractConfig {
    /// Minimum confidence (0.0 to 1.0) for a new person detection.
    pub detection_threshold: f32,
    /// Minimum confidence (0.0 to 1.0) to keep following an already tracked person.
    pub tracking_threshold: f32,
    /// Model input size (height, width). `None` uses [`DEFAULT_IMGSZ`].
    pub imgsz: Option<(usize, usize)>,
    /// Number of intra-op threads for ONNX Runtime, `0` lets the runtime decide.
    pub num_threads: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            tracking_threshold: DEFAULT_TRACKING_THRESHOLD,
            imgsz: None,
            num_threads: 0,
        }
    }
}

impl ExtractConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the detection threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Minimum person confidence (0.0 to 1.0).
    #[must_use]
    pub const fn with_detection_threshold(mut self, threshold: f32) -> Self {
        self.detection_threshold = threshold;
        self
    }

    /// Set the tracking threshold.
    ///
    /// # Arguments
    ///
    /// * `threshold` - Minimum confidence to keep a track alive (0.0 to 1.0).
    #[must_use]
    pub const fn with_tracking_threshold(mut self, threshold: f32) -> Self {
        self.tracking_threshold = threshold;
        self
    }

    /// Set the model input size.
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the number of ONNX Runtime threads.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Model input size, falling back to the square default.
    #[must_use]
    pub fn input_size(&self) -> (usize, usize) {
        self.imgsz.unwrap_or((DEFAULT_IMGSZ, DEFAULT_IMGSZ))
    }

    /// The pair of thresholds handed to the pose model on every frame.
    #[must_use]
    pub const fn thresholds(&self) -> Thresholds {
        Thresholds {
            detection: self.detection_threshold,
            tracking: self.tracking_threshold,
        }
    }

    /// Check that every parameter is in range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfiguration`] if a threshold lies
    /// outside [0, 1] or the input size has a zero dimension.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("detection threshold", self.detection_threshold),
            ("tracking threshold", self.tracking_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidConfiguration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if let Some((h, w)) = self.imgsz
            && (h == 0 || w == 0)
        {
            return Err(PipelineError::InvalidConfiguration(format!(
                "input size must be non-zero, got {h}x{w}"
            )));
        }
        Ok(())
    }
}
