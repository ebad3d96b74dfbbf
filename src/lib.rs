// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Pose Animation
//!
//! Convert a video of a moving person into a BVH skeletal animation.
//!
//! A pose model produces per-frame body landmarks; the landmarks are mapped
//! onto a fixed ten-joint skeleton and written as a BVH motion stream that 3D
//! animation tools can import.
//!
//! ```text
//! video frames ─▶ Extractor ─▶ LandmarkSequence ─▶ encode ─▶ AnimationDocument (.bvh)
//!                    ▲                 │
//!               PoseModel         interchange JSON
//! ```
//!
//! ## Features
//!
//! - **ONNX Runtime** - Ultralytics YOLO pose models with single-person tracking
//! - **Interchange** - JSON landmark files, with or without sequence metadata
//! - **Deterministic BVH** - byte-for-byte identical output for identical input
//! - **Multiple Sources** - video files, image directories, glob patterns, in-memory frames
//! - **Annotated Output** - landmark overlays saved as images or MP4
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use pose_animation::{
//!     ExtractConfig, Extractor, OnnxPoseModel, STANDARD_SKELETON, Source, SourceIterator, encode,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractConfig::new().with_detection_threshold(0.5);
//!     let mut model = OnnxPoseModel::load("yolo11n-pose.onnx", &config)?;
//!
//!     let frames = SourceIterator::new(Source::from("walk.mp4"))?;
//!     let landmarks = Extractor::new(&mut model, config).run_source(frames)?;
//!
//!     let animation = encode(&landmarks, &STANDARD_SKELETON, landmarks.frame_rate())?;
//!     animation.write_to("walk.bvh")?;
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Landmarks only
//! pose-animation extract --source walk.mp4 --output walk.json
//!
//! # Landmarks to animation
//! pose-animation encode --input walk.json --output walk.bvh
//!
//! # Video (or HTTP URL) straight to animation, keeping the landmarks
//! pose-animation convert --source walk.mp4 --output walk.bvh --landmarks walk.json
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`landmarks`] | [`JointObservation`], [`FrameLandmarks`], [`LandmarkSequence`] |
//! | [`interchange`] | JSON landmark files ([`InterchangeDocument`]) |
//! | [`source`] | Frame sources ([`Source`], [`SourceIterator`]) |
//! | [`pose`] | The [`PoseModel`] trait |
//! | [`model`] | [`OnnxPoseModel`], the ONNX Runtime pose model |
//! | [`extract`] | [`Extractor`], cancellation and frame sinks |
//! | [`skeleton`] | [`SkeletonDefinition`] and [`STANDARD_SKELETON`] |
//! | [`bvh`] | [`encode`] and [`AnimationDocument`] |
//! | [`pipeline`] | Request-level conversion ([`Pipeline`]) |
//! | [`error`] | Error types ([`PipelineError`], [`Result`]) |
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `annotate` | Landmark overlays on saved frames (default) |
//! | `video` | Video decoding and MP4 output via FFmpeg |
//! | `cuda` | NVIDIA CUDA acceleration |
//! | `coreml` | Apple `CoreML` (macOS/iOS) |

// Modules
#[cfg(feature = "annotate")]
pub mod annotate;
pub mod bvh;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod interchange;
pub mod io;
pub mod landmarks;
pub mod model;
pub mod pipeline;
pub mod pose;
pub mod postprocessing;
pub mod preprocessing;
pub mod skeleton;
pub mod source;
pub mod utils;

// Re-export main types for convenience
pub use bvh::{AnimationDocument, encode, encode_sequence};
pub use config::ExtractConfig;
pub use error::{PipelineError, Result};
pub use extract::{CancelToken, Extractor, FrameSink, extract};
pub use interchange::InterchangeDocument;
pub use landmarks::{
    DEFAULT_FPS, FrameLandmarks, JointObservation, LandmarkSequence, SequenceMetadata,
};
pub use model::OnnxPoseModel;
pub use pipeline::{ConversionOutput, ConversionRequest, OutputKind, Pipeline};
pub use pose::{PoseModel, Thresholds};
pub use skeleton::{Channel, JointNode, STANDARD_SKELETON, SkeletonDefinition};
pub use source::{FrameMeta, Source, SourceIterator, StreamInfo};

#[cfg(feature = "annotate")]
pub use io::AnnotatedOutput;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pose-animation");
    }
}
