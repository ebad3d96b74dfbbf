// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Landmark extraction.
//!
//! The [`Extractor`] walks a frame source once, in order, hands every frame
//! to a [`PoseModel`] and records one [`FrameLandmarks`] per frame. Frames in
//! which nobody is detected are recorded as empty; they never stop the run.
//! A source that opens but holds no frames gives an empty sequence.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use image::{DynamicImage, GenericImageView};

use crate::config::ExtractConfig;
use crate::error::{PipelineError, Result};
use crate::landmarks::{DEFAULT_FPS, FrameLandmarks, LandmarkSequence, SequenceMetadata};
use crate::pose::PoseModel;
use crate::source::{FrameMeta, Source, SourceIterator, StreamInfo};
use crate::{verbose, warn};

/// Cooperative cancellation flag, checked between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones observe it.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Receiver of per-frame output alongside the landmark data, such as an
/// annotated video writer.
pub trait FrameSink {
    /// Consume one decoded frame together with its landmarks.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame cannot be written. The extractor logs it
    /// and stops feeding this sink.
    fn write_frame(
        &mut self,
        frame: &DynamicImage,
        landmarks: &FrameLandmarks,
        connections: &[[u32; 2]],
        meta: &FrameMeta,
    ) -> Result<()>;

    /// Flush and close the output.
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be finalized.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Runs a pose model over a frame source.
///
/// # Example
///
/// ```no_run
/// use pose_animation::{ExtractConfig, Extractor, OnnxPoseModel, Source, SourceIterator};
///
/// let config = ExtractConfig::default();
/// let mut model = OnnxPoseModel::load("yolo11n-pose.onnx", &config)?;
/// let frames = SourceIterator::new(Source::from("clip.mp4"))?;
/// let sequence = Extractor::new(&mut model, config).run_source(frames)?;
/// println!("{} frames", sequence.len());
/// # Ok::<(), pose_animation::PipelineError>(())
/// ```
pub struct Extractor<'s, M: PoseModel> {
    model: M,
    config: ExtractConfig,
    cancel: Option<CancelToken>,
    sink: Option<&'s mut dyn FrameSink>,
}

impl<'s, M: PoseModel> Extractor<'s, M> {
    /// Create an extractor around a pose model.
    #[must_use]
    pub const fn new(model: M, config: ExtractConfig) -> Self {
        Self {
            model,
            config,
            cancel: None,
            sink: None,
        }
    }

    /// Attach a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Attach a sink that receives every frame with its landmarks.
    #[must_use]
    pub fn with_sink(mut self, sink: &'s mut dyn FrameSink) -> Self {
        self.sink = Some(sink);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Extract landmarks from every frame.
    ///
    /// Metadata comes from the first frame. Without any frame the sequence is
    /// empty, 0 x 0, at [`DEFAULT_FPS`].
    ///
    /// # Arguments
    ///
    /// * `frames` - Decoded frames in order.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::InvalidConfiguration`] if a threshold is out of range.
    /// - [`PipelineError::SourceUnreadable`] if the first frame cannot be decoded.
    /// - [`PipelineError::Cancelled`] if the token fires before the last frame.
    /// - Any error returned by the pose model.
    pub fn run<I>(&mut self, frames: I) -> Result<LandmarkSequence>
    where
        I: IntoIterator<Item = Result<(DynamicImage, FrameMeta)>>,
    {
        self.run_with_info(StreamInfo::default(), frames)
    }

    /// Extract landmarks from an opened source.
    ///
    /// Like [`Extractor::run`], but an empty source takes its dimensions and
    /// frame rate from the container.
    ///
    /// # Errors
    ///
    /// See [`Extractor::run`].
    pub fn run_source(&mut self, frames: SourceIterator) -> Result<LandmarkSequence> {
        let info = frames.info();
        self.run_with_info(info, frames)
    }

    fn run_with_info<I>(&mut self, info: StreamInfo, frames: I) -> Result<LandmarkSequence>
    where
        I: IntoIterator<Item = Result<(DynamicImage, FrameMeta)>>,
    {
        self.config.validate()?;
        self.model.reset();

        let thresholds = self.config.thresholds();
        let mut iter = frames.into_iter();
        let mut out: Vec<FrameLandmarks> = Vec::new();
        let mut first: Option<(u32, u32, Option<f64>)> = None;
        let start = Instant::now();

        loop {
            if self.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            let Some(item) = iter.next() else {
                break;
            };

            let (frame, meta) = match item {
                Ok(pair) => pair,
                Err(e) if out.is_empty() => {
                    return Err(match e {
                        PipelineError::SourceUnreadable(_) | PipelineError::FeatureNotEnabled(_) => e,
                        other => PipelineError::SourceUnreadable(other.to_string()),
                    });
                }
                Err(e) => {
                    warn!("Stopping after {} frames: {e}", out.len());
                    break;
                }
            };

            if first.is_none() {
                let (w, h) = frame.dimensions();
                let fps = meta.fps.filter(|f| f.is_finite() && *f > 0.0);
                first = Some((w, h, fps));
            }

            let landmarks = match self.model.detect(&frame, &thresholds)? {
                Some(observations) => FrameLandmarks::new(observations)
                    .map_err(|e| PipelineError::Inference(e.to_string()))?,
                None => FrameLandmarks::empty(),
            };

            verbose!(
                "frame {}/{}: {}",
                meta.frame_idx + 1,
                meta.total_frames.map_or_else(|| "?".to_string(), |t| t.to_string()),
                if landmarks.is_empty() {
                    "no detection".to_string()
                } else {
                    format!("{} landmarks", landmarks.len())
                }
            );

            self.feed_sink(&frame, &landmarks, &meta);
            out.push(landmarks);
        }

        let (width, height, fps) = first.unwrap_or((info.width, info.height, None));
        let fps = fps.or_else(|| info.fps.filter(|f| f.is_finite() && *f > 0.0));
        if out.is_empty() {
            warn!("Source opened but contained no frames");
        }

        if let Some(sink) = self.sink.as_deref_mut()
            && let Err(e) = sink.finish()
        {
            warn!("Annotated output could not be finalized: {e}");
        }

        let metadata = SequenceMetadata {
            original_width: width,
            original_height: height,
            frame_count: out.len(),
            fps: fps.unwrap_or(DEFAULT_FPS),
        };
        let sequence = LandmarkSequence::new(metadata, out);

        verbose!(
            "Extracted {} frames ({} with a detection) in {:.1}s",
            sequence.len(),
            sequence.detected_frames(),
            start.elapsed().as_secs_f64()
        );
        Ok(sequence)
    }

    fn feed_sink(&mut self, frame: &DynamicImage, landmarks: &FrameLandmarks, meta: &FrameMeta) {
        let connections = self.model.connections();
        let failed = match self.sink.as_deref_mut() {
            Some(sink) => match sink.write_frame(frame, landmarks, connections, meta) {
                Ok(()) => false,
                Err(e) => {
                    warn!("Annotated output disabled: {e}");
                    true
                }
            },
            None => false,
        };
        if failed {
            self.sink = None;
        }
    }
}

/// Open `source` and extract its landmarks with `model`.
///
/// # Errors
///
/// See [`SourceIterator::new`] and [`Extractor::run`].
pub fn extract<M: PoseModel>(source: Source, model: M, config: ExtractConfig) -> Result<LandmarkSequence> {
    config.validate()?;
    let frames = SourceIterator::new(source)?;
    Extractor::new(model, config).run_source(frames)
}
