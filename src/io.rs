// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Output helpers: video encoding, annotated frame saving and run directories.

use std::path::{Path, PathBuf};

#[cfg(feature = "video")]
use std::sync::Once;

#[cfg(feature = "video")]
use video_rs::{Encoder, Time, encode::Settings as EncoderSettings};

#[cfg(feature = "annotate")]
use crate::annotate::annotate_frame;
#[cfg(feature = "annotate")]
use crate::extract::FrameSink;
#[cfg(feature = "annotate")]
use crate::landmarks::FrameLandmarks;
#[cfg(feature = "annotate")]
use crate::source::FrameMeta;
#[cfg(any(feature = "video", feature = "annotate"))]
use crate::error::PipelineError;
#[cfg(any(feature = "video", feature = "annotate"))]
use crate::error::Result;

#[cfg(feature = "video")]
static INIT: Once = Once::new();

/// Initialize `video-rs` once per process. Safe to call repeatedly.
#[allow(clippy::missing_const_for_fn)]
pub fn init_video() {
    #[cfg(feature = "video")]
    INIT.call_once(|| {
        if let Err(e) = video_rs::init() {
            crate::warn!("Failed to initialize video-rs: {e}");
        }
    });
}

/// Find the next free run directory under `base`: `prefix`, `prefix2`, `prefix3`, ...
#[must_use]
pub fn find_next_run_dir(base: &str, prefix: &str) -> PathBuf {
    let base_path = Path::new(base);

    let first = base_path.join(prefix);
    if !first.exists() {
        return first;
    }

    (2_u32..)
        .map(|i| base_path.join(format!("{prefix}{i}")))
        .find(|dir| !dir.exists())
        .unwrap_or(first)
}

/// H.264 MP4 writer on top of `video-rs`.
#[cfg(feature = "video")]
pub struct VideoWriter {
    encoder: Encoder,
    frame_duration: Time,
    position: Time,
    width: usize,
    height: usize,
}

#[cfg(feature = "video")]
impl VideoWriter {
    /// Create a writer for `width` x `height` frames at `fps`.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory or the encoder cannot be created.
    pub fn new<P: AsRef<Path>>(path: P, width: usize, height: usize, fps: f64) -> Result<Self> {
        let output_path = path.as_ref();
        if let Some(parent) = output_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        init_video();
        let settings = EncoderSettings::preset_h264_yuv420p(width, height, false);
        let encoder = Encoder::new(output_path, settings)
            .map_err(|e| PipelineError::Video(format!("failed to create video encoder: {e}")))?;

        Ok(Self {
            encoder,
            frame_duration: Time::from_secs_f64(1.0 / fps),
            position: Time::zero(),
            width,
            height,
        })
    }

    /// Append one frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame size differs from the video size or
    /// encoding fails.
    pub fn write_frame(&mut self, frame: &image::DynamicImage) -> Result<()> {
        let rgb = frame.to_rgb8();
        let (width, height) = (rgb.width() as usize, rgb.height() as usize);
        if width != self.width || height != self.height {
            return Err(PipelineError::Video(format!(
                "frame is {width}x{height}, video is {}x{}",
                self.width, self.height
            )));
        }

        let frame_array = ndarray::Array3::from_shape_vec((height, width, 3), rgb.into_raw())
            .map_err(|e| PipelineError::Video(e.to_string()))?;
        self.encoder
            .encode(&frame_array, self.position)
            .map_err(|e| PipelineError::Video(format!("failed to encode frame: {e}")))?;

        self.position = self.position.aligned_with(self.frame_duration).add();
        Ok(())
    }

    /// Flush the encoder and close the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder fails to finish.
    pub fn finish(mut self) -> Result<()> {
        self.encoder
            .finish()
            .map_err(|e| PipelineError::Video(format!("failed to finish video encoding: {e}")))
    }
}

/// Writes annotated frames next to the extracted landmarks.
///
/// Video sources become one MP4 named after the source when the `video`
/// feature is enabled; otherwise, or with `save_frames`, every frame is saved
/// as a JPEG named `<stem>_<index>.jpg`. Image sources keep their file names.
#[cfg(feature = "annotate")]
pub struct AnnotatedOutput {
    save_dir: PathBuf,
    source_is_video: bool,
    save_frames: bool,
    saved: usize,
    #[cfg(feature = "video")]
    video_writer: Option<VideoWriter>,
}

#[cfg(feature = "annotate")]
impl AnnotatedOutput {
    /// Create an output under `save_dir`. The directory is created on the first frame.
    #[must_use]
    pub const fn new(save_dir: PathBuf, source_is_video: bool, save_frames: bool) -> Self {
        Self {
            save_dir,
            source_is_video,
            save_frames,
            saved: 0,
            #[cfg(feature = "video")]
            video_writer: None,
        }
    }

    /// Directory receiving the output.
    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Number of frames written so far.
    #[must_use]
    pub const fn saved(&self) -> usize {
        self.saved
    }

    const fn as_video(&self) -> bool {
        cfg!(feature = "video") && self.source_is_video && !self.save_frames
    }

    fn frame_file_name(&self, meta: &FrameMeta) -> String {
        let path = Path::new(&meta.path);
        if self.source_is_video || meta.path.is_empty() {
            let stem = path
                .file_stem()
                .map_or_else(|| "frame".to_string(), |s| s.to_string_lossy().to_string());
            format!("{stem}_{}.jpg", meta.frame_idx)
        } else {
            path.file_name().map_or_else(
                || format!("frame_{}.jpg", meta.frame_idx),
                |s| s.to_string_lossy().to_string(),
            )
        }
    }

    #[cfg(feature = "video")]
    fn write_video_frame(&mut self, annotated: &image::DynamicImage, meta: &FrameMeta) -> Result<()> {
        if self.video_writer.is_none() {
            let stem = Path::new(&meta.path)
                .file_stem()
                .map_or_else(|| "annotated".to_string(), |s| s.to_string_lossy().to_string());
            let save_path = self.save_dir.join(format!("{stem}.mp4"));
            let fps = meta
                .fps
                .filter(|f| *f > 0.0)
                .unwrap_or(crate::landmarks::DEFAULT_FPS);
            self.video_writer = Some(VideoWriter::new(
                save_path,
                annotated.width() as usize,
                annotated.height() as usize,
                fps,
            )?);
        }
        match self.video_writer.as_mut() {
            Some(writer) => writer.write_frame(annotated),
            None => Ok(()),
        }
    }

    #[cfg(not(feature = "video"))]
    #[allow(clippy::unused_self)]
    fn write_video_frame(&mut self, _annotated: &image::DynamicImage, _meta: &FrameMeta) -> Result<()> {
        Err(PipelineError::FeatureNotEnabled(
            "writing MP4 output requires the 'video' feature".to_string(),
        ))
    }
}

#[cfg(feature = "annotate")]
impl FrameSink for AnnotatedOutput {
    fn write_frame(
        &mut self,
        frame: &image::DynamicImage,
        landmarks: &FrameLandmarks,
        connections: &[[u32; 2]],
        meta: &FrameMeta,
    ) -> Result<()> {
        let annotated = annotate_frame(frame, landmarks, connections);

        if self.as_video() {
            self.write_video_frame(&annotated, meta)?;
        } else {
            std::fs::create_dir_all(&self.save_dir)?;
            let save_path = self.save_dir.join(self.frame_file_name(meta));
            annotated.to_rgb8().save(&save_path).map_err(|e| {
                PipelineError::Image(format!("failed to save {}: {e}", save_path.display()))
            })?;
        }
        self.saved += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        #[cfg(feature = "video")]
        if let Some(writer) = self.video_writer.take() {
            writer.finish()?;
        }
        Ok(())
    }
}
