// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Frame sources for landmark extraction.
//!
//! A [`Source`] names where frames come from: a video file, a directory or
//! glob of numbered images, an explicit list of image paths or frames already
//! decoded in memory. [`SourceIterator`] opens it and yields frames in order.

use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{PipelineError, Result};

/// Extensions treated as still images.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "webp"];

/// Where frames come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// Path to a video file.
    Video(PathBuf),
    /// Path to a single image, read as a one-frame sequence.
    Image(PathBuf),
    /// Directory of image frames, read in file-name order.
    Directory(PathBuf),
    /// Glob pattern of image frames such as `frames/*.png`.
    Glob(String),
    /// Explicit list of image paths.
    ImageList(Vec<PathBuf>),
    /// Frames already decoded in memory.
    Frames(Vec<DynamicImage>),
}

impl Source {
    /// Check if this source is a video file.
    #[must_use]
    pub const fn is_video(&self) -> bool {
        matches!(self, Self::Video(_))
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension().is_some_and(|ext| {
        let ext = ext.to_string_lossy().to_lowercase();
        extensions.contains(&ext.as_str())
    })
}

/// Classify a command-line style source string.
impl From<&str> for Source {
    fn from(s: &str) -> Self {
        if s.contains('*') {
            return Self::Glob(s.to_string());
        }

        let path = PathBuf::from(s);
        if path.is_dir() {
            Self::Directory(path)
        } else if has_extension(&path, IMAGE_EXTENSIONS) {
            Self::Image(path)
        } else {
            Self::Video(path)
        }
    }
}

impl From<String> for Source {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Self::from(path.to_string_lossy().as_ref())
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::from(path.as_path())
    }
}

impl From<Vec<DynamicImage>> for Source {
    fn from(frames: Vec<DynamicImage>) -> Self {
        Self::Frames(frames)
    }
}

/// Metadata about one decoded frame.
#[derive(Debug, Clone, Default)]
pub struct FrameMeta {
    /// Zero-based frame index.
    pub frame_idx: usize,
    /// Total frames, when the source knows it up front.
    pub total_frames: Option<usize>,
    /// Source path or identifier.
    pub path: String,
    /// Frames per second reported by the source.
    pub fps: Option<f64>,
}

enum Frames {
    Paths(Vec<PathBuf>),
    Memory(std::vec::IntoIter<DynamicImage>, usize),
    #[cfg(feature = "video")]
    Video {
        decoder: video_rs::decode::Decoder,
        path: String,
        fps: Option<f64>,
        total: Option<usize>,
        size: (u32, u32),
    },
}

/// Stream properties known as soon as a source is open, before any frame is
/// decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamInfo {
    /// Frame width in pixels, 0 when unknown.
    pub width: u32,
    /// Frame height in pixels, 0 when unknown.
    pub height: u32,
    /// Frames per second reported by the container.
    pub fps: Option<f64>,
}

/// Iterator over the frames of a [`Source`].
///
/// The source is opened eagerly by [`SourceIterator::new`], so an unreadable
/// video or a missing directory is reported before any frame is processed.
/// A source that opens but holds no frames yields nothing.
pub struct SourceIterator {
    frames: Frames,
    current_frame: usize,
    finished: bool,
}

impl SourceIterator {
    /// Open a source.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::SourceUnreadable`] if the source cannot be
    /// opened, and [`PipelineError::FeatureNotEnabled`] for video files when
    /// the `video` feature is disabled.
    pub fn new(source: Source) -> Result<Self> {
        let frames = match source {
            Source::Video(path) => Self::open_video(&path)?,
            Source::Image(path) => {
                if !path.is_file() {
                    return Err(PipelineError::SourceUnreadable(format!(
                        "image not found: {}",
                        path.display()
                    )));
                }
                Frames::Paths(vec![path])
            }
            Source::Directory(path) => Frames::Paths(collect_images_from_dir(&path)?),
            Source::Glob(pattern) => Frames::Paths(collect_images_from_glob(&pattern)?),
            Source::ImageList(paths) => Frames::Paths(paths),
            Source::Frames(images) => {
                let total = images.len();
                Frames::Memory(images.into_iter(), total)
            }
        };

        Ok(Self {
            frames,
            current_frame: 0,
            finished: false,
        })
    }

    /// Dimensions and frame rate reported by the opened source.
    ///
    /// Only video containers know these up front; image sources report
    /// [`StreamInfo::default`].
    #[must_use]
    pub const fn info(&self) -> StreamInfo {
        match &self.frames {
            #[cfg(feature = "video")]
            Frames::Video { fps, size, .. } => StreamInfo {
                width: size.0,
                height: size.1,
                fps: *fps,
            },
            _ => StreamInfo {
                width: 0,
                height: 0,
                fps: None,
            },
        }
    }

    /// Total number of frames, when known up front.
    #[must_use]
    pub fn total_frames(&self) -> Option<usize> {
        match &self.frames {
            Frames::Paths(paths) => Some(paths.len()),
            Frames::Memory(_, total) => Some(*total),
            #[cfg(feature = "video")]
            Frames::Video { total, .. } => *total,
        }
    }

    #[cfg(feature = "video")]
    fn open_video(path: &Path) -> Result<Frames> {
        crate::io::init_video();
        let decoder = video_rs::decode::Decoder::new(path).map_err(|e| {
            PipelineError::SourceUnreadable(format!("cannot open {}: {e}", path.display()))
        })?;

        let rate = f64::from(decoder.frame_rate());
        let fps = (rate.is_finite() && rate > 0.0).then_some(rate);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let total = match (decoder.duration(), fps) {
            (Ok(duration), Some(fps)) => Some((duration.as_secs_f64() * fps).round() as usize),
            _ => None,
        };

        let size = decoder.size();
        Ok(Frames::Video {
            decoder,
            path: path.to_string_lossy().to_string(),
            fps,
            total,
            size,
        })
    }

    #[cfg(not(feature = "video"))]
    fn open_video(path: &Path) -> Result<Frames> {
        Err(PipelineError::FeatureNotEnabled(format!(
            "decoding {} requires the 'video' feature (build with --features video)",
            path.display()
        )))
    }

    fn next_image(&mut self) -> Option<Result<(DynamicImage, FrameMeta)>> {
        let Frames::Paths(paths) = &self.frames else {
            return None;
        };
        let path = paths.get(self.current_frame)?;
        let meta = FrameMeta {
            frame_idx: self.current_frame,
            total_frames: Some(paths.len()),
            path: path.to_string_lossy().to_string(),
            fps: None,
        };
        self.current_frame += 1;

        Some(image::open(path).map(|img| (img, meta)).map_err(|e| {
            PipelineError::SourceUnreadable(format!("failed to load {}: {e}", path.display()))
        }))
    }

    #[cfg(feature = "video")]
    fn next_video_frame(&mut self) -> Option<Result<(DynamicImage, FrameMeta)>> {
        let Frames::Video {
            decoder,
            path,
            fps,
            total,
            ..
        } = &mut self.frames
        else {
            return None;
        };

        match decoder.decode() {
            Ok((_ts, frame)) => {
                let meta = FrameMeta {
                    frame_idx: self.current_frame,
                    total_frames: *total,
                    path: path.clone(),
                    fps: *fps,
                };
                self.current_frame += 1;
                Some(video_frame_to_image(&frame).map(|img| (img, meta)))
            }
            Err(video_rs::Error::DecodeExhausted | video_rs::Error::ReadExhausted) => None,
            Err(e) => Some(Err(PipelineError::Video(format!(
                "failed to decode frame {}: {e}",
                self.current_frame
            )))),
        }
    }
}

impl Iterator for SourceIterator {
    type Item = Result<(DynamicImage, FrameMeta)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let item = match &mut self.frames {
            Frames::Paths(_) => self.next_image(),
            Frames::Memory(images, total) => {
                let total = *total;
                images.next().map(|img| {
                    let meta = FrameMeta {
                        frame_idx: self.current_frame,
                        total_frames: Some(total),
                        ..FrameMeta::default()
                    };
                    self.current_frame += 1;
                    Ok((img, meta))
                })
            }
            #[cfg(feature = "video")]
            Frames::Video { .. } => self.next_video_frame(),
        };

        // A decode error ends the stream.
        if !matches!(item, Some(Ok(_))) {
            self.finished = true;
        }
        item
    }
}

/// Collect image paths from a directory, sorted by name.
fn collect_images_from_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        PipelineError::SourceUnreadable(format!("cannot read {}: {e}", dir.display()))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| has_extension(path, IMAGE_EXTENSIONS))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Collect image paths matching a simple `dir/*.ext` pattern, sorted by name.
fn collect_images_from_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let Some(star_pos) = pattern.find('*') else {
        return Ok(vec![PathBuf::from(pattern)]);
    };

    let dir_part = pattern[..star_pos]
        .trim_end_matches('/')
        .trim_end_matches('\\');
    let dir = if dir_part.is_empty() {
        Path::new(".")
    } else {
        Path::new(dir_part)
    };
    let ext_filter = pattern[star_pos..].strip_prefix("*.").map(str::to_lowercase);

    let entries = std::fs::read_dir(dir).map_err(|e| {
        PipelineError::SourceUnreadable(format!("cannot read {}: {e}", dir.display()))
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .filter(|path| match &ext_filter {
            Some(ext) => path
                .extension()
                .is_some_and(|e| e.to_string_lossy().to_lowercase() == *ext),
            None => has_extension(path, IMAGE_EXTENSIONS),
        })
        .collect();
    paths.sort();
    Ok(paths)
}

/// Convert a `video_rs` HWC RGB frame to a `DynamicImage`.
#[cfg(feature = "video")]
fn video_frame_to_image(frame: &video_rs::Frame) -> Result<DynamicImage> {
    let shape = frame.shape();
    let height = u32::try_from(shape[0])
        .map_err(|_| PipelineError::Image("frame height exceeds u32::MAX".to_string()))?;
    let width = u32::try_from(shape[1])
        .map_err(|_| PipelineError::Image("frame width exceeds u32::MAX".to_string()))?;

    let data: Vec<u8> = frame.iter().copied().collect();
    image::RgbImage::from_raw(width, height, data)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| PipelineError::Image("frame buffer has the wrong size".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_source_from_string() {
        assert!(matches!(Source::from("clip.mp4"), Source::Video(_)));
        assert!(matches!(Source::from("clip.MOV"), Source::Video(_)));
        assert!(matches!(Source::from("frame.png"), Source::Image(_)));
        assert!(matches!(Source::from("frames/*.jpg"), Source::Glob(_)));
        assert!(Source::from("clip.mp4").is_video());
        assert!(!Source::from("frame.png").is_video());
    }

    #[test]
    fn test_memory_frames() {
        let frames = vec![
            DynamicImage::ImageRgb8(RgbImage::new(4, 3)),
            DynamicImage::ImageRgb8(RgbImage::new(4, 3)),
        ];
        let iter = SourceIterator::new(Source::Frames(frames)).unwrap();
        assert_eq!(iter.total_frames(), Some(2));
        assert_eq!(iter.info(), StreamInfo::default());

        let indices: Vec<usize> = iter.map(|r| r.unwrap().1.frame_idx).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_empty_sources_yield_nothing() {
        let mut iter = SourceIterator::new(Source::Frames(Vec::new())).unwrap();
        assert_eq!(iter.total_frames(), Some(0));
        assert!(iter.next().is_none());

        let dir = tempfile::tempdir().unwrap();
        let mut iter = SourceIterator::new(Source::Directory(dir.path().to_path_buf())).unwrap();
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_missing_sources_unreadable() {
        assert!(matches!(
            SourceIterator::new(Source::Directory(PathBuf::from("/nonexistent/frames"))),
            Err(PipelineError::SourceUnreadable(_))
        ));
        assert!(matches!(
            SourceIterator::new(Source::Image(PathBuf::from("/nonexistent/frame.png"))),
            Err(PipelineError::SourceUnreadable(_))
        ));
    }

    #[test]
    fn test_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["002.png", "000.png", "001.png"] {
            RgbImage::new(2, 2).save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let iter = SourceIterator::new(Source::Directory(dir.path().to_path_buf())).unwrap();
        let names: Vec<String> = iter
            .map(|r| {
                let path = r.unwrap().1.path;
                Path::new(&path)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["000.png", "001.png", "002.png"]);
    }

    #[test]
    fn test_bad_image_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("000.png");
        let bad = dir.path().join("001.png");
        RgbImage::new(2, 2).save(&good).unwrap();
        std::fs::write(&bad, b"not an image").unwrap();

        let mut iter =
            SourceIterator::new(Source::ImageList(vec![good, bad.clone(), bad])).unwrap();
        assert!(iter.next().unwrap().is_ok());
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }

    #[cfg(not(feature = "video"))]
    #[test]
    fn test_video_without_feature_names_the_flag() {
        match SourceIterator::new(Source::from("walk.mp4")) {
            Err(PipelineError::FeatureNotEnabled(msg)) => assert!(msg.contains("--features video")),
            other => panic!("expected FeatureNotEnabled, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_missing_video() {
        let result = SourceIterator::new(Source::Video(PathBuf::from("/nonexistent/clip.mp4")));
        assert!(matches!(
            result,
            Err(PipelineError::SourceUnreadable(_) | PipelineError::FeatureNotEnabled(_))
        ));
    }
}
