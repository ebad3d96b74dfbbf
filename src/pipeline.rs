// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Request-level conversion.
//!
//! A [`ConversionRequest`] names exactly one video: a local upload or a
//! remote HTTP(S) reference. [`Pipeline::run`] stages it in a private
//! temporary directory, extracts landmarks, encodes the animation and removes
//! the staged copy on every exit path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::bvh::{AnimationDocument, encode_sequence};
use crate::config::ExtractConfig;
use crate::download::fetch_remote;
use crate::error::{PipelineError, Result};
use crate::extract::{CancelToken, Extractor};
use crate::landmarks::LandmarkSequence;
use crate::pose::PoseModel;
use crate::skeleton::{STANDARD_SKELETON, SkeletonDefinition};
use crate::source::{Source, SourceIterator};
use crate::verbose;

/// What a conversion produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputKind {
    /// Landmarks and the encoded animation.
    #[default]
    Animation,
    /// Landmarks only; encoding is skipped.
    LandmarksOnly,
}

/// One conversion request.
#[derive(Debug, Clone, Default)]
pub struct ConversionRequest {
    /// Local video file supplied by the caller.
    pub upload: Option<PathBuf>,
    /// Remote HTTP(S) reference to a stored video.
    pub remote: Option<String>,
    /// Requested output.
    pub output: OutputKind,
    /// Directory receiving annotated frames, if any.
    pub annotated_dir: Option<PathBuf>,
}

enum ResolvedSource<'a> {
    Upload(&'a Path),
    Remote(&'a str),
}

impl ConversionRequest {
    /// Request for a local file.
    #[must_use]
    pub fn upload<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            upload: Some(path.into()),
            ..Self::default()
        }
    }

    /// Request for a remote reference.
    #[must_use]
    pub fn remote<S: Into<String>>(url: S) -> Self {
        Self {
            remote: Some(url.into()),
            ..Self::default()
        }
    }

    /// Skip animation encoding.
    #[must_use]
    pub fn landmarks_only(mut self) -> Self {
        self.output = OutputKind::LandmarksOnly;
        self
    }

    /// Save annotated frames under `dir`.
    #[must_use]
    pub fn with_annotated_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.annotated_dir = Some(dir.into());
        self
    }

    fn resolve(&self) -> Result<ResolvedSource<'_>> {
        match (&self.upload, &self.remote) {
            (None, None) => Err(PipelineError::NoSource),
            (Some(_), Some(_)) => Err(PipelineError::AmbiguousSource),
            (Some(path), None) => Ok(ResolvedSource::Upload(path)),
            (None, Some(url)) => Ok(ResolvedSource::Remote(url)),
        }
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Extracted landmarks with metadata.
    pub landmarks: LandmarkSequence,
    /// Encoded animation, absent for [`OutputKind::LandmarksOnly`].
    pub animation: Option<AnimationDocument>,
}

/// Runs whole conversions with one pose model.
pub struct Pipeline<M: PoseModel> {
    model: M,
    config: ExtractConfig,
    skeleton: &'static SkeletonDefinition,
    staging_root: Option<PathBuf>,
    cancel: Option<CancelToken>,
}

impl<M: PoseModel> Pipeline<M> {
    /// Create a pipeline using [`STANDARD_SKELETON`].
    #[must_use]
    pub fn new(model: M, config: ExtractConfig) -> Self {
        Self {
            model,
            config,
            skeleton: &STANDARD_SKELETON,
            staging_root: None,
            cancel: None,
        }
    }

    /// Use another skeleton for encoding.
    #[must_use]
    pub const fn with_skeleton(mut self, skeleton: &'static SkeletonDefinition) -> Self {
        self.skeleton = skeleton;
        self
    }

    /// Create staging directories under `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_staging_root<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.staging_root = Some(dir.into());
        self
    }

    /// Attach a cancellation token shared by every run.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn staging_dir(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pose-animation-");
        let dir = match &self.staging_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    /// Convert one request.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::NoSource`] / [`PipelineError::AmbiguousSource`] for
    ///   a request without exactly one source.
    /// - [`PipelineError::SourceResolution`] if a remote reference cannot be fetched.
    /// - [`PipelineError::SourceUnreadable`] if the video cannot be decoded.
    /// - Any extraction or encoding error.
    pub fn run(&mut self, request: &ConversionRequest) -> Result<ConversionOutput> {
        let resolved = request.resolve()?;
        self.config.validate()?;
        self.skeleton.validate()?;

        // Removed when dropped, on success and failure alike.
        let staging = self.staging_dir()?;
        let staged = match resolved {
            ResolvedSource::Upload(path) => stage_upload(path, staging.path())?,
            ResolvedSource::Remote(url) => fetch_remote(url, staging.path())?,
        };
        verbose!("Staged source at {}", staged.display());

        let landmarks = self.extract(Source::from(staged), request.annotated_dir.as_deref())?;
        let animation = match request.output {
            OutputKind::Animation => Some(encode_sequence(&landmarks, self.skeleton)?),
            OutputKind::LandmarksOnly => None,
        };

        staging.close()?;
        Ok(ConversionOutput {
            landmarks,
            animation,
        })
    }

    fn extract(&mut self, source: Source, annotated_dir: Option<&Path>) -> Result<LandmarkSequence> {
        #[cfg(feature = "annotate")]
        let mut sink = annotated_dir
            .map(|dir| crate::io::AnnotatedOutput::new(dir.to_path_buf(), source.is_video(), false));
        #[cfg(not(feature = "annotate"))]
        if annotated_dir.is_some() {
            return Err(PipelineError::FeatureNotEnabled(
                "annotated output requires the 'annotate' feature".to_string(),
            ));
        }

        let frames = SourceIterator::new(source)?;
        let mut extractor = Extractor::new(&mut self.model, self.config.clone());
        if let Some(token) = &self.cancel {
            extractor = extractor.with_cancel(token.clone());
        }
        #[cfg(feature = "annotate")]
        if let Some(sink) = sink.as_mut() {
            extractor = extractor.with_sink(sink);
        }
        extractor.run_source(frames)
    }
}

/// Copy an uploaded file into the staging directory, keeping its file name.
fn stage_upload(path: &Path, dir: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .map_or_else(|| "upload".into(), std::ffi::OsStr::to_os_string);
    let dest = dir.join(name);
    fs::copy(path, &dest).map_err(|e| {
        PipelineError::SourceUnreadable(format!("cannot read upload {}: {e}", path.display()))
    })?;
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::JointObservation;
    use crate::pose::Thresholds;
    use image::{DynamicImage, RgbImage};

    struct Centered;

    impl PoseModel for Centered {
        fn detect(
            &mut self,
            _frame: &DynamicImage,
            _thresholds: &Thresholds,
        ) -> Result<Option<Vec<JointObservation>>> {
            Ok(Some(vec![JointObservation::new(0, 0.5, 0.5, 0.0, 1.0)]))
        }
    }

    fn pipeline(root: &Path) -> Pipeline<Centered> {
        Pipeline::new(Centered, ExtractConfig::default()).with_staging_root(root)
    }

    fn staged_entries(root: &Path) -> usize {
        fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn test_no_source() {
        let tmp = tempfile::tempdir().unwrap();
        let err = pipeline(tmp.path()).run(&ConversionRequest::default()).unwrap_err();
        assert!(matches!(err, PipelineError::NoSource));
        assert!(err.is_client_error());
    }

    #[test]
    fn test_ambiguous_source() {
        let tmp = tempfile::tempdir().unwrap();
        let request = ConversionRequest {
            upload: Some(PathBuf::from("clip.mp4")),
            remote: Some("https://example.com/clip.mp4".to_string()),
            ..ConversionRequest::default()
        };
        let err = pipeline(tmp.path()).run(&request).unwrap_err();
        assert!(matches!(err, PipelineError::AmbiguousSource));
        assert_eq!(staged_entries(tmp.path()), 0);
    }

    #[test]
    fn test_missing_upload_is_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        let request = ConversionRequest::upload(tmp.path().join("missing.mp4"));
        let err = pipeline(tmp.path()).run(&request).unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnreadable(_)));
        assert!(!err.public_message().contains("missing.mp4"));
        assert_eq!(staged_entries(tmp.path()), 0);
    }

    #[test]
    fn test_corrupt_upload_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let upload = tmp.path().join("upload.png");
        fs::write(&upload, b"not an image").unwrap();
        let staging = tmp.path().join("staging");
        fs::create_dir(&staging).unwrap();

        let err = pipeline(&staging)
            .run(&ConversionRequest::upload(&upload))
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnreadable(_)));
        assert_eq!(staged_entries(&staging), 0);
    }

    #[test]
    fn test_remote_must_be_http() {
        let tmp = tempfile::tempdir().unwrap();
        let err = pipeline(tmp.path())
            .run(&ConversionRequest::remote("ftp://example.com/clip.mp4"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::SourceResolution(_)));
        assert_eq!(staged_entries(tmp.path()), 0);
    }

    #[test]
    fn test_upload_converted_and_cleaned_up() {
        let tmp = tempfile::tempdir().unwrap();
        let upload = tmp.path().join("pose.png");
        RgbImage::new(40, 20).save(&upload).unwrap();
        let staging = tmp.path().join("staging");
        fs::create_dir(&staging).unwrap();

        let mut pipeline = pipeline(&staging);
        let out = pipeline.run(&ConversionRequest::upload(&upload)).unwrap();
        assert_eq!(out.landmarks.len(), 1);
        let meta = out.landmarks.metadata.as_ref().unwrap();
        assert_eq!((meta.original_width, meta.original_height), (40, 20));

        let animation = out.animation.unwrap();
        assert_eq!(animation.frame_count(), 1);
        assert!(animation.motion_lines()[0].starts_with("50.00 50.00 0.00 "));
        assert_eq!(staged_entries(&staging), 0);

        let out = pipeline
            .run(&ConversionRequest::upload(&upload).landmarks_only())
            .unwrap();
        assert!(out.animation.is_none());
        assert_eq!(staged_entries(&staging), 0);
    }
}
