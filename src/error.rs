// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the landmark-to-animation pipeline.

use std::fmt;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for the pipeline.
///
/// A frame where the pose model finds nobody is not an error: it is recorded
/// as an empty [`FrameLandmarks`](crate::FrameLandmarks) and extraction goes on.
#[derive(Debug)]
pub enum PipelineError {
    /// The frame source cannot be opened or decoded at all.
    SourceUnreadable(String),
    /// A landmark interchange document does not have the expected shape.
    MalformedInterchange(String),
    /// Non-positive frame rate, out-of-range threshold or invalid skeleton.
    InvalidConfiguration(String),
    /// Error loading the pose model.
    ModelLoad(String),
    /// Error while running the pose model on a frame.
    Inference(String),
    /// Error processing images.
    Image(String),
    /// Video decoding or encoding error.
    Video(String),
    /// Wrapped `std::io::Error`.
    Io(std::io::Error),
    /// The run was cancelled between two frames.
    Cancelled,
    /// A request supplied neither an upload nor a remote reference.
    NoSource,
    /// A request supplied both an upload and a remote reference.
    AmbiguousSource,
    /// A remote video reference could not be fetched.
    SourceResolution(String),
    /// Feature not enabled.
    FeatureNotEnabled(String),
}

impl PipelineError {
    /// Whether the failure is the caller's fault rather than a processing error.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NoSource | Self::AmbiguousSource | Self::InvalidConfiguration(_)
        )
    }

    /// Message safe to hand back across a network boundary.
    ///
    /// Unlike `Display`, this never includes file paths, URLs or other
    /// details about staged resources.
    #[must_use]
    pub const fn public_message(&self) -> &'static str {
        match self {
            Self::SourceUnreadable(_) => "the video could not be decoded",
            Self::MalformedInterchange(_) => "the landmark document is malformed",
            Self::InvalidConfiguration(_) => "invalid processing parameters",
            Self::ModelLoad(_) | Self::Inference(_) => "pose estimation failed",
            Self::Image(_) | Self::Video(_) | Self::Io(_) => "internal processing error",
            Self::Cancelled => "processing was cancelled",
            Self::NoSource => "no video file or video reference was provided",
            Self::AmbiguousSource => "provide either a video file or a video reference, not both",
            Self::SourceResolution(_) => "the referenced video could not be retrieved",
            Self::FeatureNotEnabled(_) => "this build does not support the requested input",
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SourceUnreadable(msg) => write!(f, "Source unreadable: {msg}"),
            Self::MalformedInterchange(msg) => write!(f, "Malformed interchange: {msg}"),
            Self::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {msg}"),
            Self::ModelLoad(msg) => write!(f, "Model load error: {msg}"),
            Self::Inference(msg) => write!(f, "Inference error: {msg}"),
            Self::Image(msg) => write!(f, "Image error: {msg}"),
            Self::Video(msg) => write!(f, "Video error: {msg}"),
            Self::Io(err) => write!(f, "IO error: {err}"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::NoSource => write!(f, "No video source supplied"),
            Self::AmbiguousSource => write!(f, "Both an upload and a remote reference were supplied"),
            Self::SourceResolution(msg) => write!(f, "Source resolution error: {msg}"),
            Self::FeatureNotEnabled(msg) => write!(f, "Feature not enabled: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<image::ImageError> for PipelineError {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedInterchange(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::SourceUnreadable("clip.mp4".to_string());
        assert_eq!(err.to_string(), "Source unreadable: clip.mp4");

        let err = PipelineError::InvalidConfiguration("fps".to_string());
        assert_eq!(err.to_string(), "Invalid configuration: fps");
    }

    #[test]
    fn test_public_message_hides_details() {
        let err = PipelineError::SourceResolution("https://bucket/secret/key.mp4".to_string());
        assert!(!err.public_message().contains("bucket"));

        let err = PipelineError::SourceUnreadable("/tmp/.tmpA1b2/input.mp4".to_string());
        assert!(!err.public_message().contains("/tmp"));
    }

    #[test]
    fn test_client_errors() {
        assert!(PipelineError::NoSource.is_client_error());
        assert!(PipelineError::AmbiguousSource.is_client_error());
        assert!(!PipelineError::SourceResolution(String::new()).is_client_error());
        assert!(!PipelineError::SourceUnreadable(String::new()).is_client_error());
    }
}
