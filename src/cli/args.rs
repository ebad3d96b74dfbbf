// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{DEFAULT_DETECTION_THRESHOLD, DEFAULT_TRACKING_THRESHOLD};

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    pose-animation extract --source walk.mp4 --output walk.json
    pose-animation extract -s frames/ -o frames.json --detection-conf 0.5 --save
    pose-animation encode --input walk.json --output walk.bvh
    pose-animation encode -i walk.json -o walk.bvh --fps 24
    pose-animation convert --source walk.mp4 --output walk.bvh --landmarks walk.json
    pose-animation convert -s https://example.com/videos/walk.mp4 -o walk.bvh

Video files (.mp4, .mov, ...) need a build with `--features video` (FFmpeg).
Without it only images, image directories and globs can be read."#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract per-frame pose landmarks from a video or image sequence
    Extract(ExtractArgs),
    /// Encode a landmark file as a BVH animation
    Encode(EncodeArgs),
    /// Convert a video file or URL straight to a BVH animation
    Convert(ConvertArgs),
}

/// Pose model options shared by `extract` and `convert`.
#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    /// Path to ONNX pose model file [default: yolo11n-pose.onnx]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Minimum confidence for a new person detection
    #[arg(long, default_value_t = DEFAULT_DETECTION_THRESHOLD)]
    pub detection_conf: f32,

    /// Minimum confidence to keep tracking the same person
    #[arg(long, default_value_t = DEFAULT_TRACKING_THRESHOLD)]
    pub tracking_conf: f32,

    /// Inference image size
    #[arg(long)]
    pub imgsz: Option<usize>,

    /// Number of ONNX Runtime intra-op threads (0 = runtime default)
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
}

/// Arguments for the extract command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExtractArgs {
    /// Input source (video, image, directory or glob). Videos need the 'video' feature
    #[arg(short, long)]
    pub source: String,

    /// Output landmark JSON file
    #[arg(short, long)]
    pub output: PathBuf,

    #[command(flatten)]
    pub pose: ModelArgs,

    /// Save annotated frames to runs/pose/extract
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Save annotated video frames as individual images
    #[arg(long, default_value_t = false)]
    pub save_frames: bool,

    /// Write the bare landmark list without metadata
    #[arg(long, default_value_t = false)]
    pub legacy: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the encode command.
#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Input landmark JSON file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output BVH file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Frame rate [default: from the landmark metadata, else 30]
    #[arg(long)]
    pub fps: Option<f64>,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}

/// Arguments for the convert command.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input video path or HTTP(S) URL. Videos need the 'video' feature
    #[arg(short, long)]
    pub source: String,

    /// Output BVH file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Also write the extracted landmarks to this JSON file
    #[arg(long)]
    pub landmarks: Option<PathBuf>,

    #[command(flatten)]
    pub pose: ModelArgs,

    /// Save annotated frames to runs/pose/convert
    #[arg(long, default_value_t = false)]
    pub save: bool,

    /// Show verbose output
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,
}
