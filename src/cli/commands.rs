// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command implementations.

use std::path::PathBuf;
use std::time::Instant;

use crate::bvh::encode;
use crate::cli::args::{ConvertArgs, EncodeArgs, ExtractArgs, ModelArgs};
use crate::config::ExtractConfig;
use crate::download::{DEFAULT_POSE_MODEL, is_url};
use crate::error::Result;
use crate::extract::Extractor;
use crate::landmarks::LandmarkSequence;
use crate::model::OnnxPoseModel;
use crate::pipeline::{ConversionRequest, Pipeline};
use crate::skeleton::STANDARD_SKELETON;
use crate::source::{Source, SourceIterator};
use crate::{VERSION, interchange, section, success, verbose, warn};

/// Parent directory of annotated runs.
const RUNS_DIR: &str = "runs/pose";

impl ModelArgs {
    /// Build the extraction configuration from the command-line flags.
    #[must_use]
    pub fn config(&self) -> ExtractConfig {
        let mut config = ExtractConfig::new()
            .with_detection_threshold(self.detection_conf)
            .with_tracking_threshold(self.tracking_conf)
            .with_threads(self.threads);
        if let Some(sz) = self.imgsz {
            config = config.with_imgsz(sz, sz);
        }
        config
    }

    fn load_model(&self) -> Result<(OnnxPoseModel, ExtractConfig)> {
        let config = self.config();
        config.validate()?;

        let model_path = self.model.clone().unwrap_or_else(|| {
            warn!("'model' argument is missing. Using default '--model={DEFAULT_POSE_MODEL}'.");
            DEFAULT_POSE_MODEL.to_string()
        });
        let model = OnnxPoseModel::load(&model_path, &config)?;

        let (h, w) = model.imgsz();
        verbose!("pose-animation {VERSION} 🚀 Rust ONNX {model_path} imgsz=({h}, {w})");
        Ok((model, config))
    }
}

/// Create the next free run directory for annotated output.
fn annotated_dir(prefix: &str) -> Result<PathBuf> {
    let dir = crate::io::find_next_run_dir(RUNS_DIR, prefix);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn summarize(seq: &LandmarkSequence, start: Instant) {
    verbose!(
        "{} frames, {} with a detected person, {:.1} fps, {:.1}s",
        seq.len(),
        seq.detected_frames(),
        seq.frame_rate(),
        start.elapsed().as_secs_f64()
    );
}

/// Run the `extract` command.
///
/// # Errors
///
/// Returns an error if the model cannot be loaded, the source cannot be read
/// or the output cannot be written.
pub fn run_extract(args: &ExtractArgs) -> Result<()> {
    let start = Instant::now();
    let (mut model, config) = args.pose.load_model()?;

    let source = Source::from(args.source.as_str());
    #[cfg(feature = "annotate")]
    let is_video = source.is_video();
    section!("Extracting landmarks from {}", args.source);
    let frames = SourceIterator::new(source)?;

    #[cfg(feature = "annotate")]
    let mut sink = if args.save {
        Some(crate::io::AnnotatedOutput::new(
            annotated_dir("extract")?,
            is_video,
            args.save_frames,
        ))
    } else {
        None
    };
    #[cfg(not(feature = "annotate"))]
    if args.save {
        warn!("--save requires the 'annotate' feature. Compile with --features annotate to enable saving.");
    }

    #[allow(unused_mut)]
    let mut extractor = Extractor::new(&mut model, config);
    #[cfg(feature = "annotate")]
    if let Some(sink) = sink.as_mut() {
        extractor = extractor.with_sink(sink);
    }
    let mut seq = extractor.run_source(frames)?;
    summarize(&seq, start);

    if args.legacy {
        seq.metadata = None;
    }
    interchange::write_file(&seq, &args.output)?;

    #[cfg(feature = "annotate")]
    if let Some(sink) = &sink {
        verbose!("Annotated results saved to {}", sink.save_dir().display());
    }
    success!("Landmarks saved to {}", args.output.display());
    Ok(())
}

/// Run the `encode` command.
///
/// # Errors
///
/// Returns an error if the landmark file is malformed, the frame rate is
/// invalid or the animation cannot be written.
pub fn run_encode(args: &EncodeArgs) -> Result<()> {
    let seq = interchange::read_file(&args.input)?;
    let fps = args.fps.unwrap_or_else(|| seq.frame_rate());
    if seq.metadata.is_none() && args.fps.is_none() {
        warn!("{} has no metadata. Encoding at {fps} fps.", args.input.display());
    }

    let doc = encode(&seq, &STANDARD_SKELETON, fps)?;
    doc.write_to(&args.output)?;
    verbose!("{} frames, frame time {:.6}s", doc.frame_count(), doc.frame_time());
    success!("Animation saved to {}", args.output.display());
    Ok(())
}

/// Run the `convert` command.
///
/// # Errors
///
/// Returns an error if the source cannot be resolved or decoded, or any
/// output cannot be written.
pub fn run_convert(args: &ConvertArgs) -> Result<()> {
    let start = Instant::now();
    let (model, config) = args.pose.load_model()?;

    let mut request = if is_url(&args.source) {
        ConversionRequest::remote(args.source.as_str())
    } else {
        ConversionRequest::upload(&args.source)
    };
    if args.save {
        if cfg!(feature = "annotate") {
            request = request.with_annotated_dir(annotated_dir("convert")?);
        } else {
            warn!("--save requires the 'annotate' feature. Compile with --features annotate to enable saving.");
        }
    }

    section!("Converting {}", args.source);
    let output = Pipeline::new(model, config).run(&request)?;
    summarize(&output.landmarks, start);

    if let Some(path) = &args.landmarks {
        interchange::write_file(&output.landmarks, path)?;
        success!("Landmarks saved to {}", path.display());
    }
    if let Some(doc) = &output.animation {
        doc.write_to(&args.output)?;
    }
    if let Some(dir) = &request.annotated_dir {
        verbose!("Annotated results saved to {}", dir.display());
    }
    success!("Animation saved to {}", args.output.display());
    Ok(())
}
