// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! ONNX pose model.
//!
//! [`OnnxPoseModel`] wraps an ONNX Runtime session running a YOLO pose network
//! and implements [`PoseModel`] on top of it: letterbox, run, decode, then
//! follow one person from frame to frame.

use std::path::Path;

use image::DynamicImage;
#[cfg(feature = "coreml")]
use ort::execution_providers::CoreMLExecutionProvider;
#[cfg(feature = "cuda")]
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;
use ort::value::TensorRef;

use crate::config::ExtractConfig;
use crate::download::try_download_model;
use crate::error::{PipelineError, Result};
use crate::landmarks::JointObservation;
use crate::pose::{COCO_CONNECTIONS, PoseModel, Thresholds};
use crate::postprocessing::{PoseCandidate, decode_pose, select_pose};
use crate::preprocessing::preprocess_image;
use crate::utils::normalize;
use crate::verbose;

/// YOLO pose model running on ONNX Runtime.
///
/// # Example
///
/// ```no_run
/// use pose_animation::{ExtractConfig, OnnxPoseModel};
///
/// let model = OnnxPoseModel::load("yolo11n-pose.onnx", &ExtractConfig::default())?;
/// # Ok::<(), pose_animation::PipelineError>(())
/// ```
pub struct OnnxPoseModel {
    session: Session,
    input_name: String,
    output_name: String,
    imgsz: (usize, usize),
    /// Box of the person followed in the previous frame.
    last_box: Option<[f32; 4]>,
}

impl OnnxPoseModel {
    /// Load a pose model from an ONNX file.
    ///
    /// The default `yolo11n-pose.onnx` is downloaded when missing.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the ONNX model file.
    /// * `config` - Input size and thread settings.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ModelLoad`] if the file doesn't exist and
    /// can't be downloaded, or ONNX Runtime rejects it.
    pub fn load<P: AsRef<Path>>(path: P, config: &ExtractConfig) -> Result<Self> {
        let mut path = path.as_ref().to_path_buf();
        if !path.exists() {
            path = try_download_model(&path)?;
        }

        #[allow(unused_mut)]
        let mut builder = Session::builder()
            .map_err(|e| PipelineError::ModelLoad(format!("failed to create session builder: {e}")))?;

        #[cfg(feature = "cuda")]
        {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default().build()])
                .map_err(|e| PipelineError::ModelLoad(format!("failed to register CUDA EP: {e}")))?;
        }

        #[cfg(feature = "coreml")]
        {
            builder = builder
                .with_execution_providers([CoreMLExecutionProvider::default()
                    .with_subgraphs(true)
                    .build()])
                .map_err(|e| PipelineError::ModelLoad(format!("failed to register CoreML EP: {e}")))?;
        }

        let session = builder
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| PipelineError::ModelLoad(format!("failed to set optimization level: {e}")))?
            .with_intra_threads(config.num_threads)
            .map_err(|e| PipelineError::ModelLoad(format!("failed to set intra-thread count: {e}")))?
            .commit_from_file(&path)
            .map_err(|e| PipelineError::ModelLoad(format!("failed to load model: {e}")))?;

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| PipelineError::ModelLoad("model has no outputs".to_string()))?;

        verbose!("Loaded pose model {} (input '{input_name}')", path.display());

        Ok(Self {
            session,
            input_name,
            output_name,
            imgsz: config.input_size(),
            last_box: None,
        })
    }

    /// Model input size as (height, width).
    #[must_use]
    pub const fn imgsz(&self) -> (usize, usize) {
        self.imgsz
    }

    /// Run the network and return the flat output with its shape.
    fn run_inference(&mut self, input: &ndarray::Array4<f32>) -> Result<(Vec<f32>, Vec<usize>)> {
        let input = input.as_standard_layout();
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| PipelineError::Inference(format!("failed to create input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| PipelineError::Inference(format!("inference failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            PipelineError::Inference(format!("output '{}' not found", self.output_name))
        })?;
        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| PipelineError::Inference(format!("failed to extract output: {e}")))?;

        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((data.to_vec(), shape))
    }
}

/// Convert a selected candidate into normalized landmark observations.
#[must_use]
pub fn candidate_to_landmarks(candidate: &PoseCandidate, orig_shape: (u32, u32)) -> Vec<JointObservation> {
    let (h, w) = orig_shape;
    candidate
        .keypoints
        .iter()
        .zip(0_u32..)
        .map(|(&[x, y, conf], id)| {
            JointObservation::new(id, normalize(x, w), normalize(y, h), 0.0, f64::from(conf))
        })
        .collect()
}

impl PoseModel for OnnxPoseModel {
    fn detect(
        &mut self,
        frame: &DynamicImage,
        thresholds: &Thresholds,
    ) -> Result<Option<Vec<JointObservation>>> {
        let pre = preprocess_image(frame, self.imgsz)?;
        let (output, shape) = self.run_inference(&pre.tensor)?;

        let floor = thresholds.detection.min(thresholds.tracking);
        let candidates = decode_pose(&output, &shape, &pre, floor);

        match select_pose(candidates, self.last_box.as_ref(), thresholds) {
            Some(person) => {
                self.last_box = Some(person.bbox);
                Ok(Some(candidate_to_landmarks(&person, pre.orig_shape)))
            }
            None => {
                self.last_box = None;
                Ok(None)
            }
        }
    }

    fn connections(&self) -> &[[u32; 2]] {
        &COCO_CONNECTIONS
    }

    fn reset(&mut self) {
        self.last_box = None;
    }
}

impl std::fmt::Debug for OnnxPoseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxPoseModel")
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("imgsz", &self.imgsz)
            .field("tracking", &self.last_box.is_some())
            .finish_non_exhaustive()
    }
}
