// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! End-to-end tests: frames through a scripted pose model, landmarks through
//! the interchange format, and landmarks into BVH.

use std::collections::VecDeque;
use std::fs;

use image::{DynamicImage, RgbImage};
use pose_animation::{
    CancelToken, ConversionRequest, ExtractConfig, Extractor, FrameLandmarks, JointObservation,
    LandmarkSequence, Pipeline, PipelineError, PoseModel, Result, STANDARD_SKELETON, Source,
    SourceIterator, Thresholds, encode, interchange,
};

/// Replays a fixed script of detections, one entry per frame.
struct ScriptedModel {
    script: VecDeque<Option<Vec<JointObservation>>>,
    cancel_after: Option<(usize, CancelToken)>,
    calls: usize,
}

impl ScriptedModel {
    fn new(script: Vec<Option<Vec<JointObservation>>>) -> Self {
        Self {
            script: script.into(),
            cancel_after: None,
            calls: 0,
        }
    }
}

impl PoseModel for ScriptedModel {
    fn detect(
        &mut self,
        _frame: &DynamicImage,
        _thresholds: &Thresholds,
    ) -> Result<Option<Vec<JointObservation>>> {
        self.calls += 1;
        if let Some((n, token)) = &self.cancel_after
            && self.calls >= *n
        {
            token.cancel();
        }
        Ok(self.script.pop_front().flatten())
    }
}

fn root(x: f64, y: f64, z: f64) -> Option<Vec<JointObservation>> {
    Some(vec![JointObservation::new(0, x, y, z, 0.99)])
}

fn blank_frames(n: usize) -> Vec<DynamicImage> {
    (0..n)
        .map(|_| DynamicImage::ImageRgb8(RgbImage::new(64, 48)))
        .collect()
}

fn rotation_zeros() -> String {
    vec!["0"; 30].join(" ")
}

#[test]
fn test_video_to_animation_scenario() {
    let mut model = ScriptedModel::new(vec![root(0.5, 0.5, 0.0), None, root(0.2, 0.3, 0.1)]);
    let frames = SourceIterator::new(Source::from(blank_frames(3))).unwrap();
    let seq = Extractor::new(&mut model, ExtractConfig::default())
        .run(frames)
        .unwrap();

    assert_eq!(seq.len(), 3);
    assert!(seq.frames[1].is_empty());
    let meta = seq.metadata.unwrap();
    assert_eq!((meta.original_width, meta.original_height), (64, 48));
    assert_eq!(meta.frame_count, 3);

    let doc = encode(&seq, &STANDARD_SKELETON, 30.0).unwrap();
    let text = doc.to_bvh_string();
    assert!(text.starts_with("HIERARCHY\nROOT Hips\n"));
    assert!(text.contains("MOTION\nFrames: 3\nFrame Time: 0.033333\n"));

    let zeros = rotation_zeros();
    let lines = doc.motion_lines();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], format!("50.00 50.00 0.00 {zeros}"));
    assert_eq!(lines[1], format!("0.00 0.00 0.00 {zeros}"));
    assert_eq!(lines[2], format!("20.00 30.00 10.00 {zeros}"));
    for line in lines {
        assert_eq!(line.split(' ').count(), STANDARD_SKELETON.channel_count());
    }
}

#[test]
fn test_frame_count_independent_of_detections() {
    let script = vec![None, None, root(0.1, 0.1, 0.0), None, None];
    let mut model = ScriptedModel::new(script);
    let seq = Extractor::new(&mut model, ExtractConfig::default())
        .run(SourceIterator::new(Source::from(blank_frames(5))).unwrap())
        .unwrap();
    assert_eq!(seq.len(), 5);
    assert_eq!(seq.detected_frames(), 1);
    assert_eq!(model.calls, 5);

    let doc = encode(&seq, &STANDARD_SKELETON, seq.frame_rate()).unwrap();
    assert_eq!(doc.frame_count(), 5);
    assert!(doc.to_bvh_string().contains("Frames: 5\n"));
}

#[test]
fn test_interchange_file_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let mut model = ScriptedModel::new(vec![root(0.5, 0.4, -0.2), None]);
    let seq = Extractor::new(&mut model, ExtractConfig::default())
        .run(SourceIterator::new(Source::from(blank_frames(2))).unwrap())
        .unwrap();

    let with_meta = tmp.path().join("walk.json");
    interchange::write_file(&seq, &with_meta).unwrap();
    assert_eq!(interchange::read_file(&with_meta).unwrap(), seq);

    let legacy = LandmarkSequence::bare(seq.frames.clone());
    let legacy_path = tmp.path().join("legacy.json");
    interchange::write_file(&legacy, &legacy_path).unwrap();
    let text = fs::read_to_string(&legacy_path).unwrap();
    assert!(text.trim_start().starts_with('['));
    assert_eq!(interchange::read_file(&legacy_path).unwrap(), legacy);

    // Both shapes encode to the same animation at the same frame rate.
    let a = encode(&seq, &STANDARD_SKELETON, 30.0).unwrap();
    let b = encode(&legacy, &STANDARD_SKELETON, 30.0).unwrap();
    assert_eq!(a.to_bvh_string(), b.to_bvh_string());
}

#[test]
fn test_encoding_is_deterministic() {
    let frames = vec![
        FrameLandmarks::new(vec![JointObservation::new(0, 0.123_456, 0.5, 0.001, 1.0)]).unwrap(),
        FrameLandmarks::empty(),
    ];
    let seq = LandmarkSequence::bare(frames);
    let first = encode(&seq, &STANDARD_SKELETON, 25.0).unwrap().to_bvh_string();
    let second = encode(&seq, &STANDARD_SKELETON, 25.0).unwrap().to_bvh_string();
    assert_eq!(first, second);
    assert!(first.contains("Frame Time: 0.040000\n"));
}

#[test]
fn test_unreadable_source() {
    let tmp = tempfile::tempdir().unwrap();
    let missing = tmp.path().join("missing.png");
    assert!(matches!(
        SourceIterator::new(Source::from(missing.as_path())),
        Err(PipelineError::SourceUnreadable(_))
    ));

    let corrupt = tmp.path().join("corrupt.png");
    fs::write(&corrupt, b"\x89PNG garbage").unwrap();
    let frames = SourceIterator::new(Source::from(corrupt.as_path())).unwrap();
    let result = Extractor::new(ScriptedModel::new(vec![]), ExtractConfig::default()).run(frames);
    assert!(matches!(result, Err(PipelineError::SourceUnreadable(_))));
}

#[test]
fn test_empty_source_gives_empty_animation() {
    let tmp = tempfile::tempdir().unwrap();
    let empty_dir = tmp.path().join("frames");
    fs::create_dir(&empty_dir).unwrap();

    let mut model = ScriptedModel::new(vec![]);
    let frames = SourceIterator::new(Source::from(empty_dir.as_path())).unwrap();
    let seq = Extractor::new(&mut model, ExtractConfig::default())
        .run_source(frames)
        .unwrap();
    assert!(seq.is_empty());
    assert_eq!(model.calls, 0);
    assert_eq!(seq.metadata.as_ref().map(|m| m.frame_count), Some(0));

    let path = tmp.path().join("empty.json");
    interchange::write_file(&seq, &path).unwrap();
    assert_eq!(interchange::read_file(&path).unwrap(), seq);

    let text = encode(&seq, &STANDARD_SKELETON, seq.frame_rate())
        .unwrap()
        .to_bvh_string();
    assert!(text.ends_with("MOTION\nFrames: 0\nFrame Time: 0.033333\n"));
}

#[test]
fn test_image_directory_in_name_order() {
    let tmp = tempfile::tempdir().unwrap();
    for (name, width) in [("002.png", 20), ("001.png", 10), ("003.png", 30)] {
        RgbImage::new(width, 8).save(tmp.path().join(name)).unwrap();
    }

    let frames = SourceIterator::new(Source::from(tmp.path())).unwrap();
    let seq = Extractor::new(ScriptedModel::new(vec![]), ExtractConfig::default())
        .run(frames)
        .unwrap();
    assert_eq!(seq.len(), 3);
    // Dimensions come from the first frame in name order.
    assert_eq!(seq.metadata.unwrap().original_width, 10);
}

#[test]
fn test_cancellation_between_frames() {
    let token = CancelToken::new();
    let mut model = ScriptedModel::new(vec![root(0.5, 0.5, 0.0); 10]);
    model.cancel_after = Some((2, token.clone()));

    let result = Extractor::new(&mut model, ExtractConfig::default())
        .with_cancel(token)
        .run(SourceIterator::new(Source::from(blank_frames(10))).unwrap());
    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert_eq!(model.calls, 2);
}

#[test]
fn test_invalid_frame_rate_rejected() {
    let seq = LandmarkSequence::bare(vec![FrameLandmarks::empty()]);
    for fps in [0.0, -24.0, f64::NAN, f64::INFINITY] {
        let err = encode(&seq, &STANDARD_SKELETON, fps).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
        assert!(err.is_client_error());
    }
}

#[test]
fn test_pipeline_request_validation() {
    let tmp = tempfile::tempdir().unwrap();
    let mut pipeline = Pipeline::new(ScriptedModel::new(vec![]), ExtractConfig::default())
        .with_staging_root(tmp.path());

    let err = pipeline.run(&ConversionRequest::default()).unwrap_err();
    assert!(matches!(err, PipelineError::NoSource));

    let both = ConversionRequest {
        remote: Some("https://example.com/walk.mp4".to_string()),
        ..ConversionRequest::upload(tmp.path().join("walk.mp4"))
    };
    let err = pipeline.run(&both).unwrap_err();
    assert!(matches!(err, PipelineError::AmbiguousSource));
    assert!(err.is_client_error());

    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_pipeline_converts_upload() {
    let tmp = tempfile::tempdir().unwrap();
    let upload = tmp.path().join("pose.png");
    RgbImage::new(32, 32).save(&upload).unwrap();
    let staging = tmp.path().join("staging");
    fs::create_dir(&staging).unwrap();

    let mut pipeline = Pipeline::new(
        ScriptedModel::new(vec![root(0.25, 0.75, 0.0)]),
        ExtractConfig::default(),
    )
    .with_staging_root(&staging);
    let output = pipeline.run(&ConversionRequest::upload(&upload)).unwrap();

    assert_eq!(output.landmarks.len(), 1);
    let doc = output.animation.unwrap();
    assert!(doc.motion_lines()[0].starts_with("25.00 75.00 0.00 "));
    assert_eq!(fs::read_dir(&staging).unwrap().count(), 0);
}
