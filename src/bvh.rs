// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! BVH animation encoding.
//!
//! Turns a [`LandmarkSequence`] into a Biovision Hierarchy document against a
//! [`SkeletonDefinition`]. Only the root translation is driven by landmarks;
//! every rotation channel is written as a literal `0`.

use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{PipelineError, Result};
use crate::landmarks::{FrameLandmarks, LandmarkSequence};
use crate::skeleton::SkeletonDefinition;

/// Indentation used per hierarchy level.
const INDENT: &str = "  ";

/// A rendered BVH document.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationDocument {
    hierarchy: String,
    frame_time: f64,
    motion: Vec<String>,
}

impl AnimationDocument {
    /// Number of motion frames.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.motion.len()
    }

    /// Seconds per frame.
    #[must_use]
    pub const fn frame_time(&self) -> f64 {
        self.frame_time
    }

    /// The `HIERARCHY` section, including its trailing newline.
    #[must_use]
    pub fn hierarchy(&self) -> &str {
        &self.hierarchy
    }

    /// The per-frame channel value lines, without line terminators.
    #[must_use]
    pub fn motion_lines(&self) -> &[String] {
        &self.motion
    }

    /// Render the full document.
    #[must_use]
    pub fn to_bvh_string(&self) -> String {
        self.to_string()
    }

    /// Write the document to a file, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        write!(writer, "{self}")?;
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for AnimationDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hierarchy)?;
        writeln!(f, "MOTION")?;
        writeln!(f, "Frames: {}", self.motion.len())?;
        writeln!(f, "Frame Time: {:.6}", self.frame_time)?;
        for line in &self.motion {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Encode a landmark sequence as a BVH animation.
///
/// # Arguments
///
/// * `sequence` - Landmarks to encode; frames without a detection keep the
///   root at the origin.
/// * `skeleton` - Joint hierarchy to write.
/// * `frame_rate` - Frames per second used for the `Frame Time` header.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfiguration`] if the skeleton is invalid
/// or `frame_rate` is not a positive finite number.
pub fn encode(
    sequence: &LandmarkSequence,
    skeleton: &SkeletonDefinition,
    frame_rate: f64,
) -> Result<AnimationDocument> {
    skeleton.validate()?;
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return Err(PipelineError::InvalidConfiguration(format!(
            "frame rate must be positive, got {frame_rate}"
        )));
    }

    let hierarchy = write_hierarchy(skeleton);
    let order = skeleton.traversal_order();
    let motion = sequence
        .frames
        .iter()
        .map(|frame| motion_line(frame, skeleton, &order))
        .collect();

    Ok(AnimationDocument {
        hierarchy,
        frame_time: 1.0 / frame_rate,
        motion,
    })
}

/// Encode using the sequence's own frame rate.
///
/// # Errors
///
/// See [`encode`].
pub fn encode_sequence(
    sequence: &LandmarkSequence,
    skeleton: &SkeletonDefinition,
) -> Result<AnimationDocument> {
    encode(sequence, skeleton, sequence.frame_rate())
}

fn write_hierarchy(skeleton: &SkeletonDefinition) -> String {
    let mut out = String::from("HIERARCHY\n");
    write_joint(&mut out, skeleton, 0, 0);
    out
}

fn write_joint(out: &mut String, skeleton: &SkeletonDefinition, index: usize, depth: usize) {
    let joint = &skeleton.joints[index];
    let pad = INDENT.repeat(depth);
    let inner = INDENT.repeat(depth + 1);
    let keyword = if joint.parent.is_none() { "ROOT" } else { "JOINT" };
    let [x, y, z] = joint.offset;

    // Writing into a String cannot fail.
    let _ = writeln!(out, "{pad}{keyword} {}", joint.name);
    let _ = writeln!(out, "{pad}{{");
    // Root offset in fixed point, joint offsets in shortest form.
    if joint.parent.is_none() {
        let _ = writeln!(out, "{inner}OFFSET {x:.2} {y:.2} {z:.2}");
    } else {
        let _ = writeln!(out, "{inner}OFFSET {x} {y} {z}");
    }
    let _ = write!(out, "{inner}CHANNELS {}", joint.channels.len());
    for channel in joint.channels {
        let _ = write!(out, " {channel}");
    }
    out.push('\n');

    let children: Vec<usize> = skeleton.children(index).collect();
    for child in children {
        write_joint(out, skeleton, child, depth + 1);
    }
    let _ = writeln!(out, "{pad}}}");
}

fn motion_line(frame: &FrameLandmarks, skeleton: &SkeletonDefinition, order: &[usize]) -> String {
    let translation = frame.get(skeleton.root_landmark).map_or([0.0; 3], |obs| {
        [
            obs.x * skeleton.translation_scale,
            obs.y * skeleton.translation_scale,
            obs.z * skeleton.translation_scale,
        ]
    });

    let mut values = Vec::with_capacity(skeleton.channel_count());
    for &index in order {
        for channel in skeleton.joints[index].channels {
            if channel.is_position() {
                values.push(format!("{:.2}", translation[channel.axis()]));
            } else {
                values.push("0".to_string());
            }
        }
    }
    values.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::{JointObservation, SequenceMetadata};
    use crate::skeleton::STANDARD_SKELETON;

    fn hip_frame(x: f64, y: f64, z: f64) -> FrameLandmarks {
        FrameLandmarks::new(vec![
            JointObservation::new(0, x, y, z, 0.99),
            JointObservation::new(11, 0.9, 0.9, 0.9, 0.5),
        ])
        .unwrap()
    }

    fn scenario() -> LandmarkSequence {
        LandmarkSequence::bare(vec![
            hip_frame(0.5, 0.5, 0.0),
            FrameLandmarks::empty(),
            hip_frame(0.2, 0.3, 0.1),
        ])
    }

    #[test]
    fn test_scenario_motion() {
        let doc = encode(&scenario(), &STANDARD_SKELETON, 30.0).unwrap();
        let text = doc.to_bvh_string();
        assert!(text.contains("Frames: 3\n"));
        assert!(text.contains("Frame Time: 0.033333\n"));

        let zeros = vec!["0"; 30].join(" ");
        let lines = doc.motion_lines();
        assert_eq!(lines[0], format!("50.00 50.00 0.00 {zeros}"));
        assert_eq!(lines[1], format!("0.00 0.00 0.00 {zeros}"));
        assert_eq!(lines[2], format!("20.00 30.00 10.00 {zeros}"));
    }

    #[test]
    fn test_missing_root_landmark_stays_at_origin() {
        let frame = FrameLandmarks::new(vec![JointObservation::new(11, 0.4, 0.4, 0.1, 0.9)]).unwrap();
        let seq = LandmarkSequence::bare(vec![frame, hip_frame(0.1, 0.2, 0.3)]);
        let doc = encode(&seq, &STANDARD_SKELETON, 30.0).unwrap();

        let zeros = vec!["0"; 30].join(" ");
        assert_eq!(doc.motion_lines()[0], format!("0.00 0.00 0.00 {zeros}"));
        assert_eq!(doc.motion_lines()[1], format!("10.00 20.00 30.00 {zeros}"));
    }

    #[test]
    fn test_every_line_has_channel_count_values() {
        let doc = encode(&scenario(), &STANDARD_SKELETON, 24.0).unwrap();
        for line in doc.motion_lines() {
            assert_eq!(line.split(' ').count(), STANDARD_SKELETON.channel_count());
        }
        assert_eq!(doc.frame_count(), 3);
    }

    #[test]
    fn test_hierarchy_layout() {
        let doc = encode(&LandmarkSequence::default(), &STANDARD_SKELETON, 30.0).unwrap();
        let hierarchy = doc.hierarchy();
        assert!(hierarchy.starts_with("HIERARCHY\nROOT Hips\n{\n  OFFSET 0.00 0.00 0.00\n"));
        assert!(hierarchy.contains(
            "  CHANNELS 6 Xposition Yposition Zposition Zrotation Xrotation Yrotation\n"
        ));
        assert!(hierarchy.contains("  JOINT Spine\n  {\n    OFFSET 0 10 0\n"));
        assert!(hierarchy.contains("      JOINT Head\n"));
        assert!(hierarchy.contains("    JOINT LeftUpperLeg\n    {\n      OFFSET -5 -10 0\n"));
        assert!(hierarchy.contains("      JOINT LeftLowerArm\n      {\n        OFFSET -10 0 0\n"));
        assert!(!hierarchy.contains("10.00"));
        assert_eq!(hierarchy.matches('{').count(), 10);
        assert_eq!(hierarchy.matches('}').count(), 10);
        assert!(hierarchy.ends_with("}\n"));
    }

    #[test]
    fn test_zero_frames() {
        let doc = encode(&LandmarkSequence::default(), &STANDARD_SKELETON, 30.0).unwrap();
        let text = doc.to_string();
        assert!(text.ends_with("MOTION\nFrames: 0\nFrame Time: 0.033333\n"));
    }

    #[test]
    fn test_invalid_frame_rate() {
        for fps in [0.0, -30.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                encode(&scenario(), &STANDARD_SKELETON, fps),
                Err(PipelineError::InvalidConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_deterministic() {
        let a = encode(&scenario(), &STANDARD_SKELETON, 30.0).unwrap();
        let b = encode(&scenario(), &STANDARD_SKELETON, 30.0).unwrap();
        assert_eq!(a.to_bvh_string(), b.to_bvh_string());
    }

    #[test]
    fn test_encode_sequence_uses_metadata_fps() {
        let seq = LandmarkSequence::new(
            SequenceMetadata {
                original_width: 640,
                original_height: 480,
                frame_count: 1,
                fps: 25.0,
            },
            vec![FrameLandmarks::empty()],
        );
        let doc = encode_sequence(&seq, &STANDARD_SKELETON).unwrap();
        assert!(doc.to_string().contains("Frame Time: 0.040000\n"));
    }

    #[test]
    fn test_write_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.bvh");
        let doc = encode(&scenario(), &STANDARD_SKELETON, 30.0).unwrap();
        doc.write_to(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), doc.to_bvh_string());
    }
}
