// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Landmark interchange documents.
//!
//! A landmark sequence is persisted as JSON in one of two shapes:
//!
//! ```json
//! {"metadata": {"original_width": 1280, "original_height": 720, "frame_count": 2, "fps": 30.0},
//!  "landmarks": [[{"id": 0, "x": 0.5, "y": 0.5, "z": 0.0, "visibility": 0.9}], []]}
//! ```
//!
//! or the legacy shape, which is only the `landmarks` array. Readers decide
//! which one they received by looking for a `landmarks` key.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};
use crate::landmarks::{FrameLandmarks, LandmarkSequence, SequenceMetadata};

/// Name of the key that marks the metadata-bearing shape.
const LANDMARKS_KEY: &str = "landmarks";

/// The two document shapes, kept as explicit variants.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InterchangeDocument {
    /// `{"metadata": {...}, "landmarks": [...]}`
    WithMetadata {
        /// Recording parameters.
        metadata: SequenceMetadata,
        /// Per-frame observations.
        landmarks: Vec<FrameLandmarks>,
    },
    /// A bare list of per-frame observations.
    Legacy(Vec<FrameLandmarks>),
}

#[derive(Deserialize)]
struct WithMetadataShape {
    metadata: SequenceMetadata,
    landmarks: Vec<FrameLandmarks>,
}

impl InterchangeDocument {
    /// Interpret a parsed JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedInterchange`] if the value matches
    /// neither shape or violates the sequence invariants.
    pub fn from_value(value: Value) -> Result<Self> {
        let has_landmarks_key =
            matches!(&value, Value::Object(map) if map.contains_key(LANDMARKS_KEY));

        let doc = match value {
            Value::Object(_) if has_landmarks_key => {
                let shape: WithMetadataShape = serde_json::from_value(value)?;
                Self::WithMetadata {
                    metadata: shape.metadata,
                    landmarks: shape.landmarks,
                }
            }
            Value::Array(_) => Self::Legacy(serde_json::from_value(value)?),
            Value::Object(_) => {
                return Err(PipelineError::MalformedInterchange(format!(
                    "object has no '{LANDMARKS_KEY}' key"
                )));
            }
            other => {
                return Err(PipelineError::MalformedInterchange(format!(
                    "expected an object or an array, got {}",
                    json_kind(&other)
                )));
            }
        };

        if let Self::WithMetadata {
            metadata,
            landmarks,
        } = &doc
        {
            metadata.check(landmarks.len())?;
        }

        Ok(doc)
    }

    /// Number of frames in the document.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::WithMetadata { landmarks, .. } | Self::Legacy(landmarks) => landmarks.len(),
        }
    }

    /// Whether the document has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<LandmarkSequence> for InterchangeDocument {
    fn from(seq: LandmarkSequence) -> Self {
        match seq.metadata {
            Some(metadata) => Self::WithMetadata {
                metadata,
                landmarks: seq.frames,
            },
            None => Self::Legacy(seq.frames),
        }
    }
}

impl From<InterchangeDocument> for LandmarkSequence {
    fn from(doc: InterchangeDocument) -> Self {
        match doc {
            InterchangeDocument::WithMetadata {
                metadata,
                landmarks,
            } => Self::new(metadata, landmarks),
            InterchangeDocument::Legacy(landmarks) => Self::bare(landmarks),
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a landmark sequence from JSON text.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedInterchange`] on invalid JSON or shape.
pub fn from_str(text: &str) -> Result<LandmarkSequence> {
    let value: Value = serde_json::from_str(text)?;
    InterchangeDocument::from_value(value).map(LandmarkSequence::from)
}

/// Read a landmark sequence from a reader.
///
/// # Errors
///
/// Returns [`PipelineError::MalformedInterchange`] on invalid JSON or shape.
pub fn read<R: Read>(reader: R) -> Result<LandmarkSequence> {
    let value: Value = serde_json::from_reader(reader)?;
    InterchangeDocument::from_value(value).map(LandmarkSequence::from)
}

/// Read a landmark sequence from a file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is malformed.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<LandmarkSequence> {
    let file = File::open(path.as_ref())?;
    read(BufReader::new(file))
}

/// Serialize a landmark sequence as pretty-printed JSON.
///
/// Sequences with metadata use the metadata-bearing shape; sequences without
/// use the legacy bare list.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_string(seq: &LandmarkSequence) -> Result<String> {
    let doc = InterchangeDocument::from(seq.clone());
    Ok(serde_json::to_string_pretty(&doc)?)
}

/// Write a landmark sequence to a writer.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write<W: Write>(seq: &LandmarkSequence, mut writer: W) -> Result<()> {
    let doc = InterchangeDocument::from(seq.clone());
    serde_json::to_writer_pretty(&mut writer, &doc)?;
    writer.flush()?;
    Ok(())
}

/// Write a landmark sequence to a file, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn write_file<P: AsRef<Path>>(seq: &LandmarkSequence, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write(seq, BufWriter::new(file))
}
