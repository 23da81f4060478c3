//! rollcall-core: Face detection, recognition and gallery search.
//!
//! Uses SCRFD for face detection and ArcFace for face embeddings, both running
//! via ONNX Runtime on the CPU, and matches embeddings against a directory of
//! reference images.

pub mod alignment;
pub mod analyzer;
pub mod detector;
pub mod gallery;
pub mod recognizer;
pub mod types;

use std::path::PathBuf;

pub use analyzer::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer, DEFAULT_SIMILARITY_THRESHOLD};
pub use detector::{DetectorError, FaceDetector, SCRFD_CONFIDENCE_THRESHOLD};
pub use gallery::{has_image_extension, Gallery, GalleryError, IMAGE_EXTENSIONS};
pub use recognizer::{FaceRecognizer, RecognizerError};
pub use types::{BoundingBox, CosineMatcher, Embedding, GalleryEntry, IdentityMatch, MatchResult, Matcher};

/// File name of the SCRFD detection model inside the model directory.
pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
/// File name of the ArcFace recognition model inside the model directory.
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default model directory: `$XDG_DATA_HOME/rollcall/models`, else `~/.local/share/rollcall/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
        .join("models")
}
