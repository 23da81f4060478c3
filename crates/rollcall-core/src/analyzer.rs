//! The face analysis seam used by the attendance pipeline.
//!
//! [`FaceAnalyzer`] has two independent entry points: `detect` locates faces,
//! `find` searches an image's faces against a gallery directory. Both tolerate
//! images without faces. [`OnnxAnalyzer`] implements them with SCRFD + ArcFace.

use crate::detector::{DetectorError, FaceDetector};
use crate::gallery::{self, Gallery, GalleryError};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::{BoundingBox, CosineMatcher, GalleryEntry, IdentityMatch, Matcher};
use image::RgbImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Cosine similarity needed for a gallery match.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.40;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("gallery error: {0}")]
    Gallery(#[from] GalleryError),
}

/// Face detection and gallery search over decoded images.
pub trait FaceAnalyzer {
    /// Locate faces. An image without faces yields an empty list.
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError>;

    /// Search the faces in `image` against the gallery at `gallery`.
    ///
    /// Returns one row per face that matched, in detection order.
    fn find(&mut self, image: &RgbImage, gallery: &Path) -> Result<Vec<IdentityMatch>, AnalyzerError>;
}

/// SCRFD + ArcFace analyzer with an in-process gallery index cache.
pub struct OnnxAnalyzer {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
    matcher: CosineMatcher,
    threshold: f32,
    galleries: HashMap<PathBuf, Gallery>,
}

impl OnnxAnalyzer {
    pub fn new(detector: FaceDetector, recognizer: FaceRecognizer, threshold: f32) -> Self {
        Self {
            detector,
            recognizer,
            matcher: CosineMatcher,
            threshold,
            galleries: HashMap::new(),
        }
    }

    /// Load both models from their ONNX files.
    pub fn load(
        scrfd_path: &str,
        arcface_path: &str,
        detection_threshold: f32,
        similarity_threshold: f32,
    ) -> Result<Self, AnalyzerError> {
        let detector = FaceDetector::load(scrfd_path)?.with_confidence_threshold(detection_threshold);
        let recognizer = FaceRecognizer::load(arcface_path)?;
        Ok(Self::new(detector, recognizer, similarity_threshold))
    }

    /// Index `root` if it was never indexed or its listing changed since.
    fn refresh_gallery(&mut self, root: &Path) -> Result<(), AnalyzerError> {
        let fingerprint = gallery::fingerprint(root)?;
        let fresh = self
            .galleries
            .get(root)
            .is_some_and(|g| g.fingerprint() == &fingerprint);

        if !fresh {
            tracing::info!(root = %root.display(), "indexing gallery");
            let built = Gallery::build(root, fingerprint, &mut self.detector, &mut self.recognizer)?;
            self.galleries.insert(root.to_path_buf(), built);
        }
        Ok(())
    }

    /// Indexed entries of the gallery at `root`.
    pub fn gallery_entries(&mut self, root: &Path) -> Result<&[GalleryEntry], AnalyzerError> {
        self.refresh_gallery(root)?;
        Ok(self.galleries.get(root).map(Gallery::entries).unwrap_or_default())
    }
}

impl FaceAnalyzer for OnnxAnalyzer {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
        Ok(self.detector.detect(image)?)
    }

    fn find(&mut self, image: &RgbImage, gallery: &Path) -> Result<Vec<IdentityMatch>, AnalyzerError> {
        self.refresh_gallery(gallery)?;

        let faces = self.detector.detect(image)?;
        let mut probes = Vec::with_capacity(faces.len());
        for face in faces {
            if face.landmarks.is_none() {
                tracing::debug!(x = face.x, y = face.y, "face without landmarks; not searchable");
                continue;
            }
            let embedding = self.recognizer.extract(image, &face)?;
            probes.push((face, embedding));
        }

        let entries = self.galleries.get(gallery).map(Gallery::entries).unwrap_or_default();
        let matches: Vec<IdentityMatch> = probes
            .into_iter()
            .filter_map(|(face, embedding)| {
                let result = self.matcher.compare(&embedding, entries, self.threshold);
                tracing::debug!(matched = result.matched, similarity = result.similarity, "gallery comparison");
                result.identity.map(|identity| IdentityMatch {
                    identity,
                    similarity: result.similarity,
                    face: Some(face),
                })
            })
            .collect();

        Ok(matches)
    }
}
