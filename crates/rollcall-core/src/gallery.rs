//! Reference gallery: a directory of known face images indexed into embeddings.
//!
//! Every `.jpg`/`.jpeg`/`.png` file below the root is one identity; its path is
//! the identity string. The most confident face in each file is embedded.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::GalleryEntry;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

/// File extensions accepted as face images, for both gallery files and uploads.
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("gallery directory does not exist: {0}")]
    NotFound(PathBuf),
    #[error("gallery path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("no face images found in gallery {0}")]
    Empty(PathBuf),
    #[error("walking gallery: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Snapshot of the gallery listing used to decide when an index is stale.
pub type Fingerprint = Vec<(PathBuf, Option<SystemTime>)>;

/// Whether a path ends in one of [`IMAGE_EXTENSIONS`], case-insensitively.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Sorted list of image files below `root`, recursing into subdirectories.
pub fn image_paths(root: &Path) -> Result<Vec<PathBuf>, GalleryError> {
    if !root.exists() {
        return Err(GalleryError::NotFound(root.to_path_buf()));
    }
    if !root.is_dir() {
        return Err(GalleryError::NotADirectory(root.to_path_buf()));
    }

    let mut paths = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if entry.file_type().is_file() && has_image_extension(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Listing plus modification times of every gallery image.
pub fn fingerprint(root: &Path) -> Result<Fingerprint, GalleryError> {
    Ok(image_paths(root)?
        .into_iter()
        .map(|p| {
            let modified = std::fs::metadata(&p).and_then(|m| m.modified()).ok();
            (p, modified)
        })
        .collect())
}

/// An indexed gallery directory.
pub struct Gallery {
    entries: Vec<GalleryEntry>,
    fingerprint: Fingerprint,
}

impl Gallery {
    /// Embed every image listed in `fingerprint`.
    ///
    /// Unreadable files and files without a detectable face are skipped with a
    /// warning; model failures abort the build.
    pub fn build(
        root: &Path,
        fingerprint: Fingerprint,
        detector: &mut FaceDetector,
        recognizer: &mut FaceRecognizer,
    ) -> Result<Self, GalleryError> {
        if fingerprint.is_empty() {
            return Err(GalleryError::Empty(root.to_path_buf()));
        }

        let mut entries = Vec::with_capacity(fingerprint.len());
        for (path, _) in &fingerprint {
            let image = match image::open(path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable gallery image");
                    continue;
                }
            };

            let faces = detector.detect(&image)?;
            let Some(face) = faces.first() else {
                tracing::warn!(path = %path.display(), "no face in gallery image; skipping");
                continue;
            };

            let embedding = recognizer.extract(&image, face)?;
            entries.push(GalleryEntry {
                identity: path.to_string_lossy().into_owned(),
                embedding,
            });
        }

        tracing::info!(
            root = %root.display(),
            files = fingerprint.len(),
            indexed = entries.len(),
            "gallery indexed"
        );

        Ok(Self {
            entries,
            fingerprint,
        })
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}
