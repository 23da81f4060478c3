//! Batch processing: decode, detect, match and annotate every upload in turn.
//!
//! Each upload is processed on its own. A failure while decoding or analysing
//! an image drops that image from every aggregate and processing moves on to
//! the next one. An annotation failure only loses the annotated copy.

use crate::labels::pair_labels;
use crate::roster::AttendanceRecord;
use crate::summary::RunSummary;
use image::RgbImage;
use rollcall_core::{AnalyzerError, FaceAnalyzer};
use rollcall_imaging::{decode_upload, AnnotateError, Annotator, DecodeError};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// One uploaded photo.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Annotated copy of an upload.
#[derive(Debug, Clone)]
pub struct AnnotatedImage {
    pub file_name: String,
    pub image: RgbImage,
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("decoding image: {0}")]
    Decode(#[from] DecodeError),
    #[error("detecting faces: {0}")]
    Detect(#[source] AnalyzerError),
    #[error("searching gallery: {0}")]
    Match(#[source] AnalyzerError),
    #[error("drawing boxes: {0}")]
    Annotate(#[from] AnnotateError),
}

/// Pipeline step an image failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Decode,
    Detect,
    Match,
    Annotate,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureStage::Decode => "decode",
            FailureStage::Detect => "detect",
            FailureStage::Match => "match",
            FailureStage::Annotate => "annotate",
        })
    }
}

impl BatchError {
    pub fn stage(&self) -> FailureStage {
        match self {
            BatchError::Decode(_) => FailureStage::Decode,
            BatchError::Detect(_) => FailureStage::Detect,
            BatchError::Match(_) => FailureStage::Match,
            BatchError::Annotate(_) => FailureStage::Annotate,
        }
    }
}

/// A reported per-image failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFailure {
    #[serde(rename = "file")]
    pub file_name: String,
    pub stage: FailureStage,
    pub message: String,
}

impl fmt::Display for ImageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error processing image {}: {}", self.file_name, self.message)
    }
}

/// Everything one batch run produces.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Recognized gallery identities across the batch, in the order they were found.
    pub identities: Vec<String>,
    pub summary: RunSummary,
    pub annotated: Vec<AnnotatedImage>,
    pub failures: Vec<ImageFailure>,
}

impl BatchOutcome {
    pub fn roster(&self) -> AttendanceRecord {
        AttendanceRecord::from_identities(&self.identities)
    }
}

/// Runs uploads through a [`FaceAnalyzer`] and an [`Annotator`].
pub struct BatchProcessor<'a, A: FaceAnalyzer + ?Sized> {
    analyzer: &'a mut A,
    annotator: &'a Annotator,
}

impl<'a, A: FaceAnalyzer + ?Sized> BatchProcessor<'a, A> {
    pub fn new(analyzer: &'a mut A, annotator: &'a Annotator) -> Self {
        Self { analyzer, annotator }
    }

    /// Process every upload against the gallery at `gallery`, sequentially.
    pub fn process(&mut self, uploads: &[Upload], gallery: &Path) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        for upload in uploads {
            let span = tracing::info_span!("image", file = %upload.file_name);
            let _guard = span.enter();

            if let Err(err) = self.process_one(upload, gallery, &mut outcome) {
                tracing::warn!(stage = %err.stage(), error = %err, "image failed");
                outcome.failures.push(ImageFailure {
                    file_name: upload.file_name.clone(),
                    stage: err.stage(),
                    message: err.to_string(),
                });
            }
        }

        tracing::info!(
            images = uploads.len(),
            failed = outcome.failures.len(),
            total_faces = outcome.summary.total_faces,
            recognized = outcome.summary.recognized(),
            unknown = outcome.summary.unknown_faces,
            "batch finished"
        );

        outcome
    }

    fn process_one(
        &mut self,
        upload: &Upload,
        gallery: &Path,
        outcome: &mut BatchOutcome,
    ) -> Result<(), BatchError> {
        let image = decode_upload(&upload.bytes)?;

        let faces = self.analyzer.detect(&image).map_err(BatchError::Detect)?;
        let matches = self.analyzer.find(&image, gallery).map_err(BatchError::Match)?;

        let surplus = outcome.summary.record_image(faces.len(), matches.len());
        if surplus > 0 {
            tracing::warn!(
                faces = faces.len(),
                matches = matches.len(),
                "gallery returned more matches than detected faces; unknown count clamped"
            );
        }
        outcome
            .identities
            .extend(matches.iter().map(|m| m.identity.clone()));
        tracing::debug!(faces = faces.len(), matches = matches.len(), "image analysed");

        let labels = pair_labels(&faces, &matches);
        let labelled: Vec<_> = faces.into_iter().zip(labels).collect();
        let annotated = self.annotator.annotate(&image, &labelled)?;

        outcome.annotated.push(AnnotatedImage {
            file_name: upload.file_name.clone(),
            image: annotated,
        });
        Ok(())
    }
}
