//! Form controller: validate the submission, run the batch, build the report.
//!
//! `Idle` → `Validating` → `Processing` → `Presenting`. A failed check stops
//! at its message and nothing is processed.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rollcall_attendance::{BatchOutcome, RosterError, RunSummary, Upload};
use std::path::PathBuf;

use crate::engine::{EngineError, EngineHandle};

pub const MISSING_INPUTS_WARNING: &str = "Please upload images and provide a valid database path.";
pub const GALLERY_NOT_FOUND_ERROR: &str =
    "The specified database path does not exist. Please provide a valid path.";

/// One form submission.
#[derive(Debug, Default)]
pub struct FormInput {
    pub gallery_path: String,
    pub uploads: Vec<Upload>,
}

/// Outcome of the pre-flight checks.
#[derive(Debug, PartialEq, Eq)]
pub enum Validation {
    /// An input is missing; nothing to do yet.
    Incomplete,
    /// The gallery path does not exist.
    GalleryNotFound,
    Ready(PathBuf),
}

/// Check both inputs are present and the gallery exists.
pub async fn validate(input: &FormInput) -> Validation {
    let gallery = input.gallery_path.trim();
    if gallery.is_empty() || input.uploads.is_empty() {
        return Validation::Incomplete;
    }

    let path = PathBuf::from(gallery);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        Validation::Ready(path)
    } else {
        Validation::GalleryNotFound
    }
}

/// What the page shows after a submission.
#[derive(Debug)]
pub enum FormState {
    Idle { warning: &'static str },
    Rejected { error: &'static str },
    Presenting(Report),
}

/// A PNG ready to be embedded in the page.
#[derive(Debug)]
pub struct RenderedImage {
    pub file_name: String,
    pub data_url: String,
}

/// Everything shown for one finished batch.
#[derive(Debug)]
pub struct Report {
    pub image_count: usize,
    pub summary: RunSummary,
    pub names: Vec<String>,
    /// `data:` URL of the CSV roster; absent when nobody was recognized.
    pub roster_url: Option<String>,
    pub images: Vec<RenderedImage>,
    pub errors: Vec<String>,
}

impl Report {
    pub fn from_outcome(image_count: usize, outcome: BatchOutcome) -> Result<Self, RosterError> {
        let roster = outcome.roster();
        let roster_url = if roster.is_empty() {
            None
        } else {
            Some(data_url(rollcall_attendance::ROSTER_MIME, &roster.to_csv()?))
        };

        let mut errors: Vec<String> = outcome.failures.iter().map(ToString::to_string).collect();
        if outcome.summary.anomalies > 0 {
            errors.push(format!(
                "Gallery search returned {} more matches than detected faces; unknown count clamped at zero.",
                outcome.summary.anomalies
            ));
        }

        let mut images = Vec::with_capacity(outcome.annotated.len());
        for annotated in outcome.annotated {
            match rollcall_imaging::encode_png(&annotated.image) {
                Ok(png) => images.push(RenderedImage {
                    file_name: annotated.file_name,
                    data_url: data_url("image/png", &png),
                }),
                Err(e) => {
                    tracing::warn!(file = %annotated.file_name, error = %e, "encoding annotated image failed");
                    errors.push(format!("Error encoding image {}: {e}", annotated.file_name));
                }
            }
        }

        Ok(Self {
            image_count,
            summary: outcome.summary,
            names: roster.names().to_vec(),
            roster_url,
            images,
            errors,
        })
    }
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("building roster: {0}")]
    Roster(#[from] RosterError),
}

/// Drive one submission from validation to a presentable state.
pub async fn submit(engine: &EngineHandle, input: FormInput) -> Result<FormState, SubmitError> {
    let gallery = match validate(&input).await {
        Validation::Incomplete => {
            return Ok(FormState::Idle {
                warning: MISSING_INPUTS_WARNING,
            })
        }
        Validation::GalleryNotFound => {
            tracing::info!(gallery = %input.gallery_path, "gallery path does not exist");
            return Ok(FormState::Rejected {
                error: GALLERY_NOT_FOUND_ERROR,
            });
        }
        Validation::Ready(path) => path,
    };

    let image_count = input.uploads.len();
    let outcome = engine.process(gallery, input.uploads).await?;
    Ok(FormState::Presenting(Report::from_outcome(image_count, outcome)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_with;
    use crate::engine::tests::{png_upload, OneFaceAnalyzer};
    use rollcall_imaging::Annotator;

    fn engine(identity: Option<&str>) -> EngineHandle {
        let analyzer = OneFaceAnalyzer { identity: identity.map(String::from) };
        spawn_with(analyzer, Annotator::without_font()).unwrap()
    }

    #[tokio::test]
    async fn test_missing_gallery_path_is_idle() {
        let input = FormInput { gallery_path: "  ".into(), uploads: vec![png_upload("a.png")] };
        assert_eq!(validate(&input).await, Validation::Incomplete);
    }

    #[tokio::test]
    async fn test_missing_uploads_is_idle() {
        let dir = tempfile::tempdir().unwrap();
        let input = FormInput { gallery_path: dir.path().display().to_string(), uploads: vec![] };
        assert_eq!(validate(&input).await, Validation::Incomplete);
    }

    #[tokio::test]
    async fn test_existing_gallery_is_ready() {
        let dir = tempfile::tempdir().unwrap();
        let input = FormInput {
            gallery_path: format!(" {} ", dir.path().display()),
            uploads: vec![png_upload("a.png")],
        };
        assert_eq!(validate(&input).await, Validation::Ready(dir.path().to_path_buf()));
    }

    #[tokio::test]
    async fn test_nonexistent_gallery_is_rejected_without_processing() {
        let dir = tempfile::tempdir().unwrap();
        let input = FormInput {
            gallery_path: dir.path().join("missing").display().to_string(),
            uploads: vec![png_upload("a.png")],
        };

        let state = submit(&engine(Some("/g/alice/alice1.jpg")), input).await.unwrap();
        assert!(matches!(state, FormState::Rejected { error } if error == GALLERY_NOT_FOUND_ERROR));
    }

    #[tokio::test]
    async fn test_submit_presents_roster() {
        let dir = tempfile::tempdir().unwrap();
        let input = FormInput {
            gallery_path: dir.path().display().to_string(),
            uploads: vec![png_upload("a.png")],
        };

        let FormState::Presenting(report) = submit(&engine(Some("/g/alice/alice1.jpg")), input).await.unwrap() else {
            panic!("expected a report");
        };
        assert_eq!(report.image_count, 1);
        assert_eq!(report.summary.total_faces, 1);
        assert_eq!(report.names, vec!["alice1.jpg"]);
        assert!(report.images[0].data_url.starts_with("data:image/png;base64,"));

        let url = report.roster_url.unwrap();
        let encoded = url.strip_prefix("data:text/csv;base64,").unwrap();
        let csv = STANDARD.decode(encoded).unwrap();
        assert_eq!(csv, b"Student Name\nalice1.jpg\n");
    }

    #[tokio::test]
    async fn test_submit_without_recognitions_has_no_roster() {
        let dir = tempfile::tempdir().unwrap();
        let input = FormInput {
            gallery_path: dir.path().display().to_string(),
            uploads: vec![png_upload("a.png")],
        };

        let FormState::Presenting(report) = submit(&engine(None), input).await.unwrap() else {
            panic!("expected a report");
        };
        assert!(report.names.is_empty());
        assert!(report.roster_url.is_none());
        assert_eq!(report.summary.unknown_faces, 1);
    }
}
