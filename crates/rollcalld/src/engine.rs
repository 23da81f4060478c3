use rollcall_attendance::{BatchOutcome, BatchProcessor, Upload};
use rollcall_core::{AnalyzerError, FaceAnalyzer, OnnxAnalyzer};
use rollcall_imaging::Annotator;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("batch aborted: {0}")]
    Aborted(String),
}

/// Messages sent from HTTP handlers to the engine thread.
enum EngineRequest {
    Process {
        gallery: PathBuf,
        uploads: Vec<Upload>,
        reply: oneshot::Sender<Result<BatchOutcome, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Run one batch to completion against `gallery`.
    pub async fn process(&self, gallery: PathBuf, uploads: Vec<Upload>) -> Result<BatchOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Process {
                gallery,
                uploads,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Load both ONNX models and the label font, then start the engine thread.
///
/// Fails fast at startup if a model is unavailable.
pub fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let scrfd_path = config.scrfd_model_path();
    let arcface_path = config.arcface_model_path();

    let analyzer = OnnxAnalyzer::load(
        &scrfd_path,
        &arcface_path,
        config.detection_threshold,
        config.similarity_threshold,
    )?;
    tracing::info!(scrfd = %scrfd_path, arcface = %arcface_path, "face models loaded");

    let annotator = Annotator::with_font_search(config.font_path.as_deref());

    spawn_with(analyzer, annotator)
}

/// Start the engine thread around an already constructed analyzer.
///
/// Batches are processed one at a time, in arrival order.
pub fn spawn_with<A>(mut analyzer: A, annotator: Annotator) -> Result<EngineHandle, EngineError>
where
    A: FaceAnalyzer + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Process {
                        gallery,
                        uploads,
                        reply,
                    } => {
                        tracing::info!(gallery = %gallery.display(), images = uploads.len(), "processing batch");
                        // A panic in inference fails this batch only; the thread keeps serving.
                        let result = panic::catch_unwind(AssertUnwindSafe(|| {
                            BatchProcessor::new(&mut analyzer, &annotator).process(&uploads, &gallery)
                        }))
                        .map_err(|payload| {
                            let message = panic_message(payload.as_ref());
                            tracing::error!(error = %message, "batch panicked");
                            EngineError::Aborted(message)
                        });
                        let _ = reply.send(result);
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })?;

    Ok(EngineHandle { tx })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::RgbImage;
    use rollcall_core::{BoundingBox, IdentityMatch};
    use std::path::Path;

    /// Analyzer that sees one face per image and matches it to a fixed identity.
    pub(crate) struct OneFaceAnalyzer {
        pub identity: Option<String>,
    }

    impl FaceAnalyzer for OneFaceAnalyzer {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
            Ok(vec![face()])
        }

        fn find(&mut self, _image: &RgbImage, _gallery: &Path) -> Result<Vec<IdentityMatch>, AnalyzerError> {
            Ok(self
                .identity
                .iter()
                .map(|identity| IdentityMatch {
                    identity: identity.clone(),
                    similarity: 0.9,
                    face: Some(face()),
                })
                .collect())
        }
    }

    fn face() -> BoundingBox {
        BoundingBox { x: 1.0, y: 1.0, width: 4.0, height: 4.0, confidence: 0.9, landmarks: None }
    }

    pub(crate) fn png_upload(name: &str) -> Upload {
        let bytes = rollcall_imaging::encode_png(&RgbImage::new(8, 8)).unwrap();
        Upload { file_name: name.into(), bytes }
    }

    #[tokio::test]
    async fn test_engine_processes_batches() {
        let analyzer = OneFaceAnalyzer { identity: Some("/g/alice/alice1.jpg".into()) };
        let engine = spawn_with(analyzer, Annotator::without_font()).unwrap();

        let outcome = engine
            .process(PathBuf::from("/g"), vec![png_upload("a.png"), png_upload("b.png")])
            .await
            .unwrap();

        assert_eq!(outcome.summary.total_faces, 2);
        assert_eq!(outcome.summary.recognized(), 2);
        assert_eq!(outcome.roster().names(), &["alice1.jpg", "alice1.jpg"]);
        assert_eq!(outcome.annotated.len(), 2);
    }

    /// Panics whenever the gallery path is `/panic`.
    struct PanickyAnalyzer;

    impl FaceAnalyzer for PanickyAnalyzer {
        fn detect(&mut self, _image: &RgbImage) -> Result<Vec<BoundingBox>, AnalyzerError> {
            Ok(vec![face()])
        }

        fn find(&mut self, _image: &RgbImage, gallery: &Path) -> Result<Vec<IdentityMatch>, AnalyzerError> {
            if gallery == Path::new("/panic") {
                panic!("inference blew up");
            }
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_engine_survives_panicking_batch() {
        let engine = spawn_with(PanickyAnalyzer, Annotator::without_font()).unwrap();

        let err = engine
            .process(PathBuf::from("/panic"), vec![png_upload("a.png")])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Aborted(ref m) if m == "inference blew up"));

        let outcome = engine
            .process(PathBuf::from("/g"), vec![png_upload("b.png")])
            .await
            .unwrap();
        assert_eq!(outcome.summary.total_faces, 1);
        assert_eq!(outcome.summary.unknown_faces, 1);
    }
}
