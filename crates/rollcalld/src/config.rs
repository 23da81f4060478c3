use std::net::SocketAddr;
use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the web form listens on.
    pub bind: SocketAddr,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity needed for a gallery match.
    pub similarity_threshold: f32,
    /// Minimum SCRFD score for a face detection.
    pub detection_threshold: f32,
    /// TrueType font for face labels; system fonts are searched when unset.
    pub font_path: Option<PathBuf>,
    /// Upper bound on one form submission, in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let bind = std::env::var("ROLLCALL_BIND")
            .ok()
            .and_then(|v| match v.parse() {
                Ok(addr) => Some(addr),
                Err(e) => {
                    tracing::warn!(value = %v, error = %e, "ignoring invalid ROLLCALL_BIND");
                    None
                }
            })
            .unwrap_or_else(default_bind);

        let model_dir = std::env::var("ROLLCALL_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| rollcall_core::default_model_dir());

        Self {
            bind,
            model_dir,
            similarity_threshold: env_f32(
                "ROLLCALL_SIMILARITY_THRESHOLD",
                rollcall_core::DEFAULT_SIMILARITY_THRESHOLD,
            ),
            detection_threshold: env_f32(
                "ROLLCALL_DETECTION_THRESHOLD",
                rollcall_core::SCRFD_CONFIDENCE_THRESHOLD,
            ),
            font_path: std::env::var("ROLLCALL_FONT_PATH").ok().map(PathBuf::from),
            max_upload_bytes: env_usize("ROLLCALL_MAX_UPLOAD_MB", 64) * 1024 * 1024,
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join(rollcall_core::SCRFD_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join(rollcall_core::ARCFACE_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8501))
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
