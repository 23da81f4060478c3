//! TrueType font lookup for face labels.

use ab_glyph::FontVec;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fonts tried, in order, when no font is configured.
const SYSTEM_FONTS: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

#[derive(Error, Debug)]
pub enum FontError {
    #[error("reading font {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid font file {0}")]
    Invalid(PathBuf),
}

/// Load a font file from disk.
pub fn load_font(path: &Path) -> Result<FontVec, FontError> {
    let data = std::fs::read(path).map_err(|source| FontError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FontVec::try_from_vec(data).map_err(|_| FontError::Invalid(path.to_path_buf()))
}

/// Load the configured font, falling back to well-known system fonts.
pub fn find_font(configured: Option<&Path>) -> Option<FontVec> {
    if let Some(path) = configured {
        match load_font(path) {
            Ok(font) => {
                tracing::info!(path = %path.display(), "loaded label font");
                return Some(font);
            }
            Err(e) => tracing::warn!(error = %e, "configured label font unusable; searching system fonts"),
        }
    }

    let found = SYSTEM_FONTS
        .iter()
        .map(Path::new)
        .filter(|p| p.exists())
        .find_map(|p| load_font(p).ok().map(|font| (p, font)));

    match found {
        Some((path, font)) => {
            tracing::info!(path = %path.display(), "loaded label font");
            Some(font)
        }
        None => {
            tracing::warn!("no label font found; faces will be boxed without names");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_font_missing_file() {
        let err = load_font(Path::new("/nonexistent/rollcall/font.ttf")).unwrap_err();
        assert!(matches!(err, FontError::Io { .. }));
    }

    #[test]
    fn test_load_font_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.ttf");
        std::fs::write(&path, b"not a font").unwrap();

        let err = load_font(&path).unwrap_err();
        assert!(matches!(err, FontError::Invalid(_)));
    }

    #[test]
    fn test_find_font_prefers_configured_path() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf");
        assert!(load_font(&path).is_ok());
        assert!(find_font(Some(&path)).is_some());
    }
}
