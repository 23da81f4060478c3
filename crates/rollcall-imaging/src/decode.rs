//! Upload decoding and PNG encoding for presentation.

use image::{ImageFormat, RgbImage};
use std::io::Cursor;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("upload is empty")]
    Empty,
    #[error("unrecognized image format")]
    UnknownFormat,
    #[error("malformed image: {0}")]
    Malformed(#[from] image::ImageError),
}

/// Decode uploaded bytes into an RGB pixel buffer.
///
/// A malformed upload is an error, never an empty image.
pub fn decode_upload(bytes: &[u8]) -> Result<RgbImage, DecodeError> {
    if bytes.is_empty() {
        return Err(DecodeError::Empty);
    }
    let format = image::guess_format(bytes).map_err(|_| DecodeError::UnknownFormat)?;
    let decoded = image::load_from_memory_with_format(bytes, format)?;
    Ok(decoded.to_rgb8())
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
