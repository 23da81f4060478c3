//! rollcall-imaging: Turning uploads into pixels and pixels back into annotated output.
//!
//! Decodes uploaded photos, draws labelled face boxes with `imageproc`, and
//! encodes results as PNG.

pub mod annotate;
pub mod decode;
pub mod font;

pub use annotate::{AnnotateError, Annotator, FaceLabel};
pub use decode::{decode_upload, encode_png, DecodeError};
