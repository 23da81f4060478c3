//! rollcall-attendance: From a batch of classroom photos to an attendance roster.
//!
//! Runs every upload through face detection and gallery search, keeps the
//! running face counts, pairs matches with boxes for annotation, and exports
//! recognized names as CSV.

pub mod batch;
pub mod labels;
pub mod roster;
pub mod summary;

pub use batch::{
    AnnotatedImage, BatchError, BatchOutcome, BatchProcessor, FailureStage, ImageFailure, Upload,
};
pub use labels::pair_labels;
pub use roster::{display_name, AttendanceRecord, RosterError, ROSTER_FILE_NAME, ROSTER_HEADER, ROSTER_MIME};
pub use summary::RunSummary;
