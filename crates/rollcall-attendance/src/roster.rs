//! Attendance roster: recognized names and their CSV export.

use std::path::Path;
use thiserror::Error;

/// File name the roster is offered under.
pub const ROSTER_FILE_NAME: &str = "attendance.csv";
pub const ROSTER_MIME: &str = "text/csv";
pub const ROSTER_HEADER: &str = "Student Name";

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("flushing roster: {0}")]
    Io(#[from] std::io::Error),
    #[error("expected header {ROSTER_HEADER:?}, found {0:?}")]
    Header(Vec<String>),
}

/// Display name of a gallery identity: its final path component, extension kept.
///
/// `/gallery/alice/alice1.jpg` → `alice1.jpg`.
pub fn display_name(identity: &str) -> String {
    Path::new(identity)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| identity.to_string())
}

/// One name per recognized face, in the order faces were recognized. Not deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendanceRecord {
    names: Vec<String>,
}

impl AttendanceRecord {
    pub fn from_identities<I, S>(identities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: identities.into_iter().map(|i| display_name(i.as_ref())).collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// UTF-8 CSV: a `Student Name` header, then one name per row, no index column.
    pub fn to_csv(&self) -> Result<Vec<u8>, RosterError> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record([ROSTER_HEADER])?;
        for name in &self.names {
            writer.write_record([name])?;
        }
        writer.into_inner().map_err(|e| RosterError::Io(e.into_error()))
    }

    /// Parse a roster written by [`to_csv`](Self::to_csv).
    pub fn from_csv(bytes: &[u8]) -> Result<Self, RosterError> {
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
        let headers = reader.headers()?;
        if headers.len() != 1 || &headers[0] != ROSTER_HEADER {
            return Err(RosterError::Header(headers.iter().map(String::from).collect()));
        }

        let mut names = Vec::new();
        for record in reader.records() {
            let record = record?;
            names.push(record.get(0).unwrap_or_default().to_string());
        }
        Ok(Self { names })
    }
}
