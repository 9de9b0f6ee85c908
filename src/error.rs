use thiserror::Error;

/// Failure conditions raised by the ingestion pipeline.
///
/// `ResourceUnavailable` is the expected steady state for the most recent
/// month before the publisher releases it; the engine downgrades it to a
/// skip. `MalformedRecord` is reported per row and never aborts the file
/// it came from.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("resource unavailable: {url} (status: {status:?})")]
    ResourceUnavailable { url: String, status: Option<u16> },

    #[error("malformed record in {source_file} row {row}: {reason}")]
    MalformedRecord {
        source_file: String,
        row: u64,
        reason: String,
    },
}

impl IngestError {
    pub fn malformed(source_file: &str, row: u64, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            source_file: source_file.to_string(),
            row,
            reason: reason.into(),
        }
    }
}
