use thiserror::Error;

use crate::protocol::response::ErrorPayload;

pub use color_eyre::eyre::eyre;

#[derive(Debug, Error)]
pub enum Error {
    /// The stream carried a bare `{"error": ...}` object instead of row data.
    #[error("Server error: {0}")]
    Server(#[from] ErrorPayload),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The cursor backing an encode session failed.
    #[error("Source error: {0}")]
    Source(String),

    /// The stream ended or errored before the opening `[` was seen.
    #[error("Stream did not begin with a JSON array")]
    MissingArrayStart,

    /// A delimited row text failed to parse as a JSON object.
    #[error("Malformed row object: {0}")]
    MalformedRow(serde_json::Error),

    #[error("Invalid UTF-8 in stream")]
    InvalidUtf8,

    /// The stream ended inside the array and truncation recovery is disabled.
    #[error("Stream ended without an array terminator")]
    UnexpectedEof,

    /// The decode buffer grew past its configured cap without a row boundary.
    #[error("Decode buffer exceeded {limit} bytes without a row boundary")]
    BufferLimit { limit: usize },

    /// A session was driven past a terminal state.
    #[error("Decode session already ended")]
    InvalidState,

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

pub type Result<T> = std::result::Result<T, Error>;
