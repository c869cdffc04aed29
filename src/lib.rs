//! Streaming JSON array transport for query-result rows.
//!
//! A server-side [`Encoder`] turns a forward-only database cursor into a
//! lazy sequence of text fragments forming one JSON array, one row object
//! per emission, with O(1) memory in result-set size. A client-side
//! [`Decoder`] consumes arbitrarily-chunked fragments from a streaming
//! response body and yields rows as soon as they are delimited, with
//! best-effort recovery when the stream is truncated.

pub mod error;
mod opts;
pub mod protocol;
pub mod row;
pub mod source;
pub mod value;

pub use error::{Error, Result};
pub use opts::DecodeOpts;
pub use protocol::decode::{Decoded, Decoder, Outcome};
pub use protocol::encode::Encoder;
pub use protocol::response::ErrorPayload;
pub use row::Row;
pub use source::{RowSource, SourceRow, VecSource};
pub use value::SourceValue;

#[cfg(feature = "sync")]
pub mod sync;

#[cfg(feature = "tokio")]
pub mod tokio;
