use serde_json::Value as Json;

use crate::error::{Error, Result, eyre};
use crate::opts::DecodeOpts;
use crate::protocol::response::{self, ErrorPayload};
use crate::protocol::scan::{self, Boundary};
use crate::protocol::{ARRAY_CLOSE, ARRAY_OPEN, ROW_SEPARATOR};
use crate::row::Row;

/// Decode session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    /// The buffer has not yet matched the opening `"[\n"`
    AwaitingArrayStart,
    /// Scanning for the next `",\n"` or `"\n]"` boundary
    InArray,
    /// The terminator was seen; further fragments are ignored
    Done,
    /// A row failed to parse; the session is aborted
    Failed,
}

/// How a decode session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The terminator was seen; the envelope was well formed.
    Complete,
    /// The stream ended while still inside the array. Rows decoded before the
    /// truncation point were still delivered; if the truncated tail carried
    /// an encoder error object, it is reported here rather than merged into
    /// a row.
    Truncated { error: Option<ErrorPayload> },
}

/// A fully drained decode session.
#[derive(Debug)]
pub struct Decoded {
    pub rows: Vec<Row>,
    pub outcome: Outcome,
}

/// Incremental decoder for one envelope stream.
///
/// Fragments arrive in whatever sizes the transport delivers them; the
/// decoder appends to its buffer and extracts complete row objects as soon as
/// an unambiguous boundary appears. The buffer never holds more than one
/// partially-built row plus the unconsumed tail. One decoder serves exactly
/// one stream; it is not restartable.
#[derive(Debug)]
pub struct Decoder {
    state: DecodeState,
    buffer: String,
    /// Incomplete trailing multi-byte character from `feed_bytes`
    stash: Vec<u8>,
    opts: DecodeOpts,
}

impl Decoder {
    pub fn new(opts: DecodeOpts) -> Self {
        Self {
            state: DecodeState::AwaitingArrayStart,
            buffer: String::new(),
            stash: Vec::new(),
            opts,
        }
    }

    /// Whether the opening `"[\n"` has been consumed. Readers use this to
    /// decide between the recovery path and a hard transport failure when
    /// the connection drops.
    pub fn array_started(&self) -> bool {
        self.state != DecodeState::AwaitingArrayStart
    }

    /// Append one text fragment and extract every row completed by it.
    ///
    /// Returns the rows in stream order, possibly empty when the fragment
    /// ended mid-row. After the terminator has been seen further fragments
    /// are ignored; after a failure the session is dead.
    pub fn feed(&mut self, fragment: &str) -> Result<Vec<Row>> {
        match self.state {
            DecodeState::Done => {
                tracing::debug!(len = fragment.len(), "fragment after terminator ignored");
                return Ok(Vec::new());
            }
            DecodeState::Failed => return Err(Error::InvalidState),
            DecodeState::AwaitingArrayStart | DecodeState::InArray => {}
        }

        self.buffer.push_str(fragment);
        let rows = self.drain_rows()?;
        // The cap applies to what remains after draining: only an undelimited
        // residue can grow without bound.
        if self.state != DecodeState::Done && self.buffer.len() > self.opts.max_buffer_len {
            self.state = DecodeState::Failed;
            return Err(Error::BufferLimit {
                limit: self.opts.max_buffer_len,
            });
        }
        Ok(rows)
    }

    /// Append one byte fragment, validating UTF-8.
    ///
    /// Transport chunks are not aligned to character boundaries; a multi-byte
    /// character split across fragments is stashed until its remaining bytes
    /// arrive. Genuinely invalid UTF-8 aborts the session.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Result<Vec<Row>> {
        if matches!(self.state, DecodeState::Failed) {
            return Err(Error::InvalidState);
        }

        let owned;
        let data: &[u8] = if self.stash.is_empty() {
            bytes
        } else {
            let mut joined = std::mem::take(&mut self.stash);
            joined.extend_from_slice(bytes);
            owned = joined;
            &owned
        };

        match simdutf8::compat::from_utf8(data) {
            Ok(text) => self.feed(text),
            Err(e) if e.error_len().is_none() => {
                // Truncated sequence at the end of the chunk: keep the valid
                // prefix, stash the partial character.
                let (valid, rest) = data.split_at(e.valid_up_to());
                self.stash = rest.to_vec();
                let text = std::str::from_utf8(valid).map_err(|err| {
                    Error::LibraryBug(eyre!("prefix accepted by simdutf8 failed validation: {err}"))
                })?;
                self.feed(text)
            }
            Err(_) => {
                self.state = DecodeState::Failed;
                Err(Error::InvalidUtf8)
            }
        }
    }

    /// End of stream: classify how the session finished.
    ///
    /// Any rows recovered from the unconsumed tail are returned alongside the
    /// outcome. An abrupt connection close is handled identically to a normal
    /// end of stream.
    pub fn finish(self) -> Result<(Vec<Row>, Outcome)> {
        match self.state {
            DecodeState::Done => Ok((Vec::new(), Outcome::Complete)),
            DecodeState::Failed => Err(Error::InvalidState),
            DecodeState::AwaitingArrayStart => {
                let tail = self.buffer.trim();
                // A bare error object means the query failed before any row
                // was sent - distinct from an empty result set.
                if let Ok(payload) = serde_json::from_str::<ErrorPayload>(tail) {
                    return Err(Error::Server(payload));
                }
                Err(Error::MissingArrayStart)
            }
            DecodeState::InArray => {
                if !self.opts.recover_truncation {
                    return Err(Error::UnexpectedEof);
                }
                tracing::warn!(
                    buffered = self.buffer.len(),
                    "stream ended inside array; attempting recovery"
                );
                let (rows, error) = recover_tail(&self.buffer);
                Ok((rows, Outcome::Truncated { error }))
            }
        }
    }

    /// Pull every unambiguously delimited row out of the buffer.
    fn drain_rows(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();

        if self.state == DecodeState::AwaitingArrayStart {
            match self.buffer.find(ARRAY_OPEN) {
                Some(pos) => {
                    // Anything before the match is transport framing noise.
                    self.buffer.drain(..pos + ARRAY_OPEN.len());
                    self.state = DecodeState::InArray;
                }
                None => return Ok(rows),
            }
        }

        while self.state == DecodeState::InArray {
            match scan::find_boundary(&self.buffer) {
                Some((pos, Boundary::Separator)) => {
                    // pos sits on ASCII, always a char boundary
                    let chunk: String = self.buffer.drain(..pos + ROW_SEPARATOR.len()).collect();
                    rows.push(self.parse_row(&chunk[..pos])?);
                }
                Some((pos, Boundary::Terminator)) => {
                    let chunk: String = self.buffer.drain(..pos + ARRAY_CLOSE.len()).collect();
                    let last = chunk[..pos].trim();
                    if !last.is_empty() {
                        rows.push(self.parse_row(last)?);
                    }
                    self.state = DecodeState::Done;
                    if !self.buffer.trim().is_empty() {
                        tracing::debug!(
                            len = self.buffer.len(),
                            "unexpected data after terminator"
                        );
                    }
                }
                None => break,
            }
        }

        Ok(rows)
    }

    fn parse_row(&mut self, text: &str) -> Result<Row> {
        serde_json::from_str::<Row>(text.trim()).map_err(|e| {
            self.state = DecodeState::Failed;
            Error::MalformedRow(e)
        })
    }
}

/// Repair a truncated tail: strip one trailing comma, close the array, and
/// retry a single whole-buffer parse. A failed repair degrades to zero
/// additional rows - truncation is never a hard failure once the array was
/// opened.
fn recover_tail(buffer: &str) -> (Vec<Row>, Option<ErrorPayload>) {
    let mut tail = buffer.trim().to_string();
    if tail.ends_with(',') {
        tail.pop();
    }
    let patched = format!("[{tail}]");

    let values = match serde_json::from_str::<Vec<Json>>(&patched) {
        Ok(values) => values,
        Err(e) => {
            tracing::debug!(error = %e, "recovery parse failed; no additional rows");
            return (Vec::new(), None);
        }
    };

    let mut rows = Vec::new();
    let mut error = None;
    for value in values {
        match value {
            Json::Object(map) => match response::as_error_payload(&map) {
                Some(payload) => error = Some(payload),
                None => rows.push(Row::from(map)),
            },
            other => {
                tracing::debug!(kind = json_kind(&other), "non-object in recovered tail dropped");
            }
        }
    }
    (rows, error)
}

fn json_kind(value: &Json) -> &'static str {
    match value {
        Json::Null => "null",
        Json::Bool(_) => "bool",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
