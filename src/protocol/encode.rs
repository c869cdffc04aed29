use serde_json::Map;

use crate::error::{Error, Result, eyre};
use crate::protocol::{ARRAY_CLOSE, ARRAY_OPEN, ROW_SEPARATOR};
use crate::source::{RowSource, SourceRow};

/// Internal state of the encode session
enum EncodeState {
    /// The opening `"[\n"` has not been emitted yet
    Open,
    /// Ready to pull the next cursor row
    Next { first: bool },
    /// A separator was just emitted; this row text goes out next
    PendingRow(String),
    /// A separator was just emitted; this error object closes the stream
    PendingError(String),
    /// Terminal: `"\n]"` or an error object has been emitted
    Done,
}

/// Lazy fragment sequence over a database cursor.
///
/// Yields the envelope one fragment at a time: `"[\n"`, then for each cursor
/// row its JSON object text (preceded by a `",\n"` separator fragment for
/// every row after the first), then `"\n]"`. At most one row is held in
/// memory at any point; the iterator is finite, single-pass, and not
/// restartable.
///
/// If the cursor fails after the opening fragment went out, the session emits
/// a single `{"error": "..."}` object and stops without the terminator. The
/// envelope is then syntactically unclosed on purpose - the decoder's
/// recovery path picks the payload up and reports a `Truncated` outcome.
pub struct Encoder<S> {
    source: S,
    state: EncodeState,
    rows_emitted: u64,
}

impl<S: RowSource> Encoder<S> {
    /// Take ownership of an open cursor. The source is dropped with the
    /// encoder on every exit path, which releases the underlying connection.
    pub fn new(source: S) -> Self {
        Self {
            source,
            state: EncodeState::Open,
            rows_emitted: 0,
        }
    }

    /// Rows whose text fragment has been yielded so far.
    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }
}

impl<S: RowSource> Iterator for Encoder<S> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.state, EncodeState::Done) {
            EncodeState::Open => {
                self.state = EncodeState::Next { first: true };
                Some(Ok(ARRAY_OPEN.to_string()))
            }

            EncodeState::Next { first } => match self.source.next_row() {
                Ok(Some(columns)) => match serialize_row(columns) {
                    Ok(text) => {
                        if first {
                            self.rows_emitted += 1;
                            self.state = EncodeState::Next { first: false };
                            Some(Ok(text))
                        } else {
                            self.state = EncodeState::PendingRow(text);
                            Some(Ok(ROW_SEPARATOR.to_string()))
                        }
                    }
                    // A row that cannot be serialized is a bug on our side,
                    // not a query failure; it surfaces to the caller instead
                    // of the wire.
                    Err(err) => Some(Err(err)),
                },
                Ok(None) => Some(Ok(ARRAY_CLOSE.to_string())),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "cursor failed mid-stream; emitting error object without terminator"
                    );
                    if first {
                        Some(Ok(error_fragment(&err)))
                    } else {
                        // Rows already went out: the error object needs its
                        // own separator so recovery can split it off.
                        self.state = EncodeState::PendingError(error_fragment(&err));
                        Some(Ok(ROW_SEPARATOR.to_string()))
                    }
                }
            },

            EncodeState::PendingRow(text) => {
                self.rows_emitted += 1;
                self.state = EncodeState::Next { first: false };
                Some(Ok(text))
            }

            EncodeState::PendingError(text) => Some(Ok(text)),

            EncodeState::Done => None,
        }
    }
}

/// Normalize one cursor row and serialize it as a JSON object.
fn serialize_row(columns: SourceRow) -> Result<String> {
    let mut map = Map::with_capacity(columns.len());
    for (name, value) in columns {
        map.insert(name, value.normalize()?);
    }
    serde_json::to_string(&map)
        .map_err(|e| Error::LibraryBug(eyre!("serializing a JSON map cannot fail: {e}")))
}

fn error_fragment(err: &Error) -> String {
    serde_json::json!({ "error": err.to_string() }).to_string()
}
