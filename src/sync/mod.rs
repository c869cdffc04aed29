use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};

use crate::error::{Error, Result, eyre};
use crate::opts::DecodeOpts;
use crate::protocol::decode::{Decoded, Decoder, Outcome};
use crate::protocol::encode::Encoder;
use crate::row::Row;
use crate::source::RowSource;

/// Drive an encode session into a blocking sink.
///
/// Producer-side entry point: writes every fragment as it is produced and
/// flushes per fragment, so the transport's backpressure bounds memory to one
/// row in flight. Returns the number of rows written. The source is consumed
/// and dropped on every exit path, releasing the cursor.
#[tracing::instrument(skip_all)]
pub fn copy_rows<S: RowSource, W: Write>(source: S, sink: &mut W) -> Result<u64> {
    let mut encoder = Encoder::new(source);
    for fragment in encoder.by_ref() {
        sink.write_all(fragment?.as_bytes())?;
        sink.flush()?;
    }
    Ok(encoder.rows_emitted())
}

/// Drain one streaming response into rows plus an outcome.
///
/// Consumer-side entry point: reads the body to end of stream and returns
/// everything at once. Use [`RowReader`] to consume rows lazily instead.
#[tracing::instrument(skip_all)]
pub fn read_rows<R: Read>(reader: R, opts: DecodeOpts) -> Result<Decoded> {
    let mut row_reader = RowReader::new(reader, opts);
    let mut rows = Vec::new();
    for row in row_reader.by_ref() {
        rows.push(row?);
    }
    let outcome = row_reader
        .outcome()
        .ok_or_else(|| Error::LibraryBug(eyre!("reader exhausted without an outcome")))?;
    Ok(Decoded { rows, outcome })
}

/// Lazy, single-pass row iterator over a blocking byte stream.
///
/// Pulls transport chunks of `DecodeOpts::read_chunk_len` bytes and yields
/// rows as soon as they are delimited. The underlying reader is dropped as
/// soon as the stream ends, before the final rows are handed out. After the
/// iterator is exhausted, [`outcome`](Self::outcome) tells a complete
/// envelope apart from a truncated one.
pub struct RowReader<R> {
    reader: Option<R>,
    decoder: Option<Decoder>,
    chunk: Vec<u8>,
    pending: VecDeque<Row>,
    outcome: Option<Outcome>,
}

impl<R: Read> RowReader<R> {
    pub fn new(reader: R, opts: DecodeOpts) -> Self {
        let chunk = vec![0u8; opts.read_chunk_len.max(1)];
        Self {
            reader: Some(reader),
            decoder: Some(Decoder::new(opts)),
            chunk,
            pending: VecDeque::new(),
            outcome: None,
        }
    }

    /// How the stream ended; `None` until the iterator has been exhausted.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.clone()
    }

    /// Finish the session: close the transport, run end-of-stream handling.
    fn end_of_stream(&mut self) -> Result<()> {
        drop(self.reader.take());
        let decoder = self.decoder.take().ok_or(Error::InvalidState)?;
        let (rows, outcome) = decoder.finish()?;
        self.pending.extend(rows);
        self.outcome = Some(outcome);
        Ok(())
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            let Some(reader) = self.reader.as_mut() else {
                return None;
            };
            let Some(decoder) = self.decoder.as_mut() else {
                return None;
            };

            match reader.read(&mut self.chunk) {
                Ok(0) => {
                    if let Err(err) = self.end_of_stream() {
                        return Some(Err(err));
                    }
                }
                Ok(n) => match decoder.feed_bytes(&self.chunk[..n]) {
                    Ok(rows) => self.pending.extend(rows),
                    Err(err) => {
                        self.reader = None;
                        self.decoder = None;
                        return Some(Err(err));
                    }
                },
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => {
                    // An abrupt close after row data was received is handled
                    // like a normal end of stream, entering recovery instead
                    // of surfacing the raw I/O error.
                    if decoder.array_started() {
                        tracing::warn!(error = %err, "read failed mid-stream; treating as end of stream");
                        if let Err(finish_err) = self.end_of_stream() {
                            return Some(Err(finish_err));
                        }
                    } else {
                        self.reader = None;
                        self.decoder = None;
                        return Some(Err(Error::Io(err)));
                    }
                }
            }
        }
    }
}
