use std::collections::VecDeque;
use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result, eyre};
use crate::opts::DecodeOpts;
use crate::protocol::decode::{Decoded, Decoder, Outcome};
use crate::protocol::encode::Encoder;
use crate::row::Row;
use crate::source::RowSource;

/// Async mirror of [`crate::sync::copy_rows`].
///
/// Fragment production is synchronous (the cursor blocks on the driver, not
/// the runtime); only the transport writes await. Flushes per fragment so the
/// client's read pace backpressures the cursor.
#[tracing::instrument(skip_all)]
pub async fn copy_rows<S, W>(source: S, sink: &mut W) -> Result<u64>
where
    S: RowSource,
    W: AsyncWrite + Unpin,
{
    let mut encoder = Encoder::new(source);
    for fragment in encoder.by_ref() {
        sink.write_all(fragment?.as_bytes()).await?;
        sink.flush().await?;
    }
    Ok(encoder.rows_emitted())
}

/// Async mirror of [`crate::sync::read_rows`].
///
/// Reads the streaming body chunk by chunk, decodes incrementally, and
/// returns all rows plus the session outcome. A read failure after row data
/// was received is treated as end of stream and goes through recovery, same
/// as the blocking reader.
#[tracing::instrument(skip_all)]
pub async fn read_rows<R>(reader: R, opts: DecodeOpts) -> Result<Decoded>
where
    R: AsyncRead + Unpin,
{
    let mut row_reader = RowReader::new(reader, opts);
    let mut rows = Vec::new();
    while let Some(row) = row_reader.next_row().await {
        rows.push(row?);
    }
    let outcome = row_reader
        .outcome()
        .ok_or_else(|| Error::LibraryBug(eyre!("reader exhausted without an outcome")))?;
    Ok(Decoded { rows, outcome })
}

/// Async mirror of [`crate::sync::RowReader`].
///
/// Pull rows one at a time with [`next_row`](Self::next_row); `None` means
/// the stream ended and [`outcome`](Self::outcome) is set. The underlying
/// reader is dropped as soon as the stream ends, before the final rows are
/// handed out.
pub struct RowReader<R> {
    reader: Option<R>,
    decoder: Option<Decoder>,
    chunk: Vec<u8>,
    pending: VecDeque<Row>,
    outcome: Option<Outcome>,
}

impl<R: AsyncRead + Unpin> RowReader<R> {
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

    /// How the stream ended; `None` until the reader has been exhausted.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome.clone()
    }

    /// Fetch the next row, `None` at end of stream.
    pub async fn next_row(&mut self) -> Option<Result<Row>> {
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

            match reader.read(&mut self.chunk).await {
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
