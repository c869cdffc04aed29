use smart_default::SmartDefault;

/// A configuration for one decode session
///
/// ```rs
/// let mut opts = DecodeOpts::default();
/// opts.read_chunk_len = 1024;
/// ```
#[derive(Debug, Clone, SmartDefault)]
pub struct DecodeOpts {
    /// Hard cap on the decode buffer. The buffer normally holds at most one
    /// partial row plus the unconsumed tail; a stream that never produces a
    /// row boundary fails with `Error::BufferLimit` instead of growing
    /// without bound.
    #[default(16 * 1024 * 1024)]
    pub max_buffer_len: usize,

    /// Read size used by `read_rows` and `RowReader` when pulling fragments
    /// from the transport. Fragment boundaries carry no meaning, so this only
    /// affects syscall granularity.
    #[default = 8192]
    pub read_chunk_len: usize,

    /// Attempt end-of-stream repair when the transport closes while still
    /// inside the array. When disabled, such a stream fails with
    /// `Error::UnexpectedEof` instead of a `Truncated` outcome.
    #[default = true]
    pub recover_truncation: bool,
}
