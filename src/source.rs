use auto_impl::auto_impl;

use crate::error::Result;
use crate::value::SourceValue;

/// One driver-native row: column names paired with unnormalized scalars.
pub type SourceRow = Vec<(String, SourceValue)>;

/// Forward-only cursor over a query's result rows.
///
/// This is the seam to the database layer, which is an external collaborator:
/// the encoder drives whatever implements this trait and never sees the
/// connection behind it. The implementor's `Drop` is responsible for
/// releasing the cursor/connection; the encoder guarantees the source is
/// dropped on every exit path of a session.
#[auto_impl(&mut, Box)]
pub trait RowSource {
    /// Fetch the next row, `None` at end of the result set.
    ///
    /// A query/database failure surfaces as `Error::Source`; the encoder
    /// reports it once on the wire and stops.
    fn next_row(&mut self) -> Result<Option<SourceRow>>;
}

/// In-memory source over pre-built rows.
pub struct VecSource {
    rows: std::vec::IntoIter<SourceRow>,
}

impl VecSource {
    pub fn new(rows: Vec<SourceRow>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowSource for VecSource {
    fn next_row(&mut self) -> Result<Option<SourceRow>> {
        Ok(self.rows.next())
    }
}
