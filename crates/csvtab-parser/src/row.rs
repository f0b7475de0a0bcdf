//! Row views handed to a [`RowHandler`].

use csvtab_error::Result;

/// Location of one cell inside the parser's row buffer.
///
/// A span carries no lifetime: it is plain data that can be stored and later
/// resolved with [`CsvParser::resolve`](crate::CsvParser::resolve), which
/// refuses spans from an earlier parser step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSpan {
    pub offset: usize,
    pub len: usize,
    pub quoted: bool,
}

/// A cell's bytes, borrowed from wherever they currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell<'a> {
    pub bytes: &'a [u8],
    pub quoted: bool,
}

impl Cell<'_> {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// One completed row, valid only for the duration of the handler call.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    pub(crate) buf: &'a [u8],
    pub(crate) spans: &'a [CellSpan],
    pub(crate) generation: u64,
    pub(crate) number: u64,
}

impl<'a> Row<'a> {
    /// Number of cells in the row.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.spans.len()
    }

    /// The cell at `index`, or `None` past the end of the row.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<Cell<'a>> {
        let span = self.spans.get(index)?;
        Some(Cell {
            bytes: &self.buf[span.offset..span.offset + span.len],
            quoted: span.quoted,
        })
    }

    /// All cells in order.
    pub fn cells(&self) -> impl Iterator<Item = Cell<'a>> + '_ {
        (0..self.spans.len()).filter_map(|i| self.cell(i))
    }

    /// Raw spans, for callers that cache the row without copying it.
    #[must_use]
    pub const fn spans(&self) -> &'a [CellSpan] {
        self.spans
    }

    /// Parser step that produced this row.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// 1-based position of this row in the input.
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.number
    }
}

/// Receives each completed row.
pub trait RowHandler {
    /// Called once per row. An error aborts the current parser step and is
    /// returned from it.
    fn on_row(&mut self, row: &Row<'_>) -> Result<()>;
}

impl<F> RowHandler for F
where
    F: FnMut(&Row<'_>) -> Result<()>,
{
    fn on_row(&mut self, row: &Row<'_>) -> Result<()> {
        self(row)
    }
}
