//! CSV writer over [`csv_core::Writer`].

use std::io::Write;

use csv_core::{QuoteStyle, WriteResult, Writer, WriterBuilder};
use csvtab_error::Result;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const DELIMITER: u8 = b',';

/// Writes rows of cells, quoting only where needed unless told otherwise.
///
/// Cells are encoded one at a time by one of two `csv_core` writers, picked
/// per cell. Separators and line terminators are written here directly, so
/// neither writer carries state from one cell to the next.
pub struct CsvWriter<W: Write> {
    out: W,
    necessary: Writer,
    always: Writer,
    scratch: [u8; 1024],
    cells: usize,
    /// Bytes written for the cells of the current row.
    row_bytes: usize,
}

impl<W: Write> CsvWriter<W> {
    /// Create a writer; with `with_bom` the UTF-8 byte order mark is written
    /// immediately.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn new(mut out: W, with_bom: bool) -> Result<Self> {
        if with_bom {
            out.write_all(UTF8_BOM)?;
        }
        Ok(Self {
            out,
            necessary: core_writer(QuoteStyle::Necessary),
            always: core_writer(QuoteStyle::Always),
            scratch: [0; 1024],
            cells: 0,
            row_bytes: 0,
        })
    }

    /// Append one cell to the current row. `force_quote` quotes it even when
    /// the contents would not require it.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn cell(&mut self, bytes: &[u8], force_quote: bool) -> Result<()> {
        let Self {
            out,
            necessary,
            always,
            scratch,
            cells,
            row_bytes,
        } = self;
        if *cells > 0 {
            out.write_all(&[DELIMITER])?;
        }
        *cells += 1;
        let core = if force_quote { always } else { necessary };
        let mut input = bytes;
        loop {
            let (result, nin, nout) = core.field(input, scratch);
            out.write_all(&scratch[..nout])?;
            *row_bytes += nout;
            input = &input[nin..];
            if matches!(result, WriteResult::InputEmpty) {
                break;
            }
        }
        // Closing the field yields the closing quote, if any, followed by a
        // delimiter that belongs to the next cell.
        let (_, nout) = core.delimiter(scratch);
        let closing = nout.saturating_sub(1);
        out.write_all(&scratch[..closing])?;
        *row_bytes += closing;
        Ok(())
    }

    /// Terminate the current row.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn end_row(&mut self) -> Result<()> {
        if self.cells == 1 && self.row_bytes == 0 {
            // A lone empty cell must not turn into a blank line.
            self.out.write_all(b"\"\"")?;
        }
        self.out.write_all(b"\n")?;
        self.cells = 0;
        self.row_bytes = 0;
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates flush failures.
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn core_writer(style: QuoteStyle) -> Writer {
    WriterBuilder::new()
        .delimiter(DELIMITER)
        .quote_style(style)
        .build()
}

impl<W: Write> std::fmt::Debug for CsvWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvWriter")
            .field("cells", &self.cells)
            .field("row_bytes", &self.row_bytes)
            .finish_non_exhaustive()
    }
}
