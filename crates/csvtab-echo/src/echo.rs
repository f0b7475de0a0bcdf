//! Copy CSV input to output, replacing selected cells.

use std::io::{Read, Write};
use std::path::PathBuf;

use csvtab_error::Result;
use csvtab_parser::{CsvParser, ParseStatus, ParserOptions, Row, RowHandler};
use tracing::debug;

use crate::overwrite::{Overwrite, OverwriteSource};
use crate::writer::CsvWriter;

/// Echo command configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoOptions {
    /// Input path; `None` reads stdin.
    pub input: Option<PathBuf>,
    /// `sqlite3://` overwrite source.
    pub overwrite: Option<String>,
    /// Write a UTF-8 byte order mark first.
    pub with_bom: bool,
    pub parser: ParserOptions,
    pub show_help: bool,
}

/// Counters reported after an echo run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EchoStats {
    /// Rows written, header included.
    pub rows: u64,
    pub overwritten: u64,
}

/// Merge-joins parsed rows with the overwrite stream.
struct EchoRows<'a, W: Write> {
    writer: CsvWriter<W>,
    overwrites: &'a mut dyn OverwriteSource,
    pending: Option<Overwrite>,
    stats: EchoStats,
}

impl<W: Write> EchoRows<'_, W> {
    fn take_pending(&mut self, row: u64, column: u64) -> Result<Option<Overwrite>> {
        match &self.pending {
            Some(o) if o.row == row && o.column == column => {
                let hit = self.pending.take();
                self.pending = self.overwrites.next_overwrite()?;
                Ok(hit)
            }
            _ => Ok(None),
        }
    }

    /// Drop overwrites for rows before `row`; they matched no cell.
    fn skip_before(&mut self, row: u64) -> Result<()> {
        while let Some(o) = &self.pending {
            if o.row >= row {
                break;
            }
            debug!(row = o.row, column = o.column, "overwrite matched no cell");
            self.pending = self.overwrites.next_overwrite()?;
        }
        Ok(())
    }
}

impl<W: Write> RowHandler for EchoRows<'_, W> {
    fn on_row(&mut self, row: &Row<'_>) -> Result<()> {
        let row_ix = self.stats.rows;
        if row_ix > 0 {
            self.skip_before(row_ix)?;
        }
        for (i, cell) in row.cells().enumerate() {
            let hit = if row_ix == 0 {
                None
            } else {
                self.take_pending(row_ix, i as u64)?
            };
            match hit {
                Some(o) => {
                    self.writer.cell(&o.value, true)?;
                    self.stats.overwritten += 1;
                }
                None => self.writer.cell(cell.bytes, cell.quoted)?,
            }
        }
        if row_ix > 0 {
            self.skip_before(row_ix + 1)?;
        }
        self.writer.end_row()?;
        self.stats.rows += 1;
        Ok(())
    }
}

/// Parse `input` and write it to `out`, applying `overwrites`. The header
/// (row 0) is never overwritten.
///
/// # Errors
///
/// Parse, overwrite-source and write failures.
pub fn echo<R, W>(
    input: R,
    out: W,
    overwrites: &mut dyn OverwriteSource,
    options: &EchoOptions,
) -> Result<EchoStats>
where
    R: Read,
    W: Write,
{
    let mut parser = CsvParser::new(input, options.parser.clone())?;
    let pending = overwrites.next_overwrite()?;
    let mut rows = EchoRows {
        writer: CsvWriter::new(out, options.with_bom)?,
        overwrites,
        pending,
        stats: EchoStats::default(),
    };
    while parser.parse_more(&mut rows)? == ParseStatus::Ok {}
    parser.finish(&mut rows)?;
    rows.writer.flush()?;
    debug!(
        rows = rows.stats.rows,
        overwritten = rows.stats.overwritten,
        "echo complete"
    );
    Ok(rows.stats)
}
