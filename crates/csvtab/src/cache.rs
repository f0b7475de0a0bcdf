//! Cached rows and the FIFO that holds them.
//!
//! The header row is copied out of the parser buffer ([`RowCells::Owned`]);
//! data rows only remember where their cells sit in the buffer
//! ([`RowCells::Borrowed`]) together with the parser generation that
//! produced them. Reading a borrowed cell goes through a [`SpanSource`],
//! which refuses spans from an older generation.

use std::collections::VecDeque;
use std::io::Read;

use csvtab_error::{CsvTabError, Result};
use csvtab_parser::{Cell, CellSpan, CsvParser, Row};

/// Resolves borrowed spans to bytes.
pub trait SpanSource {
    /// # Errors
    ///
    /// [`CsvTabError::StaleCell`] when `generation` is not current.
    fn resolve(&self, span: CellSpan, generation: u64) -> Result<&[u8]>;
}

impl<R: Read> SpanSource for CsvParser<R> {
    fn resolve(&self, span: CellSpan, generation: u64) -> Result<&[u8]> {
        Self::resolve(self, span, generation)
    }
}

/// A header cell copied out of the parser buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedCell {
    pub bytes: Box<[u8]>,
    pub quoted: bool,
}

/// Cell storage for one row. Ownership is decided per row, never per cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowCells {
    Owned(Vec<OwnedCell>),
    Borrowed { generation: u64, spans: Vec<CellSpan> },
}

/// One parsed record plus its identifier (0 for the header, 1.. for data).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRow {
    pub id: i64,
    pub cells: RowCells,
}

impl CachedRow {
    /// Copy every cell of `row` into owned memory.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::OutOfMemory`] if an allocation fails.
    pub fn owned(row: &Row<'_>, id: i64) -> Result<Self> {
        let mut cells = Vec::new();
        cells
            .try_reserve_exact(row.cell_count())
            .map_err(|_| CsvTabError::OutOfMemory)?;
        for cell in row.cells() {
            let mut bytes = Vec::new();
            bytes
                .try_reserve_exact(cell.len())
                .map_err(|_| CsvTabError::OutOfMemory)?;
            bytes.extend_from_slice(cell.bytes);
            cells.push(OwnedCell {
                bytes: bytes.into_boxed_slice(),
                quoted: cell.quoted,
            });
        }
        Ok(Self {
            id,
            cells: RowCells::Owned(cells),
        })
    }

    /// Record where the cells of `row` live, without copying them.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::OutOfMemory`] if an allocation fails.
    pub fn borrowed(row: &Row<'_>, id: i64) -> Result<Self> {
        let mut spans = Vec::new();
        spans
            .try_reserve_exact(row.cell_count())
            .map_err(|_| CsvTabError::OutOfMemory)?;
        spans.extend_from_slice(row.spans());
        Ok(Self {
            id,
            cells: RowCells::Borrowed {
                generation: row.generation(),
                spans,
            },
        })
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        match &self.cells {
            RowCells::Owned(cells) => cells.len(),
            RowCells::Borrowed { spans, .. } => spans.len(),
        }
    }

    /// The cell at `index`, or `None` past the end of the row.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::StaleCell`] if the row is borrowed and the parser has
    /// moved on since it was cached.
    pub fn cell<'a, S>(&'a self, index: usize, source: &'a S) -> Result<Option<Cell<'a>>>
    where
        S: SpanSource + ?Sized,
    {
        match &self.cells {
            RowCells::Owned(cells) => Ok(cells.get(index).map(|c| Cell {
                bytes: &c.bytes,
                quoted: c.quoted,
            })),
            RowCells::Borrowed { generation, spans } => match spans.get(index) {
                Some(&span) => Ok(Some(Cell {
                    bytes: source.resolve(span, *generation)?,
                    quoted: span.quoted,
                })),
                None => Ok(None),
            },
        }
    }

    /// Owned cells, or `None` for a borrowed row.
    #[must_use]
    pub fn owned_cells(&self) -> Option<&[OwnedCell]> {
        match &self.cells {
            RowCells::Owned(cells) => Some(cells),
            RowCells::Borrowed { .. } => None,
        }
    }
}

/// Ordered FIFO of cached rows.
#[derive(Debug, Default)]
pub struct RowCache {
    rows: VecDeque<CachedRow>,
}

impl RowCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row at the tail.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::OutOfMemory`] if the queue cannot grow; the row is
    /// dropped.
    pub fn append(&mut self, row: CachedRow) -> Result<()> {
        self.rows
            .try_reserve_exact(1)
            .map_err(|_| CsvTabError::OutOfMemory)?;
        self.rows.push_back(row);
        Ok(())
    }

    /// Remove the head row. Returns whether there was one.
    pub fn pop_front(&mut self) -> bool {
        self.rows.pop_front().is_some()
    }

    #[must_use]
    pub fn head(&self) -> Option<&CachedRow> {
        self.rows.front()
    }

    #[must_use]
    pub fn head_id(&self) -> Option<i64> {
        self.rows.front().map(|row| row.id)
    }

    /// Cell `index` of the head row. `None` when the cache is empty or the
    /// index is past the end of the row; neither is an error.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::StaleCell`] for a borrowed span the parser has already
    /// overwritten.
    pub fn peek<'a, S>(&'a self, index: usize, source: &'a S) -> Result<Option<Cell<'a>>>
    where
        S: SpanSource + ?Sized,
    {
        match self.rows.front() {
            Some(row) => row.cell(index, source),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use csvtab_parser::{ParseStatus, ParserOptions};

    use super::*;

    fn parser(input: &str) -> CsvParser<Cursor<Vec<u8>>> {
        CsvParser::new(
            Cursor::new(input.as_bytes().to_vec()),
            ParserOptions::default(),
        )
        .unwrap()
    }

    fn next_row<F>(parser: &mut CsvParser<Cursor<Vec<u8>>>, id: i64, build: F) -> CachedRow
    where
        F: Fn(&Row<'_>, i64) -> Result<CachedRow>,
    {
        let mut out = None;
        let mut keep = |row: &Row<'_>| -> Result<()> {
            out = Some(build(row, id)?);
            Ok(())
        };
        assert_eq!(parser.parse_more(&mut keep).unwrap(), ParseStatus::Ok);
        out.unwrap()
    }

    #[test]
    fn test_owned_row_outlives_parser_steps() {
        let mut p = parser("h1,\"h 2\"\nx\ny\n");
        let header = next_row(&mut p, 0, CachedRow::owned);
        let _ = next_row(&mut p, 1, CachedRow::borrowed);
        let _ = next_row(&mut p, 2, CachedRow::borrowed);

        let cell = header.cell(1, &p).unwrap().unwrap();
        assert_eq!(cell.bytes, b"h 2");
        assert!(cell.quoted);
        assert_eq!(header.cell_count(), 2);
        assert_eq!(header.owned_cells().map(<[OwnedCell]>::len), Some(2));
    }

    #[test]
    fn test_borrowed_row_goes_stale() {
        let mut p = parser("a,b\nc,d\n");
        let row = next_row(&mut p, 1, CachedRow::borrowed);
        assert_eq!(row.cell(0, &p).unwrap().unwrap().bytes, b"a");
        assert!(row.owned_cells().is_none());

        let _ = next_row(&mut p, 2, CachedRow::borrowed);
        let err = row.cell(0, &p).unwrap_err();
        assert!(matches!(err, CsvTabError::StaleCell { .. }));
    }

    #[test]
    fn test_fifo_order_and_peek() {
        let mut p = parser("a,b\n");
        let mut cache = RowCache::new();
        assert!(cache.peek(0, &p).unwrap().is_none());
        assert!(!cache.pop_front());

        cache.append(next_row(&mut p, 7, CachedRow::owned)).unwrap();
        cache
            .append(CachedRow {
                id: 8,
                cells: RowCells::Owned(Vec::new()),
            })
            .unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.head_id(), Some(7));
        assert_eq!(cache.peek(1, &p).unwrap().unwrap().bytes, b"b");
        assert!(cache.peek(2, &p).unwrap().is_none());

        assert!(cache.pop_front());
        assert_eq!(cache.head_id(), Some(8));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.head_id(), None);
    }
}
