//! Pull-style cursor over a [`CsvTable`](crate::CsvTable).
//!
//! The cursor keeps no position of its own. The current row is the head of
//! the table's data cache, and the cursor only decides when to pop it and
//! when to ask the bridge for the next one.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use csvtab_error::Result;
use csvtab_vtab::{ColumnContext, SqliteValue, VirtualTableCursor};
use tracing::debug;

use crate::table::Shared;

/// Returned by `rowid` when no row is current.
pub const NO_ROWID: i64 = -1;

/// The single open scan of a table. Dropping it frees the table for the next
/// cursor.
#[derive(Debug)]
pub struct CsvCursor {
    shared: Arc<Shared>,
}

impl CsvCursor {
    pub(crate) const fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }
}

impl VirtualTableCursor for CsvCursor {
    fn filter(
        &mut self,
        _idx_num: i32,
        _idx_str: Option<&str>,
        _args: &[SqliteValue],
    ) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.data.clear();
        let header_cached = !state.header.is_empty();
        state.bridge.rewind(header_cached)?;
        debug!(table = %self.shared.name, "csv scan started");
        state.pull()
    }

    fn next(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.data.pop_front();
        if state.data.is_empty() {
            state.pull()?;
        }
        Ok(())
    }

    fn eof(&self) -> bool {
        let state = self.shared.state.lock();
        state.data.is_empty() && state.bridge.is_done()
    }

    fn column(&self, ctx: &mut ColumnContext, col: i32) -> Result<()> {
        let state = self.shared.state.lock();
        let Ok(index) = usize::try_from(col) else {
            ctx.set_null();
            return Ok(());
        };
        match state.data.peek(index, &state.bridge)? {
            Some(cell) => ctx.set_text_bytes(cell.bytes),
            None => ctx.set_null(),
        }
        Ok(())
    }

    fn rowid(&self) -> Result<i64> {
        Ok(self.shared.state.lock().data.head_id().unwrap_or(NO_ROWID))
    }
}

impl Drop for CsvCursor {
    fn drop(&mut self) {
        self.shared.cursor_open.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use csvtab_error::CsvTabError;
    use csvtab_vtab::{Cx, VirtualTable};

    use super::*;
    use crate::CsvTable;

    fn open(data: &str) -> (CsvTable, CsvCursor) {
        let mut cx = Cx::new();
        let arg = format!("data={data}");
        let table = CsvTable::connect(&mut cx, &["csv", "main", "t", &arg]).unwrap();
        let cursor = table.open().unwrap();
        (table, cursor)
    }

    fn text(cursor: &CsvCursor, col: i32) -> SqliteValue {
        let mut ctx = ColumnContext::new();
        cursor.column(&mut ctx, col).unwrap();
        ctx.take_value().unwrap()
    }

    #[test]
    fn test_scan_yields_rows_in_order() {
        let (_table, mut cursor) = open("a,b\n1,2\n3,4\n");
        cursor.filter(0, None, &[]).unwrap();
        assert!(!cursor.eof());
        assert_eq!(cursor.rowid().unwrap(), 1);
        assert_eq!(text(&cursor, 0), SqliteValue::from("1"));
        assert_eq!(text(&cursor, 1), SqliteValue::from("2"));

        cursor.next().unwrap();
        assert_eq!(cursor.rowid().unwrap(), 2);
        assert_eq!(text(&cursor, 0), SqliteValue::from("3"));

        cursor.next().unwrap();
        assert!(cursor.eof());
        assert_eq!(cursor.rowid().unwrap(), NO_ROWID);
        assert_eq!(text(&cursor, 0), SqliteValue::Null);
    }

    #[test]
    fn test_rowid_before_filter() {
        let (_table, cursor) = open("a\n1\n");
        assert_eq!(cursor.rowid().unwrap(), NO_ROWID);
    }

    #[test]
    fn test_header_only_is_empty() {
        let (_table, mut cursor) = open("a,b\n");
        cursor.filter(0, None, &[]).unwrap();
        assert!(cursor.eof());
    }

    #[test]
    fn test_refilter_restarts_at_one() {
        let (_table, mut cursor) = open("h\nx\ny\nz\n");
        cursor.filter(0, None, &[]).unwrap();
        cursor.next().unwrap();
        assert_eq!(cursor.rowid().unwrap(), 2);

        cursor.filter(0, None, &[]).unwrap();
        assert_eq!(cursor.rowid().unwrap(), 1);
        assert_eq!(text(&cursor, 0), SqliteValue::from("x"));
    }

    #[test]
    fn test_short_row_and_out_of_range_columns() {
        let (_table, mut cursor) = open("a,b,c\n1,\n");
        cursor.filter(0, None, &[]).unwrap();
        assert_eq!(text(&cursor, 0), SqliteValue::from("1"));
        assert_eq!(text(&cursor, 1), SqliteValue::from(""));
        assert_eq!(text(&cursor, 2), SqliteValue::Null);
        assert_eq!(text(&cursor, -1), SqliteValue::Null);
    }

    #[test]
    fn test_repeated_reads_are_stable() {
        let (_table, mut cursor) = open("a\n\"q\"\"x\"\n");
        cursor.filter(0, None, &[]).unwrap();
        for _ in 0..3 {
            assert!(!cursor.eof());
            assert_eq!(text(&cursor, 0), SqliteValue::from("q\"x"));
        }
    }

    #[test]
    fn test_trailing_row_without_newline() {
        let (_table, mut cursor) = open("a\n1\n2");
        cursor.filter(0, None, &[]).unwrap();
        cursor.next().unwrap();
        assert_eq!(cursor.rowid().unwrap(), 2);
        assert_eq!(text(&cursor, 0), SqliteValue::from("2"));
        cursor.next().unwrap();
        assert!(cursor.eof());
    }

    #[test]
    fn test_mid_scan_error_ends_scan() {
        let mut cx = Cx::new();
        let table = CsvTable::connect(
            &mut cx,
            &["csv", "main", "t", "data=a\n1\n2,3\n4\n", "max_columns=1"],
        )
        .unwrap();
        let mut cursor = table.open().unwrap();
        cursor.filter(0, None, &[]).unwrap();
        assert_eq!(cursor.rowid().unwrap(), 1);

        let err = cursor.next().unwrap_err();
        assert!(matches!(err, CsvTabError::TooManyColumns { .. }));
        assert!(cursor.eof());
        let again = cursor.next().unwrap_err();
        assert_eq!(again.to_string(), err.to_string());
        assert!(cursor.eof());
    }
}
