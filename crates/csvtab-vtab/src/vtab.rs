//! Virtual table and cursor traits.
//!
//! Virtual tables expose external data sources as SQL tables. They follow
//! the SQLite xCreate/xConnect/xBestIndex/xOpen/xFilter/xNext protocol,
//! restricted to the read-only subset: there is no xUpdate and no
//! transaction hooks.

use csvtab_error::Result;

use crate::context::{ColumnContext, Cx};
use crate::index::IndexInfo;
use crate::value::SqliteValue;

/// A virtual table module.
///
/// The `Sized` bound on the constructors (`create`, `connect`) keeps the
/// remaining methods usable through the registry's type-erased adapter.
///
/// # Default Implementations
///
/// At minimum, implement `connect`, `best_index`, and `open`.
#[allow(clippy::missing_errors_doc)]
pub trait VirtualTable: Send + Sync {
    /// The cursor type for scanning this virtual table.
    type Cursor: VirtualTableCursor + 'static;

    /// Called for `CREATE VIRTUAL TABLE`.
    ///
    /// Default delegates to `connect`. A module that keeps the two distinct
    /// is not eponymous.
    fn create(cx: &mut Cx, args: &[&str]) -> Result<Self>
    where
        Self: Sized,
    {
        Self::connect(cx, args)
    }

    /// Called for subsequent opens of an existing virtual table.
    ///
    /// `args[0]` is the module name, `args[1]` the schema name, `args[2]`
    /// the table name; module arguments start at `args[3]`. The table must
    /// call [`Cx::declare_vtab`] before returning.
    fn connect(cx: &mut Cx, args: &[&str]) -> Result<Self>
    where
        Self: Sized;

    /// Inform the query planner about available indexes and their costs.
    fn best_index(&self, info: &mut IndexInfo) -> Result<()>;

    /// Open a new scan cursor.
    fn open(&self) -> Result<Self::Cursor>;

    /// Drop a virtual table instance (opposite of `connect`).
    fn disconnect(&mut self) -> Result<()> {
        Ok(())
    }

    /// Called for `DROP VIRTUAL TABLE`.
    ///
    /// Default delegates to `disconnect`.
    fn destroy(&mut self) -> Result<()> {
        self.disconnect()
    }
}

/// A cursor for scanning a virtual table.
///
/// Cursors are `Send` but not `Sync`. Closing a cursor is dropping it.
///
/// # Lifecycle
///
/// 1. [`filter`](Self::filter) begins a scan with planner-chosen parameters.
/// 2. Iterate: check [`eof`](Self::eof), read [`column`](Self::column)/[`rowid`](Self::rowid), advance with [`next`](Self::next).
/// 3. `filter` may be called again to restart from the first row.
#[allow(clippy::missing_errors_doc)]
pub trait VirtualTableCursor: Send {
    /// Begin a scan with the filter parameters chosen by `best_index`.
    fn filter(&mut self, idx_num: i32, idx_str: Option<&str>, args: &[SqliteValue])
    -> Result<()>;

    /// Advance to the next row.
    fn next(&mut self) -> Result<()>;

    /// Whether the cursor has moved past the last row.
    fn eof(&self) -> bool;

    /// Write the value of column `col` into `ctx`.
    fn column(&self, ctx: &mut ColumnContext, col: i32) -> Result<()>;

    /// Return the rowid of the current row.
    fn rowid(&self) -> Result<i64>;
}

#[cfg(test)]
mod tests {
    use csvtab_error::CsvTabError;

    use super::*;
    use crate::index::{ConstraintOp, IndexConstraint};

    // -- Mock: counter(stop) virtual table --

    struct Counter {
        stop: i64,
        destroyed: bool,
    }

    struct CounterCursor {
        stop: i64,
        current: i64,
    }

    impl VirtualTable for Counter {
        type Cursor = CounterCursor;

        fn connect(cx: &mut Cx, args: &[&str]) -> Result<Self> {
            let stop = args
                .get(3)
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| CsvTabError::bad_parameter(args.get(3).copied().unwrap_or("")))?;
            cx.declare_vtab("CREATE TABLE x(value TEXT)")?;
            Ok(Self {
                stop,
                destroyed: false,
            })
        }

        fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
            info.estimated_cost = 10.0;
            info.idx_num = 1;
            if !info.constraints.is_empty() && info.constraints[0].usable {
                info.constraint_usage[0].argv_index = 1;
            }
            Ok(())
        }

        fn open(&self) -> Result<CounterCursor> {
            Ok(CounterCursor {
                stop: self.stop,
                current: 0,
            })
        }

        fn destroy(&mut self) -> Result<()> {
            self.destroyed = true;
            Ok(())
        }
    }

    impl VirtualTableCursor for CounterCursor {
        fn filter(
            &mut self,
            _idx_num: i32,
            _idx_str: Option<&str>,
            args: &[SqliteValue],
        ) -> Result<()> {
            self.current = args
                .first()
                .and_then(SqliteValue::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            Ok(())
        }

        fn next(&mut self) -> Result<()> {
            self.current += 1;
            Ok(())
        }

        fn eof(&self) -> bool {
            self.current > self.stop
        }

        fn column(&self, ctx: &mut ColumnContext, _col: i32) -> Result<()> {
            ctx.set_text_bytes(self.current.to_string().as_bytes());
            Ok(())
        }

        fn rowid(&self) -> Result<i64> {
            Ok(self.current)
        }
    }

    #[test]
    fn test_vtab_create_delegates_to_connect() {
        let mut cx = Cx::new();
        let vtab = Counter::create(&mut cx, &["counter", "main", "c", "3"]).unwrap();
        assert_eq!(vtab.stop, 3);
        assert!(!vtab.destroyed);
        assert_eq!(cx.declared_schema().unwrap().columns.len(), 1);
    }

    #[test]
    fn test_vtab_connect_error_propagates() {
        let mut cx = Cx::new();
        let err = Counter::connect(&mut cx, &["counter", "main", "c", "x"])
            .err()
            .unwrap();
        assert!(matches!(err, CsvTabError::BadParameter { .. }));
    }

    #[test]
    fn test_vtab_best_index_populates_info() {
        let mut cx = Cx::new();
        let vtab = Counter::connect(&mut cx, &["counter", "main", "c", "5"]).unwrap();
        let mut info = IndexInfo::new(vec![IndexConstraint {
            column: 0,
            op: ConstraintOp::Gt,
            usable: true,
        }]);
        vtab.best_index(&mut info).unwrap();
        assert_eq!(info.idx_num, 1);
        assert_eq!(info.constraint_usage[0].argv_index, 1);
    }

    #[test]
    fn test_vtab_cursor_filter_next_eof() {
        let mut cx = Cx::new();
        let vtab = Counter::connect(&mut cx, &["counter", "main", "c", "3"]).unwrap();
        let mut cursor = vtab.open().unwrap();
        cursor.filter(0, None, &[]).unwrap();

        let mut values = Vec::new();
        while !cursor.eof() {
            let mut ctx = ColumnContext::new();
            cursor.column(&mut ctx, 0).unwrap();
            values.push((cursor.rowid().unwrap(), ctx.take_value().unwrap()));
            cursor.next().unwrap();
        }
        assert_eq!(
            values,
            vec![
                (1, SqliteValue::from("1")),
                (2, SqliteValue::from("2")),
                (3, SqliteValue::from("3")),
            ]
        );
    }

    #[test]
    fn test_vtab_destroy_vs_disconnect() {
        let mut cx = Cx::new();
        let mut vtab = Counter::connect(&mut cx, &["counter", "main", "c", "1"]).unwrap();
        vtab.disconnect().unwrap();
        assert!(!vtab.destroyed);
        vtab.destroy().unwrap();
        assert!(vtab.destroyed);
    }
}
