//! CSV sources as read-only virtual tables.
//!
//! ```text
//! CREATE VIRTUAL TABLE t USING csv(filename='data.csv', max_columns=50);
//! ```
//!
//! The first row of the source names the columns; every column is declared
//! as `TEXT`. Rows are produced by a push parser one at a time and held in a
//! single-row cache until the cursor moves on, so data cells are read
//! straight out of the parser buffer without copying. Only the header is
//! copied.
//!
//! The table may only be used from top-level statements, never from a
//! trigger or view stored in the schema, and it supports one open cursor at
//! a time.

pub mod bridge;
pub mod cache;
pub mod cursor;
pub mod params;
pub mod schema;
pub mod table;

use csvtab_error::Result;
use csvtab_vtab::ModuleRegistry;

pub use bridge::{Advance, BridgeStatus, ParserBridge};
pub use cache::{CachedRow, OwnedCell, RowCache, RowCells, SpanSource};
pub use cursor::{CsvCursor, NO_ROWID};
pub use params::{MAX_COLUMNS_LIMIT, Source, SourceSpec, TESTFLAG_EQ_INDEX, TableParams};
pub use schema::{BLANK_COLUMN_NAME_PREFIX, HeaderColumns};
pub use table::CsvTable;

/// Name the module registers under.
pub const MODULE_NAME: &str = "csv";

/// Register the `csv` module with `registry`.
///
/// # Errors
///
/// [`CsvTabError::ModuleExists`](csvtab_error::CsvTabError::ModuleExists) if
/// a module of that name is already registered.
pub fn register_csv_module(registry: &mut ModuleRegistry) -> Result<()> {
    registry.register_module::<CsvTable>(MODULE_NAME)
}
