//! The `csv` virtual table.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use csvtab_error::{CsvTabError, Result};
use csvtab_parser::ParserOptions;
use csvtab_vtab::{Cx, FULL_SCAN_COST, IndexInfo, VirtualTable, VtabConfig};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::bridge::{Advance, ParserBridge};
use crate::cache::RowCache;
use crate::cursor::CsvCursor;
use crate::params::{TESTFLAG_EQ_INDEX, TableParams};
use crate::schema::HeaderColumns;

/// Cost reported when the equality test flag is set and applies.
const EQ_INDEX_COST: f64 = 10.0;

/// Parse session plus the two row caches. The data cache holds at most one
/// row at a time.
#[derive(Debug)]
pub(crate) struct TableState {
    pub(crate) bridge: ParserBridge,
    pub(crate) header: RowCache,
    pub(crate) data: RowCache,
}

impl TableState {
    /// One bridge step; on exhaustion, flush a trailing unterminated row.
    pub(crate) fn pull(&mut self) -> Result<()> {
        let Self {
            bridge,
            header,
            data,
        } = self;
        if bridge.advance(header, data)? == Advance::Exhausted {
            bridge.finish(header, data)?;
        }
        Ok(())
    }
}

/// State shared between a table and its cursor.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) name: String,
    pub(crate) state: Mutex<TableState>,
    pub(crate) cursor_open: AtomicBool,
}

/// A CSV source exposed as a table of text columns.
#[derive(Debug)]
pub struct CsvTable {
    shared: Arc<Shared>,
    params: TableParams,
    columns: Vec<String>,
}

impl CsvTable {
    /// Declared column names, in header order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The `options_used=` passthrough, if given.
    #[must_use]
    pub fn options_used(&self) -> Option<&str> {
        self.params.options_used.as_deref()
    }

    #[must_use]
    pub const fn params(&self) -> &TableParams {
        &self.params
    }

    /// Whether a cursor is currently open on this table.
    #[must_use]
    pub fn has_open_cursor(&self) -> bool {
        self.shared.cursor_open.load(Ordering::Acquire)
    }
}

impl VirtualTable for CsvTable {
    type Cursor = CsvCursor;

    fn connect(cx: &mut Cx, args: &[&str]) -> Result<Self> {
        let name = args.get(2).copied().unwrap_or("x").to_owned();
        let params = TableParams::parse(args.get(3..).unwrap_or_default())?;

        let source = params.source().open()?;
        let options = ParserOptions::default().with_max_columns(params.max_columns);
        let mut state = TableState {
            bridge: ParserBridge::new(source, options)?,
            header: RowCache::new(),
            data: RowCache::new(),
        };
        // A source without any line terminator only yields its header on
        // finish.
        state.pull()?;

        let Some(header) = state.header.head().and_then(|row| row.owned_cells()) else {
            return Err(CsvTabError::NoHeader);
        };
        let columns = HeaderColumns::infer(header);
        for &i in &columns.blank {
            warn!(table = %name, column = i, "blank column name");
            cx.warn(format!("Error in column {i}: name may not be blank"));
        }

        let sql = columns.create_table_sql();
        debug!(table = %name, %sql, "declaring csv schema");
        cx.declare_vtab(&sql)?;
        cx.vtab_config(VtabConfig::DirectOnly);

        info!(
            table = %name,
            columns = columns.names.len(),
            max_columns = params.max_columns,
            "csv table connected"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                name,
                state: Mutex::new(state),
                cursor_open: AtomicBool::new(false),
            }),
            params,
            columns: columns.names,
        })
    }

    fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
        info.estimated_cost = FULL_SCAN_COST;
        if self.params.has_test_flag(TESTFLAG_EQ_INDEX) {
            if let Some(i) = info.first_usable_eq() {
                info.estimated_cost = EQ_INDEX_COST;
                info.constraint_usage[i].argv_index = 1;
            }
        }
        Ok(())
    }

    fn open(&self) -> Result<CsvCursor> {
        if self.shared.cursor_open.swap(true, Ordering::AcqRel) {
            return Err(CsvTabError::CursorBusy {
                table: self.shared.name.clone(),
            });
        }
        Ok(CsvCursor::new(Arc::clone(&self.shared)))
    }

    fn disconnect(&mut self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.data.clear();
        state.header.clear();
        state.bridge.close();
        info!(table = %self.shared.name, "csv table disconnected");
        Ok(())
    }
}
