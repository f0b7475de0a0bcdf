//! Sources of cell overwrites, ordered by `(row, column)`.

use std::path::{Path, PathBuf};

use csvtab_error::{CsvTabError, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

const SQLITE3_PREFIX: &str = "sqlite3://";
const SQL_KEY: &str = "sql=";

/// Replace the cell at `(row, column)` with `value`. Row 0 is the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overwrite {
    pub row: u64,
    pub column: u64,
    pub value: Vec<u8>,
}

impl Overwrite {
    pub fn new(row: u64, column: u64, value: impl Into<Vec<u8>>) -> Self {
        Self {
            row,
            column,
            value: value.into(),
        }
    }
}

/// Yields overwrites in ascending `(row, column)` order.
pub trait OverwriteSource {
    /// The next overwrite, or `None` once exhausted.
    ///
    /// # Errors
    ///
    /// Source-specific read failures.
    fn next_overwrite(&mut self) -> Result<Option<Overwrite>>;
}

/// Overwrites held in memory.
#[derive(Debug, Default)]
pub struct VecOverwrites {
    items: std::vec::IntoIter<Overwrite>,
}

impl VecOverwrites {
    #[must_use]
    pub fn new(items: Vec<Overwrite>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl OverwriteSource for VecOverwrites {
    fn next_overwrite(&mut self) -> Result<Option<Overwrite>> {
        Ok(self.items.next())
    }
}

/// A parsed `sqlite3://<file>?sql=<query>` source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteSpec {
    pub path: PathBuf,
    pub sql: String,
}

impl SqliteSpec {
    /// # Errors
    ///
    /// [`CsvTabError::OverwriteSource`] for an unknown scheme, a missing file
    /// name or a missing `sql=` query.
    pub fn parse(source: &str) -> Result<Self> {
        let Some(rest) = source.strip_prefix(SQLITE3_PREFIX) else {
            return Err(CsvTabError::overwrite_source(format!(
                "Invalid overwrite source: {source}"
            )));
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };
        if path.is_empty() {
            return Err(CsvTabError::overwrite_source("Invalid query string"));
        }
        let sql = query
            .and_then(|q| q.find(SQL_KEY).map(|at| &q[at + SQL_KEY.len()..]))
            .filter(|sql| !sql.trim().is_empty())
            .ok_or_else(|| {
                CsvTabError::overwrite_source(
                    "Missing sql select statement for sqlite3 echo data e.g.: \
                     select row, column, value from overwrites order by row, column",
                )
            })?;
        Ok(Self {
            path: PathBuf::from(path),
            sql: sql.to_owned(),
        })
    }
}

/// Overwrites read from a SQLite query returning `row, column, value`.
///
/// The database is opened read-only and the query result is loaded when the
/// source is opened.
#[derive(Debug)]
pub struct SqliteOverwrites {
    rows: VecOverwrites,
}

impl SqliteOverwrites {
    /// Open `source`, a `sqlite3://` string.
    ///
    /// # Errors
    ///
    /// See [`SqliteSpec::parse`] and [`SqliteOverwrites::open`].
    pub fn from_source(source: &str) -> Result<Self> {
        let spec = SqliteSpec::parse(source)?;
        Self::open(&spec.path, &spec.sql)
    }

    /// Run `sql` against the database at `path`.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::OverwriteSource`] if the database cannot be opened, the
    /// query fails, or it returns fewer than three columns.
    pub fn open(path: &Path, sql: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| CsvTabError::overwrite_source(format!("{e}: {}", path.display())))?;
        let mut stmt = conn.prepare(sql).map_err(sqlite_error)?;
        if stmt.column_count() < 3 {
            return Err(CsvTabError::overwrite_source(
                "query must return row, column and value",
            ));
        }

        let rows = stmt
            .query_map([], |row| {
                let r: i64 = row.get(0)?;
                let c: i64 = row.get(1)?;
                let value = match row.get_ref(2)? {
                    ValueRef::Null => Vec::new(),
                    ValueRef::Integer(i) => i.to_string().into_bytes(),
                    ValueRef::Real(f) => f.to_string().into_bytes(),
                    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => bytes.to_vec(),
                };
                Ok((r, c, value))
            })
            .map_err(sqlite_error)?;

        let mut items = Vec::new();
        for row in rows {
            let (r, c, value) = row.map_err(sqlite_error)?;
            match (u64::try_from(r), u64::try_from(c)) {
                (Ok(row), Ok(column)) => items.push(Overwrite { row, column, value }),
                _ => debug!(row = r, column = c, "skipping overwrite at negative position"),
            }
        }
        info!(path = %path.display(), overwrites = items.len(), "overwrite source opened");
        Ok(Self {
            rows: VecOverwrites::new(items),
        })
    }
}

impl OverwriteSource for SqliteOverwrites {
    fn next_overwrite(&mut self) -> Result<Option<Overwrite>> {
        self.rows.next_overwrite()
    }
}

#[allow(clippy::needless_pass_by_value)]
fn sqlite_error(err: rusqlite::Error) -> CsvTabError {
    CsvTabError::overwrite_source(err.to_string())
}
