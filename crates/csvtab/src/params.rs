//! `key=value` arguments given to `CREATE VIRTUAL TABLE ... USING csv(...)`.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use csvtab_error::{CsvTabError, Result};

/// Upper bound for `max_columns=`; also its default.
pub const MAX_COLUMNS_LIMIT: usize = 2000;

/// `testflags` bit: report a cheap plan when an equality constraint is usable.
pub const TESTFLAG_EQ_INDEX: u32 = 0x0001;

/// A rewindable byte source.
pub trait Source: Read + Seek + Send {}

impl<T: Read + Seek + Send> Source for T {}

/// Where the table's rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSpec<'a> {
    File(&'a Path),
    Inline(&'a str),
}

impl SourceSpec<'_> {
    /// Open the source for reading from the start.
    ///
    /// # Errors
    ///
    /// [`CsvTabError::CannotOpen`] if the file cannot be opened.
    pub fn open(self) -> Result<Box<dyn Source>> {
        match self {
            Self::File(path) => {
                let file = File::open(path).map_err(|source| CsvTabError::CannotOpen {
                    path: path.to_path_buf(),
                    source,
                })?;
                Ok(Box::new(file))
            }
            Self::Inline(text) => Ok(Box::new(Cursor::new(text.as_bytes().to_vec()))),
        }
    }
}

/// Validated connect parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableParams {
    pub filename: Option<PathBuf>,
    pub data: Option<String>,
    /// Opaque passthrough; kept on the table but not interpreted.
    pub options_used: Option<String>,
    pub max_columns: usize,
    pub test_flags: u32,
}

impl Default for TableParams {
    fn default() -> Self {
        Self {
            filename: None,
            data: None,
            options_used: None,
            max_columns: MAX_COLUMNS_LIMIT,
            test_flags: 0,
        }
    }
}

impl TableParams {
    /// Parse module arguments (everything after module, schema and table
    /// name).
    ///
    /// # Errors
    ///
    /// Unknown or repeated keys, an out-of-range `max_columns`, or a missing
    /// or doubled source.
    pub fn parse(args: &[&str]) -> Result<Self> {
        let mut params = Self::default();
        let mut seen_max_columns = false;
        let mut seen_test_flags = false;

        for &arg in args {
            let Some((key, value)) = split_parameter(arg) else {
                return Err(CsvTabError::bad_parameter(arg));
            };
            match key {
                "filename" => set_once(&mut params.filename, key, PathBuf::from(value))?,
                "data" => set_once(&mut params.data, key, value)?,
                "options_used" => set_once(&mut params.options_used, key, value)?,
                "max_columns" => {
                    if std::mem::replace(&mut seen_max_columns, true) {
                        return Err(duplicate(key));
                    }
                    params.max_columns = parse_max_columns(&value)?;
                }
                "testflags" if cfg!(any(test, feature = "testflags")) => {
                    if std::mem::replace(&mut seen_test_flags, true) {
                        return Err(duplicate(key));
                    }
                    params.test_flags = value
                        .parse()
                        .map_err(|_| CsvTabError::bad_parameter(arg))?;
                }
                _ => return Err(CsvTabError::bad_parameter(arg)),
            }
        }

        match (&params.filename, &params.data) {
            (None, None) => Err(CsvTabError::MissingSource),
            (Some(path), None) if path.as_os_str().is_empty() => Err(CsvTabError::MissingSource),
            (Some(_), Some(_)) => Err(CsvTabError::ConflictingSource),
            _ => Ok(params),
        }
    }

    /// The configured source. `parse` guarantees exactly one is set.
    #[must_use]
    pub fn source(&self) -> SourceSpec<'_> {
        match (&self.filename, &self.data) {
            (Some(path), _) => SourceSpec::File(path),
            (None, Some(text)) => SourceSpec::Inline(text),
            (None, None) => SourceSpec::Inline(""),
        }
    }

    #[must_use]
    pub const fn has_test_flag(&self, flag: u32) -> bool {
        self.test_flags & flag != 0
    }
}

fn duplicate(key: &str) -> CsvTabError {
    CsvTabError::DuplicateParameter {
        name: key.to_owned(),
    }
}

fn set_once<T>(slot: &mut Option<T>, key: &str, value: impl Into<T>) -> Result<()> {
    if slot.is_some() {
        return Err(duplicate(key));
    }
    *slot = Some(value.into());
    Ok(())
}

fn parse_max_columns(value: &str) -> Result<usize> {
    match value.parse::<usize>() {
        Ok(n) if (1..=MAX_COLUMNS_LIMIT).contains(&n) => Ok(n),
        _ => Err(CsvTabError::MaxColumnsOutOfRange {
            value: value.to_owned(),
            max: MAX_COLUMNS_LIMIT,
        }),
    }
}

/// Split `KEY = VALUE` and dequote the value. `None` if there is no `=` or
/// the key is empty.
fn split_parameter(arg: &str) -> Option<(&str, String)> {
    let (key, value) = arg.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key, dequote(value.trim())))
}

/// Strip one layer of SQL-style quoting: `'..'`, `".."` and `` `..` `` with
/// the quote doubled inside, or `[..]`.
fn dequote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() < 2 {
        return value.to_owned();
    }
    let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
    let inner = &value[1..value.len() - 1];
    match first {
        b'\'' | b'"' | b'`' if last == first => {
            let quote = char::from(first);
            inner.replace(&format!("{quote}{quote}"), &quote.to_string())
        }
        b'[' if last == b']' => inner.to_owned(),
        _ => value.to_owned(),
    }
}
