use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for csvtab operations.
///
/// Variants are grouped the way a connect or scan can fail: configuration,
/// source, parse, schema, cursor, host and resource errors. Every variant
/// maps onto a SQLite result code via [`CsvTabError::error_code`] so the
/// host engine can report it without knowing this type.
#[derive(Error, Debug)]
pub enum CsvTabError {
    // === Configuration Errors ===
    /// Neither `filename=` nor `data=` was supplied.
    #[error("No csv filename provided")]
    MissingSource,

    /// Both `filename=` and `data=` were supplied.
    #[error("must specify either filename= or data= but not both")]
    ConflictingSource,

    /// A parameter appeared more than once.
    #[error("more than one '{name}' parameter")]
    DuplicateParameter { name: String },

    /// A parameter was not recognised or could not be parsed.
    #[error("bad parameter: '{param}'")]
    BadParameter { param: String },

    /// `max_columns=` outside the accepted range.
    #[error("max_columns= value must be between 1 and {max}")]
    MaxColumnsOutOfRange { value: String, max: usize },

    // === Source Errors ===
    /// The source file could not be opened.
    #[error("Unable to open for reading: {}", path.display())]
    CannotOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error while reading the source or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Parse Errors ===
    /// A row had more cells than the configured ceiling.
    #[error("too many columns: row {row} has more than {max}")]
    TooManyColumns { row: u64, max: usize },

    /// A single row did not fit into the parser buffer.
    #[error("row too large: row {row} exceeds {max} bytes")]
    RowTooLarge { row: u64, max: usize },

    /// The source produced no header row.
    #[error(
        "No rows of data parsed (first row is too large? Try using a larger max_row_size)"
    )]
    NoHeader,

    /// Any other parse failure, carrying the parser's status description.
    #[error("{0}")]
    Parse(String),

    // === Schema Errors ===
    /// The host rejected the generated schema declaration.
    #[error("bad schema: '{sql}' - {detail}")]
    Schema { sql: String, detail: String },

    /// A table was created without declaring its schema.
    #[error("vtab constructor did not declare a schema")]
    NoSchemaDeclared,

    // === Cursor Errors ===
    /// A borrowed cell was read after the parser stepped past it.
    #[error("stale cell: cached at parser step {cached}, parser is at step {current}")]
    StaleCell { cached: u64, current: u64 },

    /// A second cursor was opened while another scan was live.
    #[error("table {table} already has an open cursor")]
    CursorBusy { table: String },

    // === Host Errors ===
    /// No module registered under this name.
    #[error("no such module: {name}")]
    NoSuchModule { name: String },

    /// A module with this name is already registered.
    #[error("module {name} already exists")]
    ModuleExists { name: String },

    /// A direct-only table was used from a trigger or view.
    #[error("unsafe use of virtual table \"{table}\"")]
    UnsafeUse { table: String },

    // === Echo Errors ===
    /// The overwrite source could not be opened or queried.
    #[error("overwrite source: {detail}")]
    OverwriteSource { detail: String },

    // === Internal Errors ===
    /// Out of memory while caching a row.
    #[error("out of memory")]
    OutOfMemory,

    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// SQLite result/error codes.
///
/// These match the numeric values from C SQLite's `sqlite3.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    /// Successful result.
    Ok = 0,
    /// Generic error.
    Error = 1,
    /// Internal logic error.
    Internal = 2,
    /// Table is locked.
    Locked = 6,
    /// Out of memory.
    NoMem = 7,
    /// Disk I/O error.
    IoErr = 10,
    /// Unable to open file.
    CantOpen = 14,
    /// Database schema has changed or is invalid.
    Schema = 17,
    /// String or BLOB exceeds size limit.
    TooBig = 18,
    /// Library used incorrectly.
    Misuse = 21,
    /// Bind parameter or argument out of range.
    Range = 25,
}

impl CsvTabError {
    /// Map this error to a SQLite error code.
    #[allow(clippy::match_same_arms)]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::MissingSource
            | Self::ConflictingSource
            | Self::DuplicateParameter { .. }
            | Self::BadParameter { .. }
            | Self::NoHeader
            | Self::Parse(_)
            | Self::TooManyColumns { .. }
            | Self::NoSuchModule { .. }
            | Self::ModuleExists { .. }
            | Self::UnsafeUse { .. }
            | Self::OverwriteSource { .. } => ErrorCode::Error,
            Self::MaxColumnsOutOfRange { .. } => ErrorCode::Range,
            Self::CannotOpen { .. } => ErrorCode::CantOpen,
            Self::Io(_) => ErrorCode::IoErr,
            Self::RowTooLarge { .. } => ErrorCode::TooBig,
            Self::Schema { .. } | Self::NoSchemaDeclared => ErrorCode::Schema,
            Self::StaleCell { .. } => ErrorCode::Misuse,
            Self::CursorBusy { .. } => ErrorCode::Locked,
            Self::OutOfMemory => ErrorCode::NoMem,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::MissingSource => Some("Pass filename=PATH or data=TEXT to the module"),
            Self::CannotOpen { .. } => Some("Check the file path and its read permissions"),
            Self::TooManyColumns { .. } | Self::MaxColumnsOutOfRange { .. } => {
                Some("Raise max_columns= (at most 2000) or check the delimiter")
            }
            Self::RowTooLarge { .. } | Self::NoHeader => {
                Some("Check that the input is CSV and its first row is not oversized")
            }
            Self::CursorBusy { .. } => Some("Finish or close the running scan first"),
            Self::UnsafeUse { .. } => Some("Query the table directly, not from a trigger or view"),
            Self::OverwriteSource { .. } => {
                Some("Use sqlite3://FILE?sql=SELECT row, column, value ... ORDER BY row, column")
            }
            _ => None,
        }
    }

    /// Get the process exit code for this error (for CLI use).
    pub const fn exit_code(&self) -> i32 {
        self.error_code() as i32
    }

    /// Create a bad-parameter error.
    pub fn bad_parameter(param: impl Into<String>) -> Self {
        Self::BadParameter {
            param: param.into(),
        }
    }

    /// Create a parse error carrying a status description.
    pub fn parse(detail: impl Into<String>) -> Self {
        Self::Parse(detail.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an overwrite-source error.
    pub fn overwrite_source(detail: impl Into<String>) -> Self {
        Self::OverwriteSource {
            detail: detail.into(),
        }
    }
}

/// Result type alias using `CsvTabError`.
pub type Result<T> = std::result::Result<T, CsvTabError>;
