//! Push-style CSV parsing.
//!
//! [`CsvParser`] pulls bytes from a reader, tokenizes them with `csv_core`
//! and hands each completed row to a [`RowHandler`] callback. Rows are
//! delivered one per [`CsvParser::parse_more`] call; cell bytes borrowed
//! from a [`Row`] live in the parser's row buffer and stay valid until the
//! next call. Code that
//! wants to look at a row after the callback returns keeps its
//! [`CellSpan`]s and resolves them against the same generation.

pub mod options;
pub mod parser;
pub mod row;

pub use options::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_COLUMNS, DEFAULT_READ_CHUNK, ParserOptions};
pub use parser::{CsvParser, ParseStatus};
pub use row::{Cell, CellSpan, Row, RowHandler};
