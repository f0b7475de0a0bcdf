//! Write CSV input back out, optionally overwriting individual cells.
//!
//! Overwrites come from an [`OverwriteSource`] sorted by `(row, column)`
//! and are merge-joined against the parsed rows; row 0 is the header and is
//! always echoed unchanged.

pub mod echo;
pub mod overwrite;
pub mod writer;

pub use echo::{EchoOptions, EchoStats, echo};
pub use overwrite::{Overwrite, OverwriteSource, SqliteOverwrites, SqliteSpec, VecOverwrites};
pub use writer::CsvWriter;
