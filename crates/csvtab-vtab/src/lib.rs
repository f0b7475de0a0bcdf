//! Virtual table extension surface.
//!
//! This crate defines the open, user-implementable traits a virtual table
//! module implements ([`VirtualTable`], [`VirtualTableCursor`]), the planner
//! types exchanged during index selection, and a small in-memory
//! [`ModuleRegistry`] that stands in for the host engine: it registers
//! modules by name, constructs tables, validates their declared schema and
//! drives scans.

pub mod context;
pub mod index;
pub mod registry;
pub mod value;
pub mod vtab;

pub use context::{ColumnContext, Cx, DeclaredColumn, DeclaredSchema, VtabConfig};
pub use index::{ConstraintOp, FULL_SCAN_COST, IndexConstraint, IndexConstraintUsage, IndexInfo};
pub use registry::{ErasedTable, ModuleRegistry, ScannedRow, TableAdapter, TableHandle, UseOrigin};
pub use value::SqliteValue;
pub use vtab::{VirtualTable, VirtualTableCursor};
