//! Contexts passed from the host into virtual table hooks.
//!
//! [`Cx`] plays the role of the `sqlite3*` handle a constructor receives:
//! it is where the table declares its schema and sets its configuration.
//! [`ColumnContext`] is the `sqlite3_context*` a column read writes into.

use csvtab_error::{CsvTabError, Result};
use sqlparser::ast::{DataType, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use tracing::debug;

use crate::value::SqliteValue;

// ---------------------------------------------------------------------------
// Connect context
// ---------------------------------------------------------------------------

/// Options a table may set on itself while it is being constructed.
///
/// Analogous to `sqlite3_vtab_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VtabConfig {
    /// The table may only be used from top-level SQL, never from triggers
    /// or views stored in the schema.
    DirectOnly,
}

/// A column as accepted by [`Cx::declare_vtab`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredColumn {
    pub name: String,
    pub decl_type: Option<String>,
}

/// The schema a table declared during create/connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredSchema {
    pub table: String,
    pub columns: Vec<DeclaredColumn>,
}

impl DeclaredSchema {
    /// Column names in declaration order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Host-side context handed to [`VirtualTable::create`] and
/// [`VirtualTable::connect`].
///
/// [`VirtualTable::create`]: crate::VirtualTable::create
/// [`VirtualTable::connect`]: crate::VirtualTable::connect
#[derive(Debug, Default)]
pub struct Cx {
    declared: Option<DeclaredSchema>,
    direct_only: bool,
    warnings: Vec<String>,
}

impl Cx {
    /// Create an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the table's columns with a `CREATE TABLE` statement.
    ///
    /// The statement is validated the way the host would: it must parse as
    /// a single SQLite `CREATE TABLE`, name at least one column, and column
    /// names must be unique ignoring ASCII case. A second call replaces the
    /// first declaration.
    pub fn declare_vtab(&mut self, sql: &str) -> Result<()> {
        let schema = parse_create_table(sql).map_err(|detail| CsvTabError::Schema {
            sql: sql.to_owned(),
            detail,
        })?;
        debug!(
            table = %schema.table,
            columns = schema.columns.len(),
            "vtab: schema declared"
        );
        self.declared = Some(schema);
        Ok(())
    }

    /// The schema accepted by the last successful [`Self::declare_vtab`].
    #[must_use]
    pub fn declared_schema(&self) -> Option<&DeclaredSchema> {
        self.declared.as_ref()
    }

    /// Apply a table configuration option.
    pub fn vtab_config(&mut self, config: VtabConfig) {
        match config {
            VtabConfig::DirectOnly => self.direct_only = true,
        }
    }

    /// Whether [`VtabConfig::DirectOnly`] was set.
    #[must_use]
    pub const fn is_direct_only(&self) -> bool {
        self.direct_only
    }

    /// Record a non-fatal message for the statement that created the table.
    pub fn warn(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Messages recorded through [`Self::warn`].
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub(crate) fn into_parts(self) -> (Option<DeclaredSchema>, bool, Vec<String>) {
        (self.declared, self.direct_only, self.warnings)
    }
}

// ---------------------------------------------------------------------------
// Column context
// ---------------------------------------------------------------------------

/// A context object passed to [`VirtualTableCursor::column`] for writing
/// the column value.
///
/// Analogous to C SQLite's `sqlite3_context*` used with `sqlite3_result_*`.
/// Every setter copies its input, so a cursor may hand over bytes that are
/// only valid for the duration of the call.
///
/// [`VirtualTableCursor::column`]: crate::VirtualTableCursor::column
#[derive(Debug, Default)]
pub struct ColumnContext {
    value: Option<SqliteValue>,
}

impl ColumnContext {
    /// Create a new empty column context.
    #[must_use]
    pub fn new() -> Self {
        Self { value: None }
    }

    /// Set a text result, copying `bytes` unchanged before returning.
    pub fn set_text_bytes(&mut self, bytes: &[u8]) {
        self.value = Some(SqliteValue::Text(bytes.to_vec()));
    }

    /// Set a NULL result.
    pub fn set_null(&mut self) {
        self.value = Some(SqliteValue::Null);
    }

    /// Take the value out of this context, leaving `None`.
    pub fn take_value(&mut self) -> Option<SqliteValue> {
        self.value.take()
    }
}

// ---------------------------------------------------------------------------
// CREATE TABLE validation
// ---------------------------------------------------------------------------

/// Parse `CREATE TABLE name(col [type], ...)` into a [`DeclaredSchema`].
fn parse_create_table(sql: &str) -> std::result::Result<DeclaredSchema, String> {
    let mut statements =
        Parser::parse_sql(&SQLiteDialect {}, sql).map_err(|e| e.to_string())?;
    if statements.len() != 1 {
        return Err(format!(
            "expected one CREATE TABLE statement, found {}",
            statements.len()
        ));
    }
    let Some(Statement::CreateTable(create)) = statements.pop() else {
        return Err("not a CREATE TABLE statement".to_owned());
    };
    if create.columns.is_empty() {
        return Err("table has no columns".to_owned());
    }

    let mut columns: Vec<DeclaredColumn> = Vec::with_capacity(create.columns.len());
    for def in create.columns {
        let name = def.name.value;
        if columns.iter().any(|c| c.name.eq_ignore_ascii_case(&name)) {
            return Err(format!("duplicate column name: {name}"));
        }
        let decl_type = match def.data_type {
            DataType::Unspecified => None,
            other => Some(other.to_string()),
        };
        columns.push(DeclaredColumn { name, decl_type });
    }

    Ok(DeclaredSchema {
        table: create.name.to_string(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_simple_schema() {
        let mut cx = Cx::new();
        cx.declare_vtab(r#"CREATE TABLE x("a" TEXT,"b" TEXT)"#)
            .unwrap();
        let schema = cx.declared_schema().unwrap();
        assert_eq!(schema.table, "x");
        assert_eq!(schema.column_names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(schema.columns[0].decl_type.as_deref(), Some("TEXT"));
    }

    #[test]
    fn test_declare_quoted_identifiers() {
        let mut cx = Cx::new();
        cx.declare_vtab(
            "create table t(\"he said \"\"hi\"\"\" TEXT, [odd name], `tick`, plain NUMERIC(10, 2));",
        )
        .unwrap();
        let names: Vec<_> = cx.declared_schema().unwrap().column_names().collect();
        assert_eq!(names, vec!["he said \"hi\"", "odd name", "tick", "plain"]);
        assert_eq!(
            cx.declared_schema().unwrap().columns[3].decl_type.as_deref(),
            Some("NUMERIC(10,2)")
        );
    }

    #[test]
    fn test_declare_rejects_duplicates_ignoring_case() {
        let mut cx = Cx::new();
        let err = cx
            .declare_vtab(r#"CREATE TABLE x("a" TEXT,"A" TEXT)"#)
            .unwrap_err();
        match err {
            CsvTabError::Schema { detail, .. } => {
                assert_eq!(detail, "duplicate column name: A");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(cx.declared_schema().is_none());
    }

    #[test]
    fn test_declare_rejects_garbage() {
        let mut cx = Cx::new();
        assert!(cx.declare_vtab("SELECT 1").is_err());
        assert!(cx.declare_vtab("CREATE TABLE x(").is_err());
        assert!(cx.declare_vtab("CREATE TABLE x()").is_err());
        assert!(cx.declare_vtab(r#"CREATE TABLE x("a) "#).is_err());
        assert!(cx.declare_vtab("CREATE TABLE x(a) trailing").is_err());
        assert!(cx.declare_vtab("CREATE TABLE x(a); CREATE TABLE y(b)").is_err());
    }

    #[test]
    fn test_config_and_warnings() {
        let mut cx = Cx::new();
        assert!(!cx.is_direct_only());
        cx.vtab_config(VtabConfig::DirectOnly);
        assert!(cx.is_direct_only());
        cx.warn("column 1 is blank");
        assert_eq!(cx.warnings(), ["column 1 is blank".to_owned()]);
    }

    #[test]
    fn test_column_context_lifecycle() {
        let mut ctx = ColumnContext::new();
        assert!(ctx.take_value().is_none());

        let scratch = b"borrowed \xe9".to_vec();
        ctx.set_text_bytes(&scratch);
        drop(scratch);
        assert_eq!(
            ctx.take_value(),
            Some(SqliteValue::Text(b"borrowed \xe9".to_vec()))
        );

        ctx.set_null();
        assert_eq!(ctx.take_value(), Some(SqliteValue::Null));
        assert!(ctx.take_value().is_none());
    }
}
