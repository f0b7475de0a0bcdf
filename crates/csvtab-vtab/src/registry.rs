//! A minimal host: module registration and table lifecycle.
//!
//! [`ModuleRegistry`] maps module names to constructors, the way
//! `sqlite3_create_module` does. A created table lives behind a
//! [`TableHandle`], which enforces the configuration the table asked for
//! (for example [`VtabConfig::DirectOnly`]) and drives scans.
//!
//! [`VtabConfig::DirectOnly`]: crate::VtabConfig::DirectOnly

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use csvtab_error::{CsvTabError, Result};
use tracing::{debug, info};

use crate::context::{ColumnContext, Cx, DeclaredSchema};
use crate::index::IndexInfo;
use crate::value::SqliteValue;
use crate::vtab::{VirtualTable, VirtualTableCursor};

/// Where a table reference comes from in the statement being run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UseOrigin {
    /// Top-level SQL typed or prepared by the application.
    Direct,
    /// The body of a trigger stored in the schema.
    Trigger,
    /// A view stored in the schema.
    View,
}

// ---------------------------------------------------------------------------
// Type erasure
// ---------------------------------------------------------------------------

/// Object-safe view of a [`VirtualTable`] instance.
pub trait ErasedTable: Send + Sync {
    fn best_index(&self, info: &mut IndexInfo) -> Result<()>;
    fn open(&self) -> Result<Box<dyn VirtualTableCursor>>;
    fn disconnect(&mut self) -> Result<()>;
    fn destroy(&mut self) -> Result<()>;
}

/// Wraps a concrete [`VirtualTable`] so the registry can store
/// heterogeneous tables behind a single trait object.
pub struct TableAdapter<T> {
    inner: T,
}

impl<T> TableAdapter<T> {
    /// Wrap a concrete table.
    pub const fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T: VirtualTable> ErasedTable for TableAdapter<T> {
    fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
        self.inner.best_index(info)
    }

    fn open(&self) -> Result<Box<dyn VirtualTableCursor>> {
        Ok(Box::new(self.inner.open()?))
    }

    fn disconnect(&mut self) -> Result<()> {
        self.inner.disconnect()
    }

    fn destroy(&mut self) -> Result<()> {
        self.inner.destroy()
    }
}

/// Object-safe constructor pair for a module.
trait ErasedModule: Send + Sync {
    fn create(&self, cx: &mut Cx, args: &[&str]) -> Result<Box<dyn ErasedTable>>;
    fn connect(&self, cx: &mut Cx, args: &[&str]) -> Result<Box<dyn ErasedTable>>;
}

struct ModuleAdapter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T: VirtualTable + 'static> ErasedModule for ModuleAdapter<T> {
    fn create(&self, cx: &mut Cx, args: &[&str]) -> Result<Box<dyn ErasedTable>> {
        Ok(Box::new(TableAdapter::new(T::create(cx, args)?)))
    }

    fn connect(&self, cx: &mut Cx, args: &[&str]) -> Result<Box<dyn ErasedTable>> {
        Ok(Box::new(TableAdapter::new(T::connect(cx, args)?)))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Registered virtual table modules, keyed by case-insensitive name.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn ErasedModule>>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under `name`.
    ///
    /// Fails with [`CsvTabError::ModuleExists`] if the name is taken.
    pub fn register_module<T>(&mut self, name: &str) -> Result<()>
    where
        T: VirtualTable + 'static,
    {
        let key = canonical_name(name);
        if self.modules.contains_key(&key) {
            return Err(CsvTabError::ModuleExists {
                name: name.to_owned(),
            });
        }
        self.modules.insert(
            key,
            Arc::new(ModuleAdapter::<T> {
                _marker: PhantomData,
            }),
        );
        info!(module = name, "vtab: module registered");
        Ok(())
    }

    /// Whether a module is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(&canonical_name(name))
    }

    /// Run `CREATE VIRTUAL TABLE schema.table USING module(params...)`.
    pub fn create_table(
        &self,
        module: &str,
        schema: &str,
        table: &str,
        params: &[&str],
    ) -> Result<TableHandle> {
        self.construct(module, schema, table, params, true)
    }

    /// Reconnect to an existing virtual table definition.
    pub fn connect_table(
        &self,
        module: &str,
        schema: &str,
        table: &str,
        params: &[&str],
    ) -> Result<TableHandle> {
        self.construct(module, schema, table, params, false)
    }

    fn construct(
        &self,
        module: &str,
        schema: &str,
        table: &str,
        params: &[&str],
        create: bool,
    ) -> Result<TableHandle> {
        let factory = self
            .modules
            .get(&canonical_name(module))
            .ok_or_else(|| CsvTabError::NoSuchModule {
                name: module.to_owned(),
            })?;

        let mut args = Vec::with_capacity(params.len() + 3);
        args.extend([module, schema, table]);
        args.extend_from_slice(params);

        let mut cx = Cx::new();
        let mut inner = if create {
            factory.create(&mut cx, &args)?
        } else {
            factory.connect(&mut cx, &args)?
        };

        let (declared, direct_only, warnings) = cx.into_parts();
        let Some(declared) = declared else {
            inner.disconnect()?;
            return Err(CsvTabError::NoSchemaDeclared);
        };
        debug!(
            module,
            table,
            columns = declared.columns.len(),
            direct_only,
            "vtab: table constructed"
        );

        Ok(TableHandle {
            name: table.to_owned(),
            schema: declared,
            direct_only,
            warnings,
            inner,
        })
    }
}

fn canonical_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

// ---------------------------------------------------------------------------
// Table handle
// ---------------------------------------------------------------------------

/// One row collected by [`TableHandle::scan_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedRow {
    pub rowid: i64,
    pub values: Vec<SqliteValue>,
}

/// A live virtual table as seen by the host.
pub struct TableHandle {
    name: String,
    schema: DeclaredSchema,
    direct_only: bool,
    warnings: Vec<String>,
    inner: Box<dyn ErasedTable>,
}

impl TableHandle {
    /// The table name given at creation.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The schema the table declared.
    #[must_use]
    pub const fn schema(&self) -> &DeclaredSchema {
        &self.schema
    }

    /// Whether the table is restricted to direct use.
    #[must_use]
    pub const fn is_direct_only(&self) -> bool {
        self.direct_only
    }

    /// Non-fatal messages produced while constructing the table.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Ask the table for a plan.
    pub fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
        self.inner.best_index(info)
    }

    /// Open a cursor for a statement referencing this table from `origin`.
    pub fn open_scan(&self, origin: UseOrigin) -> Result<Box<dyn VirtualTableCursor>> {
        if self.direct_only && origin != UseOrigin::Direct {
            return Err(CsvTabError::UnsafeUse {
                table: self.name.clone(),
            });
        }
        self.inner.open()
    }

    /// Plan, open, and drain a full scan, collecting every column.
    pub fn scan_all(&self, origin: UseOrigin) -> Result<Vec<ScannedRow>> {
        let mut plan = IndexInfo::full_scan();
        self.best_index(&mut plan)?;

        let mut cursor = self.open_scan(origin)?;
        cursor.filter(plan.idx_num, plan.idx_str.as_deref(), &[])?;

        let width = i32::try_from(self.schema.columns.len())
            .map_err(|_| CsvTabError::internal("column count exceeds i32"))?;
        let mut rows = Vec::new();
        while !cursor.eof() {
            let mut values = Vec::with_capacity(self.schema.columns.len());
            for col in 0..width {
                let mut ctx = ColumnContext::new();
                cursor.column(&mut ctx, col)?;
                values.push(ctx.take_value().unwrap_or(SqliteValue::Null));
            }
            rows.push(ScannedRow {
                rowid: cursor.rowid()?,
                values,
            });
            cursor.next()?;
        }
        Ok(rows)
    }

    /// Disconnect the table (connection close).
    pub fn disconnect(mut self) -> Result<()> {
        self.inner.disconnect()
    }

    /// Destroy the table (`DROP TABLE`).
    pub fn destroy(mut self) -> Result<()> {
        self.inner.destroy()
    }
}

impl std::fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableHandle")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("direct_only", &self.direct_only)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::VtabConfig;

    /// Three fixed rows; optionally direct-only, optionally skips declaring.
    struct Fixed {
        rows: Vec<(i64, &'static str)>,
    }

    struct FixedCursor {
        rows: Vec<(i64, &'static str)>,
        pos: usize,
    }

    impl VirtualTable for Fixed {
        type Cursor = FixedCursor;

        fn connect(cx: &mut Cx, args: &[&str]) -> Result<Self> {
            let params = &args[3..];
            if !params.contains(&"nodeclare") {
                cx.declare_vtab("CREATE TABLE x(word TEXT)")?;
            }
            if params.contains(&"direct") {
                cx.vtab_config(VtabConfig::DirectOnly);
            }
            Ok(Self {
                rows: vec![(1, "alpha"), (2, "beta"), (3, "gamma")],
            })
        }

        fn best_index(&self, info: &mut IndexInfo) -> Result<()> {
            info.estimated_cost = 3.0;
            Ok(())
        }

        fn open(&self) -> Result<FixedCursor> {
            Ok(FixedCursor {
                rows: self.rows.clone(),
                pos: 0,
            })
        }
    }

    impl VirtualTableCursor for FixedCursor {
        fn filter(&mut self, _: i32, _: Option<&str>, _: &[SqliteValue]) -> Result<()> {
            self.pos = 0;
            Ok(())
        }

        fn next(&mut self) -> Result<()> {
            self.pos += 1;
            Ok(())
        }

        fn eof(&self) -> bool {
            self.pos >= self.rows.len()
        }

        fn column(&self, ctx: &mut ColumnContext, col: i32) -> Result<()> {
            match (col, self.rows.get(self.pos)) {
                (0, Some((_, word))) => ctx.set_text_bytes(word.as_bytes()),
                _ => ctx.set_null(),
            }
            Ok(())
        }

        fn rowid(&self) -> Result<i64> {
            Ok(self.rows.get(self.pos).map_or(-1, |(id, _)| *id))
        }
    }

    fn registry() -> ModuleRegistry {
        let mut registry = ModuleRegistry::new();
        registry.register_module::<Fixed>("fixed").unwrap();
        registry
    }

    #[test]
    fn test_register_is_case_insensitive() {
        let mut registry = registry();
        assert!(registry.contains("FIXED"));
        let err = registry.register_module::<Fixed>("Fixed").unwrap_err();
        assert!(matches!(err, CsvTabError::ModuleExists { .. }));
    }

    #[test]
    fn test_unknown_module() {
        let err = registry()
            .create_table("nope", "main", "t", &[])
            .unwrap_err();
        assert_eq!(err.to_string(), "no such module: nope");
    }

    #[test]
    fn test_scan_all_collects_rows() {
        let table = registry().create_table("fixed", "temp", "t", &[]).unwrap();
        assert_eq!(table.name(), "t");
        assert_eq!(table.schema().column_names().collect::<Vec<_>>(), ["word"]);

        let rows = table.scan_all(UseOrigin::Direct).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].rowid, 1);
        assert_eq!(rows[2].values, vec![SqliteValue::from("gamma")]);
        table.disconnect().unwrap();
    }

    #[test]
    fn test_missing_declaration_is_rejected() {
        let err = registry()
            .connect_table("fixed", "main", "t", &["nodeclare"])
            .unwrap_err();
        assert!(matches!(err, CsvTabError::NoSchemaDeclared));
    }

    #[test]
    fn test_direct_only_blocks_triggers_and_views() {
        let table = registry()
            .create_table("fixed", "temp", "t", &["direct"])
            .unwrap();
        assert!(table.is_direct_only());
        assert!(table.open_scan(UseOrigin::Direct).is_ok());
        for origin in [UseOrigin::Trigger, UseOrigin::View] {
            let err = table.scan_all(origin).unwrap_err();
            assert_eq!(err.to_string(), "unsafe use of virtual table \"t\"");
        }
    }

    #[test]
    fn test_unrestricted_table_allows_views() {
        let table = registry().create_table("fixed", "temp", "t", &[]).unwrap();
        assert_eq!(table.scan_all(UseOrigin::View).unwrap().len(), 3);
        table.destroy().unwrap();
    }
}
