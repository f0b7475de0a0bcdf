//! Column naming and the `CREATE TABLE` text declared to the host.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::cache::OwnedCell;

/// Name given to a column whose header cell is empty.
pub const BLANK_COLUMN_NAME_PREFIX: &str = "Blank_Column";

/// Blank columns named so far in this process, across every table.
static BLANK_COLUMNS: AtomicU32 = AtomicU32::new(0);

/// Next generated name: `Blank_Column`, then `Blank_Column_1`,
/// `Blank_Column_2`, ...
fn next_blank_name() -> String {
    match BLANK_COLUMNS.fetch_add(1, Ordering::Relaxed) {
        0 => BLANK_COLUMN_NAME_PREFIX.to_owned(),
        n => format!("{BLANK_COLUMN_NAME_PREFIX}_{n}"),
    }
}

/// Column names inferred from a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderColumns {
    pub names: Vec<String>,
    /// 0-based positions of header cells that were empty.
    pub blank: Vec<usize>,
}

impl HeaderColumns {
    /// Name every header cell: blanks get a generated name, then repeats are
    /// made unique.
    #[must_use]
    pub fn infer(header: &[OwnedCell]) -> Self {
        let mut blank = Vec::new();
        let mut names: Vec<String> = header
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                if cell.bytes.is_empty() {
                    blank.push(i);
                    next_blank_name()
                } else {
                    String::from_utf8_lossy(&cell.bytes).into_owned()
                }
            })
            .collect();
        dedupe(&mut names);
        Self { names, blank }
    }

    /// `CREATE TABLE x("a" TEXT,"b" TEXT)`.
    #[must_use]
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .names
            .iter()
            .map(|name| format!("{} TEXT", quote_identifier(name)))
            .collect();
        format!("CREATE TABLE x({})", columns.join(","))
    }
}

/// Rename repeats, compared ASCII case-insensitively, to `name_2`, `name_3`,
/// and so on, skipping candidates that are already taken.
pub fn dedupe(names: &mut [String]) {
    let mut taken: HashSet<String> = HashSet::with_capacity(names.len());
    for name in names.iter_mut() {
        if taken.insert(name.to_ascii_lowercase()) {
            continue;
        }
        let mut suffix = 2_usize;
        loop {
            let candidate = format!("{name}_{suffix}");
            if taken.insert(candidate.to_ascii_lowercase()) {
                *name = candidate;
                break;
            }
            suffix += 1;
        }
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
