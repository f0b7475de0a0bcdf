//! Query planner types exchanged through [`VirtualTable::best_index`].
//!
//! [`VirtualTable::best_index`]: crate::VirtualTable::best_index

/// Cost reported for a full forward scan.
pub const FULL_SCAN_COST: f64 = 1_000_000.0;

/// Comparison operator of a WHERE-clause term offered to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintOp {
    Eq,
    Gt,
    Le,
    Lt,
    Ge,
    Ne,
    Like,
    IsNull,
}

/// A WHERE-clause term the planner is considering.
#[derive(Debug, Clone)]
pub struct IndexConstraint {
    /// Column index (0-based; `-1` for rowid).
    pub column: i32,
    pub op: ConstraintOp,
    /// Whether the planner can supply a value for this term.
    pub usable: bool,
}

/// How `best_index` consumes one constraint.
#[derive(Debug, Clone, Default)]
pub struct IndexConstraintUsage {
    /// 1-based position of the constraint's value in the `filter` arguments;
    /// 0 leaves the constraint to the host.
    pub argv_index: i32,
}

/// Planner input and the table's answer.
///
/// The host fills `constraints`; the table fills `constraint_usage`,
/// `idx_num`, `idx_str` and `estimated_cost`.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    pub constraints: Vec<IndexConstraint>,
    /// Parallel to `constraints`.
    pub constraint_usage: Vec<IndexConstraintUsage>,
    pub idx_num: i32,
    pub idx_str: Option<String>,
    /// Lower is better.
    pub estimated_cost: f64,
}

impl IndexInfo {
    #[must_use]
    pub fn new(constraints: Vec<IndexConstraint>) -> Self {
        let usage_len = constraints.len();
        Self {
            constraints,
            constraint_usage: vec![IndexConstraintUsage::default(); usage_len],
            idx_num: 0,
            idx_str: None,
            estimated_cost: FULL_SCAN_COST,
        }
    }

    /// An `IndexInfo` for an unconstrained scan.
    #[must_use]
    pub fn full_scan() -> Self {
        Self::new(Vec::new())
    }

    /// Position of the first usable equality constraint.
    #[must_use]
    pub fn first_usable_eq(&self) -> Option<usize> {
        self.constraints
            .iter()
            .position(|c| c.usable && c.op == ConstraintOp::Eq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint(column: i32, op: ConstraintOp, usable: bool) -> IndexConstraint {
        IndexConstraint { column, op, usable }
    }

    #[test]
    fn test_new_sizes_usage_to_constraints() {
        let info = IndexInfo::new(vec![
            constraint(0, ConstraintOp::Gt, true),
            constraint(1, ConstraintOp::Eq, true),
        ]);
        assert_eq!(info.constraint_usage.len(), 2);
        assert!(info.constraint_usage.iter().all(|u| u.argv_index == 0));
        assert_eq!(info.idx_num, 0);
        assert!(info.idx_str.is_none());
        assert_eq!(info.first_usable_eq(), Some(1));
    }

    #[test]
    fn test_unusable_eq_is_ignored() {
        let info = IndexInfo::new(vec![constraint(2, ConstraintOp::Eq, false)]);
        assert_eq!(info.first_usable_eq(), None);
        assert_eq!(IndexInfo::full_scan().first_usable_eq(), None);
        assert!((IndexInfo::full_scan().estimated_cost - FULL_SCAN_COST).abs() < f64::EPSILON);
    }
}
