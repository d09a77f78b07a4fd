//! The compiled operator graph the scheduler walks and the
//! executor drives. A `Plan` is a tree of Volcano-style operators; leaves
//! read from the key-value store, interior nodes transform rows, and a
//! single root either emits rows to the caller or writes them back.

pub mod variable;

use common::{ColumnId, TableId, WriteKind};
use expr::Expr;
use serde::{Deserialize, Serialize};

pub use variable::VariableTable;

/// One endpoint of a [`Range`]. Prefixed bounds compare
/// only the first `key.len()` columns of the index key and keep scanning
/// while they match, rather than requiring the full key to compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Bound {
    Unbounded,
    Inclusive(Vec<Expr>),
    Exclusive(Vec<Expr>),
    PrefixedInclusive(Vec<Expr>),
    PrefixedExclusive(Vec<Expr>),
}

/// A key range a `Scan` walks, evaluated once per request against the
/// bound parameter table before the scan opens its storage cursor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Range {
    pub lower: Bound,
    pub upper: Bound,
}

impl Range {
    pub fn all() -> Self {
        Range {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }
}

impl Default for Range {
    fn default() -> Self {
        Range::all()
    }
}

/// Which storage a `Scan`/`Find`/`JoinFind` probes: the primary index, by
/// default, or a named secondary index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableTarget {
    pub table: TableId,
    pub index: Option<String>,
}

impl TableTarget {
    pub fn primary(table: TableId) -> Self {
        TableTarget { table, index: None }
    }

    pub fn secondary(table: TableId, index: impl Into<String>) -> Self {
        TableTarget {
            table,
            index: Some(index.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    RightOuter,
    FullOuter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyKind {
    /// Drop the left row entirely when the function produces no rows.
    Cross,
    /// Emit the left row once, right side filled with `NULL`, when the
    /// function produces no rows.
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregateFunc {
    CountStar,
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

/// One aggregate computed per group. `arg` is the input row ordinal the
/// function folds over; `None` is only valid for `CountStar`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateExpr {
    pub func: AggregateFunc,
    pub arg: Option<usize>,
}

/// A named table-valued function `Apply` invokes per left row (the
/// "apply" operator), e.g. `unnest` or a user-defined generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableFunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
    /// Number of columns the function appends to the output row.
    pub output_arity: usize,
}

/// The compiled operator graph. Every variant's `Box<Plan>` children are
/// opened, driven, and closed in the order the executor's Volcano
/// iterators expect: `open` top-down, `next` pulled bottom-up, `close`
/// top-down again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Plan {
    /// Walks a key range, emitting the target table's full schema row
    /// (in declared column order) for every matching entry. A secondary
    /// target is re-resolved against the primary storage internally, so
    /// the emitted row is always the full row regardless of which index
    /// was scanned.
    Scan {
        target: TableTarget,
        range: Range,
    },
    /// Point lookup by exact key, equivalent to a `Scan` whose range is a
    /// single inclusive point, but able to skip the cursor machinery.
    Find {
        target: TableTarget,
        key: Vec<Expr>,
    },
    /// Evaluates `exprs` against each input row and emits the results as
    /// the new row.
    Project { input: Box<Plan>, exprs: Vec<Expr> },
    /// Emits only rows for which `predicate` evaluates to `Boolean(true)`
    /// (three-valued: `NULL` and `false` are both dropped).
    Filter { input: Box<Plan>, predicate: Expr },
    /// For every row from `left`, probes `target` by `join_key` and joins
    /// matching rows on, honoring `kind`'s outer-join padding rules.
    /// `condition`, if present, is evaluated against the combined row
    /// after the key probe and before outer-join padding is decided.
    JoinFind {
        left: Box<Plan>,
        target: TableTarget,
        join_key: Vec<Expr>,
        condition: Option<Expr>,
        kind: JoinKind,
    },
    /// Merges `inputs`, already sorted ascending on their leading
    /// `key_len` columns, into per-key groups via a priority-queue merge
    /// Emits one row per surviving member, of shape
    /// `[key columns…, source ordinal: Int4, member columns…]`, so a
    /// downstream `Aggregate` (or `Filter`) can fold per source within a
    /// group. `member_limit` bounds how many members of a single group
    /// are retained before the rest are dropped.
    Cogroup {
        inputs: Vec<Plan>,
        key_len: usize,
        member_limit: Option<usize>,
    },
    /// Groups `input` rows by the (already-sorted) `group_by` ordinals
    /// and folds `aggregates` over each group. Emits one row per group:
    /// group-by columns first, then aggregate results in declaration
    /// order.
    Aggregate {
        input: Box<Plan>,
        group_by: Vec<usize>,
        aggregates: Vec<AggregateExpr>,
    },
    /// Invokes a table-valued function once per left row, appending its
    /// output columns.
    Apply {
        input: Box<Plan>,
        function: TableFunctionCall,
        kind: ApplyKind,
    },
    /// Terminal operator: hands rows to the request's result channel
    /// rather than to another operator.
    Emit { input: Box<Plan> },
    /// Updates or deletes the row the input produced. The input must
    /// supply the *current* full schema row (typically from a `Scan` or
    /// `Find` against `table`) so the write pipeline can diff old and new
    /// secondary key images. `assignments` is ignored for `Delete`.
    WriteExisting {
        input: Box<Plan>,
        table: TableId,
        kind: WriteKind,
        assignments: Vec<(ColumnId, Expr)>,
    },
    /// Inserts brand-new rows with no input operator. Each inner `Vec` is
    /// one tuple; `None` at a position means the statement omitted that
    /// column and its `catalog::ColumnDefault` policy applies.
    WriteNew {
        table: TableId,
        kind: WriteKind,
        tuples: Vec<Vec<Option<Expr>>>,
    },
}

impl Plan {
    /// Walks `self` and its children, calling `visit` on every node
    /// (including `self`), pre-order. Useful for plan-shape assertions in
    /// tests and for the scheduler's static cost estimation.
    pub fn for_each<'a>(&'a self, visit: &mut impl FnMut(&'a Plan)) {
        visit(self);
        match self {
            Plan::Scan { .. } | Plan::Find { .. } | Plan::WriteNew { .. } => {}
            Plan::Project { input, .. }
            | Plan::Filter { input, .. }
            | Plan::JoinFind { left: input, .. }
            | Plan::Aggregate { input, .. }
            | Plan::Apply { input, .. }
            | Plan::Emit { input }
            | Plan::WriteExisting { input, .. } => input.for_each(visit),
            Plan::Cogroup { inputs, .. } => {
                for child in inputs {
                    child.for_each(visit);
                }
            }
        }
    }

    /// `true` for the write operators; used by the scheduler to decide
    /// whether a request needs a transaction at all.
    pub fn is_write(&self) -> bool {
        matches!(self, Plan::WriteExisting { .. } | Plan::WriteNew { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expr::{BinaryOp, LiteralValue};

    fn eq_lit(ordinal: usize, value: i32) -> Expr {
        Expr::binary(
            BinaryOp::Eq,
            Expr::col(ordinal),
            Expr::lit(LiteralValue::Int4(value)),
        )
    }

    #[test]
    fn for_each_visits_every_node_pre_order() {
        let plan = Plan::Emit {
            input: Box::new(Plan::Filter {
                input: Box::new(Plan::Scan {
                    target: TableTarget::primary(TableId(1)),
                    range: Range::all(),
                }),
                predicate: eq_lit(0, 7),
            }),
        };
        let mut kinds = Vec::new();
        plan.for_each(&mut |node| {
            kinds.push(match node {
                Plan::Emit { .. } => "emit",
                Plan::Filter { .. } => "filter",
                Plan::Scan { .. } => "scan",
                _ => "other",
            });
        });
        assert_eq!(kinds, vec!["emit", "filter", "scan"]);
    }

    #[test]
    fn for_each_visits_every_cogroup_branch() {
        let plan = Plan::Cogroup {
            inputs: vec![
                Plan::Scan {
                    target: TableTarget::primary(TableId(1)),
                    range: Range::all(),
                },
                Plan::Scan {
                    target: TableTarget::primary(TableId(2)),
                    range: Range::all(),
                },
            ],
            key_len: 1,
            member_limit: None,
        };
        let mut scans = 0;
        plan.for_each(&mut |node| {
            if matches!(node, Plan::Scan { .. }) {
                scans += 1;
            }
        });
        assert_eq!(scans, 2);
    }

    #[test]
    fn is_write_distinguishes_read_and_write_plans() {
        let read = Plan::Scan {
            target: TableTarget::primary(TableId(1)),
            range: Range::all(),
        };
        assert!(!read.is_write());

        let write = Plan::WriteNew {
            table: TableId(1),
            kind: WriteKind::Insert,
            tuples: vec![vec![Some(Expr::lit(LiteralValue::Int4(1)))]],
        };
        assert!(write.is_write());
    }
}
