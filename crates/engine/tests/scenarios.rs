//! End-to-end scenarios driving `Engine::execute` against hand-built
//! plans, one per testable property.

use catalog::{Catalog, Column, IndexKind};
use common::{Config, DbError, Row, WriteKind};
use engine::Engine;
use expr::{BinaryOp, Expr, LiteralValue};
use kvs::TransactionMode;
use plan::{JoinKind, Plan, Range, TableTarget};
use types::{FieldType, LengthDetail, OwnedValue};

fn scan(target: TableTarget) -> Plan {
    Plan::Emit {
        input: Box::new(Plan::Scan {
            target,
            range: Range::all(),
        }),
    }
}

fn insert(table: common::TableId, kind: WriteKind, tuples: Vec<Vec<i32>>) -> Plan {
    Plan::Emit {
        input: Box::new(Plan::WriteNew {
            table,
            kind,
            tuples: tuples
                .into_iter()
                .map(|tuple| {
                    tuple
                        .into_iter()
                        .map(|v| Some(Expr::lit(LiteralValue::Int4(v))))
                        .collect()
                })
                .collect(),
        }),
    }
}

/// Upsert with secondary: `INSERT T VALUES(1,10)`, then
/// `INSERT OR REPLACE T VALUES(1,20)` leaves the primary row at `(1,20)`
/// and the secondary index pointing only at `20`, never `10`.
#[test]
fn upsert_rewrites_secondary_entry() {
    let mut catalog = Catalog::new();
    let table_id = catalog
        .create_table(
            "widgets",
            vec![
                Column::new("c0", FieldType::Int4, false),
                Column::new("c1", FieldType::Int4, true),
            ],
            vec![0],
        )
        .unwrap();
    catalog
        .create_index("widgets", "idx_c1", &["c1"], IndexKind::BTree, false)
        .unwrap();

    let engine = Engine::with_memory_kvs(catalog, Config::builder().build());
    let tx = engine
        .begin_transaction(TransactionMode::short(false))
        .unwrap();

    engine
        .execute(&insert(table_id, WriteKind::Insert, vec![vec![1, 10]]), vec![], tx.as_ref())
        .unwrap();
    engine
        .execute(
            &insert(table_id, WriteKind::InsertOverwrite, vec![vec![1, 20]]),
            vec![],
            tx.as_ref(),
        )
        .unwrap();

    let primary_rows = engine
        .execute(&scan(TableTarget::primary(table_id)), vec![], tx.as_ref())
        .unwrap()
        .rows;
    assert_eq!(primary_rows.len(), 1);
    assert_eq!(primary_rows[0].values, vec![OwnedValue::Int4(1), OwnedValue::Int4(20)]);

    let secondary_rows = engine
        .execute(
            &scan(TableTarget::secondary(table_id, "idx_c1")),
            vec![],
            tx.as_ref(),
        )
        .unwrap()
        .rows;
    assert_eq!(secondary_rows.len(), 1);
    assert_eq!(secondary_rows[0].values[1], OwnedValue::Int4(20));
}

/// Full outer join with filter: left `{(1,1),(2,1)}`, right
/// `{(10,1),(20,1)}` joined on `L.c1 = R.c1 AND L.c0 <> 1 AND R.c0 <> 10`
/// leaves exactly three combined rows: left row 1 unmatched (its own
/// condition fails), left row 2 matched to right row 20, and right row
/// 10 unmatched (no left row survives the condition against it).
#[test]
fn full_outer_join_with_filter_pads_both_sides() {
    let mut catalog = Catalog::new();
    let left_id = catalog
        .create_table(
            "left_t",
            vec![
                Column::new("c0", FieldType::Int4, false),
                Column::new("c1", FieldType::Int4, true),
            ],
            vec![0],
        )
        .unwrap();
    let right_id = catalog
        .create_table(
            "right_t",
            vec![
                Column::new("c0", FieldType::Int4, false),
                Column::new("c1", FieldType::Int4, true),
            ],
            vec![0],
        )
        .unwrap();
    catalog
        .create_index("right_t", "idx_right_c1", &["c1"], IndexKind::BTree, false)
        .unwrap();

    let engine = Engine::with_memory_kvs(catalog, Config::builder().build());
    let tx = engine
        .begin_transaction(TransactionMode::short(false))
        .unwrap();

    engine
        .execute(
            &insert(left_id, WriteKind::Insert, vec![vec![1, 1], vec![2, 1]]),
            vec![],
            tx.as_ref(),
        )
        .unwrap();
    engine
        .execute(
            &insert(right_id, WriteKind::Insert, vec![vec![10, 1], vec![20, 1]]),
            vec![],
            tx.as_ref(),
        )
        .unwrap();

    let condition = Expr::binary(
        BinaryOp::And,
        Expr::binary(BinaryOp::Ne, Expr::col(0), Expr::lit(LiteralValue::Int4(1))),
        Expr::binary(BinaryOp::Ne, Expr::col(2), Expr::lit(LiteralValue::Int4(10))),
    );
    let plan = Plan::Emit {
        input: Box::new(Plan::JoinFind {
            left: Box::new(Plan::Scan {
                target: TableTarget::primary(left_id),
                range: Range::all(),
            }),
            target: TableTarget::secondary(right_id, "idx_right_c1"),
            join_key: vec![Expr::col(1)],
            condition: Some(condition),
            kind: JoinKind::FullOuter,
        }),
    };

    let rows = engine.execute(&plan, vec![], tx.as_ref()).unwrap().rows;
    let pairs: Vec<(Option<i32>, Option<i32>)> = rows
        .iter()
        .map(|r| {
            let left_c0 = match &r.values[0] {
                OwnedValue::Int4(v) => Some(*v),
                OwnedValue::Null => None,
                other => panic!("{other:?}"),
            };
            let right_c0 = match &r.values[2] {
                OwnedValue::Int4(v) => Some(*v),
                OwnedValue::Null => None,
                other => panic!("{other:?}"),
            };
            (left_c0, right_c0)
        })
        .collect();

    assert_eq!(pairs.len(), 3);
    assert!(pairs.contains(&(Some(1), None)));
    assert!(pairs.contains(&(Some(2), Some(20))));
    assert!(pairs.contains(&(None, Some(10))));
}

/// A committed delete is invisible to rows inserted before it in an
/// earlier transaction, but visible within the deleting transaction
/// itself once it commits.
#[test]
fn committed_delete_removes_row_for_later_readers() {
    let mut catalog = Catalog::new();
    let table_id = catalog
        .create_table("t", vec![Column::new("c0", FieldType::Int4, false)], vec![0])
        .unwrap();

    let engine = Engine::with_memory_kvs(catalog, Config::builder().build());

    let setup_tx = engine.begin_transaction(TransactionMode::short(false)).unwrap();
    engine
        .execute(
            &insert(table_id, WriteKind::Insert, vec![vec![1], vec![2]]),
            vec![],
            setup_tx.as_ref(),
        )
        .unwrap();
    setup_tx.commit().unwrap();

    let delete_tx = engine.begin_transaction(TransactionMode::short(false)).unwrap();
    let delete_plan = Plan::Emit {
        input: Box::new(Plan::WriteExisting {
            input: Box::new(Plan::Filter {
                input: Box::new(Plan::Scan {
                    target: TableTarget::primary(table_id),
                    range: Range::all(),
                }),
                predicate: Expr::binary(BinaryOp::Eq, Expr::col(0), Expr::lit(LiteralValue::Int4(2))),
            }),
            table: table_id,
            kind: WriteKind::Delete,
            assignments: vec![],
        }),
    };
    engine.execute(&delete_plan, vec![], delete_tx.as_ref()).unwrap();

    let remaining = engine
        .execute(&scan(TableTarget::primary(table_id)), vec![], delete_tx.as_ref())
        .unwrap()
        .rows;
    assert_eq!(remaining, vec![Row::new(vec![OwnedValue::Int4(1)])]);

    delete_tx.commit().unwrap();

    let reader_tx = engine.begin_transaction(TransactionMode::short(true)).unwrap();
    let after_commit = engine
        .execute(&scan(TableTarget::primary(table_id)), vec![], reader_tx.as_ref())
        .unwrap()
        .rows;
    assert_eq!(after_commit, vec![Row::new(vec![OwnedValue::Int4(1)])]);
}

/// A multi-byte `LIKE ... ESCAPE` pattern matches the row that literally
/// contains its escaped wildcard characters, and not a row differing only
/// in an unescaped wildcard.
#[test]
fn like_with_multi_byte_escape_matches_literal_wildcards() {
    let mut catalog = Catalog::new();
    let table_id = catalog
        .create_table(
            "t",
            vec![Column::new(
                "label",
                FieldType::Character(LengthDetail {
                    length: 64,
                    varying: true,
                }),
                false,
            )],
            vec![0],
        )
        .unwrap();

    let engine = Engine::with_memory_kvs(catalog, Config::builder().build());
    let tx = engine.begin_transaction(TransactionMode::short(false)).unwrap();

    let label = "いa_é𐍈b%字🧡z%%한_bü";
    let insert_label = Plan::Emit {
        input: Box::new(Plan::WriteNew {
            table: table_id,
            kind: WriteKind::Insert,
            tuples: vec![vec![Some(Expr::lit(LiteralValue::Character(label.to_string())))]],
        }),
    };
    engine.execute(&insert_label, vec![], tx.as_ref()).unwrap();

    let pattern = "いac_é𐍈bc%字🧡zc%c%한c_bü";
    let matches_plan = Plan::Emit {
        input: Box::new(Plan::Filter {
            input: Box::new(Plan::Scan {
                target: TableTarget::primary(table_id),
                range: Range::all(),
            }),
            predicate: Expr::Like {
                expr: Box::new(Expr::col(0)),
                pattern: Box::new(Expr::lit(LiteralValue::Character(pattern.to_string()))),
                escape: Some('c'),
            },
        }),
    };
    let rows = engine.execute(&matches_plan, vec![], tx.as_ref()).unwrap().rows;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].values[0], OwnedValue::Character(label.to_string()));
}

/// A dangling/invalid escape usage surfaces as an expression error rather
/// than silently matching or panicking.
#[test]
fn like_escape_before_non_wildcard_is_rejected() {
    let mut catalog = Catalog::new();
    let table_id = catalog
        .create_table(
            "t",
            vec![Column::new(
                "label",
                FieldType::Character(LengthDetail {
                    length: 16,
                    varying: true,
                }),
                false,
            )],
            vec![0],
        )
        .unwrap();

    let engine = Engine::with_memory_kvs(catalog, Config::builder().build());
    let tx = engine.begin_transaction(TransactionMode::short(false)).unwrap();

    let insert_label = Plan::Emit {
        input: Box::new(Plan::WriteNew {
            table: table_id,
            kind: WriteKind::Insert,
            tuples: vec![vec![Some(Expr::lit(LiteralValue::Character("abc".to_string())))]],
        }),
    };
    engine.execute(&insert_label, vec![], tx.as_ref()).unwrap();

    let bad_pattern_plan = Plan::Emit {
        input: Box::new(Plan::Filter {
            input: Box::new(Plan::Scan {
                target: TableTarget::primary(table_id),
                range: Range::all(),
            }),
            predicate: Expr::Like {
                expr: Box::new(Expr::col(0)),
                pattern: Box::new(Expr::lit(LiteralValue::Character("a\\bc".to_string()))),
                escape: Some('\\'),
            },
        }),
    };
    let err = engine
        .execute(&bad_pattern_plan, vec![], tx.as_ref())
        .unwrap_err();
    assert!(matches!(err, DbError::Expression(_)));
    assert!(!tx.is_active(), "an execution error must abort the transaction");
}
