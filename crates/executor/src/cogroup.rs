//! `Cogroup`: merges `inputs`, each already sorted
//! ascending on its leading `key_len` columns, into per-key groups. Emits
//! one row per surviving member, shaped `[key columns…, source ordinal:
//! Int4, member columns…]`, so a downstream `Aggregate`/`Filter` can fold
//! per source within a group. `member_limit` bounds how many members of a
//! single group are retained before the rest are dropped.
//!
//! Merging requires comparing every branch's current key in lockstep, so
//! fanning branches out as independent scheduler tasks would still need a
//! barrier per key group before the merge step could proceed; this
//! operator drains every branch on the calling thread instead rather than
//! pay for that synchronization (DESIGN.md's open-question record for
//! this module explains the tradeoff).

use std::cmp::Ordering;
use std::collections::VecDeque;

use common::{DbError, DbResult, Row};
use types::OwnedValue;

use crate::{ExecutionContext, Executor};

pub struct CogroupExec {
    inputs: Vec<Box<dyn Executor>>,
    key_len: usize,
    member_limit: Option<usize>,
    buffer: VecDeque<Row>,
}

impl CogroupExec {
    pub fn new(inputs: Vec<Box<dyn Executor>>, key_len: usize, member_limit: Option<usize>) -> Self {
        Self {
            inputs,
            key_len,
            member_limit,
            buffer: VecDeque::new(),
        }
    }
}

fn compare_keys(a: &[OwnedValue], b: &[OwnedValue]) -> DbResult<Ordering> {
    for (x, y) in a.iter().zip(b.iter()) {
        let ord = x.to_any().cmp_checked(&y.to_any()).ok_or_else(|| {
            DbError::Planning("cogroup key columns must be non-null and mutually comparable".into())
        })?;
        if ord != Ordering::Equal {
            return Ok(ord);
        }
    }
    Ok(Ordering::Equal)
}

impl Executor for CogroupExec {
    fn open(&mut self, ctx: &ExecutionContext) -> DbResult<()> {
        let mut branches: Vec<VecDeque<Row>> = Vec::with_capacity(self.inputs.len());
        for input in &mut self.inputs {
            input.open(ctx)?;
            let mut rows = VecDeque::new();
            while let Some(row) = input.next(ctx)? {
                rows.push_back(row);
            }
            input.close(ctx)?;
            branches.push(rows);
        }

        loop {
            let mut min_key: Option<Vec<OwnedValue>> = None;
            for branch in &branches {
                let Some(row) = branch.front() else { continue };
                let key = row.values[..self.key_len].to_vec();
                min_key = Some(match min_key {
                    None => key,
                    Some(current) => {
                        if compare_keys(&key, &current)? == Ordering::Less {
                            key
                        } else {
                            current
                        }
                    }
                });
            }
            let Some(key) = min_key else { break };

            let mut emitted = 0usize;
            for (ordinal, branch) in branches.iter_mut().enumerate() {
                while let Some(row) = branch.front() {
                    if compare_keys(&row.values[..self.key_len], &key)? != Ordering::Equal {
                        break;
                    }
                    let row = branch.pop_front().expect("front just matched");
                    if matches!(self.member_limit, Some(limit) if emitted >= limit) {
                        continue;
                    }
                    let mut values = key.clone();
                    values.push(OwnedValue::Int4(ordinal as i32));
                    values.extend(row.values[self.key_len..].iter().cloned());
                    self.buffer.push_back(Row::new(values));
                    emitted += 1;
                }
            }
        }
        Ok(())
    }

    fn next(&mut self, _ctx: &ExecutionContext) -> DbResult<Option<Row>> {
        Ok(self.buffer.pop_front())
    }

    fn close(&mut self, _ctx: &ExecutionContext) -> DbResult<()> {
        self.buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{row_source, test_ctx};

    #[test]
    fn merges_matching_keys_across_branches() {
        let left = row_source(vec![
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Character("a".into())]),
            Row::new(vec![OwnedValue::Int4(2), OwnedValue::Character("b".into())]),
        ]);
        let right = row_source(vec![Row::new(vec![
            OwnedValue::Int4(1),
            OwnedValue::Character("x".into()),
        ])]);
        let mut exec = CogroupExec::new(vec![left, right], 1, None);
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert_eq!(rows.len(), 3);
        // group key=1: one member from each branch
        let group1: Vec<_> = rows.iter().filter(|r| r.values[0] == OwnedValue::Int4(1)).collect();
        assert_eq!(group1.len(), 2);
        let ordinals: Vec<i32> = group1
            .iter()
            .map(|r| match r.values[1] {
                OwnedValue::Int4(v) => v,
                _ => panic!("expected source ordinal"),
            })
            .collect();
        assert!(ordinals.contains(&0) && ordinals.contains(&1));
        // group key=2: only the left branch
        let group2: Vec<_> = rows.iter().filter(|r| r.values[0] == OwnedValue::Int4(2)).collect();
        assert_eq!(group2.len(), 1);
    }

    #[test]
    fn member_limit_drops_the_remainder_of_an_oversized_group() {
        let left = row_source(vec![
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(10)]),
            Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(20)]),
        ]);
        let right = row_source(vec![Row::new(vec![OwnedValue::Int4(1), OwnedValue::Int4(30)])]);
        let mut exec = CogroupExec::new(vec![left, right], 1, Some(2));
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn empty_inputs_emit_nothing() {
        let mut exec = CogroupExec::new(vec![row_source(vec![]), row_source(vec![])], 1, None);
        let harness = test_ctx();
        let rows = crate::run_to_completion(&mut exec, &harness.ctx()).unwrap();
        assert!(rows.is_empty());
    }
}
