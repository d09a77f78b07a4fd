//! The write statement kinds the write pipeline and the `write_new`/
//! `write_existing` operators dispatch on.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteKind {
    /// Fail with a unique-constraint violation on a duplicate primary key.
    Insert,
    /// Silently skip a duplicate primary key (`INSERT IF NOT EXISTS`).
    InsertSkip,
    /// Replace on duplicate (`INSERT OR REPLACE` / `UPSERT`).
    InsertOverwrite,
    Update,
    Delete,
}

impl WriteKind {
    pub fn is_insert(&self) -> bool {
        matches!(
            self,
            WriteKind::Insert | WriteKind::InsertSkip | WriteKind::InsertOverwrite
        )
    }
}
