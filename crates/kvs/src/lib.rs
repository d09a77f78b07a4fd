//! The KVS adapter boundary: `Database`/`Storage`/`Transaction` traits the
//! rest of the engine consumes, plus an in-memory reference implementation.
//! The production KVS lives outside this workspace; this crate exists so
//! every other crate here is exercisable end-to-end.

pub mod memory;
pub mod traits;

pub use memory::InMemoryDatabase;
pub use traits::{Database, PutOption, ScanBound, Storage, Transaction, TransactionKind, TransactionMode};
