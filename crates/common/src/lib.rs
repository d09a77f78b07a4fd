pub mod arena;
pub mod config;
pub mod error;
pub mod ids;
pub mod row;
pub mod stats;
pub mod write_kind;

pub use arena::{Arena, Checkpoint};
pub use config::{CommitResponse, Config, DispatchMode};
pub use error::{DbError, DbResult, Status};
pub use ids::{ColumnId, FunctionId, IndexId, SequenceId, TableId, TransactionId};
pub use row::{RecordBatch, Row};
pub use stats::{ExecutionStats, RequestStats, RequestStatsSnapshot};
pub use write_kind::WriteKind;

/// Convenient re-exports for downstream crates.
pub mod prelude {
    pub use crate::{
        Arena, Checkpoint, Config, DbError, DbResult, DispatchMode, ExecutionStats, RecordBatch,
        Row, Status, TableId,
    };
    pub use types::{Any, FieldType, OwnedValue};
}
