//! Fixed-layout row representation: field offsets computed once per
//! schema shape (`RecordMeta`) and reused by every row of that shape
//! (`RowRef`), backed by a caller-supplied `common::Arena`.

pub mod field_info;
pub mod record_meta;
pub mod row_ref;

pub use field_info::FieldInfo;
pub use record_meta::RecordMeta;
pub use row_ref::RowRef;
