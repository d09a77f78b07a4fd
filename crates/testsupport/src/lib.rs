//! Test support for the workspace: catalog/engine fixtures, property-based
//! generators for the record/value runtime, assertion helpers, and
//! boilerplate-cutting macros, so that each crate's own test module only
//! has to describe the scenario it's testing.

pub mod assertions;
pub mod fixtures;
pub mod macros;
pub mod proptest_generators;

/// Convenient re-exports for common testing patterns.
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::fixtures::*;
    pub use crate::proptest_generators::*;
    pub use crate::{catalog_with_table, row};
}
