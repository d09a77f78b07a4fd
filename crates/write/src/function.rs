//! Nullary function evaluation for `catalog::ColumnDefault::Function`
//! columns, e.g. `current_timestamp`.

use ahash::RandomState;
use common::{DbError, DbResult, FunctionId};
use hashbrown::HashMap;
use types::OwnedValue;

/// Supplies the result of a bound nullary function default.
pub trait FunctionSource: Send + Sync {
    fn call(&self, id: FunctionId) -> DbResult<OwnedValue>;
}

type NullaryFn = Box<dyn Fn() -> DbResult<OwnedValue> + Send + Sync>;

/// A static table of bound nullary functions, keyed by the `FunctionId`
/// a `ColumnDefault::Function` refers to. Registration happens once at
/// catalog setup time; evaluation is just invoking the closure.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<FunctionId, NullaryFn, RandomState>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        id: FunctionId,
        f: impl Fn() -> DbResult<OwnedValue> + Send + Sync + 'static,
    ) {
        self.functions.insert(id, Box::new(f));
    }
}

impl FunctionSource for FunctionRegistry {
    fn call(&self, id: FunctionId) -> DbResult<OwnedValue> {
        match self.functions.get(&id) {
            Some(f) => f(),
            None => Err(DbError::Catalog(format!("unbound function id {}", id.0))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invokes_registered_function() {
        let mut registry = FunctionRegistry::new();
        registry.register(FunctionId(1), || Ok(OwnedValue::Int8(42)));
        assert!(matches!(
            registry.call(FunctionId(1)),
            Ok(OwnedValue::Int8(42))
        ));
    }

    #[test]
    fn unbound_function_is_an_error() {
        let registry = FunctionRegistry::new();
        assert!(registry.call(FunctionId(99)).is_err());
    }
}
