//! Table-valued functions invoked by `Apply`: named,
//! argument-bound generators that each left row feeds into to produce a
//! lazy finite sequence of tuples.

use common::{DbError, DbResult};
use types::Any;

/// Resolves a bound table-valued function call to the rows it produces
/// for one left-row's worth of arguments.
pub trait TableFunctionSource: Send + Sync {
    fn call(&self, name: &str, args: &[Any]) -> DbResult<Vec<Vec<Any>>>;
}

/// The built-in generators every request gets for free, named the way a
/// SQL engine's catalog of table-valued functions typically is.
#[derive(Default)]
pub struct TableFunctionRegistry;

impl TableFunctionRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl TableFunctionSource for TableFunctionRegistry {
    fn call(&self, name: &str, args: &[Any]) -> DbResult<Vec<Vec<Any>>> {
        match name {
            // generate_series(start, stop): one row per integer in
            // [start, stop], inclusive, ascending. Mirrors the generator
            // most SQL engines ship as the canonical table-valued
            // function example.
            "generate_series" => {
                let (Some(start), Some(stop)) = (args.first(), args.get(1)) else {
                    return Err(DbError::Expression(
                        "generate_series requires (start, stop) arguments".into(),
                    ));
                };
                if start.is_null() || stop.is_null() {
                    return Ok(Vec::new());
                }
                let start = start.as_f64().ok_or_else(|| {
                    DbError::Expression("generate_series start must be numeric".into())
                })? as i64;
                let stop = stop.as_f64().ok_or_else(|| {
                    DbError::Expression("generate_series stop must be numeric".into())
                })? as i64;
                Ok((start..=stop).map(|v| vec![Any::Int8(v)]).collect())
            }
            other => Err(DbError::UnsupportedRuntimeFeature(format!(
                "unknown table-valued function '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_series_is_inclusive_ascending() {
        let registry = TableFunctionRegistry::new();
        let rows = registry
            .call("generate_series", &[Any::Int4(1), Any::Int4(3)])
            .unwrap();
        let values: Vec<i64> = rows
            .iter()
            .map(|r| match r[0] {
                Any::Int8(v) => v,
                _ => panic!("expected Int8"),
            })
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn generate_series_with_null_bound_is_empty() {
        let registry = TableFunctionRegistry::new();
        let rows = registry.call("generate_series", &[Any::Null, Any::Int4(3)]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn unknown_function_is_unsupported() {
        let registry = TableFunctionRegistry::new();
        assert!(registry.call("nope", &[]).is_err());
    }
}
