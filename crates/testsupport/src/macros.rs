//! Declarative macros that cut down boilerplate in operator/engine tests.

/// Builds a `common::Row` from a typed, comma-separated value list.
///
/// # Examples
///
/// ```
/// use testsupport::row;
/// use types::OwnedValue;
///
/// let r = row![OwnedValue::Int4(1), OwnedValue::Character("alice".into())];
/// assert_eq!(r.values.len(), 2);
///
/// let r = row![int: 1, 2, 3];
/// assert_eq!(r.values.len(), 3);
///
/// let r = row![text: "alice", "bob"];
/// assert_eq!(r.values.len(), 2);
/// ```
#[macro_export]
macro_rules! row {
    [$($val:expr),+ $(,)?] => {
        ::common::Row::new(vec![$($val),+])
    };

    [int: $($val:expr),+ $(,)?] => {
        ::common::Row::new(vec![$(::types::OwnedValue::Int4($val)),+])
    };

    [text: $($val:expr),+ $(,)?] => {
        ::common::Row::new(vec![$(::types::OwnedValue::Character($val.to_string())),+])
    };

    [bool: $($val:expr),+ $(,)?] => {
        ::common::Row::new(vec![$(::types::OwnedValue::Boolean($val)),+])
    };
}

/// Builds a `catalog::Catalog` with a single table in one expression.
///
/// # Examples
///
/// ```
/// use testsupport::catalog_with_table;
/// use types::FieldType;
///
/// let catalog = catalog_with_table!(
///     "users",
///     cols: [("id", FieldType::Int4, false), ("name", FieldType::Int4, true)],
///     pk: [0],
/// );
/// assert!(catalog.table("users").is_ok());
/// ```
#[macro_export]
macro_rules! catalog_with_table {
    ($name:expr, cols: [$(($col:expr, $ty:expr, $nullable:expr)),+ $(,)?], pk: [$($pk:expr),+ $(,)?] $(,)?) => {{
        let mut catalog = ::catalog::Catalog::new();
        catalog
            .create_table(
                $name,
                vec![$(::catalog::Column::new($col, $ty, $nullable)),+],
                vec![$($pk),+],
            )
            .unwrap();
        catalog
    }};
}

#[cfg(test)]
mod tests {
    use types::{FieldType, OwnedValue};

    #[test]
    fn row_macro_mixed() {
        let r = row![OwnedValue::Int4(1), OwnedValue::Boolean(true)];
        assert_eq!(r.values.len(), 2);
        assert_eq!(r.values[0], OwnedValue::Int4(1));
    }

    #[test]
    fn row_macro_int_shorthand() {
        let r = row![int: 1, 2, 3];
        assert_eq!(r.values[1], OwnedValue::Int4(2));
    }

    #[test]
    fn row_macro_text_shorthand() {
        let r = row![text: "alice", "bob"];
        assert_eq!(r.values[0], OwnedValue::Character("alice".to_string()));
    }

    #[test]
    fn catalog_with_table_macro_builds_a_lookup_table() {
        let catalog = catalog_with_table!(
            "users",
            cols: [("id", FieldType::Int4, false), ("name", FieldType::Int4, true)],
            pk: [0],
        );
        let table = catalog.table("users").unwrap();
        assert_eq!(table.schema.columns.len(), 2);
    }
}
