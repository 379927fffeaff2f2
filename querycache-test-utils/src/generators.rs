//! Proptest strategies for cache inputs.

use chrono::DateTime;
use proptest::collection::vec;
use proptest::option;
use proptest::prelude::*;
use querycache_core::{Record, SqlValue, TableMeta};
use uuid::Uuid;

/// Non-empty data source / table names, including the characters the key
/// renderer uses as separators.
pub fn arb_identifier() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("main".to_string()),
        Just("users".to_string()),
        Just("users#1".to_string()),
        Just("1#users".to_string()),
        "[a-z_#:][a-z0-9_#:]{0,12}",
    ]
}

/// Any parameter value. Floats are finite so that equal values compare equal.
pub fn arb_sql_value() -> impl Strategy<Value = SqlValue> {
    prop_oneof![
        Just(SqlValue::Null),
        any::<bool>().prop_map(SqlValue::Bool),
        any::<i64>().prop_map(SqlValue::Int),
        (-1.0e9f64..1.0e9f64).prop_map(SqlValue::Float),
        "[ -~]{0,12}".prop_map(SqlValue::Text),
        vec(any::<u8>(), 0..8).prop_map(SqlValue::Bytes),
        (0i64..4_000_000_000)
            .prop_map(|secs| SqlValue::Timestamp(DateTime::from_timestamp(secs, 0).unwrap_or_default())),
        any::<[u8; 16]>().prop_map(|b| SqlValue::Uuid(Uuid::from_bytes(b))),
    ]
}

/// Absent, empty, or short parameter lists.
pub fn arb_params() -> impl Strategy<Value = Option<Vec<SqlValue>>> {
    option::of(vec(arb_sql_value(), 0..4))
}

/// Single result rows with a handful of columns.
pub fn arb_record() -> impl Strategy<Value = Record> {
    proptest::collection::btree_map("[a-z_]{1,8}", arb_sql_value(), 0..5)
}

/// Table metadata with arbitrary cache opt-in.
pub fn arb_table_meta() -> impl Strategy<Value = TableMeta> {
    ("[a-z]{1,8}", "[a-z_]{1,12}", any::<bool>()).prop_map(|(ds, table, cached)| {
        TableMeta::new(table).with_ds_name(ds).with_cached(cached)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    #[test]
    fn test_identifiers_never_empty() {
        let mut runner = TestRunner::default();
        for _ in 0..200 {
            let id = arb_identifier()
                .new_tree(&mut runner)
                .expect("strategy should generate")
                .current();
            assert!(!id.is_empty());
        }
    }

    #[test]
    fn test_floats_are_finite() {
        let mut runner = TestRunner::default();
        for _ in 0..200 {
            let value = arb_sql_value()
                .new_tree(&mut runner)
                .expect("strategy should generate")
                .current();
            if let SqlValue::Float(x) = value {
                assert!(x.is_finite());
            }
        }
    }
}
