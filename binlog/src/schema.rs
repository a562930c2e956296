//! The application-supplied table-schema lookup: resolves a (database,
//! table) pair to ordered column descriptors. This module only defines the
//! capability interface the assembler calls into — modeled as a single-method
//! trait rather than a struct, since the application may back it with a
//! live schema cache, a static map, or anything else that can answer the
//! one question the assembler needs.

use std::sync::Arc;

use common::error::Result;

/// One column's descriptor as supplied by the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub is_unsigned_integer: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, is_unsigned_integer: bool) -> Self {
        Self {
            name: name.into(),
            is_unsigned_integer,
        }
    }
}

/// Resolves `(database, table)` to an ordered list of column descriptors.
/// The assembler calls this exactly once per table id, the first time it
/// sees that id's table-map event.
pub trait TableInfoMapper: Send {
    fn columns(&self, database: &str, table: &str) -> Result<Vec<ColumnSchema>>;
}

/// Lets the streamer share one mapper between the assembler and its own
/// retained copy across reconnects, without requiring `M: Clone`.
impl<T: TableInfoMapper + ?Sized> TableInfoMapper for Arc<T> {
    fn columns(&self, database: &str, table: &str) -> Result<Vec<ColumnSchema>> {
        (**self).columns(database, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct StaticMapper(HashMap<(String, String), Vec<ColumnSchema>>);

    impl TableInfoMapper for StaticMapper {
        fn columns(&self, database: &str, table: &str) -> Result<Vec<ColumnSchema>> {
            self.0
                .get(&(database.to_string(), table.to_string()))
                .cloned()
                .ok_or_else(|| {
                    common::error::ProtocolError::Malformed(format!(
                        "unknown table {database}.{table}"
                    ))
                    .into()
                })
        }
    }

    #[test]
    fn mapper_resolves_known_table() {
        let mut tables = HashMap::new();
        tables.insert(
            ("vt_test_keyspace".to_string(), "vt_a".to_string()),
            vec![
                ColumnSchema::new("id", false),
                ColumnSchema::new("message", false),
            ],
        );
        let mapper = StaticMapper(tables);
        let cols = mapper.columns("vt_test_keyspace", "vt_a").unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "id");
    }

    #[test]
    fn mapper_errors_on_unknown_table() {
        let mapper = StaticMapper(HashMap::new());
        assert!(mapper.columns("db", "missing").is_err());
    }
}
