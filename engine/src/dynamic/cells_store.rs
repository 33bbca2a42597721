use std::sync::Arc;

use serde_json::Value;

use super::{key3, validate_id};
use crate::error::CResult;
use crate::kv_log::LwwKvLog;

/// Cell values have no tombstone of their own (§3.4): a cell is considered
/// gone only because its owning row or field was soft-deleted, never
/// because the cell itself was deleted. `CellsStore` is therefore a thin
/// wrapper directly over [`LwwKvLog`], not a [`crate::table::Table`].
pub struct CellsStore {
    log: Arc<LwwKvLog>,
}

impl CellsStore {
    pub fn new(log: Arc<LwwKvLog>) -> Self {
        CellsStore { log }
    }

    pub fn set(&self, table_id: &str, row_id: &str, field_id: &str, value: Value) -> CResult<()> {
        validate_id(table_id)?;
        validate_id(row_id)?;
        validate_id(field_id)?;
        self.log.set(&key3(table_id, row_id, field_id), value)
    }

    pub fn get(&self, table_id: &str, row_id: &str, field_id: &str) -> Option<Value> {
        self.log.get(&key3(table_id, row_id, field_id))
    }

    pub fn has(&self, table_id: &str, row_id: &str, field_id: &str) -> bool {
        self.log.has(&key3(table_id, row_id, field_id))
    }

    pub fn delete(&self, table_id: &str, row_id: &str, field_id: &str) -> CResult<()> {
        self.log.delete(&key3(table_id, row_id, field_id))
    }

    /// All known cell values of one row, restricted to `field_ids`.
    pub fn get_by_row(&self, table_id: &str, row_id: &str, field_ids: &[String]) -> Vec<(String, Value)> {
        field_ids
            .iter()
            .filter_map(|fid| self.get(table_id, row_id, fid).map(|v| (fid.clone(), v)))
            .collect()
    }

    /// Deletes every known cell of a row; used by the row-ops wrapper's
    /// `delete` to clean up cells before dropping a row entirely (as
    /// opposed to soft-deleting through `RowsStore`).
    pub fn delete_row_cells(&self, table_id: &str, row_id: &str, field_ids: &[String]) -> CResult<()> {
        for fid in field_ids {
            self.delete(table_id, row_id, fid)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Substrate;

    fn store() -> CellsStore {
        let sub = Substrate::new("test-cells");
        CellsStore::new(Arc::new(LwwKvLog::new(sub, "cells").unwrap()))
    }

    #[test]
    fn set_then_get() {
        let s = store();
        s.set("t1", "r1", "title", Value::String("hi".into())).unwrap();
        assert_eq!(s.get("t1", "r1", "title"), Some(Value::String("hi".into())));
    }

    #[test]
    fn get_by_row_filters_to_requested_fields() {
        let s = store();
        s.set("t1", "r1", "a", Value::from(1)).unwrap();
        s.set("t1", "r1", "b", Value::from(2)).unwrap();
        let got = s.get_by_row("t1", "r1", &["a".to_string(), "c".to_string()]);
        assert_eq!(got, vec![("a".to_string(), Value::from(1))]);
    }
}
