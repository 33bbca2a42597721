use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::validate_id;
use crate::error::CResult;
use crate::kv_log::LwwKvLog;
use crate::table::{Row, RowResult, Table};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableEntity {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, rename = "deletedAt", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Row for TableEntity {
    fn id(&self) -> &str {
        &self.id
    }
    fn deleted_at(&self) -> Option<i64> {
        self.deleted_at
    }
    fn set_deleted_at(&mut self, ts: Option<i64>) {
        self.deleted_at = ts;
    }
}

pub struct TablesStore {
    table: Table<TableEntity>,
}

impl TablesStore {
    pub fn new(log: Arc<LwwKvLog>) -> Self {
        TablesStore { table: Table::new(log) }
    }

    pub fn create(&self, id: &str, name: &str) -> CResult<()> {
        validate_id(id)?;
        self.table.set(TableEntity { id: id.to_string(), name: name.to_string(), description: None, icon: None, deleted_at: None })
    }

    pub fn get(&self, id: &str) -> RowResult<TableEntity> {
        self.table.get(id)
    }

    pub fn list_active(&self) -> Vec<TableEntity> {
        self.table.get_active()
    }

    pub fn update(&self, id: &str, f: impl FnOnce(&mut TableEntity)) -> RowResult<TableEntity> {
        self.table.update(id, f)
    }

    pub fn delete(&self, id: &str, ts: i64) -> RowResult<TableEntity> {
        self.table.delete(id, ts)
    }

    pub fn restore(&self, id: &str) -> RowResult<TableEntity> {
        self.table.restore(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Substrate;

    fn store() -> TablesStore {
        let sub = Substrate::new("test-tables");
        TablesStore::new(Arc::new(LwwKvLog::new(sub, "tables").unwrap()))
    }

    #[test]
    fn create_then_list_active() {
        let s = store();
        s.create("t1", "Tasks").unwrap();
        assert_eq!(s.list_active().len(), 1);
    }

    #[test]
    fn soft_deleted_table_excluded_from_active_listing() {
        let s = store();
        s.create("t1", "Tasks").unwrap();
        s.delete("t1", 1);
        assert!(s.list_active().is_empty());
        assert!(matches!(s.get("t1"), RowResult::Valid(_)));
    }

    #[test]
    fn id_with_colon_is_rejected() {
        let s = store();
        assert!(s.create("bad:id", "x").is_err());
    }
}
