use std::sync::Arc;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use super::{key2, split_key, validate_id};
use crate::error::CResult;
use crate::kv_log::LwwKvLog;
use crate::platform::Platform;
use crate::table::{Row, RowResult, Table};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowMeta {
    /// Composite `tableId:rowId`, matching the underlying log key.
    pub id: String,
    pub order: i64,
    #[serde(default, rename = "deletedAt", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Row for RowMeta {
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

pub struct RowsStore {
    table: Table<RowMeta>,
    platform: Arc<dyn Platform>,
    /// Serializes order assignment so a batch creating N rows in one
    /// transaction still yields N distinct `order` values: `Table`/`LwwKvLog`
    /// make the write itself visible to `get_active` immediately, but two
    /// concurrent `create` calls reading "max order" before either writes
    /// would otherwise race onto the same value.
    order_lock: Mutex<()>,
}

impl RowsStore {
    pub fn new(log: Arc<LwwKvLog>, platform: Arc<dyn Platform>) -> Self {
        RowsStore { table: Table::new(log), platform, order_lock: Mutex::new(()) }
    }

    fn next_order(&self, table_id: &str) -> i64 {
        self.list_active_raw(table_id).iter().map(|r| r.order).max().map(|o| o + 1).unwrap_or(0)
    }

    fn list_active_raw(&self, table_id: &str) -> Vec<RowMeta> {
        let prefix = format!("{table_id}:");
        self.table
            .get_active()
            .into_iter()
            .filter(|r| r.id.starts_with(&prefix) && split_key(&r.id).len() == 2)
            .collect()
    }

    /// Creates a row, auto-assigning `order` unless `order` is given and
    /// generating `rowId` via the platform when omitted. Returns the row id
    /// (the part after `tableId:`).
    pub fn create(&self, table_id: &str, row_id: Option<&str>, order: Option<i64>) -> CResult<String> {
        validate_id(table_id)?;
        let row_id = match row_id {
            Some(id) => {
                validate_id(id)?;
                id.to_string()
            }
            None => self.platform.new_id(),
        };
        let _guard = self.order_lock.lock().unwrap();
        let order = order.unwrap_or_else(|| self.next_order(table_id));
        self.table.set(RowMeta { id: key2(table_id, &row_id), order, deleted_at: None })?;
        Ok(row_id)
    }

    pub fn get(&self, table_id: &str, row_id: &str) -> RowResult<RowMeta> {
        self.table.get(&key2(table_id, row_id))
    }

    pub fn delete(&self, table_id: &str, row_id: &str, ts: i64) -> RowResult<RowMeta> {
        self.table.delete(&key2(table_id, row_id), ts)
    }

    pub fn restore(&self, table_id: &str, row_id: &str) -> RowResult<RowMeta> {
        self.table.restore(&key2(table_id, row_id))
    }

    pub fn reorder(&self, table_id: &str, row_id: &str, order: i64) -> RowResult<RowMeta> {
        self.table.update(&key2(table_id, row_id), |r| r.order = order)
    }

    /// Live rows of one table, sorted by `(order, id)`.
    pub fn list_active(&self, table_id: &str) -> Vec<RowMeta> {
        let mut rows = self.list_active_raw(table_id);
        rows.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FakePlatform;
    use crate::substrate::Substrate;

    fn store() -> RowsStore {
        let sub = Substrate::new("test-rows");
        RowsStore::new(Arc::new(LwwKvLog::new(sub, "rows").unwrap()), Arc::new(FakePlatform::new()))
    }

    #[test]
    fn auto_order_increments() {
        let s = store();
        s.create("t1", Some("r1"), None).unwrap();
        s.create("t1", Some("r2"), None).unwrap();
        let rows = s.list_active("t1");
        assert_eq!(rows[0].id, "t1:r1");
        assert_eq!(rows[1].order, 1);
    }

    #[test]
    fn soft_deleted_rows_excluded() {
        let s = store();
        s.create("t1", Some("r1"), None).unwrap();
        s.delete("t1", "r1", 10);
        assert!(s.list_active("t1").is_empty());
    }

    #[test]
    fn omitted_row_id_is_generated_by_the_platform() {
        let s = store();
        let id = s.create("t1", None, None).unwrap();
        assert!(!id.is_empty());
        assert!(matches!(s.get("t1", &id), RowResult::Valid(_)));
    }
}
