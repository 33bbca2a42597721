//! Schema-validated row collection over the LWW KV log (§4.2).

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CResult;
use crate::kv_log::{Change, Handler, LwwKvLog};

/// A row type usable with [`Table`]. Every row has a stable `id` and an
/// optional soft-delete marker; `Table` never deletes the underlying log
/// entry, it only stamps `deletedAt`.
pub trait Row: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn deleted_at(&self) -> Option<i64>;
    fn set_deleted_at(&mut self, ts: Option<i64>);
}

/// Outcome of reading one row: matches the spec's three-way
/// valid/invalid/not_found result shape rather than throwing on read.
#[derive(Debug, Clone)]
pub enum RowResult<T> {
    Valid(T),
    Invalid { id: String, errors: Vec<String> },
    NotFound { id: String },
}

impl<T> RowResult<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            RowResult::Valid(row) => Some(row),
            _ => None,
        }
    }
}

/// Migrates a historical row shape (arbitrary JSON) into the latest shape.
/// Returns `None` when the value cannot be migrated at all.
pub type MigrateFn = Arc<dyn Fn(Value) -> Option<Value> + Send + Sync>;

pub struct Table<T: Row> {
    log: Arc<LwwKvLog>,
    migrate: Option<MigrateFn>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Row> Table<T> {
    pub fn new(log: Arc<LwwKvLog>) -> Self {
        Table { log, migrate: None, _marker: std::marker::PhantomData }
    }

    pub fn with_migration(log: Arc<LwwKvLog>, migrate: MigrateFn) -> Self {
        Table { log, migrate: Some(migrate), _marker: std::marker::PhantomData }
    }

    fn validate(&self, id: &str, raw: Value) -> RowResult<T> {
        if let Ok(row) = serde_json::from_value::<T>(raw.clone()) {
            return RowResult::Valid(row);
        }
        if let Some(migrate) = &self.migrate {
            if let Some(migrated) = migrate(raw) {
                if let Ok(row) = serde_json::from_value::<T>(migrated) {
                    return RowResult::Valid(row);
                }
            }
        }
        RowResult::Invalid { id: id.to_string(), errors: vec!["row does not match the latest schema".into()] }
    }

    pub fn get(&self, id: &str) -> RowResult<T> {
        match self.log.get(id) {
            Some(raw) => self.validate(id, raw),
            None => RowResult::NotFound { id: id.to_string() },
        }
    }

    pub fn parse(&self, id: &str, raw: Value) -> RowResult<T> {
        self.validate(id, raw)
    }

    /// All rows in insertion order, live and trashed, valid and invalid.
    pub fn get_all(&self) -> Vec<RowResult<T>> {
        self.log
            .entries()
            .into_iter()
            .map(|(id, raw)| self.validate(&id, raw))
            .collect()
    }

    pub fn get_all_valid(&self) -> Vec<T> {
        self.get_all().into_iter().filter_map(|r| r.ok()).collect()
    }

    pub fn get_all_invalid(&self) -> Vec<(String, Vec<String>)> {
        self.get_all()
            .into_iter()
            .filter_map(|r| match r {
                RowResult::Invalid { id, errors } => Some((id, errors)),
                _ => None,
            })
            .collect()
    }

    /// Rows whose `deletedAt` is unset, serialized in the same order as
    /// [`Self::get_all_valid`].
    pub fn get_active(&self) -> Vec<T> {
        self.get_all_valid().into_iter().filter(|r| r.deleted_at().is_none()).collect()
    }

    pub fn set(&self, row: T) -> CResult<()> {
        let id = row.id().to_string();
        let value = serde_json::to_value(row)?;
        self.log.set(&id, value)
    }

    /// Updating a non-existent or trashed row fails with `NotFound`; use
    /// [`Self::restore`] to bring a trashed row back.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut T)) -> RowResult<T> {
        match self.get(id) {
            RowResult::Valid(row) if row.deleted_at().is_some() => RowResult::NotFound { id: id.to_string() },
            RowResult::Valid(row) => self.write_update(id, row, f),
            other => other,
        }
    }

    fn write_update(&self, id: &str, mut row: T, f: impl FnOnce(&mut T)) -> RowResult<T> {
        f(&mut row);
        if let Ok(value) = serde_json::to_value(&row) {
            let _ = self.log.set(id, value);
        }
        RowResult::Valid(row)
    }

    /// Soft delete: stamps `deletedAt`, never removes the log entry.
    pub fn delete(&self, id: &str, ts: i64) -> RowResult<T> {
        self.update(id, |row| row.set_deleted_at(Some(ts)))
    }

    /// Bypasses the trashed check `update` enforces: this is the one
    /// legitimate way to mutate a trashed row.
    pub fn restore(&self, id: &str) -> RowResult<T> {
        match self.get(id) {
            RowResult::Valid(row) => self.write_update(id, row, |row| row.set_deleted_at(None)),
            other => other,
        }
    }

    pub fn count(&self) -> usize {
        self.log.entries().len()
    }

    /// Hard-clears every row by writing tombstones for all live keys. The
    /// underlying log retains the tombstones until substrate GC runs.
    pub fn clear(&self) -> CResult<()> {
        for (id, _) in self.log.entries() {
            self.log.delete(&id)?;
        }
        Ok(())
    }

    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> CResult<R>) -> CResult<R> {
        self.log.batch(|_| f(self))
    }

    pub fn observe(&self, handler: Handler) {
        self.log.observe(handler);
    }
}

/// Per-row change, re-exported so callers observing a [`Table`] do not need
/// to depend on `kv_log` directly.
pub type RowChange = Change;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Substrate;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Task {
        id: String,
        title: String,
        #[serde(rename = "deletedAt")]
        deleted_at: Option<i64>,
    }

    impl Row for Task {
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

    fn table() -> Table<Task> {
        let sub = Substrate::new("test-table");
        let log = Arc::new(LwwKvLog::new(sub, "rows").unwrap());
        Table::new(log)
    }

    #[test]
    fn set_then_get_round_trips() {
        let t = table();
        t.set(Task { id: "1".into(), title: "write spec".into(), deleted_at: None }).unwrap();
        match t.get("1") {
            RowResult::Valid(row) => assert_eq!(row.title, "write spec"),
            other => panic!("expected valid row, got {other:?}"),
        }
    }

    #[test]
    fn missing_row_is_not_found() {
        let t = table();
        assert!(matches!(t.get("nope"), RowResult::NotFound { .. }));
    }

    #[test]
    fn soft_delete_keeps_row_out_of_active_listing() {
        let t = table();
        t.set(Task { id: "1".into(), title: "a".into(), deleted_at: None }).unwrap();
        t.delete("1", 1000);
        assert!(t.get_active().is_empty());
        assert!(matches!(t.get("1"), RowResult::Valid(_)));
    }

    #[test]
    fn invalid_rows_are_reported_separately() {
        let t = table();
        t.log.set("1", serde_json::json!({"id": "1"})).unwrap();
        assert_eq!(t.get_all_invalid().len(), 1);
        assert!(t.get_all_valid().is_empty());
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for RowResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowResult::Valid(row) => write!(f, "Valid({row:?})"),
            RowResult::Invalid { id, errors } => write!(f, "Invalid {{ id: {id:?}, errors: {errors:?} }}"),
            RowResult::NotFound { id } => write!(f, "NotFound {{ id: {id:?} }}"),
        }
    }
}
