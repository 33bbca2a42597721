use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{key2, split_key, validate_id};
use crate::error::{CResult, Error};
use crate::kv_log::LwwKvLog;
use crate::table::{Row, RowResult, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Id,
    Text,
    Integer,
    Real,
    Boolean,
    Date,
    Select,
    Tags,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    /// Composite `tableId:fieldId`, matching the underlying log key.
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub name: String,
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default, rename = "deletedAt", skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<i64>,
}

impl Row for Field {
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

pub struct FieldsStore {
    table: Table<Field>,
}

impl FieldsStore {
    pub fn new(log: Arc<LwwKvLog>) -> Self {
        FieldsStore { table: Table::new(log) }
    }

    pub fn create(
        &self,
        table_id: &str,
        field_id: &str,
        name: &str,
        field_type: FieldType,
        order: i64,
    ) -> CResult<()> {
        validate_id(table_id)?;
        validate_id(field_id)?;
        if field_type == FieldType::Id && self.has_id_field(table_id) {
            return Err(Error::DuplicateIdField(table_id.to_string()));
        }
        self.table.set(Field {
            id: key2(table_id, field_id),
            field_type,
            name: name.to_string(),
            order,
            options: None,
            default: None,
            nullable: false,
            deleted_at: None,
        })
    }

    /// Only one field per table may have `type: id` (§6); scans the same
    /// `tableId:` prefix `list_active` does.
    fn has_id_field(&self, table_id: &str) -> bool {
        let prefix = format!("{table_id}:");
        self.table
            .get_active()
            .into_iter()
            .any(|f| f.id.starts_with(&prefix) && split_key(&f.id).len() == 2 && f.field_type == FieldType::Id)
    }

    pub fn get(&self, table_id: &str, field_id: &str) -> RowResult<Field> {
        self.table.get(&key2(table_id, field_id))
    }

    pub fn delete(&self, table_id: &str, field_id: &str, ts: i64) -> RowResult<Field> {
        self.table.delete(&key2(table_id, field_id), ts)
    }

    /// Live fields of one table, sorted by `(order, id)` as the spec
    /// requires for deterministic cross-peer iteration.
    pub fn list_active(&self, table_id: &str) -> Vec<Field> {
        let prefix = format!("{table_id}:");
        let mut fields: Vec<Field> = self
            .table
            .get_active()
            .into_iter()
            .filter(|f| f.id.starts_with(&prefix) && split_key(&f.id).len() == 2)
            .collect();
        fields.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Substrate;

    fn store() -> FieldsStore {
        let sub = Substrate::new("test-fields");
        FieldsStore::new(Arc::new(LwwKvLog::new(sub, "fields").unwrap()))
    }

    #[test]
    fn fields_sorted_by_order_then_id() {
        let s = store();
        s.create("t1", "b", "B", FieldType::Text, 2).unwrap();
        s.create("t1", "a", "A", FieldType::Text, 1).unwrap();
        let listed = s.list_active("t1");
        assert_eq!(listed.iter().map(|f| f.name.clone()).collect::<Vec<_>>(), vec!["A", "B"]);
    }

    #[test]
    fn fields_scoped_to_their_table() {
        let s = store();
        s.create("t1", "a", "A", FieldType::Text, 1).unwrap();
        s.create("t2", "a", "A2", FieldType::Text, 1).unwrap();
        assert_eq!(s.list_active("t1").len(), 1);
    }

    #[test]
    fn a_second_id_field_on_the_same_table_is_rejected() {
        let s = store();
        s.create("t1", "pk", "Id", FieldType::Id, 0).unwrap();
        let err = s.create("t1", "pk2", "Id2", FieldType::Id, 1).unwrap_err();
        assert!(matches!(err, crate::error::Error::DuplicateIdField(ref t) if t == "t1"));
    }

    #[test]
    fn id_fields_on_different_tables_are_independent() {
        let s = store();
        s.create("t1", "pk", "Id", FieldType::Id, 0).unwrap();
        assert!(s.create("t2", "pk", "Id", FieldType::Id, 0).is_ok());
    }
}
