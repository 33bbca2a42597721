//! Derived, read-only reconstructions over the four dynamic-workspace
//! substores (§4.4 "Derived views").

use std::sync::Arc;
use serde_json::Value;

use super::{CellsStore, Field, FieldsStore, RowsStore, TableEntity, TablesStore};
use crate::kv_log::LwwKvLog;
use crate::platform::Platform;

#[derive(Debug, Clone)]
pub struct TableWithFields {
    pub table: TableEntity,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct RowWithCells {
    pub id: String,
    pub cells: Vec<(String, Value)>,
}

/// Owns the four dynamic-workspace substores and composes the derived
/// views over them; this is the type [`crate::client::WorkspaceClient`]
/// installs when a workspace definition marks itself "dynamic".
pub struct DynamicWorkspace {
    pub tables: TablesStore,
    pub fields: FieldsStore,
    pub rows: RowsStore,
    pub cells: CellsStore,
}

impl DynamicWorkspace {
    pub fn new(
        tables_log: Arc<LwwKvLog>,
        fields_log: Arc<LwwKvLog>,
        rows_log: Arc<LwwKvLog>,
        cells_log: Arc<LwwKvLog>,
        platform: Arc<dyn Platform>,
    ) -> Self {
        DynamicWorkspace {
            tables: TablesStore::new(tables_log),
            fields: FieldsStore::new(fields_log),
            rows: RowsStore::new(rows_log, platform),
            cells: CellsStore::new(cells_log),
        }
    }

    pub fn get_table_with_fields(&self, table_id: &str) -> Option<TableWithFields> {
        let table = self.tables.get(table_id).ok()?;
        Some(TableWithFields { table, fields: self.fields.list_active(table_id) })
    }

    pub fn get_rows_with_cells(&self, table_id: &str) -> Vec<RowWithCells> {
        let field_ids: Vec<String> = self
            .fields
            .list_active(table_id)
            .into_iter()
            .map(|f| f.id.rsplit(':').next().unwrap_or_default().to_string())
            .collect();
        self.rows
            .list_active(table_id)
            .into_iter()
            .map(|row| {
                let row_id = row.id.rsplit(':').next().unwrap_or_default().to_string();
                let cells = self.cells.get_by_row(table_id, &row_id, &field_ids);
                RowWithCells { id: row_id, cells }
            })
            .collect()
    }

    /// Merges `partial` field values into one row, creating it if needed
    /// (a row is created by the act of setting any of its cells).
    pub fn merge_row(&self, table_id: &str, row_id: &str, partial: &[(String, Value)]) -> crate::error::CResult<()> {
        if matches!(self.rows.get(table_id, row_id), crate::table::RowResult::NotFound { .. }) {
            self.rows.create(table_id, Some(row_id), None)?;
        }
        for (field, value) in partial {
            self.cells.set(table_id, row_id, field, value.clone())?;
        }
        Ok(())
    }

    /// Soft-deletes a row and drops its known cells in the given fields.
    pub fn delete_row(&self, table_id: &str, row_id: &str, field_ids: &[String], ts: i64) -> crate::error::CResult<()> {
        self.rows.delete(table_id, row_id, ts);
        self.cells.delete_row_cells(table_id, row_id, field_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Substrate;
    use crate::dynamic::FieldType;
    use crate::platform::FakePlatform;

    fn workspace() -> DynamicWorkspace {
        let sub = Substrate::new("test-dynamic");
        DynamicWorkspace::new(
            Arc::new(LwwKvLog::new(sub.clone(), "tables").unwrap()),
            Arc::new(LwwKvLog::new(sub.clone(), "fields").unwrap()),
            Arc::new(LwwKvLog::new(sub.clone(), "rows").unwrap()),
            Arc::new(LwwKvLog::new(sub, "cells").unwrap()),
            Arc::new(FakePlatform::new()),
        )
    }

    #[test]
    fn reconstructs_rows_with_cells() {
        let ws = workspace();
        ws.tables.create("t1", "Tasks").unwrap();
        ws.fields.create("t1", "title", "Title", FieldType::Text, 0).unwrap();
        ws.merge_row("t1", "r1", &[("title".to_string(), Value::from("buy milk"))]).unwrap();

        let rows = ws.get_rows_with_cells("t1");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].cells, vec![("title".to_string(), Value::from("buy milk"))]);
    }

    #[test]
    fn table_with_fields_reflects_live_fields_only() {
        let ws = workspace();
        ws.tables.create("t1", "Tasks").unwrap();
        ws.fields.create("t1", "a", "A", FieldType::Text, 0).unwrap();
        ws.fields.delete("t1", "a", 5);
        let view = ws.get_table_with_fields("t1").unwrap();
        assert!(view.fields.is_empty());
    }
}
