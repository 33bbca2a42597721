//! Dynamic workspace (§3.4, §4.4): schema-as-data. Tables, fields, rows and
//! cells are each their own LWW KV store, sharing a `:`-delimited
//! composite-key convention but never the same underlying array — a field
//! keyed `tableId:fieldId` and a row keyed `tableId:rowId` must not be able
//! to collide just because both happen to be two segments.

pub mod cells_store;
pub mod fields_store;
pub mod rows_store;
pub mod tables_store;
pub mod views;

pub use cells_store::CellsStore;
pub use fields_store::{Field, FieldsStore};
pub use rows_store::{RowMeta, RowsStore};
pub use tables_store::{TableEntity, TablesStore};
pub use views::{RowWithCells, TableWithFields};

use crate::error::{CResult, Error};

/// Identifiers used as key components must not contain `:`.
pub fn validate_id(id: &str) -> CResult<()> {
    if id.contains(':') {
        return Err(Error::IdCollision(id.to_string()));
    }
    Ok(())
}

pub fn key2(a: &str, b: &str) -> String {
    format!("{a}:{b}")
}

pub fn key3(a: &str, b: &str, c: &str) -> String {
    format!("{a}:{b}:{c}")
}

/// Splits a composite key back into its `:`-delimited parts.
pub fn split_key(key: &str) -> Vec<&str> {
    key.split(':').collect()
}
