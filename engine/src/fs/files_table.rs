use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CResult;
use crate::kv_log::LwwKvLog;
use crate::table::{Row, RowResult, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Folder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRow {
    pub id: String,
    pub name: String,
    #[serde(rename = "parentId")]
    pub parent_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: FileKind,
    pub size: u64,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    #[serde(rename = "updatedAt")]
    pub updated_at: i64,
    #[serde(rename = "trashedAt", default, skip_serializing_if = "Option::is_none")]
    pub trashed_at: Option<i64>,
}

impl Row for FileRow {
    fn id(&self) -> &str {
        &self.id
    }
    fn deleted_at(&self) -> Option<i64> {
        self.trashed_at
    }
    fn set_deleted_at(&mut self, ts: Option<i64>) {
        self.trashed_at = ts;
    }
}

pub struct FilesTable {
    table: Table<FileRow>,
}

impl FilesTable {
    pub fn new(log: Arc<LwwKvLog>) -> Self {
        FilesTable { table: Table::new(log) }
    }

    pub fn create(&self, id: &str, name: &str, parent_id: Option<&str>, kind: FileKind, ts: i64) -> CResult<()> {
        self.table.set(FileRow {
            id: id.to_string(),
            name: name.to_string(),
            parent_id: parent_id.map(|s| s.to_string()),
            kind,
            size: 0,
            created_at: ts,
            updated_at: ts,
            trashed_at: None,
        })
    }

    pub fn get(&self, id: &str) -> RowResult<FileRow> {
        self.table.get(id)
    }

    pub fn all_active(&self) -> Vec<FileRow> {
        self.table.get_active()
    }

    pub fn all(&self) -> Vec<RowResult<FileRow>> {
        self.table.get_all()
    }

    pub fn move_to(&self, id: &str, new_parent_id: Option<&str>, new_name: Option<&str>, ts: i64) -> RowResult<FileRow> {
        self.table.update(id, |row| {
            row.parent_id = new_parent_id.map(|s| s.to_string());
            if let Some(name) = new_name {
                row.name = name.to_string();
            }
            row.updated_at = ts;
        })
    }

    pub fn touch(&self, id: &str, size: u64, ts: i64) -> RowResult<FileRow> {
        self.table.update(id, |row| {
            row.size = size;
            row.updated_at = ts;
        })
    }

    pub fn set_mtime(&self, id: &str, ts: i64) -> RowResult<FileRow> {
        self.table.update(id, |row| row.updated_at = ts)
    }

    pub fn soft_delete(&self, id: &str, ts: i64) -> RowResult<FileRow> {
        self.table.delete(id, ts)
    }

    pub fn active_children(&self, parent_id: Option<&str>) -> Vec<FileRow> {
        self.all_active().into_iter().filter(|r| r.parent_id.as_deref() == parent_id).collect()
    }

    /// All live descendant ids of `id`, including `id` itself's children
    /// transitively, via BFS over `active_children`.
    pub fn descendant_ids(&self, id: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut frontier = vec![id.to_string()];
        while let Some(current) = frontier.pop() {
            for child in self.active_children(Some(&current)) {
                out.push(child.id.clone());
                frontier.push(child.id);
            }
        }
        out
    }

    pub fn observe(&self, handler: crate::kv_log::Handler) {
        self.table.observe(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Substrate;

    fn table() -> FilesTable {
        let sub = Substrate::new("test-files");
        FilesTable::new(Arc::new(LwwKvLog::new(sub, "files").unwrap()))
    }

    #[test]
    fn descendant_ids_walks_the_whole_subtree() {
        let t = table();
        t.create("root", "root", None, FileKind::Folder, 0).unwrap();
        t.create("a", "a", Some("root"), FileKind::Folder, 0).unwrap();
        t.create("b", "b", Some("a"), FileKind::File, 0).unwrap();
        let mut ids = t.descendant_ids("root");
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
