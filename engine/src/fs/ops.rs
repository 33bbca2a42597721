//! High-level POSIX-like file operations (§4.5 "File operations"),
//! composing [`FilesTable`] (structure), [`PathIndex`] (path resolution)
//! and [`ContentDocStore`] (bytes). Symlinks and hard links are
//! unconditionally unsupported (`ENOSYS`), matching the spec.

use std::sync::{Arc, Mutex};

use crate::error::CResult;
use crate::fs::content::{ContentDocStore, WriteData};
use crate::fs::error::FsError;
use crate::fs::files_table::{FileKind, FileRow, FilesTable};
use crate::fs::path_index::PathIndex;
use crate::kv_log::LwwKvLog;
use crate::platform::Platform;
use crate::table::RowResult;

#[derive(Debug, Clone)]
pub struct Stat {
    pub id: String,
    pub name: String,
    pub kind: FileKind,
    pub size: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<FileRow> for Stat {
    fn from(row: FileRow) -> Self {
        Stat { id: row.id, name: row.name, kind: row.kind, size: row.size, created_at: row.created_at, updated_at: row.updated_at }
    }
}

pub struct FileSystem {
    files: FilesTable,
    content: ContentDocStore,
    index: Mutex<PathIndex>,
    platform: Arc<dyn Platform>,
}

impl FileSystem {
    pub fn new(log: Arc<LwwKvLog>, platform: Arc<dyn Platform>) -> Self {
        let fs = FileSystem {
            files: FilesTable::new(log),
            content: ContentDocStore::new(),
            index: Mutex::new(PathIndex::default()),
            platform,
        };
        fs.rebuild_index();
        fs
    }

    /// Rebuilds the path index and writes back any corrections (cycle
    /// breaks, orphan re-parenting) the rebuild found.
    pub fn rebuild_index(&self) {
        let rows = self.files.all_active();
        let corrections = {
            let mut index = self.index.lock().unwrap();
            index.rebuild(&rows)
        };
        for (id, reason) in corrections {
            log::warn!("path index repaired {id}: {reason:?}");
            let ts = self.platform.now();
            self.files.move_to(&id, None, None, ts);
        }
    }

    pub fn resolve_id(&self, path: &str) -> Result<String, FsError> {
        self.index.lock().unwrap().lookup_id(path).cloned().ok_or_else(|| FsError::not_found(path))
    }

    pub fn lookup_id(&self, path: &str) -> Option<String> {
        self.index.lock().unwrap().lookup_id(path).cloned()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lookup_id(path).is_some()
    }

    pub fn realpath(&self, id: &str) -> Option<String> {
        self.index.lock().unwrap().path_for_id(id).cloned()
    }

    pub fn stat(&self, path: &str) -> Result<Stat, FsError> {
        let id = self.resolve_id(path)?;
        match self.files.get(&id) {
            RowResult::Valid(row) => Ok(row.into()),
            _ => Err(FsError::not_found(path)),
        }
    }

    pub fn lstat(&self, path: &str) -> Result<Stat, FsError> {
        self.stat(path)
    }

    pub fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        let id = self.resolve_id(path)?;
        let row = match self.files.get(&id) {
            RowResult::Valid(row) => row,
            _ => return Err(FsError::not_found(path)),
        };
        if row.kind != FileKind::Folder {
            return Err(FsError::not_dir(path));
        }
        Ok(self
            .files
            .active_children(Some(&id))
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    pub fn readdir_with_file_types(&self, path: &str) -> Result<Vec<(String, FileKind)>, FsError> {
        let id = self.resolve_id(path)?;
        Ok(self.files.active_children(Some(&id)).into_iter().map(|c| (c.name, c.kind)).collect())
    }

    fn split_parent(path: &str) -> (String, String) {
        let path = path.trim_end_matches('/');
        match path.rfind('/') {
            Some(0) => ("/".to_string(), path[1..].to_string()),
            Some(i) => (path[..i].to_string(), path[i + 1..].to_string()),
            None => ("/".to_string(), path.to_string()),
        }
    }

    fn parent_id(&self, parent_path: &str) -> Result<Option<String>, FsError> {
        if parent_path == "/" {
            Ok(None)
        } else {
            Ok(Some(self.resolve_id(parent_path)?))
        }
    }

    pub fn mkdir(&self, path: &str, recursive: bool) -> Result<Stat, FsError> {
        if self.exists(path) {
            if recursive {
                return self.stat(path);
            }
            return Err(FsError::already_exists(path));
        }
        let (parent_path, name) = Self::split_parent(path);
        let parent_id = if recursive && !self.exists(&parent_path) && parent_path != "/" {
            Some(self.mkdir(&parent_path, true)?.id)
        } else {
            self.parent_id(&parent_path)?
        };
        let ts = self.platform.now();
        let id = self.platform.new_id();
        self.files
            .create(&id, &name, parent_id.as_deref(), FileKind::Folder, ts)
            .map_err(|_| FsError::already_exists(path))?;
        self.rebuild_index();
        self.stat(path)
    }

    pub fn write_file(&self, path: &str, data: &str) -> Result<Stat, FsError> {
        let id = self.ensure_file(path)?;
        let size = self.content.write(&id, WriteData::Text(data)).unwrap_or(0);
        let ts = self.platform.now();
        self.files.touch(&id, size, ts);
        self.rebuild_index();
        self.stat(path)
    }

    pub fn write_file_bytes(&self, path: &str, data: &[u8]) -> Result<Stat, FsError> {
        let id = self.ensure_file(path)?;
        let size = self.content.write(&id, WriteData::Bytes(data)).unwrap_or(0);
        let ts = self.platform.now();
        self.files.touch(&id, size, ts);
        self.rebuild_index();
        self.stat(path)
    }

    pub fn append_file(&self, path: &str, data: &str) -> Result<Stat, FsError> {
        let id = match self.lookup_id(path) {
            Some(id) => id,
            None => return self.write_file(path, data),
        };
        match self.content.append(&id, WriteData::Text(data)).unwrap_or(None) {
            Some(size) => {
                let ts = self.platform.now();
                self.files.touch(&id, size, ts);
            }
            None => {
                self.content.write(&id, WriteData::Text(data)).ok();
            }
        }
        self.stat(path)
    }

    fn ensure_file(&self, path: &str) -> Result<String, FsError> {
        if let Some(id) = self.lookup_id(path) {
            if let RowResult::Valid(row) = self.files.get(&id) {
                if row.kind == FileKind::Folder {
                    return Err(FsError::is_dir(path));
                }
            }
            return Ok(id);
        }
        let (parent_path, name) = Self::split_parent(path);
        let parent_id = self.parent_id(&parent_path)?;
        let ts = self.platform.now();
        let id = self.platform.new_id();
        self.files
            .create(&id, &name, parent_id.as_deref(), FileKind::File, ts)
            .map_err(|_| FsError::already_exists(path))?;
        self.rebuild_index();
        Ok(id)
    }

    pub fn read_file(&self, path: &str) -> Result<String, FsError> {
        let id = self.resolve_id(path)?;
        Ok(self.content.read(&id))
    }

    pub fn read_file_buffer(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let id = self.resolve_id(path)?;
        Ok(self.content.read_buffer(&id))
    }

    pub fn rm(&self, path: &str, recursive: bool, force: bool) -> Result<(), FsError> {
        let id = match self.resolve_id(path) {
            Ok(id) => id,
            Err(e) if force => {
                let _ = e;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let children = self.files.active_children(Some(&id));
        if !children.is_empty() && !recursive {
            return Err(FsError::not_empty(path));
        }
        let ts = self.platform.now();
        for descendant in self.files.descendant_ids(&id) {
            self.files.soft_delete(&descendant, ts);
            self.content.destroy(&descendant);
        }
        self.files.soft_delete(&id, ts);
        self.content.destroy(&id);
        self.rebuild_index();
        Ok(())
    }

    pub fn mv(&self, from: &str, to: &str) -> Result<Stat, FsError> {
        let id = self.resolve_id(from)?;
        let (parent_path, name) = Self::split_parent(to);
        let parent_id = self.parent_id(&parent_path)?;
        let ts = self.platform.now();
        self.files.move_to(&id, parent_id.as_deref(), Some(&name), ts);
        self.rebuild_index();
        self.stat(to)
    }

    /// Copies file content (directories copy only the entry, not
    /// recursively, unless `recursive` is set).
    pub fn cp(&self, from: &str, to: &str, recursive: bool) -> Result<Stat, FsError> {
        let src = self.stat(from)?;
        match src.kind {
            FileKind::File => {
                let bytes = self.read_file_buffer(from)?;
                self.write_file_bytes(to, &bytes)
            }
            FileKind::Folder => {
                let created = self.mkdir(to, true)?;
                if recursive {
                    for child in self.readdir(from)?.iter() {
                        let child_from = format!("{}/{}", from.trim_end_matches('/'), child);
                        let child_to = format!("{}/{}", to.trim_end_matches('/'), child);
                        self.cp(&child_from, &child_to, true)?;
                    }
                }
                Ok(created)
            }
        }
    }

    pub fn chmod(&self, path: &str, _mode: u32) -> Result<(), FsError> {
        // No permission model exists; validated no-op per the spec.
        self.stat(path)?;
        Ok(())
    }

    pub fn utimes(&self, path: &str, mtime: i64) -> Result<Stat, FsError> {
        let id = self.resolve_id(path)?;
        self.files.set_mtime(&id, mtime);
        self.stat(path)
    }

    pub fn resolve_path(&self, path: &str) -> Result<String, FsError> {
        // Caller is expected to have already stripped `.`/`..`; this just
        // validates the leading slash and normalizes trailing slashes.
        if !path.starts_with('/') {
            return Err(FsError::not_found(path));
        }
        Ok(path.trim_end_matches('/').to_string())
    }

    pub fn symlink(&self, _target: &str, _path: &str) -> Result<(), FsError> {
        Err(FsError::not_supported("symlink"))
    }

    pub fn link(&self, _existing: &str, _new: &str) -> Result<(), FsError> {
        Err(FsError::not_supported("link"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::FakePlatform;
    use crate::substrate::Substrate;

    fn fs() -> FileSystem {
        let sub = Substrate::new("test-fs");
        let log = Arc::new(LwwKvLog::new(sub, "files").unwrap());
        FileSystem::new(log, Arc::new(FakePlatform::new()))
    }

    #[test]
    fn mkdir_write_read_round_trip() {
        let fs = fs();
        fs.mkdir("/docs", true).unwrap();
        fs.write_file("/docs/a.txt", "hello").unwrap();
        assert_eq!(fs.read_file("/docs/a.txt").unwrap(), "hello");
        assert_eq!(fs.readdir("/docs").unwrap(), vec!["a.txt".to_string()]);
    }

    #[test]
    fn rm_without_recursive_on_nonempty_dir_fails() {
        let fs = fs();
        fs.mkdir("/docs", true).unwrap();
        fs.write_file("/docs/a.txt", "x").unwrap();
        assert!(fs.rm("/docs", false, false).is_err());
        assert!(fs.rm("/docs", true, false).is_ok());
        assert!(!fs.exists("/docs"));
    }

    #[test]
    fn mv_updates_path_index() {
        let fs = fs();
        fs.write_file("/a.txt", "x").unwrap();
        fs.mv("/a.txt", "/b.txt").unwrap();
        assert!(!fs.exists("/a.txt"));
        assert_eq!(fs.read_file("/b.txt").unwrap(), "x");
    }

    #[test]
    fn symlink_is_not_supported() {
        let fs = fs();
        assert!(fs.symlink("/a", "/b").is_err());
    }

    #[test]
    fn writing_to_a_directory_path_fails_with_eisdir() {
        let fs = fs();
        fs.mkdir("/docs", true).unwrap();
        let err = fs.write_file("/docs", "x").unwrap_err();
        assert_eq!(err.code, crate::fs::error::FsErrorCode::EISDIR);
    }
}
