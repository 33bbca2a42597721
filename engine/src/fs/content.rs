//! Per-file content timeline (§3.5, §4.5, §4.8). Each live file owns a
//! content doc: a separate CRDT document whose `timeline` array holds
//! tagged entries (`text` / `richtext` / `binary` / `sheet`). The current
//! mode is whatever the last entry's tag is; mode switches append a new
//! entry rather than mutating history, so timeline reads never lose data.
//!
//! Grounded in the same shape a production CRDT-filesystem wraps a `Y.Text`
//! in per-file state for: lazily acquiring a doc on first access, mutating
//! in place when the mode is unchanged, and appending a new entry on a
//! mode switch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use yrs::{Any, Array, ArrayRef, GetString, Map, MapPrelim, MapRef, Text, TextPrelim, TextRef, Transact};

use crate::error::{CResult, Error};
use crate::substrate::{Origin, Substrate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Text,
    RichText,
    Binary,
    Sheet,
}

/// One content doc, lazily constructed. Mirrors `ensure(fileId)` from the
/// spec: the substrate is created on first access and kept for the file's
/// lifetime until [`ContentDocStore::destroy`].
struct ContentDoc {
    substrate: Substrate,
}

impl ContentDoc {
    fn timeline(&self) -> ArrayRef {
        self.substrate.array("timeline")
    }

    fn current_mode(&self) -> Option<Mode> {
        let txn = self.substrate.doc().transact();
        let timeline = self.timeline();
        let last = timeline.iter(&txn).last()?;
        let Any::Map(map) = last else { return None };
        match map.get("type") {
            Some(Any::String(s)) if s.as_ref() == "text" => Some(Mode::Text),
            Some(Any::String(s)) if s.as_ref() == "richtext" => Some(Mode::RichText),
            Some(Any::String(s)) if s.as_ref() == "binary" => Some(Mode::Binary),
            Some(Any::String(s)) if s.as_ref() == "sheet" => Some(Mode::Sheet),
            _ => None,
        }
    }

    fn last_entry_map(&self) -> Option<MapRef> {
        // `yrs` array iteration over shared-type children yields owned refs
        // for map/array/text entries; `last()` on the typed iterator gives
        // us the nested MapRef directly.
        let txn = self.substrate.doc().transact();
        let timeline = self.timeline();
        let len = timeline.len(&txn);
        if len == 0 {
            return None;
        }
        timeline.get(&txn, len - 1).and_then(|v| match v {
            yrs::Value::YMap(m) => Some(m),
            _ => None,
        })
    }

    fn append_text_entry(&self, initial: &str) -> TextRef {
        self.substrate.with_transaction(Origin::Local, |txn| {
            let timeline = self.timeline();
            let entry: MapRef = timeline.push_back(txn, MapPrelim::from(HashMap::<String, Any>::new()));
            entry.insert(txn, "type", Any::String("text".into()));
            entry.insert(txn, "content", TextPrelim::new(initial))
        })
    }

    fn append_binary_entry(&self, bytes: &[u8]) {
        self.substrate.with_transaction(Origin::Local, |txn| {
            let timeline = self.timeline();
            timeline.push_back(
                txn,
                MapPrelim::from(vec![
                    ("type".to_string(), Any::String("binary".into())),
                    ("content".to_string(), Any::Buffer(bytes.to_vec().into_boxed_slice())),
                ]),
            );
        });
    }

    fn append_sheet_entry(&self, rows: &[Vec<String>]) {
        self.substrate.with_transaction(Origin::Local, |txn| {
            let timeline = self.timeline();
            let cell_rows: Vec<Any> = rows
                .iter()
                .map(|row| Any::Array(row.iter().map(|c| Any::String(c.as_str().into())).collect()))
                .collect();
            timeline.push_back(
                txn,
                MapPrelim::from(vec![
                    ("type".to_string(), Any::String("sheet".into())),
                    ("content".to_string(), Any::Array(cell_rows.into())),
                ]),
            );
        });
    }

    fn read_text(&self) -> String {
        let Some(entry) = self.last_entry_map() else { return String::new() };
        let txn = self.substrate.doc().transact();
        match entry.get(&txn, "content") {
            Some(yrs::Value::YText(t)) => t.get_string(&txn),
            _ => String::new(),
        }
    }

    fn read_binary(&self) -> Vec<u8> {
        let Some(entry) = self.last_entry_map() else { return Vec::new() };
        let txn = self.substrate.doc().transact();
        match entry.get(&txn, "content") {
            Some(yrs::Value::Any(Any::Buffer(b))) => b.to_vec(),
            _ => Vec::new(),
        }
    }

    /// Projects a sheet entry's rows as CSV, one line per row.
    fn read_sheet(&self) -> String {
        let Some(entry) = self.last_entry_map() else { return String::new() };
        let txn = self.substrate.doc().transact();
        match entry.get(&txn, "content") {
            Some(yrs::Value::Any(Any::Array(rows))) => rows
                .iter()
                .map(|row| match row {
                    Any::Array(cells) => cells.iter().map(csv_field).collect::<Vec<_>>().join(","),
                    other => csv_field(other),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            _ => String::new(),
        }
    }
}

/// Renders one `Any` scalar as a CSV field, quoting when it contains a
/// comma, quote, or newline (doubling embedded quotes).
fn csv_field(value: &Any) -> String {
    let raw = match value {
        Any::String(s) => s.to_string(),
        Any::Number(n) => n.to_string(),
        Any::BigInt(n) => n.to_string(),
        Any::Bool(b) => b.to_string(),
        _ => String::new(),
    };
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw
    }
}

/// Content to write; strings take the incremental-edit path when the
/// current mode is already text, bytes always append a new binary entry
/// (§4.5 "Content I/O").
pub enum WriteData<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
    Sheet(&'a [Vec<String>]),
}

pub struct ContentDocStore {
    docs: Mutex<HashMap<String, Arc<ContentDoc>>>,
}

impl Default for ContentDocStore {
    fn default() -> Self {
        ContentDocStore { docs: Mutex::new(HashMap::new()) }
    }
}

impl ContentDocStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure(&self, file_id: &str) -> Arc<ContentDoc> {
        let mut docs = self.docs.lock().unwrap();
        docs.entry(file_id.to_string())
            .or_insert_with(|| Arc::new(ContentDoc { substrate: Substrate::new(file_id.to_string()) }))
            .clone()
    }

    pub fn destroy(&self, file_id: &str) {
        self.docs.lock().unwrap().remove(file_id);
    }

    pub fn destroy_all(&self) {
        self.docs.lock().unwrap().clear();
    }

    pub fn current_mode(&self, file_id: &str) -> Option<Mode> {
        self.ensure(file_id).current_mode()
    }

    pub fn read(&self, file_id: &str) -> String {
        let doc = self.ensure(file_id);
        match doc.current_mode() {
            Some(Mode::Text) => doc.read_text(),
            Some(Mode::Binary) => String::from_utf8_lossy(&doc.read_binary()).into_owned(),
            Some(Mode::Sheet) => doc.read_sheet(),
            _ => String::new(),
        }
    }

    pub fn read_buffer(&self, file_id: &str) -> Vec<u8> {
        let doc = self.ensure(file_id);
        match doc.current_mode() {
            Some(Mode::Text) => doc.read_text().into_bytes(),
            Some(Mode::Binary) => doc.read_binary(),
            Some(Mode::Sheet) => doc.read_sheet().into_bytes(),
            _ => Vec::new(),
        }
    }

    /// Writes `data`, returning the new content's byte length. A string
    /// written while the mode is already text mutates the existing
    /// `Y.Text` incrementally; anything else appends a new timeline entry.
    pub fn write(&self, file_id: &str, data: WriteData) -> CResult<u64> {
        let doc = self.ensure(file_id);
        match data {
            WriteData::Text(s) => match doc.current_mode() {
                Some(Mode::Text) => {
                    let Some(entry) = doc.last_entry_map() else {
                        doc.append_text_entry(s);
                        return Ok(s.len() as u64);
                    };
                    doc.substrate.with_transaction(Origin::Local, |txn| {
                        if let Some(yrs::Value::YText(text)) = entry.get(txn, "content") {
                            let len = text.len(txn);
                            text.remove_range(txn, 0, len);
                            text.insert(txn, 0, s);
                        }
                    });
                    Ok(s.len() as u64)
                }
                _ => {
                    doc.append_text_entry(s);
                    Ok(s.len() as u64)
                }
            },
            WriteData::Bytes(b) => {
                doc.append_binary_entry(b);
                Ok(b.len() as u64)
            }
            WriteData::Sheet(rows) => {
                doc.append_sheet_entry(rows);
                Ok(doc.read_sheet().len() as u64)
            }
        }
    }

    /// Appends to the current entry. Text-on-text appends incrementally;
    /// text-on-binary decodes, concatenates, and appends a new text entry;
    /// with no entry yet, returns `None` so the caller falls back to
    /// [`Self::write`].
    pub fn append(&self, file_id: &str, data: WriteData) -> CResult<Option<u64>> {
        let doc = self.ensure(file_id);
        let Some(mode) = doc.current_mode() else { return Ok(None) };
        match (mode, data) {
            (Mode::Text, WriteData::Text(s)) => {
                let Some(entry) = doc.last_entry_map() else { return Ok(None) };
                let new_len = doc.substrate.with_transaction(Origin::Local, |txn| {
                    if let Some(yrs::Value::YText(text)) = entry.get(txn, "content") {
                        let at = text.len(txn);
                        text.insert(txn, at, s);
                        text.len(txn) as u64
                    } else {
                        0
                    }
                });
                Ok(Some(new_len))
            }
            (Mode::Binary, WriteData::Text(s)) => {
                let mut existing = String::from_utf8_lossy(&doc.read_binary()).into_owned();
                existing.push_str(s);
                doc.append_text_entry(&existing);
                Ok(Some(existing.len() as u64))
            }
            (_, WriteData::Bytes(b)) => {
                doc.append_binary_entry(b);
                Ok(Some(b.len() as u64))
            }
            _ => Ok(None),
        }
    }
}

/// Decodes a binary timeline entry as JSON, used by callers that know the
/// binary payload encodes a structured value (e.g. sheet CSV export).
pub fn decode_binary_as_json(bytes: &[u8]) -> CResult<Value> {
    serde_json::from_slice(bytes).map_err(Error::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_text() {
        let store = ContentDocStore::new();
        store.write("f1", WriteData::Text("hello")).unwrap();
        assert_eq!(store.read("f1"), "hello");
        assert_eq!(store.current_mode("f1"), Some(Mode::Text));
    }

    #[test]
    fn text_append_mutates_in_place() {
        let store = ContentDocStore::new();
        store.write("f1", WriteData::Text("a")).unwrap();
        let new_len = store.append("f1", WriteData::Text("b")).unwrap();
        assert_eq!(new_len, Some(2));
        assert_eq!(store.read("f1"), "ab");
    }

    #[test]
    fn writing_bytes_then_string_switches_mode_by_appending() {
        let store = ContentDocStore::new();
        store.write("f1", WriteData::Bytes(b"\x00\x01")).unwrap();
        assert_eq!(store.current_mode("f1"), Some(Mode::Binary));
        store.write("f1", WriteData::Text("now text")).unwrap();
        assert_eq!(store.current_mode("f1"), Some(Mode::Text));
        assert_eq!(store.read("f1"), "now text");
    }

    #[test]
    fn append_with_no_entry_returns_none() {
        let store = ContentDocStore::new();
        assert_eq!(store.append("new-file", WriteData::Text("x")).unwrap(), None);
    }

    #[test]
    fn sheet_write_reads_back_as_csv() {
        let store = ContentDocStore::new();
        let rows = vec![vec!["a".to_string(), "1".to_string()], vec!["b, c".to_string(), "2".to_string()]];
        store.write("f1", WriteData::Sheet(&rows)).unwrap();
        assert_eq!(store.current_mode("f1"), Some(Mode::Sheet));
        assert_eq!(store.read("f1"), "a,1\n\"b, c\",2");
    }
}
