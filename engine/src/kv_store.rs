//! Workspace-wide typed key/value store (§4.3): same LWW contract as
//! [`crate::table::Table`] but keyed by the fixed set of names a workspace
//! definition declares, with no row id / soft-delete semantics.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CResult, Error};
use crate::kv_log::{Handler, LwwKvLog};

pub struct KvStore {
    log: Arc<LwwKvLog>,
    /// Declared key names from the workspace definition. Empty means no
    /// declared set was given, so no restriction is enforced.
    declared_keys: HashSet<String>,
}

impl KvStore {
    /// `declared_keys` should come from the owning workspace definition's
    /// `kv_keys`; an empty set disables the declared-key check entirely.
    pub fn new(log: Arc<LwwKvLog>, declared_keys: &[String]) -> Self {
        KvStore { log, declared_keys: declared_keys.iter().cloned().collect() }
    }

    fn check_declared(&self, key: &str) -> CResult<()> {
        if self.declared_keys.is_empty() || self.declared_keys.contains(key) {
            Ok(())
        } else {
            Err(Error::UnknownKvKey(key.to_string()))
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.log.has(key)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CResult<Option<T>> {
        self.check_declared(key)?;
        match self.log.get(key) {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> CResult<()> {
        self.check_declared(key)?;
        self.log.set(key, serde_json::to_value(value)?)
    }

    pub fn delete(&self, key: &str) -> CResult<()> {
        self.check_declared(key)?;
        self.log.delete(key)
    }

    pub fn entries(&self) -> Vec<(String, serde_json::Value)> {
        self.log.entries()
    }

    /// Wraps a series of `set`/`delete` calls in a single substrate
    /// transaction so observers coalesce into one notification.
    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> CResult<R>) -> CResult<R> {
        self.log.batch(|_| f(self))
    }

    pub fn observe(&self, handler: Handler) {
        self.log.observe(handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::substrate::Substrate;

    fn store() -> KvStore {
        let sub = Substrate::new("test-kv");
        let log = Arc::new(LwwKvLog::new(sub, "kv").unwrap());
        KvStore::new(log, &["theme".to_string(), "a".to_string(), "b".to_string()])
    }

    #[test]
    fn set_get_delete_round_trip() {
        let kv = store();
        kv.set("theme", &"dark").unwrap();
        assert_eq!(kv.get::<String>("theme").unwrap(), Some("dark".to_string()));
        kv.delete("theme").unwrap();
        assert_eq!(kv.get::<String>("theme").unwrap(), None);
    }

    #[test]
    fn batch_coalesces_into_one_set_of_entries() {
        let kv = store();
        kv.batch(|kv| {
            kv.set("a", &1)?;
            kv.set("b", &2)?;
            Ok(())
        })
        .unwrap();
        assert_eq!(kv.entries().len(), 2);
    }

    #[test]
    fn undeclared_key_is_rejected_when_keys_are_declared() {
        let kv = store();
        assert!(matches!(kv.set("nope", &1).unwrap_err(), crate::error::Error::UnknownKvKey(ref k) if k == "nope"));
    }

    #[test]
    fn any_key_is_accepted_when_no_keys_are_declared() {
        let sub = Substrate::new("test-kv-unrestricted");
        let log = Arc::new(LwwKvLog::new(sub, "kv").unwrap());
        let kv = KvStore::new(log, &[]);
        kv.set("whatever", &1).unwrap();
        assert_eq!(kv.get::<i32>("whatever").unwrap(), Some(1));
    }
}
