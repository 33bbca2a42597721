//! Ephemeral presence (§4.7): wraps the substrate's awareness channel.
//! Awareness state is never persisted and is schema-validated on read;
//! peers whose state fails validation are simply omitted rather than
//! surfaced as errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceChange {
    Added,
    Updated,
    Removed,
}

pub type AwarenessHandler = Arc<dyn Fn(&[(u64, PresenceChange)]) + Send + Sync>;

/// In-process awareness map keyed by client id. A real multi-peer build
/// would back this with `yrs`'s awareness protocol; locally it behaves
/// identically since only the local client ever writes its own entry and
/// merged peer states arrive as if they were local inserts.
pub struct Awareness {
    local_client_id: u64,
    states: Mutex<HashMap<u64, Value>>,
    handlers: Mutex<Vec<AwarenessHandler>>,
}

impl Awareness {
    pub fn new(local_client_id: u64) -> Self {
        Awareness { local_client_id, states: Mutex::new(HashMap::new()), handlers: Mutex::new(Vec::new()) }
    }

    /// Replaces the full local state; no field-level merge.
    pub fn set_local<T: Serialize>(&self, state: &T) -> crate::error::CResult<()> {
        let value = serde_json::to_value(state)?;
        let existed = self.states.lock().unwrap().insert(self.local_client_id, value).is_some();
        self.notify(&[(self.local_client_id, if existed { PresenceChange::Updated } else { PresenceChange::Added })]);
        Ok(())
    }

    pub fn clear_local(&self) {
        if self.states.lock().unwrap().remove(&self.local_client_id).is_some() {
            self.notify(&[(self.local_client_id, PresenceChange::Removed)]);
        }
    }

    pub fn get_local<T: DeserializeOwned>(&self) -> Option<T> {
        self.states
            .lock()
            .unwrap()
            .get(&self.local_client_id)
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    /// All peer states that validate against `T`; invalid states are
    /// omitted rather than erroring.
    pub fn get_all<T: DeserializeOwned>(&self) -> HashMap<u64, T> {
        self.states
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(id, v)| serde_json::from_value(v.clone()).ok().map(|parsed| (*id, parsed)))
            .collect()
    }

    /// Merges in a remote peer's state (as if received over the sync
    /// transport, which is out of scope for this crate).
    pub fn apply_remote(&self, client_id: u64, state: Option<Value>) {
        let mut states = self.states.lock().unwrap();
        let change = match (states.contains_key(&client_id), &state) {
            (false, Some(_)) => Some(PresenceChange::Added),
            (true, Some(_)) => Some(PresenceChange::Updated),
            (true, None) => Some(PresenceChange::Removed),
            (false, None) => None,
        };
        match state {
            Some(v) => {
                states.insert(client_id, v);
            }
            None => {
                states.remove(&client_id);
            }
        }
        drop(states);
        if let Some(change) = change {
            self.notify(&[(client_id, change)]);
        }
    }

    pub fn observe(&self, handler: AwarenessHandler) {
        self.handlers.lock().unwrap().push(handler);
    }

    fn notify(&self, changes: &[(u64, PresenceChange)]) {
        for h in self.handlers.lock().unwrap().iter() {
            h(changes);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Presence {
        cursor: u32,
    }

    #[test]
    fn set_local_then_get_local() {
        let a = Awareness::new(1);
        a.set_local(&Presence { cursor: 5 }).unwrap();
        assert_eq!(a.get_local::<Presence>(), Some(Presence { cursor: 5 }));
    }

    #[test]
    fn invalid_peer_state_is_omitted_not_errored() {
        let a = Awareness::new(1);
        a.apply_remote(2, Some(serde_json::json!({"not_cursor": true})));
        assert!(a.get_all::<Presence>().is_empty());
    }

    #[test]
    fn removing_peer_fires_removed() {
        let a = Awareness::new(1);
        let events = Arc::new(Mutex::new(Vec::new()));
        let events2 = events.clone();
        a.observe(Arc::new(move |changes| events2.lock().unwrap().extend_from_slice(changes)));
        a.apply_remote(2, Some(serde_json::json!({"cursor": 1})));
        a.apply_remote(2, None);
        assert_eq!(*events.lock().unwrap(), vec![(2, PresenceChange::Added), (2, PresenceChange::Removed)]);
    }
}
