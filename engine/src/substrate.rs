//! Thin wrapper around the CRDT substrate (`yrs`, the Rust port of Yjs).
//!
//! Every workspace, and every filesystem content doc, owns exactly one
//! [`Substrate`]. Higher layers (LWW KV log, table helper, filesystem path
//! index) never touch `yrs` directly outside this module; they go through
//! the small surface below, which mirrors the shape a production CRDT
//! filesystem wraps around `yrs::Doc` (shared maps/arrays, origin-tagged
//! transactions, update encode/apply, observers).

use std::sync::Arc;
use yrs::{
    Array, ArrayRef, Doc, Map, MapRef, Observable, ReadTxn, StateVector, Transact, TransactionMut,
    Update,
};

use crate::error::{CResult, Error};

/// Tag attached to every transaction so observers can tell local writes
/// (`Origin::Local`) apart from updates merged in from a peer or from
/// replaying persisted history (`Origin::Remote`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

impl Origin {
    fn as_bytes(self) -> &'static [u8] {
        match self {
            Origin::Local => b"local",
            Origin::Remote => b"remote",
        }
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        if bytes == b"local" {
            Origin::Local
        } else {
            Origin::Remote
        }
    }
}

/// One CRDT document plus the conveniences the rest of the engine needs.
///
/// Cheaply clonable: `yrs::Doc` is itself reference-counted, so cloning a
/// `Substrate` hands out another handle onto the same document, the way
/// the teacher's `Arc<Mutex<E>>`-wrapped engines are shared across
/// `MVCC`'s API surface.
#[derive(Clone)]
pub struct Substrate {
    doc: Doc,
}

impl Substrate {
    pub fn new(guid: impl Into<Arc<str>>) -> Self {
        let doc = Doc::with_client_id(rand::random());
        doc.define_guid(guid);
        Substrate { doc }
    }

    pub fn load(guid: impl Into<Arc<str>>, snapshot: &[u8]) -> CResult<Self> {
        let sub = Self::new(guid);
        sub.apply_update(snapshot, Origin::Remote)?;
        Ok(sub)
    }

    pub fn doc(&self) -> &Doc {
        &self.doc
    }

    /// Runs `f` inside a single transaction tagged with `origin`. All
    /// mutations performed by `f` are committed atomically and observers
    /// fire once with the coalesced change set.
    pub fn with_transaction<T>(
        &self,
        origin: Origin,
        f: impl FnOnce(&mut TransactionMut) -> T,
    ) -> T {
        let mut txn = self.doc.transact_mut_with(origin.as_bytes());
        let result = f(&mut txn);
        drop(txn);
        result
    }

    pub fn array(&self, name: &str) -> ArrayRef {
        self.doc.get_or_insert_array(name)
    }

    pub fn map(&self, name: &str) -> MapRef {
        self.doc.get_or_insert_map(name)
    }

    pub fn encode_state_vector(&self) -> Vec<u8> {
        self.doc.transact().state_vector().encode_v1()
    }

    pub fn encode_state_as_update(&self) -> Vec<u8> {
        self.doc
            .transact()
            .encode_state_as_update_v1(&StateVector::default())
    }

    pub fn encode_diff(&self, remote_state_vector: &[u8]) -> CResult<Vec<u8>> {
        let sv = StateVector::decode_v1(remote_state_vector)
            .map_err(|e| Error::Parse(format!("state vector: {e}")))?;
        Ok(self.doc.transact().encode_state_as_update_v1(&sv))
    }

    pub fn apply_update(&self, update: &[u8], origin: Origin) -> CResult<()> {
        let update = Update::decode_v1(update).map_err(|e| Error::Parse(format!("update: {e}")))?;
        let mut txn = self.doc.transact_mut_with(origin.as_bytes());
        txn.apply_update(update).map_err(|e| Error::Internal(e.to_string()))
    }

    /// True when the transaction currently being observed originated
    /// locally (used by observers to skip re-emitting events for writes
    /// the caller already knows about).
    pub fn is_local_origin(txn_origin: Option<&[u8]>) -> bool {
        txn_origin.map(Origin::from_bytes) == Some(Origin::Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_update_between_two_docs() {
        let a = Substrate::new("doc-a");
        a.with_transaction(Origin::Local, |txn| {
            let arr = a.array("items");
            arr.push_back(txn, "hello");
        });

        let b = Substrate::new("doc-b");
        let update = a.encode_diff(&b.encode_state_vector()).unwrap();
        b.apply_update(&update, Origin::Remote).unwrap();

        let arr = b.array("items");
        let txn = b.doc().transact();
        assert_eq!(arr.len(&txn), 1);
    }
}
