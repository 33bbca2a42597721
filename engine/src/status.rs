//! Diagnostics struct shared by tables/KV/filesystem stores, mirroring the
//! teacher's `storage::Status` introspection shape generalized from one
//! storage engine to one LWW log.

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Status {
    pub live_keys: usize,
    pub tombstones: usize,
    pub total_entries: usize,
}

impl Status {
    pub fn from_log(log: &crate::kv_log::LwwKvLog) -> Self {
        let live = log.entries().len();
        let total = log.raw_entry_count();
        Status { live_keys: live, tombstones: total.saturating_sub(live), total_entries: total }
    }
}
