//! `engine` is a local-first, CRDT-backed workspace data engine: an
//! LWW key/value log, schema-validated tables, a dynamic (schema-as-data)
//! workspace, and a virtual POSIX-like filesystem, all realized over a
//! `yrs` CRDT document so that two peers replaying the same updates
//! converge on the same state.
//!
//! ## Getting started
//!
//! ```rust
//! use engine::client::{WorkspaceClient, WorkspaceDefinition};
//!
//! # fn run() -> engine::error::CResult<()> {
//! let definition = WorkspaceDefinition {
//!     id: "demo".to_string(),
//!     name: Some("Demo workspace".to_string()),
//!     kv_keys: vec!["theme".to_string()],
//!     tables: Default::default(),
//!     dynamic: false,
//! };
//! let client = WorkspaceClient::new(&definition)?;
//! client.kv.set("theme", &"dark")?;
//! assert_eq!(client.kv.get::<String>("theme")?, Some("dark".to_string()));
//! # Ok(())
//! # }
//! # run().unwrap();
//! ```

pub mod awareness;
pub mod client;
pub mod clock;
pub mod dynamic;
pub mod error;
pub mod fs;
pub mod kv_log;
pub mod kv_store;
pub mod platform;
pub mod registry;
pub mod status;
pub mod substrate;
pub mod table;

#[cfg(test)]
mod test {
    use crate::client::{WorkspaceClient, WorkspaceDefinition};
    use crate::error::CResult;

    #[test]
    fn workspace_kv_round_trips() -> CResult<()> {
        let definition = WorkspaceDefinition {
            id: "demo".to_string(),
            name: None,
            kv_keys: vec!["theme".to_string()],
            tables: Default::default(),
            dynamic: false,
        };
        let client = WorkspaceClient::new(&definition)?;
        client.kv.set("theme", &"dark")?;
        assert_eq!(client.kv.get::<String>("theme")?, Some("dark".to_string()));
        Ok(())
    }
}
