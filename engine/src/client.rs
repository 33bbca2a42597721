//! Workspace client builder (§4.6): progressive, chainable extension
//! installation over one CRDT document, with `whenReady` drained at the
//! end and `destroy` tearing down extensions in reverse installation
//! order.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CResult, Error};
use crate::kv_log::LwwKvLog;
use crate::kv_store::KvStore;
use crate::substrate::Substrate;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared KV keys -> opaque schema description (validated by callers
    /// of `KvStore`, not by the core).
    #[serde(default)]
    pub kv_keys: Vec<String>,
    /// Table name -> opaque schema description.
    #[serde(default)]
    pub tables: HashMap<String, Value>,
    #[serde(default)]
    pub dynamic: bool,
}

/// Context handed to an extension factory: the prior extensions' exports,
/// a way to open named tables/KV over the same document, and the raw
/// substrate for anything more specialized (persistence, sync).
pub struct ExtensionContext<'a> {
    pub id: &'a str,
    pub substrate: &'a Substrate,
    pub kv: &'a Arc<KvStore>,
    pub extensions: &'a HashMap<String, Value>,
    tables: &'a Mutex<HashMap<String, Arc<LwwKvLog>>>,
    declared_tables: &'a HashSet<String>,
}

impl<'a> ExtensionContext<'a> {
    /// Returns (creating if necessary) the LWW log backing a named table,
    /// so two extensions installed against the same key see the same
    /// underlying array. Errors with `UnknownTable` for a name the
    /// workspace definition never declared (programmer misuse, per §7).
    pub fn table_log(&self, name: &str) -> CResult<Arc<LwwKvLog>> {
        if !self.declared_tables.is_empty() && !self.declared_tables.contains(name) {
            return Err(Error::UnknownTable(name.to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        if let Some(log) = tables.get(name) {
            return Ok(log.clone());
        }
        let log = Arc::new(LwwKvLog::new(self.substrate.clone(), name)?);
        tables.insert(name.to_string(), log.clone());
        Ok(log)
    }
}

/// What an extension factory returns. All fields default to the no-op the
/// spec describes: empty exports, an already-resolved `whenReady`, a
/// no-op `destroy`.
pub struct ExtensionOutput {
    pub exports: Value,
    pub when_ready: Option<BoxFuture<CResult<()>>>,
    pub destroy: Option<Box<dyn FnOnce() -> BoxFuture<()> + Send>>,
}

impl Default for ExtensionOutput {
    fn default() -> Self {
        ExtensionOutput { exports: Value::Null, when_ready: None, destroy: None }
    }
}

struct InstalledExtension {
    key: String,
    exports: Value,
    when_ready: Option<BoxFuture<CResult<()>>>,
    destroy: Option<Box<dyn FnOnce() -> BoxFuture<()> + Send>>,
}

pub struct WorkspaceClient {
    pub id: String,
    pub substrate: Substrate,
    pub kv: Arc<KvStore>,
    tables: Mutex<HashMap<String, Arc<LwwKvLog>>>,
    /// Table names the workspace definition declared. Empty means no
    /// declared set was given, so `table_log` is unrestricted.
    declared_tables: HashSet<String>,
    extensions: Mutex<Vec<InstalledExtension>>,
    destroyed: Mutex<bool>,
}

impl WorkspaceClient {
    pub fn new(definition: &WorkspaceDefinition) -> CResult<Self> {
        let substrate = Substrate::new(definition.id.clone());
        let kv_log = Arc::new(LwwKvLog::new(substrate.clone(), "__kv__")?);
        Ok(WorkspaceClient {
            id: definition.id.clone(),
            substrate,
            kv: Arc::new(KvStore::new(kv_log, &definition.kv_keys)),
            tables: Mutex::new(HashMap::new()),
            declared_tables: definition.tables.keys().cloned().collect(),
            extensions: Mutex::new(Vec::new()),
            destroyed: Mutex::new(false),
        })
    }

    /// Opens (creating on first use) a named table's backing log, shared
    /// with any extension that requested the same name via
    /// `ExtensionContext::table_log`. Errors with `UnknownTable` for a name
    /// the workspace definition never declared (programmer misuse, §7).
    pub fn table_log(&self, name: &str) -> CResult<Arc<LwwKvLog>> {
        if !self.declared_tables.is_empty() && !self.declared_tables.contains(name) {
            return Err(Error::UnknownTable(name.to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        if let Some(log) = tables.get(name) {
            return Ok(log.clone());
        }
        let log = Arc::new(LwwKvLog::new(self.substrate.clone(), name)?);
        tables.insert(name.to_string(), log.clone());
        Ok(log)
    }

    /// Installs an extension under `key`, running its factory
    /// synchronously. `extensions[key]` is populated from the returned
    /// exports immediately; `whenReady`/`destroy` are queued for later.
    pub fn with_extension(
        &self,
        key: impl Into<String>,
        factory: impl FnOnce(&ExtensionContext) -> ExtensionOutput,
    ) -> &Self {
        let key = key.into();
        let exports_snapshot: HashMap<String, Value> = self
            .extensions
            .lock()
            .unwrap()
            .iter()
            .map(|e| (e.key.clone(), e.exports.clone()))
            .collect();
        let ctx = ExtensionContext {
            id: &self.id,
            substrate: &self.substrate,
            kv: &self.kv,
            extensions: &exports_snapshot,
            tables: &self.tables,
            declared_tables: &self.declared_tables,
        };
        let output = factory(&ctx);
        self.extensions.lock().unwrap().push(InstalledExtension {
            key,
            exports: output.exports,
            when_ready: output.when_ready,
            destroy: output.destroy,
        });
        self
    }

    pub fn extension_exports(&self, key: &str) -> Option<Value> {
        self.extensions.lock().unwrap().iter().find(|e| e.key == key).map(|e| e.exports.clone())
    }

    /// Resolves after every installed extension's `whenReady` has
    /// resolved. Extensions with no `whenReady` are already considered
    /// ready.
    pub async fn when_ready(&self) -> CResult<()> {
        let futures: Vec<_> = {
            let mut extensions = self.extensions.lock().unwrap();
            extensions.iter_mut().filter_map(|e| e.when_ready.take()).collect()
        };
        for fut in futures {
            fut.await?;
        }
        Ok(())
    }

    /// Tears extensions down in reverse installation order, then disposes
    /// the document. Safe to call while `when_ready` is still pending.
    pub async fn destroy(&self) {
        let mut destroyed = self.destroyed.lock().unwrap();
        if *destroyed {
            return;
        }
        *destroyed = true;
        drop(destroyed);

        let destructors: Vec<_> = {
            let mut extensions = self.extensions.lock().unwrap();
            extensions.iter_mut().rev().filter_map(|e| e.destroy.take()).collect()
        };
        for destroy in destructors {
            destroy().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def() -> WorkspaceDefinition {
        WorkspaceDefinition { id: "w1".into(), name: None, kv_keys: vec![], tables: HashMap::new(), dynamic: false }
    }

    #[tokio::test]
    async fn extensions_install_in_order_and_see_prior_exports() {
        let client = WorkspaceClient::new(&def()).unwrap();
        client.with_extension("a", |_ctx| ExtensionOutput { exports: Value::from("a-exports"), ..Default::default() });
        client.with_extension("b", |ctx| {
            let prior = ctx.extensions.get("a").cloned();
            ExtensionOutput { exports: prior.unwrap_or(Value::Null), ..Default::default() }
        });
        assert_eq!(client.extension_exports("b"), Some(Value::from("a-exports")));
    }

    #[tokio::test]
    async fn when_ready_awaits_every_extension() {
        let client = WorkspaceClient::new(&def()).unwrap();
        client.with_extension("slow", |_ctx| ExtensionOutput {
            when_ready: Some(Box::pin(async { Ok(()) })),
            ..Default::default()
        });
        client.when_ready().await.unwrap();
    }

    #[tokio::test]
    async fn destroy_runs_in_reverse_order() {
        let client = WorkspaceClient::new(&def()).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        for key in ["first", "second"] {
            let order = order.clone();
            let key = key.to_string();
            client.with_extension(key.clone(), move |_ctx| ExtensionOutput {
                destroy: Some(Box::new(move || {
                    Box::pin(async move { order.lock().unwrap().push(key) })
                })),
                ..Default::default()
            });
        }
        client.destroy().await;
        assert_eq!(*order.lock().unwrap(), vec!["second".to_string(), "first".to_string()]);
    }

    #[test]
    fn undeclared_table_is_rejected_when_tables_are_declared() {
        let mut def = def();
        def.tables.insert("notes".to_string(), Value::Null);
        let client = WorkspaceClient::new(&def).unwrap();
        assert!(client.table_log("notes").is_ok());
        assert!(matches!(client.table_log("bogus"), Err(Error::UnknownTable(ref n)) if n == "bogus"));
    }

    #[test]
    fn any_table_is_accepted_when_no_tables_are_declared() {
        let client = WorkspaceClient::new(&def()).unwrap();
        assert!(client.table_log("anything").is_ok());
    }
}
