//! `workspace-cli`: a small demonstration/integration-test harness driving
//! the `engine` crate. Not a shipped product surface — the CLI/command
//! language, config file, and wire formats are adapters outside this
//! repository's core scope.
//!
//! ## Getting started
//!
//! ```doc
//! ❯ ./workspace-cli
//!
//! Welcome to workspace-cli.
//!
//! workspace > kv set theme dark
//! OK
//!
//! workspace > kv get theme
//! dark
//!
//! workspace > fs mkdir /notes
//! OK
//!
//! workspace > fs write /notes/a.txt hello world
//! OK
//!
//! workspace > fs read /notes/a.txt
//! hello world
//! ```

pub mod config;
pub mod rusty;
pub mod session;
pub mod trace;
