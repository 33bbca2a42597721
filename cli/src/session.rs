use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};
use rustyline::config::Builder;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};
use tokio::time::Instant;

use engine::client::{WorkspaceClient, WorkspaceDefinition};
use engine::fs::FileSystem;
use engine::platform::StdPlatform;

use crate::config::ConfigLoad;
use crate::rusty::CliHelper;

const DEFAULT_PROMPT: &str = "workspace";

const KEYWORDS: &[&str] = &["kv", "set", "get", "del", "fs", "mkdir", "write", "read", "ls", "exit", "quit"];

pub struct Session {
    is_repl: bool,
    settings: ConfigLoad,
    running: Arc<AtomicBool>,
    client: WorkspaceClient,
    fs: FileSystem,
    keywords: Arc<Vec<String>>,
}

impl Session {
    pub async fn try_new(settings: ConfigLoad, is_repl: bool, running: Arc<AtomicBool>) -> Result<Self> {
        if is_repl {
            println!("Welcome to workspace-cli.");
            println!();
        }

        let mut tables = std::collections::HashMap::new();
        tables.insert("files".to_string(), serde_json::Value::Null);
        let definition = WorkspaceDefinition {
            id: "local".to_string(),
            name: Some("local workspace".to_string()),
            kv_keys: Vec::new(),
            tables,
            dynamic: true,
        };
        let client = WorkspaceClient::new(&definition)?;
        let files_log = client.table_log("files")?;
        let fs = FileSystem::new(files_log, Arc::new(StdPlatform));

        Ok(Self {
            is_repl,
            settings,
            running,
            client,
            fs,
            keywords: Arc::new(KEYWORDS.iter().map(|s| s.to_string()).collect()),
        })
    }

    fn prompt(&self) -> String {
        match &self.settings.prompt {
            Some(p) => format!("{} > ", p.trim_end()),
            None => format!("{DEFAULT_PROMPT} > "),
        }
    }

    pub async fn handle_repl(&mut self) {
        let config = Builder::new().completion_prompt_limit(5).completion_type(CompletionType::Circular).build();
        let mut rl = Editor::<CliHelper, DefaultHistory>::with_config(config).unwrap();
        rl.set_helper(Some(CliHelper::with_keywords(self.keywords.clone())));
        rl.load_history(&history_path()).ok();

        loop {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match rl.readline(&self.prompt()) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);
                    if line == "exit" || line == "quit" {
                        break;
                    }
                    match self.execute(line).await {
                        Ok(output) => {
                            if !output.is_empty() {
                                println!("{output}");
                            }
                        }
                        Err(e) => eprintln!("error: {e}"),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                }
                Err(ReadlineError::Eof) => break,
                Err(e) => {
                    eprintln!("io err: {e}");
                    break;
                }
            }
        }

        println!("Bye~");
        let _ = rl.save_history(&history_path());
    }

    pub async fn handle_reader<R: BufRead>(&mut self, r: R) -> Result<()> {
        let start = Instant::now();
        for line in r.lines() {
            let line = line.map_err(|e| anyhow!("read lines err: {e}"))?;
            let line = line.trim();
            if line.is_empty() || line == "exit" || line == "quit" {
                continue;
            }
            let output = self.execute(line).await?;
            if !output.is_empty() {
                println!("{output}");
            }
        }

        if self.settings.show_stats.unwrap_or(false) {
            println!("{:.3}", start.elapsed().as_secs_f64());
        }
        Ok(())
    }

    /// Tiny command language exercising the engine crate directly:
    /// `kv set/get/del <key> [value]`, `fs mkdir/write/read/ls <path> [data]`.
    async fn execute(&mut self, line: &str) -> Result<String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            ["kv", "set", key, value] => {
                self.client.kv.set(key, &value.to_string())?;
                Ok("OK".to_string())
            }
            ["kv", "get", key] => Ok(self.client.kv.get::<String>(key)?.unwrap_or_else(|| "N/A".to_string())),
            ["kv", "del", key] => {
                self.client.kv.delete(key)?;
                Ok("OK".to_string())
            }
            ["fs", "mkdir", path] => {
                self.fs.mkdir(path, true)?;
                Ok("OK".to_string())
            }
            ["fs", "write", path, rest @ ..] => {
                self.fs.write_file(path, &rest.join(" "))?;
                Ok("OK".to_string())
            }
            ["fs", "read", path] => Ok(self.fs.read_file(path)?),
            ["fs", "ls", path] => Ok(self.fs.readdir(path)?.join("\n")),
            _ => Err(anyhow!("unrecognized command: {line}")),
        }
    }
}

fn history_path() -> String {
    format!("{}/.workspace_cli_history", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
}
