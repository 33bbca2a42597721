use std::io::{stdin, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::info;

use workspace_cli::config::ConfigLoad;
use workspace_cli::session::Session;
use workspace_cli::trace;

#[derive(Debug, Parser)]
#[command(version, author, about = "Demonstration CLI driving the workspace data engine")]
pub struct Args {
    #[clap(short, long, help = "debug mode")]
    debug: bool,

    #[clap(short = 'c', long = "config", help = "Configuration file path", default_value = "config/workspace-cli.yaml")]
    config: String,

    #[clap(short = 'l', long, default_value = "info")]
    log_level: String,

    #[clap(short = 'n', long, help = "Force non-interactive mode", default_value = "false")]
    non_interactive: bool,

    #[clap(long, require_equals = true, help = "Single command to execute, then exit")]
    query: Option<String>,
}

#[tokio::main]
pub async fn main() -> Result<()> {
    eprintln!();
    eprintln!("██  ██  █        █");
    eprintln!("██ ██   ██      ██");
    eprintln!("███      ██    ██");
    eprintln!("██ ██     ██  ██");
    eprintln!("██  ██     ████  workspace data engine CLI");
    eprintln!();

    let args = Args::parse();
    if args.debug {
        println!("{args:?}");
    }

    let log_dir = format!("{}/.workspace-cli", std::env::var("HOME").unwrap_or_else(|_| ".".to_string()));
    let _guards = trace::init_logging(&log_dir, &args.log_level).await?;
    info!("workspace-cli start args: {:?}", &args);

    let mut cfg: ConfigLoad = confy::load_path(&args.config).unwrap_or_default();
    if args.debug {
        println!("{:?}", &cfg);
        eprintln!();
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("received Ctrl+C!");
            r.store(false, Ordering::SeqCst);
        }
    });

    let is_terminal = stdin().is_terminal();
    let is_repl = is_terminal && !args.non_interactive && args.query.is_none();
    if is_repl {
        cfg.terminal_update();
    }

    let mut session = Session::try_new(cfg, is_repl, running.clone()).await?;
    info!("workspace-cli starting, is_repl={is_repl}");

    if is_repl {
        session.handle_repl().await;
        return Ok(());
    }

    match args.query {
        None => session.handle_reader(stdin().lock()).await?,
        Some(query) => session.handle_reader(std::io::Cursor::new(query)).await?,
    }

    Ok(())
}
