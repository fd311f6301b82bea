//! replica-admin: command-line inspector for replica admin data.
//!
//! `replica-admin [--dir <admin_dir>] [--json] <command>`
//!
//! Every command opens the admin directory read-only, except `upgrade`,
//! which takes the writer lock and rewrites the file in the current format.

mod commands;
mod format;
mod parse;

use std::process;

use anyhow::Context;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use replica_admin_engine::{AdminStore, AdminStoreBuilder};

use commands::build_cli;
use format::{
    format_entry, format_error, format_filenames, format_report, format_upgrade, OutputMode,
};
use parse::{matches_to_action, CliAction};

fn main() {
    init_tracing();

    let matches = build_cli().get_matches();
    let mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    let dir = matches
        .get_one::<String>("dir")
        .map(|s| s.as_str())
        .unwrap_or(".")
        .to_string();

    let result = matches_to_action(&matches).and_then(|action| run(&dir, action, mode));
    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn open_store(dir: &str, action: &CliAction) -> anyhow::Result<AdminStore> {
    let builder = AdminStoreBuilder::new().path(dir);
    let builder = if action.writes() {
        builder.read_write()
    } else {
        builder.read_only()
    };
    builder
        .open()
        .with_context(|| format!("failed to open admin directory '{}'", dir))
}

fn run(dir: &str, action: CliAction, mode: OutputMode) -> anyhow::Result<String> {
    debug!(target: "replica_admin::cli", dir, ?action, "Running command");
    let store = open_store(dir, &action)?;
    let output = match action {
        CliAction::Files => format_filenames(&store.all_filenames(), mode),
        CliAction::State { replica, state } => {
            format_filenames(&store.filenames_with_state(replica.as_str(), state), mode)
        }
        CliAction::Show { filename } => format_entry(&store.entry(&filename)?, mode),
        CliAction::Report => format_report(&store.report(), mode),
        CliAction::Upgrade => {
            let from = store.last_load_stats().map(|s| s.version);
            store.checkpoint().context("failed to rewrite admin data")?;
            let path = store
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            format_upgrade(&path, from, store.len(), mode)
        }
    };
    store.close()?;
    Ok(output)
}
