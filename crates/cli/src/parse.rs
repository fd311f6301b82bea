//! ArgMatches → CliAction conversion.

use anyhow::{anyhow, Context};
use clap::ArgMatches;

use replica_admin_core::{ReplicaId, UploadState};

/// The command the user asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliAction {
    /// List all filenames
    Files,
    /// Filenames at `state` on `replica`
    State {
        replica: ReplicaId,
        state: UploadState,
    },
    /// One entry in detail
    Show { filename: String },
    /// Consistency report
    Report,
    /// Rewrite as current format
    Upgrade,
}

impl CliAction {
    /// Whether the action writes to the admin directory
    pub fn writes(&self) -> bool {
        matches!(self, CliAction::Upgrade)
    }
}

/// Translate parsed arguments into an action.
pub fn matches_to_action(matches: &ArgMatches) -> anyhow::Result<CliAction> {
    match matches.subcommand() {
        Some(("files", _)) => Ok(CliAction::Files),
        Some(("state", sub)) => {
            let replica = required(sub, "replica")?;
            let state = required(sub, "upload-state")?;
            Ok(CliAction::State {
                replica: ReplicaId::new(replica).context("invalid replica id")?,
                state: state
                    .parse::<UploadState>()
                    .with_context(|| format!("unknown upload state '{}'", state))?,
            })
        }
        Some(("show", sub)) => Ok(CliAction::Show {
            filename: required(sub, "filename")?.to_string(),
        }),
        Some(("report", _)) => Ok(CliAction::Report),
        Some(("upgrade", _)) => Ok(CliAction::Upgrade),
        Some((other, _)) => Err(anyhow!("unknown command '{}'", other)),
        None => Err(anyhow!("no command given")),
    }
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> anyhow::Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument <{}>", name))
}
