//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("replica-admin")
        .about("Inspect and maintain replica admin data")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("dir")
                .long("dir")
                .help("Admin directory holding admin.toml and the admin data file (default: .)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("JSON output mode")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(Command::new("files").about("List every registered filename"))
        .subcommand(
            Command::new("state")
                .about("List filenames in a given upload state on a replica")
                .arg(Arg::new("replica").required(true).help("Replica id, e.g. BA1"))
                .arg(
                    Arg::new("upload-state")
                        .required(true)
                        .help("UPLOAD_STARTED, DATA_UPLOADED, UPLOAD_COMPLETED or UPLOAD_FAILED"),
                ),
        )
        .subcommand(
            Command::new("show")
                .about("Show checksum, general state and replica records of a file")
                .arg(Arg::new("filename").required(true)),
        )
        .subcommand(Command::new("report").about("Per-replica state counts and incomplete files"))
        .subcommand(
            Command::new("upgrade")
                .about("Rewrite the admin data file in the current format, compacting it"),
        )
}
