//! ---
//! psd_section: "06-cli"
//! psd_subsection: "binary"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Control CLI for administrators of the scenario data store."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use psd_common::AccessConfig;
use psd_data_access::{DataAccess, LocalDataAccess, ScriptedConfirm, SshDataAccess};
use tracing::{debug, info_span};

mod commands;

const CONFIG_CANDIDATES: &[&str] = &["psd.toml", "configs/psd.toml"];

#[derive(Debug, Parser)]
#[command(author, version, about = "Scenario data store control utility", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct GlobalOptions {
    /// Configuration file; `PSD_CONFIG` and `psd.toml` are tried otherwise.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Work against the local mirror only, without connecting to the server.
    #[arg(long, global = true)]
    local: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Read an artifact and print a summary of its contents.
    Read {
        /// Path relative to the data root.
        path: String,
    },
    /// Print the checksum of a file.
    Checksum {
        /// Path relative to the data root.
        path: String,
    },
    /// Replace a file on the server with a file from the local mirror.
    Push {
        /// File in the local mirror.
        file_name: String,
        /// Destination on the server.
        rename: String,
        /// Checksum of the destination taken before the local edit, as
        /// printed by `psdctl checksum`.
        #[arg(long)]
        checksum: String,
    },
    /// Delete every file matching a pattern.
    Remove {
        /// Glob pattern relative to the data root.
        pattern: String,
        /// Skip the confirmation prompt.
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// List the available versions of a profile.
    Versions {
        /// Grid model, e.g. `usa_tamu`.
        grid_model: String,
        /// Profile kind, e.g. `demand`.
        kind: String,
    },
    /// Copy listings, inputs and outputs of scenarios to another directory.
    Clone {
        /// Destination data directory.
        #[arg(long, value_name = "DIR")]
        target: PathBuf,
        /// Scenario ids to copy.
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,
    },
    /// Print the metadata and infeasibilities of a scenario.
    Info {
        /// Scenario id.
        id: String,
        /// Print a JSON summary instead of text.
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Read { .. } => "read",
            Commands::Checksum { .. } => "checksum",
            Commands::Push { .. } => "push",
            Commands::Remove { .. } => "remove",
            Commands::Versions { .. } => "versions",
            Commands::Clone { .. } => "clone",
            Commands::Info { .. } => "info",
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.global)?;
    let command = cli.command.name();
    psd_common::init_tracing(&format!("psdctl-{command}"), &config.logging)?;
    let _span = info_span!("psdctl", command, local = cli.global.local).entered();

    match cli.command {
        Commands::Read { path } => commands::read(open(&cli.global, &config, false)?.as_ref(), &path),
        Commands::Checksum { path } => {
            commands::checksum(open(&cli.global, &config, false)?.as_ref(), &path)
        }
        Commands::Push {
            file_name,
            rename,
            checksum,
        } => commands::push(
            open(&cli.global, &config, false)?.as_ref(),
            &file_name,
            &rename,
            &checksum,
        ),
        Commands::Remove { pattern, yes } => {
            commands::remove(open(&cli.global, &config, yes)?.as_ref(), &pattern)
        }
        Commands::Versions { grid_model, kind } => commands::versions(
            open(&cli.global, &config, false)?.as_ref(),
            &grid_model,
            &kind,
        ),
        Commands::Clone { target, ids } => commands::clone(&config, &target, &ids),
        Commands::Info { id, json } => commands::info(
            open(&cli.global, &config, false)?.as_ref(),
            &config,
            &id,
            json,
        ),
    }
}

fn load_config(options: &GlobalOptions) -> Result<AccessConfig> {
    if let Some(path) = &options.config {
        return AccessConfig::load(std::slice::from_ref(path))
            .with_context(|| format!("unable to load {}", path.display()));
    }
    let env_set = std::env::var(AccessConfig::ENV_CONFIG_PATH).is_ok_and(|v| !v.trim().is_empty());
    if env_set || CONFIG_CANDIDATES.iter().any(|c| PathBuf::from(c).exists()) {
        return AccessConfig::load(CONFIG_CANDIDATES);
    }
    debug!("no configuration file found, using defaults");
    Ok(AccessConfig::default())
}

fn open(options: &GlobalOptions, config: &AccessConfig, assume_yes: bool) -> Result<Box<dyn DataAccess>> {
    if options.local {
        let mut access = LocalDataAccess::open(config)?;
        if assume_yes {
            access = access.with_confirm(Box::new(ScriptedConfirm::new(["y"])));
        }
        return Ok(Box::new(access));
    }
    let mut access = SshDataAccess::connect(config)
        .with_context(|| format!("unable to reach {}", config.server.address))?;
    if assume_yes {
        access = access.with_confirm(Box::new(ScriptedConfirm::new(["y"])));
    }
    Ok(Box::new(access))
}
