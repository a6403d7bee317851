//! # rolesync CLI Module
//!
//! This module implements the CLI interface for rolesync.
//!
//! ## Available Commands
//!
//! - `validate` - Check that a role document parses
//! - `install` - Install or update the roles of a document
//! - `uninstall` - Remove the roles of a document
//! - `set-users` - Make the directory hold exactly the roles of a document
//! - `roles` - List the roles in the directory
//! - `show` - Show one role
//! - `init` - Initialize a new directory database

mod commands;

use crate::config::{Overrides, Settings};
use clap::{Parser, Subcommand};
use rolesync_core::SyncError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// rolesync - declarative user and group synchronization
///
/// Applies role documents to a persistent role directory.
#[derive(Parser, Debug)]
#[command(name = "rolesync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the role directory database
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Directory that role document names are resolved against
    #[arg(short = 'R', long, global = true)]
    pub documents: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Settings given on the command line.
    pub fn overrides(&self) -> Overrides {
        Overrides {
            config: self.config.clone(),
            database: self.database.clone(),
            documents: self.documents.clone(),
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that a role document parses
    Validate {
        /// Document name, relative to the document root
        resource: String,
    },

    /// Install or update every role of a document
    Install {
        /// Document name, relative to the document root
        resource: String,
    },

    /// Remove every role of a document, last declared first
    Uninstall {
        /// Document name, relative to the document root
        resource: String,
    },

    /// Replace the directory contents with the roles of a document
    SetUsers {
        /// Document name, relative to the document root
        resource: String,
    },

    /// List the roles in the directory
    Roles,

    /// Show one role (credential values are never printed)
    Show {
        /// Role name
        name: String,
    },

    /// Initialize a new empty directory database
    Init {
        /// Replace an existing database
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and resolved settings.
pub fn execute(cli: Cli, settings: &Settings) -> Result<(), SyncError> {
    let json_mode = cli.json;

    match cli.command {
        Commands::Validate { resource } => cmd_validate(settings, json_mode, &resource),
        Commands::Install { resource } => {
            cmd_reconcile(settings, json_mode, Operation::Install, &resource)
        }
        Commands::Uninstall { resource } => {
            cmd_reconcile(settings, json_mode, Operation::Uninstall, &resource)
        }
        Commands::SetUsers { resource } => {
            cmd_reconcile(settings, json_mode, Operation::SetUsers, &resource)
        }
        Commands::Roles => cmd_roles(settings, json_mode),
        Commands::Show { name } => cmd_show(settings, json_mode, &name),
        Commands::Init { force } => cmd_init(settings, force),
    }
}
