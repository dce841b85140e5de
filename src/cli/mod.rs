//! CLI argument definitions for Keelson.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keelson - project boards with whole-project duplication.
#[derive(Parser, Debug)]
#[command(name = "keelson")]
#[command(author, version, about = "Project boards with whole-project duplication", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Use <path> as the data directory instead of ~/.local/share/keelson.
    /// Can also be set via KEELSON_DATA_DIR environment variable.
    #[arg(short = 'D', long = "data-dir", global = true, env = "KEELSON_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Project commands
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// System administration commands
    System {
        #[command(subcommand)]
        command: SystemCommands,
    },
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Show a project with its owner, views, buckets and task count
    Show {
        /// Project ID
        id: i64,
    },

    /// Duplicate a project with its views, tasks, attachments and shares
    ///
    /// The copy is owned by the acting user. Relations to tasks outside the
    /// project and assignees without access to the copy are left out.
    Duplicate {
        /// Source project ID
        id: i64,

        /// ID of the user performing the duplication (owner of the copy)
        #[arg(long = "as", value_name = "USER_ID")]
        as_user: i64,

        /// Parent project for the copy (0 or omitted: top level)
        #[arg(long, default_value_t = 0)]
        parent: i64,

        /// Suffix appended to the copied title (overrides config)
        #[arg(long)]
        title_suffix: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the resolved configuration and where each value came from
    Show,
}

/// System administration subcommands
#[derive(Subcommand, Debug)]
pub enum SystemCommands {
    /// Initialize the data directory and database
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duplicate() {
        let cli = Cli::try_parse_from([
            "keelson",
            "project",
            "duplicate",
            "7",
            "--as",
            "2",
            "--parent",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Project {
                command:
                    ProjectCommands::Duplicate {
                        id,
                        as_user,
                        parent,
                        title_suffix,
                    },
            } => {
                assert_eq!((id, as_user, parent), (7, 2, 3));
                assert_eq!(title_suffix, None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_requires_actor() {
        let result = Cli::try_parse_from(["keelson", "project", "duplicate", "7"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_human_flag() {
        let cli = Cli::try_parse_from(["keelson", "config", "show", "-H"]).unwrap();
        assert!(cli.human_readable);
    }
}
