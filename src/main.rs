//! Keelson CLI - project boards with whole-project duplication.

use clap::Parser;
use keelson::cli::{Cli, Commands, ConfigCommands, ProjectCommands, SystemCommands};
use keelson::commands::{self, Output};
use keelson::config::{ConfigOverrides, OutputFormat};
use keelson::storage::get_data_dir;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "KEELSON_LOG";

fn main() {
    let cli = Cli::parse();

    // Determine data dir: --data-dir flag > KEELSON_DATA_DIR env > ~/.local/share/keelson
    let data_dir = match resolve_data_dir(cli.data_dir) {
        Ok(dir) => dir,
        Err(e) => fail(&e, cli.human_readable),
    };

    let startup = commands::startup_config(&data_dir);
    init_logging(startup.log_level());

    let human = cli.human_readable || startup.output_format() == OutputFormat::Human;

    if let Err(e) = run_command(cli.command, &data_dir, human) {
        fail(&e, human);
    }
}

fn resolve_data_dir(explicit: Option<PathBuf>) -> Result<PathBuf, keelson::Error> {
    match explicit {
        Some(path) => Ok(path),
        None => get_data_dir(),
    }
}

/// Install the stderr subscriber. `KEELSON_LOG` wins over the configured level.
fn init_logging(configured: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(configured))
        .unwrap_or_else(|_| EnvFilter::new(keelson::config::DEFAULT_LOG_LEVEL));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn fail(e: &keelson::Error, human: bool) -> ! {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
    process::exit(1);
}

fn run_command(command: Commands, data_dir: &Path, human: bool) -> Result<(), keelson::Error> {
    match command {
        Commands::Project { command } => match command {
            ProjectCommands::Show { id } => {
                let result = commands::project_show(data_dir, id)?;
                output(&result, human);
            }
            ProjectCommands::Duplicate {
                id,
                as_user,
                parent,
                title_suffix,
            } => {
                let mut overrides = ConfigOverrides::new();
                if let Some(suffix) = title_suffix {
                    overrides = overrides.with_title_suffix(suffix);
                }
                let result = commands::project_duplicate(data_dir, id, as_user, parent, &overrides)?;
                output(&result, human);
            }
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let result = commands::config_show(data_dir)?;
                output(&result, human);
            }
        },
        Commands::System { command } => match command {
            SystemCommands::Init => {
                let result = commands::system_init(data_dir)?;
                output(&result, human);
            }
        },
    }
    Ok(())
}

fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
