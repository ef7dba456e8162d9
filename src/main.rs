mod build;
mod commands;
mod config;
mod env;
mod project;
mod server;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{Config, Environment};
use project::Project;

#[derive(Parser)]
#[command(name = "gantry", version)]
#[command(about = "Build, run and manage the lifecycle of gantry web projects")]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new project from a template (app, cms, blog or a git URL)
    #[command(visible_alias = "n")]
    New {
        template: String,
        path: PathBuf,
    },
    /// Print the tool version
    #[command(visible_alias = "v")]
    Version,
    /// Print this help
    #[command(visible_alias = "h")]
    Help,
    /// Build and run the project server (the default)
    #[command(visible_alias = "s")]
    Server,
    /// Run the project's tests
    #[command(visible_alias = "t")]
    Test {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Build the deployable server artifact
    #[command(visible_alias = "B")]
    Build {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run the project's bin/generate script
    #[command(visible_alias = "g")]
    Generate {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Run pending migrations via the project's bin/migrate script
    #[command(visible_alias = "m")]
    Migrate {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Back up the database for an environment via bin/backup
    #[command(visible_alias = "b")]
    Backup {
        #[arg(value_enum, default_value_t = Environment::Development)]
        environment: Environment,
    },
    /// Restore the database for an environment via bin/restore
    #[command(visible_alias = "r")]
    Restore {
        #[arg(value_enum, default_value_t = Environment::Development)]
        environment: Environment,
    },
    /// Build and deploy an environment via bin/deploy
    #[command(visible_alias = "d")]
    Deploy {
        #[arg(value_enum, default_value_t = Environment::Development)]
        environment: Environment,
    },
}

/// Diagnostics go to stderr; stdout belongs to the supervised server.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "gantry=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let root = std::env::current_dir().context("resolving working directory")?;
    let project = Project::locate(root);

    let Some(command) = cli.command else {
        // Bare invocation: run the server when inside a project, help otherwise.
        return if project.is_valid() {
            let config = Config::load(&project.config_path());
            server::run_server(&project, &config).await
        } else {
            show_help()
        };
    };

    match command {
        Command::New { template, path } => commands::run_new(&template, &path).await,
        Command::Version => {
            show_version();
            Ok(())
        }
        Command::Help => show_help(),
        gated => {
            let project = require_valid(project)?;
            let config = Config::load(&project.config_path());
            match gated {
                Command::Server => server::run_server(&project, &config).await,
                Command::Test { args } => commands::run_tests(&project, &args).await,
                Command::Build { args } => commands::run_build(&project, &args).await,
                Command::Generate { args } => {
                    commands::run_script(&project, &config, Environment::Development, "generate", &args)
                        .await
                }
                Command::Migrate { args } => {
                    commands::run_script(&project, &config, Environment::Development, "migrate", &args)
                        .await
                }
                Command::Backup { environment } => {
                    commands::run_script(
                        &project,
                        &config,
                        environment,
                        "backup",
                        &[environment.as_str().to_string()],
                    )
                    .await
                }
                Command::Restore { environment } => {
                    commands::run_script(
                        &project,
                        &config,
                        environment,
                        "restore",
                        &[environment.as_str().to_string()],
                    )
                    .await
                }
                Command::Deploy { environment } => {
                    commands::run_deploy(&project, &config, environment).await
                }
                // Handled before the gate.
                Command::New { .. } | Command::Version | Command::Help => Ok(()),
            }
        }
    }
}

fn require_valid(project: Project) -> Result<Project> {
    if project.is_valid() {
        return Ok(project);
    }
    bail!("no gantry project found at {}", project.root().display());
}

fn show_version() {
    info!("gantry {}", env!("CARGO_PKG_VERSION"));
}

fn show_help() -> Result<()> {
    Cli::command().print_long_help().context("printing help")?;
    Ok(())
}
