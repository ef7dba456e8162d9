use std::path::Path;

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::build;
use crate::config::{Config, ConfigState, Environment};
use crate::env;
use crate::project::Project;

/// Where named templates for `gantry new` are hosted. `app`, `cms` and
/// `blog` resolve against this org; anything else is taken as a git URL.
const TEMPLATE_ORG: &str = "https://github.com/gantry-web";

pub async fn run_new(template: &str, path: &Path) -> Result<()> {
    let url = match template {
        "app" | "cms" | "blog" => format!("{TEMPLATE_ORG}/gantry-{template}"),
        other => other.to_string(),
    };
    if path.exists() {
        bail!("destination {} already exists", path.display());
    }

    info!("Cloning {url} into {}", path.display());
    let status = Command::new("git")
        .args(["clone", "--depth", "1"])
        .arg(&url)
        .arg(path)
        .status()
        .await
        .context("running git clone")?;
    if !status.success() {
        bail!("git clone failed for {url}");
    }

    // The clone is a fresh project, not a checkout of the template.
    let _ = std::fs::remove_dir_all(path.join(".git"));
    info!("Project created at {}", path.display());
    Ok(())
}

pub async fn run_tests(project: &Project, extra_args: &[String]) -> Result<()> {
    let go = build::go_binary();
    let status = Command::new(&go)
        .current_dir(project.compile_path())
        .arg("test")
        .arg("./...")
        .args(extra_args)
        .status()
        .await
        .with_context(|| format!("running {go} test"))?;
    if !status.success() {
        bail!("tests failed");
    }
    Ok(())
}

/// Deployable build to bin/, extra args passed through to the compiler.
pub async fn run_build(project: &Project, extra_args: &[String]) -> Result<()> {
    let output = project.server_path();
    build::build_server(project, &output, extra_args).await?;
    info!("Built {}", output.display());
    Ok(())
}

/// Run a collaborator script from the project's bin/ directory with the
/// chosen environment's settings exported as GANTRY_* variables.
pub async fn run_script(
    project: &Project,
    config: &Config,
    environment: Environment,
    name: &str,
    args: &[String],
) -> Result<()> {
    let script = project.script_path(name);
    if !script.exists() {
        bail!("this project has no {name} script ({} not found)", script.display());
    }
    if config.state() != ConfigState::Loaded {
        warn!("secrets config unavailable; {name} runs without project settings");
    }

    let loaded = env::load_env(project.root(), Some(environment));
    if !loaded.is_empty() {
        debug!("loaded env files: {}", loaded.join(", "));
    }

    let mut cmd = Command::new(&script);
    cmd.current_dir(project.root()).args(args);
    for (key, value) in config.settings(environment) {
        cmd.env(format!("GANTRY_{}", key.to_uppercase()), value);
    }

    let status = cmd
        .status()
        .await
        .with_context(|| format!("running {}", script.display()))?;
    if !status.success() {
        bail!("{name} exited with {status}");
    }
    Ok(())
}

/// Deploy ships the deployable artifact: build first, then hand off to the
/// project's deploy script.
pub async fn run_deploy(project: &Project, config: &Config, environment: Environment) -> Result<()> {
    run_build(project, &[]).await?;
    run_script(
        project,
        config,
        environment,
        "deploy",
        &[environment.as_str().to_string()],
    )
    .await
}
