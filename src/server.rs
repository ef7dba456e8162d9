use std::path::Path;
use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::build;
use crate::config::{Config, ConfigState, Environment};
use crate::env;
use crate::project::Project;

/// Build the local artifact and run it until it exits. A build failure is
/// terminal: nothing is stopped and nothing is launched.
pub async fn run_server(project: &Project, config: &Config) -> Result<()> {
    info!("gantry {}", env!("CARGO_PKG_VERSION"));
    if config.state() != ConfigState::Loaded {
        debug!("secrets config unavailable; the server has to cope without it");
    }

    info!("Building server...");
    let artifact = project.local_server_path();
    build::build_server(project, &artifact, &[]).await?;

    stop_recorded_instance(project).await;
    let loaded = env::load_env(project.root(), Some(Environment::Development));
    if !loaded.is_empty() {
        debug!("loaded env files: {}", loaded.join(", "));
    }

    info!("Launching server...");
    let status = supervise(project, &artifact).await?;
    info!("Server exited: {status}");
    Ok(())
}

/// Spawn the artifact and forward its output until it exits. Both stream
/// forwarders are joined after the process wait so the tail of the output
/// is never lost.
async fn supervise(project: &Project, artifact: &Path) -> Result<ExitStatus> {
    let mut child = Command::new(artifact)
        .current_dir(project.root())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("launching {}", artifact.display()))?;

    let stdout = child.stdout.take().context("no stdout pipe on server process")?;
    let stderr = child.stderr.take().context("no stderr pipe on server process")?;

    if let Some(pid) = child.id() {
        record_pid(&project.pid_path(), pid);
    }

    let out_task = tokio::spawn(forward(stdout, tokio::io::stdout()));
    let err_task = tokio::spawn(forward(stderr, tokio::io::stderr()));

    let status = child.wait().await.context("waiting for server process")?;
    let _ = out_task.await;
    let _ = err_task.await;

    let _ = std::fs::remove_file(project.pid_path());
    Ok(status)
}

/// Copy a child stream to one of our own streams until EOF. I/O errors end
/// the forwarding, they don't end the run.
async fn forward<R, W>(mut from: R, mut to: W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if let Err(err) = tokio::io::copy(&mut from, &mut to).await {
        debug!("stream forwarding stopped: {err}");
    }
}

/// Best-effort stop of the instance recorded in tmp/server.pid. A missing
/// file, a stale pid or a failed signal never blocks the new launch.
async fn stop_recorded_instance(project: &Project) {
    let pid_path = project.pid_path();
    let Some(pid) = read_recorded_pid(&pid_path) else {
        return;
    };

    debug!("stopping recorded server instance (pid {pid})");
    terminate(pid).await;
    let _ = std::fs::remove_file(&pid_path);
}

fn read_recorded_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn record_pid(path: &Path, pid: u32) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(err) = std::fs::write(path, format!("{pid}\n")) {
        warn!("could not record server pid in {}: {err}", path.display());
    }
}

#[cfg(unix)]
async fn terminate(pid: u32) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid as i32);
    if kill(target, Signal::SIGTERM).is_err() {
        // Already gone, or not ours to signal.
        return;
    }

    // Give TERM a moment, then make sure.
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    let _ = kill(target, Signal::SIGKILL);
}

#[cfg(not(unix))]
async fn terminate(_pid: u32) {
    // Best-effort: Windows needs Job Objects to reliably terminate a process.
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use std::os::unix::fs::PermissionsExt;

    fn fake_artifact(project: &Project, body: &str) -> std::path::PathBuf {
        let path = project.local_server_path();
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn forward_copies_everything_through() {
        let mut sink = Cursor::new(Vec::new());
        forward(&b"starting on :3000\n"[..], &mut sink).await;
        assert_eq!(sink.into_inner(), b"starting on :3000\n");
    }

    #[tokio::test]
    async fn supervise_waits_for_exit_and_clears_the_pid_record() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::locate(dir.path());
        let artifact = fake_artifact(&project, "echo started\necho warning >&2");

        let status = supervise(&project, &artifact).await.unwrap();
        assert!(status.success());
        assert!(!project.pid_path().exists());
    }

    #[tokio::test]
    async fn supervise_reports_a_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::locate(dir.path());

        let err = supervise(&project, &project.local_server_path()).await.unwrap_err();
        assert!(err.to_string().contains("launching"));
    }

    #[tokio::test]
    async fn supervise_surfaces_the_exit_status() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::locate(dir.path());
        let artifact = fake_artifact(&project, "exit 3");

        let status = supervise(&project, &artifact).await.unwrap();
        assert_eq!(status.code(), Some(3));
    }

    #[tokio::test]
    async fn stop_tolerates_missing_and_garbage_pid_files() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::locate(dir.path());

        // No file at all.
        stop_recorded_instance(&project).await;

        // Garbage contents.
        fs::create_dir_all(project.pid_path().parent().unwrap()).unwrap();
        fs::write(project.pid_path(), "not-a-pid").unwrap();
        stop_recorded_instance(&project).await;
        assert!(project.pid_path().exists());
    }

    #[tokio::test]
    async fn stop_terminates_the_recorded_process() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::locate(dir.path());

        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id().unwrap();
        record_pid(&project.pid_path(), pid);

        stop_recorded_instance(&project).await;

        let status = child.wait().await.unwrap();
        assert!(!status.success());
        assert!(!project.pid_path().exists());
    }
}
