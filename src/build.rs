use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tokio::process::Command;
use tracing::debug;

use crate::project::Project;

/// The Go toolchain binary, overridable for tests and unusual installs.
pub fn go_binary() -> String {
    std::env::var("GANTRY_GO_BIN")
        .or_else(|_| std::env::var("GO_BIN"))
        .unwrap_or_else(|_| "go".to_string())
}

/// Compile the project's server into `output`, passing `extra_args` through
/// to the compiler. Non-zero exit surfaces the toolchain's stderr verbatim.
pub async fn build_server(project: &Project, output: &Path, extra_args: &[String]) -> Result<()> {
    build_with(&go_binary(), &project.compile_path(), output, extra_args).await
}

async fn build_with(go: &str, compile_dir: &Path, output: &Path, extra_args: &[String]) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    debug!("compiling {} -> {}", compile_dir.display(), output.display());
    let out = Command::new(go)
        .current_dir(compile_dir)
        .arg("build")
        .arg("-o")
        .arg(output)
        .args(extra_args)
        .output()
        .await
        .with_context(|| format!("running {go} build"))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(anyhow!("{go} build failed: {}", stderr.trim_end()));
    }

    Ok(())
}
