use std::path::{Path, PathBuf};

/// Name of the compiled server binary. Artifact paths and the pid record
/// are derived from it.
pub const SERVER_NAME: &str = "gantry-server";

/// Where the server entry point lives relative to the project root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `server.go` directly under the project root.
    Current,
    /// Older projects keep the app under `src/app` instead.
    Legacy,
}

impl Layout {
    /// Stat errors count as "not there"; this is a predicate, not a
    /// fallible operation.
    pub fn detect(root: &Path) -> Self {
        if root.join("server.go").exists() {
            Layout::Current
        } else {
            Layout::Legacy
        }
    }
}

/// A candidate project rooted at a filesystem path. Resolved once per
/// invocation and never mutated.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    layout: Layout,
}

impl Project {
    pub fn locate(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let layout = Layout::detect(&root);
        Project { root, layout }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    #[allow(dead_code)]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Directory handed to the compiler as its working directory.
    pub fn compile_path(&self) -> PathBuf {
        match self.layout {
            Layout::Current => self.root.clone(),
            Layout::Legacy => self.root.join("src").join("app"),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("secrets").join("gantry.json")
    }

    /// Artifact used by `gantry server` for local runs.
    pub fn local_server_path(&self) -> PathBuf {
        self.root.join("bin").join(format!("{SERVER_NAME}-local"))
    }

    /// Deployable artifact produced by `gantry build`.
    pub fn server_path(&self) -> PathBuf {
        self.root.join("bin").join(SERVER_NAME)
    }

    /// Pid of the last server launched from this project, so a new run can
    /// stop it without touching unrelated processes.
    pub fn pid_path(&self) -> PathBuf {
        self.root.join("tmp").join("server.pid")
    }

    /// Project-local collaborator scripts (generate, migrate, backup,
    /// restore, deploy) live in bin/ next to the artifacts.
    pub fn script_path(&self, name: &str) -> PathBuf {
        self.root.join("bin").join(name)
    }

    #[allow(dead_code)]
    pub fn public_path(&self) -> PathBuf {
        self.root.join("public")
    }

    #[allow(dead_code)]
    pub fn src_path(&self) -> PathBuf {
        self.root.join("src")
    }

    /// A directory is a project when the layout's entry point and the
    /// secrets file are both present.
    pub fn is_valid(&self) -> bool {
        let entry = match self.layout {
            Layout::Current => self.root.join("server.go"),
            Layout::Legacy => self.compile_path(),
        };
        entry.exists() && self.config_path().exists()
    }
}
