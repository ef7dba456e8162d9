use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Named settings sections in secrets/gantry.json.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

/// Outcome of the config load. A broken or absent secrets file must not
/// stop commands that don't need it, so the tool keeps running with empty
/// settings; the state lets commands that do need them say so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigState {
    Loaded,
    Missing,
    Invalid,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    development: HashMap<String, String>,
    #[serde(default)]
    production: HashMap<String, String>,
    #[serde(default)]
    test: HashMap<String, String>,
}

/// Per-environment string settings from secrets/gantry.json. Loaded once
/// per invocation and threaded through to whichever command needs it.
#[derive(Debug, Clone)]
pub struct Config {
    state: ConfigState,
    development: HashMap<String, String>,
    production: HashMap<String, String>,
    test: HashMap<String, String>,
}

impl Config {
    /// Never fails: a missing or malformed file degrades to empty settings
    /// for all environments, with the cause logged.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!("no config file at {}", path.display());
                return Config::empty(ConfigState::Missing);
            }
            Err(err) => {
                warn!("could not read config {}: {err}", path.display());
                return Config::empty(ConfigState::Invalid);
            }
        };

        match serde_json::from_str::<RawConfig>(&raw) {
            Ok(sections) => Config {
                state: ConfigState::Loaded,
                development: sections.development,
                production: sections.production,
                test: sections.test,
            },
            Err(err) => {
                warn!("could not parse config {}: {err}", path.display());
                Config::empty(ConfigState::Invalid)
            }
        }
    }

    fn empty(state: ConfigState) -> Self {
        Config {
            state,
            development: HashMap::new(),
            production: HashMap::new(),
            test: HashMap::new(),
        }
    }

    pub fn state(&self) -> ConfigState {
        self.state
    }

    pub fn settings(&self, environment: Environment) -> &HashMap<String, String> {
        match environment {
            Environment::Development => &self.development,
            Environment::Production => &self.production,
            Environment::Test => &self.test,
        }
    }

    #[allow(dead_code)]
    pub fn get(&self, environment: Environment, key: &str) -> Option<&str> {
        self.settings(environment).get(key).map(String::as_str)
    }
}
