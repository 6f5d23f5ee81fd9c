// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchwatch configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! environment variables prefixed `BENCHWATCH__` with `__` separating nested
//! keys (`BENCHWATCH__RUNNER__COMMAND_TIMEOUT_SECS=900`). Command lines given
//! through the environment are split on spaces.
//!
//! # Example
//!
//! ```toml
//! [server]
//! listen_addr = "0.0.0.0:4278"
//!
//! [runner]
//! workspace_root = "./tmp"
//! install_command = ["npm", "install"]
//! bench_command = ["npm", "run", "bench"]
//! result_source = { mode = "artifact", path = "bench-results/results.json" }
//!
//! [github]
//! owner = "acme"
//! repo = "lib"
//! ```

use crate::upstream::github::DEFAULT_API_URL;
use benchwatch_benchmarks::format::DEFAULT_PRECISION;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "BENCHWATCH";

/// Largest accepted decimal precision.
pub const MAX_PRECISION: usize = 6;

/// Node.js one-liner that loads an entry point module and writes its
/// (possibly promised) export as JSON to the path given as second argument.
pub const NODE_MODULE_LOADER: &str = "const [entry, out] = process.argv.slice(1); \
Promise.resolve(require(require('path').resolve(entry))) \
.then(r => require('fs').writeFileSync(out, JSON.stringify(r)));";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where the build runner takes the benchmark result from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ResultSource {
    /// The benchmark command writes a JSON file at `path` (relative to the checkout).
    Artifact {
        /// Artifact path inside the checkout.
        path: PathBuf,
    },
    /// The `loader` command evaluates `entry_point` as a module and writes its
    /// export to a file. The loader receives the entry point and the output
    /// path as its last two arguments.
    Module {
        /// Entry point inside the checkout.
        entry_point: PathBuf,
        /// Loader command line.
        #[serde(default = "default_module_loader")]
        loader: Vec<String>,
    },
}

fn default_module_loader() -> Vec<String> {
    vec![
        "node".to_string(),
        "-e".to_string(),
        NODE_MODULE_LOADER.to_string(),
    ]
}

impl Default for ResultSource {
    fn default() -> Self {
        ResultSource::Artifact {
            path: PathBuf::from("bench-results/results.json"),
        }
    }
}

/// Build runner and orchestrator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Directory holding per-run workspaces.
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,

    /// Dependency installation command; empty to skip.
    #[serde(default = "default_install_command")]
    pub install_command: Vec<String>,

    /// Benchmark command; empty when the result source produces the result itself.
    #[serde(default = "default_bench_command")]
    pub bench_command: Vec<String>,

    /// Where the result comes from.
    #[serde(default)]
    pub result_source: ResultSource,

    /// Limit for every external process, in seconds.
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,

    /// Build base and head concurrently.
    #[serde(default)]
    pub parallel_builds: bool,

    /// Decimal places for counts and differences in the report.
    #[serde(default = "default_decimal_precision")]
    pub decimal_precision: usize,
}

fn default_workspace_root() -> PathBuf {
    PathBuf::from("./tmp")
}

fn default_install_command() -> Vec<String> {
    vec!["npm".to_string(), "install".to_string()]
}

fn default_bench_command() -> Vec<String> {
    vec!["npm".to_string(), "run".to_string(), "bench".to_string()]
}

fn default_command_timeout_secs() -> u64 {
    600
}

fn default_decimal_precision() -> usize {
    DEFAULT_PRECISION
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            workspace_root: default_workspace_root(),
            install_command: default_install_command(),
            bench_command: default_bench_command(),
            result_source: ResultSource::default(),
            command_timeout_secs: default_command_timeout_secs(),
            parallel_builds: false,
            decimal_precision: default_decimal_precision(),
        }
    }
}

impl RunnerConfig {
    /// The per-process timeout.
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "runner.command_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.decimal_precision > MAX_PRECISION {
            return Err(ConfigError::Invalid(format!(
                "runner.decimal_precision must be at most {}, got {}",
                MAX_PRECISION, self.decimal_precision
            )));
        }
        match &self.result_source {
            ResultSource::Artifact { path } if path.as_os_str().is_empty() => Err(
                ConfigError::Invalid("runner.result_source.path must not be empty".to_string()),
            ),
            ResultSource::Module { loader, .. } if loader.is_empty() => Err(ConfigError::Invalid(
                "runner.result_source.loader must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// GitHub connection settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct GitHubSettings {
    /// REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Repository owner comments are posted to.
    #[serde(default)]
    pub owner: String,
    /// Repository name comments are posted to.
    #[serde(default)]
    pub repo: String,
    /// API token. Falls back to the `GITHUB_TOKEN` environment variable.
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            owner: String::new(),
            repo: String::new(),
            token: None,
        }
    }
}

impl fmt::Debug for GitHubSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubSettings")
            .field("api_url", &self.api_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GitHubSettings {
    /// Require the repository coordinates needed to post comments.
    pub fn require_target(&self) -> Result<()> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "github.owner and github.repo are required to post comments".to_string(),
            ));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Socket address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Log filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_listen_addr() -> String {
    "0.0.0.0:4278".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

/// Complete Benchwatch settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP service settings.
    #[serde(default)]
    pub server: ServerSettings,
    /// Build runner settings.
    #[serde(default)]
    pub runner: RunnerConfig,
    /// GitHub settings.
    #[serde(default)]
    pub github: GitHubSettings,
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    ///
    /// `path` must exist when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(" ")
                .with_list_parse_key("runner.install_command")
                .with_list_parse_key("runner.bench_command")
                .with_list_parse_key("runner.result_source.loader")
                .try_parsing(true),
        );

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        if settings.github.token.is_none() {
            settings.github.token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        self.runner.validate()?;
        if self.server.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "server.listen_addr '{}' is not a socket address",
                self.server.listen_addr
            )));
        }
        Ok(())
    }
}
