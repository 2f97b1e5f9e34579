//! Explorer configuration.
//!
//! Sources, lowest priority first: built-in defaults, the TOML config file,
//! `REPO_EXPLORER_*` environment variables, then command-line flags.
//!
//! ```toml
//! default-repository-path = "~/src"
//! max-scan-depth = 4
//! fetch-timeout-seconds = 60
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Case, Config, ConfigError, Environment, File, FileFormat};
use etcetera::base_strategy::{BaseStrategy, choose_base_strategy};
use serde::{Deserialize, Serialize};

use crate::git::ProbeSettings;
use crate::scan::DEFAULT_MAX_DEPTH;

/// Prefix of the environment variables read as configuration.
pub const ENV_PREFIX: &str = "REPO_EXPLORER";

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "REPO_EXPLORER_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExplorerConfig {
    /// Root scanned when no path is given. Defaults to the home directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_repository_path: Option<String>,
    pub max_scan_depth: usize,
    pub fetch_timeout_seconds: u64,
    pub query_timeout_seconds: u64,
    pub git_program: String,
    pub app_name: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            default_repository_path: None,
            max_scan_depth: DEFAULT_MAX_DEPTH,
            fetch_timeout_seconds: crate::git::FETCH_TIMEOUT.as_secs(),
            query_timeout_seconds: crate::git::QUERY_TIMEOUT.as_secs(),
            git_program: "git".to_string(),
            app_name: "Git Repo Explorer".to_string(),
        }
    }
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub max_scan_depth: Option<usize>,
    pub fetch_timeout_seconds: Option<u64>,
}

impl ExplorerConfig {
    /// Load the effective configuration from `path` (if it exists), the
    /// process environment, and `overrides`.
    pub fn load(path: Option<&Path>, overrides: &CliOverrides) -> Result<Self, ConfigError> {
        Self::load_with_env(path, None, overrides)
    }

    /// Like [`ExplorerConfig::load`], reading environment variables from
    /// `env` instead of the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
        overrides: &CliOverrides,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            log::debug!("Reading config from {}", path.display());
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        builder = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .convert_case(Case::Kebab)
                    .source(env),
            )
            .set_override_option(
                "max-scan-depth",
                cli_value("max-scan-depth", overrides.max_scan_depth)?,
            )?
            .set_override_option(
                "fetch-timeout-seconds",
                cli_value("fetch-timeout-seconds", overrides.fetch_timeout_seconds)?,
            )?;

        let config: ExplorerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.git_program.trim().is_empty() {
            return Err(ConfigError::Message("git-program cannot be empty".into()));
        }
        if self.fetch_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "fetch-timeout-seconds must be at least 1".into(),
            ));
        }
        if self.query_timeout_seconds == 0 {
            return Err(ConfigError::Message(
                "query-timeout-seconds must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Directory to scan when none is given: `default-repository-path` with
    /// `~` and `$VAR` expanded, else the home directory.
    pub fn root_path(&self) -> Option<PathBuf> {
        match &self.default_repository_path {
            Some(raw) => {
                let expanded = shellexpand::full(raw)
                    .map(|s| s.into_owned())
                    .unwrap_or_else(|e| {
                        log::warn!("Could not expand {raw}: {e}");
                        raw.clone()
                    });
                Some(PathBuf::from(expanded))
            }
            None => home::home_dir(),
        }
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            program: self.git_program.clone(),
            query_timeout: Duration::from_secs(self.query_timeout_seconds),
            fetch_timeout: Duration::from_secs(self.fetch_timeout_seconds),
        }
    }

    /// The configuration as TOML, for `config show`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Message(format!("Serialization error: {e}")))
    }
}

/// A command-line value as a config integer. Out-of-range values are an
/// error rather than falling through to the file or environment.
fn cli_value<T>(key: &str, value: Option<T>) -> Result<Option<i64>, ConfigError>
where
    T: TryInto<i64> + Copy + std::fmt::Display,
{
    value
        .map(|v| {
            v.try_into()
                .map_err(|_| ConfigError::Message(format!("{key} is out of range: {v}")))
        })
        .transpose()
}

/// Path of the config file.
///
/// Priority:
/// 1. `--config` flag
/// 2. `REPO_EXPLORER_CONFIG_PATH`
/// 3. `repo-explorer/config.toml` under the platform config directory
pub fn config_path(cli: Option<&Path>) -> Option<PathBuf> {
    resolve_config_path(cli, std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
}

fn resolve_config_path(cli: Option<&Path>, env: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = cli {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path);
    }
    // XDG on Linux and macOS, %APPDATA% on Windows.
    let strategy = choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("repo-explorer").join("config.toml"))
}
