//! Configuration management module.
//!
//! This module handles the defaults merged into every set-up call and the
//! debug switch, optionally loaded from a YAML configuration file.

mod error;

pub use error::ConfigError;

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

const FILE_NAME: &str = "config.yml";
const DEFAULT_DIRECTORY_PATH: &str = ".config/screen-history";

/// Specifying what set-up does when a tab comes back after a browser restart.
///
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WhenBrowserRestart {
    /// Walk back past the managed entries to the previous document.
    BackToPreviousDocument,
    /// Hand off to a redirect document that rewrites the stale entries.
    Redirect,
    /// Start a fresh context in place.
    #[default]
    None,
}

/// Set-up options. Unset fields are filled from the configured defaults.
///
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetUpOptions {
    pub namespace: Option<String>,
    pub when_browser_restart: Option<WhenBrowserRestart>,
    pub redirect_html_url: Option<String>,
    pub storage_truncate: Option<usize>,
}

impl SetUpOptions {
    /// Return options for `namespace` with everything else unset.
    ///
    pub fn new(namespace: &str) -> Self {
        SetUpOptions {
            namespace: Some(namespace.to_owned()),
            ..SetUpOptions::default()
        }
    }

    pub fn when_browser_restart(mut self, strategy: WhenBrowserRestart) -> Self {
        self.when_browser_restart = Some(strategy);
        self
    }

    pub fn redirect_html_url(mut self, url: &str) -> Self {
        self.redirect_html_url = Some(url.to_owned());
        self
    }

    pub fn storage_truncate(mut self, limit: usize) -> Self {
        self.storage_truncate = Some(limit);
        self
    }

    /// Fill every unset field from `defaults`.
    ///
    pub fn merged_with(self, defaults: &SetUpOptions) -> SetUpOptions {
        SetUpOptions {
            namespace: self.namespace.or_else(|| defaults.namespace.clone()),
            when_browser_restart: self.when_browser_restart.or(defaults.when_browser_restart),
            redirect_html_url: self
                .redirect_html_url
                .or_else(|| defaults.redirect_html_url.clone()),
            storage_truncate: self.storage_truncate.or(defaults.storage_truncate),
        }
    }

    /// Validate the options, returning the settings set-up runs with.
    ///
    pub fn resolve(self) -> Result<ResolvedSetUp, ConfigError> {
        let namespace = self
            .namespace
            .filter(|namespace| !namespace.is_empty())
            .ok_or(ConfigError::NamespaceNotSet)?;
        let when_browser_restart = self.when_browser_restart.unwrap_or_default();
        if when_browser_restart == WhenBrowserRestart::Redirect && self.redirect_html_url.is_none() {
            return Err(ConfigError::RedirectUrlNotSet);
        }
        Ok(ResolvedSetUp {
            namespace,
            when_browser_restart,
            redirect_html_url: self.redirect_html_url,
            storage_truncate: self.storage_truncate,
        })
    }
}

/// Validated set-up settings.
///
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSetUp {
    pub namespace: String,
    pub when_browser_restart: WhenBrowserRestart,
    pub redirect_html_url: Option<String>,
    pub storage_truncate: Option<usize>,
}

/// Oversees the manager configuration.
///
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub debug: bool,
    pub init_options: SetUpOptions,
}

impl Config {
    /// Return a new default instance.
    ///
    pub fn new() -> Config {
        Config::default()
    }

    /// Parse a configuration from YAML.
    ///
    pub fn from_yaml(contents: &str) -> Result<Config, ConfigError> {
        serde_yaml::from_str(contents).map_err(|e| ConfigError::DeserializationFailed(e.to_string()))
    }

    /// Load the configuration file from the custom directory if provided,
    /// otherwise from the default directory. A missing file yields the
    /// defaults.
    ///
    pub fn load(custom_path: Option<&str>) -> Result<Config, ConfigError> {
        let dir_path = match custom_path {
            Some(path) => Path::new(path).to_path_buf(),
            None => Config::default_path()?,
        };
        let file_path = dir_path.join(Path::new(FILE_NAME));
        if !file_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(&file_path).map_err(|e| ConfigError::LoadFailed {
            path: file_path.clone(),
            message: format!("IO error: {}", e),
        })?;
        Config::from_yaml(&contents)
    }

    /// Returns the path buffer for the default configuration directory or an
    /// error if the home directory could not be found.
    ///
    fn default_path() -> Result<PathBuf, ConfigError> {
        match dirs::home_dir() {
            Some(home) => Ok(home.join(Path::new(DEFAULT_DIRECTORY_PATH))),
            None => Err(ConfigError::HomeDirectoryNotFound),
        }
    }
}
