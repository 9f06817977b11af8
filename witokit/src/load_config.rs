/// `load_config` module: reads the optional YAML defaults file and layers the
/// environment on top of it.
///
/// Precedence, highest first: command-line flags, environment, config file,
/// built-in defaults. Flags are applied by the CLI; this module covers the
/// other three.
///
/// Accepted keys:
///
/// ```yaml
/// dump_url: https://dumps.wikimedia.org
/// num_threads: 4
/// language: en
/// lowercase: true
/// keep_archives: false
/// strict: false
/// ```
///
/// Unknown keys are rejected so that typos do not silently fall back to defaults.
use anyhow::{bail, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};
use witokit_core::config::DEFAULT_DUMP_URL;
use witokit_core::dispatch::FailurePolicy;
use witokit_core::pipeline::RunOptions;

/// Overrides the dump host from the config file.
pub const DUMP_URL_ENV: &str = "WITOKIT_DUMP_URL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WitokitConfig {
    pub dump_url: Option<String>,
    pub num_threads: Option<usize>,
    pub language: Option<String>,
    pub lowercase: Option<bool>,
    pub keep_archives: Option<bool>,
    /// Abort on malformed shards too, instead of skipping them.
    pub strict: Option<bool>,
}

/// Command-line values that may override the config.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub language: Option<String>,
    pub num_threads: Option<usize>,
    /// `Some` when a flag chose the case explicitly.
    pub lowercase: Option<bool>,
    pub keep_archives: bool,
}

impl WitokitConfig {
    /// Apply environment overrides.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var(DUMP_URL_ENV) {
            if !url.trim().is_empty() {
                info!(env = DUMP_URL_ENV, dump_url = %url, "Dump URL taken from environment");
                self.dump_url = Some(url);
            }
        }
        self
    }

    pub fn dump_url(&self) -> &str {
        self.dump_url.as_deref().unwrap_or(DEFAULT_DUMP_URL)
    }

    /// Final run settings. Rejects a worker count of zero before any work starts.
    pub fn run_options(&self, overrides: Overrides) -> Result<RunOptions> {
        let defaults = RunOptions::default();
        let workers = overrides
            .num_threads
            .or(self.num_threads)
            .unwrap_or(defaults.workers);
        if workers == 0 {
            error!("num_threads must be at least 1");
            bail!("num_threads must be at least 1");
        }
        let policy = if self.strict.unwrap_or(false) {
            FailurePolicy::AbortOnAny
        } else {
            FailurePolicy::SkipRecoverable
        };
        Ok(RunOptions {
            language: overrides
                .language
                .or_else(|| self.language.clone())
                .unwrap_or(defaults.language),
            lowercase: overrides
                .lowercase
                .or(self.lowercase)
                .unwrap_or(defaults.lowercase),
            workers,
            policy,
            keep_archives: overrides.keep_archives || self.keep_archives.unwrap_or(false),
        })
    }
}

/// Loads a YAML config file, then applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<WitokitConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    // an empty file is an empty mapping
    if config_content.trim().is_empty() {
        return Ok(WitokitConfig::default().with_env());
    }

    let config: WitokitConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    Ok(config.with_env())
}

/// [`load_config`] when a path is given, defaults plus environment otherwise.
pub fn load_optional_config(path: Option<&Path>) -> Result<WitokitConfig> {
    match path {
        Some(p) => load_config(p),
        None => Ok(WitokitConfig::default().with_env()),
    }
}
