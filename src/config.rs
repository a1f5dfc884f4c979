//! Host configuration
//!
//! Settings come from three layers, later ones winning:
//! built-in defaults, a JSON config file, then command-line host options.
//!
//! The config file is the one named by `--config`, else by `JSHOST_CONFIG`,
//! else `<config_dir>/jshost/config.json` if that exists.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_ENV: &str = "JSHOST_CONFIG";

pub const DEFAULT_PLATFORM_THREADS: usize = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("max heap size must be greater than zero")]
    ZeroHeap,

    #[error("initial heap size requires a max heap size")]
    InitialWithoutMax,

    #[error("initial heap size ({initial} MB) exceeds max heap size ({max} MB)")]
    InitialExceedsMax { initial: usize, max: usize },

    #[error("platform threads must be at least 1")]
    ZeroThreads,
}

/// Host settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct HostConfig {
    /// Entry module loaded when no script argument is given
    pub entry: Option<PathBuf>,

    /// Inline bootstrap source evaluated instead of an entry module
    pub bootstrap: Option<String>,

    /// V8 old-generation heap ceiling in megabytes
    pub max_heap_size_mb: Option<usize>,

    /// Initial V8 heap size in megabytes (requires `max_heap_size_mb`)
    pub initial_heap_size_mb: Option<usize>,

    /// Worker threads of the V8 platform
    pub platform_threads: usize,

    /// Extra flags passed to V8, space separated
    pub v8_flags: Option<String>,

    /// `tracing` filter directive used when `JSHOST_LOG` is unset
    pub log_filter: Option<String>,

    /// File receiving lifecycle transitions, when `JSHOST_LIFECYCLE_LOG` is unset
    pub lifecycle_log: Option<PathBuf>,

    /// Skip the Windows version check
    pub skip_platform_check: bool,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            entry: None,
            bootstrap: None,
            max_heap_size_mb: None,
            initial_heap_size_mb: None,
            platform_threads: DEFAULT_PLATFORM_THREADS,
            v8_flags: None,
            log_filter: None,
            lifecycle_log: None,
            skip_platform_check: false,
        }
    }
}

/// Values given as host options on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub bootstrap: Option<String>,
    pub max_heap_size_mb: Option<usize>,
    pub initial_heap_size_mb: Option<usize>,
    pub platform_threads: Option<usize>,
    pub v8_flags: Option<String>,
}

impl HostConfig {
    /// Parse a config file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Locate and read the config file.
    ///
    /// `explicit` and `from_env` must exist when given; the per-user default is
    /// optional and silently skipped when absent.
    pub fn discover(
        explicit: Option<&Path>,
        from_env: Option<PathBuf>,
        default: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = from_env {
            return Self::from_file(&path);
        }
        match default {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config_dir>/jshost/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("jshost").join("config.json"))
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(source) = &overrides.bootstrap {
            self.bootstrap = Some(source.clone());
        }
        if let Some(mb) = overrides.max_heap_size_mb {
            self.max_heap_size_mb = Some(mb);
        }
        if let Some(mb) = overrides.initial_heap_size_mb {
            self.initial_heap_size_mb = Some(mb);
        }
        if let Some(threads) = overrides.platform_threads {
            self.platform_threads = threads;
        }
        if let Some(flags) = &overrides.v8_flags {
            self.v8_flags = Some(flags.clone());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.platform_threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        match (self.initial_heap_size_mb, self.max_heap_size_mb) {
            (_, Some(0)) => Err(ConfigError::ZeroHeap),
            (Some(_), None) => Err(ConfigError::InitialWithoutMax),
            (Some(initial), Some(max)) if initial > max => {
                Err(ConfigError::InitialExceedsMax { initial, max })
            }
            _ => Ok(()),
        }
    }

    /// `(initial, max)` heap limits in bytes, if a ceiling is configured
    pub fn heap_limits(&self) -> Option<(usize, usize)> {
        const MB: usize = 1024 * 1024;
        let max = self.max_heap_size_mb?;
        let initial = self.initial_heap_size_mb.unwrap_or(0);
        Some((initial * MB, max * MB))
    }
}
