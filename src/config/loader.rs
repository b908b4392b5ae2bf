// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::config::consts::DEFAULT_LOG_FILTER;
use crate::config::validate_config;
use crate::errors::ConfigError;
use crate::observability::messages::config::{ConfigLoaded, ConfigRejected};
use crate::observability::messages::StructuredLog;

/// Runtime configuration shared by every context the process creates.
///
/// Every section is optional; a missing section takes its defaults.
///
/// # Fields
/// * `execution` - Scheduler mode and worker count
/// * `demand` - Demand-driven prescription of producers
/// * `memory` - Limits for item allocation
/// * `logging` - Default tracing filter
///
/// # Example
/// ```yaml
/// execution:
///   mode: parallel
///   workers: 4
/// demand:
///   auto_prescribe: true
/// memory:
///   max_item_bytes: 1048576
/// logging:
///   filter: info
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub execution: ExecutionConfig,
    pub demand: DemandConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

/// How ready steps are executed.
///
/// # Variants
/// * `Parallel` - A pool of work-stealing worker threads
/// * `SingleThreaded` - The controller thread runs every step in FIFO order;
///   runs are deterministic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Parallel,
    SingleThreaded,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Parallel => "parallel",
            ExecutionMode::SingleThreaded => "single_threaded",
        }
    }
}

/// Scheduler settings.
///
/// `workers` defaults to the available parallelism of the host.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub workers: Option<usize>,
}

/// Demand settings.
///
/// With `auto_prescribe` enabled, a step that subscribes to an absent item
/// whose collection has a declared producer prescribes that producer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DemandConfig {
    pub auto_prescribe: bool,
}

impl Default for DemandConfig {
    fn default() -> Self {
        Self {
            auto_prescribe: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Largest buffer `item_alloc` hands out. Unlimited when absent.
    pub max_item_bytes: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` overrides it.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Yaml,
    Toml,
}

fn format_of(path: &Path) -> Result<Format, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => Ok(Format::Yaml),
        Some("toml") => Ok(Format::Toml),
        _ => Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

/// Load a config from a YAML (`.yaml`, `.yml`) or TOML (`.toml`) file.
///
/// An empty file yields the default configuration.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RuntimeConfig, ConfigError> {
    let path = path.as_ref();
    let format = format_of(path)?;
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if content.trim().is_empty() {
        return Ok(RuntimeConfig::default());
    }

    let cfg = match format {
        Format::Yaml => serde_yaml::from_str(&content)?,
        Format::Toml => toml::from_str(&content)?,
    };
    Ok(cfg)
}

/// Load a config and check it with [`validate_config`].
///
/// Every problem found is reported at once through `ConfigError::Invalid`.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<RuntimeConfig, ConfigError> {
    let path = path.as_ref();
    let cfg = load_config(path)?;

    if let Err(problems) = validate_config(&cfg) {
        let rendered: Vec<String> = problems.iter().map(|p| p.to_string()).collect();
        ConfigRejected {
            problems: &rendered,
        }
        .log();
        return Err(ConfigError::Invalid(problems));
    }

    ConfigLoaded {
        path: &path.display().to_string(),
        mode: cfg.execution.mode.as_str(),
        workers: cfg.execution.workers,
    }
    .log();
    Ok(cfg)
}
