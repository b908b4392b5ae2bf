// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for runtime configuration loading and validation.

use std::path::PathBuf;
use thiserror::Error;

/// A single problem found by `validate_config`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// `execution.workers` was set to zero.
    #[error("execution.workers must be at least 1")]
    ZeroWorkers,

    /// `execution.workers` exceeds the supported maximum.
    #[error("execution.workers = {requested} exceeds the maximum of {maximum}")]
    TooManyWorkers { requested: usize, maximum: usize },

    /// Single-threaded mode was combined with more than one worker.
    #[error("execution.mode single_threaded cannot use {requested} workers")]
    SingleThreadedWorkers { requested: usize },

    /// `memory.max_item_bytes` was set to zero.
    #[error("memory.max_item_bytes must be greater than zero")]
    ZeroItemLimit,

    /// `logging.filter` was empty.
    #[error("logging.filter must not be empty")]
    EmptyLogFilter,
}

/// Errors that can occur while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported config format for '{path}' (expected .yaml, .yml or .toml)")]
    UnsupportedFormat { path: PathBuf },

    #[error("Configuration validation failed:\n{}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n"))]
    Invalid(Vec<ValidationError>),
}
