// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for configuration loading.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A configuration file was loaded.
///
/// # Log Level
/// `info!` - Important operational event
pub struct ConfigLoaded<'a> {
    pub path: &'a str,
    pub mode: &'a str,
    pub workers: Option<usize>,
}

impl Display for ConfigLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.workers {
            Some(workers) => write!(
                f,
                "Loaded configuration from {}: {} mode, {} workers",
                self.path, self.mode, workers
            ),
            None => write!(
                f,
                "Loaded configuration from {}: {} mode, default workers",
                self.path, self.mode
            ),
        }
    }
}

impl StructuredLog for ConfigLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            path = self.path,
            mode = self.mode,
            workers = ?self.workers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("config", span_name = name, path = self.path)
    }
}

/// Validation rejected a configuration.
///
/// # Log Level
/// `error!` - The configuration cannot be used
pub struct ConfigRejected<'a> {
    pub problems: &'a [String],
}

impl Display for ConfigRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Configuration rejected with {} problems: {}",
            self.problems.len(),
            self.problems.join("; ")
        )
    }
}

impl StructuredLog for ConfigRejected<'_> {
    fn log(&self) {
        tracing::error!(problem_count = self.problems.len(), "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("config_rejected", span_name = name)
    }
}
