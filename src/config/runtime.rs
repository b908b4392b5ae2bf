// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::FALLBACK_WORKERS;
use crate::config::{ExecutionMode, RuntimeConfig};
use crate::engine::ContextOptions;

/// Number of workers used when none is configured: the host's available
/// parallelism.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_WORKERS)
}

/// Turns a loaded configuration into context options.
///
/// # Examples
///
/// ```
/// use the_cncwood::config::{ExecutionMode, RuntimeBuilder, RuntimeConfig};
///
/// let mut config = RuntimeConfig::default();
/// config.execution.workers = Some(3);
/// config.memory.max_item_bytes = Some(1024);
///
/// let options = RuntimeBuilder::from_config(&config);
/// assert_eq!(options.mode, ExecutionMode::Parallel);
/// assert_eq!(options.effective_workers(), 3);
/// assert_eq!(options.max_item_bytes, Some(1024));
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build the options every context of this process is created with.
    ///
    /// The configuration is expected to be validated already.
    pub fn from_config(cfg: &RuntimeConfig) -> ContextOptions {
        let workers = match cfg.execution.mode {
            ExecutionMode::SingleThreaded => 1,
            ExecutionMode::Parallel => cfg.execution.workers.unwrap_or_else(default_workers),
        };
        ContextOptions {
            mode: cfg.execution.mode,
            workers,
            auto_prescribe: cfg.demand.auto_prescribe,
            max_item_bytes: cfg.memory.max_item_bytes,
            cancellation: None,
        }
    }
}
