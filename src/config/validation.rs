// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Validation of runtime configuration.
//!
//! Every rule is checked and every violation is collected, so a user fixing
//! a configuration file sees all of its problems in one run:
//!
//! 1. `execution.workers` must be between 1 and [`MAX_WORKERS`]
//! 2. `single_threaded` mode runs on exactly one thread
//! 3. `memory.max_item_bytes` must be positive when set
//! 4. `logging.filter` must not be blank
//!
//! # Examples
//!
//! ```rust
//! use the_cncwood::config::{validate_config, ExecutionMode, RuntimeConfig};
//! use the_cncwood::errors::ValidationError;
//!
//! let mut config = RuntimeConfig::default();
//! config.execution.mode = ExecutionMode::SingleThreaded;
//! config.execution.workers = Some(4);
//!
//! let problems = validate_config(&config).unwrap_err();
//! assert_eq!(problems, vec![ValidationError::SingleThreadedWorkers { requested: 4 }]);
//! ```

use crate::config::consts::MAX_WORKERS;
use crate::config::{ExecutionMode, RuntimeConfig};
use crate::errors::ValidationError;

/// Check a configuration, returning every problem found.
pub fn validate_config(config: &RuntimeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Some(workers) = config.execution.workers {
        if workers == 0 {
            errors.push(ValidationError::ZeroWorkers);
        } else if workers > MAX_WORKERS {
            errors.push(ValidationError::TooManyWorkers {
                requested: workers,
                maximum: MAX_WORKERS,
            });
        }
        if config.execution.mode == ExecutionMode::SingleThreaded && workers > 1 {
            errors.push(ValidationError::SingleThreadedWorkers { requested: workers });
        }
    }

    if config.memory.max_item_bytes == Some(0) {
        errors.push(ValidationError::ZeroItemLimit);
    }

    if config.logging.filter.trim().is_empty() {
        errors.push(ValidationError::EmptyLogFilter);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RuntimeConfig::default()).is_ok());
    }

    #[test]
    fn test_worker_bounds() {
        let mut config = RuntimeConfig::default();
        config.execution.workers = Some(MAX_WORKERS + 1);
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::TooManyWorkers {
                requested: MAX_WORKERS + 1,
                maximum: MAX_WORKERS
            }]
        );

        config.execution.workers = Some(MAX_WORKERS);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_single_threaded_with_one_worker_is_valid() {
        let mut config = RuntimeConfig::default();
        config.execution.mode = ExecutionMode::SingleThreaded;
        config.execution.workers = Some(1);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_problems() {
        let mut config = RuntimeConfig::default();
        config.execution.mode = ExecutionMode::SingleThreaded;
        config.execution.workers = Some(2000);
        config.memory.max_item_bytes = Some(0);
        config.logging.filter = "  ".to_string();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::SingleThreadedWorkers { requested: 2000 }));
        assert!(errors.contains(&ValidationError::EmptyLogFilter));
    }
}
