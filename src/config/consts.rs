// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Upper bound for `execution.workers`
pub const MAX_WORKERS: usize = 1024;
/// Worker count used when the available parallelism cannot be determined
pub const FALLBACK_WORKERS: usize = 4;
/// Log filter used when `logging.filter` is not configured
pub const DEFAULT_LOG_FILTER: &str = "info";
