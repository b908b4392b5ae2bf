// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and
//! operational logging of the runtime. Message types follow a struct-based
//! pattern with `Display` implementations so that log lines live in one
//! place and carry consistent structured fields.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::lifecycle` - context lifecycle events
//! * `messages::step` - step instance events
//! * `messages::item` - item events
//! * `messages::config` - configuration events
//!
//! # Usage
//!
//! ```rust
//! use the_cncwood::observability::messages::step::StepDemanded;
//! use the_cncwood::observability::messages::StructuredLog;
//!
//! StepDemanded {
//!     step: "T(3)",
//!     item: "V[3]",
//! }
//! .log();
//! ```

pub mod messages;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `filter`. Returns false when a global
/// subscriber was already installed (tests, embedding applications).
pub fn init_subscriber(filter: &str) -> bool {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_names(true),
        )
        .try_init()
        .is_ok()
}
