// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message is a plain struct that implements `Display` for the human
//! readable line and [`StructuredLog`] for emitting it with structured
//! fields at its fixed level.
//!
//! # Organization
//!
//! * `lifecycle` - context creation, launch, quiescence, finalization, failure
//! * `step` - prescription, demand, readiness and execution of step instances
//! * `item` - puts, subscriptions and reclamation of items
//! * `config` - configuration loading and validation
//!
//! # Usage Pattern
//!
//! ```rust
//! use the_cncwood::observability::messages::lifecycle::GraphLaunched;
//! use the_cncwood::observability::messages::StructuredLog;
//!
//! let msg = GraphLaunched {
//!     graph: "SimpleDemand",
//!     mode: "parallel",
//!     workers: 4,
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod config;
pub mod item;
pub mod lifecycle;
pub mod step;

/// A message that knows its level and structured fields.
pub trait StructuredLog {
    /// Emit the message at its level.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
