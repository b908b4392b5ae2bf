// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for step instances.
//!
//! Instances are identified by their `Name(tag)` label. All of these are
//! emitted once per instance, so they sit at `debug!` or `trace!`.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A step instance was prescribed.
///
/// # Log Level
/// `debug!` - Per-instance event
pub struct StepPrescribed<'a> {
    pub step: &'a str,
    pub inputs: usize,
}

impl Display for StepPrescribed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Prescribed {} with {} inputs", self.step, self.inputs)
    }
}

impl StructuredLog for StepPrescribed<'_> {
    fn log(&self) {
        tracing::debug!(step = self.step, inputs = self.inputs, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("step_prescribed", span_name = name, step = self.step)
    }
}

/// A step instance was prescribed because one of its outputs was needed.
///
/// # Log Level
/// `debug!` - Per-instance event
pub struct StepDemanded<'a> {
    pub step: &'a str,
    pub item: &'a str,
}

impl Display for StepDemanded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Demand for {} prescribed {}", self.item, self.step)
    }
}

impl StructuredLog for StepDemanded<'_> {
    fn log(&self) {
        tracing::debug!(step = self.step, item = self.item, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "step_demanded",
            span_name = name,
            step = self.step,
            item = self.item,
        )
    }
}

/// Every input of a step instance is present.
///
/// # Log Level
/// `trace!` - Scheduling detail
pub struct StepReady<'a> {
    pub step: &'a str,
}

impl Display for StepReady<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "{} is ready", self.step)
    }
}

impl StructuredLog for StepReady<'_> {
    fn log(&self) {
        tracing::trace!(step = self.step, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("step_ready", span_name = name, step = self.step)
    }
}

/// A worker picked up a step instance.
///
/// # Log Level
/// `trace!` - Scheduling detail
pub struct StepStarted<'a> {
    pub step: &'a str,
    pub inputs: usize,
}

impl Display for StepStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Running {} with {} inputs", self.step, self.inputs)
    }
}

impl StructuredLog for StepStarted<'_> {
    fn log(&self) {
        tracing::trace!(step = self.step, inputs = self.inputs, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("step", span_name = name, step = self.step)
    }
}

/// A step instance returned and its outputs were committed.
///
/// # Log Level
/// `debug!` - Per-instance event
pub struct StepCompleted<'a> {
    pub step: &'a str,
    pub puts: usize,
    pub prescriptions: usize,
    pub duration: Duration,
}

impl Display for StepCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} completed in {:?}: {} puts, {} prescriptions",
            self.step, self.duration, self.puts, self.prescriptions
        )
    }
}

impl StructuredLog for StepCompleted<'_> {
    fn log(&self) {
        tracing::debug!(
            step = self.step,
            puts = self.puts,
            prescriptions = self.prescriptions,
            duration_us = self.duration.as_micros() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "step_completed",
            span_name = name,
            step = self.step,
            duration = ?self.duration,
        )
    }
}
