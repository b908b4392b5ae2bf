// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Demonstration graphs run by the `cncwood` binary.
//!
//! Each demo is a [`GraphProgram`] plus a `run` function that creates a
//! context, launches it and waits for the result. Output lines go to a
//! [`Transcript`] so tests can check them and the CLI can echo them.

pub mod countdown;
pub mod demand_chain;
pub mod empty;
pub mod fan_out;
pub mod simple_demand;

use std::sync::{Arc, Mutex};

use crate::engine::{ContextOptions, GraphContext, GraphRun};
use crate::errors::DefinitionError;
use crate::traits::GraphProgram;
use crate::utils::sync::lock;

/// Lines printed by a running graph, shared between its steps.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
    echo: bool,
}

impl Transcript {
    /// A transcript that also prints every line to stdout.
    pub fn echo() -> Self {
        Self {
            lines: Arc::default(),
            echo: true,
        }
    }

    pub fn silent() -> Self {
        Self::default()
    }

    pub fn line(&self, line: impl Into<String>) {
        let line = line.into();
        if self.echo {
            println!("{}", line);
        }
        lock(&self.lines).push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }
}

/// Runs one demo to completion with the given options.
pub type DemoFn = fn(ContextOptions, &Transcript) -> Result<GraphRun<()>, DefinitionError>;

/// A demo known to the CLI.
pub struct Demo {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    run: DemoFn,
}

impl Demo {
    pub fn run(
        &self,
        options: ContextOptions,
        transcript: &Transcript,
    ) -> Result<GraphRun<()>, DefinitionError> {
        (self.run)(options, transcript)
    }
}

impl std::fmt::Debug for Demo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demo").field("name", &self.name).finish()
    }
}

static DEMOS: [Demo; 5] = [
    Demo {
        name: "simple-demand",
        title: "SimpleDemand: linear doubling chain",
        description: "S(i) reads X[i] and puts X[i+1] = 2 * X[i]; the finalizer reads X[10]",
        run: simple_demand::run,
    },
    Demo {
        name: "fan-out",
        title: "Fan-out: one item, a thousand readers",
        description: "1000 instances of S read X[0], which is reclaimed after the last one",
        run: fan_out::run,
    },
    Demo {
        name: "demand-chain",
        title: "Demand chain: producers prescribed on demand",
        description: "Only T(5) is prescribed; its absent input V[4] pulls in T(4) down to T(0)",
        run: demand_chain::run,
    },
    Demo {
        name: "countdown",
        title: "Countdown: steps prescribing steps",
        description: "T(i) prescribes T(i-1), so T(5) down to T(0) fire in reverse order",
        run: countdown::run,
    },
    Demo {
        name: "empty",
        title: "Empty graph",
        description: "No steps; the finalizer runs once with no inputs",
        run: empty::run,
    },
];

/// Every demo, in the order `cncwood demos` lists them.
pub fn all() -> &'static [Demo] {
    &DEMOS
}

pub fn find(name: &str) -> Option<&'static Demo> {
    DEMOS.iter().find(|demo| demo.name == name)
}

/// Define `program`, launch it with `args` and wait for its result.
pub fn execute<P: GraphProgram>(
    program: &P,
    args: P::Args,
    options: ContextOptions,
) -> Result<GraphRun<P::Output>, DefinitionError> {
    let definition = program.definition()?;
    let mut context = GraphContext::create_with(&definition, options);
    // A failed launch has already failed the graph; `finish` reports it.
    let _ = context.launch(args);
    Ok(context.finish())
}

/// Drop the finalizer's value, keeping the outcome and the report.
pub(crate) fn discard<R>(run: GraphRun<R>) -> GraphRun<()> {
    GraphRun {
        result: run.result.map(|_| ()),
        report: run.report,
    }
}
