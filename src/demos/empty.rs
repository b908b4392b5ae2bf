// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! A graph without collections. The initializer only awaits the finalizer,
//! which runs once with no inputs.

use crate::demos::{discard, execute, Transcript};
use crate::engine::{ContextOptions, GraphRun};
use crate::errors::DefinitionError;
use crate::graph::GraphBuilder;
use crate::traits::GraphProgram;

pub struct Empty {
    pub transcript: Transcript,
}

impl GraphProgram for Empty {
    type Args = ();
    /// Status reported by the finalizer.
    type Output = i32;

    fn name(&self) -> &str {
        "Empty"
    }

    fn define(&self, g: &mut GraphBuilder<(), i32>) {
        g.initializer(|_, ctx| {
            ctx.await_finalizer(())?;
            Ok(())
        });

        let transcript = self.transcript.clone();
        g.finalizer(
            |_: &(), _| {},
            move |_, inputs| {
                transcript.line(format!("finalizer ran with {} inputs", inputs.len()));
                Ok(0)
            },
        );
    }
}

pub fn run(options: ContextOptions, transcript: &Transcript) -> Result<GraphRun<()>, DefinitionError> {
    let program = Empty {
        transcript: transcript.clone(),
    };
    execute(&program, (), options).map(discard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalizer_runs_once() {
        let transcript = Transcript::silent();
        let program = Empty {
            transcript: transcript.clone(),
        };
        let run = execute(&program, (), ContextOptions::parallel(2)).unwrap();
        assert_eq!(run.result.unwrap(), 0);
        assert_eq!(transcript.lines(), vec!["finalizer ran with 0 inputs"]);
        assert_eq!(run.report.steps_completed, 0);
        assert_eq!(run.report.items_put, 0);
    }
}
