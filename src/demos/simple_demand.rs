// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The doubling chain.
//!
//! The initializer prescribes `S(0)` to `S(9)` and puts `X[0] = seed`.
//! `S(i)` reads `X[i]` and puts `X[i + 1] = 2 * X[i]`. The finalizer reads
//! `X[0]` and `X[10]` and reports the answer next to the value the seed
//! predicts, `seed * 2^10`.

use crate::demos::{discard, execute, Transcript};
use crate::engine::{ContextOptions, GraphRun};
use crate::errors::{DefinitionError, StepError};
use crate::graph::GraphBuilder;
use crate::traits::GraphProgram;

/// Number of doubling steps.
pub const LINKS: i64 = 10;
/// Value put as `X[0]` by the CLI.
pub const DEFAULT_SEED: i64 = -1;

pub struct SimpleDemand {
    pub transcript: Transcript,
}

impl GraphProgram for SimpleDemand {
    type Args = i64;
    type Output = i64;

    fn name(&self) -> &str {
        "SimpleDemand"
    }

    fn define(&self, g: &mut GraphBuilder<i64, i64>) {
        let x = g.item_collection::<i64, i64>("X");
        let s = g.step_collection::<i64>("S");
        // X[0] is read by S(0) and the finalizer; every later X[i] has one reader.
        g.get_count(&x, |i| if *i == 0 { 2 } else { 1 });

        let transcript = self.transcript.clone();
        g.step(&s)
            .dependencies(move |i, deps| {
                deps.item(&x, *i);
            })
            .produces(&x, |i| vec![i + 1])
            .body_fn(move |i, inputs, ctx| {
                let doubled = 2 * *inputs.get(&x, i)?;
                transcript.line(format!("just put {} as {}", i, doubled));
                x.put(ctx, i + 1, doubled)?;
                Ok(())
            });

        g.initializer(move |seed, ctx| {
            for i in 0..LINKS {
                s.prescribe(ctx, i)?;
            }
            x.put(ctx, 0, seed)?;
            ctx.await_finalizer(LINKS)?;
            Ok(())
        });

        let transcript = self.transcript.clone();
        g.finalizer(
            move |last: &i64, deps| {
                deps.item(&x, 0).item(&x, *last);
            },
            move |last, inputs| {
                let seed = *inputs.get(&x, &0)?;
                let answer = *inputs.get(&x, last)?;
                let expected = u32::try_from(*last)
                    .ok()
                    .and_then(|links| seed.checked_mul(1i64.checked_shl(links)?))
                    .ok_or_else(|| StepError::msg(format!("X[{}] overflows for seed {}", last, seed)))?;
                transcript.line(format!("final answer is {}, expected {}.", answer, expected));
                Ok(answer)
            },
        );
    }
}

pub fn run(options: ContextOptions, transcript: &Transcript) -> Result<GraphRun<()>, DefinitionError> {
    let program = SimpleDemand {
        transcript: transcript.clone(),
    };
    execute(&program, DEFAULT_SEED, options).map(discard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubling_chain_single_threaded() {
        let transcript = Transcript::silent();
        let program = SimpleDemand {
            transcript: transcript.clone(),
        };
        let run = execute(&program, -1, ContextOptions::single_threaded()).unwrap();
        assert_eq!(run.result.unwrap(), -1024);

        let lines = transcript.lines();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "just put 0 as -2");
        assert_eq!(lines[9], "just put 9 as -1024");
        assert_eq!(lines[10], "final answer is -1024, expected -1024.");
    }

    #[test]
    fn test_doubling_chain_parallel() {
        let program = SimpleDemand {
            transcript: Transcript::silent(),
        };
        let run = execute(&program, 3, ContextOptions::parallel(4)).unwrap();
        assert_eq!(run.result.unwrap(), 3072);
        assert_eq!(run.report.steps_completed, 10);
        assert_eq!(run.report.items_put, 11);
        assert_eq!(run.report.items_reclaimed, 11);
    }

    #[test]
    fn test_definition_shape() {
        let program = SimpleDemand {
            transcript: Transcript::silent(),
        };
        let definition = program.definition().unwrap();
        assert_eq!(definition.name(), "SimpleDemand");
        assert_eq!(definition.item_collections(), vec!["X"]);
        assert_eq!(definition.step_collections(), vec!["S"]);
    }
}
