// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One item read by many steps.
//!
//! `X[0]` declares a get count equal to the number of readers, so it is
//! reclaimed exactly once, right after the last `S(i)` completes.

use crate::demos::{discard, execute, Transcript};
use crate::engine::{ContextOptions, GraphRun};
use crate::errors::DefinitionError;
use crate::graph::GraphBuilder;
use crate::traits::GraphProgram;

pub const DEFAULT_READERS: i64 = 1000;

pub struct FanOut {
    pub readers: i64,
    pub transcript: Transcript,
}

impl GraphProgram for FanOut {
    /// Value of `X[0]`.
    type Args = i64;
    /// Sum of every `Y[i]`.
    type Output = i64;

    fn name(&self) -> &str {
        "FanOut"
    }

    fn define(&self, g: &mut GraphBuilder<i64, i64>) {
        let readers = self.readers;
        let x = g.item_collection::<i64, i64>("X");
        let y = g.item_collection::<i64, i64>("Y");
        let s = g.step_collection::<i64>("S");
        g.get_count(&x, move |_| readers as usize);

        g.step(&s)
            .dependencies(move |_, deps| {
                deps.item(&x, 0);
            })
            .produces(&y, |i| vec![*i])
            .body_fn(move |i, inputs, ctx| {
                let shared = *inputs.get(&x, &0)?;
                y.put(ctx, *i, shared + i)?;
                Ok(())
            });

        g.initializer(move |value, ctx| {
            x.put(ctx, 0, value)?;
            for i in 0..readers {
                s.prescribe(ctx, i)?;
            }
            ctx.await_finalizer(readers)?;
            Ok(())
        });

        let transcript = self.transcript.clone();
        g.finalizer(
            move |count: &i64, deps| {
                deps.items(&y, 0..*count);
            },
            move |count, inputs| {
                let mut sum = 0;
                for i in 0..*count {
                    sum += *inputs.get(&y, &i)?;
                }
                transcript.line(format!("{} readers of X[0], sum of Y is {}", count, sum));
                Ok(sum)
            },
        );
    }
}

pub fn run(options: ContextOptions, transcript: &Transcript) -> Result<GraphRun<()>, DefinitionError> {
    let program = FanOut {
        readers: DEFAULT_READERS,
        transcript: transcript.clone(),
    };
    execute(&program, 1, options).map(discard)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection<'a>(
        report: &'a crate::engine::RunReport,
        name: &str,
    ) -> &'a crate::store::CollectionReport {
        report
            .collections
            .iter()
            .find(|c| c.name == name)
            .unwrap()
    }

    #[test]
    fn test_every_reader_fires_and_x_is_reclaimed_once() {
        let program = FanOut {
            readers: DEFAULT_READERS,
            transcript: Transcript::silent(),
        };
        let run = execute(&program, 1, ContextOptions::parallel(4)).unwrap();
        assert_eq!(run.result.unwrap(), 1000 + 999 * 1000 / 2);
        assert_eq!(run.report.steps_completed, 1000);

        let x = collection(&run.report, "X");
        assert_eq!(x.puts, 1);
        assert_eq!(x.reclaimed, 1);
        let y = collection(&run.report, "Y");
        assert_eq!(y.puts, 1000);
        assert_eq!(y.reclaimed, 1000);
    }

    #[test]
    fn test_small_fan_out_single_threaded() {
        let transcript = Transcript::silent();
        let program = FanOut {
            readers: 3,
            transcript: transcript.clone(),
        };
        let run = execute(&program, 10, ContextOptions::single_threaded()).unwrap();
        assert_eq!(run.result.unwrap(), 33);
        assert_eq!(transcript.lines(), vec!["3 readers of X[0], sum of Y is 33"]);
    }
}
