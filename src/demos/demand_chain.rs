// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Demand-driven prescription.
//!
//! `V[i]` is produced by `T(i)`. `T(i)` reads `V[i - 1]` and puts
//! `V[i] = V[i - 1] + i`; `T(0)` reads nothing and puts `V[0] = 0`. Only
//! `T(top)` is prescribed by the initializer: subscribing to the absent
//! `V[top - 1]` prescribes `T(top - 1)`, and so on down to `T(0)`.

use crate::demos::{discard, execute, Transcript};
use crate::engine::{ContextOptions, GraphRun};
use crate::errors::DefinitionError;
use crate::graph::GraphBuilder;
use crate::traits::GraphProgram;

pub const DEFAULT_TOP: i64 = 5;

pub struct DemandChain {
    pub transcript: Transcript,
}

impl GraphProgram for DemandChain {
    /// Tag of the only prescribed instance.
    type Args = i64;
    type Output = i64;

    fn name(&self) -> &str {
        "DemandChain"
    }

    fn define(&self, g: &mut GraphBuilder<i64, i64>) {
        let v = g.item_collection::<i64, i64>("V");
        let t = g.step_collection::<i64>("T");
        g.produced_by(&v, &t, |i| (*i >= 0).then_some(*i));

        let transcript = self.transcript.clone();
        g.step(&t)
            .dependencies(move |i, deps| {
                if *i > 0 {
                    deps.item(&v, i - 1);
                }
            })
            .produces(&v, |i| vec![*i])
            .body_fn(move |i, inputs, ctx| {
                let below = if *i > 0 { *inputs.get(&v, &(i - 1))? } else { 0 };
                transcript.line(format!("T({}) fired", i));
                v.put(ctx, *i, below + i)?;
                Ok(())
            });

        g.initializer(move |top, ctx| {
            t.prescribe(ctx, top)?;
            ctx.await_finalizer(top)?;
            Ok(())
        });

        g.finalizer(
            move |top: &i64, deps| {
                deps.item(&v, *top);
            },
            move |top, inputs| Ok(*inputs.get(&v, top)?),
        );
    }
}

pub fn run(options: ContextOptions, transcript: &Transcript) -> Result<GraphRun<()>, DefinitionError> {
    let program = DemandChain {
        transcript: transcript.clone(),
    };
    let run = execute(&program, DEFAULT_TOP, options)?;
    if let Ok(total) = &run.result {
        transcript.line(format!("V[{}] = {}", DEFAULT_TOP, total));
    }
    Ok(discard(run))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RuntimeError;

    #[test]
    fn test_producers_are_prescribed_on_demand() {
        let transcript = Transcript::silent();
        let program = DemandChain {
            transcript: transcript.clone(),
        };
        let run = execute(&program, 5, ContextOptions::single_threaded()).unwrap();
        assert_eq!(run.result.unwrap(), 15);
        assert_eq!(run.report.steps_prescribed, 6);
        assert_eq!(run.report.steps_demanded, 5);
        assert_eq!(
            transcript.lines(),
            vec!["T(0) fired", "T(1) fired", "T(2) fired", "T(3) fired", "T(4) fired", "T(5) fired"]
        );
    }

    #[test]
    fn test_long_chain_in_parallel() {
        let program = DemandChain {
            transcript: Transcript::silent(),
        };
        let run = execute(&program, 20_000, ContextOptions::parallel(4)).unwrap();
        assert_eq!(run.result.unwrap(), 20_000 * 20_001 / 2);
        assert_eq!(run.report.steps_demanded, 20_000);
    }

    #[test]
    fn test_without_auto_prescribe_the_producer_is_reported() {
        let program = DemandChain {
            transcript: Transcript::silent(),
        };
        let options = ContextOptions::single_threaded().with_auto_prescribe(false);
        let run = execute(&program, 5, options).unwrap();
        assert_eq!(
            run.result.unwrap_err(),
            RuntimeError::UnprescribedProducer {
                item: "V[4]".into(),
                producer: "T(4)".into(),
            }
        );
    }
}
