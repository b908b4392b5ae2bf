// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Steps that prescribe their successors.
//!
//! `T(i)` puts `V[i] = i` and prescribes `T(i - 1)`, so the instances fire
//! from `T(start)` down to `T(0)` in every execution mode. The finalizer
//! waits for `V[0]`.

use crate::demos::{discard, execute, Transcript};
use crate::engine::{ContextOptions, GraphRun};
use crate::errors::DefinitionError;
use crate::graph::GraphBuilder;
use crate::traits::GraphProgram;

pub const DEFAULT_START: i64 = 5;

pub struct Countdown {
    pub transcript: Transcript,
}

impl GraphProgram for Countdown {
    type Args = i64;
    /// Number of instances that fired.
    type Output = usize;

    fn name(&self) -> &str {
        "Countdown"
    }

    fn define(&self, g: &mut GraphBuilder<i64, usize>) {
        let v = g.item_collection::<i64, i64>("V");
        let t = g.step_collection::<i64>("T");

        let transcript = self.transcript.clone();
        g.step(&t)
            .produces(&v, |i| vec![*i])
            .body_fn(move |i, _, ctx| {
                transcript.line(format!("T({}) fired", i));
                v.put(ctx, *i, *i)?;
                if *i > 0 {
                    t.prescribe(ctx, i - 1)?;
                }
                Ok(())
            });

        g.initializer(move |start, ctx| {
            t.prescribe(ctx, start)?;
            ctx.await_finalizer(start)?;
            Ok(())
        });

        let transcript = self.transcript.clone();
        g.finalizer(
            move |_: &i64, deps| {
                deps.item(&v, 0);
            },
            move |start, _| {
                let fired = usize::try_from(*start + 1).unwrap_or(0);
                transcript.line("liftoff");
                Ok(fired)
            },
        );
    }
}

pub fn run(options: ContextOptions, transcript: &Transcript) -> Result<GraphRun<()>, DefinitionError> {
    let program = Countdown {
        transcript: transcript.clone(),
    };
    execute(&program, DEFAULT_START, options).map(discard)
}
