// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use crate::engine::{ContextOptions, GraphContext, Phase, StepContext, StepInputs};
use crate::errors::{RuntimeError, StepError, StepResult};
use crate::graph::{GraphBuilder, GraphDefinition, ItemCollection};
use crate::store::ItemLookup;

/// End-to-end tests driving whole graphs through their lifecycle
#[cfg(test)]
mod tests {
    use super::*;

    /// S(i) reads X[i] and puts X[i + 1] = 2 * X[i]; the finalizer reads X[links].
    fn doubling_chain(links: i64) -> GraphDefinition<i64, i64> {
        let mut g = GraphBuilder::<i64, i64>::new("Doubling");
        let x = g.item_collection::<i64, i64>("X");
        let s = g.step_collection::<i64>("S");
        g.step(&s)
            .dependencies(move |i, deps| {
                deps.item(&x, *i);
            })
            .produces(&x, |i| vec![i + 1])
            .body_fn(move |i, inputs, ctx| {
                let v = *inputs.get(&x, i)?;
                x.put(ctx, i + 1, 2 * v)?;
                Ok(())
            });
        g.initializer(move |seed, ctx| {
            for i in 0..links {
                s.prescribe(ctx, i)?;
            }
            x.put(ctx, 0, seed)?;
            ctx.await_finalizer(links)?;
            Ok(())
        });
        g.finalizer(
            move |last: &i64, deps| {
                deps.item(&x, *last);
            },
            move |last, inputs| Ok(*inputs.get(&x, last)?),
        );
        g.build().unwrap()
    }

    /// One step collection S over i64 tags with the given body; the
    /// initializer prescribes S(0) and awaits a finalizer without inputs.
    fn single_step<F>(name: &str, body: F) -> GraphDefinition<(), ()>
    where
        F: Fn(&i64, &StepInputs<'_>, &mut StepContext<'_>, ItemCollection<i64, i64>) -> StepResult
            + Send
            + Sync
            + 'static,
    {
        let mut g = GraphBuilder::<(), ()>::new(name);
        let x = g.item_collection::<i64, i64>("X");
        let s = g.step_collection::<i64>("S");
        g.step(&s).body_fn(move |i, inputs, ctx| body(i, inputs, ctx, x));
        g.initializer(move |_, ctx| {
            s.prescribe(ctx, 0)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        g.build().unwrap()
    }

    fn run_single<A: Send + 'static, R: Send + 'static>(
        definition: &GraphDefinition<A, R>,
        args: A,
    ) -> Result<R, RuntimeError> {
        let mut context = GraphContext::create_with(definition, ContextOptions::single_threaded());
        let _ = context.launch(args);
        context.shutdown_on_finish()
    }

    #[test]
    fn test_doubling_chain_in_both_modes() {
        let definition = doubling_chain(10);
        assert_eq!(run_single(&definition, -1), Ok(-1024));

        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(4));
        context.launch(-1).unwrap();
        assert_eq!(context.phase(), Phase::Running);
        assert_eq!(context.shutdown_on_finish(), Ok(-1024));
    }

    #[test]
    fn test_contexts_share_one_definition() {
        let definition = doubling_chain(20);
        let handles: Vec<_> = (1..=4i64)
            .map(|seed| {
                let definition = definition.clone();
                std::thread::spawn(move || {
                    let mut context =
                        GraphContext::create_with(&definition, ContextOptions::parallel(2));
                    context.launch(seed).unwrap();
                    context.shutdown_on_finish()
                })
            })
            .collect();
        for (seed, handle) in (1..=4i64).zip(handles) {
            assert_eq!(handle.join().unwrap(), Ok(seed << 20));
        }
    }

    #[test]
    fn test_empty_graph_runs_finalizer_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut g = GraphBuilder::<(), i32>::new("Empty");
        g.initializer(|_, ctx| {
            ctx.await_finalizer(())?;
            Ok(())
        });
        let counter = calls.clone();
        g.finalizer(
            |_: &(), _| {},
            move |_, inputs| {
                assert!(inputs.is_empty());
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(0)
            },
        );
        let definition = g.build().unwrap();

        let mut context = GraphContext::create(&definition);
        context.launch(()).unwrap();
        let run = context.finish();
        assert_eq!(run.result, Ok(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(run.report.succeeded());
    }

    #[test]
    fn test_deadlock_is_reported_at_quiescence() {
        let mut g = GraphBuilder::<(), ()>::new("Deadlock");
        let y = g.item_collection::<i64, i64>("Y");
        let s = g.step_collection::<i64>("S");
        g.step(&s)
            .dependencies(move |i, deps| {
                deps.item(&y, *i);
            })
            .body_fn(|_, _, _| Ok(()));
        g.initializer(move |_, ctx| {
            s.prescribe(ctx, 0)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(2));
        context.launch(()).unwrap();
        let run = context.finish();
        let err = run.result.unwrap_err();
        assert_eq!(err.to_string(), "deadlock: Y[0] absent at quiescence");
        assert_eq!(err.exit_code(), crate::errors::runtime::EXIT_DEADLOCK);
        assert_eq!(run.report.outcome, "deadlock: Y[0] absent at quiescence");
    }

    #[test]
    fn test_absent_finalizer_input_is_a_deadlock() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut g = GraphBuilder::<(), ()>::new("FinalizerStall");
        let y = g.item_collection::<i64, i64>("Y");
        g.initializer(|_, ctx| {
            ctx.await_finalizer(())?;
            Ok(())
        });
        let counter = ran.clone();
        g.finalizer(
            move |_: &(), deps| {
                deps.item(&y, 0);
            },
            move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        let definition = g.build().unwrap();

        for options in [ContextOptions::single_threaded(), ContextOptions::parallel(2)] {
            let mut context = GraphContext::create_with(&definition, options);
            context.launch(()).unwrap();
            let run = context.finish();
            let err = run.result.unwrap_err();
            assert_eq!(err.to_string(), "deadlock: Y[0] absent at quiescence");
            assert_eq!(err.exit_code(), crate::errors::runtime::EXIT_DEADLOCK);
            assert_eq!(run.report.steps_completed, 0);
        }
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_double_put_aborts_the_graph() {
        let mut g = GraphBuilder::<(), ()>::new("DoublePut");
        let x = g.item_collection::<i64, i64>("X");
        let s = g.step_collection::<i64>("S");
        g.step(&s).body_fn(move |_, _, ctx| {
            x.put(ctx, 0, 2)?;
            Ok(())
        });
        g.initializer(move |_, ctx| {
            x.put(ctx, 0, 1)?;
            s.prescribe(ctx, 0)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        let err = run_single(&definition, ()).unwrap_err();
        assert_eq!(err.to_string(), "double put: X[0]");
    }

    #[test]
    fn test_fan_out_reclaims_shared_item_once() {
        const READERS: i64 = 1000;
        let fired = Arc::new(AtomicUsize::new(0));
        let mut g = GraphBuilder::<(), usize>::new("FanOut");
        let x = g.item_collection::<i64, i64>("X");
        let s = g.step_collection::<i64>("S");
        g.get_count(&x, |_| READERS as usize);
        let counter = fired.clone();
        g.step(&s)
            .dependencies(move |_, deps| {
                deps.item(&x, 0);
            })
            .body_fn(move |_, inputs, _| {
                assert_eq!(*inputs.get(&x, &0)?, 1);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        g.initializer(move |_, ctx| {
            x.put(ctx, 0, 1)?;
            for i in 0..READERS {
                s.prescribe(ctx, i)?;
            }
            ctx.await_finalizer(())?;
            Ok(())
        });
        let total = fired.clone();
        g.finalizer(|_: &(), _| {}, move |_, _| Ok(total.load(Ordering::SeqCst)));
        let definition = g.build().unwrap();

        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(8));
        context.launch(()).unwrap();
        let run = context.finish();
        assert_eq!(run.result, Ok(1000));
        assert_eq!(run.report.collections[0].name, "X");
        assert_eq!(run.report.collections[0].reclaimed, 1);
        assert_eq!(run.report.items_reclaimed, 1);
    }

    #[test]
    fn test_demand_prescribes_only_the_needed_producers() {
        let mut g = GraphBuilder::<(), i64>::new("Demand");
        let v = g.item_collection::<i64, i64>("V");
        let t = g.step_collection::<i64>("T");
        g.produced_by(&v, &t, |i| Some(*i));
        g.step(&t)
            .dependencies(move |i, deps| {
                if *i > 0 {
                    deps.item(&v, i - 1);
                }
            })
            .body_fn(move |i, inputs, ctx| {
                let below = if *i > 0 { *inputs.get(&v, &(i - 1))? } else { 0 };
                v.put(ctx, *i, below + 1)?;
                Ok(())
            });
        g.initializer(move |_, ctx| {
            t.prescribe(ctx, 5)?;
            ctx.await_finalizer(5i64)?;
            Ok(())
        });
        g.finalizer(
            move |top: &i64, deps| {
                deps.item(&v, *top);
            },
            move |top, inputs| Ok(*inputs.get(&v, top)?),
        );
        let definition = g.build().unwrap();

        let mut context = GraphContext::create_with(&definition, ContextOptions::single_threaded());
        context.launch(()).unwrap();
        let handle = context.handle();
        for i in 0..=5 {
            assert!(handle.is_prescribed(&t, &i).unwrap(), "T({}) not prescribed", i);
        }
        assert!(!handle.is_prescribed(&t, &6).unwrap());

        let run = context.finish();
        assert_eq!(run.result, Ok(6));
        assert_eq!(run.report.steps_demanded, 5);
    }

    #[test]
    fn test_prescribe_is_idempotent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let mut g = GraphBuilder::<(), ()>::new("Idempotent");
        let s = g.step_collection::<i64>("S");
        g.step(&s).body_fn(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        g.initializer(move |_, ctx| {
            s.prescribe(ctx, 0)?;
            s.prescribe(ctx, 0)?;
            s.prescribe(ctx, 0)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(4));
        context.launch(()).unwrap();
        let run = context.finish();
        assert!(run.result.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(run.report.steps_prescribed, 1);
    }

    #[test]
    fn test_single_threaded_runs_are_deterministic() {
        fn order() -> Vec<i64> {
            let seen = Arc::new(Mutex::new(Vec::new()));
            let log = seen.clone();
            let mut g = GraphBuilder::<(), ()>::new("Order");
            let x = g.item_collection::<i64, i64>("X");
            let s = g.step_collection::<i64>("S");
            g.step(&s)
                .dependencies(move |i, deps| {
                    deps.item(&x, i % 3);
                })
                .body_fn(move |i, _, _| {
                    log.lock().unwrap().push(*i);
                    Ok(())
                });
            g.initializer(move |_, ctx| {
                for i in (0..30).rev() {
                    s.prescribe(ctx, i)?;
                }
                for i in 0..3 {
                    x.put(ctx, i, i)?;
                }
                ctx.await_finalizer(())?;
                Ok(())
            });
            g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
            let definition = g.build().unwrap();
            run_single(&definition, ()).unwrap();
            let fired = seen.lock().unwrap().clone();
            fired
        }

        let first = order();
        assert_eq!(first.len(), 30);
        assert_eq!(first, order());
        assert_eq!(order(), first);
    }

    #[test]
    fn test_environment_put_satisfies_waiting_step() {
        let mut g = GraphBuilder::<(), i64>::new("Environment");
        let x = g.item_collection::<i64, i64>("X");
        let y = g.item_collection::<i64, i64>("Y");
        let s = g.step_collection::<i64>("S");
        g.step(&s)
            .dependencies(move |i, deps| {
                deps.item(&x, *i);
            })
            .produces(&y, |i| vec![*i])
            .body_fn(move |i, inputs, ctx| {
                y.put(ctx, *i, *inputs.get(&x, i)? + 1)?;
                Ok(())
            });
        g.initializer(move |_, ctx| {
            s.prescribe(ctx, 0)?;
            ctx.await_finalizer(0i64)?;
            Ok(())
        });
        g.finalizer(
            move |i: &i64, deps| {
                deps.item(&y, *i);
            },
            move |i, inputs| Ok(*inputs.get(&y, i)?),
        );
        let definition = g.build().unwrap();

        let mut context = GraphContext::create_with(&definition, ContextOptions::single_threaded());
        context.launch(()).unwrap();
        let handle = context.handle();
        assert!(matches!(handle.get(&x, &0).unwrap(), ItemLookup::Absent));
        handle.put(&x, 0, 41).unwrap();
        assert_eq!(handle.get(&x, &0).unwrap().value().as_deref(), Some(&41));

        assert_eq!(context.shutdown_on_finish(), Ok(42));
        assert_eq!(
            handle.put(&x, 1, 1),
            Err(RuntimeError::GraphClosed {
                operation: "put".into()
            })
        );
        assert_eq!(
            handle.prescribe(&s, 1),
            Err(RuntimeError::GraphClosed {
                operation: "prescribe".into()
            })
        );
    }

    #[test]
    fn test_abort_cancels_the_graph() {
        let definition = doubling_chain(10);
        let mut context = GraphContext::create_with(&definition, ContextOptions::single_threaded());
        context.launch(-1).unwrap();
        let abort = context.abort_handle();
        abort.abort();
        assert!(abort.is_aborted());

        let run = context.finish();
        assert_eq!(
            run.result,
            Err(RuntimeError::Cancelled {
                reason: "aborted by request".into()
            })
        );
        assert_eq!(run.report.steps_completed, 0);
    }

    #[test]
    fn test_external_cancellation_token() {
        let token = CancellationToken::new();
        let definition = doubling_chain(10);
        let options = ContextOptions::parallel(2).with_cancellation(token.clone());
        let mut context = GraphContext::create_with(&definition, options);
        token.cancel();
        context.launch(-1).unwrap();
        let err = context.shutdown_on_finish().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::Cancelled {
                reason: "cancellation requested".into()
            }
        );
        assert_eq!(err.exit_code(), crate::errors::runtime::EXIT_CANCELLED);
    }

    #[test]
    fn test_missing_declared_output() {
        let mut g = GraphBuilder::<(), ()>::new("Missing");
        let x = g.item_collection::<i64, i64>("X");
        let s = g.step_collection::<i64>("S");
        g.step(&s)
            .produces(&x, |i| vec![i + 1])
            .body_fn(|_, _, _| Ok(()));
        g.initializer(move |_, ctx| {
            s.prescribe(ctx, 0)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        assert_eq!(
            run_single(&definition, ()),
            Err(RuntimeError::MissingOutput {
                step: "S(0)".into(),
                item: "X[1]".into()
            })
        );
    }

    #[test]
    fn test_undeclared_input() {
        let definition = single_step("Undeclared", |_, inputs, _, x| {
            inputs.get(&x, &1)?;
            Ok(())
        });
        assert_eq!(
            run_single(&definition, ()),
            Err(RuntimeError::UndeclaredInput {
                step: "S(0)".into(),
                item: "X[1]".into()
            })
        );
    }

    #[test]
    fn test_step_failure_names_the_instance() {
        let definition = single_step("Failing", |i, _, _, _| {
            Err(StepError::msg(format!("cannot handle {}", i)))
        });
        assert_eq!(
            run_single(&definition, ()),
            Err(RuntimeError::StepFailed {
                step: "S(0)".into(),
                reason: "cannot handle 0".into()
            })
        );
    }

    #[test]
    fn test_panicking_step_is_an_internal_failure() {
        let definition = single_step("Panicking", |_, _, _, _| panic!("boom"));
        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(2));
        context.launch(()).unwrap();
        let err = context.shutdown_on_finish().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::StepPanicked {
                step: "S(0)".into(),
                message: "boom".into()
            }
        );
        assert_eq!(err.exit_code(), crate::errors::runtime::EXIT_INTERNAL);
    }

    /// S(0) prescribes S(1), whose dependence function panics.
    fn panicking_dependencies() -> GraphDefinition<(), ()> {
        let mut g = GraphBuilder::<(), ()>::new("PanickyDeps");
        let x = g.item_collection::<i64, i64>("X");
        let s = g.step_collection::<i64>("S");
        g.step(&s)
            .dependencies(move |i, deps| {
                if *i == 1 {
                    panic!("no inputs for S(1)");
                }
                deps.item(&x, *i);
            })
            .body_fn(move |i, _, ctx| {
                s.prescribe(ctx, i + 1)?;
                Ok(())
            });
        g.initializer(move |_, ctx| {
            x.put(ctx, 0, 1)?;
            s.prescribe(ctx, 0)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        g.build().unwrap()
    }

    #[test]
    fn test_panicking_dependence_function_fails_the_graph() {
        let expected = RuntimeError::StepPanicked {
            step: "S(0)".into(),
            message: "no inputs for S(1)".into(),
        };
        let definition = panicking_dependencies();
        assert_eq!(run_single(&definition, ()), Err(expected.clone()));

        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(2));
        context.launch(()).unwrap();
        let err = context.shutdown_on_finish().unwrap_err();
        assert_eq!(err, expected);
        assert_eq!(err.exit_code(), crate::errors::runtime::EXIT_INTERNAL);
    }

    #[test]
    fn test_panicking_get_count_in_initializer() {
        let mut g = GraphBuilder::<(), ()>::new("PanickyCount");
        let x = g.item_collection::<i64, i64>("X");
        g.get_count(&x, |_| panic!("no count"));
        g.initializer(move |_, ctx| {
            x.put(ctx, 0, 1)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(2));
        assert!(context.launch(()).is_err());
        assert_eq!(
            context.shutdown_on_finish(),
            Err(RuntimeError::StepPanicked {
                step: "initializer".into(),
                message: "no count".into()
            })
        );
    }

    #[test]
    fn test_failed_step_commits_nothing() {
        let mut g = GraphBuilder::<(), ()>::new("Atomic");
        let x = g.item_collection::<i64, i64>("X");
        let s = g.step_collection::<i64>("S");
        let t = g.step_collection::<i64>("T");
        g.step(&s).body_fn(move |_, _, ctx| {
            x.put(ctx, 0, 1)?;
            Err(StepError::msg("late failure"))
        });
        g.step(&t)
            .dependencies(move |_, deps| {
                deps.item(&x, 0);
            })
            .body_fn(|_, _, _| panic!("T must not run"));
        g.initializer(move |_, ctx| {
            s.prescribe(ctx, 0)?;
            t.prescribe(ctx, 0)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        let mut context = GraphContext::create_with(&definition, ContextOptions::single_threaded());
        context.launch(()).unwrap();
        let run = context.finish();
        assert!(matches!(run.result, Err(RuntimeError::StepFailed { .. })));
        assert_eq!(run.report.items_put, 0);
    }

    #[test]
    fn test_read_after_reclaim() {
        let mut g = GraphBuilder::<(), ()>::new("Reclaim");
        let x = g.item_collection::<i64, i64>("X");
        let y = g.item_collection::<i64, i64>("Y");
        let a = g.step_collection::<i64>("A");
        let b = g.step_collection::<i64>("B");
        let c = g.step_collection::<i64>("C");
        g.get_count(&x, |_| 1);
        g.step(&a)
            .dependencies(move |i, deps| {
                deps.item(&x, *i);
            })
            .body_fn(move |i, _, ctx| {
                y.put(ctx, *i, 0)?;
                Ok(())
            });
        g.step(&b)
            .dependencies(move |i, deps| {
                deps.item(&y, *i);
            })
            .body_fn(move |i, _, ctx| {
                c.prescribe(ctx, *i)?;
                Ok(())
            });
        g.step(&c)
            .dependencies(move |i, deps| {
                deps.item(&x, *i);
            })
            .body_fn(|_, _, _| Ok(()));
        g.initializer(move |_, ctx| {
            x.put(ctx, 0, 7)?;
            a.prescribe(ctx, 0)?;
            b.prescribe(ctx, 0)?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        assert_eq!(
            run_single(&definition, ()),
            Err(RuntimeError::ReadAfterReclaim { item: "X[0]".into() })
        );
    }

    #[test]
    fn test_duplicate_await() {
        let mut g = GraphBuilder::<(), ()>::new("TwiceAwaited");
        g.initializer(|_, ctx| {
            ctx.await_finalizer(())?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        let mut context = GraphContext::create_with(&definition, ContextOptions::single_threaded());
        let expected = RuntimeError::DuplicateAwait {
            graph: "TwiceAwaited".into(),
        };
        assert_eq!(context.launch(()), Err(expected.clone()));
        assert_eq!(context.shutdown_on_finish(), Err(expected));
    }

    #[test]
    fn test_await_with_wrong_tag_type() {
        let mut g = GraphBuilder::<(), ()>::new("WrongTag");
        g.initializer(|_, ctx| {
            ctx.await_finalizer(String::from("done"))?;
            Ok(())
        });
        g.finalizer(|_: &i64, _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        assert!(matches!(
            run_single(&definition, ()),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_finalizer_never_awaited() {
        let mut g = GraphBuilder::<(), ()>::new("NeverAwaited");
        g.initializer(|_, _| Ok(()));
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        assert_eq!(
            run_single(&definition, ()),
            Err(RuntimeError::FinalizerNotAwaited {
                graph: "NeverAwaited".into()
            })
        );
    }

    #[test]
    fn test_item_alloc_respects_the_limit() {
        let build = |size: usize| {
            let mut g = GraphBuilder::<(), usize>::new("Alloc");
            let b = g.item_collection::<i64, Vec<u8>>("B");
            let s = g.step_collection::<i64>("S");
            g.step(&s)
                .produces(&b, |i| vec![*i])
                .body_fn(move |i, _, ctx| {
                    let mut buffer = ctx.item_alloc(size)?;
                    buffer.fill(0xab);
                    b.put(ctx, *i, buffer)?;
                    Ok(())
                });
            g.initializer(move |_, ctx| {
                s.prescribe(ctx, 0)?;
                ctx.await_finalizer(0i64)?;
                Ok(())
            });
            g.finalizer(
                move |i: &i64, deps| {
                    deps.item(&b, *i);
                },
                move |i, inputs| {
                    let bytes = inputs.get(&b, i)?;
                    assert!(bytes.iter().all(|&byte| byte == 0xab));
                    Ok(bytes.len())
                },
            );
            g.build().unwrap()
        };

        let options = ContextOptions::single_threaded().with_max_item_bytes(16);
        let mut context = GraphContext::create_with(&build(16), options.clone());
        context.launch(()).unwrap();
        assert_eq!(context.shutdown_on_finish(), Ok(16));

        let mut context = GraphContext::create_with(&build(64), options);
        context.launch(()).unwrap();
        let err = context.shutdown_on_finish().unwrap_err();
        assert_eq!(
            err,
            RuntimeError::AllocationFailed {
                requested: 64,
                limit: Some(16)
            }
        );
        assert_eq!(err.exit_code(), crate::errors::runtime::EXIT_ALLOCATION_FAILURE);
    }

    #[test]
    fn test_handle_from_other_definition_is_a_type_mismatch() {
        let mut other = GraphBuilder::<(), ()>::new("Other");
        let strings = other.item_collection::<String, String>("Names");

        let mut g = GraphBuilder::<(), ()>::new("Mine");
        let _numbers = g.item_collection::<i64, i64>("X");
        g.initializer(move |_, ctx| {
            strings.put(ctx, "a".to_string(), "b".to_string())?;
            ctx.await_finalizer(())?;
            Ok(())
        });
        g.finalizer(|_: &(), _| {}, |_, _| Ok(()));
        let definition = g.build().unwrap();

        assert!(matches!(
            run_single(&definition, ()),
            Err(RuntimeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_launch_twice_is_rejected() {
        let definition = doubling_chain(1);
        let mut context = GraphContext::create_with(&definition, ContextOptions::single_threaded());
        assert_eq!(context.phase(), Phase::Created);
        context.launch(1).unwrap();
        assert!(matches!(
            context.launch(1),
            Err(RuntimeError::Internal { .. })
        ));
        assert_eq!(context.shutdown_on_finish(), Ok(2));
    }

    #[test]
    fn test_dropping_a_running_context_stops_its_workers() {
        let definition = doubling_chain(10);
        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(2));
        context.launch(1).unwrap();
        drop(context);
    }

    #[tokio::test]
    async fn test_shutdown_on_finish_async() {
        let definition = doubling_chain(10);
        let mut context = GraphContext::create_with(&definition, ContextOptions::parallel(2));
        context.launch(-1).unwrap();
        assert_eq!(context.shutdown_on_finish_async().await, Ok(-1024));
    }

    #[tokio::test]
    async fn test_finish_async_reports_failures() {
        let definition = single_step("AsyncFailure", |_, _, _, _| Err(StepError::msg("nope")));
        let mut context = GraphContext::create_with(&definition, ContextOptions::single_threaded());
        context.launch(()).unwrap();
        let run = context.finish_async().await;
        assert_eq!(run.report.outcome, "step failed: S(0): nope");
        assert!(!run.report.succeeded());
    }
}
