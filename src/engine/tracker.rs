// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dependence tracker: decides when a prescribed instance becomes ready.
//!
//! Each instance keeps an atomic count of inputs it still waits for, armed
//! with one extra registration slot. Subscriptions that find their item
//! present and the release of the registration slot both decrement it, as
//! does every put that wakes the instance. Whoever brings the count to
//! zero hands the instance to the scheduler, so it fires exactly once.

use std::sync::Arc;

use crate::engine::registry::{InstanceKind, InstanceState, StepInstance};
use crate::errors::RuntimeError;
use crate::observability::messages::item::ItemAwaited;
use crate::observability::messages::step::StepReady;
use crate::observability::messages::StructuredLog;
use crate::store::{Demand, InputRef, ItemStore, Subscription, Waiter};

/// Outcome of registering an instance's inputs.
pub(crate) struct Registration {
    /// All inputs were present; the instance is ready now.
    pub(crate) ready: bool,
    /// Declared producers of absent inputs, with the label of the item
    /// that needs them.
    pub(crate) demands: Vec<(Demand, String)>,
}

/// A still-absent input of a waiting instance.
pub(crate) struct MissingInput {
    pub(crate) item: String,
    pub(crate) producer: Option<Demand>,
}

pub(crate) struct DependenceTracker;

impl DependenceTracker {
    /// Subscribe `instance` to each of `inputs`.
    ///
    /// Returns whether the instance is ready. A finalizer is never reported
    /// ready; it stays parked until the controller runs it.
    pub(crate) fn register(
        store: &ItemStore,
        instance: &Arc<StepInstance>,
        inputs: Vec<Box<dyn InputRef>>,
    ) -> Result<Registration, RuntimeError> {
        let inputs = instance.arm(inputs)?;
        let mut satisfied = 1;
        let mut demands = Vec::new();
        for input in inputs {
            match input.subscribe(store, instance)? {
                Subscription::Satisfied => satisfied += 1,
                Subscription::Waiting { demand } => {
                    let item = input.label(store);
                    ItemAwaited {
                        item: &item,
                        step: instance.label(),
                    }
                    .log();
                    if let Some(demand) = demand {
                        demands.push((demand, item));
                    }
                }
            }
        }
        let ready = instance.satisfy(satisfied) && Self::mark_ready(instance);
        Ok(Registration { ready, demands })
    }

    /// Wake the waiters of a freshly put item. Returns the instances that
    /// became ready, in registration order.
    pub(crate) fn notify(waiters: Vec<Waiter>) -> Vec<Arc<StepInstance>> {
        waiters
            .into_iter()
            .filter(|waiter| waiter.satisfy(1) && Self::mark_ready(waiter))
            .collect()
    }

    /// Release one consumer on every input of a finished instance. Returns
    /// how many items that reclaimed.
    pub(crate) fn complete(store: &ItemStore, instance: &StepInstance) -> usize {
        instance
            .inputs()
            .iter()
            .filter(|input| input.release(store))
            .count()
    }

    /// Inputs of `instance` that are still absent.
    pub(crate) fn missing_inputs(store: &ItemStore, instance: &StepInstance) -> Vec<MissingInput> {
        instance
            .inputs()
            .iter()
            .filter(|input| !input.is_present(store))
            .map(|input| MissingInput {
                item: input.label(store),
                producer: input.producer(store),
            })
            .collect()
    }

    fn mark_ready(instance: &StepInstance) -> bool {
        if instance.kind() == InstanceKind::Finalizer {
            return false;
        }
        let ready = instance.advance(InstanceState::Prescribed, InstanceState::Ready);
        if ready {
            StepReady {
                step: instance.label(),
            }
            .log();
        }
        ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::definition::{ItemSpec, ItemSpecErased};
    use crate::graph::{CollectionId, StepId};
    use crate::store::TypedInput;

    fn store() -> ItemStore {
        let specs: Vec<Arc<dyn ItemSpecErased>> = vec![Arc::new(ItemSpec::<i64, i64>::new("X".into()))];
        ItemStore::new(&specs)
    }

    fn instance(label: &str) -> Arc<StepInstance> {
        Arc::new(StepInstance::new(
            InstanceKind::Step(StepId(0)),
            label.to_string(),
            Box::new(0i64),
        ))
    }

    fn inputs(tags: &[i64]) -> Vec<Box<dyn InputRef>> {
        tags.iter()
            .map(|&tag| Box::new(TypedInput::<i64, i64>::new(CollectionId(0), tag)) as Box<dyn InputRef>)
            .collect()
    }

    #[test]
    fn test_no_inputs_is_ready_immediately() {
        let store = store();
        let s = instance("S(0)");
        let registration = DependenceTracker::register(&store, &s, Vec::new()).unwrap();
        assert!(registration.ready);
        assert_eq!(s.state(), InstanceState::Ready);
    }

    #[test]
    fn test_fires_once_when_last_input_arrives() {
        let store = store();
        let x = store.table::<i64, i64>(CollectionId(0)).unwrap();
        x.put(0, Arc::new(10)).unwrap();

        let s = instance("S(1)");
        let registration = DependenceTracker::register(&store, &s, inputs(&[0, 1, 2])).unwrap();
        assert!(!registration.ready);
        assert_eq!(s.pending(), 2);

        let woken = DependenceTracker::notify(x.put(1, Arc::new(11)).unwrap());
        assert!(woken.is_empty());
        let woken = DependenceTracker::notify(x.put(2, Arc::new(12)).unwrap());
        assert_eq!(woken.len(), 1);
        assert_eq!(woken[0].label(), "S(1)");

        let missing = DependenceTracker::missing_inputs(&store, &s);
        assert!(missing.is_empty());
    }

    #[test]
    fn test_finalizer_is_never_reported_ready() {
        let store = store();
        let f = Arc::new(StepInstance::new(
            InstanceKind::Finalizer,
            "finalizer(())".into(),
            Box::new(()),
        ));
        let registration = DependenceTracker::register(&store, &f, Vec::new()).unwrap();
        assert!(!registration.ready);
        assert_eq!(f.pending(), 0);
        assert_eq!(f.state(), InstanceState::Prescribed);
    }

    #[test]
    fn test_missing_inputs_are_labelled() {
        let store = store();
        let s = instance("S(5)");
        DependenceTracker::register(&store, &s, inputs(&[5])).unwrap();
        let missing = DependenceTracker::missing_inputs(&store, &s);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].item, "X[5]");
        assert!(missing[0].producer.is_none());
    }

    #[test]
    fn test_complete_releases_inputs() {
        let store = store();
        let x = store.table::<i64, i64>(CollectionId(0)).unwrap();
        x.put(0, Arc::new(1)).unwrap();
        let s = instance("S(0)");
        DependenceTracker::register(&store, &s, inputs(&[0])).unwrap();
        assert_eq!(DependenceTracker::complete(&store, &s), 0);
        assert!(x.reclaim(&0));
    }
}
