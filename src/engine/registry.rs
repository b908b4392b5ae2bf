// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Prescription registry: step instances and the per-collection tables
//! that own them.
//!
//! An instance is created by its first prescription and never again;
//! later prescriptions of the same tag are no-ops. Its state only moves
//! forward: `Prescribed -> Ready -> Running -> Complete`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use crate::engine::{StepContext, StepInputs};
use crate::errors::{RuntimeError, StepResult};
use crate::graph::definition::StepSpec;
use crate::graph::tag::{step_label, AnyTag};
use crate::graph::{Dependencies, StepId, Tag};
use crate::store::{InputRef, ItemStore};
use crate::utils::sync::lock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum InstanceState {
    Prescribed = 0,
    Ready = 1,
    Running = 2,
    Complete = 3,
}

impl InstanceState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => InstanceState::Prescribed,
            1 => InstanceState::Ready,
            2 => InstanceState::Running,
            _ => InstanceState::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InstanceKind {
    Step(StepId),
    Finalizer,
}

/// One prescribed step instance (or the awaited finalizer).
pub(crate) struct StepInstance {
    kind: InstanceKind,
    label: String,
    tag: AnyTag,
    inputs: OnceLock<Vec<Box<dyn InputRef>>>,
    pending: AtomicUsize,
    state: AtomicU8,
}

impl StepInstance {
    pub(crate) fn new(kind: InstanceKind, label: String, tag: AnyTag) -> Self {
        Self {
            kind,
            label,
            tag,
            inputs: OnceLock::new(),
            pending: AtomicUsize::new(0),
            state: AtomicU8::new(InstanceState::Prescribed as u8),
        }
    }

    pub(crate) fn kind(&self) -> InstanceKind {
        self.kind
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn tag(&self) -> &dyn Any {
        self.tag.as_ref()
    }

    pub(crate) fn inputs(&self) -> &[Box<dyn InputRef>] {
        self.inputs.get().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Attach the evaluated input list and arm the pending counter with
    /// one slot per input plus a registration guard.
    pub(crate) fn arm(&self, inputs: Vec<Box<dyn InputRef>>) -> Result<&[Box<dyn InputRef>], RuntimeError> {
        self.pending.store(inputs.len() + 1, Ordering::Release);
        self.inputs
            .set(inputs)
            .map_err(|_| RuntimeError::internal(format!("{} registered twice", self.label)))?;
        Ok(self.inputs())
    }

    /// Count `n` inputs as satisfied. True when this brought the pending
    /// count to zero.
    pub(crate) fn satisfy(&self, n: usize) -> bool {
        n > 0 && self.pending.fetch_sub(n, Ordering::AcqRel) == n
    }

    pub(crate) fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn state(&self) -> InstanceState {
        InstanceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`. Fails if another thread already moved it.
    pub(crate) fn advance(&self, from: InstanceState, to: InstanceState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl std::fmt::Debug for StepInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepInstance")
            .field("label", &self.label)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}

/// Result of a prescription.
pub(crate) enum Prescription {
    /// The instance did not exist and was created.
    Created(Arc<StepInstance>),
    /// The instance already existed; nothing happened.
    Existing,
}

pub(crate) struct StepTable<K> {
    spec: Arc<StepSpec<K>>,
    instances: Mutex<HashMap<K, Arc<StepInstance>>>,
}

impl<K: Tag> StepTable<K> {
    pub(crate) fn new(spec: Arc<StepSpec<K>>) -> Self {
        Self {
            spec,
            instances: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn prescribe(&self, tag: K) -> Prescription {
        let mut instances = lock(&self.instances);
        if instances.contains_key(&tag) {
            return Prescription::Existing;
        }
        let instance = Arc::new(StepInstance::new(
            InstanceKind::Step(self.spec.id),
            step_label(&self.spec.name, &tag),
            Box::new(tag.clone()),
        ));
        instances.insert(tag, instance.clone());
        Prescription::Created(instance)
    }

    pub(crate) fn is_prescribed(&self, tag: &K) -> bool {
        lock(&self.instances).contains_key(tag)
    }

    fn typed<'t>(&self, tag: &'t dyn Any) -> Result<&'t K, RuntimeError> {
        tag.downcast_ref::<K>().ok_or(RuntimeError::TypeMismatch {
            collection: self.spec.name.clone(),
            expected: std::any::type_name::<K>(),
        })
    }
}

/// A step table with its tag type erased.
pub(crate) trait ErasedStepTable: Send + Sync {
    fn name(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
    fn prescribe_any(&self, tag: AnyTag) -> Result<Prescription, RuntimeError>;
    fn is_prescribed_any(&self, tag: &dyn Any) -> bool;
    fn label_any(&self, tag: &dyn Any) -> String;
    /// Evaluate the dependence function of an instance.
    fn dependencies(
        &self,
        instance: &StepInstance,
        store: &ItemStore,
    ) -> Result<Vec<Box<dyn InputRef>>, RuntimeError>;
    fn run(
        &self,
        instance: &StepInstance,
        inputs: &StepInputs<'_>,
        ctx: &mut StepContext<'_>,
    ) -> StepResult;
    /// Label of the first declared output the instance did not stage.
    fn missing_output(&self, instance: &StepInstance, ctx: &StepContext<'_>) -> Option<String>;
    /// Instances still waiting for inputs.
    fn waiting(&self) -> Vec<Arc<StepInstance>>;
    /// Drop every instance (and with them their input lists).
    fn clear(&self);
}

impl<K: Tag> ErasedStepTable for StepTable<K> {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn prescribe_any(&self, tag: AnyTag) -> Result<Prescription, RuntimeError> {
        let tag = tag.downcast::<K>().map_err(|_| RuntimeError::TypeMismatch {
            collection: self.spec.name.clone(),
            expected: std::any::type_name::<K>(),
        })?;
        Ok(self.prescribe(*tag))
    }

    fn is_prescribed_any(&self, tag: &dyn Any) -> bool {
        tag.downcast_ref::<K>()
            .map(|tag| self.is_prescribed(tag))
            .unwrap_or(false)
    }

    fn label_any(&self, tag: &dyn Any) -> String {
        match tag.downcast_ref::<K>() {
            Some(tag) => step_label(&self.spec.name, tag),
            None => format!("{}(?)", self.spec.name),
        }
    }

    fn dependencies(
        &self,
        instance: &StepInstance,
        store: &ItemStore,
    ) -> Result<Vec<Box<dyn InputRef>>, RuntimeError> {
        let tag = self.typed(instance.tag())?;
        let mut deps = Dependencies::new(store);
        if let Some(f) = &self.spec.dependencies {
            f(tag, &mut deps);
        }
        deps.finish()
    }

    fn run(
        &self,
        instance: &StepInstance,
        inputs: &StepInputs<'_>,
        ctx: &mut StepContext<'_>,
    ) -> StepResult {
        let tag = self.typed(instance.tag())?;
        match &self.spec.body {
            Some(body) => body.execute(tag, inputs, ctx),
            None => Err(RuntimeError::internal(format!("{} has no body", self.spec.name)).into()),
        }
    }

    fn missing_output(&self, instance: &StepInstance, ctx: &StepContext<'_>) -> Option<String> {
        let tag = instance.tag().downcast_ref::<K>()?;
        self.spec.outputs.iter().find_map(|check| check(tag, ctx))
    }

    fn waiting(&self) -> Vec<Arc<StepInstance>> {
        let mut waiting: Vec<Arc<StepInstance>> = lock(&self.instances)
            .values()
            .filter(|instance| instance.state() == InstanceState::Prescribed)
            .cloned()
            .collect();
        waiting.sort_by(|a, b| a.label().cmp(b.label()));
        waiting
    }

    fn clear(&self) {
        let drained: Vec<Arc<StepInstance>> =
            lock(&self.instances).drain().map(|(_, instance)| instance).collect();
        drop(drained);
    }
}
