// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Small synchronization helpers shared by the store and the engine.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::errors::RuntimeError;

/// Lock a mutex, recovering the guard if a panicking step poisoned it.
///
/// Step panics are caught and reported as graph failures, so a poisoned
/// table is still structurally sound: every mutation completes before the
/// guard is dropped.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Best-effort rendering of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run graph-author code on behalf of `step`, turning a panic into
/// `StepPanicked`.
pub(crate) fn guarded<T>(
    step: &str,
    f: impl FnOnce() -> Result<T, RuntimeError>,
) -> Result<T, RuntimeError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(RuntimeError::StepPanicked {
            step: step.to_string(),
            message: panic_message(payload.as_ref()),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_lock_recovers_from_poison() {
        let mutex = Arc::new(Mutex::new(1));
        let poisoner = mutex.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(mutex.is_poisoned());
        *lock(&mutex) += 1;
        assert_eq!(*lock(&mutex), 2);
    }

    #[test]
    fn test_panic_message() {
        let payload = catch_unwind(AssertUnwindSafe(|| panic!("static message"))).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static message");

        let payload =
            catch_unwind(AssertUnwindSafe(|| panic!("formatted {}", 42))).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "formatted 42");
    }

    #[test]
    fn test_guarded_maps_panics() {
        assert_eq!(guarded("S(0)", || Ok(7)), Ok(7));
        assert_eq!(
            guarded::<()>("S(1)", || panic!("bad tag")),
            Err(RuntimeError::StepPanicked {
                step: "S(1)".into(),
                message: "bad tag".into()
            })
        );
    }
}
