//! Thread-local record of the task currently being resumed.
//!
//! The scheduler resumes one task at a time on its thread. While a task runs,
//! a slot is installed here; an async operation that cannot complete writes
//! its [`Readiness`] into that slot before returning `Poll::Pending`. The
//! scheduler reads the slot back once the resumption ends, which is how it
//! learns what the task is now waiting on.
//!
//! Slots nest: an eagerly started task spawned from inside another task's
//! resumption gets its own slot, and the outer one is restored afterwards.

use crate::error::{Error, Result};
use crate::reactor::event::Readiness;

use std::cell::RefCell;

thread_local! {
    /// `None` outside of any resumption, `Some(None)` while a task runs without
    /// having suspended yet, `Some(Some(_))` once it registered a condition.
    static CURRENT_TASK: RefCell<Option<Option<Readiness>>> = const { RefCell::new(None) };
}

/// Runs `function` as the body of one task resumption.
///
/// Returns the function's result together with the readiness condition the
/// task registered while running, if any.
pub(crate) fn enter_task<F, R>(function: F) -> (R, Option<Readiness>)
where
    F: FnOnce() -> R,
{
    let previous = CURRENT_TASK.with(|slot| slot.borrow_mut().replace(None));

    let result = function();

    let registered = CURRENT_TASK.with(|slot| {
        let mut slot = slot.borrow_mut();
        let registered = slot.take().flatten();
        *slot = previous;
        registered
    });

    (result, registered)
}

/// Records the condition the running task must wait for.
///
/// Fails when called outside a task resumption, or when the task already
/// registered a different condition during this resumption.
pub(crate) fn register_readiness(requested: Readiness) -> Result<()> {
    CURRENT_TASK.with(|slot| match slot.borrow_mut().as_mut() {
        None => Err(Error::NoTaskContext),
        Some(Some(current)) if *current != requested => Err(Error::AlreadyWaiting {
            current: *current,
            requested,
        }),
        Some(waiting) => {
            *waiting = Some(requested);
            Ok(())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_outside_a_task_is_rejected() {
        let error = register_readiness(Readiness::readable(3)).unwrap_err();
        assert!(matches!(error, Error::NoTaskContext));
    }

    #[test]
    fn registered_condition_is_reported_back() {
        let ((), registered) = enter_task(|| {
            register_readiness(Readiness::writable(7)).unwrap();
        });

        assert_eq!(registered, Some(Readiness::writable(7)));
    }

    #[test]
    fn second_condition_in_one_resumption_is_rejected() {
        let (error, registered) = enter_task(|| {
            register_readiness(Readiness::readable(4)).unwrap();
            register_readiness(Readiness::writable(5)).unwrap_err()
        });

        assert!(matches!(error, Error::AlreadyWaiting { .. }));
        assert_eq!(registered, Some(Readiness::readable(4)));
    }

    #[test]
    fn nested_resumptions_keep_their_own_slot() {
        let (inner, outer) = enter_task(|| {
            register_readiness(Readiness::readable(10)).unwrap();
            let ((), inner) = enter_task(|| {
                register_readiness(Readiness::writable(11)).unwrap();
            });
            inner
        });

        assert_eq!(inner, Some(Readiness::writable(11)));
        assert_eq!(outer, Some(Readiness::readable(10)));
        assert!(matches!(
            register_readiness(Readiness::readable(1)),
            Err(Error::NoTaskContext)
        ));
    }
}
