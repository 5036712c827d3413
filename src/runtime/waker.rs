//! Waker implementation for tasks that suspend without a readiness condition.
//!
//! Socket operations never use the waker: they record a [`Readiness`] instead.
//! The waker only matters for futures such as [`yield_now`] that ask to be
//! polled again without waiting on the OS. Waking sets a flag the scheduler
//! checks when it builds the next pass.
//!
//! [`Readiness`]: crate::reactor::event::Readiness
//! [`yield_now`]: crate::runtime::yield_now

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{RawWaker, RawWakerVTable, Waker};

/// Notification flag shared between a task and its wakers.
#[derive(Debug, Default)]
pub(crate) struct TaskWaker {
    notified: AtomicBool,
}

impl TaskWaker {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn is_notified(&self) -> bool {
        self.notified.load(Ordering::Acquire)
    }

    pub(crate) fn clear(&self) {
        self.notified.store(false, Ordering::Release);
    }

    fn notify(&self) {
        self.notified.store(true, Ordering::Release);
    }

    fn clone_raw(ptr: *const ()) -> RawWaker {
        unsafe {
            Arc::increment_strong_count(ptr as *const TaskWaker);
        }

        RawWaker::new(ptr, &Self::VTABLE)
    }

    fn wake_raw(ptr: *const ()) {
        let waker = unsafe { Arc::from_raw(ptr as *const TaskWaker) };
        waker.notify();
    }

    fn wake_by_ref_raw(ptr: *const ()) {
        let waker = unsafe { &*(ptr as *const TaskWaker) };
        waker.notify();
    }

    fn drop_raw(ptr: *const ()) {
        unsafe {
            drop(Arc::from_raw(ptr as *const TaskWaker));
        }
    }

    const VTABLE: RawWakerVTable = RawWakerVTable::new(
        Self::clone_raw,
        Self::wake_raw,
        Self::wake_by_ref_raw,
        Self::drop_raw,
    );
}

/// Creates a `Waker` that flags `task` as runnable when woken.
pub(crate) fn make_waker(task: Arc<TaskWaker>) -> Waker {
    let raw = RawWaker::new(Arc::into_raw(task) as *const (), &TaskWaker::VTABLE);

    unsafe { Waker::from_raw(raw) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_sets_the_flag_and_clear_resets_it() {
        let task = TaskWaker::new();
        let waker = make_waker(task.clone());

        assert!(!task.is_notified());
        waker.wake_by_ref();
        assert!(task.is_notified());

        task.clear();
        assert!(!task.is_notified());

        waker.clone().wake();
        assert!(task.is_notified());
    }

    #[test]
    fn dropping_wakers_releases_the_flag() {
        let task = TaskWaker::new();
        let waker = make_waker(task.clone());
        let cloned = waker.clone();

        assert_eq!(Arc::strong_count(&task), 3);
        drop(waker);
        drop(cloned);
        assert_eq!(Arc::strong_count(&task), 1);
    }
}
