use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Gives every other runnable or ready task one turn before continuing.
///
/// The first poll wakes the current task and returns `Pending` without
/// registering a readiness condition. The task becomes runnable again, so
/// the scheduler resumes it on its next pass with a zero-timeout poll
/// instead of blocking on the OS.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`].
#[derive(Debug)]
#[must_use = "futures do nothing unless awaited"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }

        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
