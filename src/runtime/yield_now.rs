use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Yields once so other runnable tasks get polled before the caller continues.
///
/// The first poll wakes the current task and returns `Pending`; the next one completes.
pub async fn yield_now() {
    struct YieldOnce {
        yielded: bool,
    }

    impl Future for YieldOnce {
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

    YieldOnce { yielded: false }.await
}
