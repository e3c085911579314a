//! Host scheduling primitives the player suspends on.
//!
//! The player never touches a timer directly. It awaits [`FrameHost::delay`]
//! between records and [`FrameHost::next_frame`] between batches, so a UI
//! shell can plug in its own frame clock and tests can plug in a fake one.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

pub trait FrameHost: Send + Sync {
    /// Suspend for `duration`.
    fn delay(&self, duration: Duration) -> BoxFuture<'static, ()>;

    /// Yield back to the host scheduler until its next frame.
    fn next_frame(&self) -> BoxFuture<'static, ()>;
}

/// Tokio timers. Runs on Tokio's paused clock under `start_paused` tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioHost;

impl FrameHost for TokioHost {
    fn delay(&self, duration: Duration) -> BoxFuture<'static, ()> {
        if duration.is_zero() {
            return tokio::task::yield_now().boxed();
        }
        tokio::time::sleep(duration).boxed()
    }

    fn next_frame(&self) -> BoxFuture<'static, ()> {
        tokio::task::yield_now().boxed()
    }
}
