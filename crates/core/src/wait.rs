//! Suspension primitive used between polling rounds.
//!
//! Polling code never sleeps directly; it asks a [`Waiter`] to pause. This
//! keeps the matching algorithms identical whether a round trip suspends
//! cooperatively on the runtime or blocks the calling thread.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub trait Waiter: Send + Sync {
	/// Suspends the caller for `duration`.
	fn wait(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Cooperative pause on the tokio timer. The default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioWaiter;

impl Waiter for TokioWaiter {
	fn wait(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
		Box::pin(tokio::time::sleep(duration))
	}
}

/// Blocks the current thread instead of yielding.
///
/// Only suitable on threads that own nothing else, e.g. under
/// `tokio::task::block_in_place` or a dedicated current-thread runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingWaiter;

impl Waiter for BlockingWaiter {
	fn wait(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
		std::thread::sleep(duration);
		Box::pin(std::future::ready(()))
	}
}
