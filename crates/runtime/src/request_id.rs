//! Process-wide request id allocation.
//!
//! Every connection draws ids from the same counter so an id is never reused
//! for the lifetime of the process, even across reconnects. A response that
//! shows up after its caller gave up can therefore only ever match nothing.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

static REGISTRY: OnceLock<RequestIdRegistry> = OnceLock::new();

/// Monotonic id source shared by all dispatchers.
#[derive(Debug)]
pub struct RequestIdRegistry {
	next: AtomicU64,
}

impl RequestIdRegistry {
	/// Returns the process-wide registry, creating it on first use.
	pub fn global() -> &'static Self {
		REGISTRY.get_or_init(|| Self { next: AtomicU64::new(1) })
	}

	/// Allocates the next id. Safe to call from any number of threads.
	pub fn next_id(&self) -> u64 {
		self.next.fetch_add(1, Ordering::Relaxed)
	}
}

/// Initializes the registry eagerly. Calling it more than once is harmless;
/// the counter is never reset.
pub fn init() -> &'static RequestIdRegistry {
	RequestIdRegistry::global()
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;
	use std::sync::Arc;

	use super::*;

	#[test]
	fn ids_increase_and_survive_reinit() {
		let registry = init();
		let first = registry.next_id();
		let again = init();
		let second = again.next_id();
		assert!(second > first);
	}

	#[test]
	fn concurrent_allocation_never_collides() {
		let seen = Arc::new(parking_lot::Mutex::new(HashSet::new()));
		let handles: Vec<_> = (0..8)
			.map(|_| {
				let seen = Arc::clone(&seen);
				std::thread::spawn(move || {
					for _ in 0..500 {
						let id = RequestIdRegistry::global().next_id();
						assert!(seen.lock().insert(id), "duplicate id {id}");
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}
		assert_eq!(seen.lock().len(), 4000);
	}
}
