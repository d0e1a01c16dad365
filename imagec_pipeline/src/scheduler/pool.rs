//! A fixed-width worker pool over a concurrent work queue.

use crossbeam_channel::unbounded;
use imagec_core::EngineError;
use parking_lot::Mutex;
use std::thread;

/// Runs `work` for every item on `width` OS threads. The queue is
/// drained even after a failure so that in-flight workers unwind at
/// their next item boundary; the first error is returned.
pub fn run_pool<T, F>(width: u64, items: Vec<T>, work: F) -> Result<(), EngineError>
where
	T: Send,
	F: Fn(T) -> Result<(), EngineError> + Sync,
{
	if width <= 1 || items.len() <= 1 {
		for item in items {
			work(item)?;
		}
		return Ok(());
	}

	let (tx, rx) = unbounded();
	for item in items {
		tx.send(item).expect("queue is open");
	}
	drop(tx);

	let first_error: Mutex<Option<EngineError>> = Mutex::new(None);
	thread::scope(|scope| {
		for _ in 0..width {
			scope.spawn(|| {
				while let Ok(item) = rx.recv() {
					if first_error.lock().is_some() {
						// Drain the queue without doing further work.
						continue;
					}
					if let Err(err) = work(item) {
						first_error.lock().get_or_insert(err);
					}
				}
			});
		}
	});

	match first_error.into_inner() {
		Some(err) => Err(err),
		None => Ok(()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};

	#[test]
	fn processes_all_items() {
		let counter = AtomicU32::new(0);
		run_pool(4, (0..100).collect(), |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(())
		})
		.unwrap();
		assert_eq!(counter.load(Ordering::SeqCst), 100);
	}

	#[test]
	fn single_width_runs_serially() {
		let counter = AtomicU32::new(0);
		run_pool(1, vec![1, 2, 3], |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(())
		})
		.unwrap();
		assert_eq!(counter.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn first_error_is_reported_and_queue_drains() {
		let processed = AtomicU32::new(0);
		let result = run_pool(2, (0..50).collect(), |item: u32| {
			if item == 5 {
				return Err(EngineError::Cancelled);
			}
			processed.fetch_add(1, Ordering::SeqCst);
			Ok(())
		});
		assert!(matches!(result, Err(EngineError::Cancelled)));
		assert!(processed.load(Ordering::SeqCst) < 50);
	}
}
