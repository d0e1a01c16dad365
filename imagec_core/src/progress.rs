//! Job progress as a monotone `(finished, total)` counter.
//!
//! Workers bump the counter when a work item reaches persistence;
//! observers take snapshots. The counter never goes backwards.

use std::sync::{
	Arc,
	atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
pub struct Progress {
	finished: AtomicU64,
	total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
	pub finished: u64,
	pub total: u64,
}

impl Progress {
	pub fn new(total: u64) -> Arc<Progress> {
		Arc::new(Progress {
			finished: AtomicU64::new(0),
			total: AtomicU64::new(total),
		})
	}

	/// Sets the denominator. Only meaningful while `finished` is 0.
	pub fn set_total(&self, total: u64) {
		self.total.store(total, Ordering::Release);
	}

	pub fn inc(&self) {
		self.finished.fetch_add(1, Ordering::AcqRel);
	}

	pub fn snapshot(&self) -> ProgressSnapshot {
		ProgressSnapshot {
			finished: self.finished.load(Ordering::Acquire),
			total: self.total.load(Ordering::Acquire),
		}
	}
}

impl ProgressSnapshot {
	pub fn is_complete(&self) -> bool {
		self.finished >= self.total
	}

	pub fn ratio(&self) -> f64 {
		if self.total == 0 {
			return 1.0;
		}
		self.finished as f64 / self.total as f64
	}
}
