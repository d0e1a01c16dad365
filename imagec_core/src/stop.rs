//! Cooperative cancellation token: single writer, many readers.

use std::sync::{
	Arc,
	atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Default, Clone)]
pub struct StopToken {
	flag: Arc<AtomicBool>,
}

impl StopToken {
	pub fn new() -> StopToken {
		StopToken::default()
	}

	pub fn request_stop(&self) {
		self.flag.store(true, Ordering::Release);
	}

	pub fn is_stopped(&self) -> bool {
		self.flag.load(Ordering::Acquire)
	}

	pub fn reset(&self) {
		self.flag.store(false, Ordering::Release);
	}
}
