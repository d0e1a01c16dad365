//! Named timing spans collected per job and written to
//! `profiling.json`. Span names are free-form and informative only; no
//! consumer depends on them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
	path::Path,
	sync::{Arc, Mutex},
	time::{Duration, Instant},
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Span {
	pub name: String,
	pub micros: u64,
	pub count: u64,
}

/// Accumulates span durations keyed by name.
#[derive(Debug, Default)]
pub struct Profiler {
	spans: Mutex<Vec<Span>>,
}

impl Profiler {
	pub fn new() -> Arc<Profiler> {
		Arc::new(Profiler::default())
	}

	/// Times `f` under `name`. Durations for the same name accumulate.
	pub fn span<R>(&self, name: &str, f: impl FnOnce() -> R) -> R {
		let start = Instant::now();
		let result = f();
		self.record(name, start.elapsed());
		result
	}

	pub fn record(&self, name: &str, elapsed: Duration) {
		let mut spans = self.spans.lock().expect("profiler poisoned");
		if let Some(span) = spans.iter_mut().find(|span| span.name == name) {
			span.micros += elapsed.as_micros() as u64;
			span.count += 1;
		} else {
			spans.push(Span {
				name: name.to_string(),
				micros: elapsed.as_micros() as u64,
				count: 1,
			});
		}
	}

	pub fn spans(&self) -> Vec<Span> {
		self.spans.lock().expect("profiler poisoned").clone()
	}

	/// Writes the collected spans as one JSON array.
	pub fn write_json(&self, path: &Path) -> Result<()> {
		let json = serde_json::to_string_pretty(&self.spans())?;
		std::fs::write(path, json).with_context(|| format!("writing profiling data to {path:?}"))?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn spans_accumulate_by_name() {
		let profiler = Profiler::new();
		profiler.record("load", Duration::from_micros(10));
		profiler.record("load", Duration::from_micros(5));
		profiler.record("detect", Duration::from_micros(7));

		let spans = profiler.spans();
		assert_eq!(spans.len(), 2);
		let load = spans.iter().find(|s| s.name == "load").unwrap();
		assert_eq!(load.micros, 15);
		assert_eq!(load.count, 2);
	}

	#[test]
	fn span_returns_closure_result() {
		let profiler = Profiler::new();
		let value = profiler.span("sum", || 1 + 2);
		assert_eq!(value, 3);
		assert_eq!(profiler.spans().len(), 1);
	}

	#[test]
	fn writes_json_array() {
		let profiler = Profiler::new();
		profiler.record("persist", Duration::from_micros(42));
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("profiling.json");
		profiler.write_json(&path).unwrap();

		let spans: Vec<Span> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
		assert_eq!(spans, profiler.spans());
	}
}
