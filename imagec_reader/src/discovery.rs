//! Asynchronous discovery of image files below the working directory.

use crate::registry::Decoder;
use log::{info, warn};
use std::{
	path::{Path, PathBuf},
	sync::{
		Arc, Mutex,
		atomic::{AtomicBool, Ordering},
	},
	thread,
};

/// One discovered image file together with its decoder family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfoImages {
	pub path: PathBuf,
	pub decoder: Decoder,
}

impl FileInfoImages {
	/// `None` for files no decoder feels responsible for; those are
	/// skipped silently.
	pub fn parse(path: &Path) -> Option<FileInfoImages> {
		Decoder::from_path(path).map(|decoder| FileInfoImages {
			path: path.to_path_buf(),
			decoder,
		})
	}

	pub fn file_name(&self) -> String {
		self.path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default()
	}
}

#[derive(Default)]
struct Inner {
	files: Mutex<Vec<FileInfoImages>>,
	running: AtomicBool,
	stop: AtomicBool,
}

/// Watches one working directory and keeps the list of contained
/// images. The walk runs on a background thread; `is_running` reports
/// whether it is still busy.
#[derive(Clone, Default)]
pub struct WorkingDirectory {
	inner: Arc<Inner>,
}

impl WorkingDirectory {
	pub fn new() -> WorkingDirectory {
		WorkingDirectory::default()
	}

	/// Starts a fresh walk of `dir`. A previous walk is stopped first.
	/// `on_done` is invoked once the walk finished or was stopped.
	pub fn set_working_directory(&self, dir: PathBuf, on_done: impl FnOnce(usize) + Send + 'static) {
		self.stop();
		let inner = Arc::clone(&self.inner);
		inner.stop.store(false, Ordering::Release);
		inner.running.store(true, Ordering::Release);
		thread::spawn(move || {
			let mut files = Vec::new();
			walk(&dir, &inner.stop, &mut files);
			files.sort_by(|a, b| a.path.cmp(&b.path));
			info!("found {} images in {dir:?}", files.len());
			*inner.files.lock().expect("file list poisoned") = files;
			inner.running.store(false, Ordering::Release);
			let count = inner.files.lock().expect("file list poisoned").len();
			on_done(count);
		});
	}

	pub fn is_running(&self) -> bool {
		self.inner.running.load(Ordering::Acquire)
	}

	/// Requests the walk to stop and waits until it drained.
	pub fn stop(&self) {
		self.inner.stop.store(true, Ordering::Release);
		while self.is_running() {
			thread::yield_now();
		}
	}

	pub fn files(&self) -> Vec<FileInfoImages> {
		self.inner.files.lock().expect("file list poisoned").clone()
	}

	pub fn file_count(&self) -> usize {
		self.inner.files.lock().expect("file list poisoned").len()
	}

	pub fn file_at(&self, idx: usize) -> Option<FileInfoImages> {
		self.inner.files.lock().expect("file list poisoned").get(idx).cloned()
	}
}

fn walk(dir: &Path, stop: &AtomicBool, out: &mut Vec<FileInfoImages>) {
	let entries = match std::fs::read_dir(dir) {
		Ok(entries) => entries,
		Err(err) => {
			warn!("cannot read directory {dir:?}: {err}");
			return;
		}
	};
	for entry in entries.flatten() {
		if stop.load(Ordering::Acquire) {
			return;
		}
		let path = entry.path();
		if path.is_dir() {
			walk(&path, stop, out);
		} else if let Some(file) = FileInfoImages::parse(&path) {
			out.push(file);
		}
	}
}
