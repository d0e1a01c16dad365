//! The job scheduler and its progress/state machine.
//!
//! A job expands the settings into the work set images × tiles ×
//! channels, runs a fixed-width worker pool on the axis selected by
//! the concurrency budget and persists every work item's outcome.
//! State transitions are signalled through a condition variable;
//! cancellation is cooperative through the shared stop token.

mod pool;
mod runner;
mod state;

pub use state::JobState;

use crate::{
	budget::ThreadingSettings,
	context::{ImageEntry, PipelineContext},
};
use imagec_core::{
	EngineError, StopToken,
	progress::{Progress, ProgressSnapshot},
};
use imagec_reader::FileInfoImages;
use log::{info, warn};
use parking_lot::{Condvar, Mutex};
use std::{
	path::{Path, PathBuf},
	sync::Arc,
	thread,
};

/// Static description of one job.
#[derive(Debug, Clone)]
pub struct JobConfig {
	pub working_dir: PathBuf,
	pub job_name: String,
	pub threads: ThreadingSettings,
	pub plate_id: u8,
	pub resolution: u16,
}

struct JobInner {
	state: Mutex<JobState>,
	state_changed: Condvar,
	progress: Arc<Progress>,
	stop: StopToken,
	error: Mutex<Option<String>>,
	output_dir: PathBuf,
	job_name: String,
	analyze_id: String,
}

/// Handle onto one running (or finished) job.
#[derive(Clone)]
pub struct Job {
	inner: Arc<JobInner>,
}

impl Job {
	fn new(job_name: String, output_dir: PathBuf, analyze_id: String) -> Job {
		Job {
			inner: Arc::new(JobInner {
				state: Mutex::new(JobState::Idle),
				state_changed: Condvar::new(),
				progress: Progress::new(0),
				stop: StopToken::new(),
				error: Mutex::new(None),
				output_dir,
				job_name,
				analyze_id,
			}),
		}
	}

	pub fn state(&self) -> JobState {
		*self.inner.state.lock()
	}

	pub fn progress(&self) -> ProgressSnapshot {
		self.inner.progress.snapshot()
	}

	pub fn error_message(&self) -> Option<String> {
		self.inner.error.lock().clone()
	}

	pub fn output_dir(&self) -> &Path {
		&self.inner.output_dir
	}

	pub fn job_name(&self) -> &str {
		&self.inner.job_name
	}

	pub fn analyze_id(&self) -> &str {
		&self.inner.analyze_id
	}

	/// Requests a cooperative stop. In-flight work items drain before
	/// the job reaches `Stopped`.
	pub fn stop(&self) {
		self.inner.stop.request_stop();
		let mut state = self.inner.state.lock();
		if !state.is_terminal() {
			*state = JobState::Stopping;
			self.inner.state_changed.notify_all();
		}
	}

	/// Blocks until the job reached a terminal state.
	pub fn wait_until_finished(&self) -> JobState {
		let mut state = self.inner.state.lock();
		while !state.is_terminal() {
			self.inner.state_changed.wait(&mut state);
		}
		*state
	}

	fn set_state(&self, new: JobState) {
		let mut state = self.inner.state.lock();
		if state.is_terminal() {
			return;
		}
		// A requested stop wins over a regular completion.
		let new = if *state == JobState::Stopping && new == JobState::Finished {
			JobState::Stopped
		} else {
			new
		};
		*state = new;
		self.inner.state_changed.notify_all();
	}

	fn record_error(&self, err: &EngineError) {
		*self.inner.error.lock() = Some(err.to_string());
	}
}

/// Stateless single-job factory: only one job is active per process;
/// the previous job's terminal progress and error stay readable until
/// the next `reset`.
#[derive(Default)]
pub struct Scheduler {
	active: Mutex<Option<Job>>,
}

impl Scheduler {
	pub fn new() -> Scheduler {
		Scheduler::default()
	}

	pub fn active_job(&self) -> Option<Job> {
		self.active.lock().clone()
	}

	/// Forgets a terminal job. A non-terminal job must be stopped
	/// first.
	pub fn reset(&self) -> Result<(), EngineError> {
		let mut active = self.active.lock();
		if let Some(job) = active.as_ref()
			&& !job.state().is_terminal()
		{
			return Err(EngineError::JobAlreadyRunning);
		}
		*active = None;
		Ok(())
	}

	/// Starts a new job over the given image files.
	pub fn start(
		&self,
		ctx: PipelineContext,
		files: Vec<FileInfoImages>,
		config: JobConfig,
	) -> Result<Job, EngineError> {
		let mut active = self.active.lock();
		if let Some(job) = active.as_ref()
			&& !job.state().is_terminal()
		{
			return Err(EngineError::JobAlreadyRunning);
		}

		// Per-worker peak is about four tile buffers; a host that
		// cannot fit a single worker cannot run the job.
		if config.threads.ram_free > 0 && config.threads.ram_per_tile.saturating_mul(4) > config.threads.ram_free {
			return Err(EngineError::InsufficientResources);
		}

		let timestamp = runner::folder_timestamp();
		let output_dir = config
			.working_dir
			.join("imagec")
			.join(format!("{}-{timestamp}", config.job_name));
		let analyze_id = uuid::Uuid::new_v4().to_string();
		let job = Job::new(config.job_name.clone(), output_dir, analyze_id);
		job.set_state(JobState::Preparing);

		let handle = job.clone();
		thread::spawn(move || {
			let outcome = runner::run_job(&ctx, &files, &config, &handle);
			match outcome {
				Ok(()) => {
					info!("job {} finished", handle.job_name());
					handle.set_state(JobState::Finished);
				}
				Err(EngineError::Cancelled) => {
					info!("job {} stopped", handle.job_name());
					handle.set_state(JobState::Stopped);
				}
				Err(err) => {
					warn!("job {} failed: {err}", handle.job_name());
					handle.record_error(&err);
					handle.set_state(JobState::Error);
				}
			}
		});

		*active = Some(job.clone());
		Ok(job)
	}
}

pub(crate) use pool::run_pool;

/// Discovers the image entries for a job: opens each file, reads its
/// metadata and derives the plate position. Unsupported or unreadable
/// files are skipped with a warning; the job continues.
pub fn discover_entries(ctx: &PipelineContext, files: &[FileInfoImages]) -> Vec<ImageEntry> {
	let regex = ctx.settings.experiment_meta.group_regex().ok();
	let mut entries = Vec::new();
	for file in files {
		let reader = match ctx.open_reader(file) {
			Ok(reader) => reader,
			Err(err) => {
				warn!("skipping {:?}: {err}", file.path);
				continue;
			}
		};
		let ome = match reader.read_ome() {
			Ok(ome) => ome,
			Err(err) => {
				warn!("skipping {:?}: {err}", file.path);
				continue;
			}
		};
		let well = regex.as_ref().and_then(|regex| {
			let name = file.file_name();
			imagec_core::types::WellPosition::from_filename(regex, &name)
				.map_err(|err| {
					warn!("{err:#}");
					err
				})
				.ok()
		});
		entries.push(ImageEntry {
			index: entries.len() as u32,
			file: file.clone(),
			well,
			ome,
		});
	}
	entries
}
