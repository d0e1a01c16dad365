//! The `analyze` subcommand: runs one job to completion.

use crate::controller::{Controller, stop_marker_path};
use anyhow::{Result, bail};
use imagec_core::{EngineError, settings::AnalyzeSettings};
use imagec_pipeline::{JobConfig, JobState, PipelineContext};
use log::info;
use std::{
	path::PathBuf,
	sync::mpsc,
	time::Duration,
};

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// Analyze settings document (JSON)
	#[arg(long)]
	settings: PathBuf,

	/// Directory containing the images to analyze
	#[arg(long)]
	input: PathBuf,

	/// Worker count: "auto" budgets against host resources
	#[arg(long, default_value = "auto")]
	threads: String,

	/// Name of the job; defaults to the settings file stem
	#[arg(long)]
	name: Option<String>,
}

pub fn run(args: &Subcommand) -> Result<()> {
	let settings = AnalyzeSettings::from_json_file(&args.settings)?;
	let job_name = args.name.clone().unwrap_or_else(|| {
		args
			.settings
			.file_stem()
			.map_or_else(|| "analyze".to_string(), |stem| stem.to_string_lossy().to_string())
	});

	let controller = Controller::new();
	let (tx, rx) = mpsc::channel();
	controller.set_working_directory(args.input.clone(), move |count| {
		let _ = tx.send(count);
	});
	let found = rx.recv().unwrap_or(0);
	info!("found {found} images below {:?}", args.input);
	if found == 0 {
		bail!("no supported images found below {:?}", args.input);
	}

	let ctx = PipelineContext::new(settings.clone());
	let mut threads = controller.calc_optimal_thread_number(&ctx, &settings, 0)?;
	if args.threads != "auto" {
		let count: u64 = args.threads.parse().map_err(|_| EngineError::ConfigInvalid {
			path: args.settings.clone(),
			reason: format!("--threads must be 'auto' or a number, got {:?}", args.threads),
		})?;
		threads = threads.with_core_override(count);
	}
	info!(
		"using {} worker(s) on the {:?} axis for {} runs",
		threads.cores_used,
		threads.parallel_axis(),
		threads.total_runs
	);

	let job = controller.start(ctx, JobConfig {
		working_dir: args.input.clone(),
		job_name,
		threads,
		plate_id: 1,
		resolution: 0,
	})?;

	// Progress sampling and the cooperative stop marker.
	let marker = stop_marker_path(&args.input);
	let state = loop {
		let state = job.state();
		if state.is_terminal() {
			break state;
		}
		if marker.exists() {
			info!("stop requested");
			job.stop();
			let _ = std::fs::remove_file(&marker);
		}
		let progress = job.progress();
		info!("progress: {}/{}", progress.finished, progress.total);
		std::thread::sleep(Duration::from_millis(500));
	};

	let progress = job.progress();
	info!("job ended in state {state} at {}/{}", progress.finished, progress.total);
	info!("results written to {:?}", job.output_dir());

	match state {
		JobState::Finished => Ok(()),
		JobState::Stopped => Err(EngineError::Cancelled.into()),
		_ => {
			let reason = job.error_message().unwrap_or_else(|| "unknown".to_string());
			Err(EngineError::DetectorFailed {
				channel: imagec_core::types::ChannelIndex::None,
				reason: format!("job failed: {reason}"),
			}
			.into())
		}
	}
}
