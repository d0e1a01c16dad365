//! The `stop` subcommand: requests a running analysis to stop.
//!
//! Stopping crosses a process boundary: the analysis polls for a
//! marker file below its working directory, so dropping that marker is
//! all this command does.

use crate::controller::stop_marker_path;
use anyhow::{Context, Result};
use log::info;
use std::path::PathBuf;

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// The working directory of the running analysis
	#[arg(long)]
	input: PathBuf,
}

pub fn run(args: &Subcommand) -> Result<()> {
	let marker = stop_marker_path(&args.input);
	if let Some(parent) = marker.parent() {
		std::fs::create_dir_all(parent).with_context(|| format!("creating {parent:?}"))?;
	}
	std::fs::write(&marker, b"stop").with_context(|| format!("writing stop marker {marker:?}"))?;
	info!("stop requested for analyses below {:?}", args.input);
	Ok(())
}
