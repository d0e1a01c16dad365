mod controller;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use imagec_core::EngineError;

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Analyze a directory of images and write a result database
	Analyze(tools::analyze::Subcommand),

	/// Aggregate a result database into a report table
	Report(tools::report::Subcommand),

	/// Request a running analysis on this working directory to stop
	Stop(tools::stop::Subcommand),
}

fn main() {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	std::process::exit(match run(cli) {
		Ok(()) => 0,
		Err(err) => {
			eprintln!("Error: {err:#}");
			err.downcast_ref::<EngineError>().map_or(1, EngineError::exit_code)
		}
	})
}

fn run(cli: Cli) -> Result<()> {
	match &cli.command {
		Commands::Analyze(arguments) => tools::analyze::run(arguments),
		Commands::Report(arguments) => tools::report::run(arguments),
		Commands::Stop(arguments) => tools::stop::run(arguments),
	}
}
