//! The `report` subcommand: aggregates a result database into a CSV
//! table.

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use imagec_core::{
	settings::AnalyzeSettings,
	types::{MeasureChannel, MeasureChannelId, Stats, WellPosition},
};
use imagec_results::{
	Database,
	heatmap::{image_heatmap, plate_heatmap, well_heatmap},
};
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
	Plate,
	Well,
	Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Measure {
	Confidence,
	Area,
	Perimeter,
	Circularity,
	IntensityAvg,
	IntensityMin,
	IntensityMax,
}

impl std::fmt::Display for Measure {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Measure::Confidence => "confidence",
			Measure::Area => "area",
			Measure::Perimeter => "perimeter",
			Measure::Circularity => "circularity",
			Measure::IntensityAvg => "intensity-avg",
			Measure::IntensityMin => "intensity-min",
			Measure::IntensityMax => "intensity-max",
		};
		write!(f, "{name}")
	}
}

impl Measure {
	fn id(self) -> MeasureChannelId {
		MeasureChannelId::own(match self {
			Measure::Confidence => MeasureChannel::Confidence,
			Measure::Area => MeasureChannel::AreaSize,
			Measure::Perimeter => MeasureChannel::Perimeter,
			Measure::Circularity => MeasureChannel::Circularity,
			Measure::IntensityAvg => MeasureChannel::IntensityAvg,
			Measure::IntensityMin => MeasureChannel::IntensityMin,
			Measure::IntensityMax => MeasureChannel::IntensityMax,
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stat {
	Avg,
	Median,
	Sum,
	Min,
	Max,
	Stddev,
	Count,
}

impl std::fmt::Display for Stat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Stat::Avg => "avg",
			Stat::Median => "median",
			Stat::Sum => "sum",
			Stat::Min => "min",
			Stat::Max => "max",
			Stat::Stddev => "stddev",
			Stat::Count => "count",
		};
		write!(f, "{name}")
	}
}

impl Stat {
	fn stats(self) -> Stats {
		match self {
			Stat::Avg => Stats::Avg,
			Stat::Median => Stats::Median,
			Stat::Sum => Stats::Sum,
			Stat::Min => Stats::Min,
			Stat::Max => Stats::Max,
			Stat::Stddev => Stats::StdDev,
			Stat::Count => Stats::Count,
		}
	}
}

#[derive(clap::Args, Debug)]
pub struct Subcommand {
	/// Result database produced by `imagec analyze`
	#[arg(long)]
	database: PathBuf,

	/// Aggregation level
	#[arg(long, value_enum)]
	mode: Mode,

	/// Output table file
	#[arg(long)]
	out: PathBuf,

	/// Logical channel id (CH0 = 1 … CH9 = 10, A = 65 …)
	#[arg(long, default_value_t = 1)]
	channel: u16,

	/// Measurement to aggregate
	#[arg(long, value_enum, default_value_t = Measure::Area)]
	measure: Measure,

	/// Statistic applied per cell
	#[arg(long, value_enum, default_value_t = Stat::Avg)]
	stat: Stat,

	/// Plate id
	#[arg(long, default_value_t = 1)]
	plate: u8,

	/// Well label for the well mode, e.g. A10
	#[arg(long)]
	well: Option<String>,

	/// Image id for the image mode
	#[arg(long)]
	image: Option<u64>,

	/// Bucket edge length in pixels for the image mode
	#[arg(long, default_value_t = 4096)]
	area_size: u32,
}

pub fn run(args: &Subcommand) -> Result<()> {
	let db = Database::open(&args.database)?;
	let analyzes = db.select_analyzes()?;
	let analyze = analyzes.first().context("the database contains no analysis")?;
	let settings: AnalyzeSettings = serde_json::from_str(&analyze.settings_json).unwrap_or_default();
	let experiment = &settings.experiment_meta;

	let table = match args.mode {
		Mode::Plate => plate_heatmap(
			&db,
			&analyze.analyze_id,
			args.plate,
			experiment.plate_rows,
			experiment.plate_cols,
			args.channel,
			args.measure.id(),
			args.stat.stats(),
			false,
		)?,
		Mode::Well => {
			let Some(well) = &args.well else {
				bail!("--well is required for the well mode");
			};
			let group_id = parse_well_label(well)?;
			well_heatmap(
				&db,
				&analyze.analyze_id,
				args.plate,
				group_id,
				args.channel,
				args.measure.id(),
				args.stat.stats(),
				experiment,
			)?
		}
		Mode::Image => {
			let Some(image_id) = args.image else {
				bail!("--image is required for the image mode");
			};
			image_heatmap(
				&db,
				&analyze.analyze_id,
				image_id,
				args.channel,
				args.measure.id(),
				args.stat.stats(),
				args.area_size,
			)?
		}
	};

	std::fs::write(&args.out, table.to_csv()).with_context(|| format!("writing report to {:?}", args.out))?;
	info!("report written to {:?}", args.out);
	Ok(())
}

/// Parses a well label like `A10` into the packed group id.
fn parse_well_label(label: &str) -> Result<u16> {
	let mut chars = label.chars();
	let row = chars
		.next()
		.filter(char::is_ascii_uppercase)
		.with_context(|| format!("well label {label:?} must start with a row letter"))?;
	let col: u8 = chars
		.as_str()
		.parse()
		.with_context(|| format!("well label {label:?} must end with a column number"))?;
	let pos = WellPosition {
		x: col,
		y: row as u8 - b'A' + 1,
		image_nr: 0,
	};
	Ok(pos.group_id())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn well_labels_parse_to_group_ids() {
		assert_eq!(parse_well_label("A10").unwrap(), (1 << 8) | 10);
		assert_eq!(parse_well_label("C7").unwrap(), (3 << 8) | 7);
		assert!(parse_well_label("10A").is_err());
		assert!(parse_well_label("").is_err());
	}
}
