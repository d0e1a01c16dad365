//! Executes one job: preparation, the three-axis work loop and
//! persistence.

use super::{Job, JobConfig, JobState, discover_entries, run_pool};
use crate::{
	COMPOSITE_TILE_HEIGHT, COMPOSITE_TILE_WIDTH,
	budget::Axis,
	context::{ImageEntry, PipelineContext},
	persist, processor,
	steps::run_pipeline_steps,
};
use imagec_core::{
	EngineError,
	settings::{AnalyzeSettings, ChannelSettings},
	types::{ChannelIndex, ChannelValidity, MeasureChannel, MeasureChannelId},
};
use imagec_detection::DetectionResponse;
use imagec_reader::{FileInfoImages, TileRect};
use imagec_results::{
	AnalyzeMeta, ChannelMeta, DB_FILENAME, Database, GroupMeta, ImageMeta, PlateMeta,
};
use log::warn;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use time::macros::format_description;

pub fn folder_timestamp() -> String {
	OffsetDateTime::now_utc()
		.format(format_description!("[year]-[month]-[day]T[hour]-[minute]-[second]"))
		.unwrap_or_else(|_| "unknown-time".to_string())
}

fn row_timestamp() -> String {
	OffsetDateTime::now_utc()
		.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
		.unwrap_or_else(|_| "unknown-time".to_string())
}

/// The full job body. Any error returned here transitions the job into
/// its terminal error state; `Cancelled` maps to `Stopped`.
pub fn run_job(
	ctx: &PipelineContext,
	files: &[FileInfoImages],
	config: &JobConfig,
	job: &Job,
) -> Result<(), EngineError> {
	let io_error = |err: std::io::Error| EngineError::DatabaseError {
		op: "prepare job folder".to_string(),
		reason: err.to_string(),
	};
	std::fs::create_dir_all(job.output_dir()).map_err(io_error)?;

	// Verbatim copy of the input settings next to the results.
	let settings_json = ctx.settings.to_json().map_err(|err| EngineError::ConfigInvalid {
		path: job.output_dir().join("settings.json"),
		reason: err.to_string(),
	})?;
	std::fs::write(job.output_dir().join("settings.json"), &settings_json).map_err(io_error)?;

	let db = Database::open(&job.output_dir().join(DB_FILENAME))?;
	let entries = discover_entries(ctx, files);

	let total: u64 = entries
		.iter()
		.map(|entry| tiles_of(entry, config.resolution).len() as u64 * ctx.settings.channels.len() as u64)
		.sum();
	job.inner.progress.set_total(total);

	prepare_database(ctx, &db, config, job, &entries, &settings_json)?;
	job.set_state(JobState::Running);

	let runner = Runner {
		ctx,
		db: &db,
		config,
		job,
		waves: channel_waves(&ctx.settings),
	};
	runner.run(&entries)?;

	if let Err(err) = ctx.profiler.write_json(&job.output_dir().join("profiling.json")) {
		warn!("cannot write profiling data: {err:#}");
	}

	if job.inner.stop.is_stopped() {
		return Err(EngineError::Cancelled);
	}
	Ok(())
}

/// Composite tiles of one image at the given resolution; exactly one
/// covering tile when the image is loaded whole.
fn tiles_of(entry: &ImageEntry, resolution: u16) -> Vec<TileRect> {
	let Ok(res) = entry.ome.resolution(resolution) else {
		return Vec::new();
	};
	if processor::is_tiled(entry, resolution) {
		let (tiles_x, tiles_y) = res.tile_count(COMPOSITE_TILE_WIDTH, COMPOSITE_TILE_HEIGHT);
		let mut tiles = Vec::with_capacity((tiles_x * tiles_y) as usize);
		for ty in 0..tiles_y {
			for tx in 0..tiles_x {
				tiles.push(TileRect::of(res, tx, ty, COMPOSITE_TILE_WIDTH, COMPOSITE_TILE_HEIGHT));
			}
		}
		tiles
	} else {
		vec![TileRect::of(res, 0, 0, res.width.max(1), res.height.max(1))]
	}
}

/// Writes the static rows: analyze, plate, groups, images and
/// channels.
fn prepare_database(
	ctx: &PipelineContext,
	db: &Database,
	config: &JobConfig,
	job: &Job,
	entries: &[ImageEntry],
	settings_json: &str,
) -> Result<(), EngineError> {
	let experiment = &ctx.settings.experiment_meta;
	db.insert_analyze(&AnalyzeMeta {
		analyze_id: job.analyze_id().to_string(),
		run_id: uuid::Uuid::new_v4().to_string(),
		name: job.job_name().to_string(),
		timestamp: row_timestamp(),
		scientists: experiment.scientists.clone(),
		organisation: experiment.organisation.clone(),
		notes: experiment.notes.clone(),
		settings_json: settings_json.to_string(),
	})?;
	db.insert_plate(&PlateMeta {
		analyze_id: job.analyze_id().to_string(),
		plate_id: config.plate_id,
		notes: String::new(),
	})?;

	for entry in entries {
		let (group_id, pos_x, pos_y) = entry.well.map_or((0, 0, 0), |well| (well.group_id(), well.x, well.y));
		db.upsert_group(&GroupMeta {
			analyze_id: job.analyze_id().to_string(),
			plate_id: config.plate_id,
			group_id,
			well_pos_x: pos_x,
			well_pos_y: pos_y,
			name: entry.well.map(|well| well.label()).unwrap_or_default(),
			notes: String::new(),
		})?;

		let res = entry.ome.resolution(config.resolution).ok();
		db.upsert_image(&ImageMeta {
			analyze_id: job.analyze_id().to_string(),
			image_id: entry.image_id(),
			image_idx: entry.image_idx(),
			file_name: entry.file.file_name(),
			original_file_path: entry.file.path.clone(),
			width: res.map_or(0, |r| u64::from(r.width)),
			height: res.map_or(0, |r| u64::from(r.height)),
		})?;
		db.upsert_image_group(job.analyze_id(), entry.image_id(), config.plate_id, group_id)?;
	}

	for channel in &ctx.settings.channels {
		db.upsert_channel(&ChannelMeta {
			analyze_id: job.analyze_id().to_string(),
			channel_id: channel.meta.channel_idx.id(),
			name: channel.meta.name.clone(),
			measurements: measurements_of(channel),
		})?;
	}
	for step in &ctx.settings.cross_channel_steps {
		db.upsert_channel(&ChannelMeta {
			analyze_id: job.analyze_id().to_string(),
			channel_id: step.output_channel().id(),
			name: step.output_channel().to_string(),
			measurements: step
				.input_channels()
				.iter()
				.flat_map(|ch| {
					[
						MeasureChannelId::new(MeasureChannel::CrossChannelIntensityAvg, *ch),
						MeasureChannelId::new(MeasureChannel::CrossChannelIntensityMin, *ch),
						MeasureChannelId::new(MeasureChannel::CrossChannelIntensityMax, *ch),
					]
				})
				.chain(base_measurements())
				.collect(),
		})?;
	}
	Ok(())
}

fn base_measurements() -> Vec<MeasureChannelId> {
	[
		MeasureChannel::Confidence,
		MeasureChannel::AreaSize,
		MeasureChannel::Perimeter,
		MeasureChannel::Circularity,
		MeasureChannel::CenterOfMassX,
		MeasureChannel::CenterOfMassY,
		MeasureChannel::BoundingBoxWidth,
		MeasureChannel::BoundingBoxHeight,
		MeasureChannel::IntensityAvg,
		MeasureChannel::IntensityMin,
		MeasureChannel::IntensityMax,
	]
	.into_iter()
	.map(MeasureChannelId::own)
	.collect()
}

/// The measure channels one configured channel emits per object.
fn measurements_of(channel: &ChannelSettings) -> Vec<MeasureChannelId> {
	let mut measurements = base_measurements();
	for ch in &channel.cross_channel.intensity_channels {
		measurements.push(MeasureChannelId::new(MeasureChannel::CrossChannelIntensityAvg, *ch));
		measurements.push(MeasureChannelId::new(MeasureChannel::CrossChannelIntensityMin, *ch));
		measurements.push(MeasureChannelId::new(MeasureChannel::CrossChannelIntensityMax, *ch));
	}
	for ch in &channel.cross_channel.count_channels {
		measurements.push(MeasureChannelId::new(MeasureChannel::CrossChannelCount, *ch));
	}
	measurements
}

/// Orders the channels into waves: a channel only runs once all
/// channels it references finished. Cyclic references degrade into one
/// final wave with a warning.
fn channel_waves(settings: &AnalyzeSettings) -> Vec<Vec<ChannelSettings>> {
	let mut remaining: Vec<ChannelSettings> = settings.channels.clone();
	let mut done: Vec<ChannelIndex> = Vec::new();
	let mut waves = Vec::new();

	while !remaining.is_empty() {
		let (ready, blocked): (Vec<_>, Vec<_>) = remaining.into_iter().partition(|channel| {
			channel
				.reference_channels()
				.iter()
				.all(|reference| done.contains(reference) || *reference == channel.meta.channel_idx)
		});
		if ready.is_empty() {
			warn!("cyclic channel references, processing the remaining channels in one wave");
			waves.push(blocked);
			break;
		}
		done.extend(ready.iter().map(|channel| channel.meta.channel_idx));
		waves.push(ready);
		remaining = blocked;
	}
	waves
}

struct Runner<'a> {
	ctx: &'a PipelineContext,
	db: &'a Database,
	config: &'a JobConfig,
	job: &'a Job,
	waves: Vec<Vec<ChannelSettings>>,
}

impl Runner<'_> {
	fn run(&self, entries: &[ImageEntry]) -> Result<(), EngineError> {
		let threads = &self.config.threads;
		match threads.parallel_axis() {
			Axis::Images => run_pool(threads.width(Axis::Images), entries.iter().collect(), |entry| {
				self.process_image(entry, 1, 1)
			}),
			Axis::Tiles => {
				for entry in entries {
					self.process_image(entry, threads.width(Axis::Tiles), 1)?;
				}
				Ok(())
			}
			Axis::Channels => {
				for entry in entries {
					self.process_image(entry, 1, threads.width(Axis::Channels))?;
				}
				Ok(())
			}
		}
	}

	fn process_image(&self, entry: &ImageEntry, tile_width: u64, channel_width: u64) -> Result<(), EngineError> {
		let tiles = tiles_of(entry, self.config.resolution);
		let tiles_x = entry
			.ome
			.resolution(self.config.resolution)
			.map(|res| res.tile_count(COMPOSITE_TILE_WIDTH, COMPOSITE_TILE_HEIGHT).0)
			.unwrap_or(1);
		run_pool(tile_width, tiles, |tile| self.process_tile(entry, &tile, tiles_x, channel_width))
	}

	/// One tile: channels in dependency waves, then the cross-channel
	/// pipeline steps as a barrier, then persistence of the step
	/// outputs.
	fn process_tile(
		&self,
		entry: &ImageEntry,
		tile: &TileRect,
		tiles_x: u32,
		channel_width: u64,
	) -> Result<(), EngineError> {
		if self.job.inner.stop.is_stopped() {
			return Err(EngineError::Cancelled);
		}
		let tiled = processor::is_tiled(entry, self.config.resolution);
		let tile_id = tile.id(tiles_x);
		let mut responses: BTreeMap<ChannelIndex, DetectionResponse> = BTreeMap::new();

		for wave in &self.waves {
			let outcomes: Mutex<Vec<(ChannelIndex, Result<DetectionResponse, EngineError>)>> =
				Mutex::new(Vec::new());
			run_pool(
				channel_width.min(wave.len() as u64),
				wave.iter().collect(),
				|channel| {
					if self.job.inner.stop.is_stopped() {
						return Err(EngineError::Cancelled);
					}
					let result = processor::process_channel(
						self.ctx,
						entry,
						channel,
						tile,
						tiled,
						self.config.resolution,
						&responses,
						&self.job.inner.stop,
					);
					outcomes.lock().push((channel.meta.channel_idx, result));
					Ok(())
				},
			)?;

			for (channel_idx, result) in outcomes.into_inner() {
				if let Some(response) = self.handle_outcome(entry, channel_idx, tile_id, result)? {
					responses.insert(channel_idx, response);
				}
				self.job.inner.progress.inc();
			}
		}

		// Barrier: cross-channel steps see the complete tile.
		let before: Vec<ChannelIndex> = responses.keys().copied().collect();
		self
			.ctx
			.profiler
			.span("pipeline-steps", || run_pipeline_steps(&self.ctx.settings.cross_channel_steps, &mut responses));

		for (channel_idx, response) in &responses {
			if before.contains(channel_idx) {
				continue;
			}
			self.persist(entry, *channel_idx, tile_id, response)?;
		}
		Ok(())
	}

	fn persist(
		&self,
		entry: &ImageEntry,
		channel_idx: ChannelIndex,
		tile_id: u16,
		response: &DetectionResponse,
	) -> Result<(), EngineError> {
		self.ctx.profiler.span("persist", || {
			persist::write_control_image(
				self.job.output_dir(),
				&persist::control_image_template(entry.image_id(), channel_idx.id()),
				tile_id,
				response,
			);
			persist::persist_response(self.db, self.job.analyze_id(), entry, channel_idx, tile_id, response)
		})
	}

	/// Translates a work item outcome into persistence. Only database
	/// errors and cancellation bubble up; everything else is recorded
	/// against the image-channel and the job continues.
	fn handle_outcome(
		&self,
		entry: &ImageEntry,
		channel_idx: ChannelIndex,
		tile_id: u16,
		result: Result<DetectionResponse, EngineError>,
	) -> Result<Option<DetectionResponse>, EngineError> {
		match result {
			Ok(response) => {
				self.persist(entry, channel_idx, tile_id, &response)?;
				Ok(Some(response))
			}
			Err(err @ (EngineError::Cancelled | EngineError::DatabaseError { .. } | EngineError::DatabaseSchemaMismatch { .. })) => {
				Err(err)
			}
			Err(EngineError::TooManyObjects(_)) => {
				warn!(
					"{}: tile {tile_id} of channel {channel_idx} produced too many objects",
					entry.file.file_name()
				);
				let mut empty = DetectionResponse::default();
				empty.set_validity(ChannelValidity::PossibleNoise);
				persist::persist_response(self.db, self.job.analyze_id(), entry, channel_idx, tile_id, &empty)?;
				Ok(Some(empty))
			}
			Err(err) => {
				warn!("{}: channel {channel_idx} failed: {err}", entry.file.file_name());
				persist::persist_failure(
					self.db,
					self.job.analyze_id(),
					entry,
					channel_idx,
					enumset::EnumSet::empty(),
				)?;
				Ok(None)
			}
		}
	}
}
