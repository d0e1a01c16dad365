//! Single-job lifecycle façade.
//!
//! Owns the working directory scan and the scheduler, probes host
//! resources for the concurrency budget and serves interactive
//! previews outside any job.

use anyhow::{Context, Result};
use imagec_core::{
	EngineError, StopToken,
	settings::{AnalyzeSettings, ChannelSettings},
	system::SystemResources,
};
use imagec_detection::DetectionResponse;
use imagec_image::Raster;
use imagec_pipeline::{
	COMPOSITE_TILE_HEIGHT, COMPOSITE_TILE_WIDTH, ImageEntry, Job, JobConfig, MAX_IMAGE_SIZE_BYTES_TO_LOAD_AT_ONCE,
	PipelineContext, Scheduler, ThreadingSettings, calc_threading,
	processor::{self, process_channel},
	scheduler::JobState,
};
use imagec_reader::{TileRect, WorkingDirectory};
use std::{
	collections::BTreeMap,
	path::{Path, PathBuf},
};

/// Marker file a separate `imagec stop` invocation drops to request a
/// cooperative stop of the analysis running on the same directory.
pub fn stop_marker_path(working_dir: &Path) -> PathBuf {
	working_dir.join("imagec").join("stop")
}

/// Interactive single-tile result, never persisted.
pub struct Preview {
	pub response: DetectionResponse,
	pub thumbnail: Raster,
	pub width: u32,
	pub height: u32,
	pub image_path: PathBuf,
}

#[derive(Default)]
pub struct Controller {
	working_directory: WorkingDirectory,
	scheduler: Scheduler,
}

impl Controller {
	pub fn new() -> Controller {
		Controller::default()
	}

	/// Triggers the asynchronous directory walk.
	pub fn set_working_directory(&self, dir: PathBuf, on_done: impl FnOnce(usize) + Send + 'static) {
		self.working_directory.set_working_directory(dir, on_done);
	}

	pub fn is_looking_for_files(&self) -> bool {
		self.working_directory.is_running()
	}

	pub fn nr_of_found_images(&self) -> usize {
		self.working_directory.file_count()
	}

	pub fn found_images(&self) -> Vec<imagec_reader::FileInfoImages> {
		self.working_directory.files()
	}

	pub fn system_resources(&self) -> SystemResources {
		SystemResources::probe()
	}

	/// Runs the concurrency budget formula against a sample image.
	pub fn calc_optimal_thread_number(
		&self,
		ctx: &PipelineContext,
		settings: &AnalyzeSettings,
		sample_image_idx: usize,
	) -> Result<ThreadingSettings> {
		let files = self.working_directory.files();
		let file = files
			.get(sample_image_idx)
			.with_context(|| format!("no image at index {sample_image_idx}"))?;
		let reader = ctx.open_reader(file)?;
		let ome = reader.read_ome()?;
		let res = ome.resolution(0)?;

		let image_count = files.len() as u64;
		let channel_count = settings.channels.len() as u64;
		let (tile_count, ram_per_tile) = if res.memory_usage() > MAX_IMAGE_SIZE_BYTES_TO_LOAD_AT_ONCE {
			let (tiles_x, tiles_y) = res.tile_count(COMPOSITE_TILE_WIDTH, COMPOSITE_TILE_HEIGHT);
			let bytes_per_pixel = u64::from(res.bits / 8).max(1);
			(
				u64::from(tiles_x) * u64::from(tiles_y),
				u64::from(COMPOSITE_TILE_WIDTH) * u64::from(COMPOSITE_TILE_HEIGHT) * bytes_per_pixel,
			)
		} else {
			(1, res.memory_usage())
		};

		Ok(calc_threading(
			&self.system_resources(),
			image_count,
			tile_count,
			channel_count,
			ram_per_tile,
		))
	}

	pub fn start(&self, ctx: PipelineContext, config: JobConfig) -> Result<Job, EngineError> {
		// A stale stop marker would cancel the new job immediately.
		let _ = std::fs::remove_file(stop_marker_path(&config.working_dir));
		self.scheduler.start(ctx, self.working_directory.files(), config)
	}

	pub fn stop(&self) {
		if let Some(job) = self.scheduler.active_job() {
			job.stop();
		}
	}

	pub fn reset(&self) -> Result<(), EngineError> {
		self.scheduler.reset()
	}

	pub fn state(&self) -> Option<JobState> {
		self.scheduler.active_job().map(|job| job.state())
	}

	pub fn active_job(&self) -> Option<Job> {
		self.scheduler.active_job()
	}

	/// Runs exactly one channel-processor invocation for interactive
	/// feedback; nothing is persisted.
	pub fn preview(
		&self,
		ctx: &PipelineContext,
		channel: &ChannelSettings,
		img_idx: usize,
		tile_x: u32,
		tile_y: u32,
		resolution: u16,
	) -> Result<Preview> {
		let files = self.working_directory.files();
		let file = files.get(img_idx).with_context(|| format!("no image at index {img_idx}"))?;
		let reader = ctx.open_reader(file)?;
		let ome = reader.read_ome()?;
		let entry = ImageEntry {
			index: img_idx as u32,
			file: file.clone(),
			well: None,
			ome,
		};

		let res = entry.ome.resolution(resolution)?;
		let tiled = processor::is_tiled(&entry, resolution);
		let tile = if tiled {
			TileRect::of(res, tile_x, tile_y, COMPOSITE_TILE_WIDTH, COMPOSITE_TILE_HEIGHT)
		} else {
			TileRect::of(res, 0, 0, res.width.max(1), res.height.max(1))
		};

		let response = process_channel(
			ctx,
			&entry,
			channel,
			&tile,
			tiled,
			resolution,
			&BTreeMap::new(),
			&StopToken::new(),
		)?;

		let source = channel.meta.channel_idx.source_channel().unwrap_or(0);
		let z_dir = entry
			.ome
			.tif_dirs(source, processor::TIME_FRAME)
			.ok()
			.and_then(|dirs| dirs.first().copied())
			.unwrap_or(0);
		let thumbnail = reader.read_thumbnail(0, z_dir)?;

		Ok(Preview {
			width: tile.rect.width,
			height: tile.rect.height,
			thumbnail,
			image_path: file.path.clone(),
			response,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use imagec_core::types::ChannelIndex;
	use std::io::{Seek, Write};
	use std::sync::mpsc;
	use tiff::encoder::{TiffEncoder, colortype};

	fn write_fixture(path: &Path) {
		let mut data = vec![100u16; 64 * 64];
		for y in 20..28 {
			for x in 20..28 {
				data[y * 64 + x] = 30_000;
			}
		}
		let mut file = std::fs::File::create(path).unwrap();
		{
			let mut encoder = TiffEncoder::new(&mut file).unwrap();
			encoder.write_image::<colortype::Gray16>(64, 64, &data).unwrap();
		}
		file.flush().unwrap();
		file.rewind().unwrap();
	}

	fn scanned_controller(dir: &Path) -> Controller {
		let controller = Controller::new();
		let (tx, rx) = mpsc::channel();
		controller.set_working_directory(dir.to_path_buf(), move |count| tx.send(count).unwrap());
		rx.recv().unwrap();
		controller
	}

	#[test]
	fn discovers_images_and_calculates_a_budget() {
		let dir = tempfile::tempdir().unwrap();
		write_fixture(&dir.path().join("t_A01_01.tif"));
		write_fixture(&dir.path().join("t_A01_02.tif"));
		let controller = scanned_controller(dir.path());
		assert_eq!(controller.nr_of_found_images(), 2);
		assert!(!controller.is_looking_for_files());

		let mut settings = AnalyzeSettings::default();
		let mut channel = ChannelSettings::default();
		channel.meta.channel_idx = ChannelIndex::Ch0;
		settings.channels.push(channel);

		let ctx = PipelineContext::new(settings.clone());
		let threads = controller.calc_optimal_thread_number(&ctx, &settings, 0).unwrap();
		assert_eq!(threads.total_runs, 2);
		assert!(threads.cores_used >= 1);
	}

	#[test]
	fn preview_detects_without_persisting() {
		let dir = tempfile::tempdir().unwrap();
		write_fixture(&dir.path().join("t_A01_01.tif"));
		let controller = scanned_controller(dir.path());

		let mut channel = ChannelSettings::default();
		channel.meta.channel_idx = ChannelIndex::Ch0;
		channel.detection.threshold.threshold_min = 1000;

		let ctx = PipelineContext::new(AnalyzeSettings::default());
		let preview = controller.preview(&ctx, &channel, 0, 0, 0, 0).unwrap();
		assert_eq!(preview.response.results.len(), 1);
		assert!(preview.response.control_image.is_some());
		assert_eq!((preview.width, preview.height), (64, 64));
		// No job folder was created.
		assert!(!dir.path().join("imagec").exists());
	}

	#[test]
	fn stop_marker_path_is_below_the_job_tree() {
		assert_eq!(stop_marker_path(Path::new("/data")), PathBuf::from("/data/imagec/stop"));
	}
}
