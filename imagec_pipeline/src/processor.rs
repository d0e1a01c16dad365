//! Per-(image, tile, channel) orchestration.
//!
//! Loads and Z-projects the tile, runs the preprocessing chain and the
//! configured detector, applies per-object and per-image filters and
//! composes the cross-channel measurements. The produced response is
//! persisted by the scheduler and fed into the cross-channel pipeline
//! steps.

use crate::{
	MAX_IMAGE_SIZE_BYTES_TO_LOAD_AT_ONCE, REFERENCE_SPOT_MIN_INTERSECTION,
	context::{ImageEntry, PipelineContext},
};
use imagec_core::{
	EngineError, StopToken,
	settings::{ChannelSettings, DetectionMode, ImageFilterMode, PreprocessingStep, ZProjectMethod},
	types::{ChannelIndex, ChannelValidity, ObjectValidity},
};
use imagec_detection::{DetectionResponse, Detector, detector::ThresholdDetector, paint};
use imagec_image::{Histogram, Raster, ops};
use imagec_reader::TileRect;
use log::warn;
use std::collections::BTreeMap;

/// Only the first time frame is analysed.
pub const TIME_FRAME: u32 = 0;

/// Whether this image is processed tile by tile at the given
/// resolution.
pub fn is_tiled(entry: &ImageEntry, resolution: u16) -> bool {
	let Ok(res) = entry.ome.resolution(resolution) else {
		return false;
	};
	res.memory_usage() > MAX_IMAGE_SIZE_BYTES_TO_LOAD_AT_ONCE && entry.file.decoder.tile_capable()
}

/// Runs the full processing sequence for one channel of one tile.
pub fn process_channel(
	ctx: &PipelineContext,
	entry: &ImageEntry,
	channel: &ChannelSettings,
	tile: &TileRect,
	tiled: bool,
	resolution: u16,
	references: &BTreeMap<ChannelIndex, DetectionResponse>,
	stop: &StopToken,
) -> Result<DetectionResponse, EngineError> {
	let channel_idx = channel.meta.channel_idx;
	let source = channel_idx.source_channel().ok_or_else(|| EngineError::DetectorFailed {
		channel: channel_idx,
		reason: "virtual channels cannot be processed from pixels".to_string(),
	})?;

	// Load and Z-project.
	let original = ctx.profiler.span("z-projection", || {
		load_projected(ctx, entry, source, channel.preprocessing.z_stack, tile, tiled, resolution)
	})?;

	// Preprocessing chain; every operator sees the output of the
	// previous one.
	let mut image = original.clone();
	for step in &channel.preprocessing.pipeline {
		if stop.is_stopped() {
			return Err(EngineError::Cancelled);
		}
		image = ctx.profiler.span("preprocessing", || apply_step(ctx, entry, channel, step, &image, tile, tiled, resolution))?;
	}

	// Detection.
	let detector = build_detector(ctx, channel)?;
	let mut response = ctx.profiler.span("detection", || detector.forward(&image, &original, channel_idx, stop))?;
	response.original = Some(original);

	// Filtering.
	ctx.profiler.span("filtering", || {
		apply_object_filters(channel, &mut response, tile, references);
		apply_image_filters(channel, &mut response);
	});

	// Cross-channel measurements.
	compose_cross_channel(channel, &mut response, references);

	// Control image.
	let paint_rectangles = channel.detection.detection_mode == DetectionMode::Ai;
	if let Some(original) = &response.original {
		response.control_image = Some(paint::generate_control_image(&response.results, original, paint_rectangles));
	}

	Ok(response)
}

/// Loads one plane (tile or entire image) of every Z directory and
/// projects them into one plane.
fn load_projected(
	ctx: &PipelineContext,
	entry: &ImageEntry,
	source_channel: u32,
	z_method: ZProjectMethod,
	tile: &TileRect,
	tiled: bool,
	resolution: u16,
) -> Result<Raster, EngineError> {
	let read_failed = |err: anyhow::Error| EngineError::ReadFailed {
		path: entry.file.path.clone(),
		reason: err.to_string(),
	};

	let reader = ctx.open_reader(&entry.file)?;
	let dirs = entry.ome.tif_dirs(source_channel, TIME_FRAME).map_err(read_failed)?;
	let series = 0u16;

	let mut planes = Vec::new();
	for (nr, dir) in dirs.iter().enumerate() {
		if nr > 0 && z_method == ZProjectMethod::None {
			break;
		}
		let plane = if tiled {
			reader.read_tile(series, *dir, tile, resolution)
		} else {
			reader.read_entire(series, *dir, resolution)
		};
		planes.push(plane.map_err(read_failed)?);
	}
	Ok(ops::z_project_max(&planes))
}

#[allow(clippy::too_many_arguments)]
fn apply_step(
	ctx: &PipelineContext,
	entry: &ImageEntry,
	channel: &ChannelSettings,
	step: &PreprocessingStep,
	image: &Raster,
	tile: &TileRect,
	tiled: bool,
	resolution: u16,
) -> Result<Raster, EngineError> {
	Ok(match step {
		PreprocessingStep::SubtractChannel { channel_idx } => {
			let Some(source) = channel_idx.source_channel() else {
				warn!("channel subtraction from {channel_idx} is not possible, skipping");
				return Ok(image.clone());
			};
			let other = load_projected(ctx, entry, source, channel.preprocessing.z_stack, tile, tiled, resolution)?;
			ops::subtract(image, &other)
		}
		PreprocessingStep::EdgeDetection { kernel, direction } => ops::edge_detection(image, *kernel, *direction),
		PreprocessingStep::GaussianBlur { kernel_size: _, sigma } => ops::gaussian_blur(image, *sigma),
		PreprocessingStep::MedianSubtract { kernel_size } => ops::median_subtract(image, *kernel_size),
		PreprocessingStep::RollingBall { radius, ball_type } => ops::rolling_ball(image, *radius, *ball_type),
		PreprocessingStep::Blur { kernel_size } => ops::blur(image, *kernel_size),
	})
}

fn build_detector(ctx: &PipelineContext, channel: &ChannelSettings) -> Result<Detector, EngineError> {
	match channel.detection.detection_mode {
		DetectionMode::Threshold => Ok(Detector::Threshold(ThresholdDetector::new(
			channel.detection.threshold.clone(),
			channel.object_filter.clone(),
		))),
		DetectionMode::Ai => {
			let factory = ctx.session_factory.as_ref().ok_or_else(|| EngineError::DetectorFailed {
				channel: channel.meta.channel_idx,
				reason: "no inference backend is registered".to_string(),
			})?;
			let session = factory(&channel.detection.ai).map_err(|err| EngineError::DetectorFailed {
				channel: channel.meta.channel_idx,
				reason: err.to_string(),
			})?;
			Ok(Detector::Model(imagec_detection::detector::ModelDetector::new(
				channel.detection.ai.clone(),
				channel.object_filter.clone(),
				session,
			)))
		}
	}
}

/// Edge proximity and reference-spot subtraction. Size and circularity
/// filters were already applied at ROI construction.
fn apply_object_filters(
	channel: &ChannelSettings,
	response: &mut DetectionResponse,
	tile: &TileRect,
	references: &BTreeMap<ChannelIndex, DetectionResponse>,
) {
	let bounds = imagec_core::types::Rect::new(0, 0, tile.rect.width, tile.rect.height);
	for roi in response.results.iter_mut() {
		if roi.touches_edge(&bounds) {
			roi.set_validity(ObjectValidity::AtTheEdge);
		}
	}

	let reference_channel = channel.object_filter.reference_spot_channel_index;
	if reference_channel != ChannelIndex::None {
		if let Some(reference) = references.get(&reference_channel) {
			for spot in response.results.iter_mut() {
				if !spot.is_valid() {
					continue;
				}
				for reference_roi in &reference.results {
					if reference_roi.is_valid() && reference_roi.is_intersecting(spot, REFERENCE_SPOT_MIN_INTERSECTION) {
						spot.set_validity(ObjectValidity::ReferenceSpot);
						break;
					}
				}
			}
		} else {
			warn!("A reference channel index was selected which is not part of the channel list.");
		}
	}
}

/// Max-objects and histogram plausibility checks; the filter mode
/// selects between tagging and invalidating the whole image-channel.
fn apply_image_filters(channel: &ChannelSettings, response: &mut DetectionResponse) {
	if channel.image_filter.filter_mode == ImageFilterMode::Off {
		return;
	}
	response.invalidate_whole_image = channel.image_filter.filter_mode == ImageFilterMode::InvalidateWholeImage;

	let max_objects = channel.image_filter.max_objects;
	if max_objects > 0 && response.results.len() as u64 > max_objects {
		response.set_validity(ChannelValidity::PossibleNoise);
	}

	let factor = channel.image_filter.hist_min_threshold_filter_factor;
	if factor > 0.0
		&& channel.detection.detection_mode == DetectionMode::Threshold
		&& let Some(original) = &response.original
	{
		let peak = Histogram::of(original).peak_index() as f32;
		let filter_threshold = peak * factor;
		if f32::from(channel.detection.threshold.threshold_min) < filter_threshold {
			response.set_validity(ChannelValidity::PossibleWrongThreshold);
		}
	}
}

/// Samples cross-channel intensity and counts for every ROI.
fn compose_cross_channel(
	channel: &ChannelSettings,
	response: &mut DetectionResponse,
	references: &BTreeMap<ChannelIndex, DetectionResponse>,
) {
	for intensity_channel in &channel.cross_channel.intensity_channels {
		let Some(reference) = references.get(intensity_channel) else {
			warn!("cross-channel intensity source {intensity_channel} has no results for this tile");
			continue;
		};
		let Some(original) = &reference.original else {
			continue;
		};
		for roi in response.results.iter_mut() {
			roi.measure_intensity(*intensity_channel, original);
		}
	}

	for count_channel in &channel.cross_channel.count_channels {
		let Some(reference) = references.get(count_channel) else {
			warn!("cross-channel count source {count_channel} has no results for this tile");
			continue;
		};
		for roi in response.results.iter_mut() {
			let count = reference
				.results
				.iter()
				.filter(|other| other.is_valid() && roi.overlaps(other))
				.count() as u64;
			roi.set_count(*count_channel, count);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use imagec_core::settings::{AnalyzeSettings, ThresholdMode};
	use imagec_reader::{FileInfoImages, OmeInfo, Resolution};

	fn entry_for(width: u32, height: u32, bits: u16, tile_capable: bool) -> ImageEntry {
		let mut ome = OmeInfo::new(1, vec![Resolution {
			width,
			height,
			bits,
			tile_capable,
		}]);
		ome.add_channel_dirs(0, 0, [0]);
		ImageEntry {
			index: 0,
			file: FileInfoImages {
				path: "/tmp/x_A01_01.tif".into(),
				decoder: if tile_capable {
					imagec_reader::Decoder::Tiff
				} else {
					imagec_reader::Decoder::Jpeg
				},
			},
			well: None,
			ome,
		}
	}

	#[test]
	fn small_resolutions_are_not_tiled() {
		let entry = entry_for(1000, 1000, 16, true);
		assert!(!is_tiled(&entry, 0));
	}

	#[test]
	fn huge_resolutions_are_tiled_when_the_decoder_allows_it() {
		let entry = entry_for(40_000, 40_000, 16, true);
		assert!(is_tiled(&entry, 0));
		let jpeg = entry_for(40_000, 40_000, 16, false);
		assert!(!is_tiled(&jpeg, 0));
	}

	#[test]
	fn image_filter_marks_possible_noise() {
		let mut settings = ChannelSettings::default();
		settings.image_filter.filter_mode = ImageFilterMode::ApplyFilter;
		settings.image_filter.max_objects = 0; // disabled
		let mut response = DetectionResponse::default();
		apply_image_filters(&settings, &mut response);
		assert!(response.validity.is_empty());
		assert!(!response.invalidate_whole_image);
	}

	#[test]
	fn histogram_filter_marks_wrong_threshold() {
		let mut settings = ChannelSettings::default();
		settings.image_filter.filter_mode = ImageFilterMode::InvalidateWholeImage;
		settings.image_filter.hist_min_threshold_filter_factor = 1.3;
		settings.detection.detection_mode = DetectionMode::Threshold;
		settings.detection.threshold.mode = ThresholdMode::Manual;
		settings.detection.threshold.threshold_min = 50;

		// Histogram peak at 40: filter threshold 52 > 50 -> mark.
		let mut response = DetectionResponse::default();
		response.original = Some(Raster::from_vec(4, 4, vec![40; 16]).unwrap());
		apply_image_filters(&settings, &mut response);
		assert!(response.validity.contains(ChannelValidity::PossibleWrongThreshold));
		assert!(response.invalidate_whole_image);

		// Histogram peak at 10: filter threshold 13 < 50 -> no mark.
		let mut response = DetectionResponse::default();
		response.original = Some(Raster::from_vec(4, 4, vec![10; 16]).unwrap());
		apply_image_filters(&settings, &mut response);
		assert!(!response.validity.contains(ChannelValidity::PossibleWrongThreshold));
	}

	#[test]
	fn virtual_channels_are_rejected() {
		let ctx = PipelineContext::new(AnalyzeSettings::default());
		let entry = entry_for(100, 100, 16, true);
		let mut settings = ChannelSettings::default();
		settings.meta.channel_idx = ChannelIndex::A;
		let tile = TileRect::of(entry.ome.resolution(0).unwrap(), 0, 0, 2048, 2048);
		let err = process_channel(
			&ctx,
			&entry,
			&settings,
			&tile,
			false,
			0,
			&BTreeMap::new(),
			&StopToken::new(),
		)
		.unwrap_err();
		assert!(matches!(err, EngineError::DetectorFailed { .. }));
	}
}
