//! Persisting detection responses into the result database and the
//! control image tree.

use crate::context::ImageEntry;
use imagec_core::{
	EngineError,
	types::{ChannelIndex, ChannelValidity, validity_bits},
};
use imagec_detection::DetectionResponse;
use imagec_results::{Database, ImageChannelMeta, ObjectRecord, substitute_tile_id};
use log::warn;
use std::path::Path;

/// Relative template of a channel's control images, with the literal
/// `${tile_id}` placeholder kept for consumers.
pub fn control_image_template(image_id: u64, channel_id: u16) -> String {
	format!("control_images/{image_id}/{channel_id}/tile_${{tile_id}}.png")
}

/// Writes the control image of one tile below the job folder. Failures
/// are logged, not fatal: the detections themselves are already safe.
pub fn write_control_image(output_dir: &Path, template: &str, tile_id: u16, response: &DetectionResponse) {
	let Some(control) = &response.control_image else {
		return;
	};
	let path = output_dir.join(substitute_tile_id(template, tile_id));
	if let Some(parent) = path.parent()
		&& let Err(err) = std::fs::create_dir_all(parent)
	{
		warn!("cannot create control image directory {parent:?}: {err}");
		return;
	}
	if let Err(err) = control.save(&path) {
		warn!("cannot write control image {path:?}: {err}");
	}
}

/// Upserts the image-channel row and inserts the response's objects
/// for one tile.
pub fn persist_response(
	db: &Database,
	analyze_id: &str,
	entry: &ImageEntry,
	channel: ChannelIndex,
	tile_id: u16,
	response: &DetectionResponse,
) -> Result<(), EngineError> {
	let image_id = entry.image_id();
	let channel_id = channel.id();

	db.upsert_image_channel(&ImageChannelMeta {
		analyze_id: analyze_id.to_string(),
		image_id,
		channel_id,
		validity: response.validity,
		invalidate_all: response.invalidate_whole_image,
		control_image_path: control_image_template(image_id, channel_id),
	})?;

	let objects: Vec<ObjectRecord> = response
		.results
		.iter()
		.map(|roi| ObjectRecord {
			object_id: roi.index(),
			validity: validity_bits(roi.validity()),
			values: roi.measures(),
		})
		.collect();
	db.insert_objects(analyze_id, image_id, channel_id, tile_id, &objects)
}

/// Records an image-channel that failed detection: no objects, whole
/// channel invalidated.
pub fn persist_failure(
	db: &Database,
	analyze_id: &str,
	entry: &ImageEntry,
	channel: ChannelIndex,
	validity: enumset::EnumSet<ChannelValidity>,
) -> Result<(), EngineError> {
	let image_id = entry.image_id();
	let channel_id = channel.id();
	db.upsert_image_channel(&ImageChannelMeta {
		analyze_id: analyze_id.to_string(),
		image_id,
		channel_id,
		validity,
		invalidate_all: true,
		control_image_path: control_image_template(image_id, channel_id),
	})
}
