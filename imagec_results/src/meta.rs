//! Plain record types mirroring the database rows.

use enumset::EnumSet;
use imagec_core::types::{ChannelValidity, MeasureChannelId};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalyzeMeta {
	pub analyze_id: String,
	pub run_id: String,
	pub name: String,
	pub timestamp: String,
	pub scientists: Vec<String>,
	pub organisation: String,
	pub notes: String,
	pub settings_json: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlateMeta {
	pub analyze_id: String,
	pub plate_id: u8,
	pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GroupMeta {
	pub analyze_id: String,
	pub plate_id: u8,
	/// Packed well position: low byte x, high byte y.
	pub group_id: u16,
	pub well_pos_x: u8,
	pub well_pos_y: u8,
	pub name: String,
	pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageMeta {
	pub analyze_id: String,
	pub image_id: u64,
	/// Image number within its well, as extracted from the file name.
	pub image_idx: u32,
	pub file_name: String,
	pub original_file_path: PathBuf,
	pub width: u64,
	pub height: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChannelMeta {
	pub analyze_id: String,
	pub channel_id: u16,
	pub name: String,
	/// Measure channels this channel emits per object.
	pub measurements: Vec<MeasureChannelId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageChannelMeta {
	pub analyze_id: String,
	pub image_id: u64,
	pub channel_id: u16,
	pub validity: EnumSet<ChannelValidity>,
	pub invalidate_all: bool,
	/// Path template with a literal `${tile_id}` placeholder.
	pub control_image_path: String,
}

/// One object as persisted: a dense id, its validity bits and the value
/// vector keyed by measure channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectRecord {
	pub object_id: u32,
	pub validity: u32,
	pub values: BTreeMap<MeasureChannelId, Vec<f64>>,
}

/// Replaces the literal `${tile_id}` placeholder of a control image
/// path template.
pub fn substitute_tile_id(template: &str, tile_id: u16) -> String {
	template.replace("${tile_id}", &tile_id.to_string())
}
