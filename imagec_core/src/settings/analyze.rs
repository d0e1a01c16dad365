use super::{ChannelSettings, CrossChannelStep};
use crate::{EngineError, types::ChannelIndex};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

/// The declarative plan of one analysis run. Immutable for the life of
/// a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeSettings {
	pub channels: Vec<ChannelSettings>,
	pub experiment_meta: ExperimentSettings,
	pub cross_channel_steps: Vec<CrossChannelStep>,
	pub reporting: ReportingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExperimentSettings {
	pub plate_rows: u8,
	pub plate_cols: u8,
	/// Extracts the well position and image number from the file name.
	/// Groups: `_((row letter)(column number))_(image number)`.
	pub filename_regex: String,
	/// Matrix of image numbers as they are ordered within one well.
	/// First dimension rows, second columns.
	pub well_image_order: Vec<Vec<i32>>,
	pub scientists: Vec<String>,
	pub organisation: String,
	pub notes: String,
}

impl Default for ExperimentSettings {
	fn default() -> Self {
		ExperimentSettings {
			plate_rows: 16,
			plate_cols: 24,
			filename_regex: "_((.)([0-9]+))_([0-9]+)".to_string(),
			well_image_order: vec![
				vec![1, 2, 3, 4],
				vec![5, 6, 7, 8],
				vec![9, 10, 11, 12],
				vec![13, 14, 15, 16],
			],
			scientists: Vec::new(),
			organisation: String::new(),
			notes: String::new(),
		}
	}
}

/// Position of one image within the well's image matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePositionInWell {
	pub img: i32,
	pub x: i32,
	pub y: i32,
}

impl ExperimentSettings {
	pub fn group_regex(&self) -> Result<Regex> {
		Ok(Regex::new(&self.filename_regex)?)
	}

	/// Transforms the well image order matrix into a map from image
	/// number to its `(x, y)` position, together with the matrix size.
	///
	/// ```text
	///  | 0  1  2        [1] => {0,0}
	/// -|---------       [2] => {1,0}
	/// 0| 1  2  3        ...
	/// 1| 4  5  6        [9] => {2,2}
	/// 2| 7  8  9
	/// ```
	pub fn transform_matrix(&self) -> (BTreeMap<i32, ImagePositionInWell>, i32, i32) {
		let mut positions = BTreeMap::new();
		let size_y = self.well_image_order.len() as i32;
		let mut size_x = 0;
		for (y, row) in self.well_image_order.iter().enumerate() {
			for (x, img_nr) in row.iter().enumerate() {
				positions.insert(
					*img_nr,
					ImagePositionInWell {
						img: *img_nr,
						x: x as i32,
						y: y as i32,
					},
				);
				size_x = size_x.max(x as i32 + 1);
			}
		}
		(positions, size_x, size_y)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportingSettings {
	/// Edge lengths [px] of the square buckets used by image heatmaps.
	pub image_heatmap_area_sizes: Vec<u32>,
}

impl Default for ReportingSettings {
	fn default() -> Self {
		ReportingSettings {
			image_heatmap_area_sizes: vec![4096],
		}
	}
}

impl AnalyzeSettings {
	/// Parses and validates a settings document.
	pub fn from_json_file(path: &Path) -> Result<AnalyzeSettings, EngineError> {
		let text = std::fs::read_to_string(path).map_err(|err| EngineError::ConfigInvalid {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})?;
		let settings: AnalyzeSettings = serde_json::from_str(&text).map_err(|err| EngineError::ConfigInvalid {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})?;
		settings.validate().map_err(|err| EngineError::ConfigInvalid {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})?;
		Ok(settings)
	}

	pub fn to_json(&self) -> Result<String> {
		Ok(serde_json::to_string_pretty(self)?)
	}

	pub fn channel(&self, idx: ChannelIndex) -> Option<&ChannelSettings> {
		self.channels.iter().find(|ch| ch.meta.channel_idx == idx)
	}

	/// Checks cross references between channels and steps.
	pub fn validate(&self) -> Result<()> {
		use anyhow::{bail, ensure};

		self.experiment_meta.group_regex()?;

		let mut seen = Vec::new();
		for channel in &self.channels {
			let idx = channel.meta.channel_idx;
			ensure!(idx != ChannelIndex::None, "a channel has no slot assigned");
			ensure!(!idx.is_virtual(), "channel {idx} occupies a virtual slot");
			ensure!(!seen.contains(&idx), "channel {idx} is configured twice");
			seen.push(idx);
		}

		for channel in &self.channels {
			for reference in channel.reference_channels() {
				if self.channel(reference).is_none() {
					bail!(
						"channel {} references channel {reference}, which is not configured",
						channel.meta.channel_idx
					);
				}
			}
		}

		let mut outputs = Vec::new();
		for step in &self.cross_channel_steps {
			let out = step.output_channel();
			ensure!(out.is_virtual(), "step output {out} must be a virtual slot");
			ensure!(!outputs.contains(&out), "step output {out} is produced twice");
			for input in step.input_channels() {
				let known = self.channel(input).is_some() || outputs.contains(&input);
				ensure!(known, "step input {input} is neither a channel nor an earlier step output");
			}
			outputs.push(out);
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::settings::{DetectionMode, ThresholdMode};
	use pretty_assertions::assert_eq;

	fn two_channel_settings() -> AnalyzeSettings {
		let mut settings = AnalyzeSettings::default();
		let mut ch0 = ChannelSettings::default();
		ch0.meta.channel_idx = ChannelIndex::Ch0;
		ch0.detection.detection_mode = DetectionMode::Threshold;
		ch0.detection.threshold.mode = ThresholdMode::Manual;
		let mut ch1 = ChannelSettings::default();
		ch1.meta.channel_idx = ChannelIndex::Ch1;
		settings.channels = vec![ch0, ch1];
		settings
	}

	#[test]
	fn roundtrip() {
		let mut settings = two_channel_settings();
		settings.cross_channel_steps = vec![CrossChannelStep::Intersection {
			output_channel: ChannelIndex::A,
			input_channels: vec![ChannelIndex::Ch0, ChannelIndex::Ch1],
			min_intersection: 0.1,
		}];
		let json = settings.to_json().unwrap();
		let parsed: AnalyzeSettings = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, settings);
	}

	#[test]
	fn validate_accepts_chained_steps() {
		let mut settings = two_channel_settings();
		settings.cross_channel_steps = vec![
			CrossChannelStep::Intersection {
				output_channel: ChannelIndex::A,
				input_channels: vec![ChannelIndex::Ch0, ChannelIndex::Ch1],
				min_intersection: 0.1,
			},
			CrossChannelStep::Voronoi {
				output_channel: ChannelIndex::B,
				points_channel: ChannelIndex::A,
				max_radius: 60,
			},
		];
		settings.validate().unwrap();
	}

	#[test]
	fn validate_rejects_duplicate_channel() {
		let mut settings = two_channel_settings();
		settings.channels[1].meta.channel_idx = ChannelIndex::Ch0;
		assert!(settings.validate().is_err());
	}

	#[test]
	fn validate_rejects_unknown_reference() {
		let mut settings = two_channel_settings();
		settings.channels[0].object_filter.reference_spot_channel_index = ChannelIndex::Ch5;
		assert!(settings.validate().is_err());
	}

	#[test]
	fn validate_rejects_non_virtual_step_output() {
		let mut settings = two_channel_settings();
		settings.cross_channel_steps = vec![CrossChannelStep::Voronoi {
			output_channel: ChannelIndex::Ch1,
			points_channel: ChannelIndex::Ch0,
			max_radius: -1,
		}];
		assert!(settings.validate().is_err());
	}

	#[test]
	fn transform_matrix_maps_image_numbers() {
		let (positions, size_x, size_y) = ExperimentSettings::default().transform_matrix();
		assert_eq!((size_x, size_y), (4, 4));
		assert_eq!(positions[&1], ImagePositionInWell { img: 1, x: 0, y: 0 });
		assert_eq!(positions[&6], ImagePositionInWell { img: 6, x: 1, y: 1 });
		assert_eq!(positions[&16], ImagePositionInWell { img: 16, x: 3, y: 3 });
	}
}
