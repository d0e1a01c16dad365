use crate::types::ChannelIndex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings of one logical channel: identity, preprocessing chain,
/// detection configuration and object/image filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelSettings {
	pub meta: ChannelMeta,
	pub preprocessing: PreprocessingSettings,
	pub detection: DetectionSettings,
	pub object_filter: ObjectFilterSettings,
	pub image_filter: ImageFilterSettings,
	pub cross_channel: CrossChannelSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChannelMeta {
	/// Logical slot this channel occupies.
	pub channel_idx: ChannelIndex,
	/// Series index within the image file.
	pub series: u16,
	pub name: String,
	/// Display colour as `#RRGGBB`; used for control image overlays.
	pub color: String,
}

impl Default for ChannelMeta {
	fn default() -> Self {
		ChannelMeta {
			channel_idx: ChannelIndex::None,
			series: 0,
			name: String::new(),
			color: "#FF0000".to_string(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ZProjectMethod {
	#[default]
	None,
	MaxIntensity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct PreprocessingSettings {
	/// Applied once at tile ingress across the Z directories.
	pub z_stack: ZProjectMethod,
	/// Pixel operators in configured order; each sees the output of the
	/// previous one.
	pub pipeline: Vec<PreprocessingStep>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKernel {
	#[default]
	Sobel,
	Canny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum EdgeDirection {
	#[default]
	Xy,
	X,
	Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum BallType {
	#[default]
	Ball,
	Paraboloid,
}

/// One configured preprocessing operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PreprocessingStep {
	#[serde(rename_all = "camelCase")]
	SubtractChannel { channel_idx: ChannelIndex },
	#[serde(rename_all = "camelCase")]
	EdgeDetection { kernel: EdgeKernel, direction: EdgeDirection },
	#[serde(rename_all = "camelCase")]
	GaussianBlur { kernel_size: u8, sigma: f32 },
	#[serde(rename_all = "camelCase")]
	MedianSubtract { kernel_size: u8 },
	#[serde(rename_all = "camelCase")]
	RollingBall { radius: u32, ball_type: BallType },
	#[serde(rename_all = "camelCase")]
	Blur { kernel_size: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum DetectionMode {
	#[default]
	Threshold,
	Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionSettings {
	pub detection_mode: DetectionMode,
	pub threshold: ThresholdSettings,
	pub ai: AiSettings,
}

/// Threshold algorithm family. Modes without a native implementation
/// fall back to `Manual` with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ThresholdMode {
	#[default]
	Manual,
	Li,
	MinError,
	Triangle,
	Moments,
	Otsu,
	Huang,
	Intermodes,
	Isodata,
	MaxEntropy,
	Mean,
	Minimum,
	Percentile,
	RenyiEntropy,
	Shanbhag,
	Yen,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdSettings {
	pub mode: ThresholdMode,
	/// Lower bound; also the seed value for the automatic algorithms.
	pub threshold_min: u16,
	pub threshold_max: u16,
	pub watershed_segmentation: bool,
}

impl Default for ThresholdSettings {
	fn default() -> Self {
		ThresholdSettings {
			mode: ThresholdMode::Manual,
			threshold_min: 0,
			threshold_max: u16::MAX,
			watershed_segmentation: false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AiSettings {
	pub model_path: PathBuf,
	/// Class ids to keep; empty keeps all classes.
	pub class_filter: Vec<u32>,
	pub confidence_threshold: f32,
	pub class_threshold: f32,
	pub nms_threshold: f32,
	pub input_width: u32,
	pub input_height: u32,
}

impl Default for AiSettings {
	fn default() -> Self {
		AiSettings {
			model_path: PathBuf::new(),
			class_filter: Vec::new(),
			confidence_threshold: 0.25,
			class_threshold: 0.5,
			nms_threshold: 0.45,
			input_width: 640,
			input_height: 640,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectFilterSettings {
	/// Particles with a smaller area [px²] are marked too small.
	pub min_particle_size: u64,
	/// Particles with a bigger area [px²] are marked too big.
	pub max_particle_size: u64,
	/// Minimum circularity in [0, 1].
	pub min_circularity: f32,
	/// Tolerance radius [px] around each particle used by the coloc
	/// algorithms.
	pub snap_area_size: u32,
	/// If set, particles intersecting this channel's detections are
	/// marked as reference spots.
	pub reference_spot_channel_index: ChannelIndex,
}

impl Default for ObjectFilterSettings {
	fn default() -> Self {
		ObjectFilterSettings {
			min_particle_size: 0,
			max_particle_size: u64::MAX,
			min_circularity: 0.0,
			snap_area_size: 0,
			reference_spot_channel_index: ChannelIndex::None,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum ImageFilterMode {
	#[default]
	Off,
	/// Tag the response only.
	ApplyFilter,
	/// Tag and invalidate the whole image-channel.
	InvalidateWholeImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ImageFilterSettings {
	pub filter_mode: ImageFilterMode,
	/// More detections than this marks the response as possible noise;
	/// 0 disables the check.
	pub max_objects: u64,
	/// Histogram plausibility: if `hist peak index × factor` exceeds the
	/// configured threshold minimum the response is marked as a possible
	/// wrong threshold; 0 disables the check.
	pub hist_min_threshold_filter_factor: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct CrossChannelSettings {
	/// Channels whose original pixels are sampled under every detected
	/// mask (min/avg/max).
	pub intensity_channels: Vec<ChannelIndex>,
	/// Channels whose detections are counted per object.
	pub count_channels: Vec<ChannelIndex>,
}

impl ChannelSettings {
	/// Channels that must be processed before this one within the same
	/// tile: reference spot, cross intensity and cross count sources.
	pub fn reference_channels(&self) -> Vec<ChannelIndex> {
		let mut refs = Vec::new();
		if self.object_filter.reference_spot_channel_index != ChannelIndex::None {
			refs.push(self.object_filter.reference_spot_channel_index);
		}
		for ch in &self.cross_channel.intensity_channels {
			if !refs.contains(ch) {
				refs.push(*ch);
			}
		}
		for ch in &self.cross_channel.count_channels {
			if !refs.contains(ch) {
				refs.push(*ch);
			}
		}
		refs
	}
}
