use crate::types::ChannelIndex;
use serde::{Deserialize, Serialize};

/// Declaration of one cross-channel pipeline step. Steps run in
/// declared order after all channels of a tile completed; each step's
/// output is inserted under its output channel before the next runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CrossChannelStep {
	/// Iteratively intersects the detections of the input channels and
	/// emits the surviving ROIs into the output channel.
	#[serde(rename_all = "camelCase")]
	Intersection {
		output_channel: ChannelIndex,
		input_channels: Vec<ChannelIndex>,
		min_intersection: f32,
	},
	/// Builds a voronoi tessellation over the centres of the valid
	/// detections of the points channel. Each cell is clipped by a disc
	/// of `max_radius` if positive.
	#[serde(rename_all = "camelCase")]
	Voronoi {
		output_channel: ChannelIndex,
		points_channel: ChannelIndex,
		max_radius: i32,
	},
}

impl CrossChannelStep {
	pub fn output_channel(&self) -> ChannelIndex {
		match self {
			CrossChannelStep::Intersection { output_channel, .. } | CrossChannelStep::Voronoi { output_channel, .. } => {
				*output_channel
			}
		}
	}

	/// Channels this step reads from.
	pub fn input_channels(&self) -> Vec<ChannelIndex> {
		match self {
			CrossChannelStep::Intersection { input_channels, .. } => input_channels.clone(),
			CrossChannelStep::Voronoi { points_channel, .. } => vec![*points_channel],
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn roundtrip() {
		let step = CrossChannelStep::Intersection {
			output_channel: ChannelIndex::A,
			input_channels: vec![ChannelIndex::Ch0, ChannelIndex::Ch1],
			min_intersection: 0.1,
		};
		let json = serde_json::to_string(&step).unwrap();
		let parsed: CrossChannelStep = serde_json::from_str(&json).unwrap();
		assert_eq!(parsed, step);
		assert!(json.contains("\"type\":\"intersection\""));
	}

	#[test]
	fn accessors() {
		let step = CrossChannelStep::Voronoi {
			output_channel: ChannelIndex::B,
			points_channel: ChannelIndex::Ch2,
			max_radius: -1,
		};
		assert_eq!(step.output_channel(), ChannelIndex::B);
		assert_eq!(step.input_channels(), vec![ChannelIndex::Ch2]);
	}
}
