//! Measure-channel ids name the columns of an object's value vector.
//!
//! A [`MeasureChannelId`] packs a [`MeasureChannel`] into the high 16
//! bits and the referenced [`ChannelIndex`] id into the low 16 bits.
//! The packed `u32` is the sole key used in the persisted value map,
//! which lets every aggregation query address any measurement the same
//! way.

use super::ChannelIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MeasureChannel {
	Confidence = 1,
	AreaSize = 2,
	Perimeter = 3,
	Circularity = 4,
	CenterOfMassX = 5,
	CenterOfMassY = 6,
	BoundingBoxWidth = 7,
	BoundingBoxHeight = 8,
	IntensityAvg = 9,
	IntensityMin = 10,
	IntensityMax = 11,
	CrossChannelIntensityAvg = 12,
	CrossChannelIntensityMin = 13,
	CrossChannelIntensityMax = 14,
	CrossChannelCount = 15,
}

impl MeasureChannel {
	pub fn from_raw(raw: u16) -> Option<MeasureChannel> {
		use MeasureChannel::*;
		Some(match raw {
			1 => Confidence,
			2 => AreaSize,
			3 => Perimeter,
			4 => Circularity,
			5 => CenterOfMassX,
			6 => CenterOfMassY,
			7 => BoundingBoxWidth,
			8 => BoundingBoxHeight,
			9 => IntensityAvg,
			10 => IntensityMin,
			11 => IntensityMax,
			12 => CrossChannelIntensityAvg,
			13 => CrossChannelIntensityMin,
			14 => CrossChannelIntensityMax,
			15 => CrossChannelCount,
			_ => return None,
		})
	}
}

const MEASURE_SHIFT: u32 = 16;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MeasureChannelId(u32);

impl MeasureChannelId {
	pub fn new(measure: MeasureChannel, channel: ChannelIndex) -> MeasureChannelId {
		MeasureChannelId(((measure as u32) << MEASURE_SHIFT) | u32::from(channel.id()))
	}

	/// A measurement of the object itself (referenced channel `ME`).
	pub fn own(measure: MeasureChannel) -> MeasureChannelId {
		MeasureChannelId::new(measure, ChannelIndex::None)
	}

	pub fn from_key(key: u32) -> MeasureChannelId {
		MeasureChannelId(key)
	}

	pub fn key(self) -> u32 {
		self.0
	}

	pub fn measure(self) -> Option<MeasureChannel> {
		MeasureChannel::from_raw((self.0 >> MEASURE_SHIFT) as u16)
	}

	pub fn channel_id(self) -> u16 {
		(self.0 & 0xFFFF) as u16
	}
}

impl fmt::Debug for MeasureChannelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.measure() {
			Some(measure) => write!(f, "MeasureChannelId({measure:?}, ch {})", self.channel_id()),
			None => write!(f, "MeasureChannelId(raw {:#x})", self.0),
		}
	}
}

impl fmt::Display for MeasureChannelId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self.measure() {
			Some(MeasureChannel::Confidence) => "Confidence",
			Some(MeasureChannel::AreaSize) => "Area size",
			Some(MeasureChannel::Perimeter) => "Perimeter",
			Some(MeasureChannel::Circularity) => "Circularity",
			Some(MeasureChannel::CenterOfMassX) => "X",
			Some(MeasureChannel::CenterOfMassY) => "Y",
			Some(MeasureChannel::BoundingBoxWidth) => "Bounding box width",
			Some(MeasureChannel::BoundingBoxHeight) => "Bounding box height",
			Some(MeasureChannel::IntensityAvg | MeasureChannel::CrossChannelIntensityAvg) => "Intensity AVG",
			Some(MeasureChannel::IntensityMin | MeasureChannel::CrossChannelIntensityMin) => "Intensity Min",
			Some(MeasureChannel::IntensityMax | MeasureChannel::CrossChannelIntensityMax) => "Intensity Max",
			Some(MeasureChannel::CrossChannelCount) => "Cross count",
			None => "Unknown",
		};
		match ChannelIndex::from_id(self.channel_id()) {
			Some(ChannelIndex::None) | None => write!(f, "{name}"),
			Some(ch) => write!(f, "{name}({ch})"),
		}
	}
}

/// Statistics selectable for aggregation queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stats {
	Avg,
	Median,
	Sum,
	Min,
	Max,
	StdDev,
	Count,
}

impl Stats {
	/// SQL aggregate over the first element of the addressed value list.
	/// The measurement key is bound as the statement's first parameter.
	pub fn sql_term(self) -> &'static str {
		match self {
			Stats::Avg => "AVG(element_at(\"values\", ?)[1])",
			Stats::Median => "MEDIAN(element_at(\"values\", ?)[1])",
			Stats::Sum => "SUM(element_at(\"values\", ?)[1])",
			Stats::Min => "MIN(element_at(\"values\", ?)[1])",
			Stats::Max => "MAX(element_at(\"values\", ?)[1])",
			Stats::StdDev => "STDDEV(element_at(\"values\", ?)[1])",
			Stats::Count => "COUNT(element_at(\"values\", ?)[1])",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn packing() {
		let id = MeasureChannelId::new(MeasureChannel::CrossChannelCount, ChannelIndex::Ch4);
		assert_eq!(id.key(), (15 << 16) | 5);
		assert_eq!(id.measure(), Some(MeasureChannel::CrossChannelCount));
		assert_eq!(id.channel_id(), 5);
	}

	#[test]
	fn own_measure_references_me() {
		let id = MeasureChannelId::own(MeasureChannel::AreaSize);
		assert_eq!(id.channel_id(), 0);
		assert_eq!(id.key(), 2 << 16);
	}

	#[test]
	fn display_names() {
		assert_eq!(
			MeasureChannelId::new(MeasureChannel::CrossChannelCount, ChannelIndex::Ch0).to_string(),
			"Cross count(0)"
		);
		assert_eq!(MeasureChannelId::own(MeasureChannel::Circularity).to_string(), "Circularity");
	}

	#[test]
	fn unknown_measure_is_none() {
		assert_eq!(MeasureChannelId::from_key(0xFFFF_0000).measure(), None);
	}
}
