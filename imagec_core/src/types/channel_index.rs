//! Logical channel slots. `Ch0`..`Ch9` are acquisition channels read
//! from the image file; `A`..`F` are virtual slots filled by
//! cross-channel pipeline steps (intersection, voronoi).

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum ChannelIndex {
	#[default]
	#[serde(rename = "None")]
	None,
	#[serde(rename = "0")]
	Ch0,
	#[serde(rename = "1")]
	Ch1,
	#[serde(rename = "2")]
	Ch2,
	#[serde(rename = "3")]
	Ch3,
	#[serde(rename = "4")]
	Ch4,
	#[serde(rename = "5")]
	Ch5,
	#[serde(rename = "6")]
	Ch6,
	#[serde(rename = "7")]
	Ch7,
	#[serde(rename = "8")]
	Ch8,
	#[serde(rename = "9")]
	Ch9,
	A,
	B,
	C,
	D,
	E,
	F,
}

impl ChannelIndex {
	/// Numeric identifier used as the `channel_id` database column and
	/// as the low 16 bits of a [`super::MeasureChannelId`]. `None` maps
	/// to 0 (the "self" channel `ME`), `Ch0`..`Ch9` to 1..10 and the
	/// virtual slots to their ASCII codes 65..70.
	pub fn id(self) -> u16 {
		match self {
			ChannelIndex::None => 0,
			ChannelIndex::Ch0 => 1,
			ChannelIndex::Ch1 => 2,
			ChannelIndex::Ch2 => 3,
			ChannelIndex::Ch3 => 4,
			ChannelIndex::Ch4 => 5,
			ChannelIndex::Ch5 => 6,
			ChannelIndex::Ch6 => 7,
			ChannelIndex::Ch7 => 8,
			ChannelIndex::Ch8 => 9,
			ChannelIndex::Ch9 => 10,
			ChannelIndex::A => 65,
			ChannelIndex::B => 66,
			ChannelIndex::C => 67,
			ChannelIndex::D => 68,
			ChannelIndex::E => 69,
			ChannelIndex::F => 70,
		}
	}

	pub fn from_id(id: u16) -> Option<ChannelIndex> {
		Some(match id {
			0 => ChannelIndex::None,
			1 => ChannelIndex::Ch0,
			2 => ChannelIndex::Ch1,
			3 => ChannelIndex::Ch2,
			4 => ChannelIndex::Ch3,
			5 => ChannelIndex::Ch4,
			6 => ChannelIndex::Ch5,
			7 => ChannelIndex::Ch6,
			8 => ChannelIndex::Ch7,
			9 => ChannelIndex::Ch8,
			10 => ChannelIndex::Ch9,
			65 => ChannelIndex::A,
			66 => ChannelIndex::B,
			67 => ChannelIndex::C,
			68 => ChannelIndex::D,
			69 => ChannelIndex::E,
			70 => ChannelIndex::F,
			_ => return None,
		})
	}

	/// Zero based source channel position in the image file. Only
	/// acquisition channels map to a position; virtual channels are
	/// produced by pipeline steps and never read from disk.
	pub fn source_channel(self) -> Option<u32> {
		match self {
			ChannelIndex::Ch0 => Some(0),
			ChannelIndex::Ch1 => Some(1),
			ChannelIndex::Ch2 => Some(2),
			ChannelIndex::Ch3 => Some(3),
			ChannelIndex::Ch4 => Some(4),
			ChannelIndex::Ch5 => Some(5),
			ChannelIndex::Ch6 => Some(6),
			ChannelIndex::Ch7 => Some(7),
			ChannelIndex::Ch8 => Some(8),
			ChannelIndex::Ch9 => Some(9),
			_ => None,
		}
	}

	pub fn is_virtual(self) -> bool {
		matches!(
			self,
			ChannelIndex::A | ChannelIndex::B | ChannelIndex::C | ChannelIndex::D | ChannelIndex::E | ChannelIndex::F
		)
	}
}

impl fmt::Display for ChannelIndex {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			ChannelIndex::None => "None",
			ChannelIndex::Ch0 => "0",
			ChannelIndex::Ch1 => "1",
			ChannelIndex::Ch2 => "2",
			ChannelIndex::Ch3 => "3",
			ChannelIndex::Ch4 => "4",
			ChannelIndex::Ch5 => "5",
			ChannelIndex::Ch6 => "6",
			ChannelIndex::Ch7 => "7",
			ChannelIndex::Ch8 => "8",
			ChannelIndex::Ch9 => "9",
			ChannelIndex::A => "A",
			ChannelIndex::B => "B",
			ChannelIndex::C => "C",
			ChannelIndex::D => "D",
			ChannelIndex::E => "E",
			ChannelIndex::F => "F",
		};
		write!(f, "{name}")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn id_roundtrip() {
		for id in [0u16, 1, 5, 10, 65, 70] {
			let ch = ChannelIndex::from_id(id).unwrap();
			assert_eq!(ch.id(), id);
		}
		assert_eq!(ChannelIndex::from_id(11), None);
		assert_eq!(ChannelIndex::from_id(64), None);
	}

	#[test]
	fn source_channel_only_for_acquisition_slots() {
		assert_eq!(ChannelIndex::Ch4.source_channel(), Some(4));
		assert_eq!(ChannelIndex::A.source_channel(), None);
		assert_eq!(ChannelIndex::None.source_channel(), None);
	}

	#[test]
	fn serde_names() {
		assert_eq!(serde_json::to_string(&ChannelIndex::Ch3).unwrap(), "\"3\"");
		assert_eq!(serde_json::to_string(&ChannelIndex::B).unwrap(), "\"B\"");
		let ch: ChannelIndex = serde_json::from_str("\"9\"").unwrap();
		assert_eq!(ch, ChannelIndex::Ch9);
	}
}
