//! Plate positions derived from image file names.
//!
//! A well is addressed by a `(x, y)` pair on the plate. The persisted
//! `group_id` packs the position into 16 bits: low byte x, high byte y.
//! The position itself is extracted from the file name with the
//! experiment's filename regex, whose groups are
//! `_((row letter)(column number))_(image number)`, e.g. `_A10_01`.

use anyhow::{Context, Result, bail};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WellPosition {
	/// Column on the plate, 1 based ("10" in `A10`).
	pub x: u8,
	/// Row on the plate, 1 based ("A" in `A10` is row 1).
	pub y: u8,
	/// Image number within the well, as matched by the trailing group.
	pub image_nr: u32,
}

impl WellPosition {
	/// Packed 16 bit group id: low byte x, high byte y.
	pub fn group_id(&self) -> u16 {
		u16::from(self.x) | (u16::from(self.y) << 8)
	}

	pub fn from_group_id(group_id: u16) -> WellPosition {
		WellPosition {
			x: (group_id & 0xFF) as u8,
			y: (group_id >> 8) as u8,
			image_nr: 0,
		}
	}

	/// Extracts the well position from a file name.
	///
	/// The regex must expose the row letter as its second group, the
	/// column number as its third and the image number as its fourth,
	/// matching the default pattern `_((.)([0-9]+))_([0-9]+)`.
	pub fn from_filename(regex: &Regex, filename: &str) -> Result<WellPosition> {
		let caps = regex
			.captures(filename)
			.with_context(|| format!("filename {filename:?} does not match the group regex"))?;

		let row = caps
			.get(2)
			.and_then(|m| m.as_str().chars().next())
			.with_context(|| format!("filename {filename:?}: missing row letter group"))?;
		let row = row.to_ascii_uppercase();
		if !row.is_ascii_uppercase() {
			bail!("filename {filename:?}: row {row:?} is not a letter");
		}

		let col: u8 = caps
			.get(3)
			.with_context(|| format!("filename {filename:?}: missing column group"))?
			.as_str()
			.parse()
			.with_context(|| format!("filename {filename:?}: column is not a number"))?;

		let image_nr: u32 = caps.get(4).map_or(Ok(0), |m| m.as_str().parse()).unwrap_or(0);

		Ok(WellPosition {
			x: col,
			y: row as u8 - b'A' + 1,
			image_nr,
		})
	}

	/// Label like `A10` used by report headers.
	pub fn label(&self) -> String {
		format!("{}{}", (b'A' + self.y - 1) as char, self.x)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn default_regex() -> Regex {
		Regex::new("_((.)([0-9]+))_([0-9]+)").unwrap()
	}

	#[test]
	fn parses_well_from_filename() {
		let pos = WellPosition::from_filename(&default_regex(), "plate1_A10_02.vsi").unwrap();
		assert_eq!(pos.x, 10);
		assert_eq!(pos.y, 1);
		assert_eq!(pos.image_nr, 2);
		assert_eq!(pos.label(), "A10");
	}

	#[test]
	fn group_id_packs_x_low_y_high() {
		let pos = WellPosition::from_filename(&default_regex(), "x_C07_01.tif").unwrap();
		assert_eq!(pos.group_id(), (3 << 8) | 7);
		let back = WellPosition::from_group_id(pos.group_id());
		assert_eq!((back.x, back.y), (7, 3));
	}

	#[test]
	fn rejects_unmatched_filename() {
		assert!(WellPosition::from_filename(&default_regex(), "no-well-here.tif").is_err());
	}
}
