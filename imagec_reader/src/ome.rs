//! OME style image metadata: resolutions, bit depth, byte footprint,
//! the tile grid and the channel to Z-directory map.

use anyhow::{Result, ensure};
use imagec_core::types::Rect;
use std::collections::{BTreeMap, BTreeSet};

/// One resolution level of one series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
	pub width: u32,
	pub height: u32,
	/// Bits per pixel, 8 or 16.
	pub bits: u16,
	/// Whether the decoder can serve sub-rectangles of this level
	/// without loading the whole plane.
	pub tile_capable: bool,
}

impl Resolution {
	/// Byte footprint of one fully decoded plane.
	pub fn memory_usage(&self) -> u64 {
		u64::from(self.width) * u64::from(self.height) * u64::from(self.bits / 8).max(1)
	}

	/// Number of composite tiles in x and y for the given tile size.
	pub fn tile_count(&self, tile_width: u32, tile_height: u32) -> (u32, u32) {
		let x = self.width.div_ceil(tile_width).max(1);
		let y = self.height.div_ceil(tile_height).max(1);
		(x, y)
	}
}

/// Pixel rectangle of one composite tile, clamped at the image border.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
	pub tile_x: u32,
	pub tile_y: u32,
	pub rect: Rect,
}

impl TileRect {
	pub fn of(resolution: &Resolution, tile_x: u32, tile_y: u32, tile_width: u32, tile_height: u32) -> TileRect {
		let x = tile_x * tile_width;
		let y = tile_y * tile_height;
		let width = tile_width.min(resolution.width.saturating_sub(x));
		let height = tile_height.min(resolution.height.saturating_sub(y));
		TileRect {
			tile_x,
			tile_y,
			rect: Rect::new(x as i32, y as i32, width, height),
		}
	}

	/// Linear tile id in row major order.
	pub fn id(&self, tiles_x: u32) -> u16 {
		(self.tile_y * tiles_x + self.tile_x) as u16
	}
}

/// Metadata of one image file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OmeInfo {
	pub series_count: u32,
	/// Resolution pyramid of the primary series, level 0 first.
	pub resolutions: Vec<Resolution>,
	/// Maps `(channel, time frame)` to the ordered set of Z
	/// directories holding its planes.
	channel_dirs: BTreeMap<(u32, u32), BTreeSet<u32>>,
}

impl OmeInfo {
	pub fn new(series_count: u32, resolutions: Vec<Resolution>) -> OmeInfo {
		OmeInfo {
			series_count,
			resolutions,
			channel_dirs: BTreeMap::new(),
		}
	}

	pub fn add_channel_dirs(&mut self, channel: u32, time_frame: u32, dirs: impl IntoIterator<Item = u32>) {
		self.channel_dirs.entry((channel, time_frame)).or_default().extend(dirs);
	}

	/// Ordered Z directories of one channel. Empty channels are an
	/// error: a configured channel must exist in the file.
	pub fn tif_dirs(&self, channel: u32, time_frame: u32) -> Result<BTreeSet<u32>> {
		let dirs = self.channel_dirs.get(&(channel, time_frame)).cloned().unwrap_or_default();
		ensure!(!dirs.is_empty(), "selected channel {channel} does not contain images");
		Ok(dirs)
	}

	pub fn channel_count(&self) -> u32 {
		self
			.channel_dirs
			.keys()
			.map(|(channel, _)| channel + 1)
			.max()
			.unwrap_or(0)
	}

	pub fn resolution(&self, level: u16) -> Result<&Resolution> {
		self
			.resolutions
			.get(level as usize)
			.ok_or_else(|| anyhow::anyhow!("resolution level {level} does not exist"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn resolution(width: u32, height: u32) -> Resolution {
		Resolution {
			width,
			height,
			bits: 16,
			tile_capable: true,
		}
	}

	#[test]
	fn memory_usage_accounts_for_bit_depth() {
		assert_eq!(resolution(100, 50).memory_usage(), 100 * 50 * 2);
		let mut res8 = resolution(100, 50);
		res8.bits = 8;
		assert_eq!(res8.memory_usage(), 100 * 50);
	}

	#[test]
	fn tile_count_rounds_up() {
		assert_eq!(resolution(4096, 4096).tile_count(2048, 2048), (2, 2));
		assert_eq!(resolution(4097, 2048).tile_count(2048, 2048), (3, 1));
		assert_eq!(resolution(100, 100).tile_count(2048, 2048), (1, 1));
	}

	#[test]
	fn tile_rect_is_clamped_at_the_border() {
		let res = resolution(3000, 2500);
		let tile = TileRect::of(&res, 1, 1, 2048, 2048);
		assert_eq!(tile.rect, Rect::new(2048, 2048, 952, 452));
		assert_eq!(tile.id(2), 3);
	}

	#[test]
	fn tif_dirs_of_missing_channel_is_an_error() {
		let mut ome = OmeInfo::new(1, vec![resolution(10, 10)]);
		ome.add_channel_dirs(0, 0, [0, 1, 2]);
		assert_eq!(ome.tif_dirs(0, 0).unwrap().len(), 3);
		assert!(ome.tif_dirs(1, 0).is_err());
		assert_eq!(ome.channel_count(), 1);
	}
}
