//! JPEG adapter. JPEGs are always loaded whole and carry a single
//! plane; the 8 bit samples are widened to the 16 bit range.

use crate::{
	ome::{OmeInfo, Resolution, TileRect},
	traits::ImageReader,
};
use anyhow::{Context, Result, ensure};
use imagec_image::Raster;
use std::path::PathBuf;

pub struct JpegReader {
	path: PathBuf,
}

impl JpegReader {
	pub fn open(path: PathBuf) -> Result<JpegReader> {
		ensure!(path.exists(), "file {path:?} does not exist");
		Ok(JpegReader { path })
	}

	fn load(&self) -> Result<Raster> {
		let img = image::open(&self.path).with_context(|| format!("decoding {:?}", self.path))?;
		Ok(Raster::from_luma16(img.to_luma16()))
	}
}

impl ImageReader for JpegReader {
	fn read_ome(&self) -> Result<OmeInfo> {
		let dims = image::image_dimensions(&self.path).with_context(|| format!("probing {:?}", self.path))?;
		let mut ome = OmeInfo::new(1, vec![Resolution {
			width: dims.0,
			height: dims.1,
			bits: 8,
			tile_capable: false,
		}]);
		ome.add_channel_dirs(0, 0, [0]);
		Ok(ome)
	}

	fn read_tile(&self, _series: u16, _z_dir: u32, tile: &TileRect, resolution: u16) -> Result<Raster> {
		ensure!(resolution == 0, "JPEG has a single resolution level");
		Ok(self.load()?.view(&tile.rect))
	}

	fn read_entire(&self, _series: u16, _z_dir: u32, resolution: u16) -> Result<Raster> {
		ensure!(resolution == 0, "JPEG has a single resolution level");
		self.load()
	}

	fn read_thumbnail(&self, _series: u16, _z_dir: u32) -> Result<Raster> {
		let plane = self.load()?;
		let stride = (plane.width().max(plane.height()) / 256).max(1);
		let width = (plane.width() / stride).max(1);
		let height = (plane.height() / stride).max(1);
		let mut data = Vec::with_capacity((width * height) as usize);
		for y in 0..height {
			for x in 0..width {
				data.push(plane.get(x * stride, y * stride));
			}
		}
		Raster::from_vec(width, height, data)
	}
}
