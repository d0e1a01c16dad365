//! TIFF adapter.
//!
//! Plain (non OME) TIFF stacks are interpreted directory-wise: each
//! IFD is one plane. Without OME-XML the adapter maps channel `c` to
//! directory `c` with a single Z plane, which matches how flat
//! microscope exports are written.

use crate::{
	ome::{OmeInfo, Resolution, TileRect},
	traits::ImageReader,
};
use anyhow::{Context, Result, bail, ensure};
use imagec_image::Raster;
use std::{fs::File, io::BufReader, path::PathBuf};
use tiff::decoder::{Decoder, DecodingResult};

pub struct TiffReader {
	path: PathBuf,
}

impl TiffReader {
	pub fn open(path: PathBuf) -> Result<TiffReader> {
		ensure!(path.exists(), "file {path:?} does not exist");
		// Probe the container once so a broken file fails at open time.
		let reader = TiffReader { path };
		reader.decoder()?;
		Ok(reader)
	}

	fn decoder(&self) -> Result<Decoder<BufReader<File>>> {
		let file = File::open(&self.path).with_context(|| format!("opening {:?}", self.path))?;
		Decoder::new(BufReader::new(file)).with_context(|| format!("decoding {:?}", self.path))
	}

	fn read_directory(&self, z_dir: u32) -> Result<Raster> {
		let mut decoder = self.decoder()?;
		decoder
			.seek_to_image(z_dir as usize)
			.with_context(|| format!("{:?} has no directory {z_dir}", self.path))?;
		let (width, height) = decoder.dimensions()?;
		let raster = match decoder.read_image()? {
			DecodingResult::U16(data) => Raster::from_vec(width, height, data)?,
			DecodingResult::U8(data) => {
				// Widen to the full 16 bit range.
				Raster::from_vec(width, height, data.into_iter().map(|v| u16::from(v) << 8).collect())?
			}
			_ => bail!("{:?}: unsupported TIFF sample format", self.path),
		};
		Ok(raster)
	}
}

impl ImageReader for TiffReader {
	fn read_ome(&self) -> Result<OmeInfo> {
		let mut decoder = self.decoder()?;
		let (width, height) = decoder.dimensions()?;
		let bits = match decoder.colortype()? {
			tiff::ColorType::Gray(bits) => bits,
			other => bail!("{:?}: unsupported TIFF color type {other:?}", self.path),
		};

		let mut directories = 1u32;
		while decoder.more_images() {
			decoder.next_image()?;
			directories += 1;
		}

		let mut ome = OmeInfo::new(1, vec![Resolution {
			width,
			height,
			bits: u16::from(bits),
			tile_capable: true,
		}]);
		for dir in 0..directories {
			ome.add_channel_dirs(dir, 0, [dir]);
		}
		Ok(ome)
	}

	fn read_tile(&self, _series: u16, z_dir: u32, tile: &TileRect, resolution: u16) -> Result<Raster> {
		ensure!(resolution == 0, "plain TIFF has a single resolution level");
		let plane = self.read_directory(z_dir)?;
		Ok(plane.view(&tile.rect))
	}

	fn read_entire(&self, _series: u16, z_dir: u32, resolution: u16) -> Result<Raster> {
		ensure!(resolution == 0, "plain TIFF has a single resolution level");
		self.read_directory(z_dir)
	}

	fn read_thumbnail(&self, series: u16, z_dir: u32) -> Result<Raster> {
		let plane = self.read_entire(series, z_dir, 0)?;
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
