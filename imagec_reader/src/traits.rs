//! The reader capability set.

use crate::ome::{OmeInfo, TileRect};
use anyhow::Result;
use imagec_image::Raster;

/// Uniform access to one opened image file.
///
/// A reader serves 16 bit single channel planes; 8 bit sources are
/// widened on load. `read_tile` is only required to be cheap when the
/// metadata reports the resolution as tile capable, but it must always
/// return exactly the requested rectangle, never partial pixel data.
pub trait ImageReader: Send + Sync {
	/// Parses the image metadata. Called once per image and cached by
	/// the processor.
	fn read_ome(&self) -> Result<OmeInfo>;

	/// Reads one composite tile of one Z directory.
	fn read_tile(&self, series: u16, z_dir: u32, tile: &TileRect, resolution: u16) -> Result<Raster>;

	/// Reads an entire plane of one Z directory.
	fn read_entire(&self, series: u16, z_dir: u32, resolution: u16) -> Result<Raster>;

	/// Small preview of the image, used interactively.
	fn read_thumbnail(&self, series: u16, z_dir: u32) -> Result<Raster>;
}
