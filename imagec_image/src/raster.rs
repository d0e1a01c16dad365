//! The shared-buffer 16 bit image plane.

use anyhow::{Result, ensure};
use image::ImageBuffer;
use imagec_core::types::Rect;
use std::sync::Arc;

/// Single plane, 16 bit per pixel image.
///
/// The pixel buffer is reference counted and the raster addresses it
/// through a view rectangle: [`Raster::view`] is O(1) and shares the
/// buffer, mutation goes through [`Raster::to_mut`] which materialises
/// the view into an owned buffer first.
#[derive(Debug, Clone)]
pub struct Raster {
	buf: Arc<Vec<u16>>,
	buf_width: u32,
	view: Rect,
}

impl Raster {
	pub fn new(width: u32, height: u32) -> Raster {
		Raster {
			buf: Arc::new(vec![0; width as usize * height as usize]),
			buf_width: width,
			view: Rect::new(0, 0, width, height),
		}
	}

	pub fn from_vec(width: u32, height: u32, data: Vec<u16>) -> Result<Raster> {
		ensure!(
			data.len() == width as usize * height as usize,
			"pixel buffer size {} does not match {width}x{height}",
			data.len()
		);
		Ok(Raster {
			buf: Arc::new(data),
			buf_width: width,
			view: Rect::new(0, 0, width, height),
		})
	}

	pub fn width(&self) -> u32 {
		self.view.width
	}

	pub fn height(&self) -> u32 {
		self.view.height
	}

	pub fn bounds(&self) -> Rect {
		Rect::new(0, 0, self.view.width, self.view.height)
	}

	pub fn is_empty(&self) -> bool {
		self.view.is_empty()
	}

	/// Pixel at view coordinates. Out of range reads return 0.
	#[inline]
	pub fn get(&self, x: u32, y: u32) -> u16 {
		if x >= self.view.width || y >= self.view.height {
			return 0;
		}
		let bx = (self.view.x as u32 + x) as usize;
		let by = (self.view.y as u32 + y) as usize;
		self.buf[by * self.buf_width as usize + bx]
	}

	/// A raster sharing this buffer, restricted to `rect` (given in
	/// view coordinates, clamped to the view).
	pub fn view(&self, rect: &Rect) -> Raster {
		let clamped = rect.intersection(&self.bounds());
		Raster {
			buf: Arc::clone(&self.buf),
			buf_width: self.buf_width,
			view: Rect::new(self.view.x + clamped.x, self.view.y + clamped.y, clamped.width, clamped.height),
		}
	}

	/// Copies the view into a dense row-major vector.
	pub fn to_vec(&self) -> Vec<u16> {
		let mut out = Vec::with_capacity(self.view.width as usize * self.view.height as usize);
		for y in 0..self.view.height {
			for x in 0..self.view.width {
				out.push(self.get(x, y));
			}
		}
		out
	}

	/// Materialises the view into an owned, mutable buffer. The
	/// returned guard derefs to the dense pixel slice; dropping it
	/// yields nothing, the raster itself was rewritten.
	pub fn to_mut(&mut self) -> &mut [u16] {
		let dense = self.is_dense();
		if !dense || Arc::strong_count(&self.buf) > 1 {
			let data = self.to_vec();
			self.buf_width = self.view.width;
			self.view = Rect::new(0, 0, self.view.width, self.view.height);
			self.buf = Arc::new(data);
		}
		Arc::get_mut(&mut self.buf).expect("raster buffer is uniquely owned").as_mut_slice()
	}

	fn is_dense(&self) -> bool {
		self.view.x == 0 && self.view.y == 0 && self.view.width == self.buf_width
	}

	/// Builds a new raster of the same size by mapping every pixel.
	pub fn map(&self, f: impl Fn(u16) -> u16) -> Raster {
		let data = self.to_vec().into_iter().map(f).collect();
		Raster {
			buf: Arc::new(data),
			buf_width: self.view.width,
			view: Rect::new(0, 0, self.view.width, self.view.height),
		}
	}

	/// Shares the same underlying allocation as `other`.
	pub fn shares_buffer(&self, other: &Raster) -> bool {
		Arc::ptr_eq(&self.buf, &other.buf)
	}

	pub fn to_luma16(&self) -> ImageBuffer<image::Luma<u16>, Vec<u16>> {
		ImageBuffer::from_vec(self.view.width, self.view.height, self.to_vec()).expect("view size matches buffer")
	}

	pub fn from_luma16(img: ImageBuffer<image::Luma<u16>, Vec<u16>>) -> Raster {
		let (width, height) = img.dimensions();
		Raster {
			buf: Arc::new(img.into_raw()),
			buf_width: width,
			view: Rect::new(0, 0, width, height),
		}
	}

	/// Scales the 16 bit plane down to an 8 bit grayscale image, used
	/// as the base layer of control images.
	pub fn to_luma8(&self) -> image::GrayImage {
		let data = self.to_vec().into_iter().map(|v| (v >> 8) as u8).collect();
		image::GrayImage::from_vec(self.view.width, self.view.height, data).expect("view size matches buffer")
	}
}
