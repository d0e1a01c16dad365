//! Binary masks sized as an object's bounding box.

use imagec_core::types::Rect;

/// Binary raster; a pixel is set when its value is non zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
	width: u32,
	height: u32,
	data: Vec<u8>,
}

impl Mask {
	pub fn new(width: u32, height: u32) -> Mask {
		Mask {
			width,
			height,
			data: vec![0; width as usize * height as usize],
		}
	}

	pub fn from_vec(width: u32, height: u32, data: Vec<u8>) -> Mask {
		assert_eq!(data.len(), width as usize * height as usize);
		Mask { width, height, data }
	}

	pub fn width(&self) -> u32 {
		self.width
	}

	pub fn height(&self) -> u32 {
		self.height
	}

	pub fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	#[inline]
	pub fn get(&self, x: u32, y: u32) -> bool {
		if x >= self.width || y >= self.height {
			return false;
		}
		self.data[(y * self.width + x) as usize] != 0
	}

	#[inline]
	pub fn set(&mut self, x: u32, y: u32, value: bool) {
		if x < self.width && y < self.height {
			self.data[(y * self.width + x) as usize] = if value { 255 } else { 0 };
		}
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	pub fn count(&self) -> u64 {
		self.data.iter().filter(|v| **v != 0).count() as u64
	}

	/// ANDs two masks that live in different coordinate frames. `rect`
	/// is given in absolute coordinates, `self_origin`/`other_origin`
	/// are the absolute origins of the two masks.
	pub fn and_in_rect(
		&self,
		self_origin: (i32, i32),
		other: &Mask,
		other_origin: (i32, i32),
		rect: &Rect,
	) -> Mask {
		let mut out = Mask::new(rect.width, rect.height);
		for y in 0..rect.height {
			for x in 0..rect.width {
				let ax = rect.x + x as i32 - self_origin.0;
				let ay = rect.y + y as i32 - self_origin.1;
				let bx = rect.x + x as i32 - other_origin.0;
				let by = rect.y + y as i32 - other_origin.1;
				if ax >= 0
					&& ay >= 0 && bx >= 0 && by >= 0
					&& self.get(ax as u32, ay as u32)
					&& other.get(bx as u32, by as u32)
				{
					out.set(x, y, true);
				}
			}
		}
		out
	}

	/// Dilates the mask by a disc of `radius`, growing the canvas by
	/// `radius` on every side.
	pub fn dilate_disc(&self, radius: u32) -> Mask {
		if radius == 0 {
			return self.clone();
		}
		let r = radius as i32;
		let mut out = Mask::new(self.width + 2 * radius, self.height + 2 * radius);
		for y in 0..self.height {
			for x in 0..self.width {
				if !self.get(x, y) {
					continue;
				}
				for dy in -r..=r {
					for dx in -r..=r {
						if dx * dx + dy * dy > r * r {
							continue;
						}
						out.set((x as i32 + r + dx) as u32, (y as i32 + r + dy) as u32, true);
					}
				}
			}
		}
		out
	}

	pub fn to_gray_image(&self) -> image::GrayImage {
		image::GrayImage::from_vec(self.width, self.height, self.data.clone()).expect("mask buffer size")
	}
}
