//! Pixel operators of the preprocessing chain.
//!
//! Every operator is a pure function `Raster -> Raster` over a 16 bit
//! single plane image; the chain applies them in configured order.
//! Channel subtraction is listed here as well but the tile of the other
//! channel is loaded by the processor, not by this module.

mod edge;
mod rolling_ball;

pub use edge::edge_detection;
pub use rolling_ball::rolling_ball;

use crate::Raster;
use imageproc::filter;

/// Maximum intensity projection over a stack of Z planes. Returns an
/// empty raster when the stack is empty.
pub fn z_project_max(planes: &[Raster]) -> Raster {
	let Some(first) = planes.first() else {
		return Raster::new(0, 0);
	};
	let mut out = first.to_vec();
	for plane in &planes[1..] {
		for y in 0..first.height() {
			for x in 0..first.width() {
				let idx = (y * first.width() + x) as usize;
				out[idx] = out[idx].max(plane.get(x, y));
			}
		}
	}
	Raster::from_vec(first.width(), first.height(), out).expect("projection keeps dimensions")
}

/// Saturating per-pixel subtraction, used for channel subtraction.
pub fn subtract(minuend: &Raster, subtrahend: &Raster) -> Raster {
	let mut out = minuend.to_vec();
	for y in 0..minuend.height() {
		for x in 0..minuend.width() {
			let idx = (y * minuend.width() + x) as usize;
			out[idx] = out[idx].saturating_sub(subtrahend.get(x, y));
		}
	}
	Raster::from_vec(minuend.width(), minuend.height(), out).expect("subtraction keeps dimensions")
}

/// Gaussian blur with the given sigma; the kernel size of the settings
/// only selects the sigma, the support is derived from it.
pub fn gaussian_blur(raster: &Raster, sigma: f32) -> Raster {
	if raster.is_empty() || sigma <= 0.0 {
		return raster.clone();
	}
	Raster::from_luma16(filter::gaussian_blur_f32(&raster.to_luma16(), sigma))
}

/// Box blur with an odd `kernel_size`.
pub fn blur(raster: &Raster, kernel_size: u8) -> Raster {
	let radius = i32::from(kernel_size / 2);
	if radius == 0 || raster.is_empty() {
		return raster.clone();
	}
	let mut out = vec![0u16; raster.width() as usize * raster.height() as usize];
	let window = (2 * radius + 1) * (2 * radius + 1);
	for y in 0..raster.height() as i32 {
		for x in 0..raster.width() as i32 {
			let mut sum: u64 = 0;
			for dy in -radius..=radius {
				for dx in -radius..=radius {
					let sx = (x + dx).clamp(0, raster.width() as i32 - 1) as u32;
					let sy = (y + dy).clamp(0, raster.height() as i32 - 1) as u32;
					sum += u64::from(raster.get(sx, sy));
				}
			}
			out[(y * raster.width() as i32 + x) as usize] = (sum / window as u64) as u16;
		}
	}
	Raster::from_vec(raster.width(), raster.height(), out).expect("blur keeps dimensions")
}

/// Median filter with an odd `kernel_size`.
pub fn median(raster: &Raster, kernel_size: u8) -> Raster {
	let radius = u32::from(kernel_size / 2);
	if radius == 0 || raster.is_empty() {
		return raster.clone();
	}
	Raster::from_luma16(filter::median_filter(&raster.to_luma16(), radius, radius))
}

/// Median background subtraction: subtracts the median filtered image
/// from the original, clamping at zero.
pub fn median_subtract(raster: &Raster, kernel_size: u8) -> Raster {
	let background = median(raster, kernel_size);
	subtract(raster, &background)
}
