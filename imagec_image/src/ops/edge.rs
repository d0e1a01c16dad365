//! Edge detection over 16 bit planes.

use crate::Raster;
use imagec_core::settings::{EdgeDirection, EdgeKernel};
use log::warn;

const SOBEL_X: [i32; 9] = [-1, 0, 1, -2, 0, 2, -1, 0, 1];
const SOBEL_Y: [i32; 9] = [-1, -2, -1, 0, 0, 0, 1, 2, 1];

/// Sobel gradient magnitude. A canny kernel is not available for 16 bit
/// planes and falls back to sobel with a warning.
pub fn edge_detection(raster: &Raster, kernel: EdgeKernel, direction: EdgeDirection) -> Raster {
	if kernel == EdgeKernel::Canny {
		warn!("Canny edge detection is not supported on 16 bit planes. Using sobel as fallback.");
	}
	sobel(raster, direction)
}

fn sobel(raster: &Raster, direction: EdgeDirection) -> Raster {
	if raster.is_empty() {
		return raster.clone();
	}
	let width = raster.width() as i32;
	let height = raster.height() as i32;
	let mut out = vec![0u16; (width * height) as usize];

	for y in 0..height {
		for x in 0..width {
			let mut gx: i64 = 0;
			let mut gy: i64 = 0;
			for ky in 0..3 {
				for kx in 0..3 {
					let sx = (x + kx - 1).clamp(0, width - 1) as u32;
					let sy = (y + ky - 1).clamp(0, height - 1) as u32;
					let v = i64::from(raster.get(sx, sy));
					let k = (ky * 3 + kx) as usize;
					gx += v * i64::from(SOBEL_X[k]);
					gy += v * i64::from(SOBEL_Y[k]);
				}
			}
			let magnitude = match direction {
				EdgeDirection::X => gx.abs(),
				EdgeDirection::Y => gy.abs(),
				EdgeDirection::Xy => (((gx * gx + gy * gy) as f64).sqrt()) as i64,
			};
			out[(y * width + x) as usize] = magnitude.min(i64::from(u16::MAX)) as u16;
		}
	}

	Raster::from_vec(raster.width(), raster.height(), out).expect("sobel keeps dimensions")
}
