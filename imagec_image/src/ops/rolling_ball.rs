//! Rolling ball background subtraction.
//!
//! The background below each pixel is estimated by rolling a ball (or
//! sliding a paraboloid) under the intensity surface: a grayscale
//! erosion with the ball's height profile followed by a dilation with
//! the same profile. The estimated background is subtracted from the
//! input.

use crate::Raster;
use imagec_core::settings::BallType;

/// Height profile of the structuring element, sampled on integer
/// offsets within the ball radius.
struct BallProfile {
	radius: i32,
	heights: Vec<i64>,
}

impl BallProfile {
	fn new(radius: u32, ball_type: BallType) -> BallProfile {
		let r = radius as i32;
		let mut heights = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
		for dy in -r..=r {
			for dx in -r..=r {
				let d2 = (dx * dx + dy * dy) as f64;
				let r2 = (r * r) as f64;
				let height = if d2 > r2 {
					-1.0
				} else {
					match ball_type {
						BallType::Ball => (r2 - d2).sqrt(),
						BallType::Paraboloid => {
							let peak = r as f64;
							peak - d2 / (2.0 * peak.max(1.0))
						}
					}
				};
				heights.push(height.round() as i64);
			}
		}
		BallProfile { radius: r, heights }
	}

	#[inline]
	fn get(&self, dx: i32, dy: i32) -> i64 {
		self.heights[((dy + self.radius) * (2 * self.radius + 1) + dx + self.radius) as usize]
	}
}

pub fn rolling_ball(raster: &Raster, radius: u32, ball_type: BallType) -> Raster {
	if radius == 0 || raster.is_empty() {
		return raster.clone();
	}
	let profile = BallProfile::new(radius, ball_type);
	let eroded = erode(raster, &profile);
	let background = dilate(&eroded, &profile);

	let mut out = raster.to_vec();
	for y in 0..raster.height() {
		for x in 0..raster.width() {
			let idx = (y * raster.width() + x) as usize;
			out[idx] = out[idx].saturating_sub(background.get(x, y));
		}
	}
	Raster::from_vec(raster.width(), raster.height(), out).expect("subtraction keeps dimensions")
}

fn erode(raster: &Raster, profile: &BallProfile) -> Raster {
	morph(raster, profile, true)
}

fn dilate(raster: &Raster, profile: &BallProfile) -> Raster {
	morph(raster, profile, false)
}

fn morph(raster: &Raster, profile: &BallProfile, is_erosion: bool) -> Raster {
	let width = raster.width() as i32;
	let height = raster.height() as i32;
	let r = profile.radius;
	let mut out = vec![0u16; (width * height) as usize];

	for y in 0..height {
		for x in 0..width {
			let mut extreme: i64 = if is_erosion { i64::MAX } else { i64::MIN };
			for dy in -r..=r {
				for dx in -r..=r {
					let h = profile.get(dx, dy);
					if h < 0 {
						continue;
					}
					let sx = (x + dx).clamp(0, width - 1) as u32;
					let sy = (y + dy).clamp(0, height - 1) as u32;
					let v = i64::from(raster.get(sx, sy));
					if is_erosion {
						extreme = extreme.min(v - h);
					} else {
						extreme = extreme.max(v + h);
					}
				}
			}
			out[(y * width + x) as usize] = extreme.clamp(0, i64::from(u16::MAX)) as u16;
		}
	}

	Raster::from_vec(raster.width(), raster.height(), out).expect("morphology keeps dimensions")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flat_background_is_removed() {
		let raster = Raster::from_vec(9, 9, vec![300u16; 81]).unwrap();
		let out = rolling_ball(&raster, 3, BallType::Ball);
		// A constant surface is pure background.
		assert!(out.to_vec().iter().all(|v| *v == 0), "{:?}", out.to_vec());
	}

	#[test]
	fn narrow_peak_survives() {
		let mut data = vec![100u16; 121];
		data[5 * 11 + 5] = 5000;
		let raster = Raster::from_vec(11, 11, data).unwrap();
		let out = rolling_ball(&raster, 4, BallType::Ball);
		assert!(out.get(5, 5) > 3000, "peak got {}", out.get(5, 5));
		assert!(out.get(0, 0) < 100);
	}

	#[test]
	fn zero_radius_is_identity() {
		let raster = Raster::from_vec(3, 3, (0..9).collect()).unwrap();
		assert_eq!(rolling_ball(&raster, 0, BallType::Paraboloid).to_vec(), raster.to_vec());
	}
}
