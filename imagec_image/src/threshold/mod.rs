//! Histogram based threshold algorithms.
//!
//! Each algorithm computes a threshold value from the full 16 bit
//! histogram, seeded with the configured minimum: the effective
//! threshold never drops below `threshold_min`. Modes without a native
//! implementation fall back to the manual threshold with a warning.

mod li;
mod min_error;
mod moments;
mod otsu;
mod triangle;

use crate::{Histogram, Mask, Raster};
use imagec_core::settings::{ThresholdMode, ThresholdSettings};
use log::warn;

/// Computes the effective threshold value for `raster`.
pub fn compute_threshold(raster: &Raster, settings: &ThresholdSettings) -> u16 {
	let seed = settings.threshold_min;
	let computed = match settings.mode {
		ThresholdMode::Manual => seed,
		ThresholdMode::Li => li::threshold(&Histogram::of(raster)),
		ThresholdMode::MinError => min_error::threshold(&Histogram::of(raster)),
		ThresholdMode::Triangle => triangle::threshold(&Histogram::of(raster)),
		ThresholdMode::Moments => moments::threshold(&Histogram::of(raster)),
		ThresholdMode::Otsu => otsu::threshold(&Histogram::of(raster)),
		mode => {
			warn!("Not supported threshold algorithm {mode:?} selected. Using MANUAL as fallback.");
			seed
		}
	};
	computed.max(seed)
}

/// Thresholds `raster` into a binary mask and returns the used
/// threshold value. Pixels within `[threshold, threshold_max]` are set.
pub fn apply(raster: &Raster, settings: &ThresholdSettings) -> (u16, Mask) {
	let threshold = compute_threshold(raster, settings);
	let mut mask = Mask::new(raster.width(), raster.height());
	for y in 0..raster.height() {
		for x in 0..raster.width() {
			let v = raster.get(x, y);
			if v >= threshold && v <= settings.threshold_max && v > 0 {
				mask.set(x, y, true);
			}
		}
	}
	(threshold, mask)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn bimodal_raster() -> Raster {
		// Dark background around 100, bright objects around 60000.
		let mut data = vec![100u16; 64];
		for v in data.iter_mut().take(16) {
			*v = 60000;
		}
		Raster::from_vec(8, 8, data).unwrap()
	}

	#[test]
	fn manual_uses_seed() {
		let settings = ThresholdSettings {
			mode: ThresholdMode::Manual,
			threshold_min: 1234,
			..ThresholdSettings::default()
		};
		assert_eq!(compute_threshold(&bimodal_raster(), &settings), 1234);
	}

	#[test]
	fn otsu_separates_bimodal_histogram() {
		let settings = ThresholdSettings {
			mode: ThresholdMode::Otsu,
			..ThresholdSettings::default()
		};
		let t = compute_threshold(&bimodal_raster(), &settings);
		assert!(t > 100 && t <= 60000, "threshold {t} should split the modes");
	}

	#[test]
	fn seed_clamps_automatic_result() {
		let settings = ThresholdSettings {
			mode: ThresholdMode::Otsu,
			threshold_min: 61000,
			..ThresholdSettings::default()
		};
		assert_eq!(compute_threshold(&bimodal_raster(), &settings), 61000);
	}

	#[test]
	fn unsupported_mode_falls_back_to_manual() {
		let settings = ThresholdSettings {
			mode: ThresholdMode::Yen,
			threshold_min: 777,
			..ThresholdSettings::default()
		};
		assert_eq!(compute_threshold(&bimodal_raster(), &settings), 777);
	}

	#[test]
	fn apply_respects_upper_bound() {
		let raster = Raster::from_vec(2, 2, vec![0, 100, 200, 65535]).unwrap();
		let settings = ThresholdSettings {
			mode: ThresholdMode::Manual,
			threshold_min: 100,
			threshold_max: 200,
			..ThresholdSettings::default()
		};
		let (t, mask) = apply(&raster, &settings);
		assert_eq!(t, 100);
		assert_eq!(mask.count(), 2);
		assert!(mask.get(1, 0) && mask.get(0, 1));
	}
}
