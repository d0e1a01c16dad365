//! Otsu's method: maximises the between-class variance.

use crate::Histogram;

pub fn threshold(hist: &Histogram) -> u16 {
	let counts = hist.counts();
	let total = hist.total();
	if total == 0 {
		return 0;
	}

	let sum_all: f64 = counts.iter().enumerate().map(|(v, c)| v as f64 * *c as f64).sum();

	let mut sum_back = 0.0;
	let mut weight_back = 0.0;
	let mut best_variance = -1.0;
	let mut best = 0usize;

	for (t, count) in counts.iter().enumerate() {
		weight_back += *count as f64;
		if weight_back == 0.0 {
			continue;
		}
		let weight_fore = total as f64 - weight_back;
		if weight_fore == 0.0 {
			break;
		}
		sum_back += t as f64 * *count as f64;

		let mean_back = sum_back / weight_back;
		let mean_fore = (sum_all - sum_back) / weight_fore;
		let diff = mean_back - mean_fore;
		let variance = weight_back * weight_fore * diff * diff;
		if variance > best_variance {
			best_variance = variance;
			best = t;
		}
	}

	// The found bin is the last background value; everything above is
	// foreground.
	(best + 1).min(u16::MAX as usize) as u16
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Raster;

	#[test]
	fn splits_two_clusters() {
		let mut data = vec![10u16; 50];
		data.extend(vec![1000u16; 50]);
		let raster = Raster::from_vec(10, 10, data).unwrap();
		let t = threshold(&Histogram::of(&raster));
		assert!(t > 10 && t <= 1000);
	}

	#[test]
	fn empty_histogram_is_zero() {
		let raster = Raster::new(0, 0);
		assert_eq!(threshold(&Histogram::of(&raster)), 0);
	}
}
