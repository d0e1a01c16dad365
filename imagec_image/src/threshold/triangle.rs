//! Triangle method: maximum distance between the histogram and the
//! line from its peak to the far end of its support.

use crate::Histogram;

pub fn threshold(hist: &Histogram) -> u16 {
	let counts = hist.counts();
	if hist.total() == 0 {
		return 0;
	}

	let peak = hist.peak_index();
	let first = counts.iter().position(|c| *c > 0).unwrap_or(0);
	let last = counts.iter().rposition(|c| *c > 0).unwrap_or(0);
	if first == last {
		return first as u16;
	}

	// Use the longer tail of the peak.
	let (from, to) = if peak - first > last - peak { (first, peak) } else { (peak, last) };
	if from == to {
		return peak as u16;
	}

	let peak_height = counts[peak] as f64;
	let tail_height = counts[if from == peak { to } else { from }] as f64;

	let dx = (to - from) as f64;
	let dy = if from == peak { tail_height - peak_height } else { peak_height - tail_height };
	let norm = (dx * dx + dy * dy).sqrt();

	let mut best = from;
	let mut best_dist = 0.0;
	for t in from..=to {
		// Perpendicular distance of (t, h(t)) to the peak-tail line.
		let x0 = (t - from) as f64;
		let y0 = counts[t] as f64 - if from == peak { peak_height } else { tail_height };
		let dist = (dy * x0 - dx * y0).abs() / norm;
		if dist > best_dist {
			best_dist = dist;
			best = t;
		}
	}

	best as u16
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Raster;

	#[test]
	fn finds_shoulder_of_decaying_histogram() {
		// Strong peak at 10 with a long sparse tail of bright pixels.
		let mut data = vec![10u16; 90];
		data.extend((0..10).map(|i| 2000 + i * 500));
		let raster = Raster::from_vec(10, 10, data).unwrap();
		let t = threshold(&Histogram::of(&raster));
		assert!(t > 10, "got {t}");
	}

	#[test]
	fn single_value_histogram() {
		let raster = Raster::from_vec(2, 2, vec![7, 7, 7, 7]).unwrap();
		assert_eq!(threshold(&Histogram::of(&raster)), 7);
	}
}
