//! Li's minimum cross entropy threshold, iterative version.

use crate::Histogram;

pub fn threshold(hist: &Histogram) -> u16 {
	let counts = hist.counts();
	let total = hist.total();
	if total == 0 {
		return 0;
	}

	let mean = hist.mean();
	let mut t = mean;
	let tolerance = 0.5;

	for _ in 0..128 {
		let split = t as usize;

		let mut back_count = 0.0;
		let mut back_sum = 0.0;
		for (v, c) in counts.iter().enumerate().take(split + 1) {
			back_count += *c as f64;
			back_sum += v as f64 * *c as f64;
		}
		let mut fore_count = 0.0;
		let mut fore_sum = 0.0;
		for (v, c) in counts.iter().enumerate().skip(split + 1) {
			fore_count += *c as f64;
			fore_sum += v as f64 * *c as f64;
		}

		if back_count == 0.0 || fore_count == 0.0 {
			break;
		}
		let mean_back = (back_sum / back_count).max(f64::EPSILON);
		let mean_fore = (fore_sum / fore_count).max(f64::EPSILON);

		let num = mean_back - mean_fore;
		let den = mean_back.ln() - mean_fore.ln();
		if den == 0.0 {
			break;
		}
		let next = num / den;
		if (next - t).abs() < tolerance {
			t = next;
			break;
		}
		t = next;
	}

	t.round().clamp(0.0, f64::from(u16::MAX)) as u16
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Raster;

	#[test]
	fn lands_between_two_clusters() {
		let mut data = vec![100u16; 80];
		data.extend(vec![40000u16; 20]);
		let raster = Raster::from_vec(10, 10, data).unwrap();
		let t = threshold(&Histogram::of(&raster));
		assert!(t > 100 && t < 40000, "got {t}");
	}
}
