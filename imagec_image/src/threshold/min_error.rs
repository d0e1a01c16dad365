//! Kittler-Illingworth minimum error threshold, iterative version.

use crate::Histogram;

pub fn threshold(hist: &Histogram) -> u16 {
	let counts = hist.counts();
	if hist.total() == 0 {
		return 0;
	}

	// Cumulative count, sum and squared sum up to and including t.
	let a = |t: usize| -> f64 { counts.iter().take(t + 1).map(|c| *c as f64).sum() };
	let b = |t: usize| -> f64 {
		counts.iter().enumerate().take(t + 1).map(|(v, c)| v as f64 * *c as f64).sum()
	};
	let c = |t: usize| -> f64 {
		counts
			.iter()
			.enumerate()
			.take(t + 1)
			.map(|(v, c)| v as f64 * v as f64 * *c as f64)
			.sum()
	};

	let max = counts.len() - 1;
	let mut t = hist.mean().round() as usize;

	for _ in 0..128 {
		let a0 = a(t);
		let a1 = a(max) - a0;
		if a0 == 0.0 || a1 == 0.0 {
			break;
		}
		let mu0 = b(t) / a0;
		let mu1 = (b(max) - b(t)) / a1;
		let var0 = (c(t) / a0 - mu0 * mu0).max(f64::EPSILON);
		let var1 = ((c(max) - c(t)) / a1 - mu1 * mu1).max(f64::EPSILON);
		let p0 = a0 / a(max);
		let p1 = 1.0 - p0;

		// Solve the quadratic for the decision boundary of the two
		// fitted gaussians.
		let w0 = 1.0 / var0 - 1.0 / var1;
		let w1 = mu0 / var0 - mu1 / var1;
		let w2 = mu0 * mu0 / var0 - mu1 * mu1 / var1 + (var0 / var1 * (p1 / p0) * (p1 / p0)).ln();

		let next = if w0 == 0.0 {
			if w1 == 0.0 {
				break;
			}
			(w2 / (2.0 * w1)).round() as usize
		} else {
			let discriminant = w1 * w1 - w0 * w2;
			if discriminant < 0.0 {
				break;
			}
			((w1 + discriminant.sqrt()) / w0).round() as usize
		};

		let next = next.min(max);
		if next == t {
			break;
		}
		t = next;
	}

	t.min(u16::MAX as usize) as u16
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Raster;

	#[test]
	fn separates_two_gaussians() {
		let mut data = Vec::new();
		for i in 0..50u16 {
			data.push(200 + i % 20);
		}
		for i in 0..50u16 {
			data.push(20000 + i % 20);
		}
		let raster = Raster::from_vec(10, 10, data).unwrap();
		let t = threshold(&Histogram::of(&raster));
		assert!(t > 220 && t < 20000, "got {t}");
	}
}
