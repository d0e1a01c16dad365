//! Full depth intensity histogram of a 16 bit plane.

use crate::Raster;

pub const BINS: usize = 65536;

pub struct Histogram {
	counts: Vec<u64>,
}

impl Histogram {
	pub fn of(raster: &Raster) -> Histogram {
		let mut counts = vec![0u64; BINS];
		for y in 0..raster.height() {
			for x in 0..raster.width() {
				counts[raster.get(x, y) as usize] += 1;
			}
		}
		Histogram { counts }
	}

	pub fn counts(&self) -> &[u64] {
		&self.counts
	}

	pub fn total(&self) -> u64 {
		self.counts.iter().sum()
	}

	/// Bin with the highest count; ties resolve to the lowest bin.
	pub fn peak_index(&self) -> usize {
		let mut best = 0;
		for (idx, count) in self.counts.iter().enumerate() {
			if *count > self.counts[best] {
				best = idx;
			}
		}
		best
	}

	/// Mean intensity.
	pub fn mean(&self) -> f64 {
		let total = self.total();
		if total == 0 {
			return 0.0;
		}
		let sum: f64 = self.counts.iter().enumerate().map(|(v, c)| v as f64 * *c as f64).sum();
		sum / total as f64
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn peak_and_mean() {
		let raster = Raster::from_vec(2, 2, vec![5, 5, 5, 9]).unwrap();
		let hist = Histogram::of(&raster);
		assert_eq!(hist.peak_index(), 5);
		assert_eq!(hist.total(), 4);
		assert_eq!(hist.mean(), 6.0);
	}

	#[test]
	fn empty_histogram() {
		let raster = Raster::new(0, 0);
		let hist = Histogram::of(&raster);
		assert_eq!(hist.total(), 0);
		assert_eq!(hist.peak_index(), 0);
		assert_eq!(hist.mean(), 0.0);
	}
}
