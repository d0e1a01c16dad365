//! Uniform grid hash over ROI bounding boxes.
//!
//! Every ROI is registered into each cell its bounding box touches,
//! with the cell size chosen as the maximum expected ROI diameter. Two
//! ROIs can only collide if they share a cell, which bounds the
//! candidate set of any collision query by the local neighbourhood.

use imagec_core::types::Rect;
use std::collections::BTreeMap;

/// Cell size fitting the largest objects the detectors emit.
pub const DEFAULT_CELL_SIZE: u32 = 256;

#[derive(Debug, Clone)]
pub struct SpatialHash {
	cell_size: u32,
	grid: BTreeMap<(i32, i32), Vec<u32>>,
}

impl Default for SpatialHash {
	fn default() -> Self {
		SpatialHash::new(DEFAULT_CELL_SIZE)
	}
}

impl SpatialHash {
	pub fn new(cell_size: u32) -> SpatialHash {
		SpatialHash {
			cell_size: cell_size.max(1),
			grid: BTreeMap::new(),
		}
	}

	pub fn cell_size(&self) -> u32 {
		self.cell_size
	}

	fn cells(&self, bbox: &Rect) -> impl Iterator<Item = (i32, i32)> + use<> {
		let size = self.cell_size as i32;
		let x0 = bbox.x.div_euclid(size);
		let y0 = bbox.y.div_euclid(size);
		let x1 = (bbox.right() - 1).max(bbox.x).div_euclid(size);
		let y1 = (bbox.bottom() - 1).max(bbox.y).div_euclid(size);
		(y0..=y1).flat_map(move |cy| (x0..=x1).map(move |cx| (cx, cy)))
	}

	/// Registers `id` into every cell `bbox` touches.
	pub fn insert(&mut self, id: u32, bbox: &Rect) {
		for cell in self.cells(bbox) {
			self.grid.entry(cell).or_default().push(id);
		}
	}

	/// Ids sharing at least one cell with `bbox`, deduplicated.
	pub fn candidates(&self, bbox: &Rect) -> Vec<u32> {
		let mut out = Vec::new();
		for cell in self.cells(bbox) {
			if let Some(ids) = self.grid.get(&cell) {
				for id in ids {
					if !out.contains(id) {
						out.push(*id);
					}
				}
			}
		}
		out
	}

	/// Pairs `(own id, other id)` of entries sharing a cell across the
	/// two hashes. A pair appears once even if it shares several cells.
	pub fn colliding_pairs(&self, other: &SpatialHash) -> Vec<(u32, u32)> {
		let mut pairs = Vec::new();
		for (cell, own_ids) in &self.grid {
			let Some(other_ids) = other.grid.get(cell) else {
				continue;
			};
			for own in own_ids {
				for theirs in other_ids {
					if !pairs.contains(&(*own, *theirs)) {
						pairs.push((*own, *theirs));
					}
				}
			}
		}
		pairs
	}

	pub fn clear(&mut self) {
		self.grid.clear();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bbox_spanning_cells_is_registered_in_all_of_them() {
		let mut hash = SpatialHash::new(10);
		hash.insert(1, &Rect::new(5, 5, 10, 10)); // spans 4 cells
		assert_eq!(hash.candidates(&Rect::new(0, 0, 2, 2)), vec![1]);
		assert_eq!(hash.candidates(&Rect::new(12, 12, 2, 2)), vec![1]);
		assert!(hash.candidates(&Rect::new(25, 25, 2, 2)).is_empty());
	}

	#[test]
	fn candidates_are_deduplicated() {
		let mut hash = SpatialHash::new(10);
		hash.insert(7, &Rect::new(0, 0, 30, 30));
		assert_eq!(hash.candidates(&Rect::new(0, 0, 30, 30)), vec![7]);
	}

	#[test]
	fn collisions_require_a_shared_cell() {
		let mut a = SpatialHash::new(10);
		let mut b = SpatialHash::new(10);
		a.insert(0, &Rect::new(1, 1, 3, 3));
		b.insert(0, &Rect::new(6, 6, 3, 3)); // same cell
		b.insert(1, &Rect::new(40, 40, 3, 3)); // far away
		assert_eq!(a.colliding_pairs(&b), vec![(0, 0)]);
	}

	#[test]
	fn negative_coordinates_hash_consistently() {
		let mut hash = SpatialHash::new(10);
		hash.insert(3, &Rect::new(-5, -5, 4, 4));
		assert_eq!(hash.candidates(&Rect::new(-3, -3, 2, 2)), vec![3]);
	}
}
