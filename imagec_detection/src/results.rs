//! Ordered, owning collection of ROIs with an embedded spatial hash.

use crate::{
	Roi,
	spatial_hash::{DEFAULT_CELL_SIZE, SpatialHash},
};
use imagec_core::types::ChannelIndex;
use imagec_image::{Mask, Raster};
use std::collections::BTreeMap;

/// Detection results of one (image, tile, channel).
///
/// ROI indices are unique and dense starting at 0; the embedded
/// spatial hash indexes the ROIs' (snap) bounding boxes for collision
/// queries.
#[derive(Debug, Default)]
pub struct DetectionResults {
	rois: Vec<Roi>,
	hash: SpatialHash,
}

impl DetectionResults {
	pub fn new() -> DetectionResults {
		DetectionResults {
			rois: Vec::new(),
			hash: SpatialHash::new(DEFAULT_CELL_SIZE),
		}
	}

	pub fn len(&self) -> usize {
		self.rois.len()
	}

	pub fn is_empty(&self) -> bool {
		self.rois.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Roi> {
		self.rois.iter()
	}

	pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Roi> {
		self.rois.iter_mut()
	}

	pub fn get(&self, index: usize) -> Option<&Roi> {
		self.rois.get(index)
	}

	/// Appends a ROI. The index is reassigned to keep indices dense.
	pub fn push(&mut self, mut roi: Roi) {
		roi.set_index(self.rois.len() as u32);
		self.hash.insert(roi.index(), roi.snap_bbox());
		self.rois.push(roi);
	}

	/// Deep copy. The clone's spatial hash is rebuilt against the
	/// clone's own storage.
	pub fn clone_results(&self) -> DetectionResults {
		let mut clone = DetectionResults {
			rois: self.rois.clone(),
			hash: SpatialHash::new(self.hash.cell_size()),
		};
		for roi in &clone.rois {
			clone.hash.insert(roi.index(), roi.snap_bbox());
		}
		clone
	}

	/// Paints the union of the valid ROI masks into `dst`.
	pub fn create_binary_image(&self, dst: &mut Mask) {
		for roi in &self.rois {
			if !roi.is_valid() || roi.mask().is_empty() {
				continue;
			}
			let bbox = roi.bbox();
			for y in 0..roi.mask().height() {
				for x in 0..roi.mask().width() {
					if roi.mask().get(x, y) {
						let px = bbox.x + x as i32;
						let py = bbox.y + y as i32;
						if px >= 0 && py >= 0 {
							dst.set(px as u32, py as u32, true);
						}
					}
				}
			}
		}
	}

	/// Executes [`Roi::calc_intersection`] for every spatially
	/// colliding pair and collects the results that passed. Each own
	/// ROI contributes at most one intersection.
	pub fn calc_intersections(
		&self,
		other: &DetectionResults,
		originals: &BTreeMap<ChannelIndex, Raster>,
		min_intersection: f64,
		target_channel: ChannelIndex,
	) -> DetectionResults {
		let mut out = DetectionResults::new();
		let mut pairs = self.hash.colliding_pairs(&other.hash);
		pairs.sort_unstable();

		let mut last_own: Option<u32> = None;
		for (own_id, other_id) in pairs {
			if last_own == Some(own_id) {
				continue;
			}
			let own = &self.rois[own_id as usize];
			let theirs = &other.rois[other_id as usize];
			if !own.snap_bbox().intersects(theirs.snap_bbox()) {
				continue;
			}
			if let Some(roi) = own.calc_intersection(theirs, originals, min_intersection, target_channel) {
				out.push(roi);
				last_own = Some(own_id);
			}
		}
		out
	}

	/// Centres of mass of all valid ROIs.
	pub fn valid_centres(&self) -> Vec<imagec_core::types::Point> {
		self.rois.iter().filter(|roi| roi.is_valid()).map(|roi| roi.center_of_mass()).collect()
	}

	pub fn valid_count(&self) -> usize {
		self.rois.iter().filter(|roi| roi.is_valid()).count()
	}
}

impl<'a> IntoIterator for &'a DetectionResults {
	type Item = &'a Roi;
	type IntoIter = std::slice::Iter<'a, Roi>;

	fn into_iter(self) -> Self::IntoIter {
		self.rois.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::contour;
	use imagec_core::{settings::ObjectFilterSettings, types::Rect};

	fn square_roi(origin: (i32, i32), size: u32, original: &Raster) -> Roi {
		let mut mask = Mask::new(size, size);
		for y in 0..size {
			for x in 0..size {
				mask.set(x, y, true);
			}
		}
		let points = contour::largest_contour(&mask);
		Roi::new(
			99,
			1.0,
			0,
			Rect::new(origin.0, origin.1, size, size),
			mask,
			points,
			original,
			ChannelIndex::Ch0,
			&ObjectFilterSettings::default(),
		)
	}

	fn flat(value: u16) -> Raster {
		Raster::from_vec(32, 32, vec![value; 1024]).unwrap()
	}

	#[test]
	fn push_assigns_dense_indices() {
		let original = flat(1);
		let mut results = DetectionResults::new();
		results.push(square_roi((0, 0), 4, &original));
		results.push(square_roi((10, 10), 4, &original));
		let indices: Vec<u32> = results.iter().map(Roi::index).collect();
		assert_eq!(indices, vec![0, 1]);
	}

	#[test]
	fn clone_is_observationally_equal() {
		let original = flat(7);
		let mut results = DetectionResults::new();
		results.push(square_roi((0, 0), 6, &original));
		results.push(square_roi((3, 3), 6, &original));

		let clone = results.clone_results();
		assert_eq!(clone.len(), results.len());
		for (a, b) in results.iter().zip(clone.iter()) {
			assert_eq!(a.index(), b.index());
			assert_eq!(a.bbox(), b.bbox());
			assert_eq!(a.area(), b.area());
			assert_eq!(a.contour(), b.contour());
			assert_eq!(a.validity(), b.validity());
		}

		// Same collision sets through the rebuilt hash.
		let originals = BTreeMap::from([(ChannelIndex::Ch0, original.clone())]);
		let from_original = results.calc_intersections(&results, &originals, 0.1, ChannelIndex::A);
		let from_clone = clone.calc_intersections(&clone, &originals, 0.1, ChannelIndex::A);
		assert_eq!(from_original.len(), from_clone.len());
	}

	#[test]
	fn binary_image_paints_only_valid_rois() {
		let original = flat(1);
		let mut results = DetectionResults::new();
		results.push(square_roi((0, 0), 4, &original));
		results.push(square_roi((8, 8), 4, &original));
		results.iter_mut().nth(1).unwrap().set_validity(imagec_core::types::ObjectValidity::TooSmall);

		let mut dst = Mask::new(32, 32);
		results.create_binary_image(&mut dst);
		assert_eq!(dst.count(), 16);
		assert!(dst.get(0, 0));
		assert!(!dst.get(8, 8));
	}

	#[test]
	fn intersections_of_overlapping_results() {
		let original = flat(9);
		let originals = BTreeMap::from([(ChannelIndex::Ch0, original.clone())]);

		let mut a = DetectionResults::new();
		a.push(square_roi((0, 0), 8, &original));
		a.push(square_roi((20, 20), 4, &original));
		let mut b = DetectionResults::new();
		b.push(square_roi((4, 4), 8, &original));

		let out = a.calc_intersections(&b, &originals, 0.1, ChannelIndex::A);
		assert_eq!(out.len(), 1);
		assert_eq!(out.get(0).unwrap().bbox(), &Rect::new(4, 4, 4, 4));
		assert_eq!(out.get(0).unwrap().index(), 0);
		assert_eq!(out.get(0).unwrap().channel(), ChannelIndex::A);
	}
}
