//! Voronoi tessellation over detection centres.
//!
//! Cells are rasterised directly on the tile grid: every pixel is
//! assigned to its nearest centre, restricted to a disc of
//! `max_radius` when that is positive. One ROI is emitted per clipped
//! cell, carrying the largest contour of the cell mask.

use crate::{DetectionResponse, DetectionResults, Roi, contour};
use imagec_core::{
	settings::ObjectFilterSettings,
	types::{ChannelIndex, Point},
};
use imagec_image::{Mask, Raster};

/// Builds the tessellation over the valid detections of `points`.
pub fn voronoi_tessellation(
	points: &DetectionResults,
	original: &Raster,
	max_radius: i32,
	channel: ChannelIndex,
) -> DetectionResponse {
	let centres = points.valid_centres();
	let width = original.width();
	let height = original.height();
	if centres.is_empty() || width == 0 || height == 0 {
		return DetectionResponse::new(DetectionResults::new(), original.clone());
	}

	let assignment = assign_pixels(&centres, width, height, max_radius);

	let mut results = DetectionResults::new();
	for (idx, _centre) in centres.iter().enumerate() {
		let mut cell = Mask::new(width, height);
		let mut any = false;
		for y in 0..height {
			for x in 0..width {
				if assignment[(y * width + x) as usize] == idx as i32 {
					cell.set(x, y, true);
					any = true;
				}
			}
		}
		if !any {
			continue;
		}
		let cell_contour = contour::largest_contour(&cell);
		if cell_contour.is_empty() {
			continue;
		}
		let bbox = contour::bounding_box(&cell_contour);
		let local = contour::translate(&cell_contour, bbox.x, bbox.y);
		let mask = contour::fill_contour(&local, bbox.width, bbox.height);
		results.push(Roi::new(
			0,
			1.0,
			0,
			bbox,
			mask,
			local,
			original,
			channel,
			&ObjectFilterSettings::default(),
		));
	}

	DetectionResponse::new(results, original.clone())
}

/// Nearest-centre assignment per pixel; -1 where no centre claims the
/// pixel (outside every disc).
fn assign_pixels(centres: &[Point], width: u32, height: u32, max_radius: i32) -> Vec<i32> {
	let len = (width * height) as usize;
	let mut best_idx = vec![-1i32; len];
	let mut best_dist = vec![i64::MAX; len];

	if max_radius >= 0 {
		// Bounded cells: every centre only scans its disc.
		for (idx, centre) in centres.iter().enumerate() {
			let r = max_radius;
			for dy in -r..=r {
				for dx in -r..=r {
					let d2 = i64::from(dx) * i64::from(dx) + i64::from(dy) * i64::from(dy);
					if d2 > i64::from(r) * i64::from(r) {
						continue;
					}
					let x = centre.x + dx;
					let y = centre.y + dy;
					if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
						continue;
					}
					let pos = (y as u32 * width + x as u32) as usize;
					if d2 < best_dist[pos] {
						best_dist[pos] = d2;
						best_idx[pos] = idx as i32;
					}
				}
			}
		}
	} else {
		// Unbounded cells cover the whole plane.
		for y in 0..height as i32 {
			for x in 0..width as i32 {
				let pos = (y as u32 * width + x as u32) as usize;
				for (idx, centre) in centres.iter().enumerate() {
					let dx = i64::from(x - centre.x);
					let dy = i64::from(y - centre.y);
					let d2 = dx * dx + dy * dy;
					if d2 < best_dist[pos] {
						best_dist[pos] = d2;
						best_idx[pos] = idx as i32;
					}
				}
			}
		}
	}

	best_idx
}

#[cfg(test)]
mod tests {
	use super::*;
	use imagec_core::types::Rect;
	use imagec_image::Mask;

	fn point_results(centres: &[(i32, i32)], original: &Raster) -> DetectionResults {
		let mut results = DetectionResults::new();
		for (x, y) in centres {
			let mut mask = Mask::new(1, 1);
			mask.set(0, 0, true);
			results.push(Roi::new(
				0,
				1.0,
				0,
				Rect::new(*x, *y, 1, 1),
				mask,
				vec![Point::new(0, 0)],
				original,
				ChannelIndex::Ch2,
				&ObjectFilterSettings::default(),
			));
		}
		results
	}

	#[test]
	fn unbounded_cells_cover_the_plane() {
		let original = Raster::from_vec(20, 10, vec![100; 200]).unwrap();
		let points = point_results(&[(4, 5), (15, 5)], &original);
		let response = voronoi_tessellation(&points, &original, -1, ChannelIndex::A);
		assert_eq!(response.results.len(), 2);
		let covered: u64 = response.results.iter().map(Roi::area).sum();
		// Cells abut along the bisector; filling contours keeps the
		// total close to the full plane.
		assert!(covered >= 190, "covered {covered}");
	}

	#[test]
	fn bounded_cells_are_clipped_by_the_disc() {
		let original = Raster::from_vec(32, 32, vec![50; 1024]).unwrap();
		let points = point_results(&[(16, 16)], &original);
		let response = voronoi_tessellation(&points, &original, 5, ChannelIndex::A);
		assert_eq!(response.results.len(), 1);
		let roi = response.results.get(0).unwrap();
		// Disc of radius 5: bbox no bigger than 11x11.
		assert!(roi.bbox().width <= 11 && roi.bbox().height <= 11);
		assert!(roi.area() <= 11 * 11);
		assert!(roi.area() > 60);
	}

	#[test]
	fn no_points_produce_empty_response() {
		let original = Raster::from_vec(8, 8, vec![0; 64]).unwrap();
		let points = DetectionResults::new();
		let response = voronoi_tessellation(&points, &original, 10, ChannelIndex::A);
		assert!(response.results.is_empty());
	}
}
