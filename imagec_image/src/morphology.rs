//! Binary morphology: chamfer distance transform and the distance
//! transform watershed used to split touching objects.

use crate::Mask;

/// Chamfer 3-4 distance to the nearest background pixel, scaled so that
/// one orthogonal step is 3.
pub fn distance_transform(mask: &Mask) -> Vec<u32> {
	let width = mask.width() as i32;
	let height = mask.height() as i32;
	let len = (width * height) as usize;
	const INF: u32 = u32::MAX / 2;
	let mut dist = vec![0u32; len];

	for i in 0..len {
		let x = (i as i32 % width) as u32;
		let y = (i as i32 / width) as u32;
		if mask.get(x, y) {
			dist[i] = INF;
		}
	}

	let at = |dist: &[u32], x: i32, y: i32| -> u32 {
		if x < 0 || y < 0 || x >= width || y >= height {
			0
		} else {
			dist[(y * width + x) as usize]
		}
	};

	// Forward pass
	for y in 0..height {
		for x in 0..width {
			let idx = (y * width + x) as usize;
			if dist[idx] == 0 {
				continue;
			}
			let d = dist[idx]
				.min(at(&dist, x - 1, y).saturating_add(3))
				.min(at(&dist, x, y - 1).saturating_add(3))
				.min(at(&dist, x - 1, y - 1).saturating_add(4))
				.min(at(&dist, x + 1, y - 1).saturating_add(4));
			dist[idx] = d;
		}
	}
	// Backward pass
	for y in (0..height).rev() {
		for x in (0..width).rev() {
			let idx = (y * width + x) as usize;
			if dist[idx] == 0 {
				continue;
			}
			let d = dist[idx]
				.min(at(&dist, x + 1, y).saturating_add(3))
				.min(at(&dist, x, y + 1).saturating_add(3))
				.min(at(&dist, x + 1, y + 1).saturating_add(4))
				.min(at(&dist, x - 1, y + 1).saturating_add(4));
			dist[idx] = d;
		}
	}

	dist
}

const NEIGHBOURS: [(i32, i32); 8] = [
	(-1, -1),
	(0, -1),
	(1, -1),
	(-1, 0),
	(1, 0),
	(-1, 1),
	(0, 1),
	(1, 1),
];

/// Distance transform watershed. Touching blobs are separated by
/// clearing the divide pixels between their distance maxima.
pub fn watershed(mask: &mut Mask) {
	let width = mask.width() as i32;
	let height = mask.height() as i32;
	if width == 0 || height == 0 {
		return;
	}
	let dist = distance_transform(mask);
	let len = dist.len();

	// Seed labels at the local maxima of the distance map; connected
	// plateaus share one label.
	let mut labels = vec![0i32; len];
	let mut next_label = 1;
	for y in 0..height {
		for x in 0..width {
			let idx = (y * width + x) as usize;
			if dist[idx] == 0 || labels[idx] != 0 {
				continue;
			}
			let is_max = NEIGHBOURS.iter().all(|(dx, dy)| {
				let nx = x + dx;
				let ny = y + dy;
				if nx < 0 || ny < 0 || nx >= width || ny >= height {
					return true;
				}
				dist[(ny * width + nx) as usize] <= dist[idx]
			});
			if !is_max {
				continue;
			}
			// Flood the plateau of equal distance.
			labels[idx] = next_label;
			let mut stack = vec![(x, y)];
			while let Some((cx, cy)) = stack.pop() {
				for (dx, dy) in NEIGHBOURS {
					let nx = cx + dx;
					let ny = cy + dy;
					if nx < 0 || ny < 0 || nx >= width || ny >= height {
						continue;
					}
					let nidx = (ny * width + nx) as usize;
					if labels[nidx] == 0 && dist[nidx] == dist[idx] {
						labels[nidx] = next_label;
						stack.push((nx, ny));
					}
				}
			}
			next_label += 1;
		}
	}
	if next_label <= 2 {
		// Zero or one catchment basin, nothing to split.
		return;
	}

	// Grow the labels downhill, highest distance first. A pixel whose
	// labeled neighbours disagree is a divide.
	const DIVIDE: i32 = -1;
	let mut order: Vec<usize> = (0..len).filter(|idx| dist[*idx] > 0).collect();
	order.sort_by(|a, b| dist[*b].cmp(&dist[*a]));

	for idx in order {
		if labels[idx] != 0 {
			continue;
		}
		let x = idx as i32 % width;
		let y = idx as i32 / width;
		let mut found = 0i32;
		let mut is_divide = false;
		for (dx, dy) in NEIGHBOURS {
			let nx = x + dx;
			let ny = y + dy;
			if nx < 0 || ny < 0 || nx >= width || ny >= height {
				continue;
			}
			let label = labels[(ny * width + nx) as usize];
			if label > 0 {
				if found > 0 && label != found {
					is_divide = true;
				}
				found = label;
			}
		}
		labels[idx] = if is_divide { DIVIDE } else { found };
	}

	for y in 0..height {
		for x in 0..width {
			if labels[(y * width + x) as usize] == DIVIDE {
				mask.set(x as u32, y as u32, false);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn disc(mask: &mut Mask, cx: i32, cy: i32, r: i32) {
		for y in 0..mask.height() as i32 {
			for x in 0..mask.width() as i32 {
				if (x - cx) * (x - cx) + (y - cy) * (y - cy) <= r * r {
					mask.set(x as u32, y as u32, true);
				}
			}
		}
	}

	fn count_components(mask: &Mask) -> usize {
		let width = mask.width() as i32;
		let height = mask.height() as i32;
		let mut seen = vec![false; (width * height) as usize];
		let mut components = 0;
		for y in 0..height {
			for x in 0..width {
				let idx = (y * width + x) as usize;
				if !mask.get(x as u32, y as u32) || seen[idx] {
					continue;
				}
				components += 1;
				let mut stack = vec![(x, y)];
				seen[idx] = true;
				while let Some((cx, cy)) = stack.pop() {
					for (dx, dy) in NEIGHBOURS {
						let nx = cx + dx;
						let ny = cy + dy;
						if nx < 0 || ny < 0 || nx >= width || ny >= height {
							continue;
						}
						let nidx = (ny * width + nx) as usize;
						if mask.get(nx as u32, ny as u32) && !seen[nidx] {
							seen[nidx] = true;
							stack.push((nx, ny));
						}
					}
				}
			}
		}
		components
	}

	#[test]
	fn distance_is_zero_on_background_and_grows_inward() {
		let mut mask = Mask::new(7, 7);
		disc(&mut mask, 3, 3, 2);
		let dist = distance_transform(&mask);
		assert_eq!(dist[0], 0);
		let centre = dist[3 * 7 + 3];
		let edge = dist[3 * 7 + 1];
		assert!(centre > edge);
		assert!(edge >= 3);
	}

	#[test]
	fn watershed_splits_touching_discs() {
		let mut mask = Mask::new(40, 20);
		disc(&mut mask, 12, 10, 6);
		disc(&mut mask, 25, 10, 6);
		assert_eq!(count_components(&mask), 1, "discs must touch for this test");
		watershed(&mut mask);
		assert_eq!(count_components(&mask), 2);
	}

	#[test]
	fn watershed_keeps_single_blob_untouched() {
		let mut mask = Mask::new(20, 20);
		disc(&mut mask, 10, 10, 5);
		let before = mask.count();
		watershed(&mut mask);
		assert_eq!(mask.count(), before);
	}
}
