//! Integer geometry primitives shared by the raster and detection
//! layers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Point {
	pub x: i32,
	pub y: i32,
}

impl Point {
	pub fn new(x: i32, y: i32) -> Point {
		Point { x, y }
	}
}

/// Axis aligned rectangle. `width`/`height` of 0 mean an empty
/// rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Rect {
	pub x: i32,
	pub y: i32,
	pub width: u32,
	pub height: u32,
}

impl Rect {
	pub fn new(x: i32, y: i32, width: u32, height: u32) -> Rect {
		Rect { x, y, width, height }
	}

	pub fn is_empty(&self) -> bool {
		self.width == 0 || self.height == 0
	}

	pub fn right(&self) -> i32 {
		self.x + self.width as i32
	}

	pub fn bottom(&self) -> i32 {
		self.y + self.height as i32
	}

	pub fn area(&self) -> u64 {
		u64::from(self.width) * u64::from(self.height)
	}

	pub fn contains(&self, p: Point) -> bool {
		p.x >= self.x && p.y >= self.y && p.x < self.right() && p.y < self.bottom()
	}

	/// Intersection of two rectangles; empty if they do not overlap.
	pub fn intersection(&self, other: &Rect) -> Rect {
		let x0 = self.x.max(other.x);
		let y0 = self.y.max(other.y);
		let x1 = self.right().min(other.right());
		let y1 = self.bottom().min(other.bottom());
		if x1 <= x0 || y1 <= y0 {
			return Rect::default();
		}
		Rect {
			x: x0,
			y: y0,
			width: (x1 - x0) as u32,
			height: (y1 - y0) as u32,
		}
	}

	pub fn intersects(&self, other: &Rect) -> bool {
		!self.intersection(other).is_empty()
	}

	/// Grows the rectangle by `margin` on every side, clamped to stay
	/// within `bounds` when given.
	pub fn inflated(&self, margin: i32, bounds: Option<&Rect>) -> Rect {
		let mut x0 = self.x - margin;
		let mut y0 = self.y - margin;
		let mut x1 = self.right() + margin;
		let mut y1 = self.bottom() + margin;
		if let Some(bounds) = bounds {
			x0 = x0.max(bounds.x);
			y0 = y0.max(bounds.y);
			x1 = x1.min(bounds.right());
			y1 = y1.min(bounds.bottom());
		}
		if x1 <= x0 || y1 <= y0 {
			return Rect::default();
		}
		Rect {
			x: x0,
			y: y0,
			width: (x1 - x0) as u32,
			height: (y1 - y0) as u32,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn intersection_of_overlapping_rects() {
		let a = Rect::new(0, 0, 10, 10);
		let b = Rect::new(5, 5, 10, 10);
		assert_eq!(a.intersection(&b), Rect::new(5, 5, 5, 5));
		assert!(a.intersects(&b));
	}

	#[test]
	fn intersection_of_disjoint_rects_is_empty() {
		let a = Rect::new(0, 0, 4, 4);
		let b = Rect::new(10, 10, 4, 4);
		assert!(a.intersection(&b).is_empty());
		assert!(!a.intersects(&b));
	}

	#[test]
	fn touching_rects_do_not_intersect() {
		let a = Rect::new(0, 0, 4, 4);
		let b = Rect::new(4, 0, 4, 4);
		assert!(a.intersection(&b).is_empty());
	}

	#[test]
	fn inflated_clamps_to_bounds() {
		let bounds = Rect::new(0, 0, 20, 20);
		let r = Rect::new(1, 1, 3, 3).inflated(2, Some(&bounds));
		assert_eq!(r, Rect::new(0, 0, 6, 6));
	}

	#[test]
	fn contains_is_half_open() {
		let r = Rect::new(0, 0, 2, 2);
		assert!(r.contains(Point::new(1, 1)));
		assert!(!r.contains(Point::new(2, 1)));
	}
}
