//! Contour extraction and polygon helpers over binary masks.

use imagec_core::types::{Point, Rect};
use imagec_image::Mask;
use imageproc::contours::{BorderType, find_contours};

/// One traced border.
#[derive(Debug, Clone)]
pub struct TracedContour {
	pub points: Vec<Point>,
	pub is_outer: bool,
	pub has_parent: bool,
}

/// Traces all borders of the mask, outermost first.
pub fn trace_contours(mask: &Mask) -> Vec<TracedContour> {
	if mask.is_empty() {
		return Vec::new();
	}
	find_contours::<i32>(&mask.to_gray_image())
		.into_iter()
		.map(|contour| TracedContour {
			points: contour.points.into_iter().map(|p| Point::new(p.x, p.y)).collect(),
			is_outer: contour.border_type == BorderType::Outer,
			has_parent: contour.parent.is_some(),
		})
		.collect()
}

/// Outermost borders only; borders of holes and of objects nested
/// inside holes are dropped.
pub fn outer_contours(mask: &Mask) -> Vec<Vec<Point>> {
	trace_contours(mask)
		.into_iter()
		.filter(|c| c.is_outer && !c.has_parent)
		.map(|c| c.points)
		.collect()
}

/// The border with the most points, or an empty polygon for an empty
/// mask.
pub fn largest_contour(mask: &Mask) -> Vec<Point> {
	trace_contours(mask)
		.into_iter()
		.filter(|c| c.is_outer)
		.map(|c| c.points)
		.max_by_key(|points| points.len())
		.unwrap_or_default()
}

/// Bounding box of a polygon; empty for an empty polygon.
pub fn bounding_box(points: &[Point]) -> Rect {
	let Some(first) = points.first() else {
		return Rect::default();
	};
	let mut min_x = first.x;
	let mut min_y = first.y;
	let mut max_x = first.x;
	let mut max_y = first.y;
	for p in points {
		min_x = min_x.min(p.x);
		min_y = min_y.min(p.y);
		max_x = max_x.max(p.x);
		max_y = max_y.max(p.y);
	}
	Rect::new(min_x, min_y, (max_x - min_x + 1) as u32, (max_y - min_y + 1) as u32)
}

/// Shifts every point by `(-dx, -dy)`, used to bring a contour into
/// bounding box relative coordinates.
pub fn translate(points: &[Point], dx: i32, dy: i32) -> Vec<Point> {
	points.iter().map(|p| Point::new(p.x - dx, p.y - dy)).collect()
}

/// Fills the interior of a closed contour into a mask of the given
/// size. The contour interior includes the border itself; holes inside
/// the polygon are filled over, matching the detector's object masks.
pub fn fill_contour(points: &[Point], width: u32, height: u32) -> Mask {
	let mut mask = Mask::new(width, height);
	match points.len() {
		0 => {}
		1 => mask.set(points[0].x.max(0) as u32, points[0].y.max(0) as u32, true),
		2 => {
			draw_segment(&mut mask, points[0], points[1]);
		}
		_ => {
			// Even-odd scanline fill over the closed polygon.
			for y in 0..height as i32 {
				let mut crossings: Vec<f64> = Vec::new();
				for i in 0..points.len() {
					let a = points[i];
					let b = points[(i + 1) % points.len()];
					if (a.y <= y && b.y > y) || (b.y <= y && a.y > y) {
						let t = f64::from(y - a.y) / f64::from(b.y - a.y);
						crossings.push(f64::from(a.x) + t * f64::from(b.x - a.x));
					}
				}
				crossings.sort_by(|a, b| a.partial_cmp(b).expect("crossings are finite"));
				for pair in crossings.chunks(2) {
					if let [x0, x1] = pair {
						let from = x0.ceil().max(0.0) as u32;
						let to = x1.floor().min(f64::from(width - 1)) as u32;
						for x in from..=to {
							mask.set(x, y as u32, true);
						}
					}
				}
			}
			// The border itself belongs to the object.
			for i in 0..points.len() {
				draw_segment(&mut mask, points[i], points[(i + 1) % points.len()]);
			}
		}
	}
	mask
}

fn draw_segment(mask: &mut Mask, a: Point, b: Point) {
	let steps = (b.x - a.x).abs().max((b.y - a.y).abs()).max(1);
	for s in 0..=steps {
		let x = a.x + (b.x - a.x) * s / steps;
		let y = a.y + (b.y - a.y) * s / steps;
		if x >= 0 && y >= 0 {
			mask.set(x as u32, y as u32, true);
		}
	}
}

/// Arc length of the closed contour with the ImageJ convention:
/// orthogonal steps count 1, diagonal steps √2. Contours with fewer
/// than two points have no measurable perimeter.
pub fn perimeter(points: &[Point]) -> f64 {
	if points.len() < 2 {
		return 0.0;
	}
	let mut length = 0.0;
	for i in 0..points.len() {
		let a = points[i];
		let b = points[(i + 1) % points.len()];
		let dx = f64::from(b.x - a.x);
		let dy = f64::from(b.y - a.y);
		length += (dx * dx + dy * dy).sqrt();
	}
	length
}
