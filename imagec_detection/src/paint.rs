//! Control image painting: a BGR-style overlay of the detections on
//! the tile, used for interactive QA.

use crate::DetectionResults;
use image::{Rgb, RgbImage};
use imagec_image::Raster;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect as DrawRect;

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Deterministic per-object palette, keyed by the ROI index so repeated
/// runs produce identical control images.
const PALETTE: [Rgb<u8>; 12] = [
	Rgb([230, 25, 75]),
	Rgb([60, 180, 75]),
	Rgb([255, 225, 25]),
	Rgb([0, 130, 200]),
	Rgb([245, 130, 48]),
	Rgb([145, 30, 180]),
	Rgb([70, 240, 240]),
	Rgb([240, 50, 230]),
	Rgb([210, 245, 60]),
	Rgb([250, 190, 212]),
	Rgb([0, 128, 128]),
	Rgb([220, 190, 255]),
];

/// Paints masks and contours of `results` over the tile.
///
/// Invalid objects are filled white, valid ones get a palette colour
/// and a green contour. Rectangles are painted for the model detector
/// only.
pub fn generate_control_image(results: &DetectionResults, base: &Raster, paint_rectangles: bool) -> RgbImage {
	let gray = base.to_luma8();
	let mut img = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
		let v = gray.get_pixel(x, y)[0];
		Rgb([v, v, v])
	});

	for roi in results {
		if roi.mask().is_empty() || roi.bbox().is_empty() {
			continue;
		}
		let color = if roi.is_valid() {
			PALETTE[roi.index() as usize % PALETTE.len()]
		} else {
			WHITE
		};

		// Mask area, blended half transparent.
		let bbox = roi.bbox();
		for my in 0..roi.mask().height() {
			for mx in 0..roi.mask().width() {
				if !roi.mask().get(mx, my) {
					continue;
				}
				let px = bbox.x + mx as i32;
				let py = bbox.y + my as i32;
				if px < 0 || py < 0 || px as u32 >= img.width() || py as u32 >= img.height() {
					continue;
				}
				let old = img.get_pixel(px as u32, py as u32).0;
				img.put_pixel(
					px as u32,
					py as u32,
					Rgb([
						((u16::from(old[0]) + u16::from(color.0[0])) >> 1) as u8,
						((u16::from(old[1]) + u16::from(color.0[1])) >> 1) as u8,
						((u16::from(old[2]) + u16::from(color.0[2])) >> 1) as u8,
					]),
				);
			}
		}

		if paint_rectangles && bbox.width > 0 && bbox.height > 0 {
			draw_hollow_rect_mut(
				&mut img,
				DrawRect::at(bbox.x, bbox.y).of_size(bbox.width, bbox.height),
				color,
			);
		}

		// Contour only for valid particles.
		if roi.is_valid() {
			for p in roi.contour() {
				let px = bbox.x + p.x;
				let py = bbox.y + p.y;
				if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
					img.put_pixel(px as u32, py as u32, GREEN);
				}
			}
			if roi.has_snap_area() {
				let snap_bbox = roi.snap_bbox();
				for p in roi.snap_contour() {
					let px = snap_bbox.x + p.x;
					let py = snap_bbox.y + p.y;
					if px >= 0 && py >= 0 && (px as u32) < img.width() && (py as u32) < img.height() {
						img.put_pixel(px as u32, py as u32, GREEN);
					}
				}
			}
		}
	}

	img
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{Roi, contour};
	use imagec_core::{
		settings::ObjectFilterSettings,
		types::{ChannelIndex, ObjectValidity, Rect},
	};
	use imagec_image::Mask;

	fn results_with_one_square(valid: bool) -> (DetectionResults, Raster) {
		let original = Raster::from_vec(16, 16, vec![0; 256]).unwrap();
		let mut mask = Mask::new(4, 4);
		for y in 0..4 {
			for x in 0..4 {
				mask.set(x, y, true);
			}
		}
		let points = contour::largest_contour(&mask);
		let mut roi = Roi::new(
			0,
			1.0,
			0,
			Rect::new(4, 4, 4, 4),
			mask,
			points,
			&original,
			ChannelIndex::Ch0,
			&ObjectFilterSettings::default(),
		);
		if !valid {
			roi.set_validity(ObjectValidity::TooSmall);
		}
		let mut results = DetectionResults::new();
		results.push(roi);
		(results, original)
	}

	#[test]
	fn valid_objects_get_contour_and_colour() {
		let (results, original) = results_with_one_square(true);
		let img = generate_control_image(&results, &original, false);
		assert_eq!(img.dimensions(), (16, 16));
		// Contour pixel is green.
		assert_eq!(*img.get_pixel(4, 4), GREEN);
		// Background untouched.
		assert_eq!(*img.get_pixel(0, 0), Rgb([0, 0, 0]));
	}

	#[test]
	fn invalid_objects_are_filled_white_without_contour() {
		let (results, original) = results_with_one_square(false);
		let img = generate_control_image(&results, &original, false);
		// Blend of black background and white fill.
		assert_eq!(*img.get_pixel(5, 5), Rgb([127, 127, 127]));
		assert_ne!(*img.get_pixel(4, 4), GREEN);
	}

	#[test]
	fn deterministic_output() {
		let (results, original) = results_with_one_square(true);
		let a = generate_control_image(&results, &original, true);
		let b = generate_control_image(&results, &original, true);
		assert_eq!(a.as_raw(), b.as_raw());
	}
}
