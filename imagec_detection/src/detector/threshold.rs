//! Threshold family segmenter.
//!
//! Thresholds the preprocessed plane, optionally splits touching blobs
//! with a distance transform watershed, extracts external contours
//! (holes are ignored) and emits one ROI per contour with the used
//! threshold value as confidence. A tile producing more than
//! [`MAX_CONTOURS`] contours is abandoned as noise.

use crate::{DetectionResponse, DetectionResults, Roi, contour};
use imagec_core::{
	EngineError,
	settings::{ObjectFilterSettings, ThresholdSettings},
	types::ChannelIndex,
};
use imagec_image::{Raster, morphology, threshold};
use log::warn;

/// Safety valve: more contours than this in one tile is noise.
pub const MAX_CONTOURS: usize = 50_000;

pub struct ThresholdDetector {
	settings: ThresholdSettings,
	filter: ObjectFilterSettings,
}

impl ThresholdDetector {
	pub fn new(settings: ThresholdSettings, filter: ObjectFilterSettings) -> ThresholdDetector {
		ThresholdDetector { settings, filter }
	}

	pub fn forward(
		&self,
		src: &Raster,
		original: &Raster,
		channel: ChannelIndex,
	) -> Result<DetectionResponse, EngineError> {
		let (used_threshold, mut binary) = threshold::apply(src, &self.settings);
		if self.settings.watershed_segmentation {
			morphology::watershed(&mut binary);
		}

		let contours = contour::trace_contours(&binary);
		if contours.len() > MAX_CONTOURS {
			warn!("Too much particles found >{}<, seems to be noise.", contours.len());
			return Err(EngineError::TooManyObjects(0));
		}

		let mut results = DetectionResults::new();
		let confidence = f64::from(used_threshold);
		for traced in contours {
			// Ignore holes and anything nested inside a hole.
			if !traced.is_outer || traced.has_parent {
				continue;
			}
			let bbox_abs = contour::bounding_box(&traced.points);
			let local = contour::translate(&traced.points, bbox_abs.x, bbox_abs.y);
			let mask = contour::fill_contour(&local, bbox_abs.width, bbox_abs.height);
			results.push(Roi::new(
				0,
				confidence,
				0,
				bbox_abs,
				mask,
				local,
				original,
				channel,
				&self.filter,
			));
		}

		Ok(DetectionResponse::new(results, original.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use imagec_core::settings::ThresholdMode;

	fn settings(min: u16) -> ThresholdSettings {
		ThresholdSettings {
			mode: ThresholdMode::Manual,
			threshold_min: min,
			..ThresholdSettings::default()
		}
	}

	fn two_blob_raster() -> Raster {
		// Two bright 3x3 blobs on dark background.
		let mut data = vec![100u16; 400];
		for y in 2..5 {
			for x in 2..5 {
				data[y * 20 + x] = 40000;
			}
		}
		for y in 10..13 {
			for x in 12..15 {
				data[y * 20 + x] = 42000;
			}
		}
		Raster::from_vec(20, 20, data).unwrap()
	}

	#[test]
	fn detects_two_blobs() {
		let raster = two_blob_raster();
		let detector = ThresholdDetector::new(settings(1000), ObjectFilterSettings::default());
		let response = detector.forward(&raster, &raster, ChannelIndex::Ch0).unwrap();
		assert_eq!(response.results.len(), 2);
		for roi in &response.results {
			assert_eq!(roi.area(), 9);
			assert_eq!(roi.confidence(), 1000.0);
			assert!(roi.is_valid());
		}
	}

	#[test]
	fn holes_do_not_become_objects() {
		// A ring: one object with a hole in the middle.
		let mut data = vec![0u16; 100];
		for y in 2..7 {
			for x in 2..7 {
				data[y * 10 + x] = 5000;
			}
		}
		data[4 * 10 + 4] = 0;
		let raster = Raster::from_vec(10, 10, data).unwrap();
		let detector = ThresholdDetector::new(settings(1000), ObjectFilterSettings::default());
		let response = detector.forward(&raster, &raster, ChannelIndex::Ch0).unwrap();
		assert_eq!(response.results.len(), 1);
		// The hole is filled over in the object mask.
		assert_eq!(response.results.get(0).unwrap().area(), 25);
	}

	#[test]
	fn empty_plane_finds_nothing() {
		let raster = Raster::from_vec(8, 8, vec![0; 64]).unwrap();
		let detector = ThresholdDetector::new(settings(100), ObjectFilterSettings::default());
		let response = detector.forward(&raster, &raster, ChannelIndex::Ch0).unwrap();
		assert!(response.results.is_empty());
		assert!(response.validity.is_empty());
	}

	#[test]
	fn watershed_splits_touching_blobs() {
		// Two discs connected by a thin bridge at y=10.
		let mut data = vec![0u16; 40 * 20];
		let disc = |data: &mut Vec<u16>, cx: i32, cy: i32, r: i32| {
			for y in 0..20i32 {
				for x in 0..40i32 {
					if (x - cx) * (x - cx) + (y - cy) * (y - cy) <= r * r {
						data[(y * 40 + x) as usize] = 30000;
					}
				}
			}
		};
		disc(&mut data, 12, 10, 6);
		disc(&mut data, 25, 10, 6);
		let raster = Raster::from_vec(40, 20, data).unwrap();

		let plain = ThresholdDetector::new(settings(1000), ObjectFilterSettings::default());
		let merged = plain.forward(&raster, &raster, ChannelIndex::Ch0).unwrap();
		assert_eq!(merged.results.len(), 1);

		let mut split_settings = settings(1000);
		split_settings.watershed_segmentation = true;
		let split = ThresholdDetector::new(split_settings, ObjectFilterSettings::default());
		let response = split.forward(&raster, &raster, ChannelIndex::Ch0).unwrap();
		assert_eq!(response.results.len(), 2);
	}
}
