//! Model family segmenter.
//!
//! The inference backend is an opaque capability: the detector
//! letterbox-resizes the tile to the session's input size, hands the
//! normalised pixels over and interprets the returned rows as
//! `[cx, cy, w, h, objectness, class scores…]` (plus mask coefficients
//! for segmentation capable models). Rows surviving the confidence and
//! class thresholds go through non-maximum suppression before they are
//! turned into ROIs with confidence = objectness and class = argmax.

use crate::{DetectionResponse, DetectionResults, Roi, contour};
use anyhow::Result;
use imagec_core::{
	EngineError, StopToken,
	settings::{AiSettings, ObjectFilterSettings},
	types::{ChannelIndex, Rect},
};
use imagec_image::{Mask, Raster};
use std::sync::Arc;

/// Prototype mask stack of a segmentation capable model.
#[derive(Debug, Clone)]
pub struct PrototypeMasks {
	pub channels: usize,
	pub width: usize,
	pub height: usize,
	/// Channel major, row major within a channel.
	pub data: Vec<f32>,
}

impl PrototypeMasks {
	fn at(&self, channel: usize, x: usize, y: usize) -> f32 {
		self.data[channel * self.width * self.height + y * self.width + x]
	}
}

/// Raw model output for one forward pass.
#[derive(Debug, Clone, Default)]
pub struct InferenceOutput {
	/// One row per candidate detection.
	pub rows: Vec<Vec<f32>>,
	pub class_count: usize,
	pub prototypes: Option<PrototypeMasks>,
}

/// Opaque inference backend (e.g. an ONNX session).
pub trait InferenceSession: Send + Sync {
	/// Runs the model over a letterboxed, `[0, 1]` normalised plane of
	/// `width × height` pixels.
	fn forward(&self, input: &[f32], width: u32, height: u32) -> Result<InferenceOutput>;
}

pub struct ModelDetector {
	settings: AiSettings,
	filter: ObjectFilterSettings,
	session: Arc<dyn InferenceSession>,
}

struct Candidate {
	bbox: Rect,
	confidence: f32,
	class_id: u32,
	mask_coeffs: Vec<f32>,
}

impl ModelDetector {
	pub fn new(settings: AiSettings, filter: ObjectFilterSettings, session: Arc<dyn InferenceSession>) -> ModelDetector {
		ModelDetector {
			settings,
			filter,
			session,
		}
	}

	pub fn forward(
		&self,
		src: &Raster,
		original: &Raster,
		channel: ChannelIndex,
		stop: &StopToken,
	) -> Result<DetectionResponse, EngineError> {
		let (input, scale, pad_x, pad_y) = letterbox(src, self.settings.input_width, self.settings.input_height);
		let output = self
			.session
			.forward(&input, self.settings.input_width, self.settings.input_height)
			.map_err(|err| EngineError::DetectorFailed {
				channel,
				reason: err.to_string(),
			})?;
		if stop.is_stopped() {
			return Err(EngineError::Cancelled);
		}

		let candidates = self.decode(&output, src, scale, pad_x, pad_y);
		let kept = non_maximum_suppression(candidates, self.settings.nms_threshold);

		let mut results = DetectionResults::new();
		for candidate in kept {
			let mask = match &output.prototypes {
				Some(protos) if !candidate.mask_coeffs.is_empty() => assemble_mask(
					protos,
					&candidate.mask_coeffs,
					&candidate.bbox,
					scale,
					pad_x,
					pad_y,
					self.settings.input_width,
					self.settings.input_height,
				),
				_ => full_mask(&candidate.bbox),
			};
			let local = contour::largest_contour(&mask);
			results.push(Roi::new(
				0,
				f64::from(candidate.confidence),
				candidate.class_id,
				candidate.bbox,
				mask,
				local,
				original,
				channel,
				&self.filter,
			));
		}

		Ok(DetectionResponse::new(results, original.clone()))
	}

	fn decode(&self, output: &InferenceOutput, src: &Raster, scale: f32, pad_x: f32, pad_y: f32) -> Vec<Candidate> {
		let class_count = output.class_count.max(1);
		let mut candidates = Vec::new();
		for row in &output.rows {
			if row.len() < 5 {
				continue;
			}
			let objectness = row[4];
			if objectness < self.settings.confidence_threshold {
				continue;
			}
			let scores = &row[5..(5 + class_count).min(row.len())];
			let (class_id, class_score) = scores
				.iter()
				.enumerate()
				.max_by(|a, b| a.1.partial_cmp(b.1).expect("scores are finite"))
				.map(|(idx, score)| (idx as u32, *score))
				.unwrap_or((0, 1.0));
			if class_score < self.settings.class_threshold {
				continue;
			}
			if !self.settings.class_filter.is_empty() && !self.settings.class_filter.contains(&class_id) {
				continue;
			}

			// Map the letterboxed box back into tile coordinates.
			let cx = (row[0] - pad_x) / scale;
			let cy = (row[1] - pad_y) / scale;
			let w = row[2] / scale;
			let h = row[3] / scale;
			let left = (cx - w / 2.0).max(0.0) as i32;
			let top = (cy - h / 2.0).max(0.0) as i32;
			let width = (w as u32).min(src.width().saturating_sub(left as u32));
			let height = (h as u32).min(src.height().saturating_sub(top as u32));
			if width == 0 || height == 0 {
				continue;
			}
			candidates.push(Candidate {
				bbox: Rect::new(left, top, width, height),
				confidence: objectness,
				class_id,
				mask_coeffs: row.get(5 + class_count..).map(<[f32]>::to_vec).unwrap_or_default(),
			});
		}
		candidates
	}
}

/// Letterbox resize into `width × height`: scale preserving the aspect
/// ratio, pad the rest with zeros. Returns the normalised input plus
/// the scale and padding needed to map boxes back.
fn letterbox(src: &Raster, width: u32, height: u32) -> (Vec<f32>, f32, f32, f32) {
	let scale = (width as f32 / src.width().max(1) as f32).min(height as f32 / src.height().max(1) as f32);
	let scaled_w = (src.width() as f32 * scale).round() as u32;
	let scaled_h = (src.height() as f32 * scale).round() as u32;
	let pad_x = (width - scaled_w) as f32 / 2.0;
	let pad_y = (height - scaled_h) as f32 / 2.0;

	let mut input = vec![0.0f32; width as usize * height as usize];
	for y in 0..scaled_h {
		for x in 0..scaled_w {
			let sx = ((x as f32 / scale) as u32).min(src.width().saturating_sub(1));
			let sy = ((y as f32 / scale) as u32).min(src.height().saturating_sub(1));
			let out_x = x + pad_x as u32;
			let out_y = y + pad_y as u32;
			input[(out_y * width + out_x) as usize] = f32::from(src.get(sx, sy)) / f32::from(u16::MAX);
		}
	}
	(input, scale, pad_x, pad_y)
}

fn iou(a: &Rect, b: &Rect) -> f32 {
	let inter = a.intersection(b).area() as f32;
	if inter == 0.0 {
		return 0.0;
	}
	let union = (a.area() + b.area()) as f32 - inter;
	inter / union
}

/// Class agnostic non-maximum suppression, highest confidence first.
fn non_maximum_suppression(mut candidates: Vec<Candidate>, threshold: f32) -> Vec<Candidate> {
	candidates.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).expect("confidences are finite"));
	let mut kept: Vec<Candidate> = Vec::new();
	for candidate in candidates {
		if kept.iter().all(|winner| iou(&winner.bbox, &candidate.bbox) <= threshold) {
			kept.push(candidate);
		}
	}
	kept
}

fn full_mask(bbox: &Rect) -> Mask {
	let mut mask = Mask::new(bbox.width, bbox.height);
	for y in 0..bbox.height {
		for x in 0..bbox.width {
			mask.set(x, y, true);
		}
	}
	mask
}

#[allow(clippy::too_many_arguments)]
fn assemble_mask(
	protos: &PrototypeMasks,
	coeffs: &[f32],
	bbox: &Rect,
	scale: f32,
	pad_x: f32,
	pad_y: f32,
	input_width: u32,
	input_height: u32,
) -> Mask {
	let channels = protos.channels.min(coeffs.len());
	let mut mask = Mask::new(bbox.width, bbox.height);
	for y in 0..bbox.height {
		for x in 0..bbox.width {
			// Tile pixel -> letterboxed input pixel -> prototype grid.
			let in_x = (bbox.x + x as i32) as f32 * scale + pad_x;
			let in_y = (bbox.y + y as i32) as f32 * scale + pad_y;
			let px = (in_x / input_width as f32 * protos.width as f32) as usize;
			let py = (in_y / input_height as f32 * protos.height as f32) as usize;
			if px >= protos.width || py >= protos.height {
				continue;
			}
			let mut logit = 0.0f32;
			for (c, coeff) in coeffs.iter().enumerate().take(channels) {
				logit += coeff * protos.at(c, px, py);
			}
			let sigmoid = 1.0 / (1.0 + (-logit).exp());
			if sigmoid >= 0.5 {
				mask.set(x, y, true);
			}
		}
	}
	mask
}

#[cfg(test)]
mod tests {
	use super::*;

	/// Fake session returning canned rows.
	struct FakeSession {
		rows: Vec<Vec<f32>>,
		class_count: usize,
	}

	impl InferenceSession for FakeSession {
		fn forward(&self, _input: &[f32], _width: u32, _height: u32) -> Result<InferenceOutput> {
			Ok(InferenceOutput {
				rows: self.rows.clone(),
				class_count: self.class_count,
				prototypes: None,
			})
		}
	}

	fn detector(rows: Vec<Vec<f32>>, class_count: usize) -> ModelDetector {
		let settings = AiSettings {
			input_width: 64,
			input_height: 64,
			confidence_threshold: 0.5,
			class_threshold: 0.5,
			nms_threshold: 0.45,
			..AiSettings::default()
		};
		ModelDetector::new(
			settings,
			ObjectFilterSettings::default(),
			Arc::new(FakeSession { rows, class_count }),
		)
	}

	fn tile() -> Raster {
		Raster::from_vec(64, 64, vec![1000; 64 * 64]).unwrap()
	}

	#[test]
	fn keeps_confident_rows_and_drops_weak_ones() {
		// Input is 64x64 and the tile is 64x64, so coordinates map 1:1.
		let rows = vec![
			vec![20.0, 20.0, 10.0, 10.0, 0.9, 0.8, 0.1],
			vec![50.0, 50.0, 8.0, 8.0, 0.3, 0.9, 0.1], // below objectness
			vec![40.0, 12.0, 8.0, 8.0, 0.8, 0.2, 0.3], // below class score
		];
		let detector = detector(rows, 2);
		let src = tile();
		let response = detector.forward(&src, &src, ChannelIndex::Ch1, &StopToken::new()).unwrap();
		assert_eq!(response.results.len(), 1);
		let roi = response.results.get(0).unwrap();
		assert_eq!(roi.class_id(), 0);
		assert!((roi.confidence() - 0.9).abs() < 1e-6);
		assert_eq!(roi.bbox(), &Rect::new(15, 15, 10, 10));
	}

	#[test]
	fn nms_suppresses_overlapping_boxes() {
		let rows = vec![
			vec![20.0, 20.0, 10.0, 10.0, 0.9, 0.9],
			vec![21.0, 21.0, 10.0, 10.0, 0.8, 0.9], // heavy overlap, lower confidence
			vec![50.0, 50.0, 10.0, 10.0, 0.7, 0.9],
		];
		let detector = detector(rows, 1);
		let src = tile();
		let response = detector.forward(&src, &src, ChannelIndex::Ch1, &StopToken::new()).unwrap();
		assert_eq!(response.results.len(), 2);
	}

	#[test]
	fn class_filter_drops_other_classes() {
		let rows = vec![
			vec![20.0, 20.0, 10.0, 10.0, 0.9, 0.1, 0.9], // class 1
			vec![40.0, 40.0, 10.0, 10.0, 0.9, 0.9, 0.1], // class 0
		];
		let settings = AiSettings {
			input_width: 64,
			input_height: 64,
			class_filter: vec![1],
			..AiSettings::default()
		};
		let detector = ModelDetector::new(
			settings,
			ObjectFilterSettings::default(),
			Arc::new(FakeSession { rows, class_count: 2 }),
		);
		let src = tile();
		let response = detector.forward(&src, &src, ChannelIndex::Ch1, &StopToken::new()).unwrap();
		assert_eq!(response.results.len(), 1);
		assert_eq!(response.results.get(0).unwrap().class_id(), 1);
	}

	#[test]
	fn letterbox_pads_non_square_tiles() {
		let src = Raster::from_vec(32, 16, vec![u16::MAX; 32 * 16]).unwrap();
		let (input, scale, pad_x, pad_y) = letterbox(&src, 64, 64);
		assert_eq!(scale, 2.0);
		assert_eq!(pad_x, 0.0);
		assert_eq!(pad_y, 16.0);
		// Padded rows are zero, content rows are one.
		assert_eq!(input[0], 0.0);
		assert!((input[(20 * 64 + 10) as usize] - 1.0).abs() < 1e-6);
	}

	#[test]
	fn failing_session_maps_to_detector_failed() {
		struct Broken;
		impl InferenceSession for Broken {
			fn forward(&self, _: &[f32], _: u32, _: u32) -> Result<InferenceOutput> {
				anyhow::bail!("backend exploded")
			}
		}
		let detector = ModelDetector::new(
			AiSettings::default(),
			ObjectFilterSettings::default(),
			Arc::new(Broken),
		);
		let src = tile();
		let err = detector.forward(&src, &src, ChannelIndex::Ch2, &StopToken::new()).unwrap_err();
		assert!(matches!(err, EngineError::DetectorFailed { .. }));
	}
}
