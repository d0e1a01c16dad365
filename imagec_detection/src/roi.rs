//! One detected object: geometry, classification, intensity and
//! validity.

use crate::contour;
use enumset::EnumSet;
use imagec_core::{
	settings::ObjectFilterSettings,
	types::{ChannelIndex, MeasureChannel, MeasureChannelId, ObjectValidity, Point, Rect},
};
use imagec_image::{Mask, Raster};
use std::collections::BTreeMap;

/// Min/avg/max of the original pixels under a mask.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntensityStats {
	pub avg: f64,
	pub min: u16,
	pub max: u16,
}

impl IntensityStats {
	fn sample(original: &Raster, bbox: &Rect, mask: &Mask) -> IntensityStats {
		let mut sum: u64 = 0;
		let mut count: u64 = 0;
		let mut min = u16::MAX;
		let mut max = 0u16;
		for y in 0..mask.height() {
			for x in 0..mask.width() {
				if !mask.get(x, y) {
					continue;
				}
				let px = bbox.x + x as i32;
				let py = bbox.y + y as i32;
				if px < 0 || py < 0 {
					continue;
				}
				let v = original.get(px as u32, py as u32);
				sum += u64::from(v);
				count += 1;
				min = min.min(v);
				max = max.max(v);
			}
		}
		if count == 0 {
			return IntensityStats::default();
		}
		IntensityStats {
			avg: sum as f64 / count as f64,
			min,
			max,
		}
	}
}

/// Dilated copy of the geometry used as collision tolerance.
#[derive(Debug, Clone)]
struct SnapArea {
	bbox: Rect,
	mask: Mask,
	contour: Vec<Point>,
}

/// A region of interest. The mask is sized as the bounding box, the
/// contour is bounding box relative and the mask is set exactly where
/// the contour interior lies.
#[derive(Debug, Clone)]
pub struct Roi {
	index: u32,
	confidence: f64,
	class_id: u32,
	channel: ChannelIndex,
	bbox: Rect,
	mask: Mask,
	contour: Vec<Point>,
	snap: Option<SnapArea>,

	area: u64,
	perimeter: f64,
	circularity: f64,
	center_of_mass: Point,

	/// Intensity statistics per sampled channel; the own channel is
	/// keyed by `ChannelIndex::None`.
	intensity: BTreeMap<ChannelIndex, IntensityStats>,
	/// Cross-channel object counts.
	counts: BTreeMap<ChannelIndex, u64>,
	validity: EnumSet<ObjectValidity>,
}

impl Roi {
	pub fn new(
		index: u32,
		confidence: f64,
		class_id: u32,
		bbox: Rect,
		mask: Mask,
		contour: Vec<Point>,
		original: &Raster,
		channel: ChannelIndex,
		filter: &ObjectFilterSettings,
	) -> Roi {
		let area = mask.count();
		let perimeter = contour::perimeter(&contour);
		let circularity = if perimeter > 0.0 {
			(4.0 * std::f64::consts::PI * area as f64 / (perimeter * perimeter)).clamp(0.0, 1.0)
		} else {
			0.0
		};
		let center_of_mass = center_of_mass(&bbox, &mask, area);

		let mut intensity = BTreeMap::new();
		intensity.insert(ChannelIndex::None, IntensityStats::sample(original, &bbox, &mask));

		let mut validity = EnumSet::empty();
		if area < filter.min_particle_size {
			validity |= ObjectValidity::TooSmall;
		}
		if area > filter.max_particle_size {
			validity |= ObjectValidity::TooBig;
		}
		if circularity < f64::from(filter.min_circularity) {
			validity |= ObjectValidity::TooLessCircularity;
		}

		let snap = (filter.snap_area_size > 0).then(|| {
			let radius = filter.snap_area_size;
			let snap_mask = mask.dilate_disc(radius);
			let snap_contour = contour::largest_contour(&snap_mask);
			SnapArea {
				bbox: Rect::new(
					bbox.x - radius as i32,
					bbox.y - radius as i32,
					bbox.width + 2 * radius,
					bbox.height + 2 * radius,
				),
				mask: snap_mask,
				contour: snap_contour,
			}
		});

		Roi {
			index,
			confidence,
			class_id,
			channel,
			bbox,
			mask,
			contour,
			snap,
			area,
			perimeter,
			circularity,
			center_of_mass,
			intensity,
			counts: BTreeMap::new(),
			validity,
		}
	}

	pub fn index(&self) -> u32 {
		self.index
	}

	pub(crate) fn set_index(&mut self, index: u32) {
		self.index = index;
	}

	pub fn confidence(&self) -> f64 {
		self.confidence
	}

	pub fn class_id(&self) -> u32 {
		self.class_id
	}

	pub fn channel(&self) -> ChannelIndex {
		self.channel
	}

	pub fn bbox(&self) -> &Rect {
		&self.bbox
	}

	pub fn mask(&self) -> &Mask {
		&self.mask
	}

	pub fn contour(&self) -> &[Point] {
		&self.contour
	}

	pub fn area(&self) -> u64 {
		self.area
	}

	pub fn perimeter(&self) -> f64 {
		self.perimeter
	}

	pub fn circularity(&self) -> f64 {
		self.circularity
	}

	pub fn center_of_mass(&self) -> Point {
		self.center_of_mass
	}

	pub fn has_snap_area(&self) -> bool {
		self.snap.is_some()
	}

	pub fn snap_bbox(&self) -> &Rect {
		self.snap.as_ref().map_or(&self.bbox, |snap| &snap.bbox)
	}

	pub fn snap_contour(&self) -> &[Point] {
		self.snap.as_ref().map_or(&self.contour, |snap| &snap.contour)
	}

	fn snap_mask(&self) -> &Mask {
		self.snap.as_ref().map_or(&self.mask, |snap| &snap.mask)
	}

	pub fn validity(&self) -> EnumSet<ObjectValidity> {
		self.validity
	}

	pub fn is_valid(&self) -> bool {
		self.validity.is_empty()
	}

	/// Validity bits are monotone: this only ever adds reasons.
	pub fn set_validity(&mut self, flag: ObjectValidity) {
		self.validity |= flag;
	}

	pub fn intensity(&self, channel: ChannelIndex) -> Option<&IntensityStats> {
		self.intensity.get(&channel)
	}

	/// Records cross-channel intensity sampled from `original`.
	pub fn measure_intensity(&mut self, channel: ChannelIndex, original: &Raster) {
		self
			.intensity
			.insert(channel, IntensityStats::sample(original, &self.bbox, &self.mask));
	}

	pub fn set_count(&mut self, channel: ChannelIndex, count: u64) {
		self.counts.insert(channel, count);
	}

	pub fn count(&self, channel: ChannelIndex) -> Option<u64> {
		self.counts.get(&channel).copied()
	}

	/// True when the bounding box touches the border of `bounds`.
	pub fn touches_edge(&self, bounds: &Rect) -> bool {
		self.bbox.x <= bounds.x
			|| self.bbox.y <= bounds.y
			|| self.bbox.right() >= bounds.right()
			|| self.bbox.bottom() >= bounds.bottom()
	}

	/// Collision test with coloc tolerance: uses the snap geometry when
	/// present. `min_ratio` is compared against the overlap relative to
	/// the smaller of the two (snap) areas.
	pub fn is_intersecting(&self, other: &Roi, min_ratio: f64) -> bool {
		let ibox = self.snap_bbox().intersection(other.snap_bbox());
		if ibox.is_empty() {
			return false;
		}
		let own = self.snap_mask();
		let theirs = other.snap_mask();
		let and = own.and_in_rect(
			(self.snap_bbox().x, self.snap_bbox().y),
			theirs,
			(other.snap_bbox().x, other.snap_bbox().y),
			&ibox,
		);
		let smaller = own.count().min(theirs.count());
		if smaller == 0 {
			return false;
		}
		and.count() as f64 / smaller as f64 >= min_ratio
	}

	/// True when the plain masks of the two ROIs share at least one
	/// pixel.
	pub fn overlaps(&self, other: &Roi) -> bool {
		let ibox = self.bbox.intersection(&other.bbox);
		if ibox.is_empty() {
			return false;
		}
		let and = self
			.mask
			.and_in_rect((self.bbox.x, self.bbox.y), &other.mask, (other.bbox.x, other.bbox.y), &ibox);
		and.count() > 0
	}

	/// The fundamental cross-channel operator: intersects the plain
	/// masks of two ROIs and, if the overlap ratio reaches
	/// `min_intersection`, emits a new ROI in `target_channel` with
	/// intensity sampled from every given original.
	pub fn calc_intersection(
		&self,
		other: &Roi,
		originals: &BTreeMap<ChannelIndex, Raster>,
		min_intersection: f64,
		target_channel: ChannelIndex,
	) -> Option<Roi> {
		let ibox = self.bbox.intersection(&other.bbox);
		if ibox.is_empty() {
			return None;
		}

		let and = self
			.mask
			.and_in_rect((self.bbox.x, self.bbox.y), &other.mask, (other.bbox.x, other.bbox.y), &ibox);
		let overlap = and.count();
		let smaller = self.area.min(other.area);
		if overlap == 0 || smaller == 0 {
			return None;
		}
		let ratio = overlap as f64 / smaller as f64;
		if ratio < min_intersection {
			return None;
		}

		let contour_in_ibox = contour::largest_contour(&and);
		if contour_in_ibox.is_empty() {
			return None;
		}
		let rel_bbox = contour::bounding_box(&contour_in_ibox);
		let bbox = Rect::new(ibox.x + rel_bbox.x, ibox.y + rel_bbox.y, rel_bbox.width, rel_bbox.height);
		let local_contour = contour::translate(&contour_in_ibox, rel_bbox.x, rel_bbox.y);
		let mask = contour::fill_contour(&local_contour, rel_bbox.width, rel_bbox.height);

		let mut roi = match originals.values().next() {
			Some(first) => Roi::new(
				0,
				ratio,
				0,
				bbox,
				mask,
				local_contour,
				first,
				target_channel,
				&ObjectFilterSettings::default(),
			),
			None => {
				let empty = Raster::new(0, 0);
				Roi::new(
					0,
					ratio,
					0,
					bbox,
					mask,
					local_contour,
					&empty,
					target_channel,
					&ObjectFilterSettings::default(),
				)
			}
		};
		for (channel, original) in originals {
			roi.measure_intensity(*channel, original);
		}
		Some(roi)
	}

	/// The object's value vector keyed by [`MeasureChannelId`]. Lists
	/// hold one element each; the layout allows cross-channel entries
	/// to carry several source samples.
	pub fn measures(&self) -> BTreeMap<MeasureChannelId, Vec<f64>> {
		let mut values = BTreeMap::new();
		let own = MeasureChannelId::own;
		values.insert(own(MeasureChannel::Confidence), vec![self.confidence]);
		values.insert(own(MeasureChannel::AreaSize), vec![self.area as f64]);
		values.insert(own(MeasureChannel::Perimeter), vec![self.perimeter]);
		values.insert(own(MeasureChannel::Circularity), vec![self.circularity]);
		values.insert(own(MeasureChannel::CenterOfMassX), vec![f64::from(self.center_of_mass.x)]);
		values.insert(own(MeasureChannel::CenterOfMassY), vec![f64::from(self.center_of_mass.y)]);
		values.insert(own(MeasureChannel::BoundingBoxWidth), vec![f64::from(self.bbox.width)]);
		values.insert(own(MeasureChannel::BoundingBoxHeight), vec![f64::from(self.bbox.height)]);

		for (channel, stats) in &self.intensity {
			if *channel == ChannelIndex::None {
				values.insert(own(MeasureChannel::IntensityAvg), vec![stats.avg]);
				values.insert(own(MeasureChannel::IntensityMin), vec![f64::from(stats.min)]);
				values.insert(own(MeasureChannel::IntensityMax), vec![f64::from(stats.max)]);
			} else {
				values.insert(
					MeasureChannelId::new(MeasureChannel::CrossChannelIntensityAvg, *channel),
					vec![stats.avg],
				);
				values.insert(
					MeasureChannelId::new(MeasureChannel::CrossChannelIntensityMin, *channel),
					vec![f64::from(stats.min)],
				);
				values.insert(
					MeasureChannelId::new(MeasureChannel::CrossChannelIntensityMax, *channel),
					vec![f64::from(stats.max)],
				);
			}
		}
		for (channel, count) in &self.counts {
			values.insert(
				MeasureChannelId::new(MeasureChannel::CrossChannelCount, *channel),
				vec![*count as f64],
			);
		}
		values
	}
}

fn center_of_mass(bbox: &Rect, mask: &Mask, area: u64) -> Point {
	if area == 0 {
		return Point::new(bbox.x, bbox.y);
	}
	let mut sum_x: i64 = 0;
	let mut sum_y: i64 = 0;
	for y in 0..mask.height() {
		for x in 0..mask.width() {
			if mask.get(x, y) {
				sum_x += i64::from(x);
				sum_y += i64::from(y);
			}
		}
	}
	Point::new(
		bbox.x + (sum_x / area as i64) as i32,
		bbox.y + (sum_y / area as i64) as i32,
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	fn filled_square(origin: (i32, i32), size: u32, original: &Raster, filter: &ObjectFilterSettings) -> Roi {
		let mut mask = Mask::new(size, size);
		for y in 0..size {
			for x in 0..size {
				mask.set(x, y, true);
			}
		}
		let contour = contour::largest_contour(&mask);
		Roi::new(
			0,
			0.9,
			0,
			Rect::new(origin.0, origin.1, size, size),
			mask,
			contour,
			original,
			ChannelIndex::Ch0,
			filter,
		)
	}

	fn flat_raster(value: u16) -> Raster {
		Raster::from_vec(16, 16, vec![value; 256]).unwrap()
	}

	#[test]
	fn geometry_of_a_square() {
		let original = flat_raster(500);
		let roi = filled_square((2, 3), 4, &original, &ObjectFilterSettings::default());
		assert_eq!(roi.area(), 16);
		assert!(roi.circularity() > 0.5);
		assert_eq!(roi.center_of_mass(), Point::new(3, 4));
		let stats = roi.intensity(ChannelIndex::None).unwrap();
		assert_relative_eq!(stats.avg, 500.0);
		assert_eq!((stats.min, stats.max), (500, 500));
		assert!(roi.is_valid());
	}

	#[test]
	fn single_pixel_has_zero_circularity() {
		let original = flat_raster(10);
		let mut mask = Mask::new(1, 1);
		mask.set(0, 0, true);
		let filter = ObjectFilterSettings {
			min_circularity: 0.5,
			..ObjectFilterSettings::default()
		};
		let roi = Roi::new(
			0,
			1.0,
			0,
			Rect::new(5, 5, 1, 1),
			mask,
			vec![Point::new(0, 0)],
			&original,
			ChannelIndex::Ch0,
			&filter,
		);
		assert_eq!(roi.area(), 1);
		assert_eq!(roi.perimeter(), 0.0);
		assert_eq!(roi.circularity(), 0.0);
		assert!(roi.validity().contains(ObjectValidity::TooLessCircularity));
	}

	#[test]
	fn size_filters_mark_validity() {
		let original = flat_raster(10);
		let filter = ObjectFilterSettings {
			min_particle_size: 100,
			..ObjectFilterSettings::default()
		};
		let roi = filled_square((0, 0), 4, &original, &filter);
		assert!(roi.validity().contains(ObjectValidity::TooSmall));
		assert!(!roi.is_valid());
	}

	#[test]
	fn intersection_of_overlapping_squares() {
		let original = flat_raster(100);
		let filter = ObjectFilterSettings::default();
		let a = filled_square((0, 0), 8, &original, &filter);
		let b = filled_square((4, 4), 8, &original, &filter);
		let originals = BTreeMap::from([(ChannelIndex::Ch0, original.clone())]);

		let roi = a.calc_intersection(&b, &originals, 0.1, ChannelIndex::A).unwrap();
		assert_eq!(roi.channel(), ChannelIndex::A);
		assert_eq!(roi.bbox(), &Rect::new(4, 4, 4, 4));
		assert_eq!(roi.area(), 16);
		assert_relative_eq!(roi.confidence(), 16.0 / 64.0);
		assert!(roi.intensity(ChannelIndex::Ch0).is_some());
	}

	#[test]
	fn intersection_of_disjoint_squares_is_none() {
		let original = flat_raster(100);
		let filter = ObjectFilterSettings::default();
		let a = filled_square((0, 0), 4, &original, &filter);
		let b = filled_square((10, 10), 4, &original, &filter);
		let originals = BTreeMap::new();
		assert!(a.calc_intersection(&b, &originals, 0.1, ChannelIndex::A).is_none());
	}

	#[test]
	fn intersection_below_ratio_is_none() {
		let original = flat_raster(100);
		let filter = ObjectFilterSettings::default();
		let a = filled_square((0, 0), 8, &original, &filter);
		let b = filled_square((7, 7), 8, &original, &filter);
		let originals = BTreeMap::new();
		// 1 px overlap over min area 64 = ratio ~0.016
		assert!(a.calc_intersection(&b, &originals, 0.5, ChannelIndex::A).is_none());
	}

	#[test]
	fn snap_area_extends_collision() {
		let original = flat_raster(100);
		let snap_filter = ObjectFilterSettings {
			snap_area_size: 3,
			..ObjectFilterSettings::default()
		};
		let a = filled_square((0, 0), 4, &original, &snap_filter);
		let b = filled_square((5, 0), 4, &original, &snap_filter);
		// Plain masks are 1 px apart, snap areas overlap.
		assert!(a.has_snap_area());
		assert!(a.is_intersecting(&b, 0.01));

		let no_snap = ObjectFilterSettings::default();
		let c = filled_square((0, 0), 4, &original, &no_snap);
		let d = filled_square((5, 0), 4, &original, &no_snap);
		assert!(!c.is_intersecting(&d, 0.01));
	}

	#[test]
	fn measures_contain_core_columns() {
		let original = flat_raster(300);
		let mut roi = filled_square((1, 1), 4, &original, &ObjectFilterSettings::default());
		roi.set_count(ChannelIndex::Ch4, 3);
		let values = roi.measures();
		assert_eq!(values[&MeasureChannelId::own(MeasureChannel::AreaSize)], vec![16.0]);
		assert_eq!(
			values[&MeasureChannelId::new(MeasureChannel::CrossChannelCount, ChannelIndex::Ch4)],
			vec![3.0]
		);
		assert_eq!(values[&MeasureChannelId::own(MeasureChannel::IntensityMin)], vec![300.0]);
	}

	#[test]
	fn edge_detection_against_bounds() {
		let original = flat_raster(1);
		let roi = filled_square((0, 3), 4, &original, &ObjectFilterSettings::default());
		assert!(roi.touches_edge(&Rect::new(0, 0, 16, 16)));
		let inner = filled_square((5, 5), 4, &original, &ObjectFilterSettings::default());
		assert!(!inner.touches_edge(&Rect::new(0, 0, 16, 16)));
	}
}
