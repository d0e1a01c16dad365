//! The outcome of detecting one (image, tile, channel).

use crate::DetectionResults;
use enumset::EnumSet;
use imagec_core::types::ChannelValidity;
use imagec_image::Raster;
use image::RgbImage;

/// Detection results plus the pixel context they were produced from.
#[derive(Debug, Default)]
pub struct DetectionResponse {
	pub results: DetectionResults,
	/// Unprocessed tile pixels, kept for intensity sampling.
	pub original: Option<Raster>,
	/// Painted overlay for interactive QA.
	pub control_image: Option<RgbImage>,
	/// Response level validity.
	pub validity: EnumSet<ChannelValidity>,
	/// When set, every object of this image-channel is excluded from
	/// aggregation.
	pub invalidate_whole_image: bool,
}

impl DetectionResponse {
	pub fn new(results: DetectionResults, original: Raster) -> DetectionResponse {
		DetectionResponse {
			results,
			original: Some(original),
			control_image: None,
			validity: EnumSet::empty(),
			invalidate_whole_image: false,
		}
	}

	pub fn set_validity(&mut self, flag: ChannelValidity) {
		self.validity |= flag;
	}
}
