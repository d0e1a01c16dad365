//! Cross-channel pipeline steps.
//!
//! Steps operate on the per-tile map of detection responses after all
//! channels of the tile completed. They run in declared order and each
//! step's output is inserted into the map under its output channel
//! before the next step runs.

use imagec_core::{settings::CrossChannelStep, types::ChannelIndex};
use imagec_detection::{DetectionResponse, paint, voronoi};
use imagec_image::Raster;
use log::warn;
use std::collections::BTreeMap;

/// Executes all steps, mutating the response map.
pub fn run_pipeline_steps(steps: &[CrossChannelStep], responses: &mut BTreeMap<ChannelIndex, DetectionResponse>) {
	for step in steps {
		let output_channel = step.output_channel();
		let response = match step {
			CrossChannelStep::Intersection {
				input_channels,
				min_intersection,
				..
			} => calc_intersection(input_channels, f64::from(*min_intersection), output_channel, responses),
			CrossChannelStep::Voronoi {
				points_channel,
				max_radius,
				..
			} => calc_voronoi(*points_channel, *max_radius, output_channel, responses),
		};
		if let Some(mut response) = response {
			if let Some(original) = &response.original {
				response.control_image = Some(paint::generate_control_image(&response.results, original, false));
			}
			responses.insert(output_channel, response);
		}
	}
}

/// Seeds with a clone of the first source's detections and folds the
/// remaining sources through the spatial intersection.
fn calc_intersection(
	input_channels: &[ChannelIndex],
	min_intersection: f64,
	output_channel: ChannelIndex,
	responses: &BTreeMap<ChannelIndex, DetectionResponse>,
) -> Option<DetectionResponse> {
	let mut inputs = input_channels.iter().filter(|ch| responses.contains_key(ch));
	let first = inputs.next()?;

	// Originals of every present source for cross-channel intensity.
	let originals: BTreeMap<ChannelIndex, Raster> = input_channels
		.iter()
		.filter_map(|ch| {
			responses
				.get(ch)
				.and_then(|response| response.original.as_ref())
				.map(|original| (*ch, original.clone()))
		})
		.collect();

	let mut results = responses[first].results.clone_results();
	for channel in inputs {
		let other = &responses[channel];
		results = results.calc_intersections(&other.results, &originals, min_intersection, output_channel);
	}

	let original = responses[first].original.clone();
	Some(DetectionResponse {
		results,
		original,
		control_image: None,
		validity: enumset::EnumSet::empty(),
		invalidate_whole_image: false,
	})
}

fn calc_voronoi(
	points_channel: ChannelIndex,
	max_radius: i32,
	output_channel: ChannelIndex,
	responses: &BTreeMap<ChannelIndex, DetectionResponse>,
) -> Option<DetectionResponse> {
	let Some(points) = responses.get(&points_channel) else {
		warn!("voronoi points channel {points_channel} has no results for this tile");
		return None;
	};
	let original = points.original.as_ref()?;
	Some(voronoi::voronoi_tessellation(&points.results, original, max_radius, output_channel))
}
