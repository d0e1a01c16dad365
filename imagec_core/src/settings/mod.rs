//! The declarative analysis plan.
//!
//! One JSON document is the sole input besides the image directory. The
//! model round-trips losslessly: every field has an explicit default
//! and serialisation is stable, so `parse(serialise(s)) == s` for any
//! valid `s`.

mod analyze;
mod channel;
mod steps;

pub use analyze::{AnalyzeSettings, ExperimentSettings, ImagePositionInWell, ReportingSettings};
pub use channel::{
	AiSettings, BallType, ChannelMeta, ChannelSettings, CrossChannelSettings, DetectionMode, DetectionSettings,
	EdgeDirection, EdgeKernel, ImageFilterMode, ImageFilterSettings, ObjectFilterSettings, PreprocessingSettings,
	PreprocessingStep, ThresholdMode, ThresholdSettings, ZProjectMethod,
};
pub use steps::CrossChannelStep;
