//! Object detection layer: ROIs, the spatial hash over their bounding
//! boxes, detection results with cross-channel set operations, the two
//! detector families and control-image painting.

pub mod contour;
pub mod detector;
pub mod paint;
pub mod response;
pub mod results;
pub mod roi;
pub mod spatial_hash;
pub mod voronoi;

pub use detector::{Detector, InferenceOutput, InferenceSession, PrototypeMasks};
pub use response::DetectionResponse;
pub use results::DetectionResults;
pub use roi::{IntensityStats, Roi};
pub use spatial_hash::SpatialHash;
