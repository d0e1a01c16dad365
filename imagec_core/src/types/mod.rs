mod channel_index;
mod geometry;
mod measure;
mod validity;
mod well;

pub use channel_index::ChannelIndex;
pub use geometry::{Point, Rect};
pub use measure::{MeasureChannel, MeasureChannelId, Stats};
pub use validity::{ChannelValidity, ObjectValidity, ValidityFlags, validity_bits, validity_from_bits};
pub use well::WellPosition;
