//! Validity bitsets for objects and image-channels.
//!
//! A flag records a reason the carrier is excluded from default
//! aggregations. Flags are monotone: once set they are only ever
//! cleared again by the explicit manual toggles persisted in the
//! database, never silently.

use enumset::{EnumSet, EnumSetType};

/// Exclusion reasons for one detected object. The discriminants are the
/// bit positions of the persisted `u32`.
#[derive(EnumSetType, Debug, Hash)]
pub enum ObjectValidity {
	TooSmall = 1,
	TooBig = 2,
	TooLessCircularity = 3,
	TooLessOverlapping = 4,
	ReferenceSpot = 5,
	ManuallyInvalidated = 6,
	AtTheEdge = 7,
}

/// Exclusion reasons for one (image, channel) response.
#[derive(EnumSetType, Debug, Hash)]
pub enum ChannelValidity {
	PossibleNoise = 0,
	PossibleWrongThreshold = 1,
	ManualOutSorted = 2,
}

pub type ValidityFlags<T> = EnumSet<T>;

/// Persisted representation of a validity set. An empty set is 0, which
/// is what the aggregation queries filter on.
pub fn validity_bits<T: EnumSetType>(set: EnumSet<T>) -> u32 {
	set.as_usize() as u32
}

/// Rebuilds a set from its persisted bits; unknown bits are dropped.
pub fn validity_from_bits<T: EnumSetType>(bits: u32) -> EnumSet<T> {
	EnumSet::<T>::all()
		.iter()
		.filter(|flag| bits & EnumSet::only(*flag).as_usize() as u32 != 0)
		.collect()
}
