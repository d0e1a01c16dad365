//! The explicit runtime context threaded through the scheduler.
//!
//! Everything the legacy design kept in process-wide singletons lives
//! here: the settings, the reader registry, the optional inference
//! backend factory and the profiler. The context is initialised once
//! per job and shared read-only between workers.

use anyhow::Result;
use imagec_core::{
	EngineError,
	profiling::Profiler,
	settings::{AiSettings, AnalyzeSettings},
	types::WellPosition,
};
use imagec_detection::InferenceSession;
use imagec_reader::{FileInfoImages, ImageReader, OmeInfo, ReaderRegistry};
use log::warn;
use std::{
	sync::Arc,
	thread,
	time::Duration,
};

/// Creates inference sessions for model channels. Absent when no
/// backend is linked in; model channels then fail per image-channel.
pub type SessionFactory = Arc<dyn Fn(&AiSettings) -> Result<Arc<dyn InferenceSession>> + Send + Sync>;

#[derive(Clone)]
pub struct PipelineContext {
	pub settings: Arc<AnalyzeSettings>,
	pub registry: ReaderRegistry,
	pub session_factory: Option<SessionFactory>,
	pub profiler: Arc<Profiler>,
}

impl PipelineContext {
	pub fn new(settings: AnalyzeSettings) -> PipelineContext {
		PipelineContext {
			settings: Arc::new(settings),
			registry: ReaderRegistry::new(),
			session_factory: None,
			profiler: Profiler::new(),
		}
	}

	pub fn with_registry(mut self, registry: ReaderRegistry) -> PipelineContext {
		self.registry = registry;
		self
	}

	pub fn with_session_factory(mut self, factory: SessionFactory) -> PipelineContext {
		self.session_factory = Some(factory);
		self
	}

	/// Opens a reader; read failures are retried once after 200 ms
	/// before the image is given up on.
	pub fn open_reader(&self, file: &FileInfoImages) -> Result<Box<dyn ImageReader>, EngineError> {
		match self.registry.open(&file.path) {
			Ok(reader) => Ok(reader),
			Err(EngineError::ReadFailed { path, reason }) => {
				warn!("reading {path:?} failed ({reason}), retrying once");
				thread::sleep(Duration::from_millis(200));
				self.registry.open(&file.path)
			}
			Err(err) => Err(err),
		}
	}
}

/// One discovered image with its dense index, plate position and
/// cached metadata.
#[derive(Debug, Clone)]
pub struct ImageEntry {
	/// Dense index assigned in discovery order.
	pub index: u32,
	pub file: FileInfoImages,
	/// Plate position derived from the file name; `None` when the name
	/// does not match the group regex.
	pub well: Option<WellPosition>,
	pub ome: OmeInfo,
}

impl ImageEntry {
	/// Stable database id; dense indices start at 1.
	pub fn image_id(&self) -> u64 {
		u64::from(self.index) + 1
	}

	/// Image number within its well, 0 when no well was derived.
	pub fn image_idx(&self) -> u32 {
		self.well.map_or(0, |well| well.image_nr)
	}
}
