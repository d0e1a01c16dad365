//! Maps file extensions to decoders and opens readers.

use crate::{jpeg::JpegReader, tiff_reader::TiffReader, traits::ImageReader};
use anyhow::Result;
use imagec_core::EngineError;
use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

const TIF_EXTENSIONS: [&str; 5] = ["tif", "tiff", "btif", "btiff", "btf"];
const JPG_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];
const BIOFORMATS_EXTENSIONS: [&str; 3] = ["vsi", "ics", "czi"];

/// Decoder family responsible for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoder {
	Tiff,
	Jpeg,
	BioFormats,
}

impl Decoder {
	/// Decoder for a path, `None` for unknown extensions. Unknown
	/// extensions are ignored silently during discovery, they are not
	/// an error.
	pub fn from_path(path: &Path) -> Option<Decoder> {
		let ext = path.extension()?.to_str()?.to_ascii_lowercase();
		if TIF_EXTENSIONS.contains(&ext.as_str()) {
			Some(Decoder::Tiff)
		} else if JPG_EXTENSIONS.contains(&ext.as_str()) {
			Some(Decoder::Jpeg)
		} else if BIOFORMATS_EXTENSIONS.contains(&ext.as_str()) {
			Some(Decoder::BioFormats)
		} else {
			None
		}
	}

	/// True when the decoder can serve tile reads without decoding the
	/// whole plane.
	pub fn tile_capable(self) -> bool {
		matches!(self, Decoder::Tiff | Decoder::BioFormats)
	}
}

type BioFormatsFactory = dyn Fn(PathBuf) -> Result<Box<dyn ImageReader>> + Send + Sync;

/// Opens readers for image files. Bio-Formats containers need an
/// externally registered factory; without one they are rejected as
/// unsupported.
#[derive(Clone, Default)]
pub struct ReaderRegistry {
	bioformats: Option<Arc<BioFormatsFactory>>,
}

impl ReaderRegistry {
	pub fn new() -> ReaderRegistry {
		ReaderRegistry::default()
	}

	pub fn with_bioformats(
		mut self,
		factory: impl Fn(PathBuf) -> Result<Box<dyn ImageReader>> + Send + Sync + 'static,
	) -> ReaderRegistry {
		self.bioformats = Some(Arc::new(factory));
		self
	}

	pub fn open(&self, path: &Path) -> Result<Box<dyn ImageReader>, EngineError> {
		let decoder =
			Decoder::from_path(path).ok_or_else(|| EngineError::UnsupportedFormat(path.to_path_buf()))?;
		let open = |result: Result<Box<dyn ImageReader>>| {
			result.map_err(|err| EngineError::ReadFailed {
				path: path.to_path_buf(),
				reason: err.to_string(),
			})
		};
		match decoder {
			Decoder::Tiff => open(TiffReader::open(path.to_path_buf()).map(|r| Box::new(r) as Box<dyn ImageReader>)),
			Decoder::Jpeg => open(JpegReader::open(path.to_path_buf()).map(|r| Box::new(r) as Box<dyn ImageReader>)),
			Decoder::BioFormats => match &self.bioformats {
				Some(factory) => open(factory(path.to_path_buf())),
				None => Err(EngineError::UnsupportedFormat(path.to_path_buf())),
			},
		}
	}
}

impl std::fmt::Debug for ReaderRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ReaderRegistry")
			.field("bioformats", &self.bioformats.is_some())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extension_mapping() {
		assert_eq!(Decoder::from_path(Path::new("a.TIF")), Some(Decoder::Tiff));
		assert_eq!(Decoder::from_path(Path::new("a.btiff")), Some(Decoder::Tiff));
		assert_eq!(Decoder::from_path(Path::new("a.jpeg")), Some(Decoder::Jpeg));
		assert_eq!(Decoder::from_path(Path::new("a.czi")), Some(Decoder::BioFormats));
		assert_eq!(Decoder::from_path(Path::new("a.txt")), None);
		assert_eq!(Decoder::from_path(Path::new("noext")), None);
	}

	#[test]
	fn bioformats_without_factory_is_unsupported() {
		let registry = ReaderRegistry::new();
		let err = registry.open(Path::new("sample.vsi")).unwrap_err();
		assert!(matches!(err, EngineError::UnsupportedFormat(_)));
	}

	#[test]
	fn unknown_extension_is_unsupported() {
		let registry = ReaderRegistry::new();
		let err = registry.open(Path::new("sample.bin")).unwrap_err();
		assert!(matches!(err, EngineError::UnsupportedFormat(_)));
	}

	#[test]
	fn tile_capability() {
		assert!(Decoder::Tiff.tile_capable());
		assert!(Decoder::BioFormats.tile_capable());
		assert!(!Decoder::Jpeg.tile_capable());
	}
}
