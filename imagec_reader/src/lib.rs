//! Uniform image loading over heterogeneous decoders.
//!
//! The engine never talks to a concrete file format: it sees the
//! [`ImageReader`] capability set (OME metadata, tile reads, entire
//! plane reads, thumbnails) and the [`registry`] that maps a file
//! extension to a decoder. TIFF and JPEG adapters ship with this crate;
//! Bio-Formats style containers are accepted by extension but report
//! `UnsupportedFormat` unless an external reader is registered.

pub mod discovery;
pub mod jpeg;
pub mod ome;
pub mod registry;
pub mod tiff_reader;
pub mod traits;

pub use discovery::{FileInfoImages, WorkingDirectory};
pub use ome::{OmeInfo, Resolution, TileRect};
pub use registry::{Decoder, ReaderRegistry};
pub use traits::ImageReader;
