//! The embedded analytical result store.
//!
//! One job writes one `results.duckdb` file. The schema is created
//! eagerly on first write; a file with a different schema version is
//! rejected. Writes are serialised through a single writer connection,
//! reads run on cloned connections and may be concurrent.

pub mod database;
pub mod heatmap;
pub mod meta;
pub mod table;

pub use database::{DB_FILENAME, Database, SCHEMA_VERSION};
pub use meta::{
	AnalyzeMeta, ChannelMeta, GroupMeta, ImageChannelMeta, ImageMeta, ObjectRecord, PlateMeta, substitute_tile_id,
};
pub use table::{Table, TableCell};
