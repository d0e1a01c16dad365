//! DuckDB access layer.
//!
//! One writer connection guarded by a mutex serialises all writes;
//! read queries run on cloned connections. The schema is created
//! eagerly when a file is first opened for writing, and the stored
//! schema version is checked whenever an existing file is opened.

use crate::meta::{
	AnalyzeMeta, ChannelMeta, GroupMeta, ImageChannelMeta, ImageMeta, ObjectRecord, PlateMeta,
};
use anyhow::{Context, Result};
use duckdb::{Connection, params};
use imagec_core::{
	EngineError,
	types::{ChannelValidity, MeasureChannelId, validity_bits, validity_from_bits},
};
use itertools::Itertools;
use log::trace;
use std::{
	path::Path,
	sync::Mutex,
};

/// File name of the result database within a job folder.
pub const DB_FILENAME: &str = "results.duckdb";

/// Bumped on every incompatible schema change. There is no migration
/// facility: a mismatch rejects the file.
pub const SCHEMA_VERSION: u32 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
	schema_version UINTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS analyzes (
	analyze_id VARCHAR PRIMARY KEY,
	run_id VARCHAR NOT NULL,
	name VARCHAR NOT NULL,
	"timestamp" VARCHAR NOT NULL,
	scientists VARCHAR[] NOT NULL,
	organisation VARCHAR,
	notes VARCHAR,
	settings_json VARCHAR
);
CREATE TABLE IF NOT EXISTS plates (
	analyze_id VARCHAR,
	plate_id UTINYINT,
	notes VARCHAR,
	PRIMARY KEY (analyze_id, plate_id)
);
CREATE TABLE IF NOT EXISTS "groups" (
	analyze_id VARCHAR,
	plate_id UTINYINT,
	group_id USMALLINT,
	well_pos_x UTINYINT,
	well_pos_y UTINYINT,
	name VARCHAR,
	notes VARCHAR,
	PRIMARY KEY (analyze_id, plate_id, group_id)
);
CREATE TABLE IF NOT EXISTS images (
	analyze_id VARCHAR,
	image_id UBIGINT PRIMARY KEY,
	image_idx UINTEGER,
	file_name VARCHAR,
	original_file_path VARCHAR,
	width UBIGINT,
	height UBIGINT
);
CREATE TABLE IF NOT EXISTS images_groups (
	analyze_id VARCHAR,
	image_id UBIGINT,
	plate_id UTINYINT,
	group_id USMALLINT,
	PRIMARY KEY (analyze_id, image_id)
);
CREATE TABLE IF NOT EXISTS channels (
	analyze_id VARCHAR,
	channel_id USMALLINT,
	name VARCHAR,
	measurements UINTEGER[],
	PRIMARY KEY (analyze_id, channel_id)
);
CREATE TABLE IF NOT EXISTS channels_images (
	analyze_id VARCHAR,
	image_id UBIGINT,
	channel_id USMALLINT,
	validity UINTEGER,
	invalidate_all BOOLEAN,
	control_image_path VARCHAR,
	PRIMARY KEY (analyze_id, image_id, channel_id)
);
CREATE TABLE IF NOT EXISTS objects (
	analyze_id VARCHAR,
	image_id UBIGINT,
	channel_id USMALLINT,
	tile_id USMALLINT,
	object_id UINTEGER,
	validity UINTEGER,
	"values" MAP(UINTEGER, DOUBLE[])
);
"#;

pub struct Database {
	conn: Mutex<Connection>,
}

impl Database {
	/// Opens (or creates) a database for writing; the schema is created
	/// eagerly. An existing file with a foreign schema version is
	/// rejected.
	pub fn open(path: &Path) -> Result<Database, EngineError> {
		trace!("open {path:?}");
		let conn = Connection::open(path).map_err(|err| EngineError::DatabaseError {
			op: "open".to_string(),
			reason: err.to_string(),
		})?;
		conn.execute_batch(SCHEMA).map_err(|err| EngineError::DatabaseError {
			op: "create schema".to_string(),
			reason: err.to_string(),
		})?;
		let db = Database { conn: Mutex::new(conn) };
		db.check_or_init_version()?;
		Ok(db)
	}

	fn check_or_init_version(&self) -> Result<(), EngineError> {
		let conn = self.conn.lock().expect("database poisoned");
		let found: Option<u32> = conn
			.query_row("SELECT schema_version FROM meta LIMIT 1", [], |row| row.get(0))
			.map_or(None, Some);
		match found {
			None => {
				conn
					.execute("INSERT INTO meta VALUES (?)", params![SCHEMA_VERSION])
					.map_err(|err| EngineError::DatabaseError {
						op: "init schema version".to_string(),
						reason: err.to_string(),
					})?;
				Ok(())
			}
			Some(version) if version == SCHEMA_VERSION => Ok(()),
			Some(version) => Err(EngineError::DatabaseSchemaMismatch {
				found: version,
				expected: SCHEMA_VERSION,
			}),
		}
	}

	/// A connection for read queries, sharing the same database
	/// instance. Reads may run concurrently with the writer.
	fn reader(&self) -> Result<Connection> {
		Ok(self.conn.lock().expect("database poisoned").try_clone()?)
	}

	fn write(&self, op: &str, f: impl FnOnce(&Connection) -> duckdb::Result<usize>) -> Result<(), EngineError> {
		let conn = self.conn.lock().expect("database poisoned");
		f(&conn).map_err(|err| EngineError::DatabaseError {
			op: op.to_string(),
			reason: err.to_string(),
		})?;
		Ok(())
	}

	// ------------------------------------------------------------------
	// Upserts
	// ------------------------------------------------------------------

	pub fn insert_analyze(&self, meta: &AnalyzeMeta) -> Result<(), EngineError> {
		let scientists = string_list_literal(&meta.scientists);
		self.write("insert analyze", |conn| {
			conn.execute(
				&format!(
					"INSERT OR REPLACE INTO analyzes VALUES (?, ?, ?, ?, {scientists}, ?, ?, ?)"
				),
				params![
					meta.analyze_id,
					meta.run_id,
					meta.name,
					meta.timestamp,
					meta.organisation,
					meta.notes,
					meta.settings_json
				],
			)
		})
	}

	pub fn insert_plate(&self, meta: &PlateMeta) -> Result<(), EngineError> {
		self.write("insert plate", |conn| {
			conn.execute(
				"INSERT OR REPLACE INTO plates VALUES (?, ?, ?)",
				params![meta.analyze_id, meta.plate_id, meta.notes],
			)
		})
	}

	pub fn upsert_group(&self, meta: &GroupMeta) -> Result<(), EngineError> {
		self.write("upsert group", |conn| {
			conn.execute(
				"INSERT OR REPLACE INTO \"groups\" VALUES (?, ?, ?, ?, ?, ?, ?)",
				params![
					meta.analyze_id,
					meta.plate_id,
					meta.group_id,
					meta.well_pos_x,
					meta.well_pos_y,
					meta.name,
					meta.notes
				],
			)
		})
	}

	pub fn upsert_image(&self, meta: &ImageMeta) -> Result<(), EngineError> {
		self.write("upsert image", |conn| {
			conn.execute(
				"INSERT OR REPLACE INTO images VALUES (?, ?, ?, ?, ?, ?, ?)",
				params![
					meta.analyze_id,
					meta.image_id,
					meta.image_idx,
					meta.file_name,
					meta.original_file_path.to_string_lossy().to_string(),
					meta.width,
					meta.height
				],
			)
		})
	}

	pub fn upsert_image_group(
		&self,
		analyze_id: &str,
		image_id: u64,
		plate_id: u8,
		group_id: u16,
	) -> Result<(), EngineError> {
		self.write("upsert image group", |conn| {
			conn.execute(
				"INSERT OR REPLACE INTO images_groups VALUES (?, ?, ?, ?)",
				params![analyze_id, image_id, plate_id, group_id],
			)
		})
	}

	pub fn upsert_channel(&self, meta: &ChannelMeta) -> Result<(), EngineError> {
		let measurements = measure_list_literal(&meta.measurements);
		self.write("upsert channel", |conn| {
			conn.execute(
				&format!("INSERT OR REPLACE INTO channels VALUES (?, ?, ?, {measurements})"),
				params![meta.analyze_id, meta.channel_id, meta.name],
			)
		})
	}

	pub fn upsert_image_channel(&self, meta: &ImageChannelMeta) -> Result<(), EngineError> {
		self.write("upsert image channel", |conn| {
			conn.execute(
				"INSERT OR REPLACE INTO channels_images VALUES (?, ?, ?, ?, ?, ?)",
				params![
					meta.analyze_id,
					meta.image_id,
					meta.channel_id,
					validity_bits(meta.validity),
					meta.invalidate_all,
					meta.control_image_path
				],
			)
		})
	}

	/// Inserts the objects of one (image, channel, tile) in batches.
	pub fn insert_objects(
		&self,
		analyze_id: &str,
		image_id: u64,
		channel_id: u16,
		tile_id: u16,
		objects: &[ObjectRecord],
	) -> Result<(), EngineError> {
		const BATCH: usize = 500;
		for chunk in objects.chunks(BATCH) {
			let rows = chunk
				.iter()
				.map(|object| {
					format!(
						"('{analyze_id}', {image_id}, {channel_id}, {tile_id}, {}, {}, {})",
						object.object_id,
						object.validity,
						value_map_literal(&object.values)
					)
				})
				.join(", ");
			self.write("insert objects", |conn| {
				conn.execute(&format!("INSERT INTO objects VALUES {rows}"), [])
			})?;
		}
		Ok(())
	}

	/// Sets or clears the manual out-sort bit of one image-channel.
	pub fn mark_image_channel_manual(
		&self,
		analyze_id: &str,
		image_id: u64,
		channel_id: u16,
		out_sorted: bool,
	) -> Result<(), EngineError> {
		let bit = validity_bits(enumset::EnumSet::only(ChannelValidity::ManualOutSorted));
		let sql = if out_sorted {
			"UPDATE channels_images SET validity = validity | ? WHERE analyze_id = ? AND image_id = ? AND channel_id = ?"
		} else {
			"UPDATE channels_images SET validity = validity & ~? WHERE analyze_id = ? AND image_id = ? AND channel_id = ?"
		};
		self.write("mark image channel", |conn| {
			conn.execute(sql, params![bit, analyze_id, image_id, channel_id])
		})
	}

	// ------------------------------------------------------------------
	// Selects
	// ------------------------------------------------------------------

	pub fn select_analyzes(&self) -> Result<Vec<AnalyzeMeta>> {
		let conn = self.reader()?;
		let mut stmt = conn.prepare(
			"SELECT analyze_id, run_id, name, \"timestamp\", to_json(scientists), organisation, notes, settings_json \
			 FROM analyzes ORDER BY \"timestamp\"",
		)?;
		let rows = stmt
			.query_map([], |row| {
				let scientists_json: String = row.get(4)?;
				Ok(AnalyzeMeta {
					analyze_id: row.get(0)?,
					run_id: row.get(1)?,
					name: row.get(2)?,
					timestamp: row.get(3)?,
					scientists: serde_json::from_str(&scientists_json).unwrap_or_default(),
					organisation: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
					notes: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
					settings_json: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
				})
			})?
			.collect::<duckdb::Result<Vec<_>>>()?;
		Ok(rows)
	}

	pub fn select_plates(&self, analyze_id: &str) -> Result<Vec<PlateMeta>> {
		let conn = self.reader()?;
		let mut stmt =
			conn.prepare("SELECT analyze_id, plate_id, notes FROM plates WHERE analyze_id = ? ORDER BY plate_id")?;
		let rows = stmt
			.query_map(params![analyze_id], |row| {
				Ok(PlateMeta {
					analyze_id: row.get(0)?,
					plate_id: row.get(1)?,
					notes: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
				})
			})?
			.collect::<duckdb::Result<Vec<_>>>()?;
		Ok(rows)
	}

	pub fn select_groups(&self, analyze_id: &str, plate_id: u8) -> Result<Vec<GroupMeta>> {
		let conn = self.reader()?;
		let mut stmt = conn.prepare(
			"SELECT analyze_id, plate_id, group_id, well_pos_x, well_pos_y, name, notes \
			 FROM \"groups\" WHERE analyze_id = ? AND plate_id = ? ORDER BY group_id",
		)?;
		let rows = stmt
			.query_map(params![analyze_id, plate_id], |row| {
				Ok(GroupMeta {
					analyze_id: row.get(0)?,
					plate_id: row.get(1)?,
					group_id: row.get(2)?,
					well_pos_x: row.get(3)?,
					well_pos_y: row.get(4)?,
					name: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
					notes: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
				})
			})?
			.collect::<duckdb::Result<Vec<_>>>()?;
		Ok(rows)
	}

	pub fn select_images(&self, analyze_id: &str) -> Result<Vec<ImageMeta>> {
		let conn = self.reader()?;
		let mut stmt = conn.prepare(
			"SELECT analyze_id, image_id, image_idx, file_name, original_file_path, width, height \
			 FROM images WHERE analyze_id = ? ORDER BY image_id",
		)?;
		let rows = stmt
			.query_map(params![analyze_id], |row| {
				Ok(ImageMeta {
					analyze_id: row.get(0)?,
					image_id: row.get(1)?,
					image_idx: row.get(2)?,
					file_name: row.get(3)?,
					original_file_path: row.get::<_, String>(4)?.into(),
					width: row.get(5)?,
					height: row.get(6)?,
				})
			})?
			.collect::<duckdb::Result<Vec<_>>>()?;
		Ok(rows)
	}

	pub fn select_channels(&self, analyze_id: &str) -> Result<Vec<ChannelMeta>> {
		let conn = self.reader()?;
		let mut stmt = conn.prepare(
			"SELECT analyze_id, channel_id, name, to_json(measurements) \
			 FROM channels WHERE analyze_id = ? ORDER BY channel_id",
		)?;
		let rows = stmt
			.query_map(params![analyze_id], |row| {
				let measurements_json: String = row.get(3)?;
				let keys: Vec<u32> = serde_json::from_str(&measurements_json).unwrap_or_default();
				Ok(ChannelMeta {
					analyze_id: row.get(0)?,
					channel_id: row.get(1)?,
					name: row.get(2)?,
					measurements: keys.into_iter().map(MeasureChannelId::from_key).collect(),
				})
			})?
			.collect::<duckdb::Result<Vec<_>>>()?;
		Ok(rows)
	}

	/// Combined image/channel/image-channel metadata for one image.
	pub fn image_information(
		&self,
		analyze_id: &str,
		image_id: u64,
		channel_id: u16,
	) -> Result<(ImageMeta, ChannelMeta, ImageChannelMeta)> {
		let image = self
			.select_images(analyze_id)?
			.into_iter()
			.find(|image| image.image_id == image_id)
			.with_context(|| format!("image {image_id} not found"))?;
		let channel = self
			.select_channels(analyze_id)?
			.into_iter()
			.find(|channel| channel.channel_id == channel_id)
			.with_context(|| format!("channel {channel_id} not found"))?;

		let conn = self.reader()?;
		let image_channel = conn.query_row(
			"SELECT validity, invalidate_all, control_image_path FROM channels_images \
			 WHERE analyze_id = ? AND image_id = ? AND channel_id = ?",
			params![analyze_id, image_id, channel_id],
			|row| {
				Ok(ImageChannelMeta {
					analyze_id: analyze_id.to_string(),
					image_id,
					channel_id,
					validity: validity_from_bits(row.get(0)?),
					invalidate_all: row.get(1)?,
					control_image_path: row.get(2)?,
				})
			},
		)?;
		Ok((image, channel, image_channel))
	}

	/// A dedicated connection for ad-hoc read queries.
	pub fn read_connection(&self) -> Result<Connection> {
		self.reader()
	}
}

/// `['a', 'b']` literal with escaped single quotes.
fn string_list_literal(items: &[String]) -> String {
	if items.is_empty() {
		return "[]::VARCHAR[]".to_string();
	}
	let quoted = items.iter().map(|s| format!("'{}'", s.replace('\'', "''"))).join(", ");
	format!("[{quoted}]")
}

fn measure_list_literal(items: &[MeasureChannelId]) -> String {
	if items.is_empty() {
		return "[]::UINTEGER[]".to_string();
	}
	format!("[{}]", items.iter().map(|id| id.key().to_string()).join(", "))
}

/// `MAP([keys], [[values]...])` literal of one object's value vector.
fn value_map_literal(values: &std::collections::BTreeMap<MeasureChannelId, Vec<f64>>) -> String {
	if values.is_empty() {
		return "MAP([]::UINTEGER[], []::DOUBLE[][])".to_string();
	}
	let keys = values.keys().map(|k| k.key().to_string()).join(", ");
	let lists = values
		.values()
		.map(|list| format!("[{}]", list.iter().map(|v| format!("{v:?}")).join(", ")))
		.join(", ");
	format!("MAP([{keys}], [{lists}])")
}

#[cfg(test)]
mod tests {
	use super::*;
	use imagec_core::types::{MeasureChannel, MeasureChannelId};
	use std::collections::BTreeMap;

	fn open_temp() -> (tempfile::TempDir, Database) {
		let dir = tempfile::tempdir().unwrap();
		let db = Database::open(&dir.path().join(DB_FILENAME)).unwrap();
		(dir, db)
	}

	fn sample_analyze(id: &str) -> AnalyzeMeta {
		AnalyzeMeta {
			analyze_id: id.to_string(),
			run_id: "run-1".to_string(),
			name: "test job".to_string(),
			timestamp: "2024-06-13 12:00:00".to_string(),
			scientists: vec!["alice".to_string(), "bob".to_string()],
			organisation: "lab".to_string(),
			notes: String::new(),
			settings_json: "{}".to_string(),
		}
	}

	#[test]
	fn analyze_roundtrip() {
		let (_dir, db) = open_temp();
		db.insert_analyze(&sample_analyze("a-1")).unwrap();
		let analyzes = db.select_analyzes().unwrap();
		assert_eq!(analyzes.len(), 1);
		assert_eq!(analyzes[0], sample_analyze("a-1"));
	}

	#[test]
	fn schema_version_mismatch_is_rejected() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join(DB_FILENAME);
		{
			let db = Database::open(&path).unwrap();
			let conn = db.conn.lock().unwrap();
			conn.execute("UPDATE meta SET schema_version = 999", []).unwrap();
		}
		let err = Database::open(&path).unwrap_err();
		assert!(matches!(err, EngineError::DatabaseSchemaMismatch { found: 999, expected: _ }));
	}

	#[test]
	fn image_information_joins_three_tables() {
		let (_dir, db) = open_temp();
		db.insert_analyze(&sample_analyze("a-1")).unwrap();
		db.upsert_image(&ImageMeta {
			analyze_id: "a-1".to_string(),
			image_id: 1,
			image_idx: 2,
			file_name: "img_A10_02".to_string(),
			original_file_path: "/data/img_A10_02.tif".into(),
			width: 100,
			height: 80,
		})
		.unwrap();
		db.upsert_channel(&ChannelMeta {
			analyze_id: "a-1".to_string(),
			channel_id: 1,
			name: "CY7".to_string(),
			measurements: vec![MeasureChannelId::own(MeasureChannel::AreaSize)],
		})
		.unwrap();
		db.upsert_image_channel(&ImageChannelMeta {
			analyze_id: "a-1".to_string(),
			image_id: 1,
			channel_id: 1,
			validity: enumset::EnumSet::empty(),
			invalidate_all: false,
			control_image_path: "control_images/1/1/tile_${tile_id}.png".to_string(),
		})
		.unwrap();

		let (image, channel, image_channel) = db.image_information("a-1", 1, 1).unwrap();
		assert_eq!(image.width, 100);
		assert_eq!(channel.name, "CY7");
		assert_eq!(channel.measurements.len(), 1);
		assert!(image_channel.validity.is_empty());
	}

	#[test]
	fn manual_out_sort_toggles_only_its_bit() {
		let (_dir, db) = open_temp();
		db.upsert_image_channel(&ImageChannelMeta {
			analyze_id: "a-1".to_string(),
			image_id: 1,
			channel_id: 1,
			validity: enumset::EnumSet::only(ChannelValidity::PossibleNoise),
			invalidate_all: false,
			control_image_path: String::new(),
		})
		.unwrap();

		db.mark_image_channel_manual("a-1", 1, 1, true).unwrap();
		let conn = db.reader().unwrap();
		let bits: u32 = conn
			.query_row("SELECT validity FROM channels_images", [], |row| row.get(0))
			.unwrap();
		assert_eq!(bits, 0b101);

		db.mark_image_channel_manual("a-1", 1, 1, false).unwrap();
		let bits: u32 = conn
			.query_row("SELECT validity FROM channels_images", [], |row| row.get(0))
			.unwrap();
		assert_eq!(bits, 0b001);
	}

	#[test]
	fn objects_store_their_value_map() {
		let (_dir, db) = open_temp();
		let area = MeasureChannelId::own(MeasureChannel::AreaSize);
		let record = ObjectRecord {
			object_id: 0,
			validity: 0,
			values: BTreeMap::from([(area, vec![42.5])]),
		};
		db.insert_objects("a-1", 1, 1, 0, &[record]).unwrap();

		let conn = db.reader().unwrap();
		let value: f64 = conn
			.query_row(
				"SELECT element_at(\"values\", ?)[1] FROM objects",
				params![area.key()],
				|row| row.get(0),
			)
			.unwrap();
		assert_eq!(value, 42.5);
	}

	#[test]
	fn empty_object_batch_is_a_no_op() {
		let (_dir, db) = open_temp();
		db.insert_objects("a-1", 1, 1, 0, &[]).unwrap();
		let conn = db.reader().unwrap();
		let count: i64 = conn.query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0)).unwrap();
		assert_eq!(count, 0);
	}
}
