//! Plate heatmap: one cell per well, statistics over all valid objects
//! of all valid image-channels in the well.

use super::VALID_IMAGE_CHANNEL;
use crate::{
	Database,
	table::{Table, TableCell},
};
use anyhow::Result;
use duckdb::params;
use imagec_core::types::{MeasureChannelId, Stats, WellPosition};

#[allow(clippy::too_many_arguments)]
pub fn plate_heatmap(
	db: &Database,
	analyze_id: &str,
	plate_id: u8,
	plate_rows: u8,
	plate_cols: u8,
	channel_id: u16,
	measurement: MeasureChannelId,
	stats: Stats,
	include_invalid: bool,
) -> Result<Table> {
	let filter = if include_invalid {
		String::new()
	} else {
		format!(" AND {VALID_IMAGE_CHANNEL}")
	};
	let sql = format!(
		"SELECT images_groups.group_id, {stat} \
		 FROM objects \
		 INNER JOIN images_groups ON objects.image_id = images_groups.image_id AND objects.analyze_id = images_groups.analyze_id \
		 INNER JOIN channels_images ON objects.image_id = channels_images.image_id \
		   AND objects.channel_id = channels_images.channel_id AND objects.analyze_id = channels_images.analyze_id \
		 WHERE objects.analyze_id = ? AND images_groups.plate_id = ? AND objects.validity = 0 \
		   AND objects.channel_id = ?{filter} \
		 GROUP BY images_groups.group_id",
		stat = stats.sql_term()
	);

	let mut table = Table::new();
	for row in 0..plate_rows {
		table.set_row_header(row as usize, ((b'A' + row) as char).to_string());
		for col in 0..plate_cols {
			table.set_col_header(col as usize, (col + 1).to_string());
			table.set(row as usize, col as usize, TableCell::new(f64::NAN, 0, false));
		}
	}

	let conn = db.read_connection()?;
	let mut stmt = conn.prepare(&sql)?;
	let cells = stmt.query_map(params![measurement.key(), analyze_id, plate_id, channel_id], |row| {
		let group_id: u16 = row.get(0)?;
		let value: f64 = row.get(1)?;
		Ok((group_id, value))
	})?;

	for cell in cells {
		let (group_id, value) = cell?;
		let pos = WellPosition::from_group_id(group_id);
		if pos.x == 0 || pos.y == 0 {
			continue;
		}
		let (row, col) = (pos.y as usize - 1, pos.x as usize - 1);
		if row < plate_rows as usize && col < plate_cols as usize {
			table.set(row, col, TableCell::new(value, u64::from(group_id), true));
		}
	}

	Ok(table)
}
