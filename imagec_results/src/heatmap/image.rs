//! Image heatmap: objects bucketed into square areas by their centre
//! of mass.

use crate::{
	Database,
	meta::substitute_tile_id,
	table::{Table, TableCell},
};
use anyhow::{Context, Result};
use duckdb::params;
use imagec_core::types::{MeasureChannel, MeasureChannelId, Stats};

pub fn image_heatmap(
	db: &Database,
	analyze_id: &str,
	image_id: u64,
	channel_id: u16,
	measurement: MeasureChannelId,
	stats: Stats,
	area_size: u32,
) -> Result<Table> {
	let conn = db.read_connection()?;

	let (width, height, control_path): (u64, u64, String) = conn
		.query_row(
			"SELECT images.width, images.height, channels_images.control_image_path \
			 FROM images \
			 INNER JOIN channels_images ON images.image_id = channels_images.image_id \
			   AND images.analyze_id = channels_images.analyze_id \
			 WHERE images.analyze_id = ? AND images.image_id = ? AND channels_images.channel_id = ?",
			params![analyze_id, image_id, channel_id],
			|row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
		)
		.with_context(|| format!("image {image_id} channel {channel_id} not found"))?;

	let area = f64::from(area_size.max(1));
	let cols = (width / u64::from(area_size.max(1))).max(1) as usize;
	let rows = (height / u64::from(area_size.max(1))).max(1) as usize;

	let mut table = Table::new();
	let default_link = substitute_tile_id(&control_path, 0);
	for row in 0..rows {
		table.set_row_header(row, (row + 1).to_string());
		for col in 0..cols {
			table.set_col_header(col, (col + 1).to_string());
			let mut cell = TableCell::new(f64::NAN, 0, false);
			cell.link = default_link.clone();
			table.set(row, col, cell);
		}
	}

	let sql = format!(
		"SELECT floor(element_at(\"values\", ?)[1] / ?) * ? AS rect_x, \
		   floor(element_at(\"values\", ?)[1] / ?) * ? AS rect_y, \
		   any_value(tile_id), {stat} \
		 FROM objects \
		 WHERE analyze_id = ? AND image_id = ? AND validity = 0 AND channel_id = ? \
		 GROUP BY rect_x, rect_y",
		stat = stats.sql_term()
	);
	let com_x = MeasureChannelId::own(MeasureChannel::CenterOfMassX);
	let com_y = MeasureChannelId::own(MeasureChannel::CenterOfMassY);

	let mut stmt = conn.prepare(&sql)?;
	let cells = stmt.query_map(
		params![
			com_x.key(),
			area,
			area,
			com_y.key(),
			area,
			area,
			measurement.key(),
			analyze_id,
			image_id,
			channel_id
		],
		|row| {
			let rect_x: f64 = row.get(0)?;
			let rect_y: f64 = row.get(1)?;
			let tile_id: u16 = row.get(2)?;
			let value: f64 = row.get(3)?;
			Ok((rect_x, rect_y, tile_id, value))
		},
	)?;

	for cell in cells {
		let (rect_x, rect_y, tile_id, value) = cell?;
		let col = (rect_x / area) as usize;
		let row = (rect_y / area) as usize;
		if row >= rows || col >= cols {
			continue;
		}
		let mut out = TableCell::new(value, u64::from(tile_id), true);
		out.link = substitute_tile_id(&control_path, tile_id);
		table.set(row, col, out);
	}

	Ok(table)
}
