//! Well heatmap: one cell per image, arranged into the well's image
//! order matrix.

use crate::{
	Database,
	meta::substitute_tile_id,
	table::{Table, TableCell},
};
use anyhow::Result;
use duckdb::params;
use imagec_core::{
	settings::ExperimentSettings,
	types::{MeasureChannelId, Stats},
};

#[allow(clippy::too_many_arguments)]
pub fn well_heatmap(
	db: &Database,
	analyze_id: &str,
	plate_id: u8,
	group_id: u16,
	channel_id: u16,
	measurement: MeasureChannelId,
	stats: Stats,
	experiment: &ExperimentSettings,
) -> Result<Table> {
	let sql = format!(
		"SELECT objects.image_id, images.image_idx, \
		   any_value(channels_images.control_image_path), any_value(objects.tile_id), \
		   any_value(channels_images.validity), any_value(channels_images.invalidate_all), {stat} \
		 FROM objects \
		 INNER JOIN images_groups ON objects.image_id = images_groups.image_id AND objects.analyze_id = images_groups.analyze_id \
		 INNER JOIN images ON objects.image_id = images.image_id AND objects.analyze_id = images.analyze_id \
		 INNER JOIN channels_images ON objects.image_id = channels_images.image_id \
		   AND objects.channel_id = channels_images.channel_id AND objects.analyze_id = channels_images.analyze_id \
		 WHERE objects.analyze_id = ? AND images_groups.plate_id = ? AND images_groups.group_id = ? \
		   AND objects.validity = 0 AND objects.channel_id = ? \
		 GROUP BY objects.image_id, images.image_idx, images.file_name \
		 ORDER BY images.file_name",
		stat = stats.sql_term()
	);

	let (positions, size_x, size_y) = experiment.transform_matrix();

	let mut table = Table::new();
	for row in 0..size_y {
		table.set_row_header(row as usize, ((b'A' + row as u8) as char).to_string());
		for col in 0..size_x {
			table.set_col_header(col as usize, (col + 1).to_string());
			table.set(row as usize, col as usize, TableCell::new(f64::NAN, 0, false));
		}
	}

	let conn = db.read_connection()?;
	let mut stmt = conn.prepare(&sql)?;
	let cells = stmt.query_map(
		params![measurement.key(), analyze_id, plate_id, group_id, channel_id],
		|row| {
			let image_id: u64 = row.get(0)?;
			let image_idx: u32 = row.get(1)?;
			let control_path: String = row.get(2)?;
			let tile_id: u16 = row.get(3)?;
			let validity: u32 = row.get(4)?;
			let invalidate_all: bool = row.get(5)?;
			let value: f64 = row.get(6)?;
			Ok((image_id, image_idx, control_path, tile_id, validity, invalidate_all, value))
		},
	)?;

	for cell in cells {
		let (image_id, image_idx, control_path, tile_id, validity, invalidate_all, value) = cell?;
		let Some(pos) = positions.get(&(image_idx as i32)) else {
			continue;
		};
		let mut out = TableCell::new(value, image_id, validity == 0 && !invalidate_all);
		out.link = substitute_tile_id(&control_path, tile_id);
		table.set(pos.y as usize, pos.x as usize, out);
	}

	Ok(table)
}
