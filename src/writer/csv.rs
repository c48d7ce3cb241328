use std::io::{self, Write};

use serde::Serialize;

use crate::error::Error;
use crate::filter::FilterResult;
use crate::obb::Obb;
use crate::writer::profile_frame;

#[derive(Serialize)]
struct CsvRecord {
	x: f64,
	y: f64,
	z: f64,
	profile: f64,
	elevation: f64,
	intensity: u16,
	classification: u8,
	r: u8,
	g: u8,
	b: u8,
}

/// World position plus the unquantized along-profile projection, one row
/// per accepted point. The header row is emitted even when no point was
/// accepted.
pub fn write_csv(results: &[FilterResult], out: &mut dyn Write) -> Result<(), Error> {
	let mut writer = csv::WriterBuilder::new()
		.has_headers(false)
		.from_writer(out);
	writer
		.write_record([
			"x",
			"y",
			"z",
			"profile",
			"elevation",
			"intensity",
			"classification",
			"r",
			"g",
			"b",
		])
		.map_err(|error| Error::Encode(io::Error::other(error)))?;

	let mut mileage = 0.0;
	for result in results {
		let obb = Obb::from_transform(&result.matrix)?;
		let (local_min, x_edge) = profile_frame(&result.matrix);

		for point in &result.points {
			let local = point.position - local_min;
			writer
				.serialize(CsvRecord {
					x: point.position.x,
					y: point.position.y,
					z: point.position.z,
					profile: local.dot(&obb.axes()[0]) + mileage,
					elevation: local.dot(&obb.axes()[2]),
					intensity: point.intensity,
					classification: point.classification,
					r: point.color.x,
					g: point.color.y,
					b: point.color.z,
				})
				.map_err(|error| Error::Encode(io::Error::other(error)))?;
		}

		mileage += x_edge.norm();
	}

	writer.flush().map_err(Error::Encode)?;
	Ok(())
}
