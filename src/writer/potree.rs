use std::io::{self, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;

use crate::error::Error;
use crate::filter::FilterResult;
use crate::model::attributes::{Attributes, PointAttribute};
use crate::model::bounds::{find_bounds, Bounds};
use crate::obb::Obb;
use crate::writer::{profile_frame, totals_of};

pub const POTREE_SCALE: f64 = 0.001;

/// Field order is the wire order; serde serializes struct fields as
/// declared.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Header<'a> {
	points: u64,
	points_processed: u64,
	nodes_processed: u64,
	#[serde(rename = "durationMS")]
	duration_ms: u64,
	bounding_box: &'a Bounds,
	point_attributes: Vec<&'static str>,
	bytes_per_point: usize,
	scale: f64,
}

/// POTREE-custom stream: a length-prefixed JSON header followed by one
/// attribute-driven record per accepted point, all little-endian.
pub fn write_potree(
	results: &[FilterResult],
	attributes: &Attributes,
	out: &mut dyn Write,
) -> Result<(), Error> {
	let totals = totals_of(results);
	// the header box covers the accepted points, not the whole dataset
	let bounds = find_bounds(results.iter().flat_map(|result| result.points.iter()))
		.unwrap_or_else(|| Bounds::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0));

	let header = Header {
		points: totals.points_accepted,
		points_processed: totals.points_processed,
		nodes_processed: totals.nodes_processed,
		duration_ms: totals.duration_millis,
		bounding_box: &bounds,
		point_attributes: attributes.list.iter().map(|a| a.name()).collect(),
		bytes_per_point: attributes.bytes_per_point,
		scale: POTREE_SCALE,
	};
	let mut header_text = serde_json::to_string_pretty(&header)
		.map_err(|error| Error::Encode(io::Error::new(io::ErrorKind::InvalidData, error)))?;
	header_text.push('\n');

	out.write_u32::<LittleEndian>(header_text.len() as u32)
		.map_err(Error::Encode)?;
	out.write_all(header_text.as_bytes()).map_err(Error::Encode)?;

	// scratch zeros for attributes the point model does not carry
	let zeros = vec![0u8; attributes.max_opaque_size()];
	let min = bounds.min();

	let mut mileage = 0.0;
	for result in results {
		let obb = Obb::from_transform(&result.matrix)?;
		let (local_min, x_edge) = profile_frame(&result.matrix);

		for point in &result.points {
			for attribute in &attributes.list {
				match attribute {
					PointAttribute::PositionCartesian => {
						out.write_u32::<LittleEndian>(
							((point.position.x - min.x) / POTREE_SCALE) as u32,
						)
						.map_err(Error::Encode)?;
						out.write_u32::<LittleEndian>(
							((point.position.y - min.y) / POTREE_SCALE) as u32,
						)
						.map_err(Error::Encode)?;
						out.write_u32::<LittleEndian>(
							((point.position.z - min.z) / POTREE_SCALE) as u32,
						)
						.map_err(Error::Encode)?;
					}
					PointAttribute::PositionProjectedProfile => {
						let local = point.position - local_min;
						let dx = local.dot(&obb.axes()[0]) + mileage;
						let dz = local.dot(&obb.axes()[2]);
						out.write_u32::<LittleEndian>((dx / POTREE_SCALE) as u32)
							.map_err(Error::Encode)?;
						out.write_u32::<LittleEndian>((dz / POTREE_SCALE) as u32)
							.map_err(Error::Encode)?;
					}
					PointAttribute::ColorPacked => {
						out.write_all(&[point.color.x, point.color.y, point.color.z, 0])
							.map_err(Error::Encode)?;
					}
					PointAttribute::Rgb => {
						out.write_all(&[point.color.x, point.color.y, point.color.z])
							.map_err(Error::Encode)?;
					}
					PointAttribute::Intensity => {
						out.write_u16::<LittleEndian>(point.intensity)
							.map_err(Error::Encode)?;
					}
					PointAttribute::Classification => {
						out.write_u8(point.classification).map_err(Error::Encode)?;
					}
					opaque => {
						out.write_all(&zeros[..opaque.byte_size()])
							.map_err(Error::Encode)?;
					}
				}
			}
		}

		mileage += x_edge.norm();
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use byteorder::{LittleEndian, ReadBytesExt};
	use nalgebra::{Vector2, Vector3};
	use rand::prelude::*;

	use super::write_potree;
	use crate::filter::FilterResult;
	use crate::model::attributes::Attributes;
	use crate::model::bounds::Bounds;
	use crate::model::point::Point;
	use crate::profile::build_segments;

	fn segment_results(
		polyline: &[(f64, f64)],
		width: f64,
		bounds: &Bounds,
		points_per_segment: Vec<Vec<Point>>,
	) -> Vec<FilterResult> {
		let vertices: Vec<Vector2<f64>> =
			polyline.iter().map(|&(x, y)| Vector2::new(x, y)).collect();
		let segments = build_segments(&vertices, width, bounds).unwrap();
		segments
			.into_iter()
			.zip(points_per_segment)
			.map(|(segment, points)| FilterResult {
				matrix: segment.matrix,
				mileage: segment.mileage,
				points,
				points_processed: 100,
				nodes_processed: 3,
				duration_millis: 7,
			})
			.collect()
	}

	fn point_at(x: f64, y: f64, z: f64) -> Point {
		Point {
			position: Vector3::new(x, y, z),
			color: Vector3::new(10, 20, 30),
			intensity: 500,
			classification: 4,
		}
	}

	#[test]
	fn test_header_prefix_matches_json_length() {
		let bounds = Bounds::new(-1.0, -1.0, -1.0, 1.0, 1.0, 1.0);
		let results = segment_results(
			&[(-1.0, 0.0), (1.0, 0.0)],
			2.0,
			&bounds,
			vec![vec![point_at(0.0, 0.0, 0.0)]],
		);
		let attributes =
			Attributes::from_names(["POSITION_CARTESIAN", "POSITION_PROJECTED_PROFILE"]).unwrap();

		let mut output = Vec::new();
		write_potree(&results, &attributes, &mut output).unwrap();

		let mut cursor = Cursor::new(&output);
		let header_size = cursor.read_u32::<LittleEndian>().unwrap() as usize;
		let header_bytes = &output[4..4 + header_size];
		let header: serde_json::Value = serde_json::from_slice(header_bytes).unwrap();

		assert_eq!(header["points"], 1);
		assert_eq!(header["pointsProcessed"], 100);
		assert_eq!(header["nodesProcessed"], 3);
		assert_eq!(header["durationMS"], 7);
		assert_eq!(header["bytesPerPoint"], 20);
		assert_eq!(header["scale"], 0.001);
		assert_eq!(header["pointAttributes"][1], "POSITION_PROJECTED_PROFILE");
		assert_eq!(output.len(), 4 + header_size + 20);

		// the emitted text ends with the LF the length prefix accounts for
		assert_eq!(output[4 + header_size - 1], b'\n');
	}

	#[test]
	fn test_header_field_order_is_stable() {
		let bounds = Bounds::new(-1.0, -1.0, -1.0, 1.0, 1.0, 1.0);
		let results = segment_results(&[(-1.0, 0.0), (1.0, 0.0)], 2.0, &bounds, vec![Vec::new()]);
		let attributes = Attributes::from_names(["RGB"]).unwrap();

		let mut output = Vec::new();
		write_potree(&results, &attributes, &mut output).unwrap();
		let text = String::from_utf8(output[4..].to_vec()).unwrap();

		let order = [
			"\"points\"",
			"\"pointsProcessed\"",
			"\"nodesProcessed\"",
			"\"durationMS\"",
			"\"boundingBox\"",
			"\"lx\"",
			"\"ux\"",
			"\"pointAttributes\"",
			"\"bytesPerPoint\"",
			"\"scale\"",
		];
		let positions: Vec<usize> = order.iter().map(|key| text.find(key).unwrap()).collect();
		assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
	}

	#[test]
	fn test_projected_profile_starts_at_segment_mileage() {
		// one point at the world origin, corridor from (-1,0) to (1,0):
		// the along-profile coordinate is 1, i.e. 1000 quantized
		let bounds = Bounds::new(-1.0, -1.0, -1.0, 1.0, 1.0, 1.0);
		let results = segment_results(
			&[(-1.0, 0.0), (1.0, 0.0)],
			2.0,
			&bounds,
			vec![vec![point_at(0.0, 0.0, 0.0)]],
		);
		let attributes =
			Attributes::from_names(["POSITION_CARTESIAN", "POSITION_PROJECTED_PROFILE"]).unwrap();

		let mut output = Vec::new();
		write_potree(&results, &attributes, &mut output).unwrap();

		let mut cursor = Cursor::new(&output);
		let header_size = cursor.read_u32::<LittleEndian>().unwrap() as u64;
		cursor.set_position(4 + header_size);

		// single accepted point: the cartesian min is the point itself
		assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 0);
		assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 0);
		assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 0);

		assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 1000);
		assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 1000);
	}

	#[test]
	fn test_mileage_carries_across_segments() {
		// right-angle profile; the corner point is accepted by both
		// segments, the second copy starts at mileage 10
		let bounds = Bounds::new(-1.0, -11.0, -1.0, 11.0, 11.0, 1.0);
		let corner = point_at(10.0, 0.0, 0.0);
		let results = segment_results(
			&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)],
			1.0,
			&bounds,
			vec![vec![corner.clone()], vec![corner]],
		);
		let attributes = Attributes::from_names(["POSITION_PROJECTED_PROFILE"]).unwrap();

		let mut output = Vec::new();
		write_potree(&results, &attributes, &mut output).unwrap();

		let mut cursor = Cursor::new(&output);
		let header_size = cursor.read_u32::<LittleEndian>().unwrap() as u64;
		cursor.set_position(4 + header_size);

		// first segment: the corner is its far end
		assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 10_000);
		let _dz = cursor.read_u32::<LittleEndian>().unwrap();
		// second segment: the corner is its start, offset by the first length
		assert_eq!(cursor.read_u32::<LittleEndian>().unwrap(), 10_000);
	}

	#[test]
	fn test_record_stream_length_follows_schema() {
		let mut rng = rand::thread_rng();
		let bounds = Bounds::new(0.0, -5.0, -5.0, 10.0, 5.0, 5.0);
		let points: Vec<Point> = (0..42)
			.map(|_| {
				point_at(
					rng.gen_range(0.0..10.0),
					rng.gen_range(-0.5..0.5),
					rng.gen_range(-5.0..5.0),
				)
			})
			.collect();
		let results = segment_results(&[(0.0, 0.0), (10.0, 0.0)], 1.0, &bounds, vec![points]);

		// 5 bytes per point regardless of the stored schema
		let attributes = Attributes::from_names(["INTENSITY", "RGB"]).unwrap();

		let mut output = Vec::new();
		write_potree(&results, &attributes, &mut output).unwrap();

		let header_size = u32::from_le_bytes(output[0..4].try_into().unwrap()) as usize;
		let header: serde_json::Value =
			serde_json::from_slice(&output[4..4 + header_size]).unwrap();
		assert_eq!(header["points"], 42);
		assert_eq!(header["bytesPerPoint"], 5);
		assert_eq!(output.len(), 4 + header_size + 42 * 5);

		// first record: intensity then rgb
		let body = &output[4 + header_size..];
		assert_eq!(u16::from_le_bytes(body[0..2].try_into().unwrap()), 500);
		assert_eq!(&body[2..5], &[10, 20, 30]);
	}

	#[test]
	fn test_opaque_attributes_are_zero_padded() {
		let bounds = Bounds::new(-1.0, -1.0, -1.0, 1.0, 1.0, 1.0);
		let results = segment_results(
			&[(-1.0, 0.0), (1.0, 0.0)],
			2.0,
			&bounds,
			vec![vec![point_at(0.0, 0.0, 0.0)]],
		);
		let attributes = Attributes::from_names(["NORMAL", "CLASSIFICATION"]).unwrap();

		let mut output = Vec::new();
		write_potree(&results, &attributes, &mut output).unwrap();

		let header_size = u32::from_le_bytes(output[0..4].try_into().unwrap()) as usize;
		let body = &output[4 + header_size..];
		assert_eq!(body.len(), 13);
		assert!(body[0..12].iter().all(|&byte| byte == 0));
		assert_eq!(body[12], 4);
	}

	#[test]
	fn test_empty_result_set_still_emits_a_header() {
		let bounds = Bounds::new(-1.0, -1.0, -1.0, 1.0, 1.0, 1.0);
		let results = segment_results(&[(-1.0, 0.0), (1.0, 0.0)], 2.0, &bounds, vec![Vec::new()]);
		let attributes = Attributes::from_names(["POSITION_CARTESIAN"]).unwrap();

		let mut output = Vec::new();
		write_potree(&results, &attributes, &mut output).unwrap();

		let header_size = u32::from_le_bytes(output[0..4].try_into().unwrap()) as usize;
		assert_eq!(output.len(), 4 + header_size);

		let header: serde_json::Value =
			serde_json::from_slice(&output[4..4 + header_size]).unwrap();
		assert_eq!(header["points"], 0);
		assert_eq!(header["boundingBox"]["lx"], 0.0);
	}
}
