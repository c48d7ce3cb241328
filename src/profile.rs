use std::time::Instant;

use log::info;
use nalgebra::{Matrix4, Vector2, Vector3};

use crate::error::Error;
use crate::filter::{points_in_box, FilterResult};
use crate::model::bounds::Bounds;
use crate::reader::OctreeNode;

pub struct Segment {
	pub start: Vector2<f64>,
	pub end: Vector2<f64>,
	pub matrix: Matrix4<f64>,
	/// Arc length along the polyline up to this segment's start.
	pub mileage: f64,
}

/// Parses the `{x,y},{x,y},...` polyline literal.
pub fn parse_polyline(literal: &str) -> Result<Vec<Vector2<f64>>, Error> {
	let cleaned: String = literal.chars().filter(|c| !c.is_whitespace()).collect();
	let cleaned = cleaned.replace("},{", "|");
	let cleaned = cleaned.replace(['{', '}'], "");

	let mut vertices = Vec::new();
	for token in cleaned.split('|') {
		let mut parts = token.split(',');
		let (Some(x), Some(y), None) = (parts.next(), parts.next(), parts.next()) else {
			return Err(Error::InvalidArgument(format!(
				"malformed polyline vertex {:?}",
				token
			)));
		};
		let x: f64 = x
			.parse()
			.map_err(|_| Error::InvalidArgument(format!("malformed coordinate {:?}", x)))?;
		let y: f64 = y
			.parse()
			.map_err(|_| Error::InvalidArgument(format!("malformed coordinate {:?}", y)))?;
		vertices.push(Vector2::new(x, y));
	}

	if vertices.len() < 2 {
		return Err(Error::InvalidArgument(
			"a profile polyline needs at least two vertices".to_string(),
		));
	}

	Ok(vertices)
}

/// Turns the polyline into one oriented corridor box per segment. Each box
/// spans the full vertical extent of the dataset and carries the running
/// mileage of the segments before it.
pub fn build_segments(
	polyline: &[Vector2<f64>],
	width: f64,
	bounds: &Bounds,
) -> Result<Vec<Segment>, Error> {
	if polyline.len() < 2 {
		return Err(Error::InvalidArgument(
			"a profile polyline needs at least two vertices".to_string(),
		));
	}
	if !(width > 0.0) {
		return Err(Error::InvalidGeometry(format!(
			"corridor width must be positive, got {}",
			width
		)));
	}
	if polyline
		.iter()
		.any(|vertex| !vertex.x.is_finite() || !vertex.y.is_finite())
	{
		return Err(Error::InvalidGeometry(
			"polyline coordinates must be finite".to_string(),
		));
	}

	let z_center = bounds.center().z;
	let height = bounds.size().z;

	let mut segments = Vec::with_capacity(polyline.len() - 1);
	let mut mileage = 0.0;
	for window in polyline.windows(2) {
		let (start, end) = (window[0], window[1]);
		let delta = end - start;
		let length = delta.norm();
		if length == 0.0 {
			return Err(Error::InvalidGeometry(format!(
				"zero-length segment at ({}, {})",
				start.x, start.y
			)));
		}
		let angle = delta.y.atan2(delta.x);

		// unit cube -> corridor box, right to left: put the -X face onto the
		// origin, scale to (length, width, dataset height), rotate into the
		// segment direction, move onto the start vertex at mid height
		let matrix = Matrix4::new_translation(&Vector3::new(start.x, start.y, z_center))
			* Matrix4::from_axis_angle(&Vector3::z_axis(), angle)
			* Matrix4::new_nonuniform_scaling(&Vector3::new(length, width, height))
			* Matrix4::new_translation(&Vector3::new(0.5, 0.0, 0.0));

		segments.push(Segment {
			start,
			end,
			matrix,
			mileage,
		});
		mileage += length;
	}

	Ok(segments)
}

/// Runs the spatial filter once per segment, in polyline order. Order is
/// preserved because the encoders accumulate mileage across the results.
pub fn points_in_profile<N: OctreeNode>(
	root: &N,
	bounds: &Bounds,
	polyline: &[Vector2<f64>],
	width: f64,
	min_level: u32,
	max_level: u32,
) -> Result<Vec<FilterResult>, Error> {
	let segments = build_segments(polyline, width, bounds)?;

	let mut results = Vec::with_capacity(segments.len());
	for (index, segment) in segments.iter().enumerate() {
		let started = Instant::now();
		let mut result = points_in_box(root, &segment.matrix, min_level, max_level)?;
		result.duration_millis = started.elapsed().as_millis() as u64;
		result.mileage = segment.mileage;

		info!(
			"segment {}: accepted {} of {} points in {} nodes ({} ms)",
			index,
			result.points.len(),
			result.points_processed,
			result.nodes_processed,
			result.duration_millis
		);
		results.push(result);
	}

	Ok(results)
}
