use log::debug;
use nalgebra::Matrix4;

use crate::error::Error;
use crate::model::point::Point;
use crate::obb::Obb;
use crate::reader::OctreeNode;

pub struct FilterResult {
	pub matrix: Matrix4<f64>,
	pub mileage: f64,
	pub points: Vec<Point>,
	pub points_processed: u64,
	pub nodes_processed: u64,
	pub duration_millis: u64,
}

/// Collects the points inside the oriented box spanned by `matrix` over the
/// canonical cube [-0.5, 0.5]^3.
///
/// Children are only descended into while their level stays at or below
/// `max_level`; `min_level` gates point emission but never the traversal, so
/// shallow nodes still route to descendants within range.
pub fn points_in_box<N: OctreeNode>(
	root: &N,
	matrix: &Matrix4<f64>,
	min_level: u32,
	max_level: u32,
) -> Result<FilterResult, Error> {
	let obb = Obb::from_transform(matrix)?;

	let mut intersecting: Vec<&N> = Vec::new();
	let mut workload: Vec<&N> = vec![root];
	while let Some(node) = workload.pop() {
		intersecting.push(node);

		for octant in 0..8 {
			if let Some(child) = node.child(octant) {
				if child.level() <= max_level && obb.intersects(child.bounding_box()) {
					workload.push(child);
				}
			}
		}
	}
	debug!("{} nodes intersect the corridor box", intersecting.len());

	let mut accepted: Vec<Point> = Vec::new();
	let mut points_processed = 0u64;
	for node in &intersecting {
		if node.level() < min_level {
			continue;
		}

		for point in node.points()? {
			points_processed += 1;
			if obb.inside(&point.position) {
				accepted.push(point);
			}
		}
	}

	Ok(FilterResult {
		matrix: *matrix,
		mileage: 0.0,
		points: accepted,
		points_processed,
		nodes_processed: intersecting.len() as u64,
		duration_millis: 0,
	})
}
