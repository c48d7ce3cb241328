use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::Error;
use crate::model::bounds::Bounds;

// cross products of near-parallel axes carry no separation information
const DEGENERATE_AXIS: f64 = 1e-12;

/// Oriented bounding box, the image of the canonical cube [-0.5, 0.5]^3
/// under an affine transform.
pub struct Obb {
	center: Vector3<f64>,
	axes: [Vector3<f64>; 3],
	half_extents: [f64; 3],
}

impl Obb {
	pub fn from_transform(matrix: &Matrix4<f64>) -> Result<Obb, Error> {
		let mut axes = [Vector3::zeros(); 3];
		let mut half_extents = [0.0; 3];
		for i in 0..3 {
			let column = Vector3::new(matrix[(0, i)], matrix[(1, i)], matrix[(2, i)]);
			let length = column.norm();
			if length == 0.0 || !length.is_finite() {
				return Err(Error::InvalidGeometry(format!(
					"box axis {} has zero or non-finite extent",
					i
				)));
			}
			axes[i] = column / length;
			half_extents[i] = length * 0.5;
		}

		let center = matrix.transform_point(&Point3::origin()).coords;
		if !center.iter().all(|c| c.is_finite()) {
			return Err(Error::InvalidGeometry("box center is not finite".to_string()));
		}

		Ok(Obb {
			center,
			axes,
			half_extents,
		})
	}

	/// Orthonormal basis aligned with the box.
	pub fn axes(&self) -> &[Vector3<f64>; 3] {
		&self.axes
	}

	/// Inclusive on all six faces.
	pub fn inside(&self, position: &Vector3<f64>) -> bool {
		let delta = position - self.center;
		(0..3).all(|i| delta.dot(&self.axes[i]).abs() <= self.half_extents[i])
	}

	/// Separating-axis test against an axis-aligned box: 3 world axes, the 3
	/// box axes, and their 9 cross products.
	pub fn intersects(&self, bounds: &Bounds) -> bool {
		let aabb_center = bounds.center();
		let aabb_half = bounds.size() * 0.5;
		let world = [Vector3::x(), Vector3::y(), Vector3::z()];

		let mut candidates: Vec<Vector3<f64>> = Vec::with_capacity(15);
		candidates.extend_from_slice(&world);
		candidates.extend_from_slice(&self.axes);
		for world_axis in &world {
			for box_axis in &self.axes {
				candidates.push(world_axis.cross(box_axis));
			}
		}

		let offset = self.center - aabb_center;
		for axis in &candidates {
			if axis.norm_squared() < DEGENERATE_AXIS {
				continue;
			}
			let distance = offset.dot(axis).abs();
			let box_radius: f64 = (0..3)
				.map(|i| self.half_extents[i] * self.axes[i].dot(axis).abs())
				.sum();
			let aabb_radius =
				aabb_half.x * axis.x.abs() + aabb_half.y * axis.y.abs() + aabb_half.z * axis.z.abs();
			if distance > box_radius + aabb_radius {
				return false;
			}
		}

		true
	}
}

#[cfg(test)]
mod tests {
	use nalgebra::{Matrix4, Vector3};

	use super::Obb;
	use crate::error::Error;
	use crate::model::bounds::Bounds;

	fn box_at(center: (f64, f64, f64), size: (f64, f64, f64), angle: f64) -> Matrix4<f64> {
		Matrix4::new_translation(&Vector3::new(center.0, center.1, center.2))
			* Matrix4::from_axis_angle(&Vector3::z_axis(), angle)
			* Matrix4::new_nonuniform_scaling(&Vector3::new(size.0, size.1, size.2))
	}

	#[test]
	fn test_degenerate_extent_is_rejected() {
		let flat = box_at((0.0, 0.0, 0.0), (1.0, 0.0, 1.0), 0.0);
		assert!(matches!(
			Obb::from_transform(&flat),
			Err(Error::InvalidGeometry(_))
		));
	}

	#[test]
	fn test_axes_follow_the_rotation() {
		let obb = Obb::from_transform(&box_at(
			(0.0, 0.0, 0.0),
			(4.0, 2.0, 1.0),
			std::f64::consts::FRAC_PI_2,
		))
		.unwrap();

		let first = obb.axes()[0];
		assert!(first.x.abs() < 1e-12);
		assert!((first.y - 1.0).abs() < 1e-12);
		assert!((obb.axes()[2].z - 1.0).abs() < 1e-12);
	}

	#[test]
	fn test_inside_is_inclusive_on_faces() {
		let obb = Obb::from_transform(&box_at((0.0, 0.0, 0.0), (2.0, 2.0, 2.0), 0.0)).unwrap();

		assert!(obb.inside(&Vector3::new(1.0, 0.0, 0.0)));
		assert!(obb.inside(&Vector3::new(1.0, 1.0, 1.0)));
		assert!(obb.inside(&Vector3::new(0.0, -1.0, 0.5)));
		assert!(!obb.inside(&Vector3::new(1.0 + 1e-9, 0.0, 0.0)));
	}

	#[test]
	fn test_intersects_axis_aligned_overlap() {
		let obb = Obb::from_transform(&box_at((0.0, 0.0, 0.0), (2.0, 2.0, 2.0), 0.0)).unwrap();

		assert!(obb.intersects(&Bounds::new(0.5, 0.5, 0.5, 3.0, 3.0, 3.0)));
		// touching faces still count as intersecting
		assert!(obb.intersects(&Bounds::new(1.0, -1.0, -1.0, 2.0, 1.0, 1.0)));
		assert!(!obb.intersects(&Bounds::new(1.5, -1.0, -1.0, 2.0, 1.0, 1.0)));
	}

	#[test]
	fn test_rotated_box_is_separated_on_its_own_axis() {
		// a 45 degree box whose world-axis projections overlap the AABB,
		// so only the box's own axis separates the two
		let angle = std::f64::consts::FRAC_PI_4;
		let aabb = Bounds::new(0.0, 0.0, 0.0, 1.0, 1.0, 1.0);

		let separated = Obb::from_transform(&box_at((1.6, 1.6, 0.5), (1.0, 1.0, 1.0), angle)).unwrap();
		assert!(!separated.intersects(&aabb));

		let touching = Obb::from_transform(&box_at((1.2, 1.2, 0.5), (1.0, 1.0, 1.0), angle)).unwrap();
		assert!(touching.intersects(&aabb));
	}
}
