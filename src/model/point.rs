use nalgebra::Vector3;

#[derive(Clone, Debug, Default)]
pub struct Point {
	pub position: Vector3<f64>,
	pub color: Vector3<u8>,
	pub intensity: u16,
	pub classification: u8,
}
