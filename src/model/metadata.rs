use std::fs;
use std::io;
use std::path::Path;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::model::attributes::Attributes;
use crate::model::bounds::Bounds;

/// `pointAttributes` in `cloud.js` is either a list of attribute names or a
/// single string naming a compressed store ("LAZ", "LAST").
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredAttributes {
	List(Vec<String>),
	Encoded(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
	pub version: String,
	pub octree_dir: String,
	#[serde(default)]
	pub projection: Option<String>,
	#[serde(default)]
	pub points: Option<u64>,
	pub bounding_box: Bounds,
	#[serde(default)]
	pub tight_bounding_box: Option<Bounds>,
	pub point_attributes: StoredAttributes,
	pub spacing: f64,
	pub scale: f64,
	pub hierarchy_step_size: usize,
}

impl Metadata {
	pub fn from_file(path: &Path) -> Result<Metadata, Error> {
		let contents = fs::read_to_string(path).map_err(|source| Error::Storage {
			path: path.to_path_buf(),
			source,
		})?;
		serde_json::from_str(&contents).map_err(|error| Error::Storage {
			path: path.to_path_buf(),
			source: io::Error::new(io::ErrorKind::InvalidData, error),
		})
	}

	/// cloud.js stores one scale for all axes; LAS wants a triple.
	pub fn scale_triple(&self) -> Vector3<f64> {
		Vector3::new(self.scale, self.scale, self.scale)
	}

	pub fn stored_attributes(&self) -> Result<Attributes, Error> {
		match &self.point_attributes {
			StoredAttributes::List(names) => {
				Attributes::from_names(names.iter().map(String::as_str))
			}
			StoredAttributes::Encoded(name) => Err(Error::InvalidArgument(format!(
				"compressed point store {:?} is not supported",
				name
			))),
		}
	}
}
