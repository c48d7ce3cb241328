use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use nalgebra::Vector3;

use crate::error::Error;
use crate::model::attributes::{Attributes, PointAttribute};
use crate::model::bounds::Bounds;
use crate::model::metadata::Metadata;
use crate::model::point::Point;

/// What the spatial filter needs from an octree store, and nothing more.
///
/// `points` materializes the node's own payload; it may block on I/O and
/// fails with [`Error::Storage`], which aborts the running query.
pub trait OctreeNode: Sized {
	fn bounding_box(&self) -> &Bounds;
	fn level(&self) -> u32;
	fn child(&self, octant: usize) -> Option<&Self>;
	fn points(&self) -> Result<Vec<Point>, Error>;
}

/// A Potree 1.x dataset directory: `cloud.js` metadata, `.hrc` hierarchy
/// chunks and one `.bin` payload per node.
pub struct PotreeReader {
	pub metadata: Metadata,
	pub attributes: Attributes,
	root: Node,
}

impl PotreeReader {
	pub fn open(path: &Path) -> Result<PotreeReader, Error> {
		let metadata = Metadata::from_file(&path.join("cloud.js"))?;
		if metadata.hierarchy_step_size == 0 {
			return Err(Error::Storage {
				path: path.join("cloud.js"),
				source: io::Error::new(
					io::ErrorKind::InvalidData,
					"hierarchyStepSize must be positive",
				),
			});
		}
		let attributes = metadata.stored_attributes()?;

		let source = Rc::new(Source {
			octree_dir: path.join(&metadata.octree_dir),
			hierarchy_step_size: metadata.hierarchy_step_size,
			attributes: attributes.clone(),
			scale: metadata.scale,
		});

		let mut root = Node::new("r".to_string(), metadata.bounding_box.clone(), source);
		load_hierarchy(&mut root)?;
		debug!(
			"opened {} (format {}, spacing {}): {} hierarchy nodes",
			path.display(),
			metadata.version,
			metadata.spacing,
			root.node_count()
		);

		Ok(PotreeReader {
			metadata,
			attributes,
			root,
		})
	}

	pub fn root(&self) -> &Node {
		&self.root
	}
}

struct Source {
	octree_dir: PathBuf,
	hierarchy_step_size: usize,
	attributes: Attributes,
	scale: f64,
}

impl Source {
	/// Potree 1.x nests node files one directory level per full group of
	/// `hierarchy_step_size` name indices.
	fn node_path(&self, name: &str, extension: &str) -> PathBuf {
		let indices = &name[1..];
		let mut dir = self.octree_dir.join("r");
		let full_groups = indices.len() / self.hierarchy_step_size;
		for group in 0..full_groups {
			let start = group * self.hierarchy_step_size;
			dir = dir.join(&indices[start..start + self.hierarchy_step_size]);
		}
		dir.join(format!("{}.{}", name, extension))
	}
}

pub struct Node {
	name: String,
	bounds: Bounds,
	num_points: u32,
	children: [Option<Box<Node>>; 8],
	source: Rc<Source>,
	cache: RefCell<Option<Vec<Point>>>,
}

impl Node {
	fn new(name: String, bounds: Bounds, source: Rc<Source>) -> Node {
		Node {
			name,
			bounds,
			num_points: 0,
			children: [None, None, None, None, None, None, None, None],
			source,
			cache: RefCell::new(None),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn num_points(&self) -> u32 {
		self.num_points
	}

	pub fn is_leaf_node(&self) -> bool {
		self.children.iter().all(|child| child.is_none())
	}

	fn node_count(&self) -> usize {
		let mut count = 0;
		let mut stack = vec![self];
		while let Some(node) = stack.pop() {
			count += 1;
			for child in node.children.iter().filter_map(|child| child.as_deref()) {
				stack.push(child);
			}
		}
		count
	}

	fn load_points(&self) -> Result<Vec<Point>, Error> {
		let path = self.source.node_path(&self.name, "bin");
		let buffer = fs::read(&path).map_err(|source| Error::Storage {
			path: path.clone(),
			source,
		})?;

		let bytes_per_point = self.source.attributes.bytes_per_point;
		let count = if bytes_per_point == 0 {
			0
		} else {
			buffer.len() / bytes_per_point
		};

		let origin = self.bounds.min();
		let scale = self.source.scale;
		let storage = |source: io::Error| Error::Storage {
			path: path.clone(),
			source,
		};

		let mut cursor = Cursor::new(&buffer);
		let mut points = Vec::with_capacity(count);
		for _ in 0..count {
			let mut point = Point::default();
			for attribute in &self.source.attributes.list {
				match attribute {
					PointAttribute::PositionCartesian => {
						let x = cursor.read_u32::<LittleEndian>().map_err(storage)?;
						let y = cursor.read_u32::<LittleEndian>().map_err(storage)?;
						let z = cursor.read_u32::<LittleEndian>().map_err(storage)?;
						point.position = Vector3::new(
							origin.x + f64::from(x) * scale,
							origin.y + f64::from(y) * scale,
							origin.z + f64::from(z) * scale,
						);
					}
					PointAttribute::ColorPacked => {
						let r = cursor.read_u8().map_err(storage)?;
						let g = cursor.read_u8().map_err(storage)?;
						let b = cursor.read_u8().map_err(storage)?;
						let _alpha = cursor.read_u8().map_err(storage)?;
						point.color = Vector3::new(r, g, b);
					}
					PointAttribute::Rgb => {
						let r = cursor.read_u8().map_err(storage)?;
						let g = cursor.read_u8().map_err(storage)?;
						let b = cursor.read_u8().map_err(storage)?;
						point.color = Vector3::new(r, g, b);
					}
					PointAttribute::Intensity => {
						point.intensity = cursor.read_u16::<LittleEndian>().map_err(storage)?;
					}
					PointAttribute::Classification => {
						point.classification = cursor.read_u8().map_err(storage)?;
					}
					other => {
						cursor.set_position(cursor.position() + other.byte_size() as u64);
					}
				}
			}
			points.push(point);
		}

		Ok(points)
	}
}

impl OctreeNode for Node {
	fn bounding_box(&self) -> &Bounds {
		&self.bounds
	}

	fn level(&self) -> u32 {
		(self.name.len() - 1) as u32
	}

	fn child(&self, octant: usize) -> Option<&Node> {
		self.children[octant].as_deref()
	}

	fn points(&self) -> Result<Vec<Point>, Error> {
		if self.cache.borrow().is_none() {
			let loaded = self.load_points()?;
			*self.cache.borrow_mut() = Some(loaded);
		}
		Ok(self
			.cache
			.borrow()
			.as_ref()
			.expect("point cache populated above")
			.clone())
	}
}

/// Reads the `.hrc` chunk rooted at `chunk_root` and attaches the described
/// subtree. Records are 5 bytes each (child mask, point count), breadth
/// first from the chunk root; nodes a full step below the chunk root own
/// the next chunk.
fn load_hierarchy(chunk_root: &mut Node) -> Result<(), Error> {
	let source = Rc::clone(&chunk_root.source);
	let path = source.node_path(&chunk_root.name, "hrc");
	let buffer = fs::read(&path).map_err(|source| Error::Storage {
		path: path.clone(),
		source,
	})?;

	let mut cursor = Cursor::new(&buffer);
	let mut records = Vec::with_capacity(buffer.len() / 5);
	while (cursor.position() as usize) < buffer.len() {
		let storage = |source: io::Error| Error::Storage {
			path: path.clone(),
			source,
		};
		let child_mask = cursor.read_u8().map_err(storage)?;
		let num_points = cursor.read_u32::<LittleEndian>().map_err(storage)?;
		records.push((child_mask, num_points));
	}

	let chunk_level = chunk_root.level();
	let step = source.hierarchy_step_size as u32;

	// replay the breadth-first record order to recover node names
	let mut names: Vec<String> = vec![chunk_root.name.clone()];
	let mut by_name: HashMap<String, (u8, u32)> = HashMap::new();
	for (index, &(child_mask, num_points)) in records.iter().enumerate() {
		let name = match names.get(index) {
			Some(name) => name.clone(),
			None => {
				return Err(Error::Storage {
					path,
					source: io::Error::new(
						io::ErrorKind::InvalidData,
						"hierarchy chunk has more records than reachable nodes",
					),
				})
			}
		};
		// children of boundary nodes are described by the next chunk
		if (name.len() - 1) as u32 - chunk_level < step {
			for octant in 0..8 {
				if child_mask & (1 << octant) != 0 {
					names.push(format!("{}{}", name, octant));
				}
			}
		}
		by_name.insert(name, (child_mask, num_points));
	}

	attach_children(chunk_root, &by_name, chunk_level, step)
}

fn attach_children(
	node: &mut Node,
	by_name: &HashMap<String, (u8, u32)>,
	chunk_level: u32,
	step: u32,
) -> Result<(), Error> {
	let Some(&(child_mask, num_points)) = by_name.get(&node.name) else {
		return Ok(());
	};
	node.num_points = num_points;

	if node.level() == chunk_level + step {
		if child_mask != 0 {
			load_hierarchy(node)?;
		}
		return Ok(());
	}

	for octant in 0..8 {
		if child_mask & (1 << octant) != 0 {
			let mut child = Box::new(Node::new(
				format!("{}{}", node.name, octant),
				node.bounds.child_octant(octant),
				Rc::clone(&node.source),
			));
			attach_children(&mut child, by_name, chunk_level, step)?;
			node.children[octant] = Some(child);
		}
	}

	Ok(())
}
