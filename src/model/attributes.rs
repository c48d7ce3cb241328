use crate::error::Error;

/// Closed set of point attributes a Potree 1.x store can declare.
///
/// The normal variants have no counterpart on [`crate::model::point::Point`];
/// they are skipped on read and zero-padded on write, but still occupy their
/// byte size in every record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointAttribute {
	PositionCartesian,
	PositionProjectedProfile,
	ColorPacked,
	Rgb,
	Intensity,
	Classification,
	Normal,
	NormalSphereMapped,
	NormalOct16,
}

impl PointAttribute {
	pub fn from_name(name: &str) -> Result<PointAttribute, Error> {
		match name {
			"POSITION_CARTESIAN" => Ok(PointAttribute::PositionCartesian),
			"POSITION_PROJECTED_PROFILE" => Ok(PointAttribute::PositionProjectedProfile),
			"COLOR_PACKED" => Ok(PointAttribute::ColorPacked),
			"RGB" => Ok(PointAttribute::Rgb),
			"INTENSITY" => Ok(PointAttribute::Intensity),
			"CLASSIFICATION" => Ok(PointAttribute::Classification),
			"NORMAL" => Ok(PointAttribute::Normal),
			"NORMAL_SPHEREMAPPED" => Ok(PointAttribute::NormalSphereMapped),
			"NORMAL_OCT16" => Ok(PointAttribute::NormalOct16),
			other => Err(Error::InvalidArgument(format!(
				"unknown point attribute {:?}",
				other
			))),
		}
	}

	pub fn name(&self) -> &'static str {
		match self {
			PointAttribute::PositionCartesian => "POSITION_CARTESIAN",
			PointAttribute::PositionProjectedProfile => "POSITION_PROJECTED_PROFILE",
			PointAttribute::ColorPacked => "COLOR_PACKED",
			PointAttribute::Rgb => "RGB",
			PointAttribute::Intensity => "INTENSITY",
			PointAttribute::Classification => "CLASSIFICATION",
			PointAttribute::Normal => "NORMAL",
			PointAttribute::NormalSphereMapped => "NORMAL_SPHEREMAPPED",
			PointAttribute::NormalOct16 => "NORMAL_OCT16",
		}
	}

	pub fn byte_size(&self) -> usize {
		match self {
			PointAttribute::PositionCartesian => 12,
			PointAttribute::PositionProjectedProfile => 8,
			PointAttribute::ColorPacked => 4,
			PointAttribute::Rgb => 3,
			PointAttribute::Intensity => 2,
			PointAttribute::Classification => 1,
			PointAttribute::Normal => 12,
			PointAttribute::NormalSphereMapped => 2,
			PointAttribute::NormalOct16 => 2,
		}
	}

	pub fn is_opaque(&self) -> bool {
		matches!(
			self,
			PointAttribute::Normal
				| PointAttribute::NormalSphereMapped
				| PointAttribute::NormalOct16
		)
	}
}

#[derive(Clone, Debug)]
pub struct Attributes {
	pub list: Vec<PointAttribute>,
	pub bytes_per_point: usize,
}

impl Attributes {
	pub fn new(list: Vec<PointAttribute>) -> Attributes {
		let bytes_per_point = list.iter().map(|attribute| attribute.byte_size()).sum();
		Attributes {
			list,
			bytes_per_point,
		}
	}

	pub fn from_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<Attributes, Error> {
		let list = names
			.into_iter()
			.map(PointAttribute::from_name)
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Attributes::new(list))
	}

	pub fn max_opaque_size(&self) -> usize {
		self.list
			.iter()
			.filter(|attribute| attribute.is_opaque())
			.map(|attribute| attribute.byte_size())
			.max()
			.unwrap_or(0)
	}
}

/// An explicit list wins verbatim; otherwise the stored schema is extended
/// with the along-profile projection.
pub fn resolve_output_attributes(
	explicit: Option<&[String]>,
	stored: &Attributes,
) -> Result<Attributes, Error> {
	match explicit {
		Some(names) => Attributes::from_names(names.iter().map(String::as_str)),
		None => {
			let mut list = stored.list.clone();
			list.push(PointAttribute::PositionProjectedProfile);
			Ok(Attributes::new(list))
		}
	}
}
