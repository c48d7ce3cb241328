pub mod csv;
pub mod las;
pub mod potree;

use std::io::Write;

use clap::ValueEnum;
use nalgebra::{Matrix4, Point3, Vector3};

use crate::error::Error;
use crate::filter::FilterResult;
use crate::model::attributes::Attributes;
use crate::model::metadata::Metadata;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
	#[value(name = "POTREE")]
	Potree,
	#[value(name = "LAS")]
	Las,
	#[value(name = "CSV")]
	Csv,
}

/// Encodes the ordered segment results into `out`. The sink is borrowed;
/// whoever owns it decides when it is closed.
pub fn write(
	results: &[FilterResult],
	attributes: &Attributes,
	metadata: &Metadata,
	format: OutputFormat,
	out: &mut dyn Write,
) -> Result<(), Error> {
	match format {
		OutputFormat::Potree => potree::write_potree(results, attributes, out)?,
		OutputFormat::Las => las::write_las(results, metadata, out)?,
		OutputFormat::Csv => csv::write_csv(results, out)?,
	}
	out.flush().map_err(Error::Encode)
}

pub(crate) struct Totals {
	pub points_accepted: u64,
	pub points_processed: u64,
	pub nodes_processed: u64,
	pub duration_millis: u64,
}

pub(crate) fn totals_of(results: &[FilterResult]) -> Totals {
	let mut totals = Totals {
		points_accepted: 0,
		points_processed: 0,
		nodes_processed: 0,
		duration_millis: 0,
	};
	for result in results {
		totals.points_accepted += result.points.len() as u64;
		totals.points_processed += result.points_processed;
		totals.nodes_processed += result.nodes_processed;
		totals.duration_millis += result.duration_millis;
	}
	totals
}

/// Lower corner of the corridor box and its +X edge vector. The edge length
/// equals the segment's 2-D length, which is what advances the mileage
/// between segments.
pub(crate) fn profile_frame(matrix: &Matrix4<f64>) -> (Vector3<f64>, Vector3<f64>) {
	let local_min = matrix.transform_point(&Point3::new(-0.5, -0.5, -0.5)).coords;
	let x_edge = matrix.transform_point(&Point3::new(0.5, -0.5, -0.5)).coords - local_min;
	(local_min, x_edge)
}
