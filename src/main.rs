mod error;
mod filter;
mod model;
mod obb;
mod profile;
mod reader;
mod writer;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgGroup, Parser};
use log::info;

use crate::error::Error;
use crate::model::attributes::resolve_output_attributes;
use crate::profile::{parse_polyline, points_in_profile};
use crate::reader::PotreeReader;
use crate::writer::OutputFormat;

#[derive(Parser, Debug)]
#[command(
	name = "potree-elevation-profile",
	version,
	about = "Extracts elevation-profile point slices from a Potree octree"
)]
#[command(group = ArgGroup::new("sink").required(true).args(["output", "stdout"]))]
struct Cli {
	/// Potree dataset root directory (the one containing cloud.js).
	dataset: PathBuf,

	/// Profile polyline in the form {x,y},{x,y},...
	#[arg(long)]
	coordinates: String,

	/// Corridor width in world units.
	#[arg(long)]
	width: f64,

	/// Lowest octree level that emits points.
	#[arg(long)]
	min_level: u32,

	/// Deepest octree level the traversal descends to.
	#[arg(long)]
	max_level: u32,

	/// Output file.
	#[arg(short = 'o', value_name = "FILE")]
	output: Option<PathBuf>,

	/// Write the binary stream to standard output instead.
	#[arg(long)]
	stdout: bool,

	/// Output format.
	#[arg(long, value_enum, default_value = "POTREE")]
	output_format: OutputFormat,

	/// Attribute names overriding the dataset schema.
	#[arg(long, num_args = 1.., value_name = "ATTRIBUTE")]
	output_attributes: Option<Vec<String>>,
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	// logs go to stderr, the payload may own stdout
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
		.target(env_logger::Target::Stderr)
		.init();

	let polyline = parse_polyline(&cli.coordinates)?;
	let reader = PotreeReader::open(&cli.dataset)?;
	info!(
		"dataset {}: {} bytes per stored point",
		cli.dataset.display(),
		reader.attributes.bytes_per_point
	);

	let results = points_in_profile(
		reader.root(),
		&reader.metadata.bounding_box,
		&polyline,
		cli.width,
		cli.min_level,
		cli.max_level,
	)?;
	let attributes = resolve_output_attributes(cli.output_attributes.as_deref(), &reader.attributes)?;

	// the file sink is owned here; stdout is only locked, never closed
	let stdout = io::stdout();
	let mut sink: Box<dyn Write> = match &cli.output {
		Some(path) => Box::new(BufWriter::new(File::create(path).map_err(|source| {
			Error::Storage {
				path: path.clone(),
				source,
			}
		})?)),
		None => Box::new(stdout.lock()),
	};
	writer::write(&results, &attributes, &reader.metadata, cli.output_format, &mut sink)?;

	Ok(())
}
