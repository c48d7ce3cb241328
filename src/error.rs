use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("invalid argument: {0}")]
	InvalidArgument(String),

	#[error("invalid geometry: {0}")]
	InvalidGeometry(String),

	#[error("storage error at {}: {}", .path.display(), .source)]
	Storage { path: PathBuf, source: io::Error },

	#[error("encode error: {0}")]
	Encode(#[source] io::Error),
}
