use std::{
	error::Error as StdError,
	fmt::{Debug, Display},
	path::PathBuf,
};

/// The error taxonomy for this crate.
///
/// A missing tile is deliberately not a variant here: `TileStore::open`
/// returns `Ok(None)` for it and callers treat the gap as sea level.
pub enum Error {
	/// A caller-supplied parameter is out of range or self-contradictory
	/// (`az0 >= az1`, radius exceeds the compile-time tile-table bound, a
	/// malformed datadir path, ...).
	Config(String),
	/// A tile file exists but its size doesn't match the expected
	/// `2 * W * W` bytes for the configured SRTM resolution, or it isn't a
	/// regular readable file.
	BadTile(PathBuf),
	/// Filesystem or mapping failure on a tile that was expected to be
	/// readable.
	Io(std::io::Error),
	/// An internal invariant was violated. This indicates a bug in this
	/// crate, not a bad input; callers should treat it as fatal.
	InvariantViolated(String),
}

impl Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Config(msg) => write!(f, "configuration error: {}", msg),
			Self::BadTile(path) => write!(f, "bad tile file: {}", path.display()),
			Self::Io(e) => write!(f, "IO error: {}", e),
			Self::InvariantViolated(msg) => write!(f, "invariant violated: {}", msg),
		}
	}
}

impl Debug for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { Display::fmt(self, f) }
}

impl StdError for Error {}

impl From<std::io::Error> for Error {
	fn from(x: std::io::Error) -> Self { Self::Io(x) }
}
