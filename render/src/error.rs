use std::fmt::{Debug, Display};

/// Adds a `Device` variant (shader compile/link failure, incomplete
/// framebuffer, readback failure) to `geo::Error`'s taxonomy.
pub enum Error {
	Geo(geo::Error),
	Device(String),
}

impl Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
		match self {
			Self::Geo(e) => Display::fmt(e, f),
			Self::Device(msg) => write!(f, "device error: {}", msg),
		}
	}
}

impl Debug for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result { Display::fmt(self, f) }
}

impl std::error::Error for Error {}

impl From<geo::Error> for Error {
	fn from(e: geo::Error) -> Self { Self::Geo(e) }
}
