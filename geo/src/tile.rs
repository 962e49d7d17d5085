use std::{
	fs::File,
	path::{Path, PathBuf},
};

use memmap2::Mmap;

use crate::Error;

/// A single memory-mapped SRTM `.hgt` tile: `width * width` big-endian `i16`
/// samples, row-major, north row first on disk.
pub struct TileHandle {
	map: Mmap,
	width: i32,
}

impl TileHandle {
	/// Reads the raw (unclipped, possibly `-32768` void) sample at tile-local
	/// cell `(cell_i, cell_j)`, where `cell_i` increases east and `cell_j`
	/// increases north, both `0..width`.
	///
	/// Caller must have already bounds-checked `cell_i`/`cell_j` against
	/// `width`; this is a hot path and does not re-check beyond the slice
	/// index, which would panic on misuse rather than silently misbehave.
	pub fn raw_sample(&self, cell_i: i32, cell_j: i32) -> i16 {
		tracy::zone!("Tile Sample");

		// The file stores rows north-to-south; flip to get south-to-north
		// indexing consistent with cell_j increasing north.
		let row_from_top = self.width - 1 - cell_j;
		let p = (cell_i + row_from_top * self.width) as usize;
		let hi = self.map[2 * p] as u16;
		let lo = self.map[2 * p + 1] as u16;
		((hi << 8) | lo) as i16
	}

	pub fn width(&self) -> i32 { self.width }
}

/// Opens SRTM `.hgt` tile files by integer (lat deg, lon deg) and holds
/// their memory mappings. Missing tiles are not errors: `open` returns
/// `Ok(None)` and the mosaic treats the gap as sea level.
pub struct TileStore {
	datadir: PathBuf,
	width: i32,
}

impl TileStore {
	pub fn new(datadir: impl Into<PathBuf>, width: i32) -> Self {
		Self {
			datadir: datadir.into(),
			width,
		}
	}

	/// Opens the tile whose SW corner is at `(lat_deg, lon_deg)`. Returns
	/// `Ok(None)` for a missing or zero-length file (both mean "assume
	/// elevation=0, sea surface"), `Err(Error::BadTile)` for a present file
	/// whose size doesn't match `2*width*width`, and `Err(Error::Io)` for any
	/// other I/O failure opening or mapping a present file.
	pub fn open(&self, lat_deg: i32, lon_deg: i32) -> Result<Option<TileHandle>, Error> {
		tracy::zone!("Open Tile");

		let path = self.tile_path(lat_deg, lon_deg)?;

		let file = match File::open(&path) {
			Ok(f) => f,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				log::warn!("tile file '{}' not found, assuming sea level", path.display());
				return Ok(None);
			},
			Err(e) => return Err(Error::Io(e)),
		};

		let size = file.metadata()?.len();
		if size == 0 {
			// Present but empty: deliberate "this is sea" marker, no warning.
			return Ok(None);
		}

		let expected = 2 * (self.width as u64) * (self.width as u64);
		if size != expected {
			return Err(Error::BadTile(path));
		}

		let map = unsafe { Mmap::map(&file)? };
		Ok(Some(TileHandle {
			map,
			width: self.width,
		}))
	}

	fn tile_path(&self, lat_deg: i32, lon_deg: i32) -> Result<PathBuf, Error> {
		let (ns, lat_mag) = if lat_deg >= 0 { ('N', lat_deg) } else { ('S', -lat_deg) };
		let (we, lon_mag) = if lon_deg >= 0 { ('E', lon_deg) } else { ('W', -lon_deg) };
		let name = format!("{ns}{lat_mag:02}{we}{lon_mag:03}.hgt");

		let base = expand_home(&self.datadir)?;
		Ok(base.join(name))
	}
}

/// Expands a leading `~/` against `$HOME`, the usual shell convention for a
/// user-supplied directory argument.
fn expand_home(path: &Path) -> Result<PathBuf, Error> {
	let s = path.to_string_lossy();
	if let Some(rest) = s.strip_prefix("~/") {
		let home = std::env::var_os("HOME")
			.ok_or_else(|| Error::Config("datadir starts with '~/' but HOME is not set".into()))?;
		Ok(PathBuf::from(home).join(rest))
	} else {
		Ok(path.to_path_buf())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	fn write_tile(dir: &Path, lat: i32, lon: i32, width: i32, fill: impl Fn(i32, i32) -> i16) {
		let (ns, lat_mag) = if lat >= 0 { ('N', lat) } else { ('S', -lat) };
		let (we, lon_mag) = if lon >= 0 { ('E', lon) } else { ('W', -lon) };
		let name = format!("{ns}{lat_mag:02}{we}{lon_mag:03}.hgt");
		let mut f = File::create(dir.join(name)).unwrap();
		// File on disk is north-row-first; row_from_top = width-1-cell_j.
		for row_from_top in 0..width {
			let cell_j = width - 1 - row_from_top;
			for cell_i in 0..width {
				let v = fill(cell_i, cell_j);
				f.write_all(&v.to_be_bytes()).unwrap();
			}
		}
	}

	#[test]
	fn round_trip_sample() {
		let dir = std::env::temp_dir().join(format!("geo-test-tile-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		write_tile(&dir, 34, -118, 5, |i, j| (i * 10 + j) as i16);

		let store = TileStore::new(&dir, 5);
		let tile = store.open(34, -118).unwrap().expect("tile present");
		for j in 0..5 {
			for i in 0..5 {
				assert_eq!(tile.raw_sample(i, j), (i * 10 + j) as i16);
			}
		}

		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn missing_tile_is_none() {
		let dir = std::env::temp_dir().join(format!("geo-test-tile-missing-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let store = TileStore::new(&dir, 1201);
		assert!(store.open(1, 1).unwrap().is_none());
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn zero_length_tile_is_none() {
		let dir = std::env::temp_dir().join(format!("geo-test-tile-zero-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		File::create(dir.join("N01E002.hgt")).unwrap();
		let store = TileStore::new(&dir, 1201);
		assert!(store.open(1, 2).unwrap().is_none());
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn wrong_size_is_bad_tile() {
		let dir = std::env::temp_dir().join(format!("geo-test-tile-bad-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		std::fs::write(dir.join("N01E003.hgt"), vec![0u8; 10]).unwrap();
		let store = TileStore::new(&dir, 1201);
		match store.open(1, 3) {
			Err(Error::BadTile(_)) => {},
			other => panic!("expected BadTile, got {:?}", other.map(|_| ())),
		}
		std::fs::remove_dir_all(&dir).ok();
	}
}
