use crate::{tile::TileHandle, Error, TileStore};

/// Upper bound on how many tiles may span the render footprint along one
/// axis. A render radius large enough to need more than this many adjacent
/// tiles is rejected as a configuration error rather than silently growing
/// an unbounded table.
const MAX_TILES_IJ: i32 = 4;

/// A virtual, contiguous, integer-indexed height grid composed from one or
/// more memory-mapped SRTM tiles around a viewer position.
///
/// Indices `(i, j)` run `0..2*radius_cells` with `i` increasing east and `j`
/// increasing north, origin at the SW corner of the render footprint.
pub struct DemMosaic {
	radius_cells: i32,
	cells_per_deg: i32,
	origin_tile_lon_lat: [i32; 2],
	origin_tile_cell_ij: [i32; 2],
	n_tiles_ij: [i32; 2],
	tiles: Vec<Vec<Option<TileHandle>>>,
}

impl DemMosaic {
	/// Builds the mosaic covering `2*radius_cells` cells on each side,
	/// centered (to within one cell) on `(viewer_lat_deg, viewer_lon_deg)`.
	pub fn build(
		viewer_lat_deg: f64, viewer_lon_deg: f64, radius_cells: i32, cells_per_deg: i32, tile_store: &TileStore,
	) -> Result<Self, Error> {
		tracy::zone!("Build Mosaic");

		if radius_cells < 1 {
			return Err(Error::Config("radius_cells must be >= 1".into()));
		}

		let viewer_lon_lat = [viewer_lon_deg, viewer_lat_deg];
		let mut origin_tile_lon_lat = [0i32; 2];
		let mut origin_tile_cell_ij = [0i32; 2];
		let mut n_tiles_ij = [0i32; 2];

		for axis in 0..2 {
			let icell_origin = (viewer_lon_lat[axis] * cells_per_deg as f64).floor() as i32 - (radius_cells - 1);
			let origin_lon_lat = icell_origin as f64 / cells_per_deg as f64;

			let origin_tile = origin_lon_lat.floor() as i32;
			origin_tile_lon_lat[axis] = origin_tile;
			origin_tile_cell_ij[axis] = ((origin_lon_lat - origin_tile as f64) * cells_per_deg as f64).round() as i32;

			let cellij_last = origin_tile_cell_ij[axis] + radius_cells * 2 - 1;
			let mut idem_last = cellij_last / cells_per_deg;
			if cellij_last == idem_last * cells_per_deg {
				// The last cell is cell 0 of the next tile; adjacent tiles share
				// that row/col so we can use the last row of the previous tile.
				idem_last -= 1;
			}
			n_tiles_ij[axis] = idem_last + 1;

			if n_tiles_ij[axis] > MAX_TILES_IJ {
				return Err(Error::Config(format!(
					"render radius too large: needs {} tiles along an axis, max is {}",
					n_tiles_ij[axis], MAX_TILES_IJ
				)));
			}
		}

		// tiles[i][j], i along lon (axis 0), j along lat (axis 1); ordering
		// matches increasing lon/lat, with lon varying faster within a row.
		let mut tiles = Vec::with_capacity(n_tiles_ij[0] as usize);
		for i in 0..n_tiles_ij[0] {
			let mut column = Vec::with_capacity(n_tiles_ij[1] as usize);
			for j in 0..n_tiles_ij[1] {
				let lon = origin_tile_lon_lat[0] + i;
				let lat = origin_tile_lon_lat[1] + j;
				column.push(tile_store.open(lat, lon)?);
			}
			tiles.push(column);
		}

		Ok(Self {
			radius_cells,
			cells_per_deg,
			origin_tile_lon_lat,
			origin_tile_cell_ij,
			n_tiles_ij,
			tiles,
		})
	}

	pub fn radius_cells(&self) -> i32 { self.radius_cells }

	/// Samples the height, in meters, at mosaic cell `(i, j)`.
	///
	/// Returns `0` for cells whose tile is missing (sea level) and `-1` for
	/// any cell outside `0..2*radius_cells` on either axis. Negative raw
	/// samples (void) are clipped to `0`.
	pub fn sample(&self, i: i32, j: i32) -> i32 {
		tracy::zone!("Sample Mosaic");

		if i < 0 || j < 0 {
			return -1;
		}

		let mut cell_ij = [i + self.origin_tile_cell_ij[0], j + self.origin_tile_cell_ij[1]];
		let mut dem_ij = [0i32; 2];
		for axis in 0..2 {
			dem_ij[axis] = cell_ij[axis] / self.cells_per_deg;
			cell_ij[axis] -= dem_ij[axis] * self.cells_per_deg;

			if cell_ij[axis] == 0 {
				dem_ij[axis] -= 1;
				cell_ij[axis] = self.cells_per_deg;
			}

			if dem_ij[axis] < 0 || dem_ij[axis] >= self.n_tiles_ij[axis] {
				return -1;
			}
		}

		match &self.tiles[dem_ij[0] as usize][dem_ij[1] as usize] {
			None => 0,
			Some(tile) => {
				let z = tile.raw_sample(cell_ij[0], cell_ij[1]);
				if z < 0 {
					0
				} else {
					z as i32
				}
			},
		}
	}

	/// The viewer's own fractional `(i, j)` mosaic-cell position, for a
	/// viewer at `(lat_deg, lon_deg)` used to build a mosaic with this
	/// `cells_per_deg`/`radius_cells`. Pure function of its inputs (not of
	/// which tiles actually loaded), so callers may compute it without
	/// holding a `DemMosaic` — used by the renderer to pick the four
	/// neighbor cells under the viewer for the viewer-elevation estimate.
	pub fn viewer_local_cell(lat_deg: f64, lon_deg: f64, cells_per_deg: i32, radius_cells: i32) -> (f64, f64) {
		let local = |v: f64| -> f64 {
			let cell = v * cells_per_deg as f64;
			cell - cell.floor() + (radius_cells - 1) as f64
		};
		(local(lon_deg), local(lat_deg))
	}

	/// Reports the inclusive geographic extent of the render footprint, as
	/// `(lat0, lon0, lat1, lon1)`.
	pub fn bounds_deg(&self) -> (f64, f64, f64, f64) {
		let cpd = self.cells_per_deg as f64;
		let lon0 = self.origin_tile_lon_lat[0] as f64 + self.origin_tile_cell_ij[0] as f64 / cpd;
		let lat0 = self.origin_tile_lon_lat[1] as f64 + self.origin_tile_cell_ij[1] as f64 / cpd;
		let lon1 = self.origin_tile_lon_lat[0] as f64
			+ (self.origin_tile_cell_ij[0] as f64 + (2 * self.radius_cells - 1) as f64) / cpd;
		let lat1 = self.origin_tile_lon_lat[1] as f64
			+ (self.origin_tile_cell_ij[1] as f64 + (2 * self.radius_cells - 1) as f64) / cpd;
		(lat0, lon0, lat1, lon1)
	}
}

#[cfg(test)]
mod tests {
	use std::{fs::File, io::Write};

	use super::*;

	fn write_tile(dir: &std::path::Path, lat: i32, lon: i32, width: i32, fill: impl Fn(i32, i32) -> i16) {
		let (ns, lat_mag) = if lat >= 0 { ('N', lat) } else { ('S', -lat) };
		let (we, lon_mag) = if lon >= 0 { ('E', lon) } else { ('W', -lon) };
		let name = format!("{ns}{lat_mag:02}{we}{lon_mag:03}.hgt");
		let mut f = File::create(dir.join(name)).unwrap();
		for row_from_top in 0..width {
			let cell_j = width - 1 - row_from_top;
			for cell_i in 0..width {
				f.write_all(&fill(cell_i, cell_j).to_be_bytes()).unwrap();
			}
		}
	}

	#[test]
	fn sample_nonnegative_or_sentinel() {
		let dir = std::env::temp_dir().join(format!("geo-test-mosaic-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		write_tile(&dir, 0, 0, 1201, |_, _| 100);

		let store = TileStore::new(&dir, 1201);
		let mosaic = DemMosaic::build(0.5, 0.5, 10, 1200, &store).unwrap();

		for j in -2..22 {
			for i in -2..22 {
				let z = mosaic.sample(i, j);
				if i < 0 || j < 0 || i >= 20 || j >= 20 {
					assert_eq!(z, -1);
				} else {
					assert!(z >= 0);
				}
			}
		}

		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn missing_tile_reads_as_sea() {
		let dir = std::env::temp_dir().join(format!("geo-test-mosaic-missing-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		// No tile file at all near the origin.
		let store = TileStore::new(&dir, 1201);
		let mosaic = DemMosaic::build(0.5, 0.5, 5, 1200, &store).unwrap();
		for j in 0..10 {
			for i in 0..10 {
				assert_eq!(mosaic.sample(i, j), 0);
			}
		}
		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn adjacent_tiles_share_edge() {
		let dir = std::env::temp_dir().join(format!("geo-test-mosaic-edge-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		// Two adjacent tiles along longitude whose values form one continuous
		// linear ramp (step 10 per cell) across the lon=1 boundary, so a seam
		// artifact shows up as a broken step rather than needing a separate
		// oracle for "what should the shared cell read".
		write_tile(&dir, 0, 0, 5, |i, j| (1000 + i * 10 + j) as i16);
		write_tile(&dir, 0, 1, 5, |i, j| if i == 0 { 1040 + j } else { 1040 + i * 10 + j } as i16);

		let store = TileStore::new(&dir, 5);
		// Viewer near the lon=1 boundary so the mosaic spans both tiles.
		let mosaic = DemMosaic::build(0.5, 0.99, 2, 4, &store).unwrap();
		let bounds = mosaic.bounds_deg();
		assert!(bounds.1 < 1.0 && bounds.3 > 1.0, "expected span across lon=1 boundary: {:?}", bounds);

		// Step size within a tile, away from the seam.
		assert_eq!(mosaic.sample(1, 0) - mosaic.sample(0, 0), 10);
		// Step crossing from the western tile's last column into the eastern
		// tile's first sampled column must stay the same 10, or the seam
		// would show up as a discontinuity.
		assert_eq!(mosaic.sample(3, 0) - mosaic.sample(2, 0), 10);

		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn oversized_radius_is_configuration_error() {
		let dir = std::env::temp_dir().join(format!("geo-test-mosaic-big-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let store = TileStore::new(&dir, 1201);
		let result = DemMosaic::build(0.5, 0.5, 10_000, 1200, &store);
		assert!(matches!(result, Err(Error::Config(_))));
		std::fs::remove_dir_all(&dir).ok();
	}
}
