use crate::DemMosaic;

/// A single mesh vertex: mosaic cell coordinates plus height in meters.
/// Kept as 16-bit integers — cell indices and SRTM heights both fit — so the
/// vertex buffer this feeds on the device side stays compact.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct Vertex {
	pub i: i16,
	pub j: i16,
	pub height_m: i16,
}

pub struct Mesh {
	pub vertices: Vec<Vertex>,
	pub indices: Vec<u32>,
}

/// Builds the dense vertex/index grid covering a `DemMosaic`'s full extent.
/// No seam duplication: triangles that straddle the azimuth wrap are
/// discarded later, in the vertex stage of the render pipeline, not here.
pub struct MeshBuilder;

impl MeshBuilder {
	pub fn build(mosaic: &DemMosaic) -> Mesh {
		tracy::zone!("Build Mesh");

		let n = 2 * mosaic.radius_cells();
		let mut vertices = Vec::with_capacity((n * n) as usize);
		for j in 0..n {
			for i in 0..n {
				vertices.push(Vertex {
					i: i as i16,
					j: j as i16,
					height_m: mosaic.sample(i, j).max(0) as i16,
				});
			}
		}

		let mut indices = Vec::with_capacity((6 * (n - 1) * (n - 1)) as usize);
		let vertex_index = |i: i32, j: i32| -> u32 { (j * n + i) as u32 };
		for j in 0..n - 1 {
			for i in 0..n - 1 {
				// Triangle 1: (i,j), (i+1,j+1), (i,j+1)
				indices.push(vertex_index(i, j));
				indices.push(vertex_index(i + 1, j + 1));
				indices.push(vertex_index(i, j + 1));
				// Triangle 2: (i,j), (i+1,j), (i+1,j+1)
				indices.push(vertex_index(i, j));
				indices.push(vertex_index(i + 1, j));
				indices.push(vertex_index(i + 1, j + 1));
			}
		}

		Mesh { vertices, indices }
	}
}

#[cfg(test)]
mod tests {
	use std::{fs::File, io::Write};

	use super::*;
	use crate::TileStore;

	fn write_flat_tile(dir: &std::path::Path, lat: i32, lon: i32, width: i32, height: i16) {
		let (ns, lat_mag) = if lat >= 0 { ('N', lat) } else { ('S', -lat) };
		let (we, lon_mag) = if lon >= 0 { ('E', lon) } else { ('W', -lon) };
		let name = format!("{ns}{lat_mag:02}{we}{lon_mag:03}.hgt");
		let mut f = File::create(dir.join(name)).unwrap();
		for _ in 0..width * width {
			f.write_all(&height.to_be_bytes()).unwrap();
		}
	}

	#[test]
	fn vertex_and_triangle_counts() {
		let dir = std::env::temp_dir().join(format!("geo-test-mesh-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		write_flat_tile(&dir, 0, 0, 1201, 0);

		let store = TileStore::new(&dir, 1201);
		let radius = 8;
		let mosaic = DemMosaic::build(0.5, 0.5, radius, 1200, &store).unwrap();
		let mesh = MeshBuilder::build(&mosaic);

		let n = 2 * radius;
		assert_eq!(mesh.vertices.len() as i32, n * n);
		assert_eq!(mesh.indices.len() as i32, 6 * (n - 1) * (n - 1));

		std::fs::remove_dir_all(&dir).ok();
	}

	#[test]
	fn winding_is_ccw_per_quad() {
		let dir = std::env::temp_dir().join(format!("geo-test-mesh-winding-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		write_flat_tile(&dir, 0, 0, 1201, 0);
		let store = TileStore::new(&dir, 1201);
		let mosaic = DemMosaic::build(0.5, 0.5, 4, 1200, &store).unwrap();
		let mesh = MeshBuilder::build(&mosaic);

		let n = 8u32;
		// First quad's first triangle should be (0,0),(1,1),(0,1).
		assert_eq!(mesh.indices[0], 0);
		assert_eq!(mesh.indices[1], n + 1);
		assert_eq!(mesh.indices[2], n);

		std::fs::remove_dir_all(&dir).ok();
	}
}
