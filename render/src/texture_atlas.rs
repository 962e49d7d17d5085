use std::path::{Path, PathBuf};

use wgpu::{
	Device,
	Extent3d,
	Queue,
	Sampler,
	SamplerDescriptor,
	Texture,
	TextureDescriptor,
	TextureDimension,
	TextureFormat,
	TextureUsages,
	TextureView,
	TextureViewDescriptor,
};

use crate::Error;

const TILE_PX: u32 = 256;

/// Linear/quadratic coefficients mapping (lon, lat) in degrees/radians to
/// atlas-space UV, avoiding a transcendental Mercator evaluation per
/// fragment. `lat` here is the delta from the viewer latitude the
/// coefficients were built around.
#[derive(Copy, Clone, Debug, Default)]
pub struct TextureMapCoeffs {
	pub lon0: f32,
	pub lon1: f32,
	pub dlat0: f32,
	pub dlat1: f32,
	pub dlat2: f32,
}

/// Builds a single atlas texture from the rectangular array of XYZ slippy
/// tiles covering a DEM footprint, plus the coefficients the fragment
/// shader needs to map a vertex's (lon, lat) to atlas UV without calling a
/// transcendental per pixel.
///
/// Built once for one fixed render footprint: there's no eviction, just an
/// upload loop over a bounded tile rectangle via `queue.write_texture`.
pub struct TextureAtlas {
	texture: Texture,
	view: TextureView,
	sampler: Sampler,
	coeffs: TextureMapCoeffs,
}

impl TextureAtlas {
	/// `tiles_dir` holds `{zoom}/{x}/{y}.png` files. `bounds_deg` is
	/// `(lat0, lon0, lat1, lon1)` as returned by `geo::DemMosaic::bounds_deg`.
	/// `viewer_lat_rad` is the center the quadratic latitude expansion is
	/// built around.
	pub fn build(
		device: &Device, queue: &Queue, tiles_dir: &Path, zoom: u32, bounds_deg: (f64, f64, f64, f64),
		viewer_lat_rad: f64,
	) -> Result<Self, Error> {
		tracy::zone!("Build Texture Atlas");

		let (lat0, lon0, lat1, lon1) = bounds_deg;
		let n = (1u32 << zoom) as f64;

		let tile_x = |lon_deg: f64| -> i64 { ((lon_deg + 180.0) / 360.0 * n).floor() as i64 };
		let tile_y = |lat_deg: f64| -> i64 { (mercator_y_frac(lat_deg.to_radians(), n)).floor() as i64 };

		let x0 = tile_x(lon0);
		let x1 = tile_x(lon1);
		let y0 = tile_y(lat1); // larger lat -> smaller tile y
		let y1 = tile_y(lat0);

		let tiles_x = (x1 - x0 + 1).max(1) as u32;
		let tiles_y = (y1 - y0 + 1).max(1) as u32;

		let width = tiles_x * TILE_PX;
		let height = tiles_y * TILE_PX;
		let limits = device.limits();
		if width > limits.max_texture_dimension_2d || height > limits.max_texture_dimension_2d {
			return Err(Error::Device("texture atlas exceeds device texture size limit".into()));
		}

		let texture = device.create_texture(&TextureDescriptor {
			label: Some("Terrain Texture Atlas"),
			size: Extent3d {
				width,
				height,
				depth_or_array_layers: 1,
			},
			mip_level_count: 1,
			sample_count: 1,
			dimension: TextureDimension::D2,
			format: TextureFormat::Rgba8UnormSrgb,
			usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
		});

		for ty in 0..tiles_y as i64 {
			for tx in 0..tiles_x as i64 {
				let path = tile_path(tiles_dir, zoom, (x0 + tx) as i64, (y0 + ty) as i64);
				match load_tile_rgba(&path) {
					Some(rgba) => upload_tile(queue, &texture, tx as u32 * TILE_PX, ty as u32 * TILE_PX, &rgba),
					None => log::warn!("texture tile '{}' missing, leaving atlas region blank", path.display()),
				}
			}
		}

		let view = texture.create_view(&TextureViewDescriptor {
			label: Some("Terrain Texture Atlas View"),
			..Default::default()
		});
		let sampler = device.create_sampler(&SamplerDescriptor {
			label: Some("Terrain Texture Atlas Sampler"),
			..Default::default()
		});

		let coeffs = texture_map_coeffs(n, x0, y0, tiles_x, tiles_y, viewer_lat_rad);

		Ok(Self {
			texture,
			view,
			sampler,
			coeffs,
		})
	}

	pub fn view(&self) -> &TextureView { &self.view }

	pub fn sampler(&self) -> &Sampler { &self.sampler }

	pub fn coeffs(&self) -> TextureMapCoeffs { self.coeffs }
}

fn tile_path(dir: &Path, zoom: u32, x: i64, y: i64) -> PathBuf { dir.join(zoom.to_string()).join(x.to_string()).join(format!("{y}.png")) }

fn load_tile_rgba(path: &Path) -> Option<Vec<u8>> {
	let file = std::fs::File::open(path).ok()?;
	let decoder = png::Decoder::new(file);
	let mut reader = decoder.read_info().ok()?;
	let mut buf = vec![0u8; reader.output_buffer_size()];
	let info = reader.next_frame(&mut buf).ok()?;
	buf.truncate(info.buffer_size());

	Some(match info.color_type {
		png::ColorType::Rgba => buf,
		png::ColorType::Rgb => buf.chunks_exact(3).flat_map(|c| [c[0], c[1], c[2], 255]).collect(),
		png::ColorType::Grayscale => buf.iter().flat_map(|&g| [g, g, g, 255]).collect(),
		_ => return None,
	})
}

fn upload_tile(queue: &Queue, texture: &Texture, x: u32, y: u32, rgba: &[u8]) {
	queue.write_texture(
		wgpu::ImageCopyTexture {
			texture,
			mip_level: 0,
			origin: wgpu::Origin3d { x, y, z: 0 },
			aspect: wgpu::TextureAspect::All,
		},
		rgba,
		wgpu::ImageDataLayout {
			offset: 0,
			bytes_per_row: std::num::NonZeroU32::new(4 * TILE_PX),
			rows_per_image: std::num::NonZeroU32::new(TILE_PX),
		},
		Extent3d {
			width: TILE_PX,
			height: TILE_PX,
			depth_or_array_layers: 1,
		},
	);
}

/// Fractional Mercator tile-y at zoom level with `2^zoom` tiles per side.
fn mercator_y_frac(lat_rad: f64, n: f64) -> f64 {
	(1.0 - ((lat_rad.tan() + 1.0 / lat_rad.cos()).ln()) / std::f64::consts::PI) / 2.0 * n
}

/// Builds the linear longitude and quadratic (around `viewer_lat_rad`)
/// latitude coefficients the fragment shader uses to map a vertex's
/// (lon_deg, lat_rad - viewer_lat_rad) to atlas-normalized UV, without
/// evaluating `tan`/`ln` per fragment.
fn texture_map_coeffs(n: f64, origin_tile_x: i64, origin_tile_y: i64, tiles_x: u32, tiles_y: u32, lat_center_rad: f64) -> TextureMapCoeffs {
	let inv_tiles_x = 1.0 / tiles_x as f64;
	let inv_tiles_y = 1.0 / tiles_y as f64;

	// x_tile_frac(lon_deg) = (lon_deg + 180) / 360 * n -- already linear.
	let lon1 = (n / 360.0) * inv_tiles_x;
	let lon0 = ((n / 2.0) - origin_tile_x as f64) * inv_tiles_x;

	// y_tile_frac(lat) Taylor-expanded around lat_center: k = -n/(2*pi).
	let k = -n / (2.0 * std::f64::consts::PI);
	let c = lat_center_rad.cos();
	let t = lat_center_rad.tan();
	let y_center = mercator_y_frac(lat_center_rad, n);

	let dlat0 = (y_center - origin_tile_y as f64) * inv_tiles_y;
	let dlat1 = (k / c) * inv_tiles_y;
	let dlat2 = (0.5 * k * t / c) * inv_tiles_y;

	TextureMapCoeffs {
		lon0: lon0 as f32,
		lon1: lon1 as f32,
		dlat0: dlat0 as f32,
		dlat1: dlat1 as f32,
		dlat2: dlat2 as f32,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn quadratic_expansion_matches_numeric_derivative_near_center() {
		let n = (1u32 << 12) as f64;
		let lat_center = 34.0f64.to_radians();
		let coeffs = texture_map_coeffs(n, 0, 0, 1, 1, lat_center);

		let h = 1e-5;
		let y_plus = mercator_y_frac(lat_center + h, n);
		let y_minus = mercator_y_frac(lat_center - h, n);
		let numeric_slope = (y_plus - y_minus) / (2.0 * h);

		assert!((coeffs.dlat1 as f64 - numeric_slope).abs() < 1e-2, "{} vs {}", coeffs.dlat1, numeric_slope);
	}
}
