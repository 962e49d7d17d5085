use crate::EARTH_RADIUS_M;

/// Viewer state and camera window shared by forward projection and pick.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
	pub lat_v_rad: f64,
	pub lon_v_rad: f64,
	/// Viewer elevation, meters, including any configured lift (see
	/// `Renderer::set_viewer`).
	pub z_v_m: f64,
	/// Azimuth window, radians, east-of-north. `az0 < az1`.
	pub az0_rad: f64,
	pub az1_rad: f64,
	/// Viewport aspect ratio, `width / height`.
	pub aspect: f64,
	pub z_near: f64,
	pub z_far: f64,
}

/// Result of projecting a single geographic point through the camera.
#[derive(Copy, Clone, Debug)]
pub struct ProjectedPoint {
	/// Normalized device x, in `[-1, 1]` when inside the azimuth window.
	pub az_ndc: f64,
	/// Normalized device y, in `[-1, 1]` when inside the vertical window.
	pub el_ndc: f64,
	/// Normalized depth in `[0, 1]`, clamped; `1.0` means at or beyond the
	/// far plane (sky).
	pub depth: f64,
	/// Slant range in the local east/north tangent plane, meters (not
	/// clamped — used internally and by the occlusion probe).
	pub len_en: f64,
}

/// The panoramic equirectangular-ish forward/inverse projection: the math
/// shared by the mesh vertex shader and the point-of-interest projector.
pub struct GeoProjection;

impl GeoProjection {
	/// Projects a point at `(lat_rad, lon_rad, z_m)` into the camera's
	/// normalized device space.
	pub fn forward(camera: &Camera, lat_rad: f64, lon_rad: f64, z_m: f64) -> ProjectedPoint {
		let dlat = lat_rad - camera.lat_v_rad;
		let dlon = lon_rad - camera.lon_v_rad;

		let sin_dlat = dlat.sin();
		let cos_dlat = dlat.cos();
		let sin_dlon = dlon.sin();
		let cos_dlon = dlon.cos();

		let sin_lat = lat_rad.sin();
		let cos_lat = lat_rad.cos();
		let sin_lat_v = camera.lat_v_rad.sin();
		let cos_lat_v = camera.lat_v_rad.cos();

		let east = cos_lat * sin_dlon;
		let north = sin_dlat * cos_dlon + sin_lat * cos_lat_v * (1.0 - cos_dlon);

		// Refactored to avoid a large-minus-large cancellation when z_m and
		// camera.z_v_m are both small relative to Earth's radius: subtract the
		// R_e terms analytically instead of forming (R_e+z) and subtracting
		// (R_e+z_v) afterwards.
		let height = z_m * (cos_dlat * cos_dlon + sin_lat * sin_lat_v * (1.0 - cos_dlon))
			+ EARTH_RADIUS_M * (cos_dlat * cos_dlon - 1.0 + sin_lat * sin_lat_v * (1.0 - cos_dlon))
			- camera.z_v_m;

		let len_en = (EARTH_RADIUS_M + z_m) * (east * east + north * north).sqrt();

		let az = east.atan2(north);
		let az_window = camera.az1_rad - camera.az0_rad;
		let az_ndc = 2.0 * (az - (camera.az0_rad + camera.az1_rad) / 2.0) / az_window;
		let el_ndc = height.atan2(len_en) * 2.0 * camera.aspect / az_window;

		let depth = ((len_en - camera.z_near) / (camera.z_far - camera.z_near)).clamp(0.0, 1.0);

		ProjectedPoint {
			az_ndc,
			el_ndc,
			depth,
			len_en,
		}
	}

	/// Converts normalized device `(az_ndc, el_ndc)` to a pixel `(x, y)` in a
	/// `width x height` raster, top row first.
	pub fn ndc_to_pixel(az_ndc: f64, el_ndc: f64, width: u32, height: u32) -> (f64, f64) {
		let x = ((az_ndc + 1.0) / 2.0) * width as f64 - 0.5;
		let y = ((1.0 - el_ndc) / 2.0) * height as f64 - 0.5;
		(x, y)
	}

	/// Reverse projection: given a pixel `(x_px, y_px)` in a `width`-wide
	/// raster and its normalized depth reading, recovers `(lat_rad,
	/// lon_rad)`. Returns `None` when `depth >= 1.0` (sky, no terrain hit).
	pub fn pick(camera: &Camera, x_px: f64, width: u32, depth: f64) -> Option<(f64, f64)> {
		if depth >= 1.0 {
			return None;
		}

		let len_en = depth * (camera.z_far - camera.z_near) + camera.z_near;
		let az_ndc = (x_px + 0.5) * 2.0 / width as f64 - 1.0;
		let az = az_ndc * (camera.az1_rad - camera.az0_rad) / 2.0 + (camera.az0_rad + camera.az1_rad) / 2.0;

		let east = len_en * az.sin();
		let north = len_en * az.cos();

		let lon = camera.lon_v_rad + east / (EARTH_RADIUS_M * camera.lat_v_rad.cos());
		let lat = camera.lat_v_rad + north / EARTH_RADIUS_M;

		Some((lat, lon))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn camera() -> Camera {
		Camera {
			lat_v_rad: 34.0f64.to_radians(),
			lon_v_rad: (-118.0f64).to_radians(),
			z_v_m: 101.0,
			az0_rad: (-10.0f64).to_radians(),
			az1_rad: 10.0f64.to_radians(),
			aspect: 1.0,
			z_near: 10.0,
			z_far: 40_000.0,
		}
	}

	#[test]
	fn depth_is_monotone_in_range() {
		let cam = camera();
		let p0 = GeoProjection::forward(&cam, cam.lat_v_rad + 0.0005, cam.lon_v_rad, 100.0);
		let p1 = GeoProjection::forward(&cam, cam.lat_v_rad + 0.002, cam.lon_v_rad, 100.0);
		assert!(p1.len_en > p0.len_en);
		assert!(p1.depth > p0.depth);
	}

	#[test]
	fn pick_is_none_at_sky() {
		let cam = camera();
		assert_eq!(GeoProjection::pick(&cam, 50.0, 100, 1.0), None);
	}

	#[test]
	fn round_trip_forward_then_pick() {
		let cam = camera();
		// A point a few hundred meters north of the viewer, at the viewer's
		// elevation plus a bit (so it's above rather than coincident).
		let target_lat = cam.lat_v_rad + (300.0 / EARTH_RADIUS_M);
		let target_lon = cam.lon_v_rad;
		let projected = GeoProjection::forward(&cam, target_lat, target_lon, 150.0);
		assert!(projected.depth < 1.0, "target should not be beyond the far plane");

		let width = 400u32;
		let (x_px, _) = GeoProjection::ndc_to_pixel(projected.az_ndc, projected.el_ndc, width, width);
		let (lat, lon) = GeoProjection::pick(&cam, x_px, width, projected.depth).expect("not sky");

		let dlat_m = (lat - target_lat) * EARTH_RADIUS_M;
		let dlon_m = (lon - target_lon) * EARTH_RADIUS_M * cam.lat_v_rad.cos();
		assert!(dlat_m.abs() < 1.0, "lat off by {dlat_m}m");
		assert!(dlon_m.abs() < 1.0, "lon off by {dlon_m}m");
	}
}
