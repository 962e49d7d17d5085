use crate::{projection::Camera, GeoProjection, EARTH_RADIUS_M};

/// A named geographic point of interest and its per-frame render state.
#[derive(Clone, Debug)]
pub struct Poi {
	pub name: String,
	pub lat_rad: f64,
	pub lon_rad: f64,
	pub elevation_m: f64,

	/// Pixel x of the crosshair. Meaningless unless `active`.
	pub draw_x: i32,
	/// Pixel y of the crosshair (the occlusion-resolved terrain hit), not the
	/// label text.
	pub draw_y: i32,
	/// Pixel y of the label text, assigned by `LabelLayout`.
	pub label_y: i32,
	/// Whether this POI survived distance filtering and occlusion testing
	/// this frame.
	pub active: bool,
}

impl Poi {
	pub fn new(name: impl Into<String>, lat_rad: f64, lon_rad: f64, elevation_m: f64) -> Self {
		Self {
			name: name.into(),
			lat_rad,
			lon_rad,
			elevation_m,
			draw_x: -1,
			draw_y: -1,
			label_y: -1,
			active: false,
		}
	}
}

#[derive(Copy, Clone, Debug)]
pub struct PoiProjectorOptions {
	pub min_marker_m: f64,
	pub max_marker_m: f64,
	/// Half-width, in pixels, of the vertical occlusion search window.
	pub fuzz_px: i32,
	/// Maximum acceptable absolute error between expected and observed
	/// normalized depth for a POI to be considered visible.
	pub occlusion_tol: f64,
}

impl Default for PoiProjectorOptions {
	fn default() -> Self {
		Self {
			min_marker_m: 50.0,
			max_marker_m: 35_000.0,
			fuzz_px: 4,
			occlusion_tol: 0.04,
		}
	}
}

/// Projects points of interest through the camera and rejects ones that are
/// out of marker range or occluded by the rendered terrain.
pub struct PoiProjector;

impl PoiProjector {
	/// `depth` is the rendered normalized depth buffer, row-major, top row
	/// first, `width * height` entries, matching `Renderer::read_ranges`'
	/// layout before its range conversion.
	pub fn project(
		camera: &Camera, pois: &mut [Poi], width: u32, height: u32, depth: &[f32], options: &PoiProjectorOptions,
	) {
		tracy::zone!("Project POIs");

		for poi in pois.iter_mut() {
			poi.active = false;

			let arc_sq = activation_arc_sq(camera.lat_v_rad, camera.lon_v_rad, poi.lat_rad, poi.lon_rad);
			if arc_sq < options.min_marker_m * options.min_marker_m || arc_sq > options.max_marker_m * options.max_marker_m
			{
				continue;
			}

			let projected = GeoProjection::forward(camera, poi.lat_rad, poi.lon_rad, poi.elevation_m);
			let (x_px, y_px) = GeoProjection::ndc_to_pixel(projected.az_ndc, projected.el_ndc, width, height);
			let draw_x = x_px.round() as i32;
			if draw_x < 0 || draw_x >= width as i32 {
				continue;
			}
			let draw_y_center = y_px.round() as i32;

			let Some((fuzz, _err)) =
				best_occlusion_fuzz(draw_x, draw_y_center, width, height, depth, projected.depth as f32, options)
			else {
				continue;
			};

			poi.draw_x = draw_x;
			poi.draw_y = draw_y_center + fuzz;
			poi.active = true;
		}
	}
}

/// Tangent-plane approximation of great-circle arc length squared, in
/// meters squared, between the viewer and a POI.
///
/// `cos²(lat_v)·cos²(lat_poi)` — not `cos²(lon)` — both factors are
/// latitude cosines.
fn activation_arc_sq(lat_v_rad: f64, lon_v_rad: f64, lat_poi_rad: f64, lon_poi_rad: f64) -> f64 {
	let dlat = lat_poi_rad - lat_v_rad;
	let dlon = lon_poi_rad - lon_v_rad;
	let cos_lat_v_sq = lat_v_rad.cos() * lat_v_rad.cos();
	let cos_lat_poi_sq = lat_poi_rad.cos() * lat_poi_rad.cos();
	EARTH_RADIUS_M * EARTH_RADIUS_M * (dlon * dlon * cos_lat_v_sq * cos_lat_poi_sq + dlat * dlat)
}

/// Scans the depth buffer vertically around `draw_y +- fuzz_px` for the
/// fuzz offset whose observed depth is closest to `expected_depth`,
/// stopping early once the error starts increasing (the scan moves
/// monotonically closer before it moves away). Returns `None` if no in-range
/// fuzz comes within `occlusion_tol`.
fn best_occlusion_fuzz(
	draw_x: i32, draw_y: i32, width: u32, height: u32, depth: &[f32], expected_depth: f32, options: &PoiProjectorOptions,
) -> Option<(i32, f32)> {
	let mut best: Option<(i32, f32)> = None;
	let mut last_depth: Option<f32> = None;

	for fuzz in -options.fuzz_px..options.fuzz_px {
		let y = draw_y + fuzz;
		if y < 0 || y >= height as i32 {
			continue;
		}

		let observed = depth[(draw_x as u32 + y as u32 * width) as usize];
		if Some(observed) == last_depth {
			continue;
		}
		last_depth = Some(observed);

		let err = (expected_depth - observed).abs();
		match best {
			Some((_, best_err)) if err >= best_err => break,
			_ => best = Some((fuzz, err)),
		}
	}

	best.filter(|&(_, err)| err <= options.occlusion_tol as f32)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn camera() -> Camera {
		Camera {
			lat_v_rad: 34.0f64.to_radians(),
			lon_v_rad: (-118.0f64).to_radians(),
			z_v_m: 500.0,
			az0_rad: (-10.0f64).to_radians(),
			az1_rad: 10.0f64.to_radians(),
			aspect: 1.0,
			z_near: 10.0,
			z_far: 40_000.0,
		}
	}

	#[test]
	fn activation_is_symmetric_under_lon_sign_reflection() {
		let lat_v = 34.0f64.to_radians();
		let lon_v = 0.0;
		let lat_poi = 34.01f64.to_radians();
		let a = activation_arc_sq(lat_v, lon_v, lat_poi, 0.01f64.to_radians());
		let b = activation_arc_sq(lat_v, lon_v, lat_poi, -0.01f64.to_radians());
		assert!((a - b).abs() < 1e-6);
	}

	#[test]
	fn activation_bounded_by_distance_window() {
		let opts = PoiProjectorOptions::default();
		let lat_v = 0.0;
		let lon_v = 0.0;

		// ~5m away: below min_marker_m.
		let too_close = activation_arc_sq(lat_v, lon_v, 0.0, 5.0 / EARTH_RADIUS_M);
		assert!(too_close < opts.min_marker_m * opts.min_marker_m);

		// ~100km away: above max_marker_m.
		let too_far = activation_arc_sq(lat_v, lon_v, 0.0, 100_000.0 / EARTH_RADIUS_M);
		assert!(too_far > opts.max_marker_m * opts.max_marker_m);
	}

	#[test]
	fn farther_collinear_poi_occluded_by_nearer_higher_one() {
		let cam = camera();
		let opts = PoiProjectorOptions::default();
		let width = 400u32;
		let height = 400u32;

		let mut pois = vec![
			Poi::new("near-high", cam.lat_v_rad + 500.0 / EARTH_RADIUS_M, cam.lon_v_rad, cam.z_v_m + 600.0),
			Poi::new("far-low", cam.lat_v_rad + 2000.0 / EARTH_RADIUS_M, cam.lon_v_rad, cam.z_v_m + 50.0),
		];

		// Build a depth buffer whose terrain surface matches exactly the near,
		// higher POI (so it reads as visible) and is in front of where the far
		// POI would project (so the far one reads as occluded).
		let near_proj = GeoProjection::forward(&cam, pois[0].lat_rad, pois[0].lon_rad, pois[0].elevation_m);
		let (near_x, near_y) = GeoProjection::ndc_to_pixel(near_proj.az_ndc, near_proj.el_ndc, width, height);

		let mut depth = vec![1.0f32; (width * height) as usize];
		let nx = near_x.round() as i32;
		let ny = near_y.round() as i32;
		for y in (ny - 5).max(0)..(ny + 5).min(height as i32) {
			depth[(nx as u32 + y as u32 * width) as usize] = near_proj.depth as f32;
		}

		PoiProjector::project(&cam, &mut pois, width, height, &depth, &opts);

		assert!(pois[0].active, "expected the nearer, higher POI to be visible");
		assert!(!pois[1].active, "expected the farther, lower POI to be occluded");
	}
}
