//! CLI frontend for the horizon renderer: one viewpoint and azimuth window
//! in, a color/range image pair out.

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use futures_lite::future::block_on;
use geo::{CELLS_PER_DEG_SRTM1, CELLS_PER_DEG_SRTM3};
use render::{Renderer, RendererOptions, TextureAtlas};
use tracy::wgpu::ProfileContext;

/// Render a panoramic horizon view from a viewpoint and azimuth window.
#[derive(Parser)]
struct Options {
	/// Viewer latitude, degrees.
	lat: f64,
	/// Viewer longitude, degrees.
	lon: f64,
	/// Azimuth window start, degrees east of north.
	az0: f64,
	/// Azimuth window end, degrees east of north.
	az1: f64,

	/// Output image width, pixels.
	#[clap(long)]
	width: u32,
	/// Output image height, pixels.
	#[clap(long)]
	height: u32,

	/// Write the color-coded (or textured) render here, as a PNG.
	#[clap(long)]
	image: Option<PathBuf>,
	/// Write the per-pixel range map here, as little-endian f32, row-major,
	/// top row first; sky pixels are -1.0.
	#[clap(long)]
	ranges: Option<PathBuf>,

	/// Render radius, in DEM cells.
	#[clap(long, default_value_t = 1000)]
	radius: i32,

	/// Sample an aerial-photo slippy-map atlas instead of range-coloring.
	#[clap(long)]
	texture: bool,
	/// Use 1-arcsecond SRTM tiles (3601x3601) instead of 3-arcsecond (1201x1201).
	#[clap(long)]
	srtm1: bool,
	/// Fetch missing slippy-map tiles from a remote server instead of
	/// leaving that atlas region blank. Not implemented by this binary;
	/// tile fetching is a separate, out-of-scope collaborator.
	#[clap(long)]
	allow_tile_downloads: bool,

	#[clap(long, default_value_t = 10.0)]
	znear: f64,
	#[clap(long, default_value_t = 40_000.0)]
	zfar: f64,
	#[clap(long, default_value_t = 10.0)]
	znear_color: f64,
	#[clap(long, default_value_t = 40_000.0)]
	zfar_color: f64,

	/// Directory of `.hgt` height tile files.
	#[clap(long)]
	dir_dems: PathBuf,
	/// Directory of `{zoom}/{x}/{y}.png` slippy-map tile files. Required
	/// when `--texture` is passed.
	#[clap(long)]
	dir_tiles: Option<PathBuf>,
}

/// Fixed zoom level for the slippy-map texture atlas: a reasonable middle
/// ground between legible aerial detail and atlas texture size for the
/// render radii this binary is meant for.
const ATLAS_ZOOM: u32 = 13;

fn main() -> ExitCode {
	env_logger::init();

	let options = match Options::try_parse() {
		Ok(o) => o,
		Err(e) => {
			eprintln!("{}", e);
			return ExitCode::from(1);
		},
	};

	match run(options) {
		Ok(()) => ExitCode::from(0),
		Err(e) => {
			eprintln!("error: {}", e);
			ExitCode::from(1)
		},
	}
}

fn run(options: Options) -> Result<(), Box<dyn std::error::Error>> {
	if options.texture && options.dir_tiles.is_none() {
		return Err("--texture requires --dir-tiles".into());
	}

	let instance = wgpu::Instance::new(wgpu::Backends::all());
	let adapter = block_on(instance.request_adapter(&Default::default())).ok_or("no suitable graphics adapter found")?;
	let timestamp_query = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);

	let (device, queue) = block_on(adapter.request_device(
		&wgpu::DeviceDescriptor {
			label: Some("geoc Device"),
			features: if timestamp_query { wgpu::Features::TIMESTAMP_QUERY } else { wgpu::Features::empty() },
			limits: Default::default(),
		},
		None,
	))?;

	let mut profiler = ProfileContext::with_enabled_and_name("GPU", &adapter, &device, &queue, 1, timestamp_query);

	let cells_per_deg = if options.srtm1 { CELLS_PER_DEG_SRTM1 } else { CELLS_PER_DEG_SRTM3 };

	let mut renderer = Renderer::new(&device, RendererOptions {
		dem_dir: options.dir_dems,
		cells_per_deg,
		radius_cells: options.radius,
		width: options.width,
		height: options.height,
	})?;

	renderer.set_viewer(&device, &queue, options.lat, options.lon)?;
	renderer.set_azimuth_window(options.az0, options.az1)?;
	renderer.set_zextents(options.znear, options.zfar, options.znear_color, options.zfar_color)?;

	// Kept alive until after submission: the bind group created by
	// `set_texture` below borrows its view, so dropping it early would
	// invalidate an in-flight render pass.
	let _atlas = if options.texture {
		let bounds = renderer.bounds_deg().ok_or("render produced no mosaic bounds")?;
		let tiles_dir = options.dir_tiles.as_ref().expect("checked above");
		let atlas = TextureAtlas::build(&device, &queue, tiles_dir, ATLAS_ZOOM, bounds, options.lat.to_radians())?;
		renderer.set_texture(&device, Some(&atlas));
		Some(atlas)
	} else {
		None
	};

	let mut encoder = tracy::wgpu_command_encoder!(device, profiler, Default::default());
	renderer.redraw(&device, &queue, &mut encoder)?;
	queue.submit([encoder.finish()]);
	let _ = queue.on_submitted_work_done();
	device.poll(wgpu::Maintain::Wait);

	if let Some(path) = options.image {
		let rgb = renderer.read_image(&device, &queue)?;
		write_png(&path, options.width, options.height, &rgb)?;
	}

	if let Some(path) = options.ranges {
		let ranges = renderer.read_ranges(&device, &queue)?;
		let mut bytes = Vec::with_capacity(ranges.len() * 4);
		for r in ranges {
			bytes.extend_from_slice(&r.to_le_bytes());
		}
		std::fs::write(&path, bytes)?;
	}

	Ok(())
}

fn write_png(path: &std::path::Path, width: u32, height: u32, rgb: &[u8]) -> Result<(), Box<dyn std::error::Error>> {
	let file = std::fs::File::create(path)?;
	let mut encoder = png::Encoder::new(file, width, height);
	encoder.set_color(png::ColorType::Rgb);
	encoder.set_depth(png::BitDepth::Eight);
	let mut writer = encoder.write_header()?;
	writer.write_image_data(rgb)?;
	Ok(())
}
