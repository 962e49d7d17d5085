use std::{error::Error, num::NonZeroUsize, path::PathBuf, sync::Mutex};

use dashmap::DashMap;
use futures_lite::future::block_on;
use geo::{CELLS_PER_DEG_SRTM1, CELLS_PER_DEG_SRTM3};
use png::{BitDepth, ColorType, Encoder};
use render::{Renderer, RendererOptions};
use rouille::{try_or_400::ErrJson, Request, Response};
use tracy::wgpu::ProfileContext;
use url::Url;

struct RenderData {
	renderer: Renderer,
	res: (u32, u32),
}

impl RenderData {
	fn new(device: &wgpu::Device, dem_dir: PathBuf, cells_per_deg: i32, radius_cells: i32, width: u32, height: u32) -> Self {
		let renderer = Renderer::new(device, RendererOptions {
			dem_dir,
			cells_per_deg,
			radius_cells,
			width,
			height,
		})
		.unwrap();

		Self {
			renderer,
			res: (width, height),
		}
	}
}

fn main() {
	let dem_dir = PathBuf::from(std::env::args().nth(1).unwrap_or_else(|| {
		println!("Usage: {} <dem-dir>", std::env::args().nth(0).unwrap());
		std::process::exit(1);
	}));

	let instance = wgpu::Instance::new(wgpu::Backends::all());
	let adapter = block_on(instance.request_adapter(&Default::default())).unwrap();

	let timestamp_query = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);

	let (device, queue) = block_on(adapter.request_device(
		&wgpu::DeviceDescriptor {
			label: Some("Device"),
			features: if timestamp_query {
				wgpu::Features::TIMESTAMP_QUERY
			} else {
				wgpu::Features::empty()
			},
			limits: Default::default(),
		},
		None,
	))
	.unwrap();

	let profiler = Mutex::new(ProfileContext::with_enabled_and_name(
		"GPU",
		&adapter,
		&device,
		&queue,
		1,
		timestamp_query,
	));
	let id_to_renderer: DashMap<u32, RenderData> = DashMap::new();

	rouille::start_server_with_pool(
		"0.0.0.0:42069",
		std::thread::available_parallelism().ok().map(NonZeroUsize::get),
		move |req| match (|req: &Request| -> Result<_, Box<dyn Error>> {
			let url = Url::parse(&format!("http://127.0.0.1{}", req.raw_url()))?;

			if url.path() != "/horizon.png" {
				return Ok(Response::empty_404());
			}

			let mut id = 0;
			let mut res = (0u32, 0u32);
			let mut lat = 0.0;
			let mut lon = 0.0;
			let mut az0 = -90.0;
			let mut az1 = 90.0;
			let mut radius = 1000;
			let mut srtm1 = false;
			let mut znear = 10.0;
			let mut zfar = 40_000.0;
			let mut znear_color = 10.0;
			let mut zfar_color = 40_000.0;
			for (key, val) in url.query_pairs() {
				match key.as_ref() {
					"id" => id = val.parse::<u32>()?,
					"res" => {
						let mut split = val.split(',');
						res.0 = split.next().ok_or("missing res x")?.parse()?;
						res.1 = split.next().ok_or("missing res y")?.parse()?;
					},
					"lat" => lat = val.parse()?,
					"lon" => lon = val.parse()?,
					"az0" => az0 = val.parse()?,
					"az1" => az1 = val.parse()?,
					"radius" => radius = val.parse()?,
					"srtm1" => srtm1 = val.parse()?,
					"znear" => znear = val.parse()?,
					"zfar" => zfar = val.parse()?,
					"znear_color" => znear_color = val.parse()?,
					"zfar_color" => zfar_color = val.parse()?,
					_ => return Err(From::from("unknown query param")),
				}
			}

			let cells_per_deg = if srtm1 { CELLS_PER_DEG_SRTM1 } else { CELLS_PER_DEG_SRTM3 };

			let mut entry = if let Some(entry) = id_to_renderer.get_mut(&id) {
				if entry.res != res {
					*entry = RenderData::new(&device, dem_dir.clone(), cells_per_deg, radius, res.0, res.1);
				}
				entry
			} else {
				id_to_renderer.insert(id, RenderData::new(&device, dem_dir.clone(), cells_per_deg, radius, res.0, res.1));
				id_to_renderer.get_mut(&id).unwrap()
			};

			entry.renderer.set_viewer(&device, &queue, lat, lon)?;
			entry.renderer.set_azimuth_window(az0, az1)?;
			entry.renderer.set_zextents(znear, zfar, znear_color, zfar_color)?;

			{
				let mut profiler = profiler.lock().unwrap();
				let mut encoder = tracy::wgpu_command_encoder!(device, profiler, Default::default());
				entry.renderer.redraw(&device, &queue, &mut encoder)?;
				queue.submit([encoder.finish()]);
				let _ = queue.on_submitted_work_done();
				device.poll(wgpu::Maintain::Wait);
			}

			let rgb = entry.renderer.read_image(&device, &queue)?;

			let mut out: Vec<u8> = Vec::new();
			let mut encoder = Encoder::new(&mut out, res.0, res.1);
			encoder.set_color(ColorType::Rgb);
			encoder.set_depth(BitDepth::Eight);
			let mut enc = encoder.write_header()?;
			enc.write_image_data(&rgb)?;
			enc.finish()?;

			Ok(Response::from_data("image/png", out))
		})(req)
		{
			Ok(x) => x,
			Err(e) => Response::json(&ErrJson::from_err(&*e)).with_status_code(400),
		},
	);
}
