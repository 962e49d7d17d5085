//! The wgpu-backed horizon render pipeline: mesh upload, the projection
//! shader, render-target ownership, and image/range readback.

use std::{num::NonZeroU32, path::PathBuf};

use geo::{Camera, DemMosaic, GeoProjection, MeshBuilder, TileStore};
use tracy::wgpu::EncoderProfiler;
use wgpu::{
	include_wgsl,
	BindGroup,
	BindGroupDescriptor,
	BindGroupEntry,
	BindGroupLayout,
	BindGroupLayoutDescriptor,
	BindGroupLayoutEntry,
	BindingResource,
	BindingType,
	Buffer,
	BufferBindingType,
	BufferDescriptor,
	BufferUsages,
	Color,
	ColorTargetState,
	CompareFunction,
	DepthBiasState,
	DepthStencilState,
	Device,
	Extent3d,
	FragmentState,
	LoadOp,
	MultisampleState,
	Operations,
	PipelineLayoutDescriptor,
	PrimitiveState,
	Queue,
	RenderPassColorAttachment,
	RenderPassDepthStencilAttachment,
	RenderPassDescriptor,
	RenderPipeline,
	RenderPipelineDescriptor,
	SamplerBindingType,
	ShaderStages,
	StencilState,
	Texture,
	TextureAspect,
	TextureDescriptor,
	TextureDimension,
	TextureFormat,
	TextureSampleType,
	TextureUsages,
	TextureView,
	TextureViewDescriptor,
	TextureViewDimension,
	VertexAttribute,
	VertexBufferLayout,
	VertexFormat,
	VertexState,
	VertexStepMode,
};

mod error;
pub mod range;
mod texture_atlas;

pub use error::Error;
pub use texture_atlas::TextureAtlas;

/// The one-time setup the renderer needs: where tiles and, optionally,
/// slippy-map texture tiles live, the SRTM resolution, the render radius,
/// and the offscreen target size.
pub struct RendererOptions {
	pub dem_dir: PathBuf,
	pub cells_per_deg: i32,
	pub radius_cells: i32,
	pub width: u32,
	pub height: u32,
}

/// Mirrors `geo::Vertex` with explicit padding so its layout matches a
/// 16-bit-aligned GPU vertex attribute (`Sint16x4`); the fourth component is
/// unused in the shader.
#[repr(C)]
#[derive(Copy, Clone)]
struct GpuVertex {
	i: i16,
	j: i16,
	height_m: i16,
	_pad: i16,
}

impl From<geo::Vertex> for GpuVertex {
	fn from(v: geo::Vertex) -> Self {
		Self {
			i: v.i,
			j: v.j,
			height_m: v.height_m,
			_pad: 0,
		}
	}
}

/// Owns the uniform buffer's worth of per-frame camera state.
#[derive(Copy, Clone, Debug)]
struct CameraState {
	lat_v_rad: f64,
	lon_v_rad: f64,
	z_v_m: f64,
	az0_rad: f64,
	az1_rad: f64,
	z_near: f64,
	z_far: f64,
	z_near_color: f64,
	z_far_color: f64,
}

impl Default for CameraState {
	fn default() -> Self {
		Self {
			lat_v_rad: 0.0,
			lon_v_rad: 0.0,
			z_v_m: 0.0,
			az0_rad: -std::f64::consts::FRAC_PI_2,
			az1_rad: std::f64::consts::FRAC_PI_2,
			z_near: 10.0,
			z_far: 40_000.0,
			z_near_color: 10.0,
			z_far_color: 40_000.0,
		}
	}
}

/// Owns the render target (color + a parallel normalized-depth target +
/// real depth-stencil for occlusion) and drives the indexed mesh draw
/// implementing the panoramic projection.
///
/// Frame ordering follows `set_viewer -> set_azimuth_window ->
/// set_zextents -> redraw -> read_image/read_ranges`; mutating a uniform
/// after `redraw` does not retroactively affect a prior readback.
pub struct Renderer {
	options: RendererOptions,
	tile_store: TileStore,
	camera: CameraState,
	/// Arbitrary lift added to the computed viewer elevation, meters. See
	/// DESIGN.md's Open Question decision.
	viewer_lift_m: f64,
	mosaic: Option<DemMosaic>,

	vertex_buffer: Option<Buffer>,
	index_buffer: Option<Buffer>,
	index_count: u32,

	cbuffer: Buffer,
	layout: BindGroupLayout,
	pipeline: RenderPipeline,
	group: BindGroup,
	dummy_texture_view: TextureView,
	dummy_sampler: wgpu::Sampler,
	textured: bool,
	texture_coeffs: texture_atlas::TextureMapCoeffs,

	color: Texture,
	color_view: TextureView,
	depth_out: Texture,
	depth_out_view: TextureView,
	depth_stencil: Texture,
	depth_stencil_view: TextureView,
}

impl Renderer {
	const CBUFFER_SIZE: u64 = 80;
	const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;
	const DEPTH_OUT_FORMAT: TextureFormat = TextureFormat::R32Float;
	const DEPTH_STENCIL_FORMAT: TextureFormat = TextureFormat::Depth32Float;

	pub fn new(device: &Device, options: RendererOptions) -> Result<Self, Error> {
		let tile_store = TileStore::new(options.dem_dir.clone(), geo::tile_width(options.cells_per_deg));

		let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
			label: Some("Horizon Bind Group Layout"),
			entries: &[
				BindGroupLayoutEntry {
					binding: 0,
					visibility: ShaderStages::VERTEX_FRAGMENT,
					ty: BindingType::Buffer {
						ty: BufferBindingType::Uniform,
						has_dynamic_offset: false,
						min_binding_size: None,
					},
					count: None,
				},
				BindGroupLayoutEntry {
					binding: 1,
					visibility: ShaderStages::FRAGMENT,
					ty: BindingType::Texture {
						sample_type: TextureSampleType::Float { filterable: true },
						view_dimension: TextureViewDimension::D2,
						multisampled: false,
					},
					count: None,
				},
				BindGroupLayoutEntry {
					binding: 2,
					visibility: ShaderStages::FRAGMENT,
					ty: BindingType::Sampler(SamplerBindingType::Filtering),
					count: None,
				},
			],
		});

		let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
			label: Some("Horizon Render Pipeline"),
			layout: Some(&device.create_pipeline_layout(&PipelineLayoutDescriptor {
				label: Some("Horizon Pipeline Layout"),
				bind_group_layouts: &[&layout],
				push_constant_ranges: &[],
			})),
			vertex: VertexState {
				module: &device.create_shader_module(&include_wgsl!("shaders/horizon.wgsl")),
				entry_point: "vs_main",
				buffers: &[VertexBufferLayout {
					array_stride: std::mem::size_of::<GpuVertex>() as u64,
					step_mode: VertexStepMode::Vertex,
					attributes: &[VertexAttribute {
						format: VertexFormat::Sint16x4,
						offset: 0,
						shader_location: 0,
					}],
				}],
			},
			primitive: PrimitiveState::default(),
			depth_stencil: Some(DepthStencilState {
				format: Self::DEPTH_STENCIL_FORMAT,
				depth_write_enabled: true,
				depth_compare: CompareFunction::Less,
				stencil: StencilState::default(),
				bias: DepthBiasState::default(),
			}),
			multisample: MultisampleState::default(),
			fragment: Some(FragmentState {
				module: &device.create_shader_module(&include_wgsl!("shaders/horizon.wgsl")),
				entry_point: "fs_main",
				targets: &[
					ColorTargetState::from(Self::COLOR_FORMAT),
					ColorTargetState::from(Self::DEPTH_OUT_FORMAT),
				],
			}),
			multiview: None,
		});

		let cbuffer = device.create_buffer(&BufferDescriptor {
			label: Some("Horizon Uniforms"),
			size: Self::CBUFFER_SIZE,
			usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
			mapped_at_creation: false,
		});

		let dummy_texture = device.create_texture(&TextureDescriptor {
			label: Some("Dummy Atlas Texture"),
			size: Extent3d {
				width: 1,
				height: 1,
				depth_or_array_layers: 1,
			},
			mip_level_count: 1,
			sample_count: 1,
			dimension: TextureDimension::D2,
			format: TextureFormat::Rgba8UnormSrgb,
			usage: TextureUsages::TEXTURE_BINDING,
		});
		let dummy_texture_view = dummy_texture.create_view(&TextureViewDescriptor::default());
		let dummy_sampler = device.create_sampler(&wgpu::SamplerDescriptor::default());

		let group = Self::make_bind_group(device, &layout, &cbuffer, &dummy_texture_view, &dummy_sampler);

		let (color, color_view) = Self::make_color_target(device, options.width, options.height);
		let (depth_out, depth_out_view) = Self::make_depth_out_target(device, options.width, options.height);
		let (depth_stencil, depth_stencil_view) = Self::make_depth_stencil(device, options.width, options.height);

		Ok(Self {
			options,
			tile_store,
			camera: CameraState::default(),
			viewer_lift_m: 1.0,
			mosaic: None,
			vertex_buffer: None,
			index_buffer: None,
			index_count: 0,
			cbuffer,
			layout,
			pipeline,
			group,
			dummy_texture_view,
			dummy_sampler,
			textured: false,
			texture_coeffs: texture_atlas::TextureMapCoeffs::default(),
			color,
			color_view,
			depth_out,
			depth_out_view,
			depth_stencil,
			depth_stencil_view,
		})
	}

	/// Overrides the arbitrary viewer-elevation lift (default 1m).
	pub fn set_viewer_lift(&mut self, lift_m: f64) { self.viewer_lift_m = lift_m; }

	/// Rebuilds the DEM mosaic and mesh around a new viewer position,
	/// computes the viewer's elevation as the max of its four neighboring
	/// cells plus the configured lift, and uploads the new vertex/index
	/// buffers. This is the only operation that blocks on tile I/O.
	pub fn set_viewer(&mut self, device: &Device, queue: &Queue, lat_deg: f64, lon_deg: f64) -> Result<(), Error> {
		tracy::zone!("Set Viewer");

		let mosaic = DemMosaic::build(
			lat_deg,
			lon_deg,
			self.options.radius_cells,
			self.options.cells_per_deg,
			&self.tile_store,
		)?;

		let (local_i, local_j) = DemMosaic::viewer_local_cell(lat_deg, lon_deg, self.options.cells_per_deg, self.options.radius_cells);
		let i0 = local_i.floor() as i32;
		let j0 = local_j.floor() as i32;
		let neighbor_max = [(i0, j0), (i0 + 1, j0), (i0, j0 + 1), (i0 + 1, j0 + 1)]
			.into_iter()
			.map(|(i, j)| mosaic.sample(i, j))
			.max()
			.unwrap_or(0)
			.max(0);

		self.camera.z_v_m = neighbor_max as f64 + self.viewer_lift_m;
		self.camera.lat_v_rad = lat_deg.to_radians();
		self.camera.lon_v_rad = lon_deg.to_radians();

		let mesh = MeshBuilder::build(&mosaic);
		let vertices: Vec<GpuVertex> = mesh.vertices.into_iter().map(GpuVertex::from).collect();

		let vertex_buffer = device.create_buffer(&BufferDescriptor {
			label: Some("Horizon Vertex Buffer"),
			size: (vertices.len() * std::mem::size_of::<GpuVertex>()) as u64,
			usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
			mapped_at_creation: false,
		});
		queue.write_buffer(&vertex_buffer, 0, unsafe {
			std::slice::from_raw_parts(vertices.as_ptr() as *const u8, vertices.len() * std::mem::size_of::<GpuVertex>())
		});

		let index_buffer = device.create_buffer(&BufferDescriptor {
			label: Some("Horizon Index Buffer"),
			size: (mesh.indices.len() * std::mem::size_of::<u32>()) as u64,
			usage: BufferUsages::INDEX | BufferUsages::COPY_DST,
			mapped_at_creation: false,
		});
		queue.write_buffer(&index_buffer, 0, unsafe {
			std::slice::from_raw_parts(mesh.indices.as_ptr() as *const u8, mesh.indices.len() * std::mem::size_of::<u32>())
		});

		self.index_count = mesh.indices.len() as u32;
		self.vertex_buffer = Some(vertex_buffer);
		self.index_buffer = Some(index_buffer);
		self.mosaic = Some(mosaic);

		Ok(())
	}

	pub fn set_azimuth_window(&mut self, az0_deg: f64, az1_deg: f64) -> Result<(), Error> {
		if !(az0_deg < az1_deg) {
			return Err(geo::Error::Config("az0 must be less than az1".into()).into());
		}
		self.camera.az0_rad = az0_deg.to_radians();
		self.camera.az1_rad = az1_deg.to_radians();
		Ok(())
	}

	pub fn set_zextents(&mut self, z_near: f64, z_far: f64, z_near_color: f64, z_far_color: f64) -> Result<(), Error> {
		if !(z_near > 0.0 && z_far > z_near) {
			return Err(geo::Error::Config("require 0 < z_near < z_far".into()).into());
		}
		if !(z_near_color > 0.0 && z_far_color > z_near_color) {
			return Err(geo::Error::Config("require 0 < z_near_color < z_far_color".into()).into());
		}
		self.camera.z_near = z_near;
		self.camera.z_far = z_far;
		self.camera.z_near_color = z_near_color;
		self.camera.z_far_color = z_far_color;
		Ok(())
	}

	/// Attaches a texture atlas so subsequent redraws sample it instead of
	/// color-coding by range. Pass `None` to go back to range coloring.
	pub fn set_texture(&mut self, device: &Device, atlas: Option<&TextureAtlas>) {
		self.textured = atlas.is_some();
		self.texture_coeffs = atlas.map(|a| a.coeffs()).unwrap_or_default();
		let (view, sampler) = match atlas {
			Some(a) => (a.view(), a.sampler()),
			None => (&self.dummy_texture_view, &self.dummy_sampler),
		};
		self.group = Self::make_bind_group(device, &self.layout, &self.cbuffer, view, sampler);
	}

	/// Resizes the offscreen render target. Only meaningful before the next
	/// `redraw`; does not affect buffers already read back.
	pub fn resize(&mut self, device: &Device, width: u32, height: u32) {
		self.options.width = width;
		self.options.height = height;
		let (color, color_view) = Self::make_color_target(device, width, height);
		let (depth_out, depth_out_view) = Self::make_depth_out_target(device, width, height);
		let (depth_stencil, depth_stencil_view) = Self::make_depth_stencil(device, width, height);
		self.color = color;
		self.color_view = color_view;
		self.depth_out = depth_out;
		self.depth_out_view = depth_out_view;
		self.depth_stencil = depth_stencil;
		self.depth_stencil_view = depth_stencil_view;
	}

	/// Clears the render target and issues the indexed mesh draw. Requires
	/// `set_viewer` to have run at least once.
	pub fn redraw(&self, device: &Device, queue: &Queue, encoder: &mut EncoderProfiler) -> Result<(), Error> {
		tracy::zone!("Redraw");

		let (Some(vertex_buffer), Some(index_buffer)) = (&self.vertex_buffer, &self.index_buffer) else {
			return Err(geo::Error::Config("redraw called before set_viewer".into()).into());
		};

		queue.write_buffer(&self.cbuffer, 0, &self.cbuffer_data());

		let mut pass = tracy::wgpu_render_pass!(
			encoder,
			RenderPassDescriptor {
				label: Some("Horizon Render Pass"),
				color_attachments: &[
					RenderPassColorAttachment {
						view: &self.color_view,
						resolve_target: None,
						ops: Operations {
							load: LoadOp::Clear(Color::BLACK),
							store: true,
						},
					},
					RenderPassColorAttachment {
						view: &self.depth_out_view,
						resolve_target: None,
						ops: Operations {
							load: LoadOp::Clear(Color::WHITE),
							store: true,
						},
					},
				],
				depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
					view: &self.depth_stencil_view,
					depth_ops: Some(Operations {
						load: LoadOp::Clear(1.0),
						store: false,
					}),
					stencil_ops: None,
				}),
			}
		);
		pass.set_pipeline(&self.pipeline);
		pass.set_bind_group(0, &self.group, &[]);
		pass.set_vertex_buffer(0, vertex_buffer.slice(..));
		pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
		pass.draw_indexed(0..self.index_count, 0, 0..1);

		Ok(())
	}

	/// Reads back the color attachment as top-row-first RGB. `device.poll`
	/// is called to block until the copy completes.
	pub fn read_image(&self, device: &Device, queue: &Queue) -> Result<Vec<u8>, Error> {
		let (width, height) = (self.options.width, self.options.height);
		let bytes = read_texture(device, queue, &self.color, width, height, 4)?;

		let mut rgb = Vec::with_capacity((width * height * 3) as usize);
		for px in bytes.chunks_exact(4) {
			rgb.extend_from_slice(&px[0..3]);
		}
		Ok(rgb)
	}

	/// Reads back the depth-out target directly: normalized `[0, 1]` per
	/// pixel, top-row-first, clamped to `1.0` for sky. This is the raw form
	/// `geo::PoiProjector::project` and `geo::GeoProjection::pick` expect,
	/// upstream of `read_ranges`' conversion to slant-range meters.
	pub fn read_depth(&self, device: &Device, queue: &Queue) -> Result<Vec<f32>, Error> {
		let (width, height) = (self.options.width, self.options.height);
		let bytes = read_texture(device, queue, &self.depth_out, width, height, 4)?;
		Ok(bytes.chunks_exact(4).map(|b| f32::from_le_bytes(b.try_into().unwrap())).collect())
	}

	/// Reads back per-pixel slant range in meters, top-row-first, `-1.0` for
	/// sky, following `range::depth_to_range`.
	pub fn read_ranges(&self, device: &Device, queue: &Queue) -> Result<Vec<f32>, Error> {
		let (width, height) = (self.options.width, self.options.height);
		let depth = self.read_depth(device, queue)?;

		let az_window = (self.camera.az1_rad - self.camera.az0_rad) as f32;
		let aspect = width as f32 / height as f32;
		let z_near = self.camera.z_near as f32;
		let z_far = self.camera.z_far as f32;

		let mut ranges = Vec::with_capacity((width * height) as usize);
		for y in 0..height {
			let el_ndc = range::row_to_el_ndc(y, height);
			for x in 0..width {
				ranges.push(range::depth_to_range(depth[(y * width + x) as usize], el_ndc, az_window, aspect, z_near, z_far));
			}
		}
		Ok(ranges)
	}

	/// The `geo::Camera` view of this renderer's current uniform state, for
	/// driving `geo::PoiProjector::project` or `geo::GeoProjection::pick`
	/// directly against a `read_depth` buffer.
	pub fn camera(&self) -> Camera {
		Camera {
			lat_v_rad: self.camera.lat_v_rad,
			lon_v_rad: self.camera.lon_v_rad,
			z_v_m: self.camera.z_v_m,
			az0_rad: self.camera.az0_rad,
			az1_rad: self.camera.az1_rad,
			aspect: self.options.width as f64 / self.options.height as f64,
			z_near: self.camera.z_near,
			z_far: self.camera.z_far,
		}
	}

	/// Reads back the depth buffer and inverts pixel `(x, y)` (top row first)
	/// to a geographic `(lat_rad, lon_rad)`, or `None` if that pixel is sky.
	pub fn pick(&self, device: &Device, queue: &Queue, x: u32, y: u32) -> Result<Option<(f64, f64)>, Error> {
		let depth = self.read_depth(device, queue)?;
		let idx = (y * self.options.width + x) as usize;
		Ok(GeoProjection::pick(&self.camera(), x as f64, self.options.width, depth[idx] as f64))
	}

	pub fn bounds_deg(&self) -> Option<(f64, f64, f64, f64)> { self.mosaic.as_ref().map(|m| m.bounds_deg()) }

	fn cbuffer_data(&self) -> [u8; Self::CBUFFER_SIZE as usize] {
		let mut data = [0u8; Self::CBUFFER_SIZE as usize];
		let aspect = self.options.width as f64 / self.options.height as f64;
		let cells_per_deg = self.options.cells_per_deg as f64;

		// origin_cell_lat/lon_deg describe where mosaic cell (0,0) sits; the
		// renderer derives it the same way DemMosaic::build does, since the
		// mosaic doesn't expose its raw origin fields directly.
		let (lat0, lon0, _, _) = self.mosaic.as_ref().map(|m| m.bounds_deg()).unwrap_or((0.0, 0.0, 0.0, 0.0));

		let fields: [f32; 20] = [
			self.camera.lat_v_rad as f32,
			self.camera.lon_v_rad as f32,
			self.camera.z_v_m as f32,
			aspect as f32,
			self.camera.az0_rad as f32,
			self.camera.az1_rad as f32,
			self.camera.z_near as f32,
			self.camera.z_far as f32,
			self.camera.z_near_color as f32,
			self.camera.z_far_color as f32,
			lat0 as f32,
			lon0 as f32,
			(1.0 / cells_per_deg) as f32,
			if self.textured { 1.0 } else { 0.0 },
			self.texture_coeffs.lon0,
			self.texture_coeffs.lon1,
			self.texture_coeffs.dlat0,
			self.texture_coeffs.dlat1,
			self.texture_coeffs.dlat2,
			0.0,
		];
		for (i, f) in fields.iter().enumerate() {
			data[i * 4..i * 4 + 4].copy_from_slice(&f.to_le_bytes());
		}
		data
	}

	fn make_bind_group(device: &Device, layout: &BindGroupLayout, cbuffer: &Buffer, atlas_view: &TextureView, atlas_sampler: &wgpu::Sampler) -> BindGroup {
		device.create_bind_group(&BindGroupDescriptor {
			label: Some("Horizon Bind Group"),
			layout,
			entries: &[
				BindGroupEntry {
					binding: 0,
					resource: cbuffer.as_entire_binding(),
				},
				BindGroupEntry {
					binding: 1,
					resource: BindingResource::TextureView(atlas_view),
				},
				BindGroupEntry {
					binding: 2,
					resource: BindingResource::Sampler(atlas_sampler),
				},
			],
		})
	}

	fn make_color_target(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
		let texture = device.create_texture(&TextureDescriptor {
			label: Some("Horizon Color Target"),
			size: Extent3d {
				width,
				height,
				depth_or_array_layers: 1,
			},
			mip_level_count: 1,
			sample_count: 1,
			dimension: TextureDimension::D2,
			format: Self::COLOR_FORMAT,
			usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
		});
		let view = texture.create_view(&TextureViewDescriptor::default());
		(texture, view)
	}

	fn make_depth_out_target(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
		let texture = device.create_texture(&TextureDescriptor {
			label: Some("Horizon Depth-Out Target"),
			size: Extent3d {
				width,
				height,
				depth_or_array_layers: 1,
			},
			mip_level_count: 1,
			sample_count: 1,
			dimension: TextureDimension::D2,
			format: Self::DEPTH_OUT_FORMAT,
			usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
		});
		let view = texture.create_view(&TextureViewDescriptor::default());
		(texture, view)
	}

	fn make_depth_stencil(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
		let texture = device.create_texture(&TextureDescriptor {
			label: Some("Horizon Depth-Stencil"),
			size: Extent3d {
				width,
				height,
				depth_or_array_layers: 1,
			},
			mip_level_count: 1,
			sample_count: 1,
			dimension: TextureDimension::D2,
			format: Self::DEPTH_STENCIL_FORMAT,
			usage: TextureUsages::RENDER_ATTACHMENT,
		});
		let view = texture.create_view(&TextureViewDescriptor::default());
		(texture, view)
	}
}

/// Copies a render-attachment texture to a row-aligned staging buffer and
/// maps it back into a plain byte vec, stripping wgpu's 256-byte row-pitch
/// padding.
fn read_texture(device: &Device, queue: &Queue, texture: &Texture, width: u32, height: u32, bytes_per_pixel: u32) -> Result<Vec<u8>, Error> {
	let unpadded_stride = width * bytes_per_pixel;
	let padded_stride = (unpadded_stride + 255) & !255;

	let buffer = device.create_buffer(&BufferDescriptor {
		label: Some("Readback Buffer"),
		size: (padded_stride * height) as u64,
		usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
		mapped_at_creation: false,
	});

	let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
	encoder.copy_texture_to_buffer(
		wgpu::ImageCopyTexture {
			texture,
			mip_level: 0,
			origin: wgpu::Origin3d::ZERO,
			aspect: TextureAspect::All,
		},
		wgpu::ImageCopyBuffer {
			buffer: &buffer,
			layout: wgpu::ImageDataLayout {
				offset: 0,
				bytes_per_row: NonZeroU32::new(padded_stride),
				rows_per_image: NonZeroU32::new(height),
			},
		},
		Extent3d {
			width,
			height,
			depth_or_array_layers: 1,
		},
	);
	queue.submit([encoder.finish()]);

	let slice = buffer.slice(..);
	let _ = slice.map_async(wgpu::MapMode::Read);
	device.poll(wgpu::Maintain::Wait);

	let padded = slice.get_mapped_range();
	let mut out = Vec::with_capacity((unpadded_stride * height) as usize);
	for row in padded.chunks(padded_stride as usize) {
		out.extend_from_slice(&row[..unpadded_stride as usize]);
	}
	drop(padded);
	buffer.unmap();

	Ok(out)
}
