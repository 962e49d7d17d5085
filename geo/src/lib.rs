//! Host-side terrain math for the horizon renderer: tiled SRTM elevation
//! access, the panoramic geo-projection, mesh construction, and point-of-
//! interest layout.
//!
//! None of this crate touches a GPU; `render` builds a device pipeline on
//! top of the types exposed here.

mod error;
mod label;
mod mesh;
mod mosaic;
mod poi;
mod projection;
mod tile;

pub use error::Error;
pub use label::{LabelLayout, LabelLayoutOptions};
pub use mesh::{Mesh, MeshBuilder, Vertex};
pub use mosaic::DemMosaic;
pub use poi::{Poi, PoiProjector, PoiProjectorOptions};
pub use projection::{Camera, GeoProjection, ProjectedPoint};
pub use tile::{TileHandle, TileStore};

/// Mean radius of the Earth, meters. The sphere model is used throughout;
/// no WGS84 ellipsoid refinement.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// SRTM cells per degree for the 3-arcsecond product (1201x1201 tiles).
pub const CELLS_PER_DEG_SRTM3: i32 = 1200;

/// SRTM cells per degree for the 1-arcsecond product (3601x3601 tiles).
pub const CELLS_PER_DEG_SRTM1: i32 = 3600;

/// Side length, in samples, of a tile at the given cells-per-degree density.
pub fn tile_width(cells_per_deg: i32) -> i32 { cells_per_deg + 1 }
