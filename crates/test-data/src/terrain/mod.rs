//! Terrain generation: elevation profiles along a route using Perlin noise.

mod elevation;

pub use elevation::{ElevationGenerator, add_elevation_jitter};
