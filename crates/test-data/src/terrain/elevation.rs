//! Perlin noise-based elevation along a route.

use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand_distr::{Distribution, Normal};

/// Generates an elevation profile as a function of distance travelled.
///
/// Several octaves of Perlin noise give long climbs with small rollers on
/// top of them.
#[derive(Debug, Clone)]
pub struct ElevationGenerator {
    perlin: Perlin,
    /// Meters.
    base_elevation: f64,
    /// Meters above or below the base.
    height_scale: f64,
    /// Cycles per meter.
    frequency: f64,
    octaves: u32,
}

impl ElevationGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            base_elevation: 300.0,
            height_scale: 80.0,
            frequency: 1.0 / 4000.0,
            octaves: 4,
        }
    }

    /// Rolling countryside with little climbing.
    pub fn flat(seed: u32) -> Self {
        Self {
            height_scale: 15.0,
            octaves: 2,
            ..Self::new(seed)
        }
    }

    /// Mountain terrain with long climbs.
    pub fn hilly(seed: u32) -> Self {
        Self {
            base_elevation: 900.0,
            height_scale: 250.0,
            frequency: 1.0 / 8000.0,
            octaves: 5,
            ..Self::new(seed)
        }
    }

    pub fn with_base_elevation(mut self, elevation: f64) -> Self {
        self.base_elevation = elevation;
        self
    }

    /// Elevation after `distance` meters, using fractal Brownian motion.
    pub fn elevation_at(&self, distance: f64) -> f64 {
        let mut total = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = self.frequency;
        let mut max_amplitude = 0.0;

        for _ in 0..self.octaves {
            // Perlin noise is zero on integer lattice points.
            total += self.perlin.get([distance * frequency, 0.5]) * amplitude;
            max_amplitude += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }

        self.base_elevation + total / max_amplitude * self.height_scale
    }

    /// Grade around `distance`, as a fraction.
    pub fn grade_at(&self, distance: f64) -> f64 {
        let step = 10.0;
        (self.elevation_at(distance + step / 2.0) - self.elevation_at(distance - step / 2.0))
            / step
    }
}

/// Adds barometric altimeter noise to an elevation reading.
pub fn add_elevation_jitter(elevation: f64, rng: &mut impl Rng, std_dev: f64) -> f64 {
    match Normal::new(0.0, std_dev) {
        Ok(normal) => elevation + normal.sample(rng),
        Err(_) => elevation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_is_repeatable() {
        let terrain = ElevationGenerator::new(42);
        assert_eq!(terrain.elevation_at(1234.5), terrain.elevation_at(1234.5));
    }

    #[test]
    fn test_elevation_stays_in_range() {
        let terrain = ElevationGenerator::hilly(7);
        for d in (0..50_000).step_by(250) {
            let elevation = terrain.elevation_at(d as f64);
            assert!(elevation >= 900.0 - 250.0 && elevation <= 900.0 + 250.0);
        }
    }

    #[test]
    fn test_flat_terrain_has_gentle_grades() {
        let terrain = ElevationGenerator::flat(3);
        for d in (0..20_000).step_by(100) {
            assert!(terrain.grade_at(d as f64).abs() < 0.1);
        }
    }
}
