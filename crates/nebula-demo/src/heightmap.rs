//! Multi-octave fractal Brownian motion (fBm) heightmap for the terrain pager.

use noise::{NoiseFn, Simplex};

/// Configuration for multi-octave fBm noise.
#[derive(Clone, Debug)]
pub struct HeightmapParams {
    /// Seed for deterministic generation.
    pub seed: u32,
    /// Number of noise octaves to composite.
    pub octaves: u32,
    /// Frequency multiplier between successive octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between successive octaves.
    pub persistence: f64,
    /// Frequency of the first octave (cycles per voxel).
    pub base_frequency: f64,
    /// Amplitude of the first octave in voxels.
    pub amplitude: f64,
}

impl Default for HeightmapParams {
    fn default() -> Self {
        Self {
            seed: 0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            base_frequency: 0.01,
            amplitude: 24.0,
        }
    }
}

/// Terrain height as a function of the horizontal voxel position.
pub struct HeightmapSampler {
    noise: Simplex,
    params: HeightmapParams,
}

impl HeightmapSampler {
    pub fn new(params: HeightmapParams) -> Self {
        let noise = Simplex::new(params.seed);
        Self { noise, params }
    }

    /// Height offset at `(x, z)`, within `[-max_amplitude, max_amplitude]`.
    pub fn sample(&self, x: f64, z: f64) -> f64 {
        let mut total = 0.0;
        let mut frequency = self.params.base_frequency;
        let mut amplitude = self.params.amplitude;

        for _ in 0..self.params.octaves {
            total += self.noise.get([x * frequency, z * frequency]) * amplitude;
            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total
    }

    /// Geometric sum of all octave amplitudes.
    pub fn max_amplitude(&self) -> f64 {
        let mut sum = 0.0;
        let mut amp = self.params.amplitude;
        for _ in 0..self.params.octaves {
            sum += amp;
            amp *= self.params.persistence;
        }
        sum
    }
}
