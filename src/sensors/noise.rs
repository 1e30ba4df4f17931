//! Pluggable noise applied to analog readings.
//!
//! Bench setups without real transducers feed flat ADC counts; [`Jitter`]
//! makes them move the way a field reading would.  Production builds use
//! [`NoNoise`].

use crate::app::state::Quantity;

pub trait NoisePolicy {
    fn perturb(&mut self, quantity: Quantity, value: f32) -> f32;
}

/// Readings pass through untouched.
pub struct NoNoise;

impl NoisePolicy for NoNoise {
    fn perturb(&mut self, _quantity: Quantity, value: f32) -> f32 {
        value
    }
}

/// Uniform jitter of a fixed amplitude per quantity.
pub struct Jitter {
    rng: fastrand::Rng,
}

impl Jitter {
    pub fn new() -> Self {
        Self {
            rng: fastrand::Rng::new(),
        }
    }

    /// Reproducible sequence for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    /// Half-width of the jitter band.
    pub const fn amplitude(quantity: Quantity) -> f32 {
        match quantity {
            Quantity::WindSpeed => 1.0,
            Quantity::LightIntensity => 5.0,
            Quantity::Co2Saturation => 10.0,
            _ => 0.0,
        }
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new()
    }
}

impl NoisePolicy for Jitter {
    fn perturb(&mut self, quantity: Quantity, value: f32) -> f32 {
        let a = Self::amplitude(quantity);
        if a == 0.0 {
            return value;
        }
        value + (self.rng.f32() * 2.0 - 1.0) * a
    }
}
