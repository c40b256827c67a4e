use crate::prelude::*;
use ndarray_rand::rand_distr::{Distribution, Normal};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// stddev of a unit normal truncated to [-2, 2]
const TRUNCATION_CORRECTION: f64 = 0.879_625_661_034_239_8;

/// Glorot (Xavier) normal initializer.
///
/// Draws from a normal with stddev `sqrt(2 / (fan_in + fan_out))`, truncated at
/// two standard deviations and rescaled so the truncated variance matches.
#[derive(Debug, Clone, Copy)]
pub struct GlorotNormal {
    normal: Normal<f64>,
    bound: f64,
}

impl GlorotNormal {
    pub fn new(fan_in: usize, fan_out: usize) -> Result<Self> {
        if fan_in + fan_out == 0 {
            return Err(NNError::InvalidConfiguration(
                "glorot initializer needs a non-empty shape".to_string(),
            ));
        }
        let stddev = (2.0 / (fan_in + fan_out) as f64).sqrt() / TRUNCATION_CORRECTION;
        let normal = Normal::new(0.0, stddev)
            .map_err(|e| NNError::InvalidConfiguration(format!("glorot initializer: {}", e)))?;
        Ok(Self {
            normal,
            bound: 2.0 * stddev,
        })
    }

    pub fn bound(&self) -> f64 {
        self.bound
    }
}

impl Distribution<f64> for GlorotNormal {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        loop {
            let v = self.normal.sample(rng);
            if v.abs() <= self.bound {
                return v;
            }
        }
    }
}

/// Allocates a `(fan_in, fan_out)` kernel from a generator seeded with `seed`.
pub fn glorot_normal(shape: (usize, usize), seed: u64) -> Result<Array2<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let dist = GlorotNormal::new(shape.0, shape.1)?;
    Ok(Array2::random_using(shape, dist, &mut rng))
}
