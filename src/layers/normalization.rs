use crate::prelude::*;

pub const DEFAULT_MOMENTUM: f64 = 0.99;
pub const DEFAULT_EPSILON: f64 = 1e-3;

/// Batch normalization over the feature axis of `(rows, features)` inputs.
///
/// Training mode normalizes with the statistics of the current batch and folds
/// them into the moving averages; inference mode uses the moving averages only.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BatchNorm {
    pub gamma: Array1<f64>,
    pub beta: Array1<f64>,
    pub moving_mean: Array1<f64>,
    pub moving_variance: Array1<f64>,
    pub momentum: f64,
    pub epsilon: f64,
    /// When false, gamma and beta are fixed at one and zero and are not trainable.
    pub affine: bool,
}

impl BatchNorm {
    pub fn new(units: usize) -> Self {
        Self {
            gamma: Array1::ones(units),
            beta: Array1::zeros(units),
            moving_mean: Array1::zeros(units),
            moving_variance: Array1::ones(units),
            momentum: DEFAULT_MOMENTUM,
            epsilon: DEFAULT_EPSILON,
            affine: true,
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn without_affine(mut self) -> Self {
        self.affine = false;
        self
    }

    pub fn units(&self) -> usize {
        self.gamma.len()
    }

    pub fn forward(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        Ok(self.normalize(x, &self.moving_mean, &self.moving_variance))
    }

    pub fn forward_train(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x)?;
        if x.nrows() == 0 {
            return Ok(x.clone());
        }
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            NNError::ShapeMismatch("cannot normalize an empty batch".to_string())
        })?;
        let centered = x - &mean;
        let variance = centered
            .mapv(|v| v * v)
            .mean_axis(Axis(0))
            .ok_or_else(|| NNError::ShapeMismatch("cannot normalize an empty batch".to_string()))?;

        let m = self.momentum;
        self.moving_mean = &self.moving_mean * m + &mean * (1.0 - m);
        self.moving_variance = &self.moving_variance * m + &variance * (1.0 - m);

        Ok(self.normalize(x, &mean, &variance))
    }

    fn normalize(&self, x: &Array2<f64>, mean: &Array1<f64>, variance: &Array1<f64>) -> Array2<f64> {
        let inv_std = variance.mapv(|v| 1.0 / (v + self.epsilon).sqrt());
        let normed = (x - mean) * &inv_std;
        if self.affine {
            normed * &self.gamma + &self.beta
        } else {
            normed
        }
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        if x.ncols() != self.units() {
            return Err(NNError::ShapeMismatch(format!(
                "batch normalization expects {} features, got {}",
                self.units(),
                x.ncols()
            )));
        }
        Ok(())
    }
}

impl LayerTrait for BatchNorm {
    fn typ(&self) -> String {
        "BatchNormalization".into()
    }

    fn count_params(&self) -> usize {
        4 * self.units()
    }

    fn count_trainable_params(&self) -> usize {
        if self.affine {
            2 * self.units()
        } else {
            0
        }
    }
}
