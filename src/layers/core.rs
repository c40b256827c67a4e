use crate::prelude::*;
use crate::layers::initializers::glorot_normal;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Selects train-time behavior (batch statistics, active dropout) or inference behavior.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Inference,
}

impl Mode {
    pub fn is_training(&self) -> bool {
        matches!(self, Mode::Training)
    }
}

pub trait LayerTrait {
    fn typ(&self) -> String;

    fn count_params(&self) -> usize;

    fn count_trainable_params(&self) -> usize {
        self.count_params()
    }
}

/// Affine stage `x · kernel + bias`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Dense {
    pub kernel: Array2<f64>,
    pub bias: Array1<f64>,
    pub regularizer: Regularizer,
    pub trainable: bool,
}

impl Dense {
    pub fn new(input: usize, units: usize, seed: u64, regularizer: Regularizer) -> Result<Self> {
        if input == 0 || units == 0 {
            return Err(NNError::InvalidConfiguration(format!(
                "layer dimensions must be greater than 0, got ({}, {})",
                input, units
            )));
        }
        Ok(Self {
            kernel: glorot_normal((input, units), seed)?,
            bias: Array1::zeros(units),
            regularizer,
            trainable: true,
        })
    }

    pub fn input_width(&self) -> usize {
        self.kernel.nrows()
    }

    pub fn units(&self) -> usize {
        self.kernel.ncols()
    }

    pub fn forward(&self, a: &Array2<f64>) -> Result<Array2<f64>> {
        if a.ncols() != self.input_width() {
            return Err(NNError::ShapeMismatch(format!(
                "dense stage expects {} inputs, got {}",
                self.input_width(),
                a.ncols()
            )));
        }
        Ok(a.dot(&self.kernel) + &self.bias)
    }

    pub fn penalty(&self) -> f64 {
        self.regularizer.penalty(&self.kernel) + self.regularizer.penalty(&self.bias)
    }
}

impl LayerTrait for Dense {
    fn typ(&self) -> String {
        "Dense".into()
    }

    fn count_params(&self) -> usize {
        self.kernel.len() + self.bias.len()
    }

    fn count_trainable_params(&self) -> usize {
        if self.trainable {
            self.count_params()
        } else {
            0
        }
    }
}

/// Inverted dropout. Active only in training mode; kept units are scaled by `1 / (1 - rate)`.
#[derive(Debug, Clone)]
pub struct Dropout {
    rate: f64,
    seed: u64,
    rng: StdRng,
}

impl Dropout {
    pub fn new(rate: f64, seed: u64) -> Result<Self> {
        if !(0.0..1.0).contains(&rate) {
            return Err(NNError::InvalidConfiguration(format!(
                "dropout rate must be in [0, 1), got {}",
                rate
            )));
        }
        Ok(Self {
            rate,
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn forward(&mut self, x: Array2<f64>, mode: Mode) -> Array2<f64> {
        if !mode.is_training() || self.rate == 0.0 {
            return x;
        }
        let keep = 1.0 - self.rate;
        let mask = Array2::random_using(x.raw_dim(), Uniform::new(0.0, 1.0), &mut self.rng);
        x * mask.mapv(|u| if u < keep { 1.0 / keep } else { 0.0 })
    }
}

impl LayerTrait for Dropout {
    fn typ(&self) -> String {
        "Dropout".into()
    }

    fn count_params(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_shapes_and_zero_bias() {
        let dense = Dense::new(10, 16, 1024, Regularizer::L2(0.0)).unwrap();
        assert_eq!(dense.kernel.dim(), (10, 16));
        assert_eq!(dense.bias.len(), 16);
        assert!(dense.bias.iter().all(|&b| b == 0.0));
        assert_eq!(dense.count_params(), 176);
    }

    #[test]
    fn test_dense_rejects_zero_width() {
        assert!(matches!(
            Dense::new(3, 0, 1, Regularizer::None),
            Err(NNError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_dense_forward() {
        let dense = Dense {
            kernel: array![[1.0, 0.0], [0.0, 2.0]],
            bias: array![0.5, -0.5],
            regularizer: Regularizer::None,
            trainable: true,
        };
        let y = dense.forward(&array![[1.0, 1.0], [2.0, 3.0]]).unwrap();
        assert_eq!(y, array![[1.5, 1.5], [2.5, 5.5]]);

        let err = dense.forward(&array![[1.0, 2.0, 3.0]]);
        assert!(matches!(err, Err(NNError::ShapeMismatch(_))));
    }

    #[test]
    fn test_dense_penalty_covers_kernel_and_bias() {
        let dense = Dense {
            kernel: array![[1.0, 2.0]],
            bias: array![3.0, 0.0],
            regularizer: Regularizer::L2(0.1),
            trainable: true,
        };
        assert!((dense.penalty() - 0.1 * (1.0 + 4.0 + 9.0)).abs() < 1e-12);
    }

    #[test]
    fn test_dropout_rate_bounds() {
        assert!(Dropout::new(0.0, 1).is_ok());
        assert!(Dropout::new(0.99, 1).is_ok());
        assert!(matches!(Dropout::new(1.0, 1), Err(NNError::InvalidConfiguration(_))));
        assert!(matches!(Dropout::new(-0.1, 1), Err(NNError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_dropout_is_identity_in_inference() {
        let mut dropout = Dropout::new(0.5, 7).unwrap();
        let x = Array2::from_elem((4, 8), 2.0);
        assert_eq!(dropout.forward(x.clone(), Mode::Inference), x);
    }

    #[test]
    fn test_dropout_training_masks_and_scales() {
        let mut dropout = Dropout::new(0.25, 7).unwrap();
        let x = Array2::<f64>::ones((200, 50));
        let y = dropout.forward(x, Mode::Training);

        let kept = y.iter().filter(|&&v| v != 0.0).count();
        let ratio = kept as f64 / y.len() as f64;
        assert!((ratio - 0.75).abs() < 0.03, "kept ratio {}", ratio);
        assert!(y.iter().all(|&v| v == 0.0 || (v - 1.0 / 0.75).abs() < 1e-12));
    }

    #[test]
    fn test_dropout_masks_are_seeded() {
        let x = Array2::<f64>::ones((10, 10));
        let a = Dropout::new(0.5, 3).unwrap().forward(x.clone(), Mode::Training);
        let b = Dropout::new(0.5, 3).unwrap().forward(x.clone(), Mode::Training);
        let c = Dropout::new(0.5, 4).unwrap().forward(x, Mode::Training);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
