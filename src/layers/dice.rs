use crate::prelude::*;
use crate::layers::activation::sigmoid;

const DICE_EPSILON: f64 = 1e-9;

/// Data-adaptive activation from Deep Interest Network.
///
/// `p = sigmoid(bn(x))`, `out = alpha * (1 - p) * x + p * x`, where `bn` has no
/// affine parameters and `alpha` is a trainable per-feature vector starting at zero.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Dice {
    pub alphas: Array1<f64>,
    bn: Option<BatchNorm>,
}

impl Dice {
    pub fn new(units: usize) -> Self {
        let mut dice = Self::default();
        dice.allocate(units);
        dice
    }

    fn allocate(&mut self, units: usize) {
        self.alphas = Array1::zeros(units);
        self.bn = Some(BatchNorm::new(units).with_epsilon(DICE_EPSILON).without_affine());
    }

    fn gate(&self, x: Array2<f64>, normed: Array2<f64>) -> Array2<f64> {
        let p = normed.mapv_into(sigmoid);
        let alpha = &self.alphas;
        (1.0 - &p) * &x * alpha + p * x
    }

    fn unbuilt() -> NNError {
        NNError::InvalidConfiguration("Dice must be built before it is called".to_string())
    }
}

impl ActivationLayer for Dice {
    fn name(&self) -> String {
        "Dice".into()
    }

    fn build(&mut self, units: usize) -> Result<()> {
        if units == 0 {
            return Err(NNError::InvalidConfiguration(
                "Dice needs at least one unit".to_string(),
            ));
        }
        self.allocate(units);
        Ok(())
    }

    fn call(&self, x: Array2<f64>) -> Result<Array2<f64>> {
        let bn = self.bn.as_ref().ok_or_else(Self::unbuilt)?;
        let normed = bn.forward(&x)?;
        Ok(self.gate(x, normed))
    }

    fn call_training(&mut self, x: Array2<f64>) -> Result<Array2<f64>> {
        let normed = match self.bn.as_mut() {
            Some(bn) => bn.forward_train(&x)?,
            None => return Err(Self::unbuilt()),
        };
        Ok(self.gate(x, normed))
    }

    fn count_params(&self) -> usize {
        self.alphas.len() + self.bn.as_ref().map_or(0, |bn| bn.count_params())
    }

    fn count_trainable_params(&self) -> usize {
        self.alphas.len()
    }

    fn get_weights(&self) -> Vec<Array1<f64>> {
        match &self.bn {
            Some(bn) => vec![
                self.alphas.clone(),
                bn.moving_mean.clone(),
                bn.moving_variance.clone(),
            ],
            None => Vec::new(),
        }
    }

    fn set_weights(&mut self, weights: Vec<Array1<f64>>) -> Result<()> {
        let units = self.alphas.len();
        let bn = self.bn.as_mut().ok_or_else(Self::unbuilt)?;
        match <[Array1<f64>; 3]>::try_from(weights) {
            Ok([alphas, mean, variance])
                if alphas.len() == units && mean.len() == units && variance.len() == units =>
            {
                self.alphas = alphas;
                bn.moving_mean = mean;
                bn.moving_variance = variance;
                Ok(())
            }
            _ => Err(NNError::InvalidConfiguration(format!(
                "Dice expects three weight vectors of length {}",
                units
            ))),
        }
    }
}
