use crate::prelude::*;
use std::fmt;

const SELU_ALPHA: f64 = 1.673_263_242_354_377_2;
const SELU_SCALE: f64 = 1.050_700_987_355_480_5;

/// A single-input, single-output transform applied after each affine stage.
///
/// Inputs are `(rows, features)` matrices. Implementors that keep per-feature
/// state allocate it in `build`, once the feature count is known.
pub trait ActivationLayer: fmt::Debug + Send {
    fn name(&self) -> String;

    fn build(&mut self, _units: usize) -> Result<()> {
        Ok(())
    }

    /// Inference-mode transform.
    fn call(&self, x: Array2<f64>) -> Result<Array2<f64>>;

    /// Training-mode transform. Layers with running statistics update them here.
    fn call_training(&mut self, x: Array2<f64>) -> Result<Array2<f64>> {
        self.call(x)
    }

    fn count_params(&self) -> usize {
        0
    }

    fn count_trainable_params(&self) -> usize {
        self.count_params()
    }

    fn get_weights(&self) -> Vec<Array1<f64>> {
        Vec::new()
    }

    fn set_weights(&mut self, weights: Vec<Array1<f64>>) -> Result<()> {
        if weights.is_empty() {
            Ok(())
        } else {
            Err(NNError::InvalidConfiguration(format!(
                "activation '{}' has no weights, got {} arrays",
                self.name(),
                weights.len()
            )))
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
    Elu,
    Selu,
    Softplus,
    Softsign,
    HardSigmoid,
    Exponential,
    Swish,
}

impl Activation {
    pub const ALL: [Activation; 12] = [
        Self::Linear,
        Self::Relu,
        Self::Sigmoid,
        Self::Tanh,
        Self::Softmax,
        Self::Elu,
        Self::Selu,
        Self::Softplus,
        Self::Softsign,
        Self::HardSigmoid,
        Self::Exponential,
        Self::Swish,
    ];

    /// Looks up a built-in activation by name, ignoring case. `silu` is accepted for `swish`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name == "silu" {
            return Some(Self::Swish);
        }
        Self::ALL.iter().copied().find(|a| a.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Relu => "relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Softmax => "softmax",
            Self::Elu => "elu",
            Self::Selu => "selu",
            Self::Softplus => "softplus",
            Self::Softsign => "softsign",
            Self::HardSigmoid => "hard_sigmoid",
            Self::Exponential => "exponential",
            Self::Swish => "swish",
        }
    }

    pub fn forward(&self, z: Array2<f64>) -> Array2<f64> {
        match self {
            Self::Linear => z,
            Self::Relu => z.mapv_into(|z| if z >= 0.0 { z } else { 0.0 }),
            Self::Sigmoid => z.mapv_into(sigmoid),
            Self::Tanh => z.mapv_into(f64::tanh),
            Self::Softmax => softmax_forward(z),
            Self::Elu => z.mapv_into(|z| if z > 0.0 { z } else { z.exp_m1() }),
            Self::Selu => z.mapv_into(|z| {
                if z > 0.0 {
                    SELU_SCALE * z
                } else {
                    SELU_SCALE * SELU_ALPHA * z.exp_m1()
                }
            }),
            Self::Softplus => z.mapv_into(softplus),
            Self::Softsign => z.mapv_into(|z| z / (1.0 + z.abs())),
            Self::HardSigmoid => z.mapv_into(|z| (0.2 * z + 0.5).clamp(0.0, 1.0)),
            Self::Exponential => z.mapv_into(f64::exp),
            Self::Swish => z.mapv_into(|z| z * sigmoid(z)),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ActivationLayer for Activation {
    fn name(&self) -> String {
        self.as_str().to_string()
    }

    fn call(&self, x: Array2<f64>) -> Result<Array2<f64>> {
        Ok(self.forward(x))
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

// log(1 + e^z) without overflow for large z
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn softmax_forward(mut z: Array2<f64>) -> Array2<f64> {
    for mut row in z.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    z
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &Array2<f64>, b: &Array2<f64>) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-9, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_relu_and_linear() {
        let z = array![[-1.0, 0.0, 2.5]];
        assert_close(&Activation::Relu.forward(z.clone()), &array![[0.0, 0.0, 2.5]]);
        assert_close(&Activation::Linear.forward(z.clone()), &z);
    }

    #[test]
    fn test_sigmoid_tanh_reference_values() {
        let z = array![[0.0, 2.0]];
        let s = Activation::Sigmoid.forward(z.clone());
        assert_close(&s, &array![[0.5, 0.8807970779778823]]);
        let t = Activation::Tanh.forward(z);
        assert_close(&t, &array![[0.0, 0.9640275800758169]]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let z = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]];
        let s = Activation::Softmax.forward(z);
        for row in s.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!((s[[1, 0]] - 1.0 / 3.0).abs() < 1e-12);
        assert!(s[[0, 2]] > s[[0, 1]] && s[[0, 1]] > s[[0, 0]]);
    }

    #[test]
    fn test_piecewise_activations() {
        let z = array![[-10.0, 0.0, 10.0]];
        assert_close(&Activation::HardSigmoid.forward(z.clone()), &array![[0.0, 0.5, 1.0]]);
        assert_close(&Activation::Softsign.forward(z.clone()), &array![[-10.0 / 11.0, 0.0, 10.0 / 11.0]]);

        let elu = Activation::Elu.forward(z.clone());
        assert!((elu[[0, 0]] - ((-10.0f64).exp() - 1.0)).abs() < 1e-12);
        assert_eq!(elu[[0, 2]], 10.0);

        let selu = Activation::Selu.forward(array![[1.0]]);
        assert!((selu[[0, 0]] - SELU_SCALE).abs() < 1e-12);
    }

    #[test]
    fn test_softplus_is_stable() {
        let s = Activation::Softplus.forward(array![[0.0, 800.0, -800.0]]);
        assert!((s[[0, 0]] - 2.0f64.ln()).abs() < 1e-12);
        assert!((s[[0, 1]] - 800.0).abs() < 1e-9);
        assert!(s[[0, 2]] >= 0.0 && s[[0, 2]] < 1e-300);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Activation::from_name("relu"), Some(Activation::Relu));
        assert_eq!(Activation::from_name("ReLU"), Some(Activation::Relu));
        assert_eq!(Activation::from_name("hard_sigmoid"), Some(Activation::HardSigmoid));
        assert_eq!(Activation::from_name("silu"), Some(Activation::Swish));
        assert_eq!(Activation::from_name("leaky"), None);
        for a in Activation::ALL {
            assert_eq!(Activation::from_name(a.as_str()), Some(a));
        }
    }
}
