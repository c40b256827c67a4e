use crate::prelude::*;

/// Weight penalty added to the training loss by the caller.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum Regularizer {
    None,
    L2(f64),
}

impl Regularizer {
    /// `l2 * Σw²`.
    pub fn penalty<D: Dimension>(&self, weights: &Array<f64, D>) -> f64 {
        match self {
            Regularizer::L2(lambda) => lambda * weights.mapv(|w| w * w).sum(),
            Regularizer::None => 0.0,
        }
    }
}

impl Default for Regularizer {
    fn default() -> Self {
        Regularizer::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalties() {
        let w = array![[1.0, -2.0], [0.0, 3.0]];
        assert_eq!(Regularizer::None.penalty(&w), 0.0);
        assert!((Regularizer::L2(0.5).penalty(&w) - 7.0).abs() < 1e-12);

        let b = array![2.0, 2.0];
        assert!((Regularizer::L2(1.0).penalty(&b) - 8.0).abs() < 1e-12);
    }
}
