use crate::layers::resolver::invalid_activation;
use crate::prelude::*;
use crate::utils::{from_matrix, to_matrix, with_last_dim};
use log::{debug, info};
use std::path::Path;

/// Configuration of a feed-forward block. Holds no learned state.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DnnConfig {
    /// Output width of each affine stage. Empty means identity.
    pub hidden_units: Vec<usize>,
    pub activation: ActivationSpec,
    /// L2 strength applied to every kernel and bias.
    pub l2: f64,
    pub dropout_rate: f64,
    pub use_bn: bool,
    pub seed: u64,
}

impl Default for DnnConfig {
    fn default() -> Self {
        Self {
            hidden_units: Vec::new(),
            activation: ActivationSpec::default(),
            l2: 0.0,
            dropout_rate: 0.0,
            use_bn: false,
            seed: 1024,
        }
    }
}

impl DnnConfig {
    pub fn new(hidden_units: &[usize]) -> Self {
        Self {
            hidden_units: hidden_units.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_activation(mut self, activation: impl Into<ActivationSpec>) -> Self {
        self.activation = activation.into();
        self
    }

    pub fn with_l2(mut self, l2: f64) -> Self {
        self.l2 = l2;
        self
    }

    pub fn with_dropout_rate(mut self, dropout_rate: f64) -> Self {
        self.dropout_rate = dropout_rate;
        self
    }

    pub fn with_bn(mut self, use_bn: bool) -> Self {
        self.use_bn = use_bn;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(i) = self.hidden_units.iter().position(|&u| u == 0) {
            return Err(NNError::InvalidConfiguration(format!(
                "hidden_units must be positive, found 0 at stage {}",
                i
            )));
        }
        if !(0.0..1.0).contains(&self.dropout_rate) {
            return Err(NNError::InvalidConfiguration(format!(
                "dropout_rate must be in [0, 1), got {}",
                self.dropout_rate
            )));
        }
        if !self.l2.is_finite() || self.l2 < 0.0 {
            return Err(NNError::InvalidConfiguration(format!(
                "l2 must be a finite non-negative number, got {}",
                self.l2
            )));
        }
        // layer keys are checked against a registry at import and build
        if let ActivationSpec::Name(name) = &self.activation {
            if Activation::from_name(name).is_none() {
                return Err(invalid_activation(&self.activation));
            }
        }
        Ok(())
    }

    pub fn output_width(&self, input_width: usize) -> usize {
        self.hidden_units.last().copied().unwrap_or(input_width)
    }

    /// Output shape for `input_shape`, without building anything.
    pub fn compute_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        match self.hidden_units.last() {
            Some(&units) => with_last_dim(input_shape, units),
            None => with_last_dim(input_shape, *input_shape.last().unwrap_or(&0)),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and validates a configuration against the default registry.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_json_with(json, &ActivationRegistry::default())
    }

    pub fn from_json_with(json: &str, registry: &ActivationRegistry) -> Result<Self> {
        let config: DnnConfig = serde_json::from_str(json)
            .map_err(|e| NNError::InvalidConfiguration(format!("malformed DNN config: {}", e)))?;
        config.validate()?;
        if let ActivationSpec::Layer(key) = &config.activation {
            if !registry.contains(key) {
                return Err(invalid_activation(&config.activation));
            }
        }
        Ok(config)
    }

    pub fn build(&self, input_width: usize) -> Result<Dnn> {
        self.build_with(input_width, &ActivationRegistry::default())
    }

    /// Allocates every stage for inputs of `input_width` features.
    pub fn build_with(&self, input_width: usize, registry: &ActivationRegistry) -> Result<Dnn> {
        self.validate()?;
        if input_width == 0 {
            return Err(NNError::InvalidConfiguration(
                "input width must be positive".to_string(),
            ));
        }

        let regularizer = Regularizer::L2(self.l2);
        let mut boundaries = vec![input_width];
        boundaries.extend(&self.hidden_units);

        let mut stages = Vec::with_capacity(self.hidden_units.len());
        for (i, pair) in boundaries.windows(2).enumerate() {
            let (fan_in, units) = (pair[0], pair[1]);
            let dense = Dense::new(fan_in, units, self.seed, regularizer)?;
            let bn = if self.use_bn {
                Some(BatchNorm::new(units))
            } else {
                None
            };
            let mut activation = registry.resolve(&self.activation)?;
            activation.build(units)?;
            let dropout = Dropout::new(self.dropout_rate, self.seed.wrapping_add(i as u64))?;

            debug!(
                "stage {}: kernel ({}, {}), activation {}, bn {}, dropout {}",
                i,
                fan_in,
                units,
                activation.name(),
                self.use_bn,
                self.dropout_rate
            );
            stages.push(Stage {
                dense,
                bn,
                activation,
                dropout,
            });
        }

        let dnn = Dnn {
            config: self.clone(),
            input_width,
            stages,
        };
        info!(
            "built DNN {:?} for input width {} ({} params)",
            self.hidden_units,
            input_width,
            dnn.count_params()
        );
        Ok(dnn)
    }
}

/// One affine stage with its optional normalization, activation and dropout.
#[derive(Debug)]
pub struct Stage {
    pub dense: Dense,
    pub bn: Option<BatchNorm>,
    pub activation: Box<dyn ActivationLayer>,
    pub dropout: Dropout,
}

impl Stage {
    fn forward(&mut self, a: Array2<f64>, mode: Mode) -> Result<Array2<f64>> {
        let z = self.dense.forward(&a)?;
        let z = match self.bn.as_mut() {
            Some(bn) if mode.is_training() => bn.forward_train(&z)?,
            Some(bn) => bn.forward(&z)?,
            None => z,
        };
        let a = if mode.is_training() {
            self.activation.call_training(z)?
        } else {
            self.activation.call(z)?
        };
        Ok(self.dropout.forward(a, mode))
    }

    fn predict(&self, a: Array2<f64>) -> Result<Array2<f64>> {
        let z = self.dense.forward(&a)?;
        let z = match &self.bn {
            Some(bn) => bn.forward(&z)?,
            None => z,
        };
        self.activation.call(z)
    }

    pub fn count_params(&self) -> usize {
        self.dense.count_params()
            + self.bn.as_ref().map_or(0, |bn| bn.count_params())
            + self.activation.count_params()
    }
}

/// A built feed-forward block: the configuration plus one [`Stage`] per hidden layer.
#[derive(Debug)]
pub struct Dnn {
    config: DnnConfig,
    input_width: usize,
    stages: Vec<Stage>,
}

impl Dnn {
    pub fn config(&self) -> &DnnConfig {
        &self.config
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn output_width(&self) -> usize {
        self.config.output_width(self.input_width)
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Parameters are exposed for the external trainer to update between calls.
    pub fn stages_mut(&mut self) -> &mut [Stage] {
        &mut self.stages
    }

    pub fn compute_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        match input_shape.last() {
            Some(&w) if w != self.input_width => Err(NNError::ShapeMismatch(format!(
                "block was built for width {}, got input shape {:?}",
                self.input_width, input_shape
            ))),
            _ => with_last_dim(input_shape, self.output_width()),
        }
    }

    pub fn forward(&mut self, x: &ArrayD<f64>, mode: Mode) -> Result<ArrayD<f64>> {
        let (mut a, lead) = to_matrix(x, self.input_width)?;
        for stage in self.stages.iter_mut() {
            a = stage.forward(a, mode)?;
        }
        from_matrix(a, &lead)
    }

    /// Inference-mode forward pass that leaves the block untouched.
    pub fn predict(&self, x: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        let (mut a, lead) = to_matrix(x, self.input_width)?;
        for stage in self.stages.iter() {
            a = stage.predict(a)?;
        }
        from_matrix(a, &lead)
    }

    /// Sum of the kernel and bias penalties, to be added to the training loss.
    pub fn regularization_loss(&self) -> f64 {
        self.stages.iter().map(|s| s.dense.penalty()).sum()
    }

    pub fn count_params(&self) -> usize {
        self.stages.iter().map(Stage::count_params).sum()
    }

    pub fn count_trainable_params(&self) -> usize {
        self.stages
            .iter()
            .map(|s| {
                s.dense.count_trainable_params()
                    + s.bn.as_ref().map_or(0, |bn| bn.count_trainable_params())
                    + s.activation.count_trainable_params()
            })
            .sum()
    }

    pub fn summary(&self) -> String {
        let mut res = "\nModel DNN\n".to_string();
        res.push_str("-------------------------------------------------------------\n");
        res.push_str("Layer (Type)\t\t Output shape\t\t No.of params\n");
        for stage in self.stages.iter() {
            let units = stage.dense.units();
            res.push_str(&format!(
                "{}\t\t\t  (None, {})\t\t  {}\n",
                stage.dense.typ(),
                units,
                stage.dense.count_params()
            ));
            if let Some(bn) = &stage.bn {
                res.push_str(&format!(
                    "{}\t  (None, {})\t\t  {}\n",
                    bn.typ(),
                    units,
                    bn.count_params()
                ));
            }
            res.push_str(&format!(
                "Activation ({})\t\t  (None, {})\t\t  {}\n",
                stage.activation.name(),
                units,
                stage.activation.count_params()
            ));
            if stage.dropout.rate() > 0.0 {
                res.push_str(&format!("{}\t\t\t  (None, {})\t\t  0\n", stage.dropout.typ(), units));
            }
        }
        res.push_str("-------------------------------------------------------------\n");
        res.push_str(&format!("Total params: {}\n", self.count_params()));
        res.push_str(&format!("Trainable params: {}\n", self.count_trainable_params()));
        res
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let checkpoint = Checkpoint {
            config: self.config.clone(),
            input_width: self.input_width,
            kernels: self.stages.iter().map(|s| s.dense.kernel.clone()).collect(),
            biases: self.stages.iter().map(|s| s.dense.bias.clone()).collect(),
            bn: self.stages.iter().map(|s| s.bn.clone()).collect(),
            activation_weights: self.stages.iter().map(|s| s.activation.get_weights()).collect(),
        };
        let encoded: Vec<u8> = bincode::serialize(&checkpoint)?;
        File::create(path)?.write_all(&encoded)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Dnn> {
        Self::load_with(path, &ActivationRegistry::default())
    }

    /// Rebuilds the block from its saved configuration, then restores every stage.
    pub fn load_with<P: AsRef<Path>>(path: P, registry: &ActivationRegistry) -> Result<Dnn> {
        let mut buffer = Vec::new();
        File::open(path)?.read_to_end(&mut buffer)?;
        let checkpoint: Checkpoint = bincode::deserialize(&buffer)?;

        let mut dnn = checkpoint.config.build_with(checkpoint.input_width, registry)?;
        let n = dnn.stages.len();
        if checkpoint.kernels.len() != n
            || checkpoint.biases.len() != n
            || checkpoint.bn.len() != n
            || checkpoint.activation_weights.len() != n
        {
            return Err(NNError::InvalidConfiguration(format!(
                "checkpoint holds a different number of stages than its configuration ({})",
                n
            )));
        }

        // regularizer, trainable flag and bn hyperparameters come from the configuration
        let restored = checkpoint
            .kernels
            .into_iter()
            .zip(checkpoint.biases)
            .zip(checkpoint.bn)
            .zip(checkpoint.activation_weights);
        for (stage, (((kernel, bias), bn), weights)) in dnn.stages.iter_mut().zip(restored) {
            if kernel.dim() != stage.dense.kernel.dim() || bias.len() != stage.dense.bias.len() {
                return Err(NNError::InvalidConfiguration(format!(
                    "checkpoint kernel {:?} does not match configured {:?}",
                    kernel.dim(),
                    stage.dense.kernel.dim()
                )));
            }
            stage.dense.kernel = kernel;
            stage.dense.bias = bias;

            match (stage.bn.as_mut(), bn) {
                (Some(target), Some(saved)) if saved.units() == target.units() => {
                    target.gamma = saved.gamma;
                    target.beta = saved.beta;
                    target.moving_mean = saved.moving_mean;
                    target.moving_variance = saved.moving_variance;
                }
                (None, None) => {}
                _ => {
                    return Err(NNError::InvalidConfiguration(
                        "checkpoint batch normalization does not match configuration".to_string(),
                    ))
                }
            }
            stage.activation.set_weights(weights)?;
        }
        Ok(dnn)
    }
}

impl LayerTrait for Dnn {
    fn typ(&self) -> String {
        "DNN".into()
    }

    fn count_params(&self) -> usize {
        Dnn::count_params(self)
    }

    fn count_trainable_params(&self) -> usize {
        Dnn::count_trainable_params(self)
    }
}

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    config: DnnConfig,
    input_width: usize,
    kernels: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
    bn: Vec<Option<BatchNorm>>,
    activation_weights: Vec<Vec<Array1<f64>>>,
}

/// A feed-forward block whose weights are allocated on the first call,
/// once the input width is known.
#[derive(Debug)]
pub enum LazyDnn {
    Unbuilt {
        config: DnnConfig,
        registry: ActivationRegistry,
    },
    Built(Dnn),
}

impl LazyDnn {
    pub fn new(config: DnnConfig) -> Self {
        Self::with_registry(config, ActivationRegistry::default())
    }

    pub fn with_registry(config: DnnConfig, registry: ActivationRegistry) -> Self {
        LazyDnn::Unbuilt { config, registry }
    }

    pub fn is_built(&self) -> bool {
        matches!(self, LazyDnn::Built(_))
    }

    pub fn config(&self) -> &DnnConfig {
        match self {
            LazyDnn::Unbuilt { config, .. } => config,
            LazyDnn::Built(dnn) => dnn.config(),
        }
    }

    pub fn built(&self) -> Option<&Dnn> {
        match self {
            LazyDnn::Built(dnn) => Some(dnn),
            LazyDnn::Unbuilt { .. } => None,
        }
    }

    /// Builds for the width of the first input seen, then forwards.
    pub fn call(&mut self, x: &ArrayD<f64>, mode: Mode) -> Result<ArrayD<f64>> {
        if let LazyDnn::Unbuilt { config, registry } = self {
            let width = *x.shape().last().ok_or_else(|| {
                NNError::ShapeMismatch("expected an input of rank >= 1, got a scalar".to_string())
            })?;
            let dnn = config.build_with(width, registry)?;
            *self = LazyDnn::Built(dnn);
        }
        match self {
            LazyDnn::Built(dnn) => dnn.forward(x, mode),
            LazyDnn::Unbuilt { .. } => Err(NNError::Other("block failed to build".to_string())),
        }
    }

    pub fn compute_output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        match self {
            LazyDnn::Unbuilt { config, .. } => config.compute_output_shape(input_shape),
            LazyDnn::Built(dnn) => dnn.compute_output_shape(input_shape),
        }
    }

    pub fn into_built(self) -> Option<Dnn> {
        match self {
            LazyDnn::Built(dnn) => Some(dnn),
            LazyDnn::Unbuilt { .. } => None,
        }
    }
}
