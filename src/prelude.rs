pub use serde::{Serialize, Deserialize};
pub use std::fs::File;
pub use std::io::{Read, Write};

pub use ndarray::*;
pub use ndarray_rand::RandomExt;
pub use ndarray_rand::rand_distr::Uniform;

pub use crate::models::{Dnn, DnnConfig, LazyDnn};
pub use crate::error::*;

// Internal re-exports
pub use crate::layers::{
    activation_layer,
    Activation,
    ActivationLayer,
    ActivationRegistry,
    ActivationSpec,
    BatchNorm,
    Dense,
    Dice,
    Dropout,
    LayerTrait,
    Mode,
    Regularizer,
};
