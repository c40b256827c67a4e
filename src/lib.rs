pub mod error;
pub mod layers;
pub mod models;
pub mod prelude;
pub mod profiling;
pub mod utils;

// Re-export types
pub use crate::layers::{
    activation_layer, Activation, ActivationLayer, ActivationRegistry, ActivationSpec, BatchNorm,
    Dense, Dice, Dropout, LayerTrait, Mode, Regularizer,
};
pub use crate::models::{Dnn, DnnConfig, LazyDnn, Stage};
