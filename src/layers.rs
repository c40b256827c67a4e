// src/layers.rs
pub mod activation;
pub mod core;
pub mod dice;
pub mod initializers;
pub mod normalization;
pub mod regularizers;
pub mod resolver;

// Re-export commonly used items
pub use activation::{Activation, ActivationLayer};
pub use self::core::{Dense, Dropout, LayerTrait, Mode};
pub use dice::Dice;
pub use normalization::BatchNorm;
pub use regularizers::Regularizer;
pub use resolver::{activation_layer, ActivationFactory, ActivationRegistry, ActivationSpec};
