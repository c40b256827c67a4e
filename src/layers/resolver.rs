use crate::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

/// Constructs a fresh, unbuilt activation layer.
pub type ActivationFactory = fn() -> Box<dyn ActivationLayer>;

/// How an activation is named in a configuration.
///
/// `Name` selects a built-in transform; `Layer` refers to a custom layer type
/// registered in an [`ActivationRegistry`] under that key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivationSpec {
    Name(String),
    Layer(String),
}

impl ActivationSpec {
    pub fn name(name: &str) -> Self {
        ActivationSpec::Name(name.to_string())
    }

    pub fn layer(key: &str) -> Self {
        ActivationSpec::Layer(key.to_string())
    }
}

impl Default for ActivationSpec {
    fn default() -> Self {
        ActivationSpec::Name(Activation::Relu.as_str().to_string())
    }
}

impl From<&str> for ActivationSpec {
    fn from(name: &str) -> Self {
        ActivationSpec::name(name)
    }
}

impl From<Activation> for ActivationSpec {
    fn from(activation: Activation) -> Self {
        ActivationSpec::name(activation.as_str())
    }
}

impl fmt::Display for ActivationSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ActivationSpec::Name(name) => write!(f, "'{}'", name),
            ActivationSpec::Layer(key) => write!(f, "layer '{}'", key),
        }
    }
}

fn construct<T: ActivationLayer + Default + 'static>() -> Box<dyn ActivationLayer> {
    Box::new(T::default())
}

/// Custom activation layer types known to the resolver, keyed by name.
///
/// The default registry knows [`Dice`]; use [`ActivationRegistry::empty`] for none.
#[derive(Debug, Clone)]
pub struct ActivationRegistry {
    layers: BTreeMap<String, ActivationFactory>,
}

impl ActivationRegistry {
    pub fn empty() -> Self {
        Self {
            layers: BTreeMap::new(),
        }
    }

    /// Registers a layer type that can be constructed without arguments.
    pub fn register<T: ActivationLayer + Default + 'static>(&mut self, key: &str) -> &mut Self {
        self.layers.insert(key.to_string(), construct::<T> as ActivationFactory);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.layers.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(String::as_str)
    }

    pub fn resolve(&self, spec: &ActivationSpec) -> Result<Box<dyn ActivationLayer>> {
        match spec {
            ActivationSpec::Name(name) => match Activation::from_name(name) {
                Some(activation) => Ok(Box::new(activation)),
                None => Err(invalid_activation(spec)),
            },
            ActivationSpec::Layer(key) => match self.layers.get(key) {
                Some(factory) => Ok(factory()),
                None => Err(invalid_activation(spec)),
            },
        }
    }
}

impl Default for ActivationRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register::<Dice>("Dice");
        registry
    }
}

pub(crate) fn invalid_activation(spec: &ActivationSpec) -> NNError {
    NNError::InvalidConfiguration(format!(
        "invalid activation, found {}; use a built-in activation name or a registered activation layer",
        spec
    ))
}

/// Resolves `spec` against the default registry.
pub fn activation_layer(spec: &ActivationSpec) -> Result<Box<dyn ActivationLayer>> {
    ActivationRegistry::default().resolve(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Square;

    impl ActivationLayer for Square {
        fn name(&self) -> String {
            "Square".into()
        }

        fn call(&self, x: Array2<f64>) -> Result<Array2<f64>> {
            Ok(x.mapv_into(|v| v * v))
        }
    }

    #[test]
    fn test_resolves_builtin_names() {
        let relu = activation_layer(&"relu".into()).unwrap();
        assert_eq!(relu.name(), "relu");
        assert_eq!(relu.call(array![[-1.0, 2.0]]).unwrap(), array![[0.0, 2.0]]);

        let sigmoid = activation_layer(&Activation::Sigmoid.into()).unwrap();
        assert_eq!(sigmoid.name(), "sigmoid");
    }

    #[test]
    fn test_unknown_name_is_invalid_configuration() {
        match activation_layer(&"not_an_activation".into()) {
            Err(NNError::InvalidConfiguration(msg)) => assert!(msg.contains("not_an_activation")),
            other => panic!("expected InvalidConfiguration, got {:?}", other),
        }
    }

    #[test]
    fn test_custom_layer_registration() {
        let mut registry = ActivationRegistry::empty();
        assert!(matches!(
            registry.resolve(&ActivationSpec::layer("Square")),
            Err(NNError::InvalidConfiguration(_))
        ));

        registry.register::<Square>("Square");
        let square = registry.resolve(&ActivationSpec::layer("Square")).unwrap();
        assert_eq!(square.call(array![[3.0]]).unwrap(), array![[9.0]]);
    }

    #[test]
    fn test_default_registry_knows_dice() {
        let registry = ActivationRegistry::default();
        assert!(registry.contains("Dice"));
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["Dice"]);

        let dice = activation_layer(&ActivationSpec::layer("Dice")).unwrap();
        assert_eq!(dice.name(), "Dice");
    }

    #[test]
    fn test_each_resolution_is_a_fresh_instance() {
        let spec = ActivationSpec::layer("Dice");
        let mut a = activation_layer(&spec).unwrap();
        let b = activation_layer(&spec).unwrap();
        a.build(3).unwrap();
        assert_eq!(a.count_params(), 15);
        assert_eq!(b.count_params(), 0);
    }
}
