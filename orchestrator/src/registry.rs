use std::sync::Arc;

use machine_learning::{
    augment::{Augmenter, GaussianNoise, HorizontalFlip},
    network::{Bigram, Mlp, Network},
};

use crate::{
    config::InputterConfig,
    error::{OrchestratorError, Result},
    inputter::{self, Inputter, InputterArgs},
    modeler::{self, Modeler, ModelerArgs},
};

/// Builds a `T` from the arguments `A`.
pub type Factory<T, A> = fn(&A) -> Result<Box<T>>;

/// Maps names to factories, resolved once at startup.
pub struct Registry<T: ?Sized, A> {
    kind: &'static str,
    entries: Vec<(&'static str, Factory<T, A>)>,
}

impl<T: ?Sized, A> Registry<T, A> {
    /// Creates an empty registry of `kind` entries, used in errors.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Adds `factory` under `name`, replacing a previous entry with the same name.
    pub fn register(mut self, name: &'static str, factory: Factory<T, A>) -> Self {
        self.entries.retain(|(n, _)| *n != name);
        self.entries.push((name, factory));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    /// Builds the entry registered under `name`.
    ///
    /// # Errors
    /// `Configuration` if no entry has that name, or whatever the factory fails with.
    pub fn resolve(&self, name: &str, args: &A) -> Result<Box<T>> {
        let Some((_, factory)) = self.entries.iter().find(|(n, _)| *n == name) else {
            return Err(OrchestratorError::Configuration(format!(
                "unknown {} `{name}`, expected one of: {}",
                self.kind,
                self.names().collect::<Vec<_>>().join(", ")
            )));
        };

        factory(args)
    }

    /// Builds every entry of `names`, in order.
    pub fn resolve_list<S: AsRef<str>>(&self, names: &[S], args: &A) -> Result<Vec<Box<T>>> {
        names.iter().map(|name| self.resolve(name.as_ref(), args)).collect()
    }
}

pub fn networks() -> Registry<dyn Network, ()> {
    Registry::<dyn Network, ()>::new("network")
        .register("mlp", |_| Ok(Box::new(Mlp::new())))
        .register("bigram", |_| Ok(Box::new(Bigram::new())))
}

pub fn augmenters() -> Registry<dyn Augmenter, InputterConfig> {
    Registry::<dyn Augmenter, InputterConfig>::new("augmenter")
        .register("gaussian_noise", |config| {
            Ok(Box::new(GaussianNoise::new(config.noise_std_dev)?))
        })
        .register("horizontal_flip", |_| Ok(Box::new(HorizontalFlip::default())))
}

pub fn inputters() -> Registry<dyn Inputter, InputterArgs> {
    Registry::<dyn Inputter, InputterArgs>::new("inputter")
        .register("image_classification_csv", |args| {
            Ok(Box::new(inputter::ImageClassificationCsv::new(args.clone())?))
        })
        .register("synthetic", |args| {
            Ok(Box::new(inputter::SyntheticClassification::new(args.clone())?))
        })
        .register("text_generation", |args| {
            Ok(Box::new(inputter::TextGeneration::new(args.clone())?))
        })
}

pub fn modelers() -> Registry<dyn Modeler, ModelerArgs> {
    Registry::<dyn Modeler, ModelerArgs>::new("modeler")
        .register("image_classification", |args| {
            Ok(Box::new(modeler::ImageClassification::new(args.clone())))
        })
        .register("text_generation", |args| {
            Ok(Box::new(modeler::TextGeneration::new(args.clone())))
        })
}

/// Resolves a network, sharing it between the modeler and any exported model.
pub fn network(name: &str) -> Result<Arc<dyn Network>> {
    networks().resolve(name, &()).map(Arc::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve() {
        assert_eq!(network("mlp").unwrap().name(), "mlp");
        assert_eq!(network("bigram").unwrap().name(), "bigram");
    }

    #[test]
    fn unknown_names_list_the_known_ones() {
        let err = network("resnet").err().unwrap();

        assert!(matches!(
            err,
            OrchestratorError::Configuration(msg) if msg.contains("resnet") && msg.contains("mlp, bigram")
        ));
    }

    #[test]
    fn later_registrations_replace_earlier_ones() {
        let registry = networks().register("mlp", |_| Ok(Box::new(Bigram::new())));

        assert_eq!(registry.names().count(), 2);
        assert_eq!(registry.resolve("mlp", &()).unwrap().name(), "bigram");
    }

    #[test]
    fn lists_resolve_in_order_and_fail_on_any_unknown_name() {
        let nets = networks().resolve_list(&["bigram", "mlp"], &()).unwrap();
        let names: Vec<&str> = nets.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["bigram", "mlp"]);

        assert!(networks().resolve_list(&["mlp", "vgg"], &()).is_err());
    }

    #[test]
    fn every_registry_lists_its_builtins() {
        let augmenters = augmenters();
        let config = InputterConfig::default();
        for name in ["gaussian_noise", "horizontal_flip"] {
            assert_eq!(augmenters.resolve(name, &config).unwrap().name(), name);
        }

        let inputters: Vec<_> = inputters().names().collect();
        assert_eq!(
            inputters,
            vec!["image_classification_csv", "synthetic", "text_generation"]
        );

        let modelers: Vec<_> = modelers().names().collect();
        assert_eq!(modelers, vec!["image_classification", "text_generation"]);
    }
}
