//! Ordered model-serialization backends.
//!
//! Each backend is one save/load strategy that only handles its own model
//! family and errors on anything else. The registry walks its backends in
//! registration order and the first success wins; it is injected by the
//! caller, never discovered through global state.

use crate::error::{Result, StoreError};
use crate::model::Estimator;
use anyhow::Context;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::type_name;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;
use tracing::{debug, warn};

/// One save/load strategy for the opaque model object.
pub trait ModelBackend {
    /// Short name used in log events and diagnostics.
    fn name(&self) -> &'static str;

    fn save(&self, model: &dyn Estimator, path: &Path) -> anyhow::Result<()>;

    fn load(&self, path: &Path) -> anyhow::Result<Box<dyn Estimator>>;
}

/// Explicit, ordered list of backends.
#[derive(Default)]
pub struct BackendRegistry {
    backends: Vec<Box<dyn ModelBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
        }
    }

    pub fn register(&mut self, backend: Box<dyn ModelBackend>) {
        self.backends.push(backend);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, backend: Box<dyn ModelBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Try backends in registration order and stop at the first that saves
    /// without error. Returns the winning backend's name.
    pub fn save(&self, model: &dyn Estimator, path: &Path) -> Result<&'static str> {
        let mut last: Option<anyhow::Error> = None;
        for backend in &self.backends {
            debug!(backend = backend.name(), "trying model save");
            match backend.save(model, path) {
                Ok(()) => return Ok(backend.name()),
                Err(err) => {
                    warn!(backend = backend.name(), error = %err, "model save failed, trying next");
                    last = Some(err);
                }
            }
        }
        Err(exhausted(self.backends.len(), last))
    }

    /// Try backends in registration order; the first that returns a model
    /// without error is accepted. When every backend fails, the last
    /// underlying error is surfaced.
    pub fn load(&self, path: &Path) -> Result<Box<dyn Estimator>> {
        let mut last: Option<anyhow::Error> = None;
        for backend in &self.backends {
            debug!(backend = backend.name(), "trying model load");
            match backend.load(path) {
                Ok(model) => return Ok(model),
                Err(err) => {
                    warn!(backend = backend.name(), error = %err, "model load failed, trying next");
                    last = Some(err);
                }
            }
        }
        Err(exhausted(self.backends.len(), last))
    }
}

fn exhausted(tried: usize, last: Option<anyhow::Error>) -> StoreError {
    StoreError::BackendExhausted {
        tried,
        last: last.unwrap_or_else(|| anyhow::anyhow!("no backends registered")),
    }
}

/// Pretty-JSON strategy for any serde-serializable model type.
///
/// Saving a model of some other concrete type errors, so a mixed registry
/// falls through to the next backend.
pub struct JsonBackend<M> {
    _model: PhantomData<fn() -> M>,
}

impl<M> JsonBackend<M> {
    pub fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }
}

impl<M> Default for JsonBackend<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelBackend for JsonBackend<M>
where
    M: Estimator + Serialize + DeserializeOwned + 'static,
{
    fn name(&self) -> &'static str {
        "json"
    }

    fn save(&self, model: &dyn Estimator, path: &Path) -> anyhow::Result<()> {
        let model = model
            .as_any()
            .downcast_ref::<M>()
            .with_context(|| format!("model is not a {}", type_name::<M>()))?;
        let text = serde_json::to_string_pretty(model)?;
        fs::write(path, text).with_context(|| format!("write model file {}", path.display()))?;
        Ok(())
    }

    fn load(&self, path: &Path) -> anyhow::Result<Box<dyn Estimator>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("read model file {}", path.display()))?;
        let model: M = serde_json::from_str(&text)
            .with_context(|| format!("parse model file {}", path.display()))?;
        Ok(Box::new(model))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::any::Any;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct ConstantModel {
        value: f64,
    }

    impl Estimator for ConstantModel {
        fn fit(&mut self, _x: &[Vec<f64>], _y: &[Vec<f64>]) -> anyhow::Result<()> {
            Ok(())
        }

        fn predict(&self, x: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>> {
            Ok(x.iter().map(|_| vec![self.value]).collect())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Fails every save and load with a fixed message.
    struct BrokenBackend(&'static str);

    impl ModelBackend for BrokenBackend {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn save(&self, _model: &dyn Estimator, _path: &Path) -> anyhow::Result<()> {
            anyhow::bail!("{}", self.0)
        }

        fn load(&self, _path: &Path) -> anyhow::Result<Box<dyn Estimator>> {
            anyhow::bail!("{}", self.0)
        }
    }

    #[test]
    fn test_first_success_wins_over_later_backends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");

        let registry = BackendRegistry::new()
            .with(Box::new(JsonBackend::<ConstantModel>::new()))
            .with(Box::new(BrokenBackend("never reached")));

        let model = ConstantModel { value: 1.5 };
        assert_eq!(registry.save(&model, &path).unwrap(), "json");

        let loaded = registry.load(&path).unwrap();
        let loaded = loaded.as_any().downcast_ref::<ConstantModel>().unwrap();
        assert_eq!(loaded, &model);
    }

    #[test]
    fn test_falls_through_to_second_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");

        let registry = BackendRegistry::new()
            .with(Box::new(BrokenBackend("broken on purpose")))
            .with(Box::new(JsonBackend::<ConstantModel>::new()));

        let model = ConstantModel { value: -2.0 };
        assert_eq!(registry.save(&model, &path).unwrap(), "json");
        assert!(registry.load(&path).is_ok());
    }

    #[test]
    fn test_exhausted_surfaces_last_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model");

        let registry = BackendRegistry::new()
            .with(Box::new(BrokenBackend("first failure")))
            .with(Box::new(BrokenBackend("second failure")));

        let err = registry.load(&path).unwrap_err();
        match err {
            StoreError::BackendExhausted { tried, last } => {
                assert_eq!(tried, 2);
                assert!(last.to_string().contains("second failure"));
            }
            other => panic!("expected BackendExhausted, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_registry_is_exhausted() {
        let registry = BackendRegistry::new();
        let model = ConstantModel { value: 0.0 };

        let err = registry.save(&model, Path::new("unused")).unwrap_err();
        assert!(matches!(
            err,
            StoreError::BackendExhausted { tried: 0, .. }
        ));
    }
}
