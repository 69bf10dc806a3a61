//! The opaque model boundary.

use std::any::Any;

/// Capability set required of any trained model handled by this crate.
///
/// The container never calls `fit` or `predict` itself; the bound exists so
/// a value lacking either capability cannot enter a container. Model-internal
/// failures are arbitrary, hence `anyhow::Result` at this boundary.
pub trait Estimator: std::fmt::Debug {
    fn fit(&mut self, x: &[Vec<f64>], y: &[Vec<f64>]) -> anyhow::Result<()>;

    fn predict(&self, x: &[Vec<f64>]) -> anyhow::Result<Vec<Vec<f64>>>;

    /// Concrete-type access for backends that only handle their own model
    /// family.
    fn as_any(&self) -> &dyn Any;
}
