//! Model persistence: dependency specs + restorable model directories.
//!
//! A training pipeline declares the named input/output columns a model
//! consumes and produces as a [`DependencySpec`] tree, then bundles that
//! declaration with the trained model and its evaluation metadata into a
//! directory artifact via [`ModelContainer`]. Serialization of the opaque
//! model object is delegated to an ordered [`BackendRegistry`].
//!
//! This crate is fully synchronous; all I/O is direct, blocking `std::fs`.

pub mod error;
pub mod model;
pub mod spec;

pub use error::{Result, StoreError};
pub use model::{BackendRegistry, Estimator, JsonBackend, ModelBackend, ModelContainer};
pub use spec::{CompositeSpec, DependencySpec, LeafSpec, Meta};
