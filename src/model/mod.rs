//! Model side: the opaque estimator boundary, serialization backends, and
//! the restorable directory container.

pub mod backend;
pub mod container;
pub mod estimator;

pub use backend::{BackendRegistry, JsonBackend, ModelBackend};
pub use container::{
    EXTRAS_FILENAME, MODEL_FILENAME, ModelContainer, X_SPEC_FILENAME, Y_SPEC_FILENAME,
};
pub use estimator::Estimator;
