//! Spec layer: the dependency tree + its canonical JSON form.
//!
//! This module is intentionally separate from container persistence. It owns:
//! - the spec sum type (leaf + composite) and its construction invariants
//! - merge / append / narrowing operations
//! - the canonical on-disk JSON shape

pub mod canonical;
pub mod node;

pub use node::{CompositeSpec, DependencySpec, LeafSpec, Meta};
