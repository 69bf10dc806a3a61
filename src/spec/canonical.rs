//! Canonical JSON form for dependency specs.
//!
//! Exactly one shape per node:
//!
//! { "dependencies": ["a", "b"], "meta": {...} }   // leaf
//! { "children": [ <node>, ... ], "meta": {...} }  // composite
//!
//! `meta` is optional on disk and defaults to empty. The discriminant is
//! which of the two keys is present, enforced strictly: a node carrying both
//! keys, neither key, or any unknown key is rejected instead of guessed at.

use crate::error::{Result, StoreError};
use crate::spec::{CompositeSpec, DependencySpec, LeafSpec, Meta};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::Path;

const LEAF_KEY: &str = "dependencies";
const CHILDREN_KEY: &str = "children";
const META_KEY: &str = "meta";

impl DependencySpec {
    /// The recursive JSON-compatible form. Stable across save/load cycles:
    /// leaf names are already sorted and map keys serialize in order.
    pub fn to_canonical_value(&self) -> Value {
        let mut node = Map::new();
        match self {
            DependencySpec::Leaf(leaf) => {
                node.insert(LEAF_KEY.to_string(), json!(leaf.names()));
                node.insert(META_KEY.to_string(), Value::Object(leaf.meta().clone()));
            }
            DependencySpec::Composite(composite) => {
                let children: Vec<Value> = composite
                    .children()
                    .iter()
                    .map(DependencySpec::to_canonical_value)
                    .collect();
                node.insert(CHILDREN_KEY.to_string(), Value::Array(children));
                node.insert(META_KEY.to_string(), Value::Object(composite.meta().clone()));
            }
        }
        Value::Object(node)
    }

    /// Rebuild a spec tree from its canonical form, re-running every
    /// construction invariant.
    pub fn from_canonical_value(value: &Value) -> Result<DependencySpec> {
        let Some(node) = value.as_object() else {
            return Err(StoreError::Shape(format!(
                "spec node must be a JSON object, got: {value}"
            )));
        };

        let has_deps = node.contains_key(LEAF_KEY);
        let has_children = node.contains_key(CHILDREN_KEY);
        if has_deps && has_children {
            return Err(StoreError::Shape(format!(
                "spec node has both {LEAF_KEY:?} and {CHILDREN_KEY:?}: {value}"
            )));
        }
        if !has_deps && !has_children {
            return Err(StoreError::Shape(format!(
                "spec node has neither {LEAF_KEY:?} nor {CHILDREN_KEY:?}: {value}"
            )));
        }

        let discriminant = if has_deps { LEAF_KEY } else { CHILDREN_KEY };
        for key in node.keys() {
            if key != discriminant && key != META_KEY {
                return Err(StoreError::Shape(format!(
                    "unknown key {key:?} in spec node: {value}"
                )));
            }
        }

        let meta: Meta = match node.get(META_KEY) {
            None => Meta::new(),
            Some(Value::Object(meta)) => meta.clone(),
            Some(other) => {
                return Err(StoreError::Shape(format!(
                    "{META_KEY:?} must be an object, got: {other}"
                )));
            }
        };

        if has_deps {
            let Some(entries) = node[LEAF_KEY].as_array() else {
                return Err(StoreError::Shape(format!(
                    "{LEAF_KEY:?} must be an array, got: {}",
                    node[LEAF_KEY]
                )));
            };
            let mut names = Vec::with_capacity(entries.len());
            for entry in entries {
                let Some(name) = entry.as_str() else {
                    return Err(StoreError::Validation(format!(
                        "dependency names must be strings, got: {entry}"
                    )));
                };
                names.push(name);
            }
            Ok(DependencySpec::Leaf(LeafSpec::with_meta(names, meta)?))
        } else {
            let Some(entries) = node[CHILDREN_KEY].as_array() else {
                return Err(StoreError::Shape(format!(
                    "{CHILDREN_KEY:?} must be an array, got: {}",
                    node[CHILDREN_KEY]
                )));
            };
            let mut children = Vec::with_capacity(entries.len());
            for entry in entries {
                children.push(DependencySpec::from_canonical_value(entry)?);
            }
            Ok(DependencySpec::Composite(CompositeSpec::with_meta(
                children, meta,
            )?))
        }
    }

    /// Write the canonical form as pretty-printed JSON text.
    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.to_canonical_value())
            .map_err(|err| StoreError::json(path, err))?;
        fs::write(path, text + "\n").map_err(|err| StoreError::io(path, err))
    }

    /// Read a canonical JSON spec file.
    pub fn load(path: &Path) -> Result<DependencySpec> {
        let text = fs::read_to_string(path).map_err(|err| StoreError::io(path, err))?;
        let value: Value = serde_json::from_str(&text).map_err(|err| StoreError::json(path, err))?;
        Self::from_canonical_value(&value)
    }
}
