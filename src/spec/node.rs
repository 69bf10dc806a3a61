//! Dependency spec tree: leaf + composite variants.
//!
//! A leaf holds the names of the columns a model reads or writes, kept in
//! canonical (lexicographic) order. A composite groups child specs so a
//! pipeline can declare blocks of columns separately. The flattened names of
//! any node must be unique across the whole tree: the same column declared
//! twice is a pipeline bug and is rejected, never deduplicated.

use crate::error::{Result, StoreError};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Free-form metadata attached to every spec node.
pub type Meta = serde_json::Map<String, Value>;

/// A flat set of dependency names plus metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafSpec {
    /// Always sorted; uniqueness checked at construction.
    names: Vec<String>,
    meta: Meta,
}

/// A non-empty ordered sequence of child specs plus its own metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeSpec {
    children: Vec<DependencySpec>,
    meta: Meta,
}

/// Either variant of the spec tree.
#[derive(Debug, Clone, PartialEq)]
pub enum DependencySpec {
    Leaf(LeafSpec),
    Composite(CompositeSpec),
}

impl LeafSpec {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_meta(names, Meta::new())
    }

    pub fn with_meta<I, S>(names: I, meta: Meta) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(StoreError::Validation(
                "a leaf spec needs at least 1 dependency name".to_string(),
            ));
        }

        names.sort();
        // Duplicates are adjacent after sorting.
        for pair in names.windows(2) {
            if pair[0] == pair[1] {
                return Err(StoreError::Validation(format!(
                    "duplicate dependency name in leaf spec: {}",
                    pair[0]
                )));
            }
        }

        Ok(Self { names, meta })
    }

    /// Names in canonical order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Sorted, deduplicated union with another leaf. Metadata stays this
    /// leaf's own; the other side's metadata describes the other spec, not
    /// the result.
    pub fn merge(&self, other: &LeafSpec) -> LeafSpec {
        self.merge_names(other.names.iter().map(String::as_str))
    }

    /// Union with an arbitrary set of names.
    pub fn merge_names<I, S>(&self, names: I) -> LeafSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: BTreeSet<String> = self.names.iter().cloned().collect();
        set.extend(names.into_iter().map(Into::into));
        LeafSpec {
            names: set.into_iter().collect(),
            meta: self.meta.clone(),
        }
    }

    /// In-place variant of [`merge`](Self::merge).
    pub fn merge_from(&mut self, other: &LeafSpec) {
        let mut set: BTreeSet<String> = std::mem::take(&mut self.names).into_iter().collect();
        set.extend(other.names.iter().cloned());
        self.names = set.into_iter().collect();
    }
}

impl Add<&LeafSpec> for &LeafSpec {
    type Output = LeafSpec;

    fn add(self, rhs: &LeafSpec) -> LeafSpec {
        self.merge(rhs)
    }
}

impl Add<&str> for &LeafSpec {
    type Output = LeafSpec;

    fn add(self, rhs: &str) -> LeafSpec {
        self.merge_names([rhs])
    }
}

impl AddAssign<&LeafSpec> for LeafSpec {
    fn add_assign(&mut self, rhs: &LeafSpec) {
        self.merge_from(rhs);
    }
}

impl CompositeSpec {
    pub fn new(children: Vec<DependencySpec>) -> Result<Self> {
        Self::with_meta(children, Meta::new())
    }

    pub fn with_meta(children: Vec<DependencySpec>, meta: Meta) -> Result<Self> {
        if children.is_empty() {
            return Err(StoreError::Validation(
                "a composite spec needs at least 1 child".to_string(),
            ));
        }

        let spec = Self { children, meta };
        check_tree_unique(&spec.flattened())?;
        Ok(spec)
    }

    pub fn children(&self) -> &[DependencySpec] {
        &self.children
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    /// Append a child spec. The flattened names of the grown tree must stay
    /// unique; a clash is rejected outright so a column declared twice never
    /// slips through as a silent dedup.
    pub fn append(&mut self, child: impl Into<DependencySpec>) -> Result<()> {
        let child = child.into();

        let existing: BTreeSet<&str> = self.flattened().into_iter().collect();
        let clashes: Vec<&str> = child
            .dependencies()
            .into_iter()
            .filter(|name| existing.contains(name))
            .collect();
        if !clashes.is_empty() {
            return Err(StoreError::Disjointness(format!(
                "cannot append child: already in tree: {}",
                clashes.join(", ")
            )));
        }

        self.children.push(child);
        Ok(())
    }

    fn flattened(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for child in &self.children {
            out.extend(child.dependencies());
        }
        out
    }
}

impl From<LeafSpec> for DependencySpec {
    fn from(leaf: LeafSpec) -> Self {
        DependencySpec::Leaf(leaf)
    }
}

impl From<CompositeSpec> for DependencySpec {
    fn from(composite: CompositeSpec) -> Self {
        DependencySpec::Composite(composite)
    }
}

impl DependencySpec {
    /// Depth-first flattened name list: a leaf's own sorted names, or the
    /// concatenation of every leaf under a composite.
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            DependencySpec::Leaf(leaf) => leaf.names.iter().map(String::as_str).collect(),
            DependencySpec::Composite(composite) => composite.flattened(),
        }
    }

    pub fn len(&self) -> usize {
        self.dependencies().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn meta(&self) -> &Meta {
        match self {
            DependencySpec::Leaf(leaf) => &leaf.meta,
            DependencySpec::Composite(composite) => &composite.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        match self {
            DependencySpec::Leaf(leaf) => &mut leaf.meta,
            DependencySpec::Composite(composite) => &mut composite.meta,
        }
    }

    /// Narrow to a single named dependency. The result carries a copy of
    /// this node's metadata.
    pub fn select(&self, name: &str) -> Result<LeafSpec> {
        if !self.dependencies().contains(&name) {
            return Err(StoreError::Validation(format!(
                "dependency {name} not found in dependencies"
            )));
        }
        LeafSpec::with_meta([name], self.meta().clone())
    }

    /// Narrow to the dependency at a flattened position (sorted order for a
    /// leaf).
    pub fn select_at(&self, index: usize) -> Result<LeafSpec> {
        let deps = self.dependencies();
        let Some(name) = deps.get(index) else {
            return Err(StoreError::Validation(format!(
                "dependency index {index} out of range (len {})",
                deps.len()
            )));
        };
        LeafSpec::with_meta([*name], self.meta().clone())
    }

    /// Narrow to a subset of named dependencies. Every name must be present;
    /// the result is re-sorted to canonical order.
    pub fn select_many<S: AsRef<str>>(&self, names: &[S]) -> Result<LeafSpec> {
        let deps: BTreeSet<&str> = self.dependencies().into_iter().collect();
        for name in names {
            if !deps.contains(name.as_ref()) {
                return Err(StoreError::Validation(format!(
                    "dependency {} not found in dependencies",
                    name.as_ref()
                )));
            }
        }
        LeafSpec::with_meta(names.iter().map(|n| n.as_ref()), self.meta().clone())
    }
}

impl<'a> IntoIterator for &'a DependencySpec {
    type Item = &'a str;
    type IntoIter = std::vec::IntoIter<&'a str>;

    fn into_iter(self) -> Self::IntoIter {
        self.dependencies().into_iter()
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencySpec::Leaf(leaf) => {
                write!(f, "leaf spec: {}", leaf.names.join(", "))
            }
            DependencySpec::Composite(composite) => {
                write!(f, "composite spec with dependencies:")?;
                for name in composite.flattened() {
                    write!(f, "\n  {name}")?;
                }
                Ok(())
            }
        }
    }
}

/// Reject a flattened name list containing repeats, listing every violator
/// with its occurrence count.
fn check_tree_unique(flattened: &[&str]) -> Result<()> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for name in flattened {
        *counts.entry(name).or_default() += 1;
    }

    let violators: Vec<String> = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(name, n)| format!("{name} ({n}x)"))
        .collect();
    if !violators.is_empty() {
        return Err(StoreError::Validation(format!(
            "dependencies appear multiple times in tree: {}",
            violators.join(", ")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn leaf(names: &[&str]) -> LeafSpec {
        LeafSpec::new(names.iter().copied()).unwrap()
    }

    fn meta_with(key: &str, value: &str) -> Meta {
        let mut meta = Meta::new();
        meta.insert(key.to_string(), Value::String(value.to_string()));
        meta
    }

    #[test]
    fn test_leaf_names_are_sorted() {
        let spec = leaf(&["zeta", "alpha", "mid"]);
        assert_eq!(spec.names(), ["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_leaf_rejects_duplicates() {
        let err = LeafSpec::new(["a", "a"]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(format!("{err}").contains("duplicate"));
    }

    #[test]
    fn test_leaf_rejects_empty() {
        let err = LeafSpec::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_merge_is_sorted_union_with_left_meta() {
        let left = LeafSpec::with_meta(["x", "y"], meta_with("origin", "left")).unwrap();
        let right = LeafSpec::with_meta(["y", "z"], meta_with("origin", "right")).unwrap();

        let merged = left.merge(&right);
        assert_eq!(merged.names(), ["x", "y", "z"]);
        assert_eq!(merged.meta(), &meta_with("origin", "left"));
    }

    #[test]
    fn test_add_operators() {
        let a = leaf(&["x", "y"]);
        let b = leaf(&["y", "z"]);

        assert_eq!((&a + &b).names(), ["x", "y", "z"]);
        assert_eq!((&a + "w").names(), ["w", "x", "y"]);

        let mut c = a.clone();
        c += &b;
        assert_eq!(c.names(), ["x", "y", "z"]);
    }

    #[test]
    fn test_merge_names_accepts_any_iterable() {
        let spec = leaf(&["b"]);
        let merged = spec.merge_names(vec!["a".to_string(), "c".to_string()]);
        assert_eq!(merged.names(), ["a", "b", "c"]);
    }

    #[test]
    fn test_composite_rejects_duplicate_across_children() {
        let err = CompositeSpec::new(vec![leaf(&["x"]).into(), leaf(&["x"]).into()]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        assert!(format!("{err}").contains("x (2x)"));
    }

    #[test]
    fn test_composite_rejects_empty_children() {
        let err = CompositeSpec::new(Vec::new()).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_composite_flattens_depth_first() {
        let inner = CompositeSpec::new(vec![leaf(&["c", "b"]).into()]).unwrap();
        let outer =
            CompositeSpec::new(vec![leaf(&["a"]).into(), inner.into(), leaf(&["d"]).into()])
                .unwrap();

        let spec = DependencySpec::Composite(outer);
        assert_eq!(spec.dependencies(), ["a", "b", "c", "d"]);
        assert_eq!(spec.len(), 4);
    }

    #[test]
    fn test_append_rejects_overlap() {
        let mut composite = CompositeSpec::new(vec![leaf(&["a", "b"]).into()]).unwrap();

        let err = composite.append(leaf(&["a"])).unwrap_err();
        assert!(matches!(err, StoreError::Disjointness(_)));
        assert!(format!("{err}").contains('a'));

        composite.append(leaf(&["c"])).unwrap();
        let spec = DependencySpec::Composite(composite);
        assert_eq!(spec.dependencies(), ["a", "b", "c"]);
    }

    #[test]
    fn test_select_single_name() {
        let spec = DependencySpec::Leaf(LeafSpec::with_meta(
            ["x", "y", "z"],
            meta_with("block", "input"),
        )
        .unwrap());

        let narrowed = spec.select("y").unwrap();
        assert_eq!(narrowed.names(), ["y"]);
        assert_eq!(narrowed.meta(), &meta_with("block", "input"));

        let err = spec.select("missing").unwrap_err();
        assert!(format!("{err}").contains("missing"));
    }

    #[test]
    fn test_select_at_uses_sorted_position() {
        let spec = DependencySpec::Leaf(leaf(&["z", "x", "y"]));
        assert_eq!(spec.select_at(0).unwrap().names(), ["x"]);
        assert!(spec.select_at(3).is_err());
    }

    #[test]
    fn test_select_many_resorts_and_checks_presence() {
        let spec = DependencySpec::Leaf(leaf(&["x", "y", "z"]));

        let narrowed = spec.select_many(&["z", "x"]).unwrap();
        assert_eq!(narrowed.names(), ["x", "z"]);

        assert!(spec.select_many(&["x", "nope"]).is_err());
    }

    #[test]
    fn test_narrowed_meta_is_a_copy() {
        let mut spec = DependencySpec::Leaf(LeafSpec::with_meta(
            ["x", "y"],
            meta_with("origin", "parent"),
        )
        .unwrap());

        let mut narrowed = spec.select("x").unwrap();
        narrowed
            .meta_mut()
            .insert("origin".to_string(), Value::String("child".to_string()));

        assert_eq!(spec.meta(), &meta_with("origin", "parent"));
        spec.meta_mut().clear();
        assert_eq!(narrowed.meta(), &meta_with("origin", "child"));
    }

    #[test]
    fn test_iteration_matches_dependencies() {
        let spec = DependencySpec::Leaf(leaf(&["b", "a"]));
        let collected: Vec<&str> = (&spec).into_iter().collect();
        assert_eq!(collected, ["a", "b"]);
    }
}
