//! Breadth-first walks over trees of nested structured instances
//!
//! Children of an instance are the structured instances among its values
//! (not mapping keys), including those held inside plain arrays and objects.
//! Every walk records the ids it has visited, so an instance reachable along
//! several paths, or through a cycle, is visited exactly once.
//!
//! ## Failure semantics
//!
//! - [`validate_tree`] stops at the first failing instance in BFS order.
//! - [`validate_tree_all`] keeps going and reports every failing instance.
//! - [`freeze_tree`] validates each instance before freezing it. A failure
//!   aborts the walk; instances frozen earlier in the walk stay frozen.

use crate::mapping::MappingType;
use crate::record::RecordType;
use crate::sequence::SequenceType;
use crate::structured::{Instance, StructuredType};
use crate::value::Value;
use rustc_hash::FxHashSet;
use std::any::Any;
use std::collections::VecDeque;
use strata_core::{SchemaConfig, StrataError, StrataResult, TraversalLimits};
use tracing::debug;

/// Query-form result: `(true, None)` or `(false, Some(message))`
pub type TreeReport = (bool, Option<String>);

/// True iff `value` is an instance of any structured family
pub fn is_structured_instance(value: &Value) -> bool {
    matches!(value, Value::Instance(_))
}

/// True iff `candidate` is a structured type of any family
pub fn is_structured_type(candidate: &dyn Any) -> bool {
    candidate.is::<RecordType>()
        || candidate.is::<SequenceType>()
        || candidate.is::<MappingType>()
        || candidate.is::<StructuredType>()
}

/// Structured instances directly held by `instance`, in enumeration order
///
/// Plain arrays and objects are looked through; instances are not.
pub fn nested_children(instance: &Instance) -> Vec<Instance> {
    let mut children = Vec::new();
    for value in instance.values() {
        collect_instances(&value, &mut children);
    }
    children
}

fn collect_instances(value: &Value, out: &mut Vec<Instance>) {
    match value {
        Value::Instance(child) => out.push(child.clone()),
        Value::Array(items) => items.iter().for_each(|v| collect_instances(v, out)),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                collect_instances(&map[key], out);
            }
        }
        _ => {}
    }
}

fn rejection(instance: &Instance, reason: &str) -> String {
    format!("{}: {}", instance.type_name(), reason)
}

/// Tree walker with configurable limits
#[derive(Debug, Clone, Default)]
pub struct TreeWalker {
    limits: TraversalLimits,
}

impl TreeWalker {
    /// Walker with explicit limits
    pub fn new(limits: TraversalLimits) -> Self {
        TreeWalker { limits }
    }

    /// Walker using the `[traversal]` section of a config
    pub fn from_config(config: &SchemaConfig) -> Self {
        Self::new(config.traversal.clone())
    }

    /// Active limits
    pub fn limits(&self) -> &TraversalLimits {
        &self.limits
    }

    /// Visit every reachable instance once in BFS order; returns the count
    ///
    /// `visit` runs before the node's children are enqueued, so a node that
    /// fails is never expanded.
    fn walk<F>(&self, root: &Instance, mut visit: F) -> StrataResult<usize>
    where
        F: FnMut(&Instance) -> StrataResult<()>,
    {
        let mut seen: FxHashSet<u64> = FxHashSet::default();
        let mut frontier = VecDeque::new();
        seen.insert(root.id());
        frontier.push_back(root.clone());

        let mut visited = 0usize;
        while let Some(node) = frontier.pop_front() {
            visited += 1;
            if let Some(max) = self.limits.max_nodes {
                if visited > max {
                    return Err(StrataError::validation(format!(
                        "traversal exceeded {} instances",
                        max
                    )));
                }
            }
            visit(&node)?;
            for child in nested_children(&node) {
                if seen.insert(child.id()) {
                    frontier.push_back(child);
                }
            }
        }
        Ok(visited)
    }

    /// Run every reachable instance's cross-validator; stop at the first failure
    pub fn validate(&self, root: &Instance) -> TreeReport {
        let outcome = self.walk(root, |node| match node.check() {
            None => Ok(()),
            Some(reason) => Err(StrataError::validation(rejection(node, &reason))),
        });
        match outcome {
            Ok(visited) => {
                debug!(target: "strata::schema", root = root.id(), visited, "tree valid");
                (true, None)
            }
            Err(e) => (false, Some(e.message().to_string())),
        }
    }

    /// Like [`TreeWalker::validate`] but collects every failure in BFS order
    ///
    /// Failing instances are still expanded so failures below them are found.
    pub fn validate_all(&self, root: &Instance) -> Vec<String> {
        let mut failures = Vec::new();
        let outcome = self.walk(root, |node| {
            if let Some(reason) = node.check() {
                failures.push(rejection(node, &reason));
            }
            Ok(())
        });
        if let Err(e) = outcome {
            failures.push(e.message().to_string());
        }
        failures
    }

    /// Validate then freeze every reachable instance; returns `root`
    ///
    /// # Errors
    ///
    /// Validation error naming the first instance whose cross-validator
    /// rejects, or the node limit. Instances frozen before the failure stay
    /// frozen.
    pub fn freeze(&self, root: &Instance) -> StrataResult<Instance> {
        let mut newly_frozen = 0usize;
        let outcome = self.walk(root, |node| {
            if let Some(reason) = node.check() {
                return Err(StrataError::validation(rejection(node, &reason)));
            }
            if node.mark_frozen() {
                newly_frozen += 1;
            }
            Ok(())
        });
        match outcome {
            Ok(visited) => {
                debug!(target: "strata::schema", root = root.id(), visited, newly_frozen, "tree frozen");
                Ok(root.clone())
            }
            Err(e) => {
                debug!(
                    target: "strata::schema",
                    root = root.id(),
                    newly_frozen,
                    error = %e,
                    "tree freeze aborted"
                );
                Err(e)
            }
        }
    }
}

/// [`TreeWalker::validate`] without limits
pub fn validate_tree(root: &Instance) -> TreeReport {
    TreeWalker::default().validate(root)
}

/// [`TreeWalker::validate_all`] without limits
pub fn validate_tree_all(root: &Instance) -> Vec<String> {
    TreeWalker::default().validate_all(root)
}

/// [`TreeWalker::freeze`] without limits
pub fn freeze_tree(root: &Instance) -> StrataResult<Instance> {
    TreeWalker::default().freeze(root)
}
