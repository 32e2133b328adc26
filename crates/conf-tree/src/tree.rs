//! In-memory configuration tree
//!
//! Order-preserving tree used by the CLI (loaded from a JSON document) and
//! by tests. Multi-valued nodes report their values in insertion order.

use indexmap::IndexMap;
use serde_json::Value;

use crate::accessor::ConfigAccessor;

#[derive(Debug, Clone, Default)]
struct Node {
    values: Vec<String>,
    children: IndexMap<String, Node>,
}

/// Path-addressed configuration tree
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
    root: Node,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty node at `path`, creating intermediate nodes as needed
    pub fn touch(&mut self, path: &[&str]) {
        let mut node = &mut self.root;
        for segment in path {
            node = node.children.entry(segment.to_string()).or_default();
        }
    }

    /// Append `value` at `path`, creating intermediate nodes as needed.
    ///
    /// Calling `set` repeatedly on the same path builds a multi-valued node;
    /// values are reported back in the order they were set.
    pub fn set(&mut self, path: &[&str], value: &str) {
        let mut node = &mut self.root;
        for segment in path {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.values.push(value.to_string());
    }

    /// Remove the subtree at `path`; absent paths are ignored
    pub fn delete(&mut self, path: &[&str]) {
        let Some((last, parents)) = path.split_last() else {
            self.root = Node::default();
            return;
        };
        let mut node = &mut self.root;
        for segment in parents {
            match node.children.get_mut(*segment) {
                Some(child) => node = child,
                None => return,
            }
        }
        node.children.shift_remove(*last);
    }

    /// Build a tree from a JSON document.
    ///
    /// Objects become subtrees, scalars become single values, arrays of
    /// scalars become multi-valued nodes, and `null` marks a valueless
    /// (presence-only) node.
    pub fn from_json(doc: &Value) -> Self {
        let mut tree = Self::new();
        build_node(&mut tree.root, doc);
        tree
    }

    fn find(&self, path: &[&str]) -> Option<&Node> {
        let mut node = &self.root;
        for segment in path {
            node = node.children.get(*segment)?;
        }
        Some(node)
    }
}

fn build_node(node: &mut Node, doc: &Value) {
    match doc {
        Value::Object(map) => {
            for (key, value) in map {
                let child = node.children.entry(key.clone()).or_default();
                build_node(child, value);
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(s) => node.values.push(s.clone()),
                    other => node.values.push(other.to_string()),
                }
            }
        }
        Value::String(s) => node.values.push(s.clone()),
        Value::Null => {}
        other => node.values.push(other.to_string()),
    }
}

impl ConfigAccessor for ConfigTree {
    fn exists(&self, path: &[&str]) -> bool {
        self.find(path).is_some()
    }

    fn value(&self, path: &[&str]) -> Option<String> {
        self.find(path).and_then(|n| n.values.first().cloned())
    }

    fn values(&self, path: &[&str]) -> Vec<String> {
        self.find(path).map(|n| n.values.clone()).unwrap_or_default()
    }
}
