//! Forest - in-memory arena for parent/child hierarchies
//!
//! Both hierarchies in the system (the Type taxonomy and the IP composition
//! tree) are adjacency lists in storage. `Forest` loads a set of nodes,
//! indexes them by id and by parent, and answers the structural questions
//! the engines need: roots, children, descendants, ancestors, cycle checks,
//! leaf-first ordering for deletes, nesting and text rendering.

use std::collections::{HashMap, HashSet};
use serde::Serialize;
use crate::{Error, Result};

/// A node that can live in a [`Forest`]
pub trait TreeNode {
    /// Identity, `None` for unsaved nodes (which the forest ignores)
    fn node_id(&self) -> Option<i64>;
    fn parent(&self) -> Option<i64>;
    /// Label used for sibling ordering and rendering
    fn label(&self) -> &str;
}

/// Arena of nodes keyed by id with parent/children indices.
///
/// A node whose parent is not part of the loaded set is treated as a root
/// of this view; [`Forest::ancestors`] reports such links as dangling.
#[derive(Debug)]
pub struct Forest<N> {
    nodes: HashMap<i64, N>,
    children: HashMap<i64, Vec<i64>>,
    roots: Vec<i64>,
}

/// A node together with its nested children, for structured output
#[derive(Debug, Clone, Serialize)]
pub struct Nested<T> {
    #[serde(flatten)]
    pub node: T,
    pub children: Vec<Nested<T>>,
}

impl<T> Nested<T> {
    /// Number of nodes in this subtree, including the root
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Nested::size).sum::<usize>()
    }
}

impl<N: TreeNode> Forest<N> {
    pub fn new(nodes: impl IntoIterator<Item = N>) -> Self {
        let nodes: HashMap<i64, N> = nodes
            .into_iter()
            .filter_map(|n| n.node_id().map(|id| (id, n)))
            .collect();

        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut roots = Vec::new();
        for (id, node) in &nodes {
            match node.parent() {
                Some(parent) if nodes.contains_key(&parent) => {
                    children.entry(parent).or_default().push(*id)
                }
                _ => roots.push(*id),
            }
        }

        let mut forest = Self { nodes, children, roots };
        forest.sort_siblings();
        forest
    }

    /// Siblings ordered by label, then id, so traversal output is stable
    fn sort_siblings(&mut self) {
        let nodes = &self.nodes;
        let key = |id: &i64| (nodes[id].label().to_string(), *id);
        self.roots.sort_by_key(key);
        for ids in self.children.values_mut() {
            ids.sort_by_key(key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&N> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: i64) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn roots(&self) -> Vec<&N> {
        self.roots.iter().map(|id| &self.nodes[id]).collect()
    }

    pub fn root_ids(&self) -> &[i64] {
        &self.roots
    }

    pub fn children(&self, id: i64) -> Vec<&N> {
        self.child_ids(id).iter().map(|c| &self.nodes[c]).collect()
    }

    fn child_ids(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Ids of `id` and everything below it, parents before children.
    /// Empty when `id` is not in the forest.
    pub fn subtree_ids(&self, id: i64) -> Vec<i64> {
        if !self.contains(id) {
            return Vec::new();
        }
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            out.push(current);
            // reversed so the first child is visited first
            for child in self.child_ids(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Everything strictly below `id`, parents before children
    pub fn descendants(&self, id: i64) -> Vec<&N> {
        self.subtree_ids(id)
            .into_iter()
            .skip(1)
            .map(|d| &self.nodes[&d])
            .collect()
    }

    /// Subtree ids with every child before its parent (safe delete order)
    pub fn leaf_first(&self, id: i64) -> Vec<i64> {
        let mut ids = self.subtree_ids(id);
        ids.reverse();
        ids
    }

    /// True if `id` lies strictly below `ancestor`
    pub fn is_descendant(&self, id: i64, ancestor: i64) -> bool {
        id != ancestor && self.subtree_ids(ancestor).contains(&id)
    }

    /// Walk parent links upward, nearest ancestor first.
    ///
    /// Fails with `NotFound` if `id` is unknown and with `Integrity` if a
    /// parent link points outside the forest or loops back on itself.
    pub fn ancestors(&self, id: i64) -> Result<Vec<&N>> {
        let mut node = self
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("no node with id {}", id)))?;
        let mut seen = HashSet::from([id]);
        let mut out = Vec::new();

        while let Some(parent_id) = node.parent() {
            if !seen.insert(parent_id) {
                return Err(Error::Integrity(format!(
                    "parent chain of '{}' loops back to id {}",
                    self.nodes[&id].label(),
                    parent_id
                )));
            }
            node = self.get(parent_id).ok_or_else(|| {
                Error::Integrity(format!(
                    "'{}' references missing parent id {}",
                    node.label(),
                    parent_id
                ))
            })?;
            out.push(node);
        }
        Ok(out)
    }

    /// Labels from the root down to `id`, inclusive
    pub fn label_path(&self, id: i64) -> Result<Vec<&str>> {
        let mut labels: Vec<&str> = self.ancestors(id)?.iter().map(|n| n.label()).collect();
        labels.reverse();
        labels.push(self.nodes[&id].label());
        Ok(labels)
    }

    /// Build a nested structure for the subtree rooted at `id`
    pub fn nested<T>(&self, id: i64, map: &impl Fn(&N) -> T) -> Option<Nested<T>> {
        let mut visited = HashSet::new();
        self.nested_inner(id, map, &mut visited)
    }

    fn nested_inner<T>(&self, id: i64, map: &impl Fn(&N) -> T, visited: &mut HashSet<i64>) -> Option<Nested<T>> {
        if !visited.insert(id) {
            return None;
        }
        let node = self.get(id)?;
        let children = self
            .child_ids(id)
            .iter()
            .filter_map(|c| self.nested_inner(*c, map, visited))
            .collect();
        Some(Nested { node: map(node), children })
    }

    /// Render the given roots (or every root) as a text tree:
    ///
    /// ```text
    /// Digital
    /// ├─ CPU
    /// │  └─ ARM
    /// └─ Memory
    /// ```
    pub fn render(&self, roots: Option<&[i64]>, label: &impl Fn(&N) -> String) -> String {
        let roots = roots.unwrap_or(&self.roots);
        let mut out = String::new();
        let mut visited = HashSet::new();
        for root in roots {
            if let Some(node) = self.get(*root) {
                if !visited.insert(*root) {
                    continue;
                }
                out.push_str(&label(node));
                out.push('\n');
                self.render_children(*root, "", label, &mut out, &mut visited);
            }
        }
        out
    }

    fn render_children(
        &self,
        id: i64,
        prefix: &str,
        label: &impl Fn(&N) -> String,
        out: &mut String,
        visited: &mut HashSet<i64>,
    ) {
        let children = self.child_ids(id);
        for (i, child) in children.iter().enumerate() {
            if !visited.insert(*child) {
                continue;
            }
            let last = i + 1 == children.len();
            let (branch, extend) = if last { ("└─ ", "   ") } else { ("├─ ", "│  ") };
            out.push_str(prefix);
            out.push_str(branch);
            out.push_str(&label(&self.nodes[child]));
            out.push('\n');
            self.render_children(*child, &format!("{}{}", prefix, extend), label, out, visited);
        }
    }
}
