//! Arena-free radix tree node.
//!
//! Each non-root node owns the edge label connecting it to its parent.
//! Children are keyed by the first byte of their edge label, so sibling
//! labels never collide on their leading byte by construction.

use std::collections::HashMap;

pub(super) struct Node<V> {
    pub(super) label: Vec<u8>,
    pub(super) value: Option<V>,
    pub(super) children: HashMap<u8, Box<Node<V>>>,
}

fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

impl<V> Node<V> {
    pub(super) fn new_root() -> Self {
        Node { label: Vec::new(), value: None, children: HashMap::new() }
    }

    fn leaf(label: Vec<u8>, value: V) -> Self {
        Node { label, value: Some(value), children: HashMap::new() }
    }

    pub(super) fn value(&self) -> Option<&V> {
        self.value.as_ref()
    }

    pub(super) fn value_mut(&mut self) -> Option<&mut V> {
        self.value.as_mut()
    }

    pub(super) fn insert(&mut self, key: &[u8], value: V) -> Option<V> {
        if key.is_empty() {
            return self.value.replace(value);
        }
        let first = key[0];
        if !self.children.contains_key(&first) {
            self.children.insert(first, Box::new(Node::leaf(key.to_vec(), value)));
            return None;
        }
        let child = self.children.get_mut(&first).unwrap();
        let common = common_prefix_len(&child.label, key);
        if common == child.label.len() {
            return child.insert(&key[common..], value);
        }

        // The key diverges partway through the existing edge: split it.
        let mut old_child = self.children.remove(&first).unwrap();
        let old_suffix = old_child.label[common..].to_vec();
        old_child.label = old_suffix;

        let mut bridge = Box::new(Node {
            label: key[..common].to_vec(),
            value: None,
            children: HashMap::new(),
        });
        bridge.children.insert(old_child.label[0], old_child);

        if common == key.len() {
            bridge.value = Some(value);
        } else {
            let new_suffix = key[common..].to_vec();
            let new_key = new_suffix[0];
            bridge.children.insert(new_key, Box::new(Node::leaf(new_suffix, value)));
        }

        self.children.insert(first, bridge);
        None
    }

    pub(super) fn find(&self, key: &[u8]) -> Option<&Node<V>> {
        if key.is_empty() {
            return Some(self);
        }
        let child = self.children.get(&key[0])?;
        if key.len() >= child.label.len() && key[..child.label.len()] == child.label[..] {
            child.find(&key[child.label.len()..])
        } else {
            None
        }
    }

    pub(super) fn find_mut(&mut self, key: &[u8]) -> Option<&mut Node<V>> {
        if key.is_empty() {
            return Some(self);
        }
        let child = self.children.get_mut(&key[0])?;
        if key.len() >= child.label.len() && key[..child.label.len()] == child.label[..] {
            child.find_mut(&key[child.label.len()..])
        } else {
            None
        }
    }

    /// Locates the node representing the subtree at `prefix`, returning it
    /// together with the remainder of that node's own label past `prefix`
    /// (non-empty only when `prefix` ends in the middle of an edge).
    pub(super) fn find_subtree(&self, prefix: &[u8]) -> Option<(&Node<V>, Vec<u8>)> {
        if prefix.is_empty() {
            return Some((self, Vec::new()));
        }
        let child = self.children.get(&prefix[0])?;
        if prefix.len() <= child.label.len() {
            if child.label[..prefix.len()] == prefix[..] {
                Some((child, child.label[prefix.len()..].to_vec()))
            } else {
                None
            }
        } else if prefix[..child.label.len()] == child.label[..] {
            child.find_subtree(&prefix[child.label.len()..])
        } else {
            None
        }
    }

    pub(super) fn remove(&mut self, key: &[u8]) -> Option<V> {
        if key.is_empty() {
            return self.value.take();
        }
        let first = key[0];
        let (removed, drop_child) = {
            let child = self.children.get_mut(&first)?;
            if key.len() < child.label.len() || key[..child.label.len()] != child.label[..] {
                return None;
            }
            let removed = child.remove(&key[child.label.len()..]);
            let drop_child = child.value.is_none() && child.children.is_empty();
            (removed, drop_child)
        };
        if removed.is_some() {
            if drop_child {
                self.children.remove(&first);
            } else {
                self.merge_single_child(first);
            }
        }
        removed
    }

    /// If the child at `first` is a valueless node with exactly one child,
    /// fold that child's label into the parent edge (tree compression).
    fn merge_single_child(&mut self, first: u8) {
        let should_merge = match self.children.get(&first) {
            Some(child) => child.value.is_none() && child.children.len() == 1,
            None => false,
        };
        if !should_merge {
            return;
        }
        let mut child = self.children.remove(&first).unwrap();
        let (_, mut grandchild) = child.children.drain().next().unwrap();
        let mut merged_label = std::mem::take(&mut child.label);
        merged_label.extend_from_slice(&grandchild.label);
        grandchild.label = merged_label;
        self.children.insert(first, grandchild);
    }

    /// Depth-first collection of `(relative_key, value)` pairs, where
    /// `relative_key` is `prefix_bytes` for this node's own value and
    /// `prefix_bytes` extended by each child's label for deeper entries.
    pub(super) fn collect<'a>(&'a self, prefix_bytes: Vec<u8>, out: &mut Vec<(String, &'a V)>) {
        if let Some(v) = &self.value {
            out.push((String::from_utf8_lossy(&prefix_bytes).into_owned(), v));
        }
        for child in self.children.values() {
            let mut child_bytes = prefix_bytes.clone();
            child_bytes.extend_from_slice(&child.label);
            child.collect(child_bytes, out);
        }
    }
}
