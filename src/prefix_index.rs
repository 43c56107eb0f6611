//! Index over values identified by delimited path prefixes.
//!
//! Implemented as a prefix tree in which each level holds one path component.
//! Components compare case-insensitively and consecutive delimiters collapse.
//! Nodes reference their parent by arena index, keeping ownership tree-shaped
//! so that erasing a prefix cascades cleanup through empty ancestors.

use std::collections::HashMap;

use crate::strings;

const ROOT: usize = 0;

/// One node of the prefix tree. A node is "contained" in the index only when
/// it carries data; intermediate nodes exist purely to form paths.
#[derive(Debug)]
struct Node<T> {
    parent: Option<usize>,
    /// Key within the parent's child map that leads to this node.
    parent_key: String,
    children: HashMap<String, usize>,
    data: Option<T>,
}

impl<T> Node<T> {
    fn new(parent: Option<usize>, parent_key: String) -> Self {
        Self { parent, parent_key, children: HashMap::new(), data: None }
    }
}

/// Prefix tree keyed by case-insensitive path components.
#[derive(Debug)]
pub struct PrefixIndex<T> {
    nodes: Vec<Node<T>>,
    free_slots: Vec<usize>,
}

impl<T> Default for PrefixIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PrefixIndex<T> {
    pub fn new() -> Self {
        Self { nodes: vec![Node::new(None, String::new())], free_slots: Vec::new() }
    }

    /// Creates any nodes needed to represent the prefix and associates the
    /// supplied data with its deepest component. Returns `true` if the index
    /// was modified, `false` if the prefix already carried data.
    pub fn insert(&mut self, prefix: &str, data: T) -> bool {
        let node = self.create_path(prefix);
        if self.nodes[node].data.is_some() {
            return false;
        }
        self.nodes[node].data = Some(data);
        true
    }

    /// Erases the prefix so it is no longer contained in the index, removing
    /// any ancestor nodes left without data or children. Returns `true` if
    /// the prefix was present.
    pub fn erase(&mut self, prefix: &str) -> bool {
        let Some(mut node) = self.traverse_to(prefix).filter(|&n| self.nodes[n].data.is_some())
        else {
            return false;
        };

        self.nodes[node].data = None;
        while self.nodes[node].data.is_none()
            && self.nodes[node].children.is_empty()
            && self.nodes[node].parent.is_some()
        {
            let parent = self.nodes[node].parent.expect("checked above");
            let key = std::mem::take(&mut self.nodes[node].parent_key);
            self.nodes[parent].children.remove(&key);
            self.free_slots.push(node);
            node = parent;
        }
        true
    }

    /// Retrieves the data stored exactly at the given prefix, if present.
    pub fn find(&self, prefix: &str) -> Option<&T> {
        self.traverse_to(prefix).and_then(|node| self.nodes[node].data.as_ref())
    }

    /// Mutable access to the data stored exactly at the given prefix.
    pub fn find_mut(&mut self, prefix: &str) -> Option<&mut T> {
        let node = self.traverse_to(prefix)?;
        self.nodes[node].data.as_mut()
    }

    /// Determines whether the given prefix is contained in the index.
    pub fn contains(&self, prefix: &str) -> bool {
        self.find(prefix).is_some()
    }

    /// Locates the deepest prefix of the input string that carries data and
    /// returns that data, if any such prefix exists.
    pub fn longest_matching_prefix(&self, string_to_match: &str) -> Option<&T> {
        let mut current = ROOT;
        let mut longest = None;

        for component in strings::path_components(string_to_match) {
            if self.nodes[current].data.is_some() {
                longest = Some(current);
            }
            match self.nodes[current].children.get(&strings::fold_case(component)) {
                Some(&child) => current = child,
                None => break,
            }
        }
        if self.nodes[current].data.is_some() {
            longest = Some(current);
        }

        longest.and_then(|node| self.nodes[node].data.as_ref())
    }

    /// Locates the data carried by the closest strict ancestor of the given
    /// prefix, if any ancestor carries data.
    pub fn closest_ancestor(&self, prefix: &str) -> Option<&T> {
        let node = self.traverse_to(prefix)?;
        let mut current = self.nodes[node].parent;
        while let Some(ancestor) = current {
            if self.nodes[ancestor].data.is_some() {
                return self.nodes[ancestor].data.as_ref();
            }
            current = self.nodes[ancestor].parent;
        }
        None
    }

    /// Determines whether any contained prefix lies at or below the given
    /// path, meaning the path is a valid prefix for some stored value.
    pub fn has_path_for_prefix(&self, prefix: &str) -> bool {
        let Some(node) = self.traverse_to(prefix) else {
            return false;
        };
        self.subtree_has_data(node)
    }

    fn subtree_has_data(&self, node: usize) -> bool {
        if self.nodes[node].data.is_some() {
            return true;
        }
        self.nodes[node].children.values().any(|&child| self.subtree_has_data(child))
    }

    /// Walks the tree to the node for the given prefix without regard to
    /// whether that node carries data.
    fn traverse_to(&self, prefix: &str) -> Option<usize> {
        let mut current = ROOT;
        for component in strings::path_components(prefix) {
            current = *self.nodes[current].children.get(&strings::fold_case(component))?;
        }
        Some(current)
    }

    fn create_path(&mut self, prefix: &str) -> usize {
        let mut current = ROOT;
        for component in strings::path_components(prefix) {
            let key = strings::fold_case(component);
            let existing_child = self.nodes[current].children.get(&key).copied();
            current = match existing_child {
                Some(child) => child,
                None => {
                    let child = self.allocate(Node::new(Some(current), key.clone()));
                    self.nodes[current].children.insert(key, child);
                    child
                }
            };
        }
        current
    }

    fn allocate(&mut self, node: Node<T>) -> usize {
        match self.free_slots.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_find_exact() {
        let mut index = PrefixIndex::new();
        assert!(index.insert("C:\\Origin\\Dir", 1));
        assert_eq!(index.find("C:\\Origin\\Dir"), Some(&1));
        assert_eq!(index.find("c:\\origin\\dir"), Some(&1));
        assert_eq!(index.find("C:\\Origin"), None);
        assert_eq!(index.find("C:\\Origin\\Dir\\Sub"), None);
    }

    #[test]
    fn insert_is_idempotent_per_prefix() {
        let mut index = PrefixIndex::new();
        assert!(index.insert("C:\\Dir", 1));
        assert!(!index.insert("c:\\DIR", 2));
        assert_eq!(index.find("C:\\Dir"), Some(&1));
    }

    #[test]
    fn erase_removes_empty_ancestors() {
        let mut index = PrefixIndex::new();
        index.insert("C:\\A\\B\\C", 1);
        index.insert("C:\\A", 2);

        assert!(index.erase("C:\\A\\B\\C"));
        assert!(!index.erase("C:\\A\\B\\C"));
        assert!(!index.contains("C:\\A\\B\\C"));
        // The intermediate node for B had no data left, so traversal below A
        // no longer succeeds.
        assert!(!index.has_path_for_prefix("C:\\A\\B"));
        assert_eq!(index.find("C:\\A"), Some(&2));
    }

    #[test]
    fn longest_matching_prefix_prefers_deepest() {
        let mut index = PrefixIndex::new();
        index.insert("C:\\A", 1);
        index.insert("C:\\A\\B\\C", 2);

        assert_eq!(index.longest_matching_prefix("C:\\A\\B\\C\\file.txt"), Some(&2));
        assert_eq!(index.longest_matching_prefix("C:\\A\\B"), Some(&1));
        assert_eq!(index.longest_matching_prefix("C:\\A"), Some(&1));
        assert_eq!(index.longest_matching_prefix("C:\\Other"), None);
    }

    #[test]
    fn closest_ancestor_skips_self() {
        let mut index = PrefixIndex::new();
        index.insert("C:\\A", 1);
        index.insert("C:\\A\\B\\C", 2);

        assert_eq!(index.closest_ancestor("C:\\A\\B\\C"), Some(&1));
        assert_eq!(index.closest_ancestor("C:\\A"), None);
    }

    #[test]
    fn descendant_probe() {
        let mut index = PrefixIndex::new();
        index.insert("C:\\A\\B\\C", 1);

        assert!(index.has_path_for_prefix("C:\\A"));
        assert!(index.has_path_for_prefix("C:\\A\\B\\C"));
        assert!(!index.has_path_for_prefix("C:\\A\\B\\C\\D"));
        assert!(!index.has_path_for_prefix("C:\\Other"));
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut index = PrefixIndex::new();
        index.insert("C:\\A\\B", 1);
        let allocated = index.nodes.len();
        index.erase("C:\\A\\B");
        index.insert("C:\\A\\B", 2);
        assert_eq!(index.nodes.len(), allocated);
        assert_eq!(index.find("C:\\A\\B"), Some(&2));
    }
}
