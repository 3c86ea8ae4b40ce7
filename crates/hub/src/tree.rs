use crate::arena::Arena;
use crate::error::Error;
use itertools::Itertools;

pub(crate) type EntryId = usize;
pub(crate) type ResourceId = usize;

/// Longest entry name, in bytes.
pub const MAX_ENTRY_NAME_BYTES: usize = 63;
/// Longest absolute resource path, in bytes.
pub const MAX_RESOURCE_PATH_BYTES: usize = 511;

/// The namespace reserved for observations.
pub(crate) const OBS_NAMESPACE: &str = "obs";

/// Kind of a tree entry, as reported to tree-change handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Namespace,
    Placeholder,
    Input,
    Output,
    Observation,
}

/// Direction of a tree-change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeChange {
    Added,
    Removed,
}

/// A node of the hierarchical namespace. An entry with a resource is a
/// Placeholder, Input, Output, or Observation; one without is a plain
/// Namespace.
pub(crate) struct Entry {
    pub name: String,
    pub parent: Option<EntryId>,
    pub children: Vec<EntryId>,
    pub resource: Option<ResourceId>,
    /// Count of open client sessions holding this entry.
    pub pins: u32,
}

/// The hierarchical namespace of entries.
pub(crate) struct Tree {
    entries: Arena<Entry>,
    pub root: EntryId,
}

impl Tree {
    pub fn new() -> Tree {
        let mut entries = Arena::new();
        let root = entries.insert(Entry {
            name: String::new(),
            parent: None,
            children: Vec::new(),
            resource: None,
            pins: 0,
        });
        Tree { entries, root }
    }

    pub fn get(&self, id: EntryId) -> &Entry {
        &self.entries[id]
    }

    /// Like `get`, but tolerates ids that were pruned since they were
    /// collected.
    pub fn try_get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.entries[id]
    }

    pub fn child_named(&self, parent: EntryId, name: &str) -> Option<EntryId> {
        self.entries[parent]
            .children
            .iter()
            .copied()
            .find(|child| self.entries[*child].name == name)
    }

    /// Walk `path` from `base` without creating anything.
    pub fn find(&self, base: EntryId, path: &str) -> Result<Option<EntryId>, Error> {
        let (absolute, segments) = split_path(path)?;
        let mut at = if absolute { self.root } else { base };
        for segment in segments {
            match self.child_named(at, segment) {
                Some(child) => at = child,
                None => return Ok(None),
            }
        }
        Ok(Some(at))
    }

    /// Walk `path` from `base`, creating missing namespace entries along
    /// the way.
    pub fn get_or_create(&mut self, base: EntryId, path: &str) -> Result<EntryId, Error> {
        let (absolute, segments) = split_path(path)?;
        let mut at = if absolute { self.root } else { base };
        for segment in segments {
            at = match self.child_named(at, segment) {
                Some(child) => child,
                None => {
                    let child = self.entries.insert(Entry {
                        name: segment.to_string(),
                        parent: Some(at),
                        children: Vec::new(),
                        resource: None,
                        pins: 0,
                    });
                    self.entries[at].children.push(child);
                    child
                }
            };
        }
        Ok(at)
    }

    /// Absolute path of an entry, `/`-rooted.
    pub fn absolute_path(&self, id: EntryId) -> String {
        let mut names = Vec::new();
        let mut at = Some(id);
        while let Some(entry) = at {
            let entry = &self.entries[entry];
            if entry.parent.is_some() {
                names.push(entry.name.as_str());
            }
            at = entry.parent;
        }
        format!("/{}", names.iter().rev().join("/"))
    }

    /// Collapse `id` and any emptied ancestors: a non-root entry with no
    /// children, no resource, and no session pin does not outlive its
    /// last use.
    pub fn prune(&mut self, id: EntryId) {
        let mut at = Some(id);
        while let Some(id) = at {
            let entry = &self.entries[id];
            if entry.parent.is_none()
                || entry.resource.is_some()
                || entry.pins > 0
                || !entry.children.is_empty()
            {
                return;
            }
            let parent = entry.parent;
            if let Some(parent) = parent {
                self.entries[parent].children.retain(|child| *child != id);
            }
            self.entries.remove(id);
            at = parent;
        }
    }

    /// Depth-first preorder walk of the subtree at `base`, children in
    /// insertion order.
    pub fn walk(&self, base: EntryId, f: &mut dyn FnMut(EntryId)) {
        let mut stack = vec![base];
        while let Some(id) = stack.pop() {
            f(id);
            let entry = &self.entries[id];
            stack.extend(entry.children.iter().rev().copied());
        }
    }
}

/// Split a path into its absolute flag and validated segments. Segments
/// must be non-empty, at most 63 bytes, and free of `.`, `[` and `]`.
pub(crate) fn split_path(path: &str) -> Result<(bool, Vec<&str>), Error> {
    if path.len() > MAX_RESOURCE_PATH_BYTES {
        return Err(Error::BadParameter);
    }
    let absolute = path.starts_with('/');
    let trimmed = if absolute { &path[1..] } else { path };
    if trimmed.is_empty() {
        return Ok((absolute, Vec::new()));
    }
    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        if segment.is_empty()
            || segment.len() > MAX_ENTRY_NAME_BYTES
            || segment.contains(&['.', '[', ']'][..])
        {
            return Err(Error::BadParameter);
        }
        segments.push(segment);
    }
    Ok((absolute, segments))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("/a/b").unwrap(), (true, vec!["a", "b"]));
        assert_eq!(split_path("a/b").unwrap(), (false, vec!["a", "b"]));
        assert_eq!(split_path("/").unwrap(), (true, vec![]));
        assert_eq!(split_path("").unwrap(), (false, vec![]));

        for bad in ["//", "/a//b", "a/", "/a.b", "/a[0]", "/a]b"] {
            assert_eq!(split_path(bad).unwrap_err(), Error::BadParameter, "path: {}", bad);
        }

        let long_name = "n".repeat(64);
        assert!(split_path(&long_name).is_err());
        let long_path = format!("/{}", "a/".repeat(300));
        assert!(split_path(&long_path).is_err());
    }

    #[test]
    fn test_get_or_create_and_find() {
        let mut tree = Tree::new();
        let leaf = tree.get_or_create(tree.root, "/app/sensor/value").unwrap();
        assert_eq!(tree.absolute_path(leaf), "/app/sensor/value");

        // Creation is idempotent and find sees the same entry.
        assert_eq!(tree.get_or_create(tree.root, "/app/sensor/value").unwrap(), leaf);
        assert_eq!(tree.find(tree.root, "/app/sensor/value").unwrap(), Some(leaf));
        assert_eq!(tree.find(tree.root, "/app/other").unwrap(), None);

        // Relative walks start at the given base.
        let sensor = tree.find(tree.root, "/app/sensor").unwrap().unwrap();
        assert_eq!(tree.find(sensor, "value").unwrap(), Some(leaf));
    }

    #[test]
    fn test_prune_collapses_empty_namespaces() {
        let mut tree = Tree::new();
        let leaf = tree.get_or_create(tree.root, "/app/sensor/value").unwrap();

        tree.prune(leaf);
        assert_eq!(tree.find(tree.root, "/app").unwrap(), None);
        assert!(tree.get(tree.root).children.is_empty());
    }

    #[test]
    fn test_prune_stops_at_pinned_or_occupied() {
        let mut tree = Tree::new();
        let ns = tree.get_or_create(tree.root, "/app/sensor").unwrap();
        let leaf = tree.get_or_create(ns, "value").unwrap();

        tree.get_mut(ns).pins = 1;
        tree.prune(leaf);
        assert_eq!(tree.find(tree.root, "/app/sensor").unwrap(), Some(ns));
        assert_eq!(tree.find(tree.root, "/app/sensor/value").unwrap(), None);
    }
}
