//! Tree node for the metadata namespace.
//!
//! One [`MetaNode`] represents one entity in the namespace: an internal
//! grouping node, a storage-group boundary, or a measurement leaf. Nodes
//! are shared as `Arc<MetaNode>`; ownership flows strictly parent to
//! child through the child map, while the upward link is a `Weak` so the
//! ownership graph stays acyclic and dropping a map entry drops the
//! subtree.

use crate::intern::PathPool;
use dashmap::DashMap;
use parking_lot::RwLock;
use seriesio_common::constants::{
    INTERNAL_NODE_TYPE, MEASUREMENT_NODE_TYPE, STORAGE_GROUP_NODE_TYPE,
};
use seriesio_common::{PartialPath, Result};
use std::fmt;
use std::io::Write;
use std::sync::{Arc, OnceLock, Weak};

/// Kind of a metadata tree node.
///
/// A closed set: behavior that differs per kind (leaf accounting, the
/// checkpoint type tag) dispatches on this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Grouping node between the root and storage groups, or below a
    /// storage group (device level)
    Internal,
    /// Storage-group boundary
    StorageGroup,
    /// Measurement leaf
    Measurement,
}

impl NodeKind {
    /// Checkpoint type tag for this kind (stable across encoding versions)
    #[must_use]
    pub const fn type_tag(self) -> u8 {
        match self {
            Self::Internal => INTERNAL_NODE_TYPE,
            Self::StorageGroup => STORAGE_GROUP_NODE_TYPE,
            Self::Measurement => MEASUREMENT_NODE_TYPE,
        }
    }

    /// Decode a checkpoint type tag
    #[must_use]
    pub const fn from_type_tag(tag: u8) -> Option<Self> {
        match tag {
            INTERNAL_NODE_TYPE => Some(Self::Internal),
            STORAGE_GROUP_NODE_TYPE => Some(Self::StorageGroup),
            MEASUREMENT_NODE_TYPE => Some(Self::Measurement),
            _ => None,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Internal => write!(f, "Internal"),
            Self::StorageGroup => write!(f, "StorageGroup"),
            Self::Measurement => write!(f, "Measurement"),
        }
    }
}

/// One node in the metadata tree.
pub struct MetaNode {
    kind: NodeKind,
    /// Own path segment; renaming is supported
    name: RwLock<String>,
    /// Upward link, informational only; empty for the root
    parent: RwLock<Weak<MetaNode>>,
    /// Interned full path, computed on first use and cleared on
    /// rename/reparent
    full_path: RwLock<Option<Arc<str>>>,
    /// Primary children, keyed by the name each child was inserted under.
    /// Allocated on first insertion; measurement leaves never allocate it.
    children: OnceLock<DashMap<String, Arc<MetaNode>>>,
    /// Alias lookups resolving to nodes that exist as primary children.
    /// A separate namespace from `children`, consulted only on primary
    /// miss.
    alias_children: OnceLock<DashMap<String, Arc<MetaNode>>>,
}

impl MetaNode {
    /// Create a detached node with the given parent link and name.
    ///
    /// The node is not reachable from `parent` until it is passed to the
    /// parent's [`add_child`](Self::add_child).
    pub fn new(kind: NodeKind, parent: Option<&Arc<MetaNode>>, name: impl Into<String>) -> Arc<Self> {
        let parent = match parent {
            Some(parent) => Arc::downgrade(parent),
            None => Weak::new(),
        };
        Arc::new(Self {
            kind,
            name: RwLock::new(name.into()),
            parent: RwLock::new(parent),
            full_path: RwLock::new(None),
            children: OnceLock::new(),
            alias_children: OnceLock::new(),
        })
    }

    /// Kind of this node
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Own path segment
    #[must_use]
    pub fn name(&self) -> String {
        self.name.read().clone()
    }

    /// Rename this node. Clears the cached full path of this node and of
    /// every descendant, since all of them embed the old segment.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.write() = name.into();
        self.invalidate_full_path();
    }

    /// Parent node, if still alive and not the root
    #[must_use]
    pub fn parent(&self) -> Option<Arc<MetaNode>> {
        self.parent.read().upgrade()
    }

    /// Repoint the upward link. Clears cached full paths like
    /// [`set_name`](Self::set_name).
    pub fn set_parent(&self, parent: &Arc<MetaNode>) {
        *self.parent.write() = Arc::downgrade(parent);
        self.invalidate_full_path();
    }

    /// Check whether `name` resolves to a child, directly or via alias
    #[must_use]
    pub fn has_child(&self, name: &str) -> bool {
        self.children
            .get()
            .map(|children| children.contains_key(name))
            .unwrap_or(false)
            || self
                .alias_children
                .get()
                .map(|aliases| aliases.contains_key(name))
                .unwrap_or(false)
    }

    /// Add a child under `name`, keeping any child already there.
    ///
    /// The child map is allocated on first use; under a race exactly one
    /// allocation wins and all callers insert into the same map. Insertion
    /// is insert-if-absent: the first writer for a name wins and later
    /// nodes for the same name are dropped, so callers that care about the
    /// outcome must query the map afterwards.
    pub fn add_child(&self, name: impl Into<String>, child: Arc<MetaNode>) {
        let children = self.children.get_or_init(DashMap::new);
        children.entry(name.into()).or_insert(child);
    }

    /// Remove the child entry for `name`; no-op if absent or if the map
    /// was never allocated
    pub fn delete_child(&self, name: &str) {
        if let Some(children) = self.children.get() {
            children.remove(name);
        }
    }

    /// Look up a child by name; primary children shadow aliases
    #[must_use]
    pub fn get_child(&self, name: &str) -> Option<Arc<MetaNode>> {
        if let Some(children) = self.children.get() {
            if let Some(child) = children.get(name) {
                return Some(Arc::clone(child.value()));
            }
        }
        self.alias_children
            .get()
            .and_then(|aliases| aliases.get(name).map(|child| Arc::clone(child.value())))
    }

    /// Register `alias` for a node that already exists as a primary child.
    ///
    /// Returns true when the alias now maps to `child` (newly registered,
    /// or already registered for this same node); false when the alias is
    /// taken by a different node. An existing mapping is never
    /// overwritten.
    pub fn add_alias(&self, alias: impl Into<String>, child: Arc<MetaNode>) -> bool {
        let aliases = self.alias_children.get_or_init(DashMap::new);
        let stored = aliases
            .entry(alias.into())
            .or_insert_with(|| Arc::clone(&child));
        Arc::ptr_eq(stored.value(), &child)
    }

    /// Remove an alias entry; no-op if absent or if the alias map was
    /// never allocated
    pub fn delete_alias_child(&self, alias: &str) {
        if let Some(aliases) = self.alias_children.get() {
            aliases.remove(alias);
        }
    }

    /// Number of primary children (0 while the map is unallocated)
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.get().map(DashMap::len).unwrap_or(0)
    }

    /// Snapshot of the primary children
    #[must_use]
    pub fn children(&self) -> Vec<(String, Arc<MetaNode>)> {
        self.children.get().map_or_else(Vec::new, |children| {
            children
                .iter()
                .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
                .collect()
        })
    }

    /// Snapshot of the alias entries
    #[must_use]
    pub fn alias_children(&self) -> Vec<(String, Arc<MetaNode>)> {
        self.alias_children.get().map_or_else(Vec::new, |aliases| {
            aliases
                .iter()
                .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
                .collect()
        })
    }

    /// Full dotted path from the root to this node, interned and cached.
    ///
    /// The first call walks the ancestor chain and registers the result in
    /// the process-wide pool; later calls return the cached instance.
    /// Concurrent first calls may each build the string, but the pool is
    /// atomic-if-absent so all of them converge on one canonical
    /// allocation.
    #[must_use]
    pub fn full_path(&self) -> Arc<str> {
        if let Some(cached) = self.full_path.read().as_ref() {
            return Arc::clone(cached);
        }
        let interned = PathPool::global().intern(self.partial_path().to_string());
        *self.full_path.write() = Some(Arc::clone(&interned));
        interned
    }

    /// Segment sequence from the root to this node
    #[must_use]
    pub fn partial_path(&self) -> PartialPath {
        let mut segments = vec![self.name()];
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            segments.push(node.name());
            cursor = node.parent();
        }
        segments.reverse();
        PartialPath::new(segments)
    }

    fn invalidate_full_path(&self) {
        *self.full_path.write() = None;
        if let Some(children) = self.children.get() {
            for child in children.iter() {
                child.value().invalidate_full_path();
            }
        }
    }

    /// Count of measurement leaves in the subtree rooted here.
    ///
    /// Dispatches on kind: a measurement counts as exactly one leaf
    /// regardless of children; other kinds sum over their direct children,
    /// yielding 0 when childless.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self.kind {
            NodeKind::Measurement => 1,
            NodeKind::Internal | NodeKind::StorageGroup => match self.children.get() {
                Some(children) => children
                    .iter()
                    .map(|entry| entry.value().leaf_count())
                    .sum(),
                None => 0,
            },
        }
    }

    /// Write the subtree rooted here to a line-oriented checkpoint sink.
    ///
    /// Emission is post-order: every child subtree is written before this
    /// node's own `type_tag,name,child_count` line, so the root's line is
    /// the last one in the file. Sibling order follows the child map's
    /// iteration order and is not deterministic. Aliases are not encoded.
    /// A failed write propagates immediately; lines already written are
    /// not rolled back, so the caller must discard the checkpoint attempt.
    pub fn serialize_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.serialize_children(writer)?;
        writeln!(
            writer,
            "{},{},{}",
            self.kind.type_tag(),
            self.name(),
            self.child_count()
        )?;
        Ok(())
    }

    fn serialize_children<W: Write>(&self, writer: &mut W) -> Result<()> {
        if let Some(children) = self.children.get() {
            for child in children.iter() {
                child.value().serialize_to(writer)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MetaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaNode")
            .field("kind", &self.kind)
            .field("name", &*self.name.read())
            .field("children", &self.child_count())
            .finish()
    }
}

impl fmt::Display for MetaNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn internal(parent: Option<&Arc<MetaNode>>, name: &str) -> Arc<MetaNode> {
        MetaNode::new(NodeKind::Internal, parent, name)
    }

    #[test]
    fn test_add_and_get_children() {
        let root = internal(None, "root");
        let sg1 = internal(Some(&root), "sg1");
        let sg2 = internal(Some(&root), "sg2");
        root.add_child("sg1", Arc::clone(&sg1));
        root.add_child("sg2", Arc::clone(&sg2));

        assert!(root.has_child("sg1"));
        assert!(root.has_child("sg2"));
        assert!(!root.has_child("sg3"));
        assert_eq!(root.child_count(), 2);
        assert!(Arc::ptr_eq(&root.get_child("sg1").unwrap(), &sg1));
        assert!(Arc::ptr_eq(&root.get_child("sg2").unwrap(), &sg2));
    }

    #[test]
    fn test_add_child_first_writer_wins() {
        let root = internal(None, "root");
        let first = internal(Some(&root), "sg1");
        let second = internal(Some(&root), "sg1");
        root.add_child("sg1", Arc::clone(&first));
        root.add_child("sg1", second);

        assert_eq!(root.child_count(), 1);
        assert!(Arc::ptr_eq(&root.get_child("sg1").unwrap(), &first));
    }

    #[test]
    fn test_delete_child() {
        let root = internal(None, "root");
        // deleting on an unallocated map is a no-op
        root.delete_child("sg1");

        let sg1 = internal(Some(&root), "sg1");
        root.add_child("sg1", sg1);
        root.delete_child("sg1");
        assert!(root.get_child("sg1").is_none());

        // absent name is also a no-op
        root.delete_child("sg1");
    }

    #[test]
    fn test_alias_registration() {
        let device = internal(None, "d1");
        let s1 = MetaNode::new(NodeKind::Measurement, Some(&device), "s1");
        let s2 = MetaNode::new(NodeKind::Measurement, Some(&device), "s2");
        device.add_child("s1", Arc::clone(&s1));
        device.add_child("s2", Arc::clone(&s2));

        assert!(device.add_alias("temperature", Arc::clone(&s1)));
        // idempotent for the same child
        assert!(device.add_alias("temperature", Arc::clone(&s1)));
        // conflict: taken by a different child, not overwritten
        assert!(!device.add_alias("temperature", Arc::clone(&s2)));
        assert!(Arc::ptr_eq(&device.get_child("temperature").unwrap(), &s1));
    }

    #[test]
    fn test_primary_child_shadows_alias() {
        let device = internal(None, "d1");
        let s1 = MetaNode::new(NodeKind::Measurement, Some(&device), "s1");
        let s2 = MetaNode::new(NodeKind::Measurement, Some(&device), "s2");
        device.add_child("s1", Arc::clone(&s1));
        device.add_child("s2", Arc::clone(&s2));

        // alias name collides with a primary child name on another entry
        assert!(device.add_alias("s2", Arc::clone(&s1)));
        assert!(Arc::ptr_eq(&device.get_child("s2").unwrap(), &s2));

        device.delete_child("s2");
        assert!(Arc::ptr_eq(&device.get_child("s2").unwrap(), &s1));
    }

    #[test]
    fn test_delete_alias_child() {
        let device = internal(None, "d1");
        // unallocated alias map is a no-op
        device.delete_alias_child("temperature");

        let s1 = MetaNode::new(NodeKind::Measurement, Some(&device), "s1");
        device.add_child("s1", Arc::clone(&s1));
        device.add_alias("temperature", s1);
        device.delete_alias_child("temperature");
        assert!(device.get_child("temperature").is_none());
        assert!(device.get_child("s1").is_some());
    }

    #[test]
    fn test_full_path() {
        let root = internal(None, "root");
        let a = internal(Some(&root), "a");
        let b = internal(Some(&a), "b");
        let c = internal(Some(&b), "c");
        root.add_child("a", Arc::clone(&a));
        a.add_child("b", Arc::clone(&b));
        b.add_child("c", Arc::clone(&c));

        assert_eq!(&*c.full_path(), "root.a.b.c");
        assert_eq!(&*root.full_path(), "root");
    }

    #[test]
    fn test_equal_full_paths_are_interned() {
        // two detached trees with identical shape
        let build = || {
            let root = internal(None, "root");
            let sg = internal(Some(&root), "sg_interned");
            let leaf = MetaNode::new(NodeKind::Measurement, Some(&sg), "s1");
            root.add_child("sg_interned", Arc::clone(&sg));
            sg.add_child("s1", Arc::clone(&leaf));
            (root, leaf)
        };
        let (_keep_a, leaf_a) = build();
        let (_keep_b, leaf_b) = build();

        let path_a = leaf_a.full_path();
        let path_b = leaf_b.full_path();
        assert_eq!(&*path_a, "root.sg_interned.s1");
        assert!(Arc::ptr_eq(&path_a, &path_b));
    }

    #[test]
    fn test_full_path_invalidated_on_rename() {
        let root = internal(None, "root");
        let a = internal(Some(&root), "a");
        let b = internal(Some(&a), "b");
        root.add_child("a", Arc::clone(&a));
        a.add_child("b", Arc::clone(&b));

        assert_eq!(&*b.full_path(), "root.a.b");
        a.set_name("x");
        // the descendant's cache embeds the old segment and must be cleared
        assert_eq!(&*b.full_path(), "root.x.b");
        assert_eq!(&*a.full_path(), "root.x");
    }

    #[test]
    fn test_full_path_invalidated_on_reparent() {
        let root = internal(None, "root");
        let sg1 = internal(Some(&root), "sg1");
        let sg2 = internal(Some(&root), "sg2");
        root.add_child("sg1", Arc::clone(&sg1));
        root.add_child("sg2", Arc::clone(&sg2));
        let d1 = internal(Some(&sg1), "d1");
        sg1.add_child("d1", Arc::clone(&d1));

        assert_eq!(&*d1.full_path(), "root.sg1.d1");
        sg1.delete_child("d1");
        sg2.add_child("d1", Arc::clone(&d1));
        d1.set_parent(&sg2);
        assert_eq!(&*d1.full_path(), "root.sg2.d1");
    }

    #[test]
    fn test_partial_path() {
        let root = internal(None, "root");
        let a = internal(Some(&root), "a");
        let b = internal(Some(&a), "b");
        let c = internal(Some(&b), "c");

        assert_eq!(c.partial_path().segments(), &["root", "a", "b", "c"]);
        assert_eq!(root.partial_path().segments(), &["root"]);
    }

    #[test]
    fn test_leaf_count_dispatches_on_kind() {
        // childless non-leaf kinds count zero
        assert_eq!(internal(None, "lone").leaf_count(), 0);
        assert_eq!(
            MetaNode::new(NodeKind::StorageGroup, None, "sg").leaf_count(),
            0
        );
        // a measurement is one leaf even while detached
        assert_eq!(
            MetaNode::new(NodeKind::Measurement, None, "s1").leaf_count(),
            1
        );
    }

    #[test]
    fn test_leaf_count_over_tree() {
        let root = internal(None, "root");
        let sg1 = MetaNode::new(NodeKind::StorageGroup, Some(&root), "sg1");
        root.add_child("sg1", Arc::clone(&sg1));
        for device_name in ["d1", "d2"] {
            let device = internal(Some(&sg1), device_name);
            sg1.add_child(device_name, Arc::clone(&device));
            for sensor_name in ["s1", "s2", "s3"] {
                let sensor = MetaNode::new(NodeKind::Measurement, Some(&device), sensor_name);
                device.add_child(sensor_name, sensor);
            }
        }

        assert_eq!(root.leaf_count(), 6);
        assert_eq!(sg1.leaf_count(), 6);
    }

    #[test]
    fn test_serialize_chain_scenario() {
        let root = internal(None, "root");
        let sg1 = internal(Some(&root), "sg1");
        let d1 = internal(Some(&sg1), "d1");
        let s1 = MetaNode::new(NodeKind::Measurement, Some(&d1), "s1");
        root.add_child("sg1", Arc::clone(&sg1));
        sg1.add_child("d1", Arc::clone(&d1));
        d1.add_child("s1", s1);

        assert_eq!(root.leaf_count(), 1);

        let mut out = Vec::new();
        root.serialize_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        // leaves first, root last
        assert_eq!(text, "2,s1,0\n0,d1,1\n0,sg1,1\n0,root,1\n");
    }

    #[test]
    fn test_serialize_propagates_sink_errors() {
        struct FailingSink;
        impl Write for FailingSink {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("sink closed"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let root = internal(None, "root");
        let err = root.serialize_to(&mut FailingSink).unwrap_err();
        assert!(matches!(err, seriesio_common::Error::Io(_)));
    }

    #[test]
    fn test_concurrent_add_child_distinct_names() {
        let root = internal(None, "root");
        std::thread::scope(|s| {
            for i in 0..8 {
                let root = &root;
                s.spawn(move || {
                    let name = format!("sg{i}");
                    let child = MetaNode::new(NodeKind::StorageGroup, Some(root), &name);
                    root.add_child(name, child);
                });
            }
        });

        // exactly one map allocation won; every insert landed in it
        assert_eq!(root.child_count(), 8);
        for i in 0..8 {
            assert!(root.has_child(&format!("sg{i}")));
        }
    }

    #[test]
    fn test_concurrent_add_child_same_name() {
        let root = internal(None, "root");
        let candidates: Vec<Arc<MetaNode>> = (0..8)
            .map(|_| MetaNode::new(NodeKind::StorageGroup, Some(&root), "sg1"))
            .collect();

        std::thread::scope(|s| {
            for candidate in &candidates {
                let root = &root;
                s.spawn(move || root.add_child("sg1", Arc::clone(candidate)));
            }
        });

        assert_eq!(root.child_count(), 1);
        let winner = root.get_child("sg1").unwrap();
        assert!(candidates.iter().any(|c| Arc::ptr_eq(c, &winner)));
    }

    #[test]
    fn test_parent_link_is_non_owning() {
        let root = internal(None, "root");
        let sg1 = internal(Some(&root), "sg1");
        root.add_child("sg1", Arc::clone(&sg1));

        root.delete_child("sg1");
        // the detached subtree stays alive through our handle only
        assert_eq!(sg1.name(), "sg1");
        drop(root);
        // with the root gone the upward link no longer resolves
        assert!(sg1.parent().is_none());
    }
}
