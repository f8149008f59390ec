//! Owning service over the metadata tree.
//!
//! A [`MetaTree`] holds the single root node and performs every operation
//! by walking parent→child links from it: path lookup during query
//! execution, schema creation, alias registration, subtree deletion, and
//! checkpointing. Structural mutation must not run concurrently with a
//! checkpoint of the affected subtree; the flush scheduler enforces that
//! exclusion, not this type.

use crate::node::{MetaNode, NodeKind};
use crate::snapshot::restore_tree;
use seriesio_common::constants::ROOT_NAME;
use seriesio_common::{Error, PartialPath, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The in-memory metadata tree.
pub struct MetaTree {
    root: Arc<MetaNode>,
}

impl Default for MetaTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MetaTree {
    /// Create a tree holding only the root node
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: MetaNode::new(NodeKind::Internal, None, ROOT_NAME),
        }
    }

    /// The root node
    #[must_use]
    pub fn root(&self) -> &Arc<MetaNode> {
        &self.root
    }

    /// Total measurement leaves in the tree
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.root.leaf_count()
    }

    /// Resolve a root-first path to its node.
    ///
    /// Alias segments resolve like primary names at every level.
    pub fn node_by_path(&self, path: &PartialPath) -> Result<Arc<MetaNode>> {
        let mut segments = path.segments().iter();
        let first = segments
            .next()
            .ok_or_else(|| Error::invalid_path("empty path"))?;
        if *first != self.root.name() {
            return Err(Error::PathNotFound(path.to_string()));
        }

        let mut current = Arc::clone(&self.root);
        for segment in segments {
            current = current
                .get_child(segment)
                .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        }
        Ok(current)
    }

    /// Create the node at `path` with the given kind, creating missing
    /// intermediate nodes as [`NodeKind::Internal`].
    ///
    /// Fails with [`Error::PathAlreadyExists`] when the full path already
    /// resolves, including when a concurrent creation of the same path
    /// wins the insert race.
    pub fn create_path(&self, path: &PartialPath, kind: NodeKind) -> Result<Arc<MetaNode>> {
        let (first, rest) = path
            .segments()
            .split_first()
            .ok_or_else(|| Error::invalid_path("empty path"))?;
        if *first != self.root.name() {
            return Err(Error::invalid_path(format!(
                "path must start at '{}', got '{path}'",
                self.root.name()
            )));
        }
        let (leaf_name, intermediates) = rest
            .split_last()
            .ok_or_else(|| Error::PathAlreadyExists(path.to_string()))?;

        let mut current = Arc::clone(&self.root);
        for segment in intermediates {
            current = match current.get_child(segment) {
                Some(child) => child,
                None => {
                    let node = MetaNode::new(NodeKind::Internal, Some(&current), segment.clone());
                    current.add_child(segment.clone(), node);
                    // re-read rather than assume our insert won
                    current.get_child(segment).ok_or_else(|| {
                        Error::internal(format!(
                            "child '{segment}' vanished while creating '{path}'"
                        ))
                    })?
                }
            };
        }

        let node = MetaNode::new(kind, Some(&current), leaf_name.clone());
        current.add_child(leaf_name.clone(), Arc::clone(&node));
        let stored = current.get_child(leaf_name).ok_or_else(|| {
            Error::internal(format!(
                "child '{leaf_name}' vanished while creating '{path}'"
            ))
        })?;
        if !Arc::ptr_eq(&stored, &node) {
            return Err(Error::PathAlreadyExists(path.to_string()));
        }

        debug!(path = %path, kind = %kind, "created metadata path");
        Ok(node)
    }

    /// Register `alias` as an alternate lookup name for the node at
    /// `path`, on that node's parent.
    pub fn register_alias(&self, path: &PartialPath, alias: impl Into<String>) -> Result<()> {
        let node = self.node_by_path(path)?;
        let parent = node
            .parent()
            .ok_or_else(|| Error::invalid_path("cannot alias the root"))?;
        let alias = alias.into();
        if parent.add_alias(alias.clone(), node) {
            Ok(())
        } else {
            warn!(alias = %alias, path = %path, "alias already maps to a different child");
            Err(Error::AliasConflict {
                alias,
                parent: parent.full_path().to_string(),
            })
        }
    }

    /// Detach the subtree at `path` from its parent.
    ///
    /// Alias entries on the parent that resolve to the removed node are
    /// dropped with it; the detached subtree stays alive only through
    /// handles the rest of the process may still hold.
    pub fn delete_path(&self, path: &PartialPath) -> Result<()> {
        let node = self.node_by_path(path)?;
        let parent = node
            .parent()
            .ok_or_else(|| Error::invalid_path("cannot delete the root"))?;

        for (alias, target) in parent.alias_children() {
            if Arc::ptr_eq(&target, &node) {
                parent.delete_alias_child(&alias);
            }
        }
        parent.delete_child(&node.name());

        debug!(path = %path, "deleted metadata path");
        Ok(())
    }

    /// Write a checkpoint of the whole tree to `writer`.
    ///
    /// On failure lines already written are not rolled back; the caller
    /// must treat the attempt as fatal and discard the output.
    pub fn checkpoint_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.root.serialize_to(writer)?;
        debug!(leaves = self.leaf_count(), "metadata tree checkpoint written");
        Ok(())
    }

    /// Rebuild a tree from a checkpoint produced by
    /// [`checkpoint_to`](Self::checkpoint_to)
    pub fn restore_from<R: BufRead>(reader: R) -> Result<Self> {
        let root = restore_tree(reader).map_err(|e| {
            error!("metadata tree restore failed: {e}");
            e
        })?;
        let tree = Self { root };
        info!(leaves = tree.leaf_count(), "metadata tree restored from checkpoint");
        Ok(tree)
    }
}
