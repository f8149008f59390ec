//! Checkpoint decoding for the metadata tree.
//!
//! A checkpoint is one line per node, `type_tag,name,child_count`, written
//! post-order by [`MetaNode::serialize_to`]: all descendants precede their
//! parent and the root's line comes last. The encoding carries no parent
//! references; the ordering alone makes a single forward pass sufficient.
//!
//! # Reconstruction
//!
//! Reading in file order, keep a stack of completed subtrees. A line with
//! `child_count = k` pops the k most recently completed nodes as its
//! children and pushes itself. After the final line exactly one node may
//! remain: the root. Anything else (a pop past the bottom of the stack,
//! leftover nodes at EOF, a malformed line) means the checkpoint is
//! corrupt and is rejected rather than patched up.
//!
//! Sibling order within a parent is not preserved across a
//! serialize/restore cycle; the child maps have no defined iteration
//! order.

use crate::node::{MetaNode, NodeKind};
use seriesio_common::{Error, Result};
use std::io::BufRead;
use std::sync::Arc;

/// One decoded `type_tag,name,child_count` line
struct NodeLine {
    kind: NodeKind,
    name: String,
    child_count: usize,
}

impl NodeLine {
    fn parse(line: &str) -> Result<Self> {
        let (tag, rest) = line
            .split_once(',')
            .ok_or_else(|| Error::corruption(format!("malformed node line '{line}'")))?;
        let (name, count) = rest
            .rsplit_once(',')
            .ok_or_else(|| Error::corruption(format!("malformed node line '{line}'")))?;
        let tag: u8 = tag
            .parse()
            .map_err(|_| Error::corruption(format!("bad type tag in line '{line}'")))?;
        let kind = NodeKind::from_type_tag(tag)
            .ok_or_else(|| Error::corruption(format!("unknown node type {tag} in line '{line}'")))?;
        let child_count: usize = count
            .parse()
            .map_err(|_| Error::corruption(format!("bad child count in line '{line}'")))?;
        Ok(Self {
            kind,
            name: name.to_string(),
            child_count,
        })
    }
}

/// Rebuild a tree from a checkpoint produced by
/// [`MetaNode::serialize_to`].
///
/// Returns the root node. Fails with [`Error::Corruption`] when the line
/// stream does not describe exactly one tree, and with [`Error::Io`] when
/// the reader itself fails.
pub fn restore_tree<R: BufRead>(reader: R) -> Result<Arc<MetaNode>> {
    let mut completed: Vec<Arc<MetaNode>> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let parsed = NodeLine::parse(&line)?;
        if parsed.child_count > completed.len() {
            return Err(Error::corruption(format!(
                "line '{line}' claims {} children but only {} subtrees are complete",
                parsed.child_count,
                completed.len()
            )));
        }

        let node = MetaNode::new(parsed.kind, None, parsed.name);
        for child in completed.drain(completed.len() - parsed.child_count..) {
            child.set_parent(&node);
            node.add_child(child.name(), child);
        }
        completed.push(node);
    }

    let root = completed
        .pop()
        .ok_or_else(|| Error::corruption("checkpoint contains no node lines"))?;
    if !completed.is_empty() {
        return Err(Error::corruption(format!(
            "{} subtrees left unattached after the final line",
            completed.len()
        )));
    }
    Ok(root)
}
