//! SeriesIO Metadata Tree - In-memory namespace index
//!
//! Hierarchical index over the entities of the storage engine (storage
//! groups, devices, measurements) under a dotted path naming scheme:
//!
//! ```text
//! root ── sg1 ── d1 ── s1   (measurement leaf)
//!          │      └─── s2
//!          └──── d2 ── s1
//! ```
//!
//! # Design
//!
//! - **Nodes are cheap.** Millions of nodes may be resident; the child and
//!   alias maps of a node are allocated only on first insertion, and most
//!   nodes (leaves) never allocate either.
//! - **Reads are hot, writes are rare.** Lookups run concurrently with no
//!   locking beyond the concurrent child maps; exclusive sections are
//!   confined to one-time map allocation and short per-field locks.
//! - **Full paths are interned.** Equal path text anywhere in the tree
//!   shares one backing allocation through a process-wide pool.
//! - **Checkpoints are line-oriented.** The tree serializes post-order with
//!   count-prefixed lines, so a single forward pass with a stack rebuilds
//!   it without parent references in the encoding.

pub mod intern;
pub mod node;
pub mod snapshot;
pub mod tree;

pub use intern::PathPool;
pub use node::{MetaNode, NodeKind};
pub use snapshot::restore_tree;
pub use tree::MetaTree;
