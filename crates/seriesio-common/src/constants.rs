//! Namespace constants shared across SeriesIO components.
//!
//! The separator and node type tags are part of the on-disk checkpoint
//! encoding and of the contract with the path-parsing layer; changing
//! either breaks compatibility with existing checkpoints.

/// Separator between segments in a full dotted path.
///
/// Must match the separator the path-parsing layer splits on.
pub const PATH_SEPARATOR: char = '.';

/// Name of the metadata tree root node.
pub const ROOT_NAME: &str = "root";

/// Checkpoint type tag for internal (grouping) nodes.
pub const INTERNAL_NODE_TYPE: u8 = 0;

/// Checkpoint type tag for storage-group boundary nodes.
pub const STORAGE_GROUP_NODE_TYPE: u8 = 1;

/// Checkpoint type tag for measurement leaf nodes.
pub const MEASUREMENT_NODE_TYPE: u8 = 2;

/// Default file name for a metadata tree checkpoint.
pub const METADATA_CHECKPOINT_FILE: &str = "mtree.checkpoint";
