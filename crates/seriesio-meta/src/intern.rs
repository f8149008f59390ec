//! Process-wide path string interning.
//!
//! Full paths repeat across the tree (and across restarts of the same
//! schema), so nodes cache them as shared `Arc<str>` instances drawn from
//! a single pool. Paths are long-lived and read far more often than they
//! are built.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::{Arc, OnceLock};

static GLOBAL_POOL: OnceLock<PathPool> = OnceLock::new();

/// Deduplicating pool of canonical path strings.
///
/// Insertion is atomic-if-absent: concurrent callers interning equal text
/// converge on one canonical instance even if each built its own copy
/// first.
#[derive(Debug, Default)]
pub struct PathPool {
    pool: DashMap<Arc<str>, ()>,
}

impl PathPool {
    /// Create an empty pool
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide pool shared by all trees
    pub fn global() -> &'static Self {
        GLOBAL_POOL.get_or_init(Self::new)
    }

    /// Return the canonical shared instance for `path`.
    ///
    /// Registers `path` as the canonical instance if no equal string is
    /// pooled yet; otherwise the fresh string is dropped in favor of the
    /// pooled one.
    pub fn intern(&self, path: String) -> Arc<str> {
        if let Some(existing) = self.pool.get(path.as_str()) {
            return Arc::clone(existing.key());
        }
        let candidate: Arc<str> = Arc::from(path);
        match self.pool.entry(Arc::clone(&candidate)) {
            Entry::Occupied(entry) => Arc::clone(entry.key()),
            Entry::Vacant(entry) => {
                entry.insert(());
                candidate
            }
        }
    }

    /// Number of pooled strings
    #[must_use]
    pub fn len(&self) -> usize {
        self.pool.len()
    }

    /// Check if the pool is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_shares_backing_allocation() {
        let pool = PathPool::new();
        let first = pool.intern("root.sg1.d1.s1".to_string());
        let second = pool.intern("root.sg1.d1.s1".to_string());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_intern_distinct_strings() {
        let pool = PathPool::new();
        let a = pool.intern("root.sg1".to_string());
        let b = pool.intern("root.sg2".to_string());
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_global_pool_is_shared() {
        let a = PathPool::global().intern("root.shared.path".to_string());
        let b = PathPool::global().intern("root.shared.path".to_string());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_concurrent_intern_converges() {
        let pool = PathPool::new();
        let interned: Vec<Arc<str>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| pool.intern("root.sg1.d1.race".to_string())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(pool.len(), 1);
        for other in &interned[1..] {
            assert!(Arc::ptr_eq(&interned[0], other));
        }
    }
}
