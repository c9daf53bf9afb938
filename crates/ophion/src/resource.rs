//! Resource limits for the runtime.
//!
//! Emulated recursion maps onto the explicit frame stack, so the depth guard
//! here bounds frame count rather than host stack usage; the heap budget
//! bounds arena growth. Both are consulted on every frame push / allocation.

/// Default maximum depth of the emulated call stack.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Default maximum number of live arena entries.
pub const DEFAULT_MAX_HEAP_ENTRIES: usize = 1 << 24;

/// Limits applied by a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum emulated call-stack depth; exceeding it raises RecursionError.
    pub max_recursion_depth: usize,
    /// Maximum number of arena entries; exceeding it raises MemoryError.
    pub max_heap_entries: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            max_heap_entries: DEFAULT_MAX_HEAP_ENTRIES,
        }
    }
}
