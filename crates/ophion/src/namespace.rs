//! Global/module namespaces.
//!
//! Namespaces map interned names to values and are stored in their own arena
//! so functions can hold an owning handle to the global namespace they were
//! defined in. Frame-local storage does not live here: optimized code uses
//! the frame's flat locals array instead.

use ahash::AHashMap;

use crate::{intern::StringId, value::Value};

/// Handle to a namespace in the [`Namespaces`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct NamespaceId(u32);

/// Arena of name -> value mappings.
#[derive(Debug, Default)]
pub(crate) struct Namespaces {
    spaces: Vec<AHashMap<StringId, Value>>,
}

impl Namespaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh empty namespace.
    pub fn create(&mut self) -> NamespaceId {
        let id = NamespaceId(u32::try_from(self.spaces.len()).expect("namespace arena exceeds u32 capacity"));
        self.spaces.push(AHashMap::new());
        id
    }

    #[inline]
    pub fn get(&self, ns: NamespaceId, name: StringId) -> Option<Value> {
        self.spaces[ns.0 as usize].get(&name).copied()
    }

    #[inline]
    pub fn set(&mut self, ns: NamespaceId, name: StringId, value: Value) {
        self.spaces[ns.0 as usize].insert(name, value);
    }

    pub fn delete(&mut self, ns: NamespaceId, name: StringId) -> bool {
        self.spaces[ns.0 as usize].remove(&name).is_some()
    }
}
