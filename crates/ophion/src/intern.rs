//! Name and identifier interning.
//!
//! Identifiers (variable names, attribute names, parameter names) are stored
//! once in an [`Interns`] table and referenced by [`StringId`], so name
//! comparisons during attribute lookup and keyword binding are integer
//! comparisons. The table is owned by the `Runtime` context and populated
//! lazily from arbitrary call sites; exclusive ownership (`&mut Runtime`)
//! guarantees duplicate inserts resolve to the same identity.

use ahash::AHashMap;

/// Index into the string interner's storage.
///
/// Uses `u32` to save space (4 bytes vs 8 bytes for `usize`). This limits us
/// to ~4 billion unique names, which is more than sufficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interning table mapping strings to stable [`StringId`]s.
///
/// Storage is append-only: ids stay valid for the lifetime of the owning
/// runtime.
#[derive(Debug, Default)]
pub(crate) struct Interns {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, StringId>,
}

impl Interns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning the existing id when the string is
    /// already present.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("intern table exceeds u32 capacity"));
        let boxed: Box<str> = s.into();
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, id);
        id
    }

    /// Returns the string for an id.
    #[must_use]
    pub fn get_str(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Looks up an already-interned string without inserting.
    #[must_use]
    pub fn find(&self, s: &str) -> Option<StringId> {
        self.lookup.get(s).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_inserts_resolve_to_one_identity() {
        let mut interns = Interns::new();
        let a = interns.intern("value");
        let b = interns.intern("value");
        assert_eq!(a, b);
        assert_eq!(interns.get_str(a), "value");
    }

    #[test]
    fn find_does_not_insert() {
        let mut interns = Interns::new();
        assert!(interns.find("missing").is_none());
        let id = interns.intern("present");
        assert_eq!(interns.find("present"), Some(id));
    }
}
