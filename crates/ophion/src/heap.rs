//! Arena heap for runtime values.
//!
//! All non-immediate values live in a single arena owned by the `Runtime`
//! and are referenced through stable opaque [`HeapId`] handles. Cross
//! references between objects (a bound method's receiver, a cell captured by
//! several closures) are handles into the same arena, so there is no cyclic
//! ownership to manage: the arena reclaims wholesale when the runtime is
//! dropped, and frames abandoned by exception unwind simply stop referencing
//! their entries.

use std::sync::Arc;

use num_bigint::BigInt;

use crate::{
    code::CodeObject,
    exception::{ExcType, RunResult, SimpleException},
    function::Function,
    types::{
        descr::GetSet,
        dict::Dict,
        instance::Instance,
        iter::SeqIter,
    },
    value::Value,
};

/// Index into the arena. Stable for the lifetime of the owning runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct HeapId(u32);

impl HeapId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A shared mutable box implementing a variable captured across nested
/// function scopes. Starts empty (`Undefined`) until the defining frame or a
/// closure writes it.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Cell {
    pub value: Value,
}

/// A callable paired with the receiver it was looked up on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundMethod {
    pub callable: Value,
    pub receiver: Value,
}

/// Arena-resident data. The variant determines the value's logical type;
/// `BigInt` is the general representation of the logical `int` type whose
/// compact representation is the immediate `Value::Int`.
#[derive(Debug)]
pub(crate) enum HeapData {
    BigInt(BigInt),
    Str(Box<str>),
    Tuple(Vec<Value>),
    List(Vec<Value>),
    Dict(Dict),
    Cell(Cell),
    Function(Function),
    BoundMethod(BoundMethod),
    GetSet(GetSet),
    Instance(Instance),
    SeqIter(SeqIter),
    Code(Arc<CodeObject>),
}

/// Append-only arena with a configurable entry budget.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    entries: Vec<HeapData>,
    max_entries: usize,
}

impl Heap {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
        }
    }

    /// Allocates a new entry, failing with MemoryError once the budget is
    /// exhausted.
    pub fn allocate(&mut self, data: HeapData) -> RunResult<HeapId> {
        if self.entries.len() >= self.max_entries {
            return Err(SimpleException::new_msg(ExcType::MemoryError, "heap entry budget exhausted").into());
        }
        let id = HeapId(u32::try_from(self.entries.len()).expect("heap exceeds u32 capacity"));
        self.entries.push(data);
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: HeapId) -> &HeapData {
        &self.entries[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.entries[id.index()]
    }
}
