//! Primary value type representing runtime objects.
//!
//! This enum uses a hybrid design: small immediate values (Int, Bool, None)
//! are stored inline, while arena-allocated values (BigInt, Str, List, ...)
//! are referenced via `Ref(HeapId)`. Values are cheap copyable handles; the
//! arena that backs them is owned by the `Runtime`.

use crate::{
    builtins::BuiltinFunction,
    heap::{Heap, HeapData, HeapId},
    intern::StringId,
    types::{self, TypeId},
};

/// A runtime value.
#[derive(Debug, Clone, Copy)]
pub enum Value {
    /// Marker for an unbound local slot or empty cell. Never observable by
    /// the emulated program; reads of it raise UnboundLocalError.
    Undefined,
    None,
    /// The `NotImplemented` singleton.
    ///
    /// Returned by binary slot implementations to signal that the operation
    /// is not supported for the given operand pairing. The dispatcher then
    /// tries the reflected operation on the other operand; the sentinel
    /// never escapes the dispatcher.
    NotImplemented,
    Bool(bool),
    /// Compact representation of the logical int type; spills to the arena
    /// `BigInt` representation on overflow.
    Int(i64),
    Float(f64),
    /// An interned string. Computed strings live in the arena instead.
    InternString(StringId),
    /// A native builtin function.
    Builtin(BuiltinFunction),
    /// A type object, by registry handle.
    Type(TypeId),
    /// Arena-allocated data.
    Ref(HeapId),
}

impl Value {
    /// Returns the value's type, resolving arena data through the heap.
    ///
    /// # Panics
    /// Panics on `Undefined`, which is never a live value.
    #[must_use]
    pub(crate) fn py_type(self, heap: &Heap) -> TypeId {
        match self {
            Self::Undefined => panic!("cannot get type of undefined value"),
            Self::None => types::NONE_TYPE,
            Self::NotImplemented => types::NOT_IMPLEMENTED_TYPE,
            Self::Bool(_) => types::BOOL,
            Self::Int(_) => types::INT,
            Self::Float(_) => types::FLOAT,
            Self::InternString(_) => types::STR,
            Self::Builtin(_) => types::BUILTIN_FUNCTION,
            Self::Type(_) => types::TYPE,
            Self::Ref(id) => match heap.get(id) {
                HeapData::BigInt(_) => types::INT,
                HeapData::Str(_) => types::STR,
                HeapData::Tuple(_) => types::TUPLE,
                HeapData::List(_) => types::LIST,
                HeapData::Dict(_) => types::DICT,
                HeapData::Cell(_) => types::CELL,
                HeapData::Function(_) => types::FUNCTION,
                HeapData::BoundMethod(_) => types::BOUND_METHOD,
                HeapData::GetSet(_) => types::GETSET,
                HeapData::Instance(instance) => instance.type_id,
                HeapData::SeqIter(_) => types::SEQ_ITER,
                HeapData::Code(_) => types::CODE,
            },
        }
    }

    /// Identity comparison, the `is` operator.
    ///
    /// Immediates are identical when they hold the same bits; arena values
    /// when they are the same entry.
    #[must_use]
    pub fn identical(self, other: Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) | (Self::NotImplemented, Self::NotImplemented) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::InternString(a), Self::InternString(b)) => a == b,
            (Self::Builtin(a), Self::Builtin(b)) => a == b,
            (Self::Type(a), Self::Type(b)) => a == b,
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }

    /// Returns true for the `Undefined` marker.
    #[inline]
    #[must_use]
    pub fn is_undefined(self) -> bool {
        matches!(self, Self::Undefined)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Formats a float the way the emulated language's repr does.
///
/// ryu produces the shortest round-trip form but does not handle the
/// non-finite values, and renders integral floats without the trailing
/// zero CPython keeps.
#[must_use]
pub(crate) fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_owned();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_owned() } else { "-inf".to_owned() };
    }
    let mut buffer = ryu::Buffer::new();
    buffer.format(value).to_owned()
}
