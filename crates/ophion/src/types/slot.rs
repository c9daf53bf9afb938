//! The closed set of special operations a type may implement.
//!
//! Every type carries a [`SlotTable`] with one entry per [`SlotKind`]; an
//! entry is either a callable of the kind's required shape or the
//! distinguished [`SlotValue::Empty`] marker - never absent. Tables are
//! filled at type construction by inheriting the base type's entries and
//! overwriting from the new type's own literal implementation list; every
//! write re-validates the callable's shape against the kind and fails loudly
//! on mismatch.

use strum::{Display, EnumCount, EnumIter};

use crate::{
    args::CallArgs,
    exception::{RunError, RunResult},
    intern::StringId,
    runtime::Runtime,
    types::TypeId,
    value::Value,
};

/// Implementation of a unary operation: `f(operand)`.
pub type UnaryFn = fn(&mut Runtime, Value) -> RunResult<Value>;
/// Implementation of a binary operation: `f(receiver, other)`.
///
/// For reflected kinds the receiver is the right-hand operand of the source
/// expression; the dispatcher swaps the arguments before the call.
pub type BinaryFn = fn(&mut Runtime, Value, Value) -> RunResult<Value>;
/// Truthiness predicate.
pub type PredicateFn = fn(&mut Runtime, Value) -> RunResult<bool>;
/// Length query.
pub type LenFn = fn(&mut Runtime, Value) -> RunResult<usize>;
/// Membership test: `f(container, item)`.
pub type ContainsFn = fn(&mut Runtime, Value, Value) -> RunResult<bool>;
/// Item assignment: `f(container, key, value)`.
pub type SetItemFn = fn(&mut Runtime, Value, Value, Value) -> RunResult<()>;
/// Item deletion: `f(container, key)`.
pub type DelItemFn = fn(&mut Runtime, Value, Value) -> RunResult<()>;
/// Attribute read: `f(obj, name)`.
pub type AttrGetFn = fn(&mut Runtime, Value, StringId) -> RunResult<Value>;
/// Attribute write: `f(obj, name, value)`.
pub type AttrSetFn = fn(&mut Runtime, Value, StringId, Value) -> RunResult<()>;
/// Attribute deletion: `f(obj, name)`.
pub type AttrDelFn = fn(&mut Runtime, Value, StringId) -> RunResult<()>;
/// Descriptor read: `f(descriptor, obj, obj_type)`.
pub type DescrGetFn = fn(&mut Runtime, Value, Value, TypeId) -> RunResult<Value>;
/// Descriptor write: `f(descriptor, obj, value)`.
pub type DescrSetFn = fn(&mut Runtime, Value, Value, Value) -> RunResult<()>;
/// Descriptor deletion: `f(descriptor, obj)`.
pub type DescrDelFn = fn(&mut Runtime, Value, Value) -> RunResult<()>;
/// Instance allocation: `f(type_being_constructed, args)`.
pub type NewFn = fn(&mut Runtime, TypeId, &CallArgs) -> RunResult<Value>;
/// Instance initialization: `f(instance, args)`.
pub type InitFn = fn(&mut Runtime, Value, &CallArgs) -> RunResult<()>;

/// The required call-signature shape of a slot kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SlotShape {
    Unary,
    Binary,
    Predicate,
    Len,
    Contains,
    SetItem,
    DelItem,
    AttrGet,
    AttrSet,
    AttrDel,
    DescrGet,
    DescrSet,
    DescrDel,
    New,
    Init,
}

/// Canonical names for every special operation in the runtime.
///
/// The enumeration is closed: the slot table is a fixed-size array indexed
/// by this enum, so adding a kind is a compile-visible change rather than a
/// lookup that can silently miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum SlotKind {
    Repr,
    Bool,
    Len,
    GetAttr,
    SetAttr,
    DelAttr,
    DescrGet,
    DescrSet,
    DescrDelete,
    New,
    Init,
    Iter,
    Next,
    GetItem,
    SetItem,
    DelItem,
    Contains,
    Neg,
    Pos,
    Invert,
    Abs,
    Add,
    RightAdd,
    Sub,
    RightSub,
    Mul,
    RightMul,
    TrueDiv,
    RightTrueDiv,
    FloorDiv,
    RightFloorDiv,
    Mod,
    RightMod,
    And,
    RightAnd,
    Or,
    RightOr,
    Xor,
    RightXor,
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl SlotKind {
    /// The call-signature shape an implementation of this kind must have.
    #[must_use]
    pub fn shape(self) -> SlotShape {
        match self {
            Self::Repr | Self::Iter | Self::Next | Self::Neg | Self::Pos | Self::Invert | Self::Abs => SlotShape::Unary,
            Self::Bool => SlotShape::Predicate,
            Self::Len => SlotShape::Len,
            Self::GetAttr => SlotShape::AttrGet,
            Self::SetAttr => SlotShape::AttrSet,
            Self::DelAttr => SlotShape::AttrDel,
            Self::DescrGet => SlotShape::DescrGet,
            Self::DescrSet => SlotShape::DescrSet,
            Self::DescrDelete => SlotShape::DescrDel,
            Self::New => SlotShape::New,
            Self::Init => SlotShape::Init,
            Self::SetItem => SlotShape::SetItem,
            Self::DelItem => SlotShape::DelItem,
            Self::Contains => SlotShape::Contains,
            Self::GetItem
            | Self::Add
            | Self::RightAdd
            | Self::Sub
            | Self::RightSub
            | Self::Mul
            | Self::RightMul
            | Self::TrueDiv
            | Self::RightTrueDiv
            | Self::FloorDiv
            | Self::RightFloorDiv
            | Self::Mod
            | Self::RightMod
            | Self::And
            | Self::RightAnd
            | Self::Or
            | Self::RightOr
            | Self::Xor
            | Self::RightXor
            | Self::Lt
            | Self::Le
            | Self::Eq
            | Self::Ne
            | Self::Gt
            | Self::Ge => SlotShape::Binary,
        }
    }

    /// The swapped-argument counterpart of a binary arithmetic kind.
    ///
    /// The dispatcher tries the reflected kind on the right operand when the
    /// left operand's implementation declines.
    #[must_use]
    pub fn reflected(self) -> Option<Self> {
        match self {
            Self::Add => Some(Self::RightAdd),
            Self::Sub => Some(Self::RightSub),
            Self::Mul => Some(Self::RightMul),
            Self::TrueDiv => Some(Self::RightTrueDiv),
            Self::FloorDiv => Some(Self::RightFloorDiv),
            Self::Mod => Some(Self::RightMod),
            Self::And => Some(Self::RightAnd),
            Self::Or => Some(Self::RightOr),
            Self::Xor => Some(Self::RightXor),
            _ => None,
        }
    }

    /// The source-level operator symbol, for error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add | Self::RightAdd => "+",
            Self::Sub | Self::RightSub => "-",
            Self::Mul | Self::RightMul => "*",
            Self::TrueDiv | Self::RightTrueDiv => "/",
            Self::FloorDiv | Self::RightFloorDiv => "//",
            Self::Mod | Self::RightMod => "%",
            Self::And | Self::RightAnd => "&",
            Self::Or | Self::RightOr => "|",
            Self::Xor | Self::RightXor => "^",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Neg => "unary -",
            Self::Pos => "unary +",
            Self::Invert => "unary ~",
            Self::Abs => "abs()",
            _ => "",
        }
    }
}

/// A slot table entry: a callable of the kind's shape, or empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SlotValue {
    /// The distinguished "no implementation" marker.
    Empty,
    Unary(UnaryFn),
    Binary(BinaryFn),
    Predicate(PredicateFn),
    Len(LenFn),
    Contains(ContainsFn),
    SetItem(SetItemFn),
    DelItem(DelItemFn),
    AttrGet(AttrGetFn),
    AttrSet(AttrSetFn),
    AttrDel(AttrDelFn),
    DescrGet(DescrGetFn),
    DescrSet(DescrSetFn),
    DescrDel(DescrDelFn),
    New(NewFn),
    Init(InitFn),
}

impl SlotValue {
    /// The shape of the held callable, or `None` for `Empty`.
    #[must_use]
    pub fn shape(self) -> Option<SlotShape> {
        match self {
            Self::Empty => None,
            Self::Unary(_) => Some(SlotShape::Unary),
            Self::Binary(_) => Some(SlotShape::Binary),
            Self::Predicate(_) => Some(SlotShape::Predicate),
            Self::Len(_) => Some(SlotShape::Len),
            Self::Contains(_) => Some(SlotShape::Contains),
            Self::SetItem(_) => Some(SlotShape::SetItem),
            Self::DelItem(_) => Some(SlotShape::DelItem),
            Self::AttrGet(_) => Some(SlotShape::AttrGet),
            Self::AttrSet(_) => Some(SlotShape::AttrSet),
            Self::AttrDel(_) => Some(SlotShape::AttrDel),
            Self::DescrGet(_) => Some(SlotShape::DescrGet),
            Self::DescrSet(_) => Some(SlotShape::DescrSet),
            Self::DescrDel(_) => Some(SlotShape::DescrDel),
            Self::New(_) => Some(SlotShape::New),
            Self::Init(_) => Some(SlotShape::Init),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Per-type dispatch table: one entry per [`SlotKind`], all present.
#[derive(Debug, Clone)]
pub struct SlotTable {
    entries: [SlotValue; SlotKind::COUNT],
}

impl SlotTable {
    /// A table with every entry empty.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: [SlotValue::Empty; SlotKind::COUNT],
        }
    }

    /// Total lookup: every kind has an entry, possibly `Empty`.
    #[inline]
    #[must_use]
    pub fn get(&self, kind: SlotKind) -> SlotValue {
        self.entries[kind as usize]
    }

    /// Installs an implementation, validating its shape against the kind.
    ///
    /// A shape mismatch is a runtime-construction bug, reported as an
    /// internal error so it can never be caught as a user-level exception.
    pub fn set(&mut self, kind: SlotKind, value: SlotValue) -> RunResult<()> {
        if let Some(shape) = value.shape()
            && shape != kind.shape()
        {
            return Err(RunError::internal(format!(
                "slot '{kind}' requires a {} implementation, got {shape}",
                kind.shape()
            )));
        }
        self.entries[kind as usize] = value;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn reflected_kinds_are_binary() {
        for kind in SlotKind::iter() {
            if let Some(reflected) = kind.reflected() {
                assert_eq!(kind.shape(), SlotShape::Binary);
                assert_eq!(reflected.shape(), SlotShape::Binary);
                assert_eq!(reflected.symbol(), kind.symbol());
            }
        }
    }

    #[test]
    fn set_rejects_shape_mismatch() {
        fn bad_len(_rt: &mut crate::Runtime, _v: Value) -> RunResult<usize> {
            Ok(0)
        }
        let mut table = SlotTable::empty();
        let err = table.set(SlotKind::Add, SlotValue::Len(bad_len)).unwrap_err();
        assert!(matches!(err, RunError::Internal(_)));
        // The entry stays empty after the failed install.
        assert!(table.get(SlotKind::Add).is_empty());
    }
}
