//! Operator resolution over slot tables.
//!
//! The binary algorithm: when both operand types share one implementation it
//! is invoked exactly once; when the right type is a proper subtype of the
//! left with its own implementation, it is asked first (through the
//! reflected kind, receiver first); otherwise left-forward then
//! right-reflected. The `NotImplemented` sentinel and empty slots are
//! converted to TypeError here and never escape to callers.

use strum::FromRepr;

use crate::{
    exception::{ExcType, RunError, RunResult},
    runtime::Runtime,
    types::slot::{SlotKind, SlotValue},
    value::Value,
};

/// Invokes a binary slot entry, treating `Empty` as a decline.
fn call_binary(rt: &mut Runtime, slot: SlotValue, a: Value, b: Value) -> RunResult<Value> {
    match slot {
        SlotValue::Binary(f) => f(rt, a, b),
        SlotValue::Empty => Ok(Value::NotImplemented),
        _ => Err(RunError::internal("binary dispatch through a non-binary slot entry")),
    }
}

/// Resolution core: returns the operation result or `NotImplemented` when
/// neither operand's implementation accepts the pairing.
fn binary_op1(rt: &mut Runtime, left: Value, right: Value, op: SlotKind) -> RunResult<Value> {
    let ltype = rt.type_of(left);
    let rtype = rt.type_of(right);
    let slotv = rt.slot_of(ltype, op);

    // Both types resolve to the same implementation: one call settles it.
    if ltype == rtype || slotv == rt.slot_of(rtype, op) {
        return call_binary(rt, slotv, left, right);
    }

    let reflected = op
        .reflected()
        .ok_or_else(|| RunError::internal(format!("binary dispatch on kind '{op}' with no reflected pair")))?;
    let slotw = rt.slot_of(rtype, reflected);

    // Right is a proper subtype with its own implementation: ask it first.
    let mut tried_reflected = false;
    if !slotw.is_empty() && rt.types.is_subtype(rtype, ltype) {
        tried_reflected = true;
        let r = call_binary(rt, slotw, right, left)?;
        if !matches!(r, Value::NotImplemented) {
            return Ok(r);
        }
    }

    let r = call_binary(rt, slotv, left, right)?;
    if !matches!(r, Value::NotImplemented) {
        return Ok(r);
    }

    if !tried_reflected {
        let r = call_binary(rt, slotw, right, left)?;
        if !matches!(r, Value::NotImplemented) {
            return Ok(r);
        }
    }

    Ok(Value::NotImplemented)
}

/// Performs a binary operation, raising TypeError when no implementation
/// accepts the operand pairing.
pub(crate) fn binary_op(rt: &mut Runtime, left: Value, right: Value, op: SlotKind) -> RunResult<Value> {
    let r = binary_op1(rt, left, right, op)?;
    if matches!(r, Value::NotImplemented) {
        let left_name = rt.type_name(rt.type_of(left)).to_owned();
        let right_name = rt.type_name(rt.type_of(right)).to_owned();
        return Err(ExcType::binary_type_error(op.symbol(), &left_name, &right_name));
    }
    Ok(r)
}

/// Performs a unary operation through a single slot lookup.
pub(crate) fn unary_op(rt: &mut Runtime, v: Value, op: SlotKind) -> RunResult<Value> {
    let type_id = rt.type_of(v);
    match rt.slot_of(type_id, op) {
        SlotValue::Unary(f) => {
            let r = f(rt, v)?;
            if matches!(r, Value::NotImplemented) {
                let type_name = rt.type_name(type_id).to_owned();
                return Err(ExcType::unary_type_error(op.symbol(), &type_name));
            }
            Ok(r)
        }
        SlotValue::Empty => {
            let type_name = rt.type_name(type_id).to_owned();
            Err(ExcType::unary_type_error(op.symbol(), &type_name))
        }
        _ => Err(RunError::internal("unary dispatch through a non-unary slot entry")),
    }
}

/// The rich comparison repertoire, keyed by the `CompareOp` operand.
///
/// The order is fixed: bytecode encodes a comparison as this enum's
/// discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(u8)]
pub enum Comparison {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
    In,
    NotIn,
    Is,
    IsNot,
}

impl Comparison {
    /// The source-level text, for error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Is => "is",
            Self::IsNot => "is not",
        }
    }

    /// The swapped-argument counterpart: `a < b` is `b > a`.
    #[must_use]
    fn swapped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    /// The slot kind implementing this comparison's forward form.
    fn slot_kind(self) -> SlotKind {
        match self {
            Self::Lt => SlotKind::Lt,
            Self::Le => SlotKind::Le,
            Self::Eq | Self::Is => SlotKind::Eq,
            Self::Ne | Self::IsNot => SlotKind::Ne,
            Self::Gt => SlotKind::Gt,
            Self::Ge => SlotKind::Ge,
            Self::In | Self::NotIn => SlotKind::Contains,
        }
    }
}

/// Performs a rich comparison.
///
/// Ordering comparisons run the slot protocol with the swapped form tried
/// first when the right type is a proper subtype; equality falls back to
/// identity instead of failing; identity and membership have their own
/// rules.
pub(crate) fn compare(rt: &mut Runtime, left: Value, right: Value, cmp: Comparison) -> RunResult<Value> {
    match cmp {
        Comparison::Is => return Ok(Value::Bool(left.identical(right))),
        Comparison::IsNot => return Ok(Value::Bool(!left.identical(right))),
        Comparison::In => return contains(rt, left, right).map(Value::Bool),
        Comparison::NotIn => return contains(rt, left, right).map(|b| Value::Bool(!b)),
        _ => {}
    }

    let ltype = rt.type_of(left);
    let rtype = rt.type_of(right);

    // Try the swapped operation first if the right side is a proper subtype.
    let mut tried_swapped = false;
    if ltype != rtype && rt.types.is_subtype(rtype, ltype) {
        tried_swapped = true;
        let slot = rt.slot_of(rtype, cmp.swapped().slot_kind());
        let r = call_binary(rt, slot, right, left)?;
        if !matches!(r, Value::NotImplemented) {
            return Ok(r);
        }
    }

    // Forward operation.
    let slot = rt.slot_of(ltype, cmp.slot_kind());
    let r = call_binary(rt, slot, left, right)?;
    if !matches!(r, Value::NotImplemented) {
        return Ok(r);
    }

    // Swapped operation, if not already tried.
    if !tried_swapped {
        let slot = rt.slot_of(rtype, cmp.swapped().slot_kind());
        let r = call_binary(rt, slot, right, left)?;
        if !matches!(r, Value::NotImplemented) {
            return Ok(r);
        }
    }

    // Neither side implements it. Base == and != on identity.
    match cmp {
        Comparison::Eq => Ok(Value::Bool(left.identical(right))),
        Comparison::Ne => Ok(Value::Bool(!left.identical(right))),
        _ => {
            let left_name = rt.type_name(ltype).to_owned();
            let right_name = rt.type_name(rtype).to_owned();
            Err(ExcType::comparison_type_error(cmp.symbol(), &left_name, &right_name))
        }
    }
}

/// Membership test: `item in container` consults the container's contains
/// slot.
fn contains(rt: &mut Runtime, item: Value, container: Value) -> RunResult<bool> {
    let container_type = rt.type_of(container);
    match rt.slot_of(container_type, SlotKind::Contains) {
        SlotValue::Contains(f) => f(rt, container, item),
        SlotValue::Empty => {
            let type_name = rt.type_name(container_type).to_owned();
            Err(ExcType::type_error(format!(
                "argument of type '{type_name}' is not iterable"
            )))
        }
        _ => Err(RunError::internal("contains dispatch through a non-contains slot entry")),
    }
}

/// Boolean equality helper used by container internals.
pub(crate) fn value_eq(rt: &mut Runtime, a: Value, b: Value) -> RunResult<bool> {
    match compare(rt, a, b, Comparison::Eq)? {
        Value::Bool(b) => Ok(b),
        other => rt.truthy(other),
    }
}

/// Resolves a value's iterator through its iter slot.
pub(crate) fn get_iter(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let type_id = rt.type_of(v);
    match rt.slot_of(type_id, SlotKind::Iter) {
        SlotValue::Unary(f) => f(rt, v),
        SlotValue::Empty => {
            let type_name = rt.type_name(type_id).to_owned();
            Err(ExcType::type_error(format!("'{type_name}' object is not iterable")))
        }
        _ => Err(RunError::internal("iter dispatch through a non-unary slot entry")),
    }
}

/// Advances an iterator: `Ok(Some(v))` on a value, `Ok(None)` on
/// exhaustion. StopIteration is absorbed here; other errors propagate.
pub(crate) fn iter_next(rt: &mut Runtime, iterator: Value) -> RunResult<Option<Value>> {
    let type_id = rt.type_of(iterator);
    match rt.slot_of(type_id, SlotKind::Next) {
        SlotValue::Unary(f) => match f(rt, iterator) {
            Ok(v) => Ok(Some(v)),
            Err(err) if err.is_exc(crate::exception::ExcType::StopIteration) => Ok(None),
            Err(err) => Err(err),
        },
        SlotValue::Empty => {
            let type_name = rt.type_name(type_id).to_owned();
            Err(ExcType::type_error(format!("'{type_name}' object is not an iterator")))
        }
        _ => Err(RunError::internal("next dispatch through a non-unary slot entry")),
    }
}
