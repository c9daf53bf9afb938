//! The logical `int` type and its two backing representations.
//!
//! An int is either the compact immediate `Value::Int(i64)` or the general
//! arena `BigInt`. The closed [`IntRepr`] tag selects between them at call
//! time; every slot implementation here goes through it, so dispatch never
//! inspects an open-ended set of host types. Results normalize back to the
//! compact representation whenever they fit.
//!
//! `bool` is a subtype of `int` and shares these implementations (its slot
//! entries are the identical callables), overriding only `repr`.

use std::cmp::Ordering;

use num_bigint::BigInt;
use num_integer::Integer;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::{
    exception::{ExcType, RunResult},
    heap::{Heap, HeapData},
    runtime::Runtime,
    types::slot::{SlotKind, SlotValue},
    value::Value,
};

/// Representation tag for the logical int type.
pub(crate) enum IntRepr<'a> {
    Small(i64),
    Big(&'a BigInt),
}

/// Extracts the int representation of a value, if it is an int.
///
/// `bool` participates as its subtype relationship requires.
pub(crate) fn int_repr(heap: &Heap, v: Value) -> Option<IntRepr<'_>> {
    match v {
        Value::Int(i) => Some(IntRepr::Small(i)),
        Value::Bool(b) => Some(IntRepr::Small(i64::from(b))),
        Value::Ref(id) => match heap.get(id) {
            HeapData::BigInt(b) => Some(IntRepr::Big(b)),
            _ => None,
        },
        _ => None,
    }
}

/// Converts an int value to f64, for promotion into float arithmetic.
///
/// The general representation can exceed f64 range; that is the one place
/// int arithmetic overflows.
pub(crate) fn int_to_f64(repr: &IntRepr<'_>) -> RunResult<f64> {
    match repr {
        IntRepr::Small(i) => Ok(*i as f64),
        IntRepr::Big(b) => match b.to_f64() {
            Some(f) if f.is_finite() => Ok(f),
            _ => Err(ExcType::overflow_error("int too large to convert to float")),
        },
    }
}

/// Result of a closed-representation computation, before normalization.
enum Computed {
    Small(i64),
    Big(BigInt),
    NotImplemented,
}

/// Runs a binary int operation over both representations.
///
/// `small` returns `None` on i64 overflow, in which case the computation is
/// redone in the general representation.
fn int_binary(
    rt: &mut Runtime,
    left: Value,
    right: Value,
    small: fn(i64, i64) -> Option<i64>,
    big: fn(&BigInt, &BigInt) -> BigInt,
) -> RunResult<Value> {
    let computed = match (int_repr(&rt.heap, left), int_repr(&rt.heap, right)) {
        (Some(a), Some(b)) => match (a, b) {
            (IntRepr::Small(x), IntRepr::Small(y)) => match small(x, y) {
                Some(r) => Computed::Small(r),
                None => Computed::Big(big(&BigInt::from(x), &BigInt::from(y))),
            },
            (IntRepr::Small(x), IntRepr::Big(y)) => Computed::Big(big(&BigInt::from(x), y)),
            (IntRepr::Big(x), IntRepr::Small(y)) => Computed::Big(big(x, &BigInt::from(y))),
            (IntRepr::Big(x), IntRepr::Big(y)) => Computed::Big(big(x, y)),
        },
        _ => Computed::NotImplemented,
    };
    match computed {
        Computed::Small(i) => Ok(Value::Int(i)),
        Computed::Big(b) => rt.value_from_bigint(b),
        Computed::NotImplemented => Ok(Value::NotImplemented),
    }
}

/// Runs a unary int operation over both representations.
fn int_unary(
    rt: &mut Runtime,
    operand: Value,
    op_name: &str,
    small: fn(i64) -> Option<i64>,
    big: fn(&BigInt) -> BigInt,
) -> RunResult<Value> {
    let computed = match int_repr(&rt.heap, operand) {
        Some(IntRepr::Small(x)) => match small(x) {
            Some(r) => Computed::Small(r),
            None => Computed::Big(big(&BigInt::from(x))),
        },
        Some(IntRepr::Big(x)) => Computed::Big(big(x)),
        None => {
            let type_name = rt.value_type_name(operand).to_owned();
            return Err(ExcType::unary_type_error(op_name, &type_name));
        }
    };
    match computed {
        Computed::Small(i) => Ok(Value::Int(i)),
        Computed::Big(b) => rt.value_from_bigint(b),
        Computed::NotImplemented => Ok(Value::NotImplemented),
    }
}

/// Compares two int values, declining non-int operands.
fn int_compare(rt: &mut Runtime, left: Value, right: Value, test: fn(Ordering) -> bool) -> RunResult<Value> {
    let ord = match (int_repr(&rt.heap, left), int_repr(&rt.heap, right)) {
        (Some(a), Some(b)) => match (a, b) {
            (IntRepr::Small(x), IntRepr::Small(y)) => x.cmp(&y),
            (IntRepr::Small(x), IntRepr::Big(y)) => BigInt::from(x).cmp(y),
            (IntRepr::Big(x), IntRepr::Small(y)) => x.cmp(&BigInt::from(y)),
            (IntRepr::Big(x), IntRepr::Big(y)) => x.cmp(y),
        },
        _ => return Ok(Value::NotImplemented),
    };
    Ok(Value::Bool(test(ord)))
}

fn int_add(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    int_binary(rt, left, right, i64::checked_add, |a, b| a + b)
}

fn int_sub(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    int_binary(rt, left, right, i64::checked_sub, |a, b| a - b)
}

fn int_mul(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    int_binary(rt, left, right, i64::checked_mul, |a, b| a * b)
}

/// True division always produces a float result.
fn int_truediv(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    let (a, b) = match (int_repr(&rt.heap, left), int_repr(&rt.heap, right)) {
        (Some(a), Some(b)) => (int_to_f64(&a)?, int_to_f64(&b)?),
        _ => return Ok(Value::NotImplemented),
    };
    if b == 0.0 {
        return Err(ExcType::zero_division("division by zero"));
    }
    Ok(Value::Float(a / b))
}

fn int_floordiv(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    if int_is_zero(&rt.heap, right) {
        return Err(ExcType::zero_division("integer division or modulo by zero"));
    }
    int_binary(
        rt,
        left,
        right,
        |a, b| {
            if a == i64::MIN && b == -1 {
                None
            } else {
                Some(a.div_floor(&b))
            }
        },
        Integer::div_floor,
    )
}

fn int_mod(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    if int_is_zero(&rt.heap, right) {
        return Err(ExcType::zero_division("integer division or modulo by zero"));
    }
    int_binary(
        rt,
        left,
        right,
        |a, b| {
            if a == i64::MIN && b == -1 {
                Some(0)
            } else {
                Some(a.mod_floor(&b))
            }
        },
        Integer::mod_floor,
    )
}

fn int_bitand(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    int_binary(rt, left, right, |a, b| Some(a & b), |a, b| a & b)
}

fn int_bitor(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    int_binary(rt, left, right, |a, b| Some(a | b), |a, b| a | b)
}

fn int_bitxor(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    int_binary(rt, left, right, |a, b| Some(a ^ b), |a, b| a ^ b)
}

/// True when the right operand is an int with value zero; non-ints report
/// false and fall through to the NotImplemented path.
fn int_is_zero(heap: &Heap, v: Value) -> bool {
    match int_repr(heap, v) {
        Some(IntRepr::Small(i)) => i == 0,
        Some(IntRepr::Big(b)) => b.is_zero(),
        None => false,
    }
}

// Reflected kinds invoke with the receiver (the right operand of the source
// expression) first; restoring operand order here keeps one forward
// implementation per operation.
fn int_radd(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_add(rt, other, receiver)
}

fn int_rsub(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_sub(rt, other, receiver)
}

fn int_rmul(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_mul(rt, other, receiver)
}

fn int_rtruediv(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_truediv(rt, other, receiver)
}

fn int_rfloordiv(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_floordiv(rt, other, receiver)
}

fn int_rmod(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_mod(rt, other, receiver)
}

fn int_rbitand(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_bitand(rt, other, receiver)
}

fn int_rbitor(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_bitor(rt, other, receiver)
}

fn int_rbitxor(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    int_bitxor(rt, other, receiver)
}

fn int_neg(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    int_unary(rt, v, "unary -", i64::checked_neg, |b| -b)
}

fn int_pos(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    int_unary(rt, v, "unary +", Some, Clone::clone)
}

fn int_invert(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    int_unary(rt, v, "unary ~", |a| Some(!a), |b| -(b.clone() + BigInt::from(1)))
}

fn int_abs(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    int_unary(rt, v, "abs()", i64::checked_abs, Signed::abs)
}

fn int_bool(rt: &mut Runtime, v: Value) -> RunResult<bool> {
    Ok(!int_is_zero(&rt.heap, v))
}

fn int_repr_slot(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let text = match int_repr(&rt.heap, v) {
        Some(IntRepr::Small(i)) => i.to_string(),
        Some(IntRepr::Big(b)) => b.to_string(),
        None => return Ok(Value::NotImplemented),
    };
    rt.alloc_str(&text)
}

fn int_lt(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    int_compare(rt, a, b, Ordering::is_lt)
}

fn int_le(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    int_compare(rt, a, b, Ordering::is_le)
}

fn int_eq(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    int_compare(rt, a, b, Ordering::is_eq)
}

fn int_ne(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    int_compare(rt, a, b, Ordering::is_ne)
}

fn int_gt(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    int_compare(rt, a, b, Ordering::is_gt)
}

fn int_ge(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    int_compare(rt, a, b, Ordering::is_ge)
}

fn bool_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let Value::Bool(b) = v else {
        return Ok(Value::NotImplemented);
    };
    rt.alloc_str(if b { "True" } else { "False" })
}

/// The int type's literal implementation table.
pub(crate) const INT_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(int_repr_slot)),
    (SlotKind::Bool, SlotValue::Predicate(int_bool)),
    (SlotKind::Neg, SlotValue::Unary(int_neg)),
    (SlotKind::Pos, SlotValue::Unary(int_pos)),
    (SlotKind::Invert, SlotValue::Unary(int_invert)),
    (SlotKind::Abs, SlotValue::Unary(int_abs)),
    (SlotKind::Add, SlotValue::Binary(int_add)),
    (SlotKind::RightAdd, SlotValue::Binary(int_radd)),
    (SlotKind::Sub, SlotValue::Binary(int_sub)),
    (SlotKind::RightSub, SlotValue::Binary(int_rsub)),
    (SlotKind::Mul, SlotValue::Binary(int_mul)),
    (SlotKind::RightMul, SlotValue::Binary(int_rmul)),
    (SlotKind::TrueDiv, SlotValue::Binary(int_truediv)),
    (SlotKind::RightTrueDiv, SlotValue::Binary(int_rtruediv)),
    (SlotKind::FloorDiv, SlotValue::Binary(int_floordiv)),
    (SlotKind::RightFloorDiv, SlotValue::Binary(int_rfloordiv)),
    (SlotKind::Mod, SlotValue::Binary(int_mod)),
    (SlotKind::RightMod, SlotValue::Binary(int_rmod)),
    (SlotKind::And, SlotValue::Binary(int_bitand)),
    (SlotKind::RightAnd, SlotValue::Binary(int_rbitand)),
    (SlotKind::Or, SlotValue::Binary(int_bitor)),
    (SlotKind::RightOr, SlotValue::Binary(int_rbitor)),
    (SlotKind::Xor, SlotValue::Binary(int_bitxor)),
    (SlotKind::RightXor, SlotValue::Binary(int_rbitxor)),
    (SlotKind::Lt, SlotValue::Binary(int_lt)),
    (SlotKind::Le, SlotValue::Binary(int_le)),
    (SlotKind::Eq, SlotValue::Binary(int_eq)),
    (SlotKind::Ne, SlotValue::Binary(int_ne)),
    (SlotKind::Gt, SlotValue::Binary(int_gt)),
    (SlotKind::Ge, SlotValue::Binary(int_ge)),
];

/// bool inherits every int slot; only repr differs.
pub(crate) const BOOL_SLOTS: &[(SlotKind, SlotValue)] = &[(SlotKind::Repr, SlotValue::Unary(bool_repr))];
