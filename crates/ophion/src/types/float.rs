//! The float type.
//!
//! Float slot implementations accept int operands and promote them, which is
//! how `int + float` resolves: the int implementation declines with
//! `NotImplemented` and the dispatcher retries the float side.

use std::cmp::Ordering;

use crate::{
    exception::{ExcType, RunResult},
    heap::Heap,
    runtime::Runtime,
    types::{
        int::{int_repr, int_to_f64},
        slot::{SlotKind, SlotValue},
    },
    value::{Value, float_repr},
};

/// Extracts a float operand, promoting ints. `None` means "not a number
/// this type handles" and the slot declines.
fn as_float(heap: &Heap, v: Value) -> RunResult<Option<f64>> {
    if let Value::Float(f) = v {
        return Ok(Some(f));
    }
    match int_repr(heap, v) {
        Some(repr) => int_to_f64(&repr).map(Some),
        None => Ok(None),
    }
}

fn float_binary(
    rt: &mut Runtime,
    left: Value,
    right: Value,
    op: fn(f64, f64) -> RunResult<f64>,
) -> RunResult<Value> {
    match (as_float(&rt.heap, left)?, as_float(&rt.heap, right)?) {
        (Some(a), Some(b)) => Ok(Value::Float(op(a, b)?)),
        _ => Ok(Value::NotImplemented),
    }
}

fn float_compare(rt: &mut Runtime, left: Value, right: Value, test: fn(Option<Ordering>) -> bool) -> RunResult<Value> {
    match (as_float(&rt.heap, left)?, as_float(&rt.heap, right)?) {
        (Some(a), Some(b)) => Ok(Value::Bool(test(a.partial_cmp(&b)))),
        _ => Ok(Value::NotImplemented),
    }
}

fn float_add(rt: &mut Runtime, l: Value, r: Value) -> RunResult<Value> {
    float_binary(rt, l, r, |a, b| Ok(a + b))
}

fn float_sub(rt: &mut Runtime, l: Value, r: Value) -> RunResult<Value> {
    float_binary(rt, l, r, |a, b| Ok(a - b))
}

fn float_mul(rt: &mut Runtime, l: Value, r: Value) -> RunResult<Value> {
    float_binary(rt, l, r, |a, b| Ok(a * b))
}

fn float_truediv(rt: &mut Runtime, l: Value, r: Value) -> RunResult<Value> {
    float_binary(rt, l, r, |a, b| {
        if b == 0.0 {
            Err(ExcType::zero_division("float division by zero"))
        } else {
            Ok(a / b)
        }
    })
}

fn float_floordiv(rt: &mut Runtime, l: Value, r: Value) -> RunResult<Value> {
    float_binary(rt, l, r, |a, b| {
        if b == 0.0 {
            Err(ExcType::zero_division("float floor division by zero"))
        } else {
            Ok((a / b).floor())
        }
    })
}

fn float_mod(rt: &mut Runtime, l: Value, r: Value) -> RunResult<Value> {
    float_binary(rt, l, r, |a, b| {
        if b == 0.0 {
            Err(ExcType::zero_division("float modulo"))
        } else {
            // Sign follows the divisor, as the emulated language requires.
            let r = a % b;
            Ok(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r })
        }
    })
}

fn float_radd(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    float_add(rt, other, receiver)
}

fn float_rsub(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    float_sub(rt, other, receiver)
}

fn float_rmul(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    float_mul(rt, other, receiver)
}

fn float_rtruediv(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    float_truediv(rt, other, receiver)
}

fn float_rfloordiv(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    float_floordiv(rt, other, receiver)
}

fn float_rmod(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    float_mod(rt, other, receiver)
}

fn float_neg(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    float_unary(rt, v, "unary -", |f| -f)
}

fn float_pos(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    float_unary(rt, v, "unary +", |f| f)
}

fn float_abs(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    float_unary(rt, v, "abs()", f64::abs)
}

fn float_unary(rt: &mut Runtime, v: Value, op_name: &str, op: fn(f64) -> f64) -> RunResult<Value> {
    let Value::Float(f) = v else {
        let type_name = rt.value_type_name(v).to_owned();
        return Err(ExcType::unary_type_error(op_name, &type_name));
    };
    Ok(Value::Float(op(f)))
}

fn float_bool(_rt: &mut Runtime, v: Value) -> RunResult<bool> {
    let Value::Float(f) = v else { return Ok(true) };
    Ok(f != 0.0)
}

fn float_repr_slot(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let Value::Float(f) = v else {
        return Ok(Value::NotImplemented);
    };
    rt.alloc_str(&float_repr(f))
}

fn float_lt(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    float_compare(rt, a, b, |o| o == Some(Ordering::Less))
}

fn float_le(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    float_compare(rt, a, b, |o| matches!(o, Some(Ordering::Less | Ordering::Equal)))
}

fn float_eq(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    float_compare(rt, a, b, |o| o == Some(Ordering::Equal))
}

fn float_ne(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    float_compare(rt, a, b, |o| o != Some(Ordering::Equal))
}

fn float_gt(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    float_compare(rt, a, b, |o| o == Some(Ordering::Greater))
}

fn float_ge(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    float_compare(rt, a, b, |o| matches!(o, Some(Ordering::Greater | Ordering::Equal)))
}

/// The float type's literal implementation table.
pub(crate) const FLOAT_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(float_repr_slot)),
    (SlotKind::Bool, SlotValue::Predicate(float_bool)),
    (SlotKind::Neg, SlotValue::Unary(float_neg)),
    (SlotKind::Pos, SlotValue::Unary(float_pos)),
    (SlotKind::Abs, SlotValue::Unary(float_abs)),
    (SlotKind::Add, SlotValue::Binary(float_add)),
    (SlotKind::RightAdd, SlotValue::Binary(float_radd)),
    (SlotKind::Sub, SlotValue::Binary(float_sub)),
    (SlotKind::RightSub, SlotValue::Binary(float_rsub)),
    (SlotKind::Mul, SlotValue::Binary(float_mul)),
    (SlotKind::RightMul, SlotValue::Binary(float_rmul)),
    (SlotKind::TrueDiv, SlotValue::Binary(float_truediv)),
    (SlotKind::RightTrueDiv, SlotValue::Binary(float_rtruediv)),
    (SlotKind::FloorDiv, SlotValue::Binary(float_floordiv)),
    (SlotKind::RightFloorDiv, SlotValue::Binary(float_rfloordiv)),
    (SlotKind::Mod, SlotValue::Binary(float_mod)),
    (SlotKind::RightMod, SlotValue::Binary(float_rmod)),
    (SlotKind::Lt, SlotValue::Binary(float_lt)),
    (SlotKind::Le, SlotValue::Binary(float_le)),
    (SlotKind::Eq, SlotValue::Binary(float_eq)),
    (SlotKind::Ne, SlotValue::Binary(float_ne)),
    (SlotKind::Gt, SlotValue::Binary(float_gt)),
    (SlotKind::Ge, SlotValue::Binary(float_ge)),
];
