//! The tuple type.

use crate::{
    exception::{ExcType, RunResult},
    heap::HeapData,
    runtime::Runtime,
    types::{
        int::{IntRepr, int_repr},
        iter::new_seq_iter,
        seq::{join_reprs, normalize_index, seq_contains, seq_eq},
        slot::{SlotKind, SlotValue},
    },
    value::Value,
};

fn tuple_items(rt: &Runtime, v: Value) -> Option<&[Value]> {
    match v {
        Value::Ref(id) => match rt.heap.get(id) {
            HeapData::Tuple(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

fn tuple_len(rt: &mut Runtime, v: Value) -> RunResult<usize> {
    Ok(tuple_items(rt, v).map_or(0, <[Value]>::len))
}

fn tuple_bool(rt: &mut Runtime, v: Value) -> RunResult<bool> {
    Ok(tuple_items(rt, v).is_some_and(|items| !items.is_empty()))
}

fn tuple_getitem(rt: &mut Runtime, container: Value, key: Value) -> RunResult<Value> {
    let index = match int_repr(&rt.heap, key) {
        Some(IntRepr::Small(i)) => i,
        Some(IntRepr::Big(_)) => return Err(ExcType::index_error("tuple index out of range")),
        None => {
            let key_type = rt.value_type_name(key).to_owned();
            return Err(ExcType::type_error(format!(
                "tuple indices must be integers, not {key_type}"
            )));
        }
    };
    let items = tuple_items(rt, container).unwrap_or(&[]);
    let i = normalize_index(index, items.len(), "tuple")?;
    Ok(items[i])
}

fn tuple_eq(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    if tuple_items(rt, left).is_none() || tuple_items(rt, right).is_none() {
        return Ok(Value::NotImplemented);
    }
    match seq_eq(rt, left, right)? {
        Some(result) => Ok(Value::Bool(result)),
        None => Ok(Value::NotImplemented),
    }
}

fn tuple_ne(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    match tuple_eq(rt, left, right)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

fn tuple_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let Some(items) = tuple_items(rt, v).map(<[Value]>::to_vec) else {
        return Ok(Value::NotImplemented);
    };
    let body = join_reprs(rt, &items)?;
    let text = if items.len() == 1 {
        format!("({body},)")
    } else {
        format!("({body})")
    };
    rt.alloc_str(&text)
}

fn tuple_iter(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    new_seq_iter(rt, v)
}

/// The tuple type's literal implementation table.
pub(crate) const TUPLE_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(tuple_repr)),
    (SlotKind::Bool, SlotValue::Predicate(tuple_bool)),
    (SlotKind::Len, SlotValue::Len(tuple_len)),
    (SlotKind::GetItem, SlotValue::Binary(tuple_getitem)),
    (SlotKind::Contains, SlotValue::Contains(seq_contains)),
    (SlotKind::Iter, SlotValue::Unary(tuple_iter)),
    (SlotKind::Eq, SlotValue::Binary(tuple_eq)),
    (SlotKind::Ne, SlotValue::Binary(tuple_ne)),
];
