//! The list type.

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

fn list_items(rt: &Runtime, v: Value) -> Option<&[Value]> {
    match v {
        Value::Ref(id) => match rt.heap.get(id) {
            HeapData::List(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Extracts an index for subscript operations.
fn list_index(rt: &Runtime, key: Value, len: usize) -> RunResult<usize> {
    let index = match int_repr(&rt.heap, key) {
        Some(IntRepr::Small(i)) => i,
        Some(IntRepr::Big(_)) => return Err(ExcType::index_error("list index out of range")),
        None => {
            let key_type = rt.value_type_name(key).to_owned();
            return Err(ExcType::type_error(format!(
                "list indices must be integers, not {key_type}"
            )));
        }
    };
    normalize_index(index, len, "list")
}

fn list_len(rt: &mut Runtime, v: Value) -> RunResult<usize> {
    Ok(list_items(rt, v).map_or(0, <[Value]>::len))
}

fn list_bool(rt: &mut Runtime, v: Value) -> RunResult<bool> {
    Ok(list_items(rt, v).is_some_and(|items| !items.is_empty()))
}

fn list_getitem(rt: &mut Runtime, container: Value, key: Value) -> RunResult<Value> {
    let items = list_items(rt, container).unwrap_or(&[]);
    let len = items.len();
    let i = list_index(rt, key, len)?;
    let items = list_items(rt, container).unwrap_or(&[]);
    Ok(items[i])
}

fn list_setitem(rt: &mut Runtime, container: Value, key: Value, value: Value) -> RunResult<()> {
    let len = list_items(rt, container).map_or(0, <[Value]>::len);
    let i = list_index(rt, key, len)?;
    if let Value::Ref(id) = container
        && let HeapData::List(items) = rt.heap.get_mut(id)
    {
        items[i] = value;
    }
    Ok(())
}

fn list_delitem(rt: &mut Runtime, container: Value, key: Value) -> RunResult<()> {
    let len = list_items(rt, container).map_or(0, <[Value]>::len);
    let i = list_index(rt, key, len)?;
    if let Value::Ref(id) = container
        && let HeapData::List(items) = rt.heap.get_mut(id)
    {
        items.remove(i);
    }
    Ok(())
}

fn list_eq(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    if list_items(rt, left).is_none() || list_items(rt, right).is_none() {
        return Ok(Value::NotImplemented);
    }
    match seq_eq(rt, left, right)? {
        Some(result) => Ok(Value::Bool(result)),
        None => Ok(Value::NotImplemented),
    }
}

fn list_ne(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    match list_eq(rt, left, right)? {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Ok(other),
    }
}

fn list_add(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    let joined = match (list_items(rt, left), list_items(rt, right)) {
        (Some(a), Some(b)) => {
            let mut items = Vec::with_capacity(a.len() + b.len());
            items.extend_from_slice(a);
            items.extend_from_slice(b);
            items
        }
        _ => return Ok(Value::NotImplemented),
    };
    rt.alloc_list(joined)
}

fn list_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let Some(items) = list_items(rt, v).map(<[Value]>::to_vec) else {
        return Ok(Value::NotImplemented);
    };
    let body = join_reprs(rt, &items)?;
    rt.alloc_str(&format!("[{body}]"))
}

fn list_iter(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    new_seq_iter(rt, v)
}

/// The list type's literal implementation table.
pub(crate) const LIST_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(list_repr)),
    (SlotKind::Bool, SlotValue::Predicate(list_bool)),
    (SlotKind::Len, SlotValue::Len(list_len)),
    (SlotKind::GetItem, SlotValue::Binary(list_getitem)),
    (SlotKind::SetItem, SlotValue::SetItem(list_setitem)),
    (SlotKind::DelItem, SlotValue::DelItem(list_delitem)),
    (SlotKind::Contains, SlotValue::Contains(seq_contains)),
    (SlotKind::Iter, SlotValue::Unary(list_iter)),
    (SlotKind::Add, SlotValue::Binary(list_add)),
    (SlotKind::Eq, SlotValue::Binary(list_eq)),
    (SlotKind::Ne, SlotValue::Binary(list_ne)),
];
