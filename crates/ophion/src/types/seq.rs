//! Helpers shared by the sequence types (tuple, list).

use crate::{
    dispatch,
    exception::{ExcType, RunResult},
    heap::{Heap, HeapData},
    runtime::Runtime,
    value::Value,
};

/// Returns the element slice of a tuple or list value.
pub(crate) fn seq_elements<'a>(heap: &'a Heap, v: Value) -> Option<&'a [Value]> {
    match v {
        Value::Ref(id) => match heap.get(id) {
            HeapData::Tuple(items) | HeapData::List(items) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

/// Converts a subscript to a vector index, supporting negative indexing.
pub(crate) fn normalize_index(index: i64, len: usize, type_name: &str) -> RunResult<usize> {
    let len_i = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if index < 0 { index + len_i } else { index };
    if adjusted < 0 || adjusted >= len_i {
        return Err(ExcType::index_error(format!("{type_name} index out of range")));
    }
    Ok(usize::try_from(adjusted).expect("non-negative index fits usize"))
}

/// Element-wise equality of two sequences of the same kind.
///
/// Copies the element handles out first so per-element dispatch can borrow
/// the runtime mutably.
pub(crate) fn seq_eq(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Option<bool>> {
    let (a, b) = match (seq_elements(&rt.heap, left), seq_elements(&rt.heap, right)) {
        (Some(a), Some(b)) => (a.to_vec(), b.to_vec()),
        _ => return Ok(None),
    };
    if a.len() != b.len() {
        return Ok(Some(false));
    }
    for (x, y) in a.iter().zip(&b) {
        if !dispatch::value_eq(rt, *x, *y)? {
            return Ok(Some(false));
        }
    }
    Ok(Some(true))
}

/// Membership scan by element equality.
pub(crate) fn seq_contains(rt: &mut Runtime, container: Value, item: Value) -> RunResult<bool> {
    let Some(items) = seq_elements(&rt.heap, container).map(<[Value]>::to_vec) else {
        let type_name = rt.value_type_name(container).to_owned();
        return Err(ExcType::type_error(format!(
            "argument of type '{type_name}' is not iterable"
        )));
    };
    for element in items {
        if dispatch::value_eq(rt, element, item)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Renders a sequence's elements joined by ", ", without the brackets.
pub(crate) fn join_reprs(rt: &mut Runtime, items: &[Value]) -> RunResult<String> {
    let mut out = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&rt.repr_str(*item)?);
    }
    Ok(out)
}
