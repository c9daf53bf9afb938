//! The str type.
//!
//! Strings have two representations mirroring the int pair: interned
//! (`Value::InternString`, identifiers and literals) and arena-allocated
//! (computed results). Slot implementations read both through
//! [`str_content`] and never distinguish them observably.

use std::cmp::Ordering;
use std::fmt::Write;

use crate::{
    heap::{Heap, HeapData},
    exception::RunResult,
    intern::Interns,
    runtime::Runtime,
    types::slot::{SlotKind, SlotValue},
    value::Value,
};

/// Returns the text of a string value, or `None` for non-strings.
pub(crate) fn str_content<'a>(heap: &'a Heap, interns: &'a Interns, v: Value) -> Option<&'a str> {
    match v {
        Value::InternString(id) => Some(interns.get_str(id)),
        Value::Ref(id) => match heap.get(id) {
            HeapData::Str(s) => Some(s),
            _ => None,
        },
        _ => None,
    }
}

/// Renders a string the way the emulated language's repr does: single
/// quotes, switching to double quotes when the text contains a single quote
/// but no double quote.
pub(crate) fn str_repr_fmt(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                let _ = write!(out, "\\{c}");
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

fn str_compare(rt: &mut Runtime, left: Value, right: Value, test: fn(Ordering) -> bool) -> RunResult<Value> {
    match (
        str_content(&rt.heap, &rt.interns, left),
        str_content(&rt.heap, &rt.interns, right),
    ) {
        (Some(a), Some(b)) => Ok(Value::Bool(test(a.cmp(b)))),
        _ => Ok(Value::NotImplemented),
    }
}

fn str_add(rt: &mut Runtime, left: Value, right: Value) -> RunResult<Value> {
    let joined = match (
        str_content(&rt.heap, &rt.interns, left),
        str_content(&rt.heap, &rt.interns, right),
    ) {
        (Some(a), Some(b)) => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(a);
            s.push_str(b);
            s
        }
        _ => return Ok(Value::NotImplemented),
    };
    rt.alloc_str(&joined)
}

fn str_len(rt: &mut Runtime, v: Value) -> RunResult<usize> {
    // Character count, not byte count, to match the emulated semantics.
    match str_content(&rt.heap, &rt.interns, v) {
        Some(s) => Ok(s.chars().count()),
        None => Ok(0),
    }
}

fn str_bool(rt: &mut Runtime, v: Value) -> RunResult<bool> {
    Ok(str_content(&rt.heap, &rt.interns, v).is_some_and(|s| !s.is_empty()))
}

fn str_contains(rt: &mut Runtime, container: Value, item: Value) -> RunResult<bool> {
    match (
        str_content(&rt.heap, &rt.interns, container),
        str_content(&rt.heap, &rt.interns, item),
    ) {
        (Some(haystack), Some(needle)) => Ok(haystack.contains(needle)),
        _ => Err(crate::exception::ExcType::type_error(
            "'in <string>' requires string as left operand",
        )),
    }
}

fn str_repr_slot(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let Some(text) = str_content(&rt.heap, &rt.interns, v) else {
        return Ok(Value::NotImplemented);
    };
    let repr = str_repr_fmt(text);
    rt.alloc_str(&repr)
}

fn str_lt(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    str_compare(rt, a, b, Ordering::is_lt)
}

fn str_le(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    str_compare(rt, a, b, Ordering::is_le)
}

fn str_eq(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    str_compare(rt, a, b, Ordering::is_eq)
}

fn str_ne(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    str_compare(rt, a, b, Ordering::is_ne)
}

fn str_gt(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    str_compare(rt, a, b, Ordering::is_gt)
}

fn str_ge(rt: &mut Runtime, a: Value, b: Value) -> RunResult<Value> {
    str_compare(rt, a, b, Ordering::is_ge)
}

/// The str type's literal implementation table.
pub(crate) const STR_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(str_repr_slot)),
    (SlotKind::Bool, SlotValue::Predicate(str_bool)),
    (SlotKind::Len, SlotValue::Len(str_len)),
    (SlotKind::Add, SlotValue::Binary(str_add)),
    (SlotKind::Contains, SlotValue::Contains(str_contains)),
    (SlotKind::Lt, SlotValue::Binary(str_lt)),
    (SlotKind::Le, SlotValue::Binary(str_le)),
    (SlotKind::Eq, SlotValue::Binary(str_eq)),
    (SlotKind::Ne, SlotValue::Binary(str_ne)),
    (SlotKind::Gt, SlotValue::Binary(str_gt)),
    (SlotKind::Ge, SlotValue::Binary(str_ge)),
];
