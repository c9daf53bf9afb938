//! Descriptor carriers: get/set descriptors and callable binding.
//!
//! Whether a namespace entry is a descriptor is a property of the entry's
//! *type*: an entry whose type defines `descr_set` or `descr_delete` is a
//! data descriptor and overrides instance storage; one with only
//! `descr_get` is non-data and is shadowed by it. `GetSet` is the data
//! descriptor carrier; functions and builtin functions are non-data and
//! bind to a method object on access.

use crate::{
    exception::{ExcType, RunError, RunResult},
    heap::{BoundMethod, HeapData},
    intern::StringId,
    runtime::Runtime,
    types::{TypeId, slot::{SlotKind, SlotValue}},
    value::Value,
};

/// Native getter: `f(receiver)`.
pub type GetterFn = fn(&mut Runtime, Value) -> RunResult<Value>;
/// Native setter: `f(receiver, value)`.
pub type SetterFn = fn(&mut Runtime, Value, Value) -> RunResult<()>;
/// Native deleter: `f(receiver)`.
pub type DeleterFn = fn(&mut Runtime, Value) -> RunResult<()>;

/// A data descriptor with a native getter and optional setter/deleter.
///
/// The capability subset {get, set, delete} is per instance; the type-level
/// slots are always present and raise for capabilities the instance lacks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GetSet {
    pub name: StringId,
    pub getter: GetterFn,
    pub setter: Option<SetterFn>,
    pub deleter: Option<DeleterFn>,
}

fn getset_data(rt: &Runtime, descr: Value) -> RunResult<GetSet> {
    if let Value::Ref(id) = descr
        && let HeapData::GetSet(getset) = rt.heap.get(id)
    {
        return Ok(*getset);
    }
    Err(RunError::internal("getset slot applied to non-getset value"))
}

fn getset_descr_get(rt: &mut Runtime, descr: Value, obj: Value, _obj_type: TypeId) -> RunResult<Value> {
    let getset = getset_data(rt, descr)?;
    (getset.getter)(rt, obj)
}

fn getset_descr_set(rt: &mut Runtime, descr: Value, obj: Value, value: Value) -> RunResult<()> {
    let getset = getset_data(rt, descr)?;
    match getset.setter {
        Some(setter) => setter(rt, obj, value),
        None => {
            let name = rt.interns.get_str(getset.name).to_owned();
            let type_name = rt.value_type_name(obj).to_owned();
            Err(ExcType::type_error(format!(
                "attribute '{name}' of '{type_name}' objects is not writable"
            )))
        }
    }
}

fn getset_descr_delete(rt: &mut Runtime, descr: Value, obj: Value) -> RunResult<()> {
    let getset = getset_data(rt, descr)?;
    match getset.deleter {
        Some(deleter) => deleter(rt, obj),
        None => {
            let name = rt.interns.get_str(getset.name).to_owned();
            let type_name = rt.value_type_name(obj).to_owned();
            Err(ExcType::type_error(format!(
                "cannot delete attribute '{name}' of '{type_name}' objects"
            )))
        }
    }
}

fn getset_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let getset = getset_data(rt, v)?;
    let name = rt.interns.get_str(getset.name).to_owned();
    rt.alloc_str(&format!("<attribute '{name}'>"))
}

/// Binds a callable looked up on a type to the instance it was reached
/// through. Shared by the function and builtin-function descriptor slots.
fn bind_callable(rt: &mut Runtime, callable: Value, receiver: Value) -> RunResult<Value> {
    let id = rt.heap.allocate(HeapData::BoundMethod(BoundMethod { callable, receiver }))?;
    Ok(Value::Ref(id))
}

fn function_descr_get(rt: &mut Runtime, descr: Value, obj: Value, _obj_type: TypeId) -> RunResult<Value> {
    bind_callable(rt, descr, obj)
}

fn function_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let name = match v {
        Value::Ref(id) => match rt.heap.get(id) {
            HeapData::Function(f) => rt.interns.get_str(f.qualname).to_owned(),
            _ => return Ok(Value::NotImplemented),
        },
        _ => return Ok(Value::NotImplemented),
    };
    rt.alloc_str(&format!("<function {name}>"))
}

fn bound_method_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let callable = match v {
        Value::Ref(id) => match rt.heap.get(id) {
            HeapData::BoundMethod(m) => m.callable,
            _ => return Ok(Value::NotImplemented),
        },
        _ => return Ok(Value::NotImplemented),
    };
    let inner = rt.repr_str(callable)?;
    rt.alloc_str(&format!("<bound method of {inner}>"))
}

fn builtin_function_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let Value::Builtin(f) = v else {
        return Ok(Value::NotImplemented);
    };
    rt.alloc_str(&format!("<built-in function {f}>"))
}

/// Slot tables for the descriptor-bearing builtin types.
pub(crate) const GETSET_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(getset_repr)),
    (SlotKind::DescrGet, SlotValue::DescrGet(getset_descr_get)),
    (SlotKind::DescrSet, SlotValue::DescrSet(getset_descr_set)),
    (SlotKind::DescrDelete, SlotValue::DescrDel(getset_descr_delete)),
];

pub(crate) const FUNCTION_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(function_repr)),
    (SlotKind::DescrGet, SlotValue::DescrGet(function_descr_get)),
];

pub(crate) const BOUND_METHOD_SLOTS: &[(SlotKind, SlotValue)] =
    &[(SlotKind::Repr, SlotValue::Unary(bound_method_repr))];

pub(crate) const BUILTIN_FUNCTION_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(builtin_function_repr)),
    (SlotKind::DescrGet, SlotValue::DescrGet(function_descr_get)),
];
