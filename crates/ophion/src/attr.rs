//! The attribute protocol: descriptor-aware get/set/delete.
//!
//! Lookup order for reads: a data descriptor found on the type's ancestor
//! chain wins; then the instance's own storage; then a non-data descriptor
//! or plain type-level value; then AttributeError. Writes require a data
//! descriptor with the set capability, falling back to instance storage.
//!
//! `load_method` is the optimization path for method calls: when the name
//! resolves to a plain function-shaped non-data descriptor it returns the
//! (callable, receiver) pair instead of allocating a transient bound
//! method. Its results must be indistinguishable from the plain path, which
//! the test suite checks.

use crate::{
    exception::{ExcType, RunError, RunResult},
    heap::HeapData,
    intern::StringId,
    runtime::Runtime,
    types::{TypeId, slot::{SlotKind, SlotValue}},
    value::Value,
};

/// Reads an attribute, dispatching through the type's getattr slot.
pub(crate) fn get_attr(rt: &mut Runtime, obj: Value, name: StringId) -> RunResult<Value> {
    let type_id = rt.type_of(obj);
    match rt.slot_of(type_id, SlotKind::GetAttr) {
        SlotValue::AttrGet(f) => f(rt, obj, name),
        SlotValue::Empty => Err(no_attr_error(rt, obj, name)),
        _ => Err(RunError::internal("getattr dispatch through a non-attr slot entry")),
    }
}

/// Writes an attribute, dispatching through the type's setattr slot.
pub(crate) fn set_attr(rt: &mut Runtime, obj: Value, name: StringId, value: Value) -> RunResult<()> {
    let type_id = rt.type_of(obj);
    match rt.slot_of(type_id, SlotKind::SetAttr) {
        SlotValue::AttrSet(f) => f(rt, obj, name, value),
        SlotValue::Empty => {
            let type_name = rt.type_name(type_id).to_owned();
            Err(ExcType::type_error(format!(
                "'{type_name}' object does not support attribute assignment"
            )))
        }
        _ => Err(RunError::internal("setattr dispatch through a non-attr slot entry")),
    }
}

/// Deletes an attribute, dispatching through the type's delattr slot.
pub(crate) fn del_attr(rt: &mut Runtime, obj: Value, name: StringId) -> RunResult<()> {
    let type_id = rt.type_of(obj);
    match rt.slot_of(type_id, SlotKind::DelAttr) {
        SlotValue::AttrDel(f) => f(rt, obj, name),
        SlotValue::Empty => {
            let type_name = rt.type_name(type_id).to_owned();
            Err(ExcType::type_error(format!(
                "'{type_name}' object does not support attribute deletion"
            )))
        }
        _ => Err(RunError::internal("delattr dispatch through a non-attr slot entry")),
    }
}

fn no_attr_error(rt: &Runtime, obj: Value, name: StringId) -> RunError {
    let type_name = rt.value_type_name(obj).to_owned();
    ExcType::no_attribute(&type_name, rt.interns.get_str(name))
}

/// True when entries of this type override same-named instance storage.
fn is_data_descriptor(rt: &Runtime, descr_type: TypeId) -> bool {
    !rt.slot_of(descr_type, SlotKind::DescrSet).is_empty()
        || !rt.slot_of(descr_type, SlotKind::DescrDelete).is_empty()
}

/// Reads from the instance's own storage, when the value has any.
fn instance_storage_get(rt: &Runtime, obj: Value, name: StringId) -> Option<Value> {
    if let Value::Ref(id) = obj
        && let HeapData::Instance(instance) = rt.heap.get(id)
    {
        return instance.storage.get(&name).copied();
    }
    None
}

/// The generic attribute read installed on `object` and inherited by every
/// type that does not override it.
pub(crate) fn object_getattr(rt: &mut Runtime, obj: Value, name: StringId) -> RunResult<Value> {
    let obj_type = rt.type_of(obj);

    // Look up the name along the type's ancestor chain.
    let type_attr = rt.types.lookup(obj_type, name);
    let mut descr_get = SlotValue::Empty;
    if let Some(attr) = type_attr {
        let attr_type = rt.type_of(attr);
        let get = rt.slot_of(attr_type, SlotKind::DescrGet);
        if !get.is_empty() {
            if is_data_descriptor(rt, attr_type) {
                return call_descr_get(rt, get, attr, obj, obj_type);
            }
            descr_get = get;
        }
    }

    // The instance's own storage shadows non-data descriptors.
    if let Some(value) = instance_storage_get(rt, obj, name) {
        return Ok(value);
    }

    // A non-data descriptor binds; a plain type-level value returns as-is.
    if let Some(attr) = type_attr {
        if !descr_get.is_empty() {
            return call_descr_get(rt, descr_get, attr, obj, obj_type);
        }
        return Ok(attr);
    }

    Err(no_attr_error(rt, obj, name))
}

fn call_descr_get(rt: &mut Runtime, slot: SlotValue, descr: Value, obj: Value, obj_type: TypeId) -> RunResult<Value> {
    match slot {
        SlotValue::DescrGet(f) => f(rt, descr, obj, obj_type),
        _ => Err(RunError::internal("descriptor get through a non-descriptor slot entry")),
    }
}

/// The generic attribute write installed on `object`.
///
/// A data descriptor adjudicates the write even when it has no setter (the
/// descriptor raises); only a non-descriptor resolution falls through to
/// instance storage.
pub(crate) fn object_setattr(rt: &mut Runtime, obj: Value, name: StringId, value: Value) -> RunResult<()> {
    let obj_type = rt.type_of(obj);

    if let Some(attr) = rt.types.lookup(obj_type, name) {
        let attr_type = rt.type_of(attr);
        if is_data_descriptor(rt, attr_type) {
            return match rt.slot_of(attr_type, SlotKind::DescrSet) {
                SlotValue::DescrSet(f) => f(rt, attr, obj, value),
                SlotValue::Empty => {
                    // Delete-only descriptor: the attribute exists read-only.
                    let type_name = rt.value_type_name(obj).to_owned();
                    Err(ExcType::type_error(format!(
                        "attribute '{}' of '{type_name}' objects is not writable",
                        rt.interns.get_str(name)
                    )))
                }
                _ => Err(RunError::internal("descriptor set through a non-descriptor slot entry")),
            };
        }
    }

    if let Value::Ref(id) = obj
        && let HeapData::Instance(instance) = rt.heap.get_mut(id)
    {
        instance.storage.insert(name, value);
        return Ok(());
    }

    // No instance storage and no descriptor: the attribute cannot exist.
    Err(no_attr_error(rt, obj, name))
}

/// The generic attribute deletion installed on `object`.
pub(crate) fn object_delattr(rt: &mut Runtime, obj: Value, name: StringId) -> RunResult<()> {
    let obj_type = rt.type_of(obj);

    if let Some(attr) = rt.types.lookup(obj_type, name) {
        let attr_type = rt.type_of(attr);
        if is_data_descriptor(rt, attr_type) {
            return match rt.slot_of(attr_type, SlotKind::DescrDelete) {
                SlotValue::DescrDel(f) => f(rt, attr, obj),
                SlotValue::Empty => {
                    let type_name = rt.value_type_name(obj).to_owned();
                    Err(ExcType::type_error(format!(
                        "cannot delete attribute '{}' of '{type_name}' objects",
                        rt.interns.get_str(name)
                    )))
                }
                _ => Err(RunError::internal("descriptor delete through a non-descriptor slot entry")),
            };
        }
    }

    if let Value::Ref(id) = obj
        && let HeapData::Instance(instance) = rt.heap.get_mut(id)
    {
        if instance.storage.shift_remove(&name).is_some() {
            return Ok(());
        }
    }

    Err(no_attr_error(rt, obj, name))
}

/// Method-pair lookup for the LoadMethod/CallMethod opcodes.
///
/// Returns `(callable, Some(receiver))` when binding can be bypassed, or
/// `(value, None)` when the normal attribute path already produced the
/// final value.
pub(crate) fn load_method(rt: &mut Runtime, obj: Value, name: StringId) -> RunResult<(Value, Option<Value>)> {
    let obj_type = rt.type_of(obj);

    // A type that overrides getattr opts out of the bypass.
    if rt.slot_of(obj_type, SlotKind::GetAttr) != SlotValue::AttrGet(object_getattr) {
        return Ok((get_attr(rt, obj, name)?, None));
    }

    let type_attr = rt.types.lookup(obj_type, name);
    let mut descr_get = SlotValue::Empty;
    let mut method_found = false;
    if let Some(attr) = type_attr {
        let attr_type = rt.type_of(attr);
        let get = rt.slot_of(attr_type, SlotKind::DescrGet);
        if !get.is_empty() {
            if is_method_shaped(rt, attr) {
                // Found a method; the instance storage may still shadow it.
                method_found = true;
            } else if is_data_descriptor(rt, attr_type) {
                return Ok((call_descr_get(rt, get, attr, obj, obj_type)?, None));
            }
            descr_get = get;
        }
    }

    if let Some(value) = instance_storage_get(rt, obj, name) {
        return Ok((value, None));
    }

    if let Some(attr) = type_attr {
        if method_found {
            return Ok((attr, Some(obj)));
        }
        if !descr_get.is_empty() {
            return Ok((call_descr_get(rt, descr_get, attr, obj, obj_type)?, None));
        }
        return Ok((attr, None));
    }

    Err(no_attr_error(rt, obj, name))
}

/// True for plain function-shaped non-data descriptors: the callables whose
/// binding step `load_method` may skip.
fn is_method_shaped(rt: &Runtime, attr: Value) -> bool {
    match attr {
        Value::Builtin(_) => true,
        Value::Ref(id) => matches!(rt.heap.get(id), HeapData::Function(_)),
        _ => false,
    }
}
