//! Instances of registry types, and the root `object` type's slots.
//!
//! `object` carries the generic attribute protocol every type inherits and
//! the default construction path: calling a type allocates an instance of
//! that type (the constructed type is passed to `new` at call time, so
//! subclasses get subclass instances from the inherited slot).

use indexmap::IndexMap;

use crate::{
    args::CallArgs,
    attr,
    exception::RunResult,
    heap::HeapData,
    intern::StringId,
    runtime::Runtime,
    types::{TypeId, slot::{SlotKind, SlotValue}},
    value::Value,
};

/// An instance of a registry type: its type handle plus ordered own
/// storage.
#[derive(Debug)]
pub(crate) struct Instance {
    pub type_id: TypeId,
    pub storage: IndexMap<StringId, Value>,
}

/// Default allocation: an empty instance of the constructed type.
pub(crate) fn object_new(rt: &mut Runtime, type_id: TypeId, _args: &CallArgs) -> RunResult<Value> {
    let id = rt.heap.allocate(HeapData::Instance(Instance {
        type_id,
        storage: IndexMap::new(),
    }))?;
    Ok(Value::Ref(id))
}

fn object_repr(rt: &mut Runtime, v: Value) -> RunResult<Value> {
    let type_name = rt.value_type_name(v).to_owned();
    rt.alloc_str(&format!("<{type_name} object>"))
}

/// The root type's literal implementation table: the generic attribute
/// protocol, default construction, and a fallback repr.
pub(crate) const OBJECT_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(object_repr)),
    (SlotKind::GetAttr, SlotValue::AttrGet(attr::object_getattr)),
    (SlotKind::SetAttr, SlotValue::AttrSet(attr::object_setattr)),
    (SlotKind::DelAttr, SlotValue::AttrDel(attr::object_delattr)),
    (SlotKind::New, SlotValue::New(object_new)),
];
