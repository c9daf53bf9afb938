//! Type objects, the type registry, and the builtin type catalog.
//!
//! Types live in an arena ([`TypeRegistry`]) and are referenced through
//! stable [`TypeId`] handles; the parent-to-subclass direction is never an
//! owning reference (a subclass owns a handle to its base, not vice versa).
//! Each builtin type module declares a literal table mapping slot kinds to
//! implementations; the tables are installed and shape-validated when the
//! registry bootstraps, so there is no reflective discovery anywhere.

pub(crate) mod descr;
pub(crate) mod dict;
pub(crate) mod float;
pub(crate) mod instance;
pub(crate) mod int;
pub(crate) mod iter;
pub(crate) mod list;
pub(crate) mod seq;
pub(crate) mod str;
pub mod slot;
pub(crate) mod tuple;

use indexmap::IndexMap;

use crate::{
    exception::{RunError, RunResult},
    intern::{Interns, StringId},
    value::Value,
};

pub use descr::{DeleterFn, GetterFn, SetterFn};
pub use slot::{SlotKind, SlotShape, SlotTable, SlotValue};

/// Handle to a type in the registry. Stable for the runtime's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

// Builtin type handles, fixed by bootstrap registration order.
pub const OBJECT: TypeId = TypeId(0);
pub const TYPE: TypeId = TypeId(1);
pub const NONE_TYPE: TypeId = TypeId(2);
pub const NOT_IMPLEMENTED_TYPE: TypeId = TypeId(3);
pub const INT: TypeId = TypeId(4);
pub const BOOL: TypeId = TypeId(5);
pub const FLOAT: TypeId = TypeId(6);
pub const STR: TypeId = TypeId(7);
pub const TUPLE: TypeId = TypeId(8);
pub const LIST: TypeId = TypeId(9);
pub const DICT: TypeId = TypeId(10);
pub const FUNCTION: TypeId = TypeId(11);
pub const BOUND_METHOD: TypeId = TypeId(12);
pub const BUILTIN_FUNCTION: TypeId = TypeId(13);
pub const GETSET: TypeId = TypeId(14);
pub const CELL: TypeId = TypeId(15);
pub const SEQ_ITER: TypeId = TypeId(16);
pub const CODE: TypeId = TypeId(17);

/// Behavior flags on a type.
#[derive(Debug, Clone, Copy)]
pub struct TypeFlags {
    /// Whether the type may be used as a base for further subclassing.
    pub basetype: bool,
}

/// A type object: identity, ancestry, dispatch table, namespace.
#[derive(Debug)]
pub(crate) struct TypeObject {
    pub name: StringId,
    pub base: Option<TypeId>,
    /// Ancestor chain, self first. Subtype tests scan this list.
    pub mro: Vec<TypeId>,
    /// The complete dispatch table: every kind present, possibly empty.
    pub slots: SlotTable,
    /// Named attributes: descriptors and plain values.
    pub namespace: IndexMap<StringId, Value>,
    pub flags: TypeFlags,
}

/// Declarative description of a new type.
///
/// The slot list is the type's own implementation set; entries not named
/// here are inherited from the base type. Registration validates every
/// entry's shape against its kind.
#[derive(Debug)]
pub struct TypeSpec {
    name: String,
    base: TypeId,
    basetype: bool,
    slots: Vec<(SlotKind, SlotValue)>,
}

impl TypeSpec {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            base: OBJECT,
            basetype: true,
            slots: Vec::new(),
        }
    }

    /// Sets the base type (single inheritance).
    #[must_use]
    pub fn base(mut self, base: TypeId) -> Self {
        self.base = base;
        self
    }

    /// Marks the type as not subclassable.
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.basetype = false;
        self
    }

    /// Adds an operation to the type's own implementation set.
    #[must_use]
    pub fn slot(mut self, kind: SlotKind, value: SlotValue) -> Self {
        self.slots.push((kind, value));
        self
    }
}

/// Arena of type objects.
#[derive(Debug)]
pub(crate) struct TypeRegistry {
    types: Vec<TypeObject>,
}

impl TypeRegistry {
    /// Builds the registry with the builtin type catalog installed.
    ///
    /// Registration order is fixed so the `TypeId` constants above stay
    /// valid; each module's literal slot table is shape-validated here, at
    /// startup, and a mismatch aborts construction.
    pub fn bootstrap(interns: &mut Interns) -> Self {
        let mut registry = Self { types: Vec::new() };

        let catalog: &[(&str, Option<TypeId>, bool, &[(SlotKind, SlotValue)], TypeId)] = &[
            ("object", None, true, instance::OBJECT_SLOTS, OBJECT),
            ("type", Some(OBJECT), false, &[(SlotKind::Repr, SlotValue::Unary(type_repr))], TYPE),
            ("NoneType", Some(OBJECT), false, NONE_SLOTS, NONE_TYPE),
            (
                "NotImplementedType",
                Some(OBJECT),
                false,
                &[(SlotKind::Repr, SlotValue::Unary(not_implemented_repr))],
                NOT_IMPLEMENTED_TYPE,
            ),
            ("int", Some(OBJECT), true, int::INT_SLOTS, INT),
            ("bool", Some(INT), false, int::BOOL_SLOTS, BOOL),
            ("float", Some(OBJECT), true, float::FLOAT_SLOTS, FLOAT),
            ("str", Some(OBJECT), true, str::STR_SLOTS, STR),
            ("tuple", Some(OBJECT), true, tuple::TUPLE_SLOTS, TUPLE),
            ("list", Some(OBJECT), true, list::LIST_SLOTS, LIST),
            ("dict", Some(OBJECT), true, dict::DICT_SLOTS, DICT),
            ("function", Some(OBJECT), false, descr::FUNCTION_SLOTS, FUNCTION),
            ("method", Some(OBJECT), false, descr::BOUND_METHOD_SLOTS, BOUND_METHOD),
            (
                "builtin_function_or_method",
                Some(OBJECT),
                false,
                descr::BUILTIN_FUNCTION_SLOTS,
                BUILTIN_FUNCTION,
            ),
            ("getset_descriptor", Some(OBJECT), false, descr::GETSET_SLOTS, GETSET),
            ("cell", Some(OBJECT), false, &[], CELL),
            ("sequence_iterator", Some(OBJECT), false, iter::SEQ_ITER_SLOTS, SEQ_ITER),
            ("code", Some(OBJECT), false, &[], CODE),
        ];

        for &(name, base, basetype, slots, expected) in catalog {
            let spec_slots = slots.to_vec();
            let id = registry
                .register(
                    TypeSpec {
                        name: name.to_owned(),
                        base: base.unwrap_or(OBJECT),
                        basetype,
                        slots: spec_slots,
                    },
                    base.is_none(),
                    interns,
                )
                .expect("builtin slot tables are validated at startup");
            assert_eq!(id, expected, "builtin type registration order drifted");
        }

        registry
    }

    /// Registers a type: inherit the base's full slot table, then overwrite
    /// entries from the type's own implementation set.
    pub fn register(&mut self, spec: TypeSpec, is_root: bool, interns: &mut Interns) -> RunResult<TypeId> {
        let (base, mut slots, mut mro) = if is_root {
            (None, SlotTable::empty(), Vec::new())
        } else {
            let base_obj = self.get(spec.base);
            if !base_obj.flags.basetype {
                return Err(crate::exception::ExcType::type_error(format!(
                    "type '{}' is not an acceptable base type",
                    interns.get_str(base_obj.name)
                )));
            }
            (Some(spec.base), base_obj.slots.clone(), base_obj.mro.clone())
        };

        for &(kind, value) in &spec.slots {
            slots.set(kind, value)?;
        }

        let id = TypeId(u32::try_from(self.types.len()).expect("type registry exceeds u32 capacity"));
        mro.insert(0, id);
        let name = interns.intern(&spec.name);
        self.types.push(TypeObject {
            name,
            base,
            mro,
            slots,
            namespace: IndexMap::new(),
            flags: TypeFlags {
                basetype: spec.basetype,
            },
        });
        Ok(id)
    }

    #[inline]
    pub fn get(&self, id: TypeId) -> &TypeObject {
        &self.types[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: TypeId) -> &mut TypeObject {
        &mut self.types[id.index()]
    }

    /// Subtype test by ancestor-chain scan. Every type is a subtype of
    /// itself.
    #[must_use]
    pub fn is_subtype(&self, a: TypeId, b: TypeId) -> bool {
        self.get(a).mro.contains(&b)
    }

    /// Looks `name` up through the type's ancestor chain, nearest first.
    pub fn lookup(&self, type_id: TypeId, name: StringId) -> Option<Value> {
        for &ancestor in &self.get(type_id).mro {
            if let Some(&value) = self.get(ancestor).namespace.get(&name) {
                return Some(value);
            }
        }
        None
    }

    /// Reassigns one slot entry after construction, with the same shape
    /// validation as registration.
    pub fn set_slot(&mut self, type_id: TypeId, kind: SlotKind, value: SlotValue) -> RunResult<()> {
        self.get_mut(type_id).slots.set(kind, value)
    }
}

const NONE_SLOTS: &[(SlotKind, SlotValue)] = &[
    (SlotKind::Repr, SlotValue::Unary(none_repr)),
    (SlotKind::Bool, SlotValue::Predicate(none_bool)),
];

fn none_repr(rt: &mut crate::runtime::Runtime, _v: Value) -> RunResult<Value> {
    rt.alloc_str("None")
}

fn none_bool(_rt: &mut crate::runtime::Runtime, _v: Value) -> RunResult<bool> {
    Ok(false)
}

fn not_implemented_repr(rt: &mut crate::runtime::Runtime, _v: Value) -> RunResult<Value> {
    rt.alloc_str("NotImplemented")
}

fn type_repr(rt: &mut crate::runtime::Runtime, v: Value) -> RunResult<Value> {
    let Value::Type(id) = v else {
        return Err(RunError::internal("type repr applied to non-type value"));
    };
    let name = rt.type_name(id).to_owned();
    rt.alloc_str(&format!("<class '{name}'>"))
}
