//! The builtins surface: the third tier of name lookup.
//!
//! The core only requires that this namespace exist and support
//! lookup-by-name; the handful of native functions here is the minimal set
//! needed to validate dispatch through builtin calls.

use ahash::AHashMap;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    args::CallArgs,
    dispatch,
    exception::RunResult,
    intern::{Interns, StringId},
    runtime::Runtime,
    types::slot::{SlotKind, SlotValue},
    value::Value,
};

/// Native builtin functions, dispatched without heap allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum BuiltinFunction {
    Len,
    Abs,
    Repr,
}

impl BuiltinFunction {
    /// Invokes the builtin with already-evaluated arguments.
    pub(crate) fn call(self, rt: &mut Runtime, args: &CallArgs) -> RunResult<Value> {
        match self {
            Self::Len => {
                let v = args.get_one("len")?;
                let type_id = rt.type_of(v);
                match rt.slot_of(type_id, SlotKind::Len) {
                    SlotValue::Len(f) => {
                        let len = f(rt, v)?;
                        Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
                    }
                    _ => {
                        let type_name = rt.type_name(type_id).to_owned();
                        Err(crate::exception::ExcType::type_error(format!(
                            "object of type '{type_name}' has no len()"
                        )))
                    }
                }
            }
            Self::Abs => {
                let v = args.get_one("abs")?;
                dispatch::unary_op(rt, v, SlotKind::Abs)
            }
            Self::Repr => {
                let v = args.get_one("repr")?;
                dispatch::unary_op(rt, v, SlotKind::Repr)
            }
        }
    }
}

/// The fixed name -> value builtins namespace.
#[derive(Debug, Default)]
pub(crate) struct Builtins {
    entries: AHashMap<StringId, Value>,
}

impl Builtins {
    /// Populates the namespace with every native function under its own
    /// name.
    pub fn new(interns: &mut Interns) -> Self {
        let mut entries = AHashMap::new();
        for f in BuiltinFunction::iter() {
            let name = interns.intern(&f.to_string());
            entries.insert(name, Value::Builtin(f));
        }
        Self { entries }
    }

    #[inline]
    pub fn get(&self, name: StringId) -> Option<Value> {
        self.entries.get(&name).copied()
    }

    /// Adds or replaces an entry, for embedders extending the surface.
    pub fn set(&mut self, name: StringId, value: Value) {
        self.entries.insert(name, value);
    }
}
