//! The runtime context object.
//!
//! All process-wide registries of the emulated language - the arena heap,
//! the intern table, the type registry, namespaces, builtins - live here
//! with defined construction and teardown, threaded through explicitly
//! rather than reached as ambient global state. Exclusive ownership
//! (`&mut Runtime`) is what makes the construction-time population of slot
//! tables and the lazy interning safe.

use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    args::CallArgs,
    attr,
    binder,
    builtins::Builtins,
    code::CodeObject,
    dispatch,
    exception::{ExcType, RunError, RunResult},
    function::Function,
    heap::{Cell, Heap, HeapData},
    intern::{Interns, StringId},
    namespace::{NamespaceId, Namespaces},
    resource::ResourceLimits,
    tracer::NoopTracer,
    types::{
        self, TypeId, TypeRegistry, TypeSpec,
        descr::{DeleterFn, GetSet, GetterFn, SetterFn},
        slot::{SlotKind, SlotValue},
        str::str_content,
    },
    value::Value,
    vm,
};

/// Resolution of a call target: either the result is already computed, or
/// a bytecode function must be evaluated in a new frame.
pub(crate) enum CallTarget {
    Done(Value),
    Function(Function, CallArgs),
}

/// The interpreter context.
pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) interns: Interns,
    pub(crate) types: TypeRegistry,
    pub(crate) namespaces: Namespaces,
    pub(crate) builtins: Builtins,
    pub(crate) limits: ResourceLimits,
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Creates a runtime with default limits and the builtin type catalog
    /// installed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limits(ResourceLimits::default())
    }

    /// Creates a runtime with explicit resource limits.
    #[must_use]
    pub fn with_limits(limits: ResourceLimits) -> Self {
        let mut interns = Interns::new();
        let types = TypeRegistry::bootstrap(&mut interns);
        let builtins = Builtins::new(&mut interns);
        Self {
            heap: Heap::new(limits.max_heap_entries),
            interns,
            types,
            namespaces: Namespaces::new(),
            builtins,
            limits,
        }
    }

    // --- names and namespaces ---------------------------------------

    /// Interns a name.
    pub fn intern(&mut self, s: &str) -> StringId {
        self.interns.intern(s)
    }

    /// Returns the text of an interned name.
    #[must_use]
    pub fn resolve_str(&self, id: StringId) -> &str {
        self.interns.get_str(id)
    }

    /// Creates a fresh namespace, usable as a module's globals.
    pub fn new_namespace(&mut self) -> NamespaceId {
        self.namespaces.create()
    }

    /// Binds a name in a namespace.
    pub fn set_global(&mut self, ns: NamespaceId, name: &str, value: Value) {
        let id = self.intern(name);
        self.namespaces.set(ns, id, value);
    }

    /// Reads a name from a namespace.
    #[must_use]
    pub fn get_global(&self, ns: NamespaceId, name: &str) -> Option<Value> {
        let id = self.interns.find(name)?;
        self.namespaces.get(ns, id)
    }

    /// Adds or replaces an entry in the builtins namespace.
    pub fn set_builtin(&mut self, name: &str, value: Value) {
        let id = self.intern(name);
        self.builtins.set(id, value);
    }

    // --- types -------------------------------------------------------

    /// The type of a value.
    #[must_use]
    pub fn type_of(&self, v: Value) -> TypeId {
        v.py_type(&self.heap)
    }

    /// A type's name.
    #[must_use]
    pub fn type_name(&self, id: TypeId) -> &str {
        self.interns.get_str(self.types.get(id).name)
    }

    /// The name of a value's type.
    #[must_use]
    pub fn value_type_name(&self, v: Value) -> &str {
        self.type_name(self.type_of(v))
    }

    /// Total slot lookup on a type.
    #[inline]
    pub(crate) fn slot_of(&self, type_id: TypeId, kind: SlotKind) -> SlotValue {
        self.types.get(type_id).slots.get(kind)
    }

    /// Registers a new type from its declarative spec.
    pub fn register_type(&mut self, spec: TypeSpec) -> RunResult<TypeId> {
        let Self { types, interns, .. } = self;
        types.register(spec, false, interns)
    }

    /// Reassigns one slot after construction, shape-checked.
    pub fn set_slot(&mut self, type_id: TypeId, kind: SlotKind, value: SlotValue) -> RunResult<()> {
        self.types.set_slot(type_id, kind, value)
    }

    /// Binds a name in a type's namespace (descriptors and plain values).
    pub fn set_type_attr(&mut self, type_id: TypeId, name: &str, value: Value) {
        let id = self.intern(name);
        self.types.get_mut(type_id).namespace.insert(id, value);
    }

    /// Subtype query.
    #[must_use]
    pub fn is_subtype(&self, a: TypeId, b: TypeId) -> bool {
        self.types.is_subtype(a, b)
    }

    // --- allocation --------------------------------------------------

    /// Allocates a computed string.
    pub fn alloc_str(&mut self, s: &str) -> RunResult<Value> {
        let id = self.heap.allocate(HeapData::Str(s.into()))?;
        Ok(Value::Ref(id))
    }

    /// An interned-string value, for literals and names.
    pub fn str_value(&mut self, s: &str) -> Value {
        Value::InternString(self.intern(s))
    }

    /// Allocates a tuple.
    pub fn alloc_tuple(&mut self, items: Vec<Value>) -> RunResult<Value> {
        let id = self.heap.allocate(HeapData::Tuple(items))?;
        Ok(Value::Ref(id))
    }

    /// Allocates a list.
    pub fn alloc_list(&mut self, items: Vec<Value>) -> RunResult<Value> {
        let id = self.heap.allocate(HeapData::List(items))?;
        Ok(Value::Ref(id))
    }

    /// Allocates an empty dict.
    pub fn alloc_dict(&mut self) -> RunResult<Value> {
        let id = self.heap.allocate(HeapData::Dict(types::dict::Dict::new()))?;
        Ok(Value::Ref(id))
    }

    /// Allocates a fresh cell holding `value`.
    pub fn alloc_cell(&mut self, value: Value) -> RunResult<Value> {
        let id = self.heap.allocate(HeapData::Cell(Cell { value }))?;
        Ok(Value::Ref(id))
    }

    /// Allocates a get/set data descriptor.
    pub fn alloc_getset(
        &mut self,
        name: &str,
        getter: GetterFn,
        setter: Option<SetterFn>,
        deleter: Option<DeleterFn>,
    ) -> RunResult<Value> {
        let name = self.intern(name);
        let id = self.heap.allocate(HeapData::GetSet(GetSet {
            name,
            getter,
            setter,
            deleter,
        }))?;
        Ok(Value::Ref(id))
    }

    /// Normalizes a big integer into the compact representation when it
    /// fits.
    pub(crate) fn value_from_bigint(&mut self, b: BigInt) -> RunResult<Value> {
        match b.to_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => {
                let id = self.heap.allocate(HeapData::BigInt(b))?;
                Ok(Value::Ref(id))
            }
        }
    }

    /// Allocates an int value from a big integer.
    pub fn alloc_bigint(&mut self, b: BigInt) -> RunResult<Value> {
        self.value_from_bigint(b)
    }

    // --- functions ---------------------------------------------------

    /// Creates a function over a code object, capturing `globals`.
    pub fn make_function(&mut self, code: Arc<CodeObject>, globals: NamespaceId) -> RunResult<Value> {
        let id = self.heap.allocate(HeapData::Function(Function::new(code, globals)))?;
        Ok(Value::Ref(id))
    }

    fn function_mut(&mut self, f: Value) -> RunResult<&mut Function> {
        if let Value::Ref(id) = f
            && let HeapData::Function(func) = self.heap.get_mut(id)
        {
            return Ok(func);
        }
        Err(ExcType::type_error("expected a function object"))
    }

    /// Replaces a function's defaults wholesale.
    pub fn set_function_defaults(&mut self, f: Value, defaults: Vec<Value>) -> RunResult<()> {
        let func = self.function_mut(f)?;
        func.defaults = if defaults.is_empty() { None } else { Some(defaults) };
        Ok(())
    }

    /// Replaces a function's keyword defaults wholesale.
    pub fn set_function_kwdefaults(&mut self, f: Value, kwdefaults: &[(&str, Value)]) -> RunResult<()> {
        let pairs: Vec<(StringId, Value)> = kwdefaults
            .iter()
            .map(|&(name, value)| (self.interns.intern(name), value))
            .collect();
        let func = self.function_mut(f)?;
        func.kwdefaults = if pairs.is_empty() { None } else { Some(pairs) };
        Ok(())
    }

    /// Replaces a function's closure wholesale, validating length and cell
    /// shape against the code object.
    pub fn set_function_closure(&mut self, f: Value, closure: Vec<Value>) -> RunResult<()> {
        let (nfree, name) = {
            let func = self.function_mut(f)?;
            (func.code.freevars.len(), func.qualname)
        };
        if nfree == 0 {
            if closure.is_empty() {
                self.function_mut(f)?.closure = None;
                return Ok(());
            }
            return Err(ExcType::type_error(format!(
                "{} closure must be empty/None",
                self.interns.get_str(name)
            )));
        }
        if closure.len() != nfree {
            return Err(ExcType::value_error(format!(
                "{} requires closure of length {}, not {}",
                self.interns.get_str(name),
                nfree,
                closure.len()
            )));
        }
        let mut cell_ids = Vec::with_capacity(closure.len());
        for v in closure {
            match v {
                Value::Ref(id) if matches!(self.heap.get(id), HeapData::Cell(_)) => cell_ids.push(id),
                other => {
                    let type_name = self.value_type_name(other).to_owned();
                    return Err(ExcType::type_error(format!("closure: expected cell, found {type_name}")));
                }
            }
        }
        self.function_mut(f)?.closure = Some(cell_ids);
        Ok(())
    }

    /// Writes directly into an instance's own storage, bypassing the
    /// descriptor protocol (the equivalent of writing through the raw
    /// attribute mapping).
    pub fn instance_set_raw(&mut self, obj: Value, name: &str, value: Value) -> RunResult<()> {
        let id = self.intern(name);
        if let Value::Ref(heap_id) = obj
            && let HeapData::Instance(instance) = self.heap.get_mut(heap_id)
        {
            instance.storage.insert(id, value);
            return Ok(());
        }
        Err(ExcType::type_error("value has no instance storage"))
    }

    /// Reads directly from an instance's own storage, bypassing the
    /// descriptor protocol.
    #[must_use]
    pub fn instance_get_raw(&self, obj: Value, name: &str) -> Option<Value> {
        let id = self.interns.find(name)?;
        if let Value::Ref(heap_id) = obj
            && let HeapData::Instance(instance) = self.heap.get(heap_id)
        {
            return instance.storage.get(&id).copied();
        }
        None
    }

    // --- protocol entry points --------------------------------------

    /// Attribute read by name.
    pub fn get_attr(&mut self, obj: Value, name: &str) -> RunResult<Value> {
        let id = self.intern(name);
        attr::get_attr(self, obj, id)
    }

    /// Attribute write by name.
    pub fn set_attr(&mut self, obj: Value, name: &str, value: Value) -> RunResult<()> {
        let id = self.intern(name);
        attr::set_attr(self, obj, id, value)
    }

    /// Attribute deletion by name.
    pub fn del_attr(&mut self, obj: Value, name: &str) -> RunResult<()> {
        let id = self.intern(name);
        attr::del_attr(self, obj, id)
    }

    /// Binary operator dispatch.
    pub fn binary_op(&mut self, left: Value, right: Value, op: SlotKind) -> RunResult<Value> {
        dispatch::binary_op(self, left, right, op)
    }

    /// Unary operator dispatch.
    pub fn unary_op(&mut self, v: Value, op: SlotKind) -> RunResult<Value> {
        dispatch::unary_op(self, v, op)
    }

    /// Rich comparison dispatch.
    pub fn compare(&mut self, left: Value, right: Value, cmp: crate::dispatch::Comparison) -> RunResult<Value> {
        dispatch::compare(self, left, right, cmp)
    }

    /// Truthiness: the bool slot, then length, then true.
    pub fn truthy(&mut self, v: Value) -> RunResult<bool> {
        let type_id = self.type_of(v);
        match self.slot_of(type_id, SlotKind::Bool) {
            SlotValue::Predicate(f) => f(self, v),
            SlotValue::Empty => match self.slot_of(type_id, SlotKind::Len) {
                SlotValue::Len(f) => Ok(f(self, v)? != 0),
                _ => Ok(true),
            },
            _ => Err(RunError::internal("bool dispatch through a non-predicate slot entry")),
        }
    }

    /// The repr of a value as a host string.
    pub fn repr_str(&mut self, v: Value) -> RunResult<String> {
        let type_id = self.type_of(v);
        if let SlotValue::Unary(f) = self.slot_of(type_id, SlotKind::Repr) {
            let r = f(self, v)?;
            if let Some(text) = str_content(&self.heap, &self.interns, r) {
                return Ok(text.to_owned());
            }
        }
        Ok(format!("<{} object>", self.value_type_name(v)))
    }

    /// Reads the text of a string value, if it is one.
    #[must_use]
    pub fn str_content_of(&self, v: Value) -> Option<&str> {
        str_content(&self.heap, &self.interns, v)
    }

    // --- calling -----------------------------------------------------

    /// Resolves a callable to either a native result or a bytecode
    /// function plus final arguments.
    pub(crate) fn resolve_call(&mut self, callee: Value, mut args: CallArgs) -> RunResult<CallTarget> {
        match callee {
            Value::Builtin(f) => f.call(self, &args).map(CallTarget::Done),
            Value::Type(type_id) => self.instantiate(type_id, &args).map(CallTarget::Done),
            Value::Ref(id) => match self.heap.get(id) {
                HeapData::Function(f) => Ok(CallTarget::Function(f.clone(), args)),
                HeapData::BoundMethod(m) => {
                    let m = *m;
                    args.prepend(m.receiver);
                    self.resolve_call(m.callable, args)
                }
                _ => Err(ExcType::not_callable(self.value_type_name(callee))),
            },
            _ => Err(ExcType::not_callable(self.value_type_name(callee))),
        }
    }

    /// Calls a type: allocate through its `new` slot, then run `init` when
    /// present.
    pub(crate) fn instantiate(&mut self, type_id: TypeId, args: &CallArgs) -> RunResult<Value> {
        let instance = match self.slot_of(type_id, SlotKind::New) {
            SlotValue::New(f) => f(self, type_id, args)?,
            SlotValue::Empty => {
                let name = self.type_name(type_id).to_owned();
                return Err(ExcType::type_error(format!("cannot create '{name}' instances")));
            }
            _ => return Err(RunError::internal("new dispatch through a non-new slot entry")),
        };
        if let SlotValue::Init(f) = self.slot_of(self.type_of(instance), SlotKind::Init) {
            f(self, instance, args)?;
        }
        Ok(instance)
    }

    /// Calls any callable with positional arguments.
    pub fn call(&mut self, callee: Value, args: &[Value]) -> RunResult<Value> {
        self.call_with(callee, CallArgs::positional(args))
    }

    /// Calls any callable with positional and keyword arguments.
    pub fn call_kw(&mut self, callee: Value, args: &[Value], kwargs: &[(&str, Value)]) -> RunResult<Value> {
        let mut call_args = CallArgs::positional(args);
        call_args.kw = kwargs
            .iter()
            .map(|&(name, value)| (self.interns.intern(name), value))
            .collect();
        self.call_with(callee, call_args)
    }

    /// Calls any callable with prepared arguments.
    pub(crate) fn call_with(&mut self, callee: Value, args: CallArgs) -> RunResult<Value> {
        match self.resolve_call(callee, args)? {
            CallTarget::Done(v) => Ok(v),
            CallTarget::Function(func, args) => {
                let frame = binder::bind_classic(self, &func, &args.pos, &args.kw)?;
                vm::run_frame(self, frame, &mut NoopTracer)
            }
        }
    }

    /// Evaluates a module-level code object against a global namespace.
    pub fn eval_code(&mut self, code: Arc<CodeObject>, globals: NamespaceId) -> RunResult<Value> {
        vm::eval_code(self, code, globals, &mut NoopTracer)
    }

    /// Evaluates with an attached tracer.
    pub fn eval_code_traced(
        &mut self,
        code: Arc<CodeObject>,
        globals: NamespaceId,
        tracer: &mut dyn crate::tracer::EvalTracer,
    ) -> RunResult<Value> {
        vm::eval_code(self, code, globals, tracer)
    }
}
