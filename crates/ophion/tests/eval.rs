//! End-to-end evaluation: arithmetic, names, unpacking, control flow,
//! closures, and failure semantics.

use std::sync::Arc;

use ophion::{
    CodeBuilder, CodeFlags, CodeObject, Const, ExcType, Opcode, RecordingTracer, ResourceLimits, Runtime, RunError,
    TraceEvent, Value,
};
use pretty_assertions::assert_eq;

fn exc_message(err: &RunError) -> &str {
    match err {
        RunError::Exc(exc) => exc.message.as_deref().unwrap_or(""),
        RunError::Internal(internal) => panic!("expected user-level exception, got internal: {}", internal.message),
    }
}

/// Emits `target = a <op> b` at module level.
fn emit_binop_store(b: &mut CodeBuilder, op: Opcode, target: &str) {
    let a = b.name("a");
    b.emit_arg(Opcode::LoadName, a);
    let bee = b.name("b");
    b.emit_arg(Opcode::LoadName, bee);
    b.emit(op);
    let t = b.name(target);
    b.emit_arg(Opcode::StoreName, t);
}

fn arithmetic_module(rt: &mut Runtime) -> Arc<CodeObject> {
    let mut b = CodeBuilder::module("arith");
    emit_binop_store(&mut b, Opcode::BinaryAdd, "sum");
    emit_binop_store(&mut b, Opcode::BinarySubtract, "diff");
    emit_binop_store(&mut b, Opcode::BinaryMultiply, "prod");
    b.load_const(Const::None);
    b.emit(Opcode::ReturnValue);
    b.finish(rt).unwrap()
}

#[test]
fn int_arithmetic_end_to_end() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();
    rt.set_global(ns, "a", Value::Int(7));
    rt.set_global(ns, "b", Value::Int(6));

    let code = arithmetic_module(&mut rt);
    let result = rt.eval_code(code, ns).unwrap();
    assert!(matches!(result, Value::None));

    assert!(matches!(rt.get_global(ns, "sum"), Some(Value::Int(13))));
    assert!(matches!(rt.get_global(ns, "diff"), Some(Value::Int(1))));
    assert!(matches!(rt.get_global(ns, "prod"), Some(Value::Int(42))));
}

#[test]
fn float_promotion_end_to_end() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();
    rt.set_global(ns, "a", Value::Float(7.0));
    rt.set_global(ns, "b", Value::Int(6));

    let code = arithmetic_module(&mut rt);
    rt.eval_code(code, ns).unwrap();

    assert!(matches!(rt.get_global(ns, "sum"), Some(Value::Float(f)) if f == 13.0));
    assert!(matches!(rt.get_global(ns, "diff"), Some(Value::Float(f)) if f == 1.0));
    assert!(matches!(rt.get_global(ns, "prod"), Some(Value::Float(f)) if f == 42.0));
}

fn unpack_module(rt: &mut Runtime, count: u32) -> Arc<CodeObject> {
    let mut b = CodeBuilder::module("unpack");
    let vals = b.name("vals");
    b.emit_arg(Opcode::LoadName, vals);
    b.emit_arg(Opcode::UnpackSequence, count);
    for target in ["x", "y", "z"].iter().take(count as usize) {
        let t = b.name(target);
        b.emit_arg(Opcode::StoreName, t);
    }
    b.load_const(Const::None);
    b.emit(Opcode::ReturnValue);
    b.finish(rt).unwrap()
}

#[test]
fn unpacking_arity_messages_are_exact() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();
    let code = unpack_module(&mut rt, 3);

    let two = rt.alloc_tuple(vec![Value::Int(1), Value::Int(2)]).unwrap();
    rt.set_global(ns, "vals", two);
    let err = rt.eval_code(Arc::clone(&code), ns).unwrap_err();
    assert_eq!(exc_message(&err), "not enough values to unpack (expected 3, got 2)");

    let four = rt
        .alloc_tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)])
        .unwrap();
    rt.set_global(ns, "vals", four);
    let err = rt.eval_code(Arc::clone(&code), ns).unwrap_err();
    assert_eq!(exc_message(&err), "too many values to unpack (expected 3)");

    let three = rt
        .alloc_tuple(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        .unwrap();
    rt.set_global(ns, "vals", three);
    rt.eval_code(code, ns).unwrap();
    assert!(matches!(rt.get_global(ns, "x"), Some(Value::Int(1))));
    assert!(matches!(rt.get_global(ns, "y"), Some(Value::Int(2))));
    assert!(matches!(rt.get_global(ns, "z"), Some(Value::Int(3))));
}

#[test]
fn starred_unpacking_collects_the_middle() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    // first, *middle, last = vals
    let mut b = CodeBuilder::module("unpack_ex");
    let vals = b.name("vals");
    b.emit_arg(Opcode::LoadName, vals);
    b.emit_arg(Opcode::UnpackEx, 1 | (1 << 8));
    for target in ["first", "middle", "last"] {
        let t = b.name(target);
        b.emit_arg(Opcode::StoreName, t);
    }
    b.load_const(Const::None);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();

    let vals = rt
        .alloc_list(vec![Value::Int(1), Value::Int(2), Value::Int(3), Value::Int(4)])
        .unwrap();
    rt.set_global(ns, "vals", vals);
    rt.eval_code(Arc::clone(&code), ns).unwrap();

    assert!(matches!(rt.get_global(ns, "first"), Some(Value::Int(1))));
    assert!(matches!(rt.get_global(ns, "last"), Some(Value::Int(4))));
    let middle = rt.get_global(ns, "middle").unwrap();
    assert_eq!(rt.repr_str(middle).unwrap(), "[2, 3]");

    // Not enough for the fixed targets.
    let short = rt.alloc_list(vec![Value::Int(1)]).unwrap();
    rt.set_global(ns, "vals", short);
    let err = rt.eval_code(code, ns).unwrap_err();
    assert_eq!(
        exc_message(&err),
        "not enough values to unpack (expected at least 2, got 1)"
    );
}

#[test]
fn name_resolution_walks_three_tiers() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    // `len` resolves from builtins when absent from globals.
    let mut b = CodeBuilder::module("names");
    let len_name = b.name("len");
    b.emit_arg(Opcode::LoadName, len_name);
    b.load_const(Const::Str("four".to_owned()));
    b.emit_arg(Opcode::CallFunction, 1);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();
    let result = rt.eval_code(code, ns).unwrap();
    assert!(matches!(result, Value::Int(4)));

    // Globals shadow builtins.
    rt.set_global(ns, "len", Value::Int(5));
    let mut b = CodeBuilder::module("names2");
    let len_name = b.name("len");
    b.emit_arg(Opcode::LoadName, len_name);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();
    let result = rt.eval_code(code, ns).unwrap();
    assert!(matches!(result, Value::Int(5)));

    // A miss in all tiers is a NameError.
    let mut b = CodeBuilder::module("names3");
    let missing = b.name("missing");
    b.emit_arg(Opcode::LoadName, missing);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();
    let err = rt.eval_code(code, ns).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::NameError));
    assert_eq!(exc_message(&err), "name 'missing' is not defined");
}

#[test]
fn unbound_local_is_its_own_error_kind() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    let mut b = CodeBuilder::function("f");
    b.local("x");
    let x = b.local_slot("x").unwrap();
    b.emit_arg(Opcode::LoadFast, x);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();
    let f = rt.make_function(code, ns).unwrap();

    let err = rt.call(f, &[]).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::UnboundLocalError));
    assert_eq!(exc_message(&err), "local variable 'x' referenced before assignment");
    // And it is catchable as its NameError parent, per the hierarchy.
    assert!(ExcType::UnboundLocalError.is_subclass_of(ExcType::NameError));
}

#[test]
fn conditional_jumps_branch_on_truthiness() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    // return 1 if flag else 2
    let build = |rt: &mut Runtime| {
        let mut b = CodeBuilder::module("branch");
        let flag = b.name("flag");
        b.emit_arg(Opcode::LoadName, flag);
        let else_branch = b.new_label();
        b.jump(Opcode::PopJumpIfFalse, else_branch);
        b.load_const(Const::Int(1));
        b.emit(Opcode::ReturnValue);
        b.bind(else_branch);
        b.load_const(Const::Int(2));
        b.emit(Opcode::ReturnValue);
        b.finish(rt).unwrap()
    };

    let code = build(&mut rt);
    rt.set_global(ns, "flag", Value::Bool(true));
    assert!(matches!(rt.eval_code(Arc::clone(&code), ns).unwrap(), Value::Int(1)));
    rt.set_global(ns, "flag", Value::Int(0));
    assert!(matches!(rt.eval_code(Arc::clone(&code), ns).unwrap(), Value::Int(2)));
    // An empty list is falsy through the length fallback.
    let empty = rt.alloc_list(vec![]).unwrap();
    rt.set_global(ns, "flag", empty);
    assert!(matches!(rt.eval_code(code, ns).unwrap(), Value::Int(2)));
}

#[test]
fn for_iteration_accumulates() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    // total = 0; for v in vals: total = total + v; return total
    let mut b = CodeBuilder::module("loop");
    b.load_const(Const::Int(0));
    let total = b.name("total");
    b.emit_arg(Opcode::StoreName, total);
    let vals = b.name("vals");
    b.emit_arg(Opcode::LoadName, vals);
    b.emit(Opcode::GetIter);
    let loop_start = b.new_label();
    let done = b.new_label();
    b.bind(loop_start);
    b.jump(Opcode::ForIter, done);
    let total2 = b.name("total");
    b.emit_arg(Opcode::LoadName, total2);
    b.emit(Opcode::BinaryAdd);
    b.emit_arg(Opcode::StoreName, total2);
    b.jump(Opcode::JumpAbsolute, loop_start);
    b.bind(done);
    let total3 = b.name("total");
    b.emit_arg(Opcode::LoadName, total3);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();

    let vals = rt
        .alloc_list(vec![Value::Int(10), Value::Int(20), Value::Int(12)])
        .unwrap();
    rt.set_global(ns, "vals", vals);
    let result = rt.eval_code(code, ns).unwrap();
    assert!(matches!(result, Value::Int(42)));
}

#[test]
fn containers_and_subscripts() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    // d = {'k': 41}; d['k'] = d['k'] + 1; return d['k']
    let mut b = CodeBuilder::module("subs");
    b.load_const(Const::Str("k".to_owned()));
    b.load_const(Const::Int(41));
    b.emit_arg(Opcode::BuildMap, 1);
    let d = b.name("d");
    b.emit_arg(Opcode::StoreName, d);

    b.emit_arg(Opcode::LoadName, d);
    b.load_const(Const::Str("k".to_owned()));
    b.emit(Opcode::BinarySubscr);
    b.load_const(Const::Int(1));
    b.emit(Opcode::BinaryAdd);
    b.emit_arg(Opcode::LoadName, d);
    b.load_const(Const::Str("k".to_owned()));
    b.emit(Opcode::StoreSubscr);

    b.emit_arg(Opcode::LoadName, d);
    b.load_const(Const::Str("k".to_owned()));
    b.emit(Opcode::BinarySubscr);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();

    let result = rt.eval_code(code, ns).unwrap();
    assert!(matches!(result, Value::Int(42)));
}

#[test]
fn key_error_carries_the_missing_key() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    let mut b = CodeBuilder::module("keyerr");
    b.emit_arg(Opcode::BuildMap, 0);
    b.load_const(Const::Int(42));
    b.emit(Opcode::BinarySubscr);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();

    let err = rt.eval_code(code, ns).unwrap_err();
    let RunError::Exc(exc) = err else { panic!("expected KeyError") };
    assert_eq!(exc.exc_type, ExcType::KeyError);
    assert_eq!(exc.message.as_deref(), Some("42"));
    assert!(matches!(exc.payload, Some(Value::Int(42))));
}

#[test]
fn unknown_opcode_is_internal_and_not_catchable() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    let qualname = rt.intern("<module>");
    let code = CodeObject::new(
        0,
        0,
        0,
        0,
        CodeFlags::default(),
        0,
        vec![],
        vec![],
        vec![],
        vec![],
        vec![],
        vec![0xFF00],
        "bad".to_owned(),
        qualname,
        1,
    )
    .unwrap();

    let err = rt.eval_code(Arc::new(code), ns).unwrap_err();
    assert!(matches!(err, RunError::Internal(_)));
    // Internal errors expose no user-level exception type at all.
    assert_eq!(err.exc_type(), None);
}

#[test]
fn code_object_validates_its_name_table() {
    let mut rt = Runtime::new();
    let qualname = rt.intern("f");
    let err = CodeObject::new(
        1,
        0,
        0,
        2,
        CodeFlags::OPTIMIZED,
        0,
        vec![],
        vec![],
        vec![qualname], // one name for two declared locals
        vec![],
        vec![],
        vec![],
        "bad".to_owned(),
        qualname,
        1,
    )
    .unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::ValueError));
}

#[test]
fn recursion_guard_unwinds_the_whole_chain() {
    let mut rt = Runtime::with_limits(ResourceLimits {
        max_recursion_depth: 32,
        ..ResourceLimits::default()
    });
    let ns = rt.new_namespace();

    // def f(): return f()
    let mut b = CodeBuilder::function("f");
    let f_name = b.name("f");
    b.emit_arg(Opcode::LoadGlobal, f_name);
    b.emit_arg(Opcode::CallFunction, 0);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();
    let f = rt.make_function(code, ns).unwrap();
    rt.set_global(ns, "f", f);

    let err = rt.call(f, &[]).unwrap_err();
    assert_eq!(err.exc_type(), Some(ExcType::RecursionError));
    assert_eq!(exc_message(&err), "maximum recursion depth exceeded");
}

#[test]
fn closures_read_and_write_through_cells() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    // def inner(): return x  (x free)
    let mut b = CodeBuilder::function("inner");
    b.freevar("x");
    b.emit_arg(Opcode::LoadDeref, 0);
    b.emit(Opcode::ReturnValue);
    let inner_code = b.finish(&mut rt).unwrap();

    // def outer(x): return inner closed over x's cell
    let mut b = CodeBuilder::function("outer");
    b.param("x");
    b.cellvar("x");
    b.emit_arg(Opcode::LoadClosure, 0);
    b.emit_arg(Opcode::BuildTuple, 1);
    b.load_const(Const::Code(Box::new((*inner_code).clone())));
    b.emit_arg(Opcode::MakeFunction, 4);
    b.emit(Opcode::ReturnValue);
    let outer_code = b.finish(&mut rt).unwrap();
    let outer = rt.make_function(outer_code, ns).unwrap();

    let inner = rt.call(outer, &[Value::Int(42)]).unwrap();
    let result = rt.call(inner, &[]).unwrap();
    assert!(matches!(result, Value::Int(42)));

    // Distinct calls get distinct cells.
    let other = rt.call(outer, &[Value::Int(7)]).unwrap();
    let result = rt.call(other, &[]).unwrap();
    assert!(matches!(result, Value::Int(7)));
    // The first closure is unaffected.
    let result = rt.call(inner, &[]).unwrap();
    assert!(matches!(result, Value::Int(42)));
}

#[test]
fn make_function_applies_defaults() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    // def f(a=5): return a
    let mut b = CodeBuilder::function("f");
    let a = b.param("a");
    b.emit_arg(Opcode::LoadFast, a);
    b.emit(Opcode::ReturnValue);
    let f_code = b.finish(&mut rt).unwrap();

    // module: f = <make function with defaults (5,)>; return f()
    let mut b = CodeBuilder::module("deffn");
    b.load_const(Const::Int(5));
    b.emit_arg(Opcode::BuildTuple, 1);
    b.load_const(Const::Code(Box::new((*f_code).clone())));
    b.emit_arg(Opcode::MakeFunction, 1);
    b.emit_arg(Opcode::CallFunction, 0);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();

    let result = rt.eval_code(code, ns).unwrap();
    assert!(matches!(result, Value::Int(5)));
}

#[test]
fn tracer_observes_instructions_and_frames() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    let mut b = CodeBuilder::function("callee");
    b.load_const(Const::Int(1));
    b.emit(Opcode::ReturnValue);
    let callee_code = b.finish(&mut rt).unwrap();
    let callee = rt.make_function(callee_code, ns).unwrap();
    rt.set_global(ns, "callee", callee);

    let mut b = CodeBuilder::module("traced");
    let name = b.name("callee");
    b.emit_arg(Opcode::LoadName, name);
    b.emit_arg(Opcode::CallFunction, 0);
    b.emit(Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();

    let mut tracer = RecordingTracer::default();
    rt.eval_code_traced(code, ns, &mut tracer).unwrap();

    assert!(matches!(tracer.events.first(), Some(TraceEvent::Instruction(1, 0, _))));
    assert!(tracer.events.contains(&TraceEvent::FramePush("callee".to_owned())));
    assert!(tracer.events.contains(&TraceEvent::FramePop));
}

#[test]
fn code_objects_round_trip_through_the_wire_format() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();
    rt.set_global(ns, "a", Value::Int(7));
    rt.set_global(ns, "b", Value::Int(6));

    let code = arithmetic_module(&mut rt);
    let bytes = code.to_bytes().unwrap();
    let restored = CodeObject::from_bytes(&bytes).unwrap();
    assert_eq!(restored.words, code.words);
    assert_eq!(restored.flags, code.flags);
    assert_eq!(restored.nlocals, code.nlocals);

    rt.eval_code(Arc::new(restored), ns).unwrap();
    assert!(matches!(rt.get_global(ns, "prod"), Some(Value::Int(42))));
}

#[test]
fn method_pair_and_plain_attribute_calls_agree() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();

    // A type with a bytecode method reading the receiver's storage.
    let point = rt.register_type(ophion::TypeSpec::new("Point")).unwrap();

    // def magnitude(self): return self.value
    let mut b = CodeBuilder::function("magnitude");
    let self_slot = b.param("self");
    b.emit_arg(Opcode::LoadFast, self_slot);
    let value_name = b.name("value");
    b.emit_arg(Opcode::LoadAttr, value_name);
    b.emit(Opcode::ReturnValue);
    let method_code = b.finish(&mut rt).unwrap();
    let method = rt.make_function(method_code, ns).unwrap();
    rt.set_type_attr(point, "magnitude", method);

    let obj = rt.call(Value::Type(point), &[]).unwrap();
    rt.instance_set_raw(obj, "value", Value::Int(42)).unwrap();
    rt.set_global(ns, "obj", obj);

    // Optimized pair: obj.magnitude() via LoadMethod/CallMethod.
    let mut b = CodeBuilder::module("pair");
    let obj_name = b.name("obj");
    b.emit_arg(Opcode::LoadName, obj_name);
    let mag = b.name("magnitude");
    b.emit_arg(Opcode::LoadMethod, mag);
    b.emit_arg(Opcode::CallMethod, 0);
    b.emit(Opcode::ReturnValue);
    let pair_code = b.finish(&mut rt).unwrap();
    let pair_result = rt.eval_code(pair_code, ns).unwrap();

    // Unoptimized: the attribute load binds, then a plain call.
    let mut b = CodeBuilder::module("plain");
    let obj_name = b.name("obj");
    b.emit_arg(Opcode::LoadName, obj_name);
    let mag = b.name("magnitude");
    b.emit_arg(Opcode::LoadAttr, mag);
    b.emit_arg(Opcode::CallFunction, 0);
    b.emit(Opcode::ReturnValue);
    let plain_code = b.finish(&mut rt).unwrap();
    let plain_result = rt.eval_code(plain_code, ns).unwrap();

    assert!(matches!(pair_result, Value::Int(42)));
    assert!(matches!(plain_result, Value::Int(42)));
}
