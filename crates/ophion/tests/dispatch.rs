//! Operator dispatch: precedence, reflection, subtype priority, promotion.

use ophion::{CallArgs, Runtime, RunResult, SlotKind, SlotValue, TypeId, TypeSpec, Value};
use pretty_assertions::assert_eq;

/// Reads the integer payload a test instance carries in its own storage.
fn payload(rt: &Runtime, v: Value) -> Option<i64> {
    match rt.instance_get_raw(v, "value") {
        Some(Value::Int(i)) => Some(i),
        _ => None,
    }
}

fn new_payload_instance(rt: &mut Runtime, type_id: TypeId, value: i64) -> Value {
    let instance = rt.call(Value::Type(type_id), &[]).unwrap();
    rt.instance_set_raw(instance, "value", Value::Int(value)).unwrap();
    instance
}

/// Adds two payload-carrying instances, declining anything else. The
/// result is an instance of the receiver's own type, so a subtype's
/// registration produces subtype results.
fn payload_add(rt: &mut Runtime, receiver: Value, other: Value) -> RunResult<Value> {
    let (Some(a), Some(b)) = (payload(rt, receiver), payload(rt, other)) else {
        return Ok(Value::NotImplemented);
    };
    let result_type = rt.type_of(receiver);
    let result = rt.call(Value::Type(result_type), &[])?;
    rt.instance_set_raw(result, "value", Value::Int(a + b))?;
    Ok(result)
}

struct Fixture {
    a: TypeId,
    b: TypeId,
    c: TypeId,
}

fn fixture(rt: &mut Runtime) -> Fixture {
    let a = rt
        .register_type(TypeSpec::new("A").slot(SlotKind::Add, SlotValue::Binary(payload_add)))
        .unwrap();
    let b = rt.register_type(TypeSpec::new("B")).unwrap();
    // C subtypes A and supplies both argument orders itself.
    let c = rt
        .register_type(
            TypeSpec::new("C")
                .base(a)
                .slot(SlotKind::Add, SlotValue::Binary(payload_add))
                .slot(SlotKind::RightAdd, SlotValue::Binary(payload_add)),
        )
        .unwrap();
    Fixture { a, b, c }
}

#[test]
fn same_type_dispatch_invokes_once() {
    let mut rt = Runtime::new();
    let f = fixture(&mut rt);
    let x = new_payload_instance(&mut rt, f.a, 2);
    let y = new_payload_instance(&mut rt, f.a, 3);
    let r = rt.binary_op(x, y, SlotKind::Add).unwrap();
    assert_eq!(payload(&rt, r), Some(5));
    assert_eq!(rt.type_of(r), f.a);
}

#[test]
fn subtype_priority_both_orders() {
    let mut rt = Runtime::new();
    let f = fixture(&mut rt);
    let base = new_payload_instance(&mut rt, f.a, 10);
    let sub = new_payload_instance(&mut rt, f.c, 1);

    // Base + subtype: the subtype's reflected implementation runs first
    // and the result is a subtype instance.
    let r = rt.binary_op(base, sub, SlotKind::Add).unwrap();
    assert_eq!(rt.type_of(r), f.c);
    assert_eq!(payload(&rt, r), Some(11));

    // Subtype + base: the subtype's forward implementation runs.
    let r = rt.binary_op(sub, base, SlotKind::Add).unwrap();
    assert_eq!(rt.type_of(r), f.c);
    assert_eq!(payload(&rt, r), Some(11));
}

#[test]
fn mutual_incompatibility_names_types_and_symbol() {
    let mut rt = Runtime::new();
    let f = fixture(&mut rt);
    let x = new_payload_instance(&mut rt, f.a, 1);
    let y = rt.call(Value::Type(f.b), &[]).unwrap();
    let err = rt.binary_op(x, y, SlotKind::Add).unwrap_err();
    let ophion::RunError::Exc(exc) = err else {
        panic!("expected user-level TypeError");
    };
    assert_eq!(exc.exc_type, ophion::ExcType::TypeError);
    assert_eq!(
        exc.message.as_deref(),
        Some("unsupported operand type(s) for +: 'A' and 'B'")
    );
}

#[test]
fn dispatch_is_deterministic() {
    let mut rt = Runtime::new();
    let f = fixture(&mut rt);
    let x = new_payload_instance(&mut rt, f.a, 4);
    let y = new_payload_instance(&mut rt, f.c, 5);
    let first = rt.binary_op(x, y, SlotKind::Add).unwrap();
    let second = rt.binary_op(x, y, SlotKind::Add).unwrap();
    assert_eq!(rt.type_of(first), rt.type_of(second));
    assert_eq!(payload(&rt, first), payload(&rt, second));
}

#[test]
fn numeric_promotion() {
    let mut rt = Runtime::new();

    let r = rt.binary_op(Value::Int(2), Value::Int(3), SlotKind::Add).unwrap();
    assert!(matches!(r, Value::Int(5)));

    let r = rt.binary_op(Value::Int(2), Value::Float(3.0), SlotKind::Add).unwrap();
    assert!(matches!(r, Value::Float(f) if f == 5.0));

    let r = rt.binary_op(Value::Float(2.0), Value::Int(3), SlotKind::Add).unwrap();
    assert!(matches!(r, Value::Float(f) if f == 5.0));

    // True division of ints yields a float.
    let r = rt.binary_op(Value::Int(7), Value::Int(2), SlotKind::TrueDiv).unwrap();
    assert!(matches!(r, Value::Float(f) if f == 3.5));
}

#[test]
fn int_overflow_spills_to_general_representation() {
    let mut rt = Runtime::new();
    let r = rt
        .binary_op(Value::Int(i64::MAX), Value::Int(1), SlotKind::Add)
        .unwrap();
    // The result no longer fits the compact representation.
    assert!(matches!(r, Value::Ref(_)));
    assert_eq!(rt.repr_str(r).unwrap(), "9223372036854775808");

    // And arithmetic keeps working across representations.
    let back = rt.binary_op(r, Value::Int(1), SlotKind::Sub).unwrap();
    assert!(matches!(back, Value::Int(i64::MAX)));
}

#[test]
fn huge_int_to_float_overflows() {
    let mut rt = Runtime::new();
    let mut big = Value::Int(i64::MAX);
    // Square repeatedly until well past f64 range.
    for _ in 0..5 {
        big = rt.binary_op(big, big, SlotKind::Mul).unwrap();
    }
    let err = rt.binary_op(big, Value::Float(1.0), SlotKind::Add).unwrap_err();
    assert_eq!(err.exc_type(), Some(ophion::ExcType::OverflowError));
}

#[test]
fn division_by_zero() {
    let mut rt = Runtime::new();
    let err = rt.binary_op(Value::Int(1), Value::Int(0), SlotKind::TrueDiv).unwrap_err();
    assert_eq!(err.exc_type(), Some(ophion::ExcType::ZeroDivisionError));
    let err = rt
        .binary_op(Value::Int(1), Value::Int(0), SlotKind::FloorDiv)
        .unwrap_err();
    assert_eq!(err.exc_type(), Some(ophion::ExcType::ZeroDivisionError));
}

#[test]
fn unary_dispatch_and_error() {
    let mut rt = Runtime::new();
    let r = rt.unary_op(Value::Int(-4), SlotKind::Abs).unwrap();
    assert!(matches!(r, Value::Int(4)));

    let none_err = rt.unary_op(Value::None, SlotKind::Neg).unwrap_err();
    let ophion::RunError::Exc(exc) = none_err else {
        panic!("expected TypeError");
    };
    assert_eq!(
        exc.message.as_deref(),
        Some("bad operand type for unary -: 'NoneType'")
    );
}

#[test]
fn equality_falls_back_to_identity() {
    let mut rt = Runtime::new();
    let f = fixture(&mut rt);
    let x = rt.call(Value::Type(f.b), &[]).unwrap();
    let y = rt.call(Value::Type(f.b), &[]).unwrap();

    let same = rt.compare(x, x, ophion::Comparison::Eq).unwrap();
    assert!(matches!(same, Value::Bool(true)));
    let different = rt.compare(x, y, ophion::Comparison::Eq).unwrap();
    assert!(matches!(different, Value::Bool(false)));
    let ne = rt.compare(x, y, ophion::Comparison::Ne).unwrap();
    assert!(matches!(ne, Value::Bool(true)));
}

#[test]
fn ordering_without_support_raises() {
    let mut rt = Runtime::new();
    let f = fixture(&mut rt);
    let x = rt.call(Value::Type(f.b), &[]).unwrap();
    let err = rt.compare(x, Value::Int(1), ophion::Comparison::Lt).unwrap_err();
    let ophion::RunError::Exc(exc) = err else {
        panic!("expected TypeError");
    };
    assert_eq!(
        exc.message.as_deref(),
        Some("'<' not supported between instances of 'B' and 'int'")
    );
}

#[test]
fn mixed_numeric_comparisons() {
    let mut rt = Runtime::new();
    let r = rt.compare(Value::Int(7), Value::Float(7.5), ophion::Comparison::Lt).unwrap();
    assert!(matches!(r, Value::Bool(true)));
    let r = rt.compare(Value::Float(7.5), Value::Int(7), ophion::Comparison::Gt).unwrap();
    assert!(matches!(r, Value::Bool(true)));
    let r = rt.compare(Value::Int(7), Value::Float(7.0), ophion::Comparison::Eq).unwrap();
    assert!(matches!(r, Value::Bool(true)));
}

#[test]
fn slot_reassignment_is_shape_checked() {
    let mut rt = Runtime::new();
    let f = fixture(&mut rt);

    fn bogus_len(_rt: &mut Runtime, _v: Value) -> RunResult<usize> {
        Ok(0)
    }
    let err = rt.set_slot(f.a, SlotKind::Add, SlotValue::Len(bogus_len)).unwrap_err();
    assert!(matches!(err, ophion::RunError::Internal(_)));

    // A compatible reassignment is accepted.
    rt.set_slot(f.a, SlotKind::Sub, SlotValue::Binary(payload_add)).unwrap();
    let x = new_payload_instance(&mut rt, f.a, 6);
    let y = new_payload_instance(&mut rt, f.a, 7);
    let r = rt.binary_op(x, y, SlotKind::Sub).unwrap();
    assert_eq!(payload(&rt, r), Some(13));
}

#[test]
fn sealed_types_reject_subclassing() {
    let mut rt = Runtime::new();
    let sealed = rt.register_type(TypeSpec::new("Sealed").sealed()).unwrap();
    let err = rt.register_type(TypeSpec::new("Child").base(sealed)).unwrap_err();
    assert_eq!(err.exc_type(), Some(ophion::ExcType::TypeError));
}

#[test]
fn membership_uses_the_container_slot() {
    let mut rt = Runtime::new();
    let list = rt.alloc_list(vec![Value::Int(1), Value::Int(2)]).unwrap();
    let r = rt.compare(Value::Int(2), list, ophion::Comparison::In).unwrap();
    assert!(matches!(r, Value::Bool(true)));
    let r = rt.compare(Value::Int(9), list, ophion::Comparison::NotIn).unwrap();
    assert!(matches!(r, Value::Bool(true)));

    let err = rt.compare(Value::Int(1), Value::Int(2), ophion::Comparison::In).unwrap_err();
    assert_eq!(err.exc_type(), Some(ophion::ExcType::TypeError));
}

#[test]
fn construction_slots_drive_type_calls() {
    let mut rt = Runtime::new();

    fn counter_init(rt: &mut Runtime, instance: Value, args: &CallArgs) -> RunResult<()> {
        let start = args.pos.first().copied().unwrap_or(Value::Int(0));
        rt.instance_set_raw(instance, "count", start)
    }

    let counter = rt
        .register_type(TypeSpec::new("Counter").slot(SlotKind::Init, SlotValue::Init(counter_init)))
        .unwrap();
    let instance = rt.call(Value::Type(counter), &[Value::Int(3)]).unwrap();
    assert!(matches!(rt.instance_get_raw(instance, "count"), Some(Value::Int(3))));
}
