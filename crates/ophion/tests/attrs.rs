//! The attribute protocol: descriptor precedence, instance storage, and
//! the method-pair optimization's equivalence with the plain path.

use ophion::{ExcType, Runtime, RunResult, TypeId, TypeSpec, Value};
use pretty_assertions::assert_eq;

/// Getter for the data-descriptor tests: always reports 10.
fn ten_getter(_rt: &mut Runtime, _obj: Value) -> RunResult<Value> {
    Ok(Value::Int(10))
}

/// Setter recording what was written under a shadow name.
fn recording_setter(rt: &mut Runtime, obj: Value, value: Value) -> RunResult<()> {
    rt.instance_set_raw(obj, "_written", value)
}

fn deleting_deleter(rt: &mut Runtime, obj: Value) -> RunResult<()> {
    rt.instance_set_raw(obj, "_deleted", Value::Bool(true))
}

fn type_with_descriptor(rt: &mut Runtime, writable: bool) -> TypeId {
    let type_id = rt.register_type(TypeSpec::new("Box")).unwrap();
    let setter = writable.then_some(recording_setter as fn(&mut Runtime, Value, Value) -> RunResult<()>);
    let descriptor = rt
        .alloc_getset("size", ten_getter, setter, Some(deleting_deleter))
        .unwrap();
    rt.set_type_attr(type_id, "size", descriptor);
    type_id
}

#[test]
fn data_descriptor_wins_over_instance_storage() {
    let mut rt = Runtime::new();
    let box_type = type_with_descriptor(&mut rt, true);
    let obj = rt.call(Value::Type(box_type), &[]).unwrap();

    // A same-named entry in the instance's own storage is ignored on read.
    rt.instance_set_raw(obj, "size", Value::Int(99)).unwrap();
    let got = rt.get_attr(obj, "size").unwrap();
    assert!(matches!(got, Value::Int(10)));

    // Writes go through the descriptor, not the storage.
    rt.set_attr(obj, "size", Value::Int(5)).unwrap();
    assert!(matches!(rt.instance_get_raw(obj, "_written"), Some(Value::Int(5))));
    assert!(matches!(rt.instance_get_raw(obj, "size"), Some(Value::Int(99))));

    // Deletes likewise.
    rt.del_attr(obj, "size").unwrap();
    assert!(matches!(rt.instance_get_raw(obj, "_deleted"), Some(Value::Bool(true))));
}

#[test]
fn read_only_descriptor_write_is_a_type_error() {
    let mut rt = Runtime::new();
    let box_type = type_with_descriptor(&mut rt, false);
    let obj = rt.call(Value::Type(box_type), &[]).unwrap();

    let err = rt.set_attr(obj, "size", Value::Int(5)).unwrap_err();
    let ophion::RunError::Exc(exc) = err else {
        panic!("expected TypeError");
    };
    assert_eq!(exc.exc_type, ExcType::TypeError);
    assert_eq!(
        exc.message.as_deref(),
        Some("attribute 'size' of 'Box' objects is not writable")
    );
}

#[test]
fn non_data_descriptor_is_shadowed_by_instance_storage() {
    let mut rt = Runtime::new();
    let ns = rt.new_namespace();
    let type_id = rt.register_type(TypeSpec::new("Widget")).unwrap();

    // A plain function in the type namespace is a non-data descriptor.
    let mut b = ophion::CodeBuilder::function("describe");
    b.param("self");
    b.load_const(ophion::Const::Str("widget".to_owned()));
    b.emit(ophion::Opcode::ReturnValue);
    let code = b.finish(&mut rt).unwrap();
    let method = rt.make_function(code, ns).unwrap();
    rt.set_type_attr(type_id, "describe", method);

    let obj = rt.call(Value::Type(type_id), &[]).unwrap();

    // Without a shadow, access binds the method.
    let bound = rt.get_attr(obj, "describe").unwrap();
    let result = rt.call(bound, &[]).unwrap();
    assert_eq!(rt.str_content_of(result), Some("widget"));

    // The instance's own storage shadows it.
    rt.instance_set_raw(obj, "describe", Value::Int(1)).unwrap();
    let got = rt.get_attr(obj, "describe").unwrap();
    assert!(matches!(got, Value::Int(1)));
}

#[test]
fn plain_type_values_are_returned_as_is() {
    let mut rt = Runtime::new();
    let type_id = rt.register_type(TypeSpec::new("Config")).unwrap();
    rt.set_type_attr(type_id, "limit", Value::Int(100));

    let obj = rt.call(Value::Type(type_id), &[]).unwrap();
    let got = rt.get_attr(obj, "limit").unwrap();
    assert!(matches!(got, Value::Int(100)));
}

#[test]
fn instance_attributes_round_trip_through_the_protocol() {
    let mut rt = Runtime::new();
    let type_id = rt.register_type(TypeSpec::new("Bag")).unwrap();
    let obj = rt.call(Value::Type(type_id), &[]).unwrap();

    rt.set_attr(obj, "count", Value::Int(3)).unwrap();
    assert!(matches!(rt.get_attr(obj, "count").unwrap(), Value::Int(3)));

    rt.del_attr(obj, "count").unwrap();
    let err = rt.get_attr(obj, "count").unwrap_err();
    let ophion::RunError::Exc(exc) = err else {
        panic!("expected AttributeError");
    };
    assert_eq!(exc.exc_type, ExcType::AttributeError);
    assert_eq!(exc.message.as_deref(), Some("'Bag' object has no attribute 'count'"));
}

#[test]
fn attribute_lookup_walks_the_ancestor_chain() {
    let mut rt = Runtime::new();
    let base = rt.register_type(TypeSpec::new("Base")).unwrap();
    rt.set_type_attr(base, "shared", Value::Int(1));
    let derived = rt.register_type(TypeSpec::new("Derived").base(base)).unwrap();
    // The derived type overrides nearest-first.
    rt.set_type_attr(derived, "shared", Value::Int(2));

    let base_obj = rt.call(Value::Type(base), &[]).unwrap();
    let derived_obj = rt.call(Value::Type(derived), &[]).unwrap();
    assert!(matches!(rt.get_attr(base_obj, "shared").unwrap(), Value::Int(1)));
    assert!(matches!(rt.get_attr(derived_obj, "shared").unwrap(), Value::Int(2)));

    assert!(rt.is_subtype(derived, base));
    assert!(!rt.is_subtype(base, derived));
}

#[test]
fn values_without_storage_reject_new_attributes() {
    let mut rt = Runtime::new();
    let err = rt.set_attr(Value::Int(1), "x", Value::Int(2)).unwrap_err();
    let ophion::RunError::Exc(exc) = err else {
        panic!("expected AttributeError");
    };
    assert_eq!(exc.exc_type, ExcType::AttributeError);
}
