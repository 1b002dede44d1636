use tern_runtime::reflect::{
    self, basic, error_type, map_of, pointer_to, slice_of, ChanDir, Kind, Signature, TypeBuilder,
};
use tern_runtime::{
    deep_equal, make_cell, new_error, type_for, type_of, value_of, FuncValue, MapValue, StructValue, Type, Typed,
    Value,
};

fn person() -> Type {
    TypeBuilder::named_struct("main", "Person")
        .tagged_field("Name", basic(Kind::String), r#"json:"name""#)
        .tagged_field("Age", basic(Kind::Int), r#"json:"age,omitempty""#)
        .method("Greeting", Signature::new().result(basic(Kind::String)))
        .register()
}

fn alice() -> StructValue {
    StructValue::new(&person(), [("Name", Value::from("Alice")), ("Age", Value::Int(30))]).unwrap()
}

#[test]
fn test_struct_round_trip() {
    person();
    let ty = type_of(&Value::Struct(alice())).unwrap();
    assert_eq!(ty.num_field().unwrap(), 2);
    assert_eq!(ty.field(0).unwrap().name, "Name");
    assert_eq!(ty.field(1).unwrap().ty, basic(Kind::Int));
    assert_eq!(ty.field(1).unwrap().tag.get("json"), "age,omitempty");
    assert_eq!(ty.kind(), Kind::Struct);
    assert_eq!(ty.name(), "Person");
    assert_eq!(ty.to_string(), "main.Person");
    assert_eq!(type_for("main.Person").unwrap(), ty);
}

#[test]
fn test_kind_violations_fault() {
    let p = basic(Kind::Int).num_field().unwrap_err();
    assert_eq!(p.message(), "reflect: NumField of non-struct type int");
    assert!(value_of(1i64).field(0).is_err());
    assert!(basic(Kind::Int).implements(&basic(Kind::Int)).is_err());
}

#[test]
fn test_implements() {
    let greeter = TypeBuilder::named_interface("main", "Greeter")
        .method("Greeting", Signature::new().result(basic(Kind::String)))
        .register();
    assert!(person().implements(&greeter).unwrap());
    assert!(pointer_to(person()).implements(&greeter).unwrap());
    assert!(!basic(Kind::String).implements(&greeter).unwrap());
    assert!(!person().implements(&error_type()).unwrap());
    assert_eq!(person().num_method(), 1);
    assert_eq!(person().method(0).unwrap().name, "Greeting");
}

#[test]
fn test_set_through_cell() {
    let cell = make_cell(Value::Struct(alice()));
    let v = value_of(cell.clone()).elem().unwrap();
    assert_eq!(v.kind(), Kind::Struct);
    v.field_by_name("Age").unwrap().set_int(31).unwrap();
    let age = cell.get().as_struct().unwrap().get("Age").unwrap();
    assert_eq!(age.as_int(), Some(31));

    let copy = value_of(Value::Struct(alice()));
    assert!(copy.field(1).unwrap().set_int(1).is_err());
}

#[test]
fn test_interface_boxes_named_scalars() {
    let celsius = TypeBuilder::named("main", "Celsius", &basic(Kind::Float64)).register();
    let v = value_of(Value::Typed(Typed::new(celsius.clone(), Value::Float(21.5))));
    assert_eq!(v.kind(), Kind::Float64);
    assert_eq!(v.typ().unwrap(), celsius);
    assert_eq!(v.float().unwrap(), 21.5);
    let boxed = v.interface().unwrap();
    assert_eq!(type_of(&boxed).unwrap(), celsius);
    assert!(deep_equal(&boxed, &Value::Typed(Typed::new(celsius, Value::Float(21.5)))));
    assert!(!deep_equal(&boxed, &Value::Float(21.5)));
}

#[test]
fn test_composite_descriptors() {
    let m = map_of(basic(Kind::String), slice_of(basic(Kind::Int)));
    assert_eq!(m.to_string(), "map[string][]int");
    assert_eq!(m.key().unwrap(), basic(Kind::String));
    assert_eq!(m.elem().unwrap().elem().unwrap(), basic(Kind::Int));
    let c = reflect::chan_of(ChanDir::Recv, basic(Kind::Int));
    assert_eq!(c.to_string(), "<-chan int");
    assert_eq!(c.chan_dir().unwrap(), ChanDir::Recv);
    assert!(!m.comparable());
    assert!(person().comparable());
}

#[test]
fn test_recursive_type_by_name() {
    let node = TypeBuilder::named_struct("list", "Node")
        .field("Value", basic(Kind::Int))
        .field("Next", pointer_to("list.Node"))
        .register();
    let next = node.field(1).unwrap().ty;
    assert_eq!(next.kind(), Kind::Pointer);
    assert_eq!(next.elem().unwrap(), node);
    assert_eq!(next.to_string(), "*list.Node");
}

#[test]
fn test_map_range_over_value() {
    let ty = map_of(basic(Kind::String), basic(Kind::Int));
    let m = MapValue::with_entries(&ty, [(Value::from("one"), Value::Int(1)), (Value::from("two"), Value::Int(2))])
        .unwrap();
    let mut it = value_of(m).map_range().unwrap();
    let mut total = 0;
    while it.next().unwrap() {
        total += it.value().unwrap().int().unwrap();
    }
    assert_eq!(total, 3);
}

#[test]
fn test_call_variadic() {
    let sig = Signature::new().param(basic(Kind::String)).variadic(basic(Kind::Int)).result(basic(Kind::Int));
    let sum = FuncValue::with_type(reflect::func_of_sig(sig), |args| {
        let base = args[0].as_str().map_or(0, |s| s.len() as i64);
        let rest: i64 = args[1].as_slice().map(|s| s.to_vec()).unwrap_or_default().iter().filter_map(Value::as_int).sum();
        Ok(vec![Value::Int(base + rest)])
    });
    let f = value_of(sum);
    let out = f.call(&[value_of("ab"), value_of(3i64), value_of(4i64)]).unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].int().unwrap(), 9);
    assert!(f.call(&[]).is_err());
    assert!(f.call(&[value_of(1i64)]).is_err());
}

#[test]
fn test_error_dynamic_types() {
    let err = new_error("boom");
    assert_eq!(type_of(&Value::Error(err)).unwrap().to_string(), "*errors.errorString");
    assert!(type_of(&Value::Nil).is_none());
}
