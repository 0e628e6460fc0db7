//! End-to-end scenarios through the public facade
//!
//! Each test is one user-visible story: build types, make instances, and
//! check the observable outcome and error messages.

use stratadb_schema::{
    freeze_tree, is_structured_instance, ArrayConstraint, ErrorKind, Fields, Instance,
    InstanceOptions, MappingConfig, MappingType, RecordType, SequenceConfig, SequenceType, Slot,
    SlotDecl, TypeOptions, TypeRegistry, Value, Verdict,
};

fn range_type() -> RecordType {
    RecordType::create(
        [("low", "Integer"), ("high", "Integer")],
        TypeOptions::default()
            .named("Range")
            .validator(|f: &Fields| match (&f["low"], &f["high"]) {
                (Value::Int(lo), Value::Int(hi)) if lo > hi => {
                    Some(format!("low ({}) must not be greater than high ({})", lo, hi))
                }
                _ => None,
            }),
    )
    .unwrap()
}

fn point_and_line() -> (RecordType, RecordType) {
    let point = RecordType::create(
        [("x", "Integer"), ("y", "Integer")],
        TypeOptions::default().named("Point"),
    )
    .unwrap();
    let line = RecordType::create(
        [
            ("a", SlotDecl::from(Slot::member_of(&point))),
            ("b", SlotDecl::from(Slot::member_of(&point))),
        ],
        TypeOptions::default().named("Line"),
    )
    .unwrap();
    (point, line)
}

#[test]
fn record_cross_validator_rolls_back_rejected_write() {
    let r = range_type()
        .new_instance([("low", 10i64), ("high", 20i64)])
        .unwrap();

    r.set("low", 15i64).unwrap();
    assert_eq!(r.get("low").unwrap(), Value::Int(15));

    let err = r.set("low", 100i64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("greater than"));
    assert_eq!(r.get("low").unwrap(), Value::Int(15));
}

#[test]
fn optional_field_accepts_null() {
    let named = RecordType::create([("name", "Optional(String)")], TypeOptions::default()).unwrap();
    let r = named.new_instance([("name", Value::Null)]).unwrap();
    assert_eq!(r.get("name").unwrap(), Value::Null);

    r.set("name", "ada").unwrap();
    assert_eq!(r.get("name").unwrap(), Value::from("ada"));
    assert!(r.set("name", 3i64).is_err());
}

#[test]
fn sequence_write_past_end_is_a_gap_but_append_works() {
    let ints = SequenceType::create(SequenceConfig::default().value_slot("Integer")).unwrap();
    let s = ints.new_instance([2i64, 4, 6]).unwrap();

    let err = s.set(4, 8i64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("contiguous"));
    assert_eq!(s.len(), 3);

    s.push(8i64).unwrap();
    assert_eq!(s.len(), 4);
    assert_eq!(s.get(4).unwrap(), Value::Int(8));
}

#[test]
fn freezing_a_line_freezes_its_points() {
    let (point, line) = point_and_line();
    let a = point.new_instance([("x", 0i64), ("y", 0i64)]).unwrap();
    let b = point.new_instance([("x", 1i64), ("y", 1i64)]).unwrap();
    let l = line
        .new_instance([("a", Value::from(a.clone())), ("b", Value::from(b))])
        .unwrap();

    l.freeze().unwrap();

    let through_line = l.get("a").unwrap();
    let Some(Instance::Record(a_again)) = through_line.as_instance() else {
        panic!("field a holds a Point");
    };
    assert!(a_again.same(&a));
    let err = a_again.set("x", 5i64).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Frozen);
    assert_eq!(a.get("x").unwrap(), Value::Int(0));
}

#[test]
fn array_constraint_count_messages() {
    let slot = ArrayConstraint::default()
        .min_count(3)
        .max_count(5)
        .element(Slot::integer())
        .into_slot()
        .unwrap();

    let empty = slot.validate(&Value::Array(vec![])).unwrap();
    assert!(empty.message().unwrap().contains("at least 3"));

    let six = Value::Array((1..=6).map(Value::Int).collect());
    let too_many = slot.validate(&six).unwrap();
    assert!(too_many.message().unwrap().contains("no more than 5"));

    let four = Value::Array((1..=4).map(Value::Int).collect());
    assert_eq!(slot.validate(&four).unwrap(), Verdict::Accepted(four.clone()));
}

#[test]
fn type_level_operations_on_foreign_values() {
    let (point, line) = point_and_line();
    let p: Value = point
        .new_instance([("x", 0i64), ("y", 0i64)])
        .unwrap()
        .into();

    assert!(is_structured_instance(&p));
    assert!(point.is(&p));
    assert!(!line.is(&p));
    assert_eq!(line.is_frozen(&p).unwrap_err().kind(), ErrorKind::Lookup);

    let (ok, message) = line.validate(&Value::Int(3));
    assert!(!ok);
    assert!(message.unwrap().contains("expected an instance of Line"));
}

#[test]
fn mixed_families_freeze_together() {
    let (point, _) = point_and_line();
    let path = SequenceType::create(
        SequenceConfig::default()
            .value_slot(Slot::member_of(&point))
            .named("Path"),
    )
    .unwrap();
    let atlas = MappingType::create(
        MappingConfig::default()
            .key_slot("String")
            .value_slot(Slot::member_of(&path))
            .named("Atlas"),
    )
    .unwrap();

    let p = point.new_instance([("x", 0i64), ("y", 0i64)]).unwrap();
    let route = path.new_instance([Value::from(p.clone())]).unwrap();
    let m = atlas
        .instantiate([("home", Value::from(route.clone()))], InstanceOptions::default())
        .unwrap();

    let root: Instance = m.clone().into();
    assert_eq!(freeze_tree(&root).unwrap(), root);
    assert!(m.is_frozen());
    assert!(route.is_frozen());
    assert!(p.is_frozen());
    assert_eq!(route.push(p).unwrap_err().kind(), ErrorKind::Frozen);
}

#[test]
fn registry_types_compose_with_programmatic_ones() {
    let (point, _) = point_and_line();
    let mut registry = TypeRegistry::default();
    registry.register(point.clone()).unwrap();

    let pair = RecordType::create_in(
        [("left", "MemberOf(Point)"), ("right", "Optional(MemberOf(Point))")],
        TypeOptions::default().named("Pair"),
        &registry,
    )
    .unwrap();
    let p = point.new_instance([("x", 1i64), ("y", 1i64)]).unwrap();
    let pr = pair.new_instance([("left", Value::from(p))]).unwrap();
    assert_eq!(pr.get("right").unwrap(), Value::Null);
}
