use crate::mach::types::{Field, SubRange};
use crate::mach::{TypeId, Types};

#[test]
fn test_primitive_sizes() {
    let types = Types::new();
    assert_eq!(types.size(Types::INTEGER), 1);
    assert_eq!(types.size(Types::REAL), 1);
    assert_eq!(types.size(Types::BOOLEAN), 1);
    assert_eq!(types.size(Types::CHARACTER), 1);
    assert_eq!(types.size(Types::NIL), 1);
}

#[test]
fn test_array_size_is_span_times_element() {
    let mut types = Types::new();
    let index = types.sub_range(1, 10);
    let arr = types.array(index, Types::REAL);
    assert_eq!(types.size(arr), 10);

    let matrix = types.array(index, arr);
    assert_eq!(types.size(matrix), 100);
}

#[test]
fn test_record_size_is_field_sum() {
    let mut types = Types::new();
    let index = types.sub_range(0, 3);
    let arr = types.array(index, Types::INTEGER);
    let rec = types.record(vec![
        Field::new("tag", Types::CHARACTER),
        Field::new("data", arr),
    ]);
    assert_eq!(types.size(rec), 5);
    assert_eq!(types.field(rec, "tag"), Some((0, Types::CHARACTER)));
    assert_eq!(types.field(rec, "data"), Some((1, arr)));
    assert_eq!(types.field(rec, "missing"), None);
}

#[test]
fn test_ordinal_ranges() {
    let mut types = Types::new();
    assert_eq!(types.range(Types::INTEGER), Some(SubRange::MAX));
    assert_eq!(types.range(Types::BOOLEAN), Some(SubRange::new(0, 1)));
    assert_eq!(types.range(Types::REAL), None);

    let digits = types.sub_range(0, 9);
    let range = types.range(digits).expect("sub-range is ordinal");
    assert_eq!((range.minimum(), range.maximum(), range.span()), (0, 9, 10));

    let rgb = types.enumeration(vec!["red".into(), "green".into(), "blue".into()]);
    assert!(types.is_ordinal(rgb));
    assert_eq!(types.range(rgb), Some(SubRange::new(0, 2)));
}

#[test]
fn test_compatibility() {
    let mut types = Types::new();
    let small = types.sub_range(1, 5);
    // sub-range bounds never narrow compatibility
    assert!(types.compatible(Types::INTEGER, small));
    assert!(!types.compatible(Types::INTEGER, Types::REAL));

    let index = types.sub_range(1, 3);
    let ints = types.array(index, Types::INTEGER);
    let ints2 = types.array(index, Types::INTEGER);
    let reals = types.array(index, Types::REAL);
    assert!(types.compatible(ints, ints2));
    assert!(!types.compatible(ints, reals));

    // differing index bounds only move the run-time checks, they never
    // make two arrays of the same element type incompatible
    let wider = types.sub_range(1, 5);
    let ints5 = types.array(wider, Types::INTEGER);
    assert!(types.compatible(ints, ints5));
    assert!(!types.compatible(ints5, reals));

    let p_int: TypeId = types.pointer(Types::INTEGER);
    let p_real = types.pointer(Types::REAL);
    assert!(!types.compatible(p_int, p_real));
    // nil is assignable to any pointer
    assert!(types.compatible(p_int, Types::NIL));
    assert!(types.compatible(Types::NIL, p_real));
}
