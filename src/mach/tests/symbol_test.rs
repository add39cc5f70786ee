use crate::mach::{Datum, SymKind, SymValue, SymbolTable, Types};

#[test]
fn test_shadowing_finds_innermost() {
    let mut table = SymbolTable::new();
    assert!(table.insert("x", SymValue::variable(0, 4, Types::INTEGER)));
    assert!(table.insert("x", SymValue::variable(2, 5, Types::REAL)));
    assert!(table.insert("x", SymValue::variable(1, 6, Types::BOOLEAN)));

    let found = table.lookup("x").expect("x is bound");
    assert_eq!(found.level(), 2);
    assert_eq!(found.typ(), Types::REAL);
}

#[test]
fn test_same_level_redefinition_fails() {
    let mut table = SymbolTable::new();
    assert!(table.insert("x", SymValue::variable(1, 4, Types::INTEGER)));
    assert!(!table.insert("x", SymValue::variable(1, 5, Types::INTEGER)));
}

#[test]
fn test_purge_uncovers_outer_binding() {
    let mut table = SymbolTable::new();
    table.insert("x", SymValue::variable(0, 4, Types::INTEGER));
    table.insert("x", SymValue::variable(1, 5, Types::REAL));
    table.insert("y", SymValue::variable(1, 6, Types::INTEGER));

    table.purge(1);
    assert_eq!(table.lookup("x").map(|v| v.level()), Some(0));
    assert!(table.lookup("y").is_none());
}

#[test]
fn test_lookup_level_ignores_deeper_bindings() {
    let mut table = SymbolTable::new();
    table.insert("f", SymValue::subroutine(SymKind::Function, 0));
    table.insert("f", SymValue::variable(1, 4, Types::INTEGER));

    let entry = table.lookup_level("f", 0).expect("the function is bound");
    assert_eq!(entry.kind(), SymKind::Function);
    entry.set_value(Datum::Integer(17));
    assert_eq!(
        table.lookup_level("f", 0).map(|v| v.value()),
        Some(Datum::Integer(17))
    );
}
