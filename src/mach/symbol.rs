use super::{Datum, Level, TypeId, Types};
use std::collections::HashMap;

/// What a name stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymKind {
    Constant,
    Variable,
    Type,
    Procedure,
    Function,
}

/// ## Symbol table entry
///
/// `value` depends on the kind: a constant's datum, a variable's frame
/// offset, or a subroutine's entry address. Subroutines also carry the
/// ordered types of their formal parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SymValue {
    kind: SymKind,
    level: Level,
    value: Datum,
    typ: TypeId,
    params: Vec<TypeId>,
}

impl SymValue {
    pub fn constant(level: Level, value: Datum, typ: TypeId) -> SymValue {
        SymValue {
            kind: SymKind::Constant,
            level,
            value,
            typ,
            params: vec![],
        }
    }

    pub fn variable(level: Level, offset: i64, typ: TypeId) -> SymValue {
        SymValue {
            kind: SymKind::Variable,
            level,
            value: Datum::Integer(offset),
            typ,
            params: vec![],
        }
    }

    pub fn type_def(level: Level, typ: TypeId) -> SymValue {
        SymValue {
            kind: SymKind::Type,
            level,
            value: Datum::Integer(0),
            typ,
            params: vec![],
        }
    }

    /// A procedure or function entry. The entry address is filled in by
    /// `set_value` once the body's `enter` has been emitted; the type is
    /// meaningful only for functions.
    pub fn subroutine(kind: SymKind, level: Level) -> SymValue {
        SymValue {
            kind,
            level,
            value: Datum::Integer(0),
            typ: Types::INTEGER,
            params: vec![],
        }
    }

    pub fn kind(&self) -> SymKind {
        self.kind
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn value(&self) -> Datum {
        self.value
    }

    pub fn typ(&self) -> TypeId {
        self.typ
    }

    pub fn params(&self) -> &[TypeId] {
        &self.params
    }

    pub fn set_value(&mut self, value: Datum) {
        self.value = value;
    }

    pub fn set_type(&mut self, typ: TypeId) {
        self.typ = typ;
    }

    pub fn set_params(&mut self, params: Vec<TypeId>) {
        self.params = params;
    }
}

/// ## Symbol table
///
/// A multimap: one name may be bound at several lexical levels at once,
/// and lookup always answers with the innermost binding. Leaving a
/// block purges every binding made at its level.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: HashMap<String, Vec<SymValue>>,
}

impl SymbolTable {
    pub fn new() -> SymbolTable {
        SymbolTable::default()
    }

    /// Bind `name`. Fails when the name is already bound at the same
    /// level; shadowing an outer level is fine.
    pub fn insert(&mut self, name: &str, value: SymValue) -> bool {
        let versions = self.entries.entry(name.to_string()).or_default();
        if versions.iter().any(|v| v.level() == value.level()) {
            return false;
        }
        versions.push(value);
        true
    }

    /// The innermost visible binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&SymValue> {
        self.entries
            .get(name)?
            .iter()
            .max_by_key(|v| v.level())
    }

    pub fn lookup_mut(&mut self, name: &str) -> Option<&mut SymValue> {
        self.entries
            .get_mut(name)?
            .iter_mut()
            .max_by_key(|v| v.level())
    }

    /// The binding of `name` made at exactly `level`, shadowed or not.
    /// The compiler uses this to fill in a subroutine's entry address
    /// without being fooled by deeper bindings of the same name.
    pub fn lookup_level(&mut self, name: &str, level: Level) -> Option<&mut SymValue> {
        self.entries
            .get_mut(name)?
            .iter_mut()
            .find(|v| v.level() == level)
    }

    /// Erase every binding made at `level`; called when its block ends.
    pub fn purge(&mut self, level: Level) {
        self.entries.retain(|_, versions| {
            versions.retain(|v| v.level() != level);
            !versions.is_empty()
        });
    }
}
