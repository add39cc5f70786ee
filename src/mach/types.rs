/// ## Type descriptors
///
/// Every type in a compilation lives in a [`Types`] arena and is named
/// by a copyable [`TypeId`]. Descriptors reference other descriptors by
/// index only, so the graph may be cyclic through pointers without any
/// shared-ownership knots; named types naturally alias the same index.

/// Ordinal bounds, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubRange {
    min: i64,
    max: i64,
}

impl SubRange {
    /// The widest representable range; sub-range checks are skipped for
    /// variables of this range.
    pub const MAX: SubRange = SubRange {
        min: i64::MIN,
        max: i64::MAX,
    };

    pub fn new(min: i64, max: i64) -> SubRange {
        SubRange { min, max }
    }

    pub fn minimum(&self) -> i64 {
        self.min
    }

    pub fn maximum(&self) -> i64 {
        self.max
    }

    /// Number of values spanned; an array's element count.
    pub fn span(&self) -> usize {
        if self.max < self.min {
            0
        } else {
            (self.max - self.min + 1) as usize
        }
    }
}

/// A record field: name and type, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    typ: TypeId,
}

impl Field {
    pub fn new(name: impl Into<String>, typ: TypeId) -> Field {
        Field {
            name: name.into(),
            typ,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn typ(&self) -> TypeId {
        self.typ
    }
}

/// Index of a descriptor in its [`Types`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(usize);

#[derive(Debug, Clone, PartialEq)]
pub enum TypeDesc {
    Integer { range: SubRange },
    Real,
    Boolean,
    Character,
    Enumeration { range: SubRange, names: Vec<String> },
    Array { index: TypeId, element: TypeId, range: SubRange, size: usize },
    Record { fields: Vec<Field>, size: usize },
    Pointer { pointee: TypeId },
}

/// The descriptor arena. Constructors compute sizes and ordinal ranges;
/// the primitive descriptors and the type of `nil` are pre-seeded.
#[derive(Debug)]
pub struct Types {
    descs: Vec<TypeDesc>,
}

impl Types {
    pub const INTEGER: TypeId = TypeId(0);
    pub const REAL: TypeId = TypeId(1);
    pub const BOOLEAN: TypeId = TypeId(2);
    pub const CHARACTER: TypeId = TypeId(3);
    /// The type of the `nil` literal, compatible with every pointer.
    pub const NIL: TypeId = TypeId(4);

    pub fn new() -> Types {
        Types {
            descs: vec![
                TypeDesc::Integer { range: SubRange::MAX },
                TypeDesc::Real,
                TypeDesc::Boolean,
                TypeDesc::Character,
                TypeDesc::Pointer {
                    pointee: Types::INTEGER,
                },
            ],
        }
    }

    fn add(&mut self, desc: TypeDesc) -> TypeId {
        self.descs.push(desc);
        TypeId(self.descs.len() - 1)
    }

    pub fn get(&self, id: TypeId) -> &TypeDesc {
        &self.descs[id.0]
    }

    pub fn sub_range(&mut self, min: i64, max: i64) -> TypeId {
        self.add(TypeDesc::Integer {
            range: SubRange::new(min, max),
        })
    }

    pub fn enumeration(&mut self, names: Vec<String>) -> TypeId {
        let max = names.len().saturating_sub(1) as i64;
        self.add(TypeDesc::Enumeration {
            range: SubRange::new(0, max),
            names,
        })
    }

    pub fn array(&mut self, index: TypeId, element: TypeId) -> TypeId {
        let range = self.range(index).unwrap_or(SubRange::new(0, 0));
        let size = range.span() * self.size(element);
        self.add(TypeDesc::Array {
            index,
            element,
            range,
            size,
        })
    }

    pub fn record(&mut self, fields: Vec<Field>) -> TypeId {
        let size = fields.iter().map(|f| self.size(f.typ())).sum();
        self.add(TypeDesc::Record { fields, size })
    }

    pub fn pointer(&mut self, pointee: TypeId) -> TypeId {
        self.add(TypeDesc::Pointer { pointee })
    }

    /// Size of a value of this type, in datums.
    pub fn size(&self, id: TypeId) -> usize {
        use TypeDesc::*;
        match self.get(id) {
            Integer { .. } | Real | Boolean | Character | Enumeration { .. } | Pointer { .. } => 1,
            Array { size, .. } | Record { size, .. } => *size,
        }
    }

    /// The ordinal range, for types that have one.
    pub fn range(&self, id: TypeId) -> Option<SubRange> {
        use TypeDesc::*;
        match self.get(id) {
            Integer { range } | Enumeration { range, .. } => Some(*range),
            Boolean => Some(SubRange::new(0, 1)),
            Character => Some(SubRange::new(0, 255)),
            Real | Array { .. } | Record { .. } | Pointer { .. } => None,
        }
    }

    pub fn is_ordinal(&self, id: TypeId) -> bool {
        self.range(id).is_some()
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Integer { .. })
    }

    pub fn is_real(&self, id: TypeId) -> bool {
        matches!(self.get(id), TypeDesc::Real)
    }

    /// Locate a record field by name: its datum offset and type.
    pub fn field(&self, id: TypeId, name: &str) -> Option<(usize, TypeId)> {
        let fields = match self.get(id) {
            TypeDesc::Record { fields, .. } => fields,
            _ => return None,
        };
        let mut offset = 0;
        for field in fields {
            if field.name() == name {
                return Some((offset, field.typ()));
            }
            offset += self.size(field.typ());
        }
        None
    }

    /// Assignment compatibility: same kind with matching structure.
    /// Sub-range bounds never narrow compatibility; they only add
    /// run-time checks.
    pub fn compatible(&self, a: TypeId, b: TypeId) -> bool {
        use TypeDesc::*;
        if a == b {
            return true;
        }
        match (self.get(a), self.get(b)) {
            (Integer { .. }, Integer { .. }) => true,
            (Real, Real) => true,
            (Boolean, Boolean) => true,
            (Character, Character) => true,
            (Enumeration { names: l, .. }, Enumeration { names: r, .. }) => l == r,
            (Array { element: le, .. }, Array { element: re, .. }) => self.compatible(*le, *re),
            (Record { fields: l, .. }, Record { fields: r, .. }) => {
                l.len() == r.len()
                    && l.iter()
                        .zip(r)
                        .all(|(a, b)| a.name() == b.name() && self.compatible(a.typ(), b.typ()))
            }
            (Pointer { pointee: l }, Pointer { pointee: r }) => {
                l == r || a == Types::NIL || b == Types::NIL
            }
            _ => false,
        }
    }

    /// Kind name for diagnostics.
    pub fn name(&self, id: TypeId) -> &'static str {
        use TypeDesc::*;
        match self.get(id) {
            Integer { .. } => "integer",
            Real => "real",
            Boolean => "boolean",
            Character => "char",
            Enumeration { .. } => "enumeration",
            Array { .. } => "array",
            Record { .. } => "record",
            Pointer { .. } => "pointer",
        }
    }
}

impl Default for Types {
    fn default() -> Types {
        Types::new()
    }
}
