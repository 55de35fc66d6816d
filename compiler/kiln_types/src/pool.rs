//! Interned type handles.
//!
//! Every type is a `TypeId` into one [`TypePool`]. Primitives sit at fixed
//! indices so they compare equal across pools, which lets the intrinsic
//! registry be shared between independent targets. Type identity is handle
//! equality: there is no structural comparison and no implicit widening.

use std::fmt;

use kiln_ir::AtomId;
use rustc_hash::FxHashMap;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub const BOOL: Self = Self(0);
    pub const I8: Self = Self(1);
    pub const I16: Self = Self(2);
    pub const I32: Self = Self(3);
    /// `int`, a 64-bit signed integer.
    pub const INT: Self = Self(4);
    /// `byte`, an 8-bit unsigned integer.
    pub const BYTE: Self = Self(5);
    pub const U16: Self = Self(6);
    pub const U32: Self = Self(7);
    /// `uint`, a 64-bit unsigned integer.
    pub const UINT: Self = Self(8);
    pub const F32: Self = Self(9);
    /// `float`, a 64-bit IEEE-754 float.
    pub const FLOAT: Self = Self(10);
    pub const STR: Self = Self(11);
    pub const VOID: Self = Self(12);
    /// Parameter wildcard. Only legal in parameter position.
    pub const ANY: Self = Self(13);
    /// Placeholder after a reported failure; unifies with everything so one
    /// mistake is not reported twice.
    pub const ERROR: Self = Self(14);

    pub const PRIMITIVE_COUNT: u32 = 15;

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::PRIMITIVE_COUNT
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match PRIMITIVES.get(self.index()) {
            Some((_, name)) => write!(f, "{name}"),
            None => write!(f, "type#{}", self.0),
        }
    }
}

/// Width and signedness of an integer type.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct IntKind {
    pub bits: u8,
    pub signed: bool,
}

impl IntKind {
    pub const fn new(bits: u8, signed: bool) -> Self {
        IntKind { bits, signed }
    }

    /// Smallest and largest representable value.
    pub fn bounds(self) -> (i128, i128) {
        let bits = u32::from(self.bits);
        if self.signed {
            let max = (1i128 << (bits - 1)) - 1;
            (-max - 1, max)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    pub fn contains(self, value: i128) -> bool {
        let (lo, hi) = self.bounds();
        (lo..=hi).contains(&value)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum TypeData {
    Bool,
    Int(IntKind),
    Float { bits: u8 },
    Str,
    Void,
    Any,
    Error,
    /// Instances of a class atom.
    Class(AtomId),
    Function { params: Box<[TypeId]>, ret: TypeId },
}

static PRIMITIVES: [(TypeData, &str); TypeId::PRIMITIVE_COUNT as usize] = [
    (TypeData::Bool, "bool"),
    (TypeData::Int(IntKind::new(8, true)), "i8"),
    (TypeData::Int(IntKind::new(16, true)), "i16"),
    (TypeData::Int(IntKind::new(32, true)), "i32"),
    (TypeData::Int(IntKind::new(64, true)), "int"),
    (TypeData::Int(IntKind::new(8, false)), "byte"),
    (TypeData::Int(IntKind::new(16, false)), "u16"),
    (TypeData::Int(IntKind::new(32, false)), "u32"),
    (TypeData::Int(IntKind::new(64, false)), "uint"),
    (TypeData::Float { bits: 32 }, "f32"),
    (TypeData::Float { bits: 64 }, "float"),
    (TypeData::Str, "str"),
    (TypeData::Void, "void"),
    (TypeData::Any, "any"),
    (TypeData::Error, "<error>"),
];

/// Owner of every type of one compilation target.
#[derive(Clone, Debug)]
pub struct TypePool {
    types: Vec<TypeData>,
    lookup: FxHashMap<TypeData, TypeId>,
}

impl TypePool {
    pub fn new() -> Self {
        let mut pool = TypePool {
            types: Vec::with_capacity(64),
            lookup: FxHashMap::default(),
        };
        for (data, _) in &PRIMITIVES {
            pool.intern(data.clone());
        }
        pool
    }

    pub fn intern(&mut self, data: TypeData) -> TypeId {
        if let Some(&id) = self.lookup.get(&data) {
            return id;
        }
        let raw = u32::try_from(self.types.len()).unwrap_or(u32::MAX);
        let id = TypeId(raw);
        self.types.push(data.clone());
        self.lookup.insert(data, id);
        id
    }

    pub fn class(&mut self, atom: AtomId) -> TypeId {
        self.intern(TypeData::Class(atom))
    }

    pub fn function(&mut self, params: &[TypeId], ret: TypeId) -> TypeId {
        self.intern(TypeData::Function {
            params: params.into(),
            ret,
        })
    }

    /// Data for `id`; unknown handles read as [`TypeData::Error`].
    pub fn get(&self, id: TypeId) -> &TypeData {
        self.types.get(id.index()).unwrap_or(&TypeData::Error)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Primitive type spelled `name` in source.
    pub fn primitive_by_name(name: &str) -> Option<TypeId> {
        let id = match name {
            "bool" => TypeId::BOOL,
            "i8" => TypeId::I8,
            "i16" => TypeId::I16,
            "i32" => TypeId::I32,
            "i64" | "int" => TypeId::INT,
            "u8" | "byte" => TypeId::BYTE,
            "u16" => TypeId::U16,
            "u32" => TypeId::U32,
            "u64" | "uint" => TypeId::UINT,
            "f32" => TypeId::F32,
            "f64" | "float" => TypeId::FLOAT,
            "str" => TypeId::STR,
            "void" => TypeId::VOID,
            "any" => TypeId::ANY,
            _ => return None,
        };
        Some(id)
    }

    pub fn int_kind(&self, id: TypeId) -> Option<IntKind> {
        match self.get(id) {
            TypeData::Int(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn float_bits(&self, id: TypeId) -> Option<u8> {
        match self.get(id) {
            TypeData::Float { bits } => Some(*bits),
            _ => None,
        }
    }

    pub fn is_integer(&self, id: TypeId) -> bool {
        self.int_kind(id).is_some()
    }

    pub fn is_float(&self, id: TypeId) -> bool {
        self.float_bits(id).is_some()
    }

    pub fn is_numeric(&self, id: TypeId) -> bool {
        self.is_integer(id) || self.is_float(id)
    }

    /// Types operated on directly by opcodes rather than through
    /// `operator` overloads.
    pub fn is_builtin_operand(&self, id: TypeId) -> bool {
        matches!(
            self.get(id),
            TypeData::Bool | TypeData::Int(_) | TypeData::Float { .. } | TypeData::Str
        )
    }

    pub fn class_atom(&self, id: TypeId) -> Option<AtomId> {
        match self.get(id) {
            TypeData::Class(atom) => Some(*atom),
            _ => None,
        }
    }

    pub fn signature(&self, id: TypeId) -> Option<(&[TypeId], TypeId)> {
        match self.get(id) {
            TypeData::Function { params, ret } => Some((params, *ret)),
            _ => None,
        }
    }

    /// Whether a value of `from` may be converted to `to` at all.
    ///
    /// Numbers convert among themselves, `bool` and integers convert both
    /// ways, scalars render to `str`, and `str` parses to numbers (which may
    /// still fail at run time).
    pub fn cast_allowed(&self, from: TypeId, to: TypeId) -> bool {
        if from == to {
            return true;
        }
        match (self.get(from), self.get(to)) {
            (TypeData::Int(_) | TypeData::Float { .. }, TypeData::Int(_) | TypeData::Float { .. })
            | (TypeData::Bool, TypeData::Int(_))
            | (TypeData::Int(_), TypeData::Bool)
            | (TypeData::Bool | TypeData::Int(_) | TypeData::Float { .. }, TypeData::Str)
            | (TypeData::Str, TypeData::Int(_) | TypeData::Float { .. }) => true,
            _ => false,
        }
    }

    /// Source spelling of `id`. Classes render through `class_name`.
    pub fn describe(&self, id: TypeId, class_name: &dyn Fn(AtomId) -> String) -> String {
        if let Some((_, name)) = PRIMITIVES.get(id.index()) {
            return (*name).to_string();
        }
        match self.get(id) {
            TypeData::Class(atom) => class_name(*atom),
            TypeData::Function { params, ret } => {
                let params: Vec<_> = params.iter().map(|p| self.describe(*p, class_name)).collect();
                format!("fn({}) -> {}", params.join(", "), self.describe(*ret, class_name))
            }
            _ => format!("{id:?}"),
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}
