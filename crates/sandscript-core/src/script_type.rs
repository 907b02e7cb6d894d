//! Script-level types.
//!
//! A [`ScriptType`] is what the compiler attaches to every expression. Host types
//! are referenced by their [`TypeHash`]; human-readable names live in the catalog.

use std::fmt;

use crate::{PrimitiveKind, TypeHash};

/// Script-visible name of the dynamic type.
pub const DYNAMIC_TYPE_NAME: &str = "def";

/// Script-visible name of the void type.
pub const VOID_TYPE_NAME: &str = "void";

/// A resolved script type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptType {
    /// No value (return type only).
    Void,
    /// A primitive value type.
    Primitive(PrimitiveKind),
    /// The universal dynamic type; dispatched through the bootstrap.
    Dynamic,
    /// A whitelisted host type.
    Struct(TypeHash),
}

impl ScriptType {
    pub const BOOLEAN: ScriptType = ScriptType::Primitive(PrimitiveKind::Bool);
    pub const BYTE: ScriptType = ScriptType::Primitive(PrimitiveKind::Byte);
    pub const SHORT: ScriptType = ScriptType::Primitive(PrimitiveKind::Short);
    pub const CHAR: ScriptType = ScriptType::Primitive(PrimitiveKind::Char);
    pub const INT: ScriptType = ScriptType::Primitive(PrimitiveKind::Int);
    pub const LONG: ScriptType = ScriptType::Primitive(PrimitiveKind::Long);
    pub const FLOAT: ScriptType = ScriptType::Primitive(PrimitiveKind::Float);
    pub const DOUBLE: ScriptType = ScriptType::Primitive(PrimitiveKind::Double);

    /// Resolve one of the built-in names (`void`, `def`, primitives).
    pub fn builtin(name: &str) -> Option<ScriptType> {
        match name {
            VOID_TYPE_NAME => Some(ScriptType::Void),
            DYNAMIC_TYPE_NAME => Some(ScriptType::Dynamic),
            _ => PrimitiveKind::from_name(name).map(ScriptType::Primitive),
        }
    }

    /// Whether `name` is reserved for a built-in type.
    pub fn is_reserved_name(name: &str) -> bool {
        Self::builtin(name).is_some()
    }

    pub fn is_void(&self) -> bool {
        matches!(self, ScriptType::Void)
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, ScriptType::Dynamic)
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, ScriptType::Primitive(_))
    }

    /// Whether values of this type are references (dynamic or host struct).
    pub fn is_reference(&self) -> bool {
        matches!(self, ScriptType::Dynamic | ScriptType::Struct(_))
    }

    pub fn as_primitive(&self) -> Option<PrimitiveKind> {
        match self {
            ScriptType::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn struct_hash(&self) -> Option<TypeHash> {
        match self {
            ScriptType::Struct(hash) => Some(*hash),
            _ => None,
        }
    }

    /// The primitive this type boxes, if it is a boxed host type.
    pub fn unboxed(&self) -> Option<PrimitiveKind> {
        self.struct_hash().and_then(PrimitiveKind::from_boxed_hash)
    }
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptType::Void => f.write_str(VOID_TYPE_NAME),
            ScriptType::Primitive(kind) => write!(f, "{kind}"),
            ScriptType::Dynamic => f.write_str(DYNAMIC_TYPE_NAME),
            ScriptType::Struct(hash) => write!(f, "struct {hash}"),
        }
    }
}

impl From<PrimitiveKind> for ScriptType {
    fn from(kind: PrimitiveKind) -> Self {
        ScriptType::Primitive(kind)
    }
}
