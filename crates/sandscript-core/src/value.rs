//! Runtime values exchanged with host implementations.
//!
//! [`Value`] is the representation used by native member implementations, the
//! dispatch runtime and the reference evaluator. A primitive stored in a dynamic
//! slot keeps its primitive variant but reports its boxed host type as runtime type,
//! which is what the dispatch guards key on.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::{NativeFn, PrimitiveKind, ScriptFault, TypeHash};

/// Host name of the top-level object type.
pub const OBJECT_HOST_NAME: &str = "lang.Object";

/// Host name of the string type.
pub const STRING_HOST_NAME: &str = "lang.String";

/// An opaque host object with its whitelisted type identity.
#[derive(Clone)]
pub struct HostObject {
    type_hash: TypeHash,
    data: Arc<dyn Any + Send + Sync>,
}

impl HostObject {
    pub fn new<T: Any + Send + Sync>(type_hash: TypeHash, data: T) -> Self {
        Self {
            type_hash,
            data: Arc::new(data),
        }
    }

    pub fn type_hash(&self) -> TypeHash {
        self.type_hash
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.data.downcast_ref::<T>()
    }

    /// Whether two handles point at the same host object.
    pub fn ptr_eq(&self, other: &HostObject) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostObject")
            .field("type_hash", &self.type_hash)
            .finish_non_exhaustive()
    }
}

/// A callable produced from a function reference, tagged with its interface type.
#[derive(Clone, Debug)]
pub struct FunctionValue {
    pub interface: TypeHash,
    pub target: NativeFn,
}

/// A runtime value.
#[derive(Clone, Debug)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Str(Arc<str>),
    Object(HostObject),
    Function(FunctionValue),
}

impl Value {
    pub fn string(s: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(s.as_ref()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The primitive kind held by this value, if any.
    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        Some(match self {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::Byte(_) => PrimitiveKind::Byte,
            Value::Short(_) => PrimitiveKind::Short,
            Value::Char(_) => PrimitiveKind::Char,
            Value::Int(_) => PrimitiveKind::Int,
            Value::Long(_) => PrimitiveKind::Long,
            Value::Float(_) => PrimitiveKind::Float,
            Value::Double(_) => PrimitiveKind::Double,
            _ => return None,
        })
    }

    /// The host type this value dispatches as. `None` for null.
    pub fn runtime_type(&self) -> Option<TypeHash> {
        match self {
            Value::Null => None,
            Value::Str(_) => Some(TypeHash::from_name(STRING_HOST_NAME)),
            Value::Object(obj) => Some(obj.type_hash()),
            Value::Function(func) => Some(func.interface),
            other => other.primitive_kind().map(PrimitiveKind::boxed_hash),
        }
    }

    /// Short description used in fault messages.
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Str(_) => "String",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            other => other.primitive_kind().map_or("unknown", PrimitiveKind::name),
        }
    }

    pub fn as_bool(&self) -> Result<bool, ScriptFault> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(ScriptFault::class_cast(other.type_label(), "boolean")),
        }
    }

    /// Integral view of a numeric value (floats truncate toward zero).
    pub fn as_i64(&self) -> Result<i64, ScriptFault> {
        match self {
            Value::Byte(v) => Ok(i64::from(*v)),
            Value::Short(v) => Ok(i64::from(*v)),
            Value::Char(v) => Ok(i64::from(*v)),
            Value::Int(v) => Ok(i64::from(*v)),
            Value::Long(v) => Ok(*v),
            Value::Float(v) => Ok(*v as i64),
            Value::Double(v) => Ok(*v as i64),
            Value::Null => Err(ScriptFault::null_pointer("unboxing a null value")),
            other => Err(ScriptFault::class_cast(other.type_label(), "long")),
        }
    }

    pub fn as_f64(&self) -> Result<f64, ScriptFault> {
        match self {
            Value::Float(v) => Ok(f64::from(*v)),
            Value::Double(v) => Ok(*v),
            other => other.as_i64().map(|v| v as f64),
        }
    }

    pub fn as_str(&self) -> Result<&str, ScriptFault> {
        match self {
            Value::Str(s) => Ok(s),
            Value::Null => Err(ScriptFault::null_pointer("dereferencing a null String")),
            other => Err(ScriptFault::class_cast(other.type_label(), "String")),
        }
    }

    /// Numeric conversion into `kind`, with primitive truncation semantics.
    pub fn convert_to(&self, kind: PrimitiveKind) -> Result<Value, ScriptFault> {
        if kind != PrimitiveKind::Bool && matches!(self, Value::Bool(_)) {
            return Err(ScriptFault::class_cast("boolean", kind.name()));
        }
        Ok(match kind {
            PrimitiveKind::Bool => Value::Bool(self.as_bool()?),
            PrimitiveKind::Byte => Value::Byte(self.as_i64()? as i8),
            PrimitiveKind::Short => Value::Short(self.as_i64()? as i16),
            PrimitiveKind::Char => Value::Char(self.as_i64()? as u16),
            PrimitiveKind::Int => Value::Int(self.as_i64()? as i32),
            PrimitiveKind::Long => Value::Long(self.as_i64()?),
            PrimitiveKind::Float => Value::Float(self.as_f64()? as f32),
            PrimitiveKind::Double => Value::Double(self.as_f64()?),
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.target.ptr_eq(&b.target),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Char(v) => match char::from_u32(u32::from(*v)) {
                Some(c) => write!(f, "{c}"),
                None => write!(f, "\\u{v:04x}"),
            },
            Value::Int(v) => write!(f, "{v}"),
            Value::Long(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Object(obj) => write!(f, "object@{}", obj.type_hash()),
            Value::Function(func) => write!(f, "function@{}", func.interface),
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    u16 => Char,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_dispatch_as_boxed() {
        assert_eq!(
            Value::Int(3).runtime_type(),
            Some(TypeHash::from_name("lang.Integer"))
        );
        assert_eq!(
            Value::string("x").runtime_type(),
            Some(TypeHash::from_name(STRING_HOST_NAME))
        );
        assert_eq!(Value::Null.runtime_type(), None);
    }

    #[test]
    fn numeric_conversion_truncates() {
        assert_eq!(
            Value::Double(3.9).convert_to(PrimitiveKind::Int).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            Value::Int(300).convert_to(PrimitiveKind::Byte).unwrap(),
            Value::Byte(44)
        );
        assert_eq!(
            Value::Char(65).convert_to(PrimitiveKind::Long).unwrap(),
            Value::Long(65)
        );
    }

    #[test]
    fn boolean_does_not_convert_to_numeric() {
        assert!(Value::Bool(true).convert_to(PrimitiveKind::Int).is_err());
        assert!(Value::Int(1).convert_to(PrimitiveKind::Bool).is_err());
    }

    #[test]
    fn host_objects_compare_by_identity() {
        let hash = TypeHash::from_name("util.Thing");
        let a = HostObject::new(hash, 1u32);
        let b = HostObject::new(hash, 1u32);
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a.clone()), Value::Object(b));
        assert_eq!(a.downcast_ref::<u32>(), Some(&1));
    }
}
