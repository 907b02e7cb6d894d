//! Cast resolution.
//!
//! Decides which conversions between script types are legal and whether they need
//! explicit syntax. The same [`CastDescriptor`] is attached to IR expressions at
//! compile time and applied to values at run time.
//!
//! ## Implicit conversions
//!
//! - Widening numeric conversions (`int` to `long`, `char` to `int`, ...)
//! - Primitive to `def`, and `def` into a primitive slot (checked at run time)
//! - Primitive to its boxed type or one of the box's ancestors
//! - Boxed type to its primitive, optionally followed by widening
//! - Reference upcasts, anything to `def`, and `def` to the top-level object type
//!
//! ## Explicit conversions
//!
//! - Narrowing numeric conversions
//! - Unboxing followed by narrowing
//! - Reference downcasts and `def` to any other host type
//!
//! `boolean` never converts to or from numeric types, and `void` never converts.

use std::fmt;

use sandscript_catalog::Catalog;
use sandscript_core::{
    CompilationError, PrimitiveKind, ScriptFault, ScriptType, Span, TypeHash, Value,
};

/// Representation change performed by a cast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Boxing {
    None,
    Box,
    Unbox,
}

/// What a cast does at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CastKind {
    /// No change.
    Identity,
    /// Primitive to primitive.
    Numeric { from: PrimitiveKind, to: PrimitiveKind },
    /// Primitive to its box (or an ancestor of it).
    Box(PrimitiveKind),
    /// Box to primitive, converting from the boxed kind.
    Unbox { from: PrimitiveKind, to: PrimitiveKind },
    /// Reference to an ancestor type.
    Upcast,
    /// Reference to a descendant type; checked at run time.
    Downcast(TypeHash),
    /// Anything to `def`.
    ToDynamic,
    /// `def` to a concrete type; checked at run time.
    FromDynamic,
}

/// A legal conversion between two script types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CastDescriptor {
    pub from: ScriptType,
    pub to: ScriptType,
    /// Whether explicit cast syntax is required.
    pub explicit: bool,
    pub boxing: Boxing,
    pub kind: CastKind,
}

impl CastDescriptor {
    fn new(
        from: ScriptType,
        to: ScriptType,
        explicit: bool,
        boxing: Boxing,
        kind: CastKind,
    ) -> Self {
        Self {
            from,
            to,
            explicit,
            boxing,
            kind,
        }
    }

    /// Implicit conversion of a dynamically typed value into a `to` slot, checked
    /// when applied. Used for arguments of dynamically dispatched calls.
    pub fn runtime_check(to: ScriptType) -> Self {
        let boxing = if to.is_primitive() { Boxing::Unbox } else { Boxing::None };
        Self::new(ScriptType::Dynamic, to, false, boxing, CastKind::FromDynamic)
    }

    pub fn is_identity(&self) -> bool {
        self.kind == CastKind::Identity
    }

    /// Apply this cast to a runtime value.
    pub fn apply(&self, catalog: &Catalog, value: Value) -> Result<Value, ScriptFault> {
        match self.kind {
            CastKind::Identity | CastKind::Upcast | CastKind::ToDynamic | CastKind::Box(_) => {
                Ok(value)
            }
            CastKind::Numeric { to, .. } => value.convert_to(to),
            CastKind::Unbox { to, .. } => {
                if value.is_null() {
                    return Err(ScriptFault::null_pointer(format!("cannot unbox null into [{to}]")));
                }
                value.convert_to(to)
            }
            CastKind::Downcast(target) => check_reference(catalog, value, target),
            CastKind::FromDynamic => from_dynamic(catalog, value, self.to, self.explicit),
        }
    }
}

impl fmt::Display for CastDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} -> {}{})",
            self.from,
            self.to,
            if self.explicit { ", explicit" } else { "" }
        )
    }
}

fn check_reference(
    catalog: &Catalog,
    value: Value,
    target: TypeHash,
) -> Result<Value, ScriptFault> {
    match value.runtime_type() {
        None => Ok(value),
        Some(actual) if catalog.is_subtype(actual, target) => Ok(value),
        Some(actual) => Err(ScriptFault::class_cast(
            &catalog.type_name(ScriptType::Struct(actual)),
            &catalog.type_name(ScriptType::Struct(target)),
        )),
    }
}

fn from_dynamic(
    catalog: &Catalog,
    value: Value,
    to: ScriptType,
    explicit: bool,
) -> Result<Value, ScriptFault> {
    match to {
        ScriptType::Primitive(kind) => {
            let Some(actual) = value.primitive_kind() else {
                if value.is_null() {
                    return Err(ScriptFault::null_pointer(format!(
                        "cannot unbox null into [{kind}]"
                    )));
                }
                return Err(ScriptFault::class_cast(value.type_label(), kind.name()));
            };
            let allowed = actual == kind
                || actual.widens_to(kind)
                || (explicit && actual.is_numeric() && kind.is_numeric());
            if allowed {
                value.convert_to(kind)
            } else {
                Err(ScriptFault::class_cast(actual.name(), kind.name()))
            }
        }
        ScriptType::Struct(target) => check_reference(catalog, value, target),
        ScriptType::Dynamic => Ok(value),
        ScriptType::Void => Err(ScriptFault::class_cast(value.type_label(), "void")),
    }
}

fn no_cast(catalog: &Catalog, from: ScriptType, to: ScriptType, span: Span) -> CompilationError {
    CompilationError::NoSuchCast {
        from: catalog.type_name(from),
        to: catalog.type_name(to),
        span,
    }
}

/// Resolve the conversion from `from` to `to`.
///
/// With `explicit_allowed` false only implicit conversions succeed.
pub fn resolve_cast(
    catalog: &Catalog,
    from: ScriptType,
    to: ScriptType,
    explicit_allowed: bool,
    span: Span,
) -> Result<CastDescriptor, CompilationError> {
    if from == to {
        return Ok(CastDescriptor::new(from, to, false, Boxing::None, CastKind::Identity));
    }

    let found = match (from, to) {
        (ScriptType::Void, _) | (_, ScriptType::Void) => None,

        (ScriptType::Primitive(a), ScriptType::Primitive(b)) => {
            if a == PrimitiveKind::Bool || b == PrimitiveKind::Bool {
                None
            } else {
                let explicit = !a.widens_to(b);
                let kind = CastKind::Numeric { from: a, to: b };
                Some(CastDescriptor::new(from, to, explicit, Boxing::None, kind))
            }
        }

        (ScriptType::Primitive(_), ScriptType::Dynamic) => {
            Some(CastDescriptor::new(from, to, false, Boxing::Box, CastKind::ToDynamic))
        }

        (ScriptType::Primitive(a), ScriptType::Struct(target)) => catalog
            .is_subtype(a.boxed_hash(), target)
            .then(|| CastDescriptor::new(from, to, false, Boxing::Box, CastKind::Box(a))),

        // Explicit unboxing also admits numeric narrowing once the value is known.
        (ScriptType::Dynamic, ScriptType::Primitive(_)) => Some(CastDescriptor::new(
            from,
            to,
            explicit_allowed,
            Boxing::Unbox,
            CastKind::FromDynamic,
        )),

        (ScriptType::Dynamic, ScriptType::Struct(target)) => {
            if target == catalog.object_type() {
                Some(CastDescriptor::new(from, to, false, Boxing::None, CastKind::Upcast))
            } else {
                Some(CastDescriptor::new(from, to, true, Boxing::None, CastKind::FromDynamic))
            }
        }

        (ScriptType::Struct(_), ScriptType::Dynamic) => {
            Some(CastDescriptor::new(from, to, false, Boxing::None, CastKind::ToDynamic))
        }

        (ScriptType::Struct(source), ScriptType::Primitive(b)) => {
            let unbox = |a, explicit| {
                let kind = CastKind::Unbox { from: a, to: b };
                CastDescriptor::new(from, to, explicit, Boxing::Unbox, kind)
            };
            match PrimitiveKind::from_boxed_hash(source) {
                Some(a) if a == b || a.widens_to(b) => Some(unbox(a, false)),
                Some(a) if a.is_numeric() && b.is_numeric() => Some(unbox(a, true)),
                _ => None,
            }
        }

        (ScriptType::Struct(source), ScriptType::Struct(target)) => {
            if catalog.is_subtype(source, target) {
                Some(CastDescriptor::new(from, to, false, Boxing::None, CastKind::Upcast))
            } else if catalog.is_subtype(target, source) {
                Some(CastDescriptor::new(from, to, true, Boxing::None, CastKind::Downcast(target)))
            } else {
                None
            }
        }

        (ScriptType::Dynamic, ScriptType::Dynamic) => {
            Some(CastDescriptor::new(from, to, false, Boxing::None, CastKind::Identity))
        }
    };

    match found {
        Some(cast) if !cast.explicit || explicit_allowed => Ok(cast),
        _ => Err(no_cast(catalog, from, to, span)),
    }
}

/// Whether `from` converts to `to` without explicit syntax.
pub fn is_implicitly_castable(catalog: &Catalog, from: ScriptType, to: ScriptType) -> bool {
    resolve_cast(catalog, from, to, false, Span::default()).is_ok()
}

/// Result type of numeric promotion for a binary operator, or `None` when the
/// operands are not both numeric after unboxing.
pub fn promote_numeric(lhs: ScriptType, rhs: ScriptType) -> Option<PrimitiveKind> {
    let unbox = |ty: ScriptType| ty.as_primitive().or_else(|| ty.unboxed());
    let (a, b) = (unbox(lhs)?, unbox(rhs)?);
    if !a.is_numeric() || !b.is_numeric() {
        return None;
    }
    Some(promote_kinds(a, b))
}

/// Binary numeric promotion of two numeric kinds.
pub fn promote_kinds(a: PrimitiveKind, b: PrimitiveKind) -> PrimitiveKind {
    let rank = |k: PrimitiveKind| match k {
        PrimitiveKind::Double => 3,
        PrimitiveKind::Float => 2,
        PrimitiveKind::Long => 1,
        _ => 0,
    };
    match rank(a).max(rank(b)) {
        3 => PrimitiveKind::Double,
        2 => PrimitiveKind::Float,
        1 => PrimitiveKind::Long,
        _ => PrimitiveKind::Int,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandscript_catalog::CatalogBuilder;

    fn catalog() -> Catalog {
        CatalogBuilder::new().build().unwrap()
    }

    fn resolve(
        c: &Catalog,
        from: ScriptType,
        to: ScriptType,
        explicit: bool,
    ) -> Result<CastDescriptor, CompilationError> {
        resolve_cast(c, from, to, explicit, Span::default())
    }

    fn ty(catalog: &Catalog, name: &str) -> ScriptType {
        catalog.resolve_script_type(name, Span::default()).unwrap()
    }

    #[test]
    fn numeric_widening_is_implicit() {
        let c = catalog();
        let cast = resolve(&c, ScriptType::INT, ScriptType::LONG, false).unwrap();
        assert!(!cast.explicit);
        assert_eq!(
            cast.kind,
            CastKind::Numeric {
                from: PrimitiveKind::Int,
                to: PrimitiveKind::Long
            }
        );
        assert!(is_implicitly_castable(&c, ScriptType::CHAR, ScriptType::DOUBLE));
    }

    #[test]
    fn narrowing_requires_explicit() {
        let c = catalog();
        assert!(resolve(&c, ScriptType::DOUBLE, ScriptType::INT, false).is_err());
        let cast = resolve(&c, ScriptType::DOUBLE, ScriptType::INT, true).unwrap();
        assert!(cast.explicit);
        assert_eq!(cast.apply(&c, Value::Double(2.7)).unwrap(), Value::Int(2));
    }

    #[test]
    fn boolean_and_void_never_convert() {
        let c = catalog();
        assert!(resolve(&c, ScriptType::BOOLEAN, ScriptType::INT, true).is_err());
        assert!(resolve(&c, ScriptType::INT, ScriptType::BOOLEAN, true).is_err());
        assert!(resolve(&c, ScriptType::Void, ScriptType::Dynamic, true).is_err());
        let err = resolve_cast(&c, ScriptType::Dynamic, ScriptType::Void, true, Span::at(3))
            .unwrap_err();
        assert!(matches!(err, CompilationError::NoSuchCast { ref to, .. } if to == "void"));
    }

    #[test]
    fn every_primitive_round_trips_through_def() {
        let c = catalog();
        let samples = [
            Value::Bool(true),
            Value::Byte(-7),
            Value::Short(1234),
            Value::Char(65),
            Value::Int(-99),
            Value::Long(1 << 40),
            Value::Float(1.5),
            Value::Double(-2.25),
        ];
        for (kind, value) in PrimitiveKind::ALL.into_iter().zip(samples) {
            let prim = ScriptType::Primitive(kind);
            let to_def = resolve(&c, prim, ScriptType::Dynamic, false).unwrap();
            let back = resolve(&c, ScriptType::Dynamic, prim, false).unwrap();
            assert_eq!(to_def.boxing, Boxing::Box);
            assert_eq!(back.boxing, Boxing::Unbox);
            let boxed = to_def.apply(&c, value.clone()).unwrap();
            assert_eq!(boxed.runtime_type(), Some(kind.boxed_hash()));
            assert_eq!(back.apply(&c, boxed).unwrap(), value, "{kind}");

            let boxed_ty = ScriptType::Struct(kind.boxed_hash());
            let boxing = resolve(&c, prim, boxed_ty, false).unwrap();
            let unboxing = resolve(&c, boxed_ty, prim, false).unwrap();
            let boxed = boxing.apply(&c, value.clone()).unwrap();
            assert_eq!(unboxing.apply(&c, boxed).unwrap(), value);
        }
    }

    #[test]
    fn implicit_def_unboxing_rejects_narrowing_at_runtime() {
        let c = catalog();
        let implicit = resolve(&c, ScriptType::Dynamic, ScriptType::INT, false).unwrap();
        assert!(implicit.apply(&c, Value::Double(2.5)).is_err());
        assert_eq!(implicit.apply(&c, Value::Short(3)).unwrap(), Value::Int(3));
        assert!(implicit.apply(&c, Value::Null).is_err());
    }

    #[test]
    fn explicit_def_unboxing_narrows_numbers() {
        let c = catalog();
        let explicit = resolve(&c, ScriptType::Dynamic, ScriptType::INT, true).unwrap();
        assert!(explicit.explicit);
        assert_eq!(explicit.kind, CastKind::FromDynamic);
        assert_eq!(explicit.apply(&c, Value::Double(2.5)).unwrap(), Value::Int(2));
        assert_eq!(explicit.apply(&c, Value::Long(7)).unwrap(), Value::Int(7));
        assert!(explicit.apply(&c, Value::Bool(true)).is_err());
        assert!(explicit.apply(&c, Value::string("2")).is_err());

        let implicit = resolve(&c, ScriptType::Dynamic, ScriptType::INT, false).unwrap();
        assert!(!implicit.explicit);
        assert!(implicit.apply(&c, Value::Double(2.5)).is_err());
    }

    #[test]
    fn unbox_then_widen() {
        let c = catalog();
        let integer = ty(&c, "Integer");
        let cast = resolve(&c, integer, ScriptType::LONG, false).unwrap();
        assert_eq!(cast.apply(&c, Value::Int(4)).unwrap(), Value::Long(4));
        assert!(resolve(&c, integer, ScriptType::SHORT, false).is_err());
        assert!(resolve(&c, integer, ScriptType::SHORT, true).is_ok());
    }

    #[test]
    fn reference_casts() {
        let c = catalog();
        let integer = ty(&c, "Integer");
        let number = ty(&c, "Number");
        let string = ty(&c, "String");
        let up = resolve(&c, integer, number, false).unwrap();
        assert_eq!(up.kind, CastKind::Upcast);
        assert!(resolve(&c, number, integer, false).is_err());
        let down = resolve(&c, number, integer, true).unwrap();
        assert!(down.apply(&c, Value::Int(1)).is_ok());
        assert!(down.apply(&c, Value::Double(1.0)).is_err());
        assert!(resolve(&c, string, integer, true).is_err());
    }

    #[test]
    fn def_to_struct_is_explicit_except_object() {
        let c = catalog();
        let string = ty(&c, "String");
        let object = ty(&c, "Object");
        assert!(resolve(&c, ScriptType::Dynamic, string, false).is_err());
        let cast = resolve(&c, ScriptType::Dynamic, string, true).unwrap();
        assert!(cast.apply(&c, Value::string("x")).is_ok());
        assert!(cast.apply(&c, Value::Int(1)).is_err());
        assert!(is_implicitly_castable(&c, ScriptType::Dynamic, object));
        assert!(is_implicitly_castable(&c, string, ScriptType::Dynamic));
    }

    #[test]
    fn primitive_boxes_into_ancestor() {
        let c = catalog();
        let number = ty(&c, "Number");
        let cast = resolve(&c, ScriptType::INT, number, false).unwrap();
        assert_eq!(cast.kind, CastKind::Box(PrimitiveKind::Int));
        assert!(resolve(&c, ScriptType::INT, ty(&c, "Long"), true).is_err());
    }

    #[test]
    fn promotion() {
        assert_eq!(promote_numeric(ScriptType::BYTE, ScriptType::CHAR), Some(PrimitiveKind::Int));
        assert_eq!(promote_numeric(ScriptType::INT, ScriptType::LONG), Some(PrimitiveKind::Long));
        assert_eq!(
            promote_numeric(
                ScriptType::Struct(PrimitiveKind::Float.boxed_hash()),
                ScriptType::LONG
            ),
            Some(PrimitiveKind::Float)
        );
        assert_eq!(promote_numeric(ScriptType::BOOLEAN, ScriptType::INT), None);
        assert_eq!(promote_numeric(ScriptType::Dynamic, ScriptType::INT), None);
    }
}
