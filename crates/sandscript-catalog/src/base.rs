//! The base whitelist every catalog starts from.
//!
//! Covers the `lang` package (the top-level object type, `Number`, the boxed
//! primitives and `String`) and the standard functional interfaces of
//! `lang.function`. Boxed values share the representation of their primitive, so
//! the natives here accept primitive [`Value`] variants as receivers.

use sandscript_core::{
    FunctionValue, NativeFn, PrimitiveKind, RuntimeFaultKind, ScriptFault, TypeHash, Value, arg,
};

use crate::{Whitelist, WhitelistClass, WhitelistField, WhitelistMethod};

/// Origin reported for errors raised by the base whitelist.
pub const BASE_ORIGIN: &str = "sandscript.base";

fn native<F>(f: F) -> NativeFn
where
    F: Fn(&[Value]) -> Result<Value, ScriptFault> + Send + Sync + 'static,
{
    NativeFn::new(f)
}

fn none() -> Vec<String> {
    Vec::new()
}

/// Java-style string hash, stable across runs.
fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
}

fn hash_code(value: &Value) -> i32 {
    match value {
        Value::Null => 0,
        Value::Bool(b) => {
            if *b {
                1231
            } else {
                1237
            }
        }
        Value::Byte(v) => i32::from(*v),
        Value::Short(v) => i32::from(*v),
        Value::Char(v) => i32::from(*v),
        Value::Int(v) => *v,
        Value::Long(v) => (*v ^ (*v >> 32)) as i32,
        Value::Float(v) => v.to_bits() as i32,
        Value::Double(v) => {
            let bits = v.to_bits();
            (bits ^ (bits >> 32)) as i32
        }
        Value::Str(s) => string_hash(s),
        Value::Object(obj) => obj.type_hash().as_u64() as i32,
        Value::Function(func) => func.interface.as_u64() as i32,
    }
}

fn receiver_str(args: &[Value]) -> Result<&str, ScriptFault> {
    arg(args, 0)?.as_str()
}

fn index(args: &[Value], i: usize) -> Result<usize, ScriptFault> {
    let raw = arg(args, i)?.as_i64()?;
    usize::try_from(raw).map_err(|_| {
        ScriptFault::runtime(RuntimeFaultKind::IllegalArgument, format!("index {raw} out of range"))
    })
}

fn char_range(s: &str, begin: usize, end: usize) -> Result<String, ScriptFault> {
    let units: Vec<u16> = s.encode_utf16().collect();
    if begin > end || end > units.len() {
        return Err(ScriptFault::runtime(
            RuntimeFaultKind::IllegalArgument,
            format!("range [{begin}, {end}) out of bounds for length {}", units.len()),
        ));
    }
    Ok(String::from_utf16_lossy(&units[begin..end]))
}

fn parse_number(args: &[Value], kind: PrimitiveKind) -> Result<Value, ScriptFault> {
    let text = arg(args, 0)?.as_str()?.trim();
    let bad = || {
        ScriptFault::runtime(
            RuntimeFaultKind::IllegalArgument,
            format!("for input string: \"{text}\""),
        )
    };
    match kind {
        PrimitiveKind::Int => text.parse::<i32>().map(Value::Int).map_err(|_| bad()),
        PrimitiveKind::Long => text.parse::<i64>().map(Value::Long).map_err(|_| bad()),
        _ => text.parse::<f64>().map(Value::Double).map_err(|_| bad()),
    }
}

fn call_function(args: &[Value]) -> Result<Value, ScriptFault> {
    match arg(args, 0)? {
        Value::Function(func) => func.target.call(&args[1..]),
        Value::Null => Err(ScriptFault::null_pointer("invoking a null function reference")),
        other => Err(ScriptFault::class_cast(other.type_label(), "function")),
    }
}

// ============================================================================
// lang
// ============================================================================

fn object() -> WhitelistClass {
    WhitelistClass::new("lang.Object")
        .method(
            WhitelistMethod::new("toString", none(), "String")
                .native(native(|args: &[Value]| Ok(Value::string(arg(args, 0)?.to_string())))),
        )
        .method(
            WhitelistMethod::new("equals", ["def"], "boolean")
                .native(native(|args: &[Value]| Ok(Value::Bool(arg(args, 0)? == arg(args, 1)?)))),
        )
        .method(
            WhitelistMethod::new("hashCode", none(), "int")
                .native(native(|args: &[Value]| Ok(Value::Int(hash_code(arg(args, 0)?))))),
        )
}

fn number() -> WhitelistClass {
    let mut class = WhitelistClass::new("lang.Number");
    for (name, kind) in [
        ("byteValue", PrimitiveKind::Byte),
        ("shortValue", PrimitiveKind::Short),
        ("intValue", PrimitiveKind::Int),
        ("longValue", PrimitiveKind::Long),
        ("floatValue", PrimitiveKind::Float),
        ("doubleValue", PrimitiveKind::Double),
    ] {
        class = class.method(
            WhitelistMethod::new(name, none(), kind.name())
                .native(native(move |args: &[Value]| arg(args, 0)?.convert_to(kind))),
        );
    }
    class
}

fn boxed(kind: PrimitiveKind) -> WhitelistClass {
    let host = kind.boxed_host_name();
    let short = host.rsplit('.').next().unwrap_or(host);
    let mut class = WhitelistClass::new(host).method(
        WhitelistMethod::static_method("valueOf", [kind.name()], short)
            .native(native(move |args: &[Value]| arg(args, 0)?.convert_to(kind))),
    );
    match kind {
        PrimitiveKind::Bool => {
            class = class.method(
                WhitelistMethod::new("booleanValue", none(), "boolean")
                    .native(native(|args: &[Value]| Ok(Value::Bool(arg(args, 0)?.as_bool()?)))),
            );
        }
        PrimitiveKind::Char => {
            class = class.method(
                WhitelistMethod::new("charValue", none(), "char")
                    .native(native(|args: &[Value]| arg(args, 0)?.convert_to(PrimitiveKind::Char))),
            );
        }
        _ => class = class.extends("Number"),
    }
    match kind {
        PrimitiveKind::Int => {
            class = class
                .method(
                    WhitelistMethod::static_method("parseInt", ["String"], "int")
                        .native(native(|args: &[Value]| parse_number(args, PrimitiveKind::Int))),
                )
                .field(
                    WhitelistField::new("MAX_VALUE", "int")
                        .static_field()
                        .final_field()
                        .getter(native(|_: &[Value]| Ok(Value::Int(i32::MAX)))),
                )
                .field(
                    WhitelistField::new("MIN_VALUE", "int")
                        .static_field()
                        .final_field()
                        .getter(native(|_: &[Value]| Ok(Value::Int(i32::MIN)))),
                );
        }
        PrimitiveKind::Long => {
            class = class
                .method(
                    WhitelistMethod::static_method("parseLong", ["String"], "long")
                        .native(native(|args: &[Value]| parse_number(args, PrimitiveKind::Long))),
                )
                .field(
                    WhitelistField::new("MAX_VALUE", "long")
                        .static_field()
                        .final_field()
                        .getter(native(|_: &[Value]| Ok(Value::Long(i64::MAX)))),
                );
        }
        PrimitiveKind::Double => {
            class = class.method(
                WhitelistMethod::static_method("parseDouble", ["String"], "double")
                    .native(native(|args: &[Value]| parse_number(args, PrimitiveKind::Double))),
            );
        }
        _ => {}
    }
    class
}

fn string() -> WhitelistClass {
    WhitelistClass::new("lang.String")
        .method(WhitelistMethod::new("length", none(), "int").native(native(|args: &[Value]| {
            Ok(Value::Int(receiver_str(args)?.encode_utf16().count() as i32))
        })))
        .method(
            WhitelistMethod::new("isEmpty", none(), "boolean")
                .native(native(|args: &[Value]| Ok(Value::Bool(receiver_str(args)?.is_empty())))),
        )
        .method(WhitelistMethod::new("charAt", ["int"], "char").native(native(|args: &[Value]| {
            let s = receiver_str(args)?;
            let i = index(args, 1)?;
            s.encode_utf16().nth(i).map(Value::Char).ok_or_else(|| {
                let message = format!("index {i} out of range");
                ScriptFault::runtime(RuntimeFaultKind::IllegalArgument, message)
            })
        })))
        .method(
            WhitelistMethod::new("substring", ["int"], "String").native(native(|args: &[Value]| {
                let s = receiver_str(args)?;
                let end = s.encode_utf16().count();
                char_range(s, index(args, 1)?, end).map(Value::string)
            })),
        )
        .method(
            WhitelistMethod::new("substring", ["int", "int"], "String").native(native(
                |args: &[Value]| {
                    let (begin, end) = (index(args, 1)?, index(args, 2)?);
                    char_range(receiver_str(args)?, begin, end).map(Value::string)
                },
            )),
        )
        .method(
            WhitelistMethod::new("concat", ["String"], "String").native(native(|args: &[Value]| {
                Ok(Value::string(format!("{}{}", receiver_str(args)?, arg(args, 1)?.as_str()?)))
            })),
        )
        .method(
            WhitelistMethod::new("contains", ["String"], "boolean").native(native(|args: &[Value]| {
                Ok(Value::Bool(receiver_str(args)?.contains(arg(args, 1)?.as_str()?)))
            })),
        )
        .method(
            WhitelistMethod::new("startsWith", ["String"], "boolean").native(native(
                |args: &[Value]| {
                    let prefix = arg(args, 1)?.as_str()?;
                    Ok(Value::Bool(receiver_str(args)?.starts_with(prefix)))
                },
            )),
        )
        .method(WhitelistMethod::new("indexOf", ["String"], "int").native(native(|args: &[Value]| {
            let s = receiver_str(args)?;
            let needle = arg(args, 1)?.as_str()?;
            Ok(Value::Int(
                s.find(needle)
                    .map(|byte| s[..byte].encode_utf16().count() as i32)
                    .unwrap_or(-1),
            ))
        })))
        .method(
            WhitelistMethod::new("toUpperCase", none(), "String")
                .native(native(|args: &[Value]| {
                    Ok(Value::string(receiver_str(args)?.to_uppercase()))
                })),
        )
        .method(
            WhitelistMethod::new("toLowerCase", none(), "String")
                .native(native(|args: &[Value]| {
                    Ok(Value::string(receiver_str(args)?.to_lowercase()))
                })),
        )
        .method(
            WhitelistMethod::new("trim", none(), "String")
                .native(native(|args: &[Value]| Ok(Value::string(receiver_str(args)?.trim())))),
        )
        .method(
            WhitelistMethod::static_method("valueOf", ["def"], "String")
                .native(native(|args: &[Value]| Ok(Value::string(arg(args, 0)?.to_string())))),
        )
}

// ============================================================================
// lang.function
// ============================================================================

fn functional(name: &str, method: &str, params: &[&str], returns: &str) -> WhitelistClass {
    WhitelistClass::interface(name).functional().method(
        WhitelistMethod::new(method, params.iter().copied(), returns).native(native(call_function)),
    )
}

fn predicate() -> WhitelistClass {
    let predicate_hash = TypeHash::from_name("lang.function.Predicate");
    functional("lang.function.Predicate", "test", &["def"], "boolean").method(
        WhitelistMethod::new("negate", none(), "Predicate")
            .default_method()
            .native(native(move |args: &[Value]| {
                let inner = arg(args, 0)?.clone();
                Ok(Value::Function(FunctionValue {
                    interface: predicate_hash,
                    target: NativeFn::new(move |rest: &[Value]| {
                        let mut call = Vec::with_capacity(rest.len() + 1);
                        call.push(inner.clone());
                        call.extend_from_slice(rest);
                        Ok(Value::Bool(!call_function(&call)?.as_bool()?))
                    }),
                }))
            })),
    )
}

/// The whitelist every catalog is seeded with.
pub fn base_whitelist() -> Whitelist {
    let mut whitelist = Whitelist::new(BASE_ORIGIN)
        .class(object())
        .class(number())
        .class(string());
    for kind in PrimitiveKind::ALL {
        whitelist = whitelist.class(boxed(kind));
    }
    whitelist
        .class(functional("lang.function.Function", "apply", &["def"], "def"))
        .class(functional("lang.function.BiFunction", "apply", &["def", "def"], "def"))
        .class(functional("lang.function.Supplier", "get", &[], "def"))
        .class(functional("lang.function.Consumer", "accept", &["def"], "void"))
        .class(predicate())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CatalogBuilder;

    #[test]
    fn base_builds_without_conflicts() {
        let catalog = CatalogBuilder::new().build().unwrap();
        assert!(catalog.inheritance_conflicts().is_empty());
        let names = [
            "Object",
            "Number",
            "Integer",
            "Character",
            "String",
            "Function",
            "Predicate",
        ];
        for name in names {
            assert!(catalog.lookup_struct_by_name(name).is_some(), "missing {name}");
        }
        assert!(catalog.lookup_struct_by_name("lang.function.Supplier").is_some());
    }

    #[test]
    fn boxed_types_inherit_number() {
        let catalog = CatalogBuilder::new().build().unwrap();
        let integer = catalog.lookup_struct(PrimitiveKind::Int.boxed_hash()).unwrap();
        let int_value = integer.method("intValue", 0).unwrap();
        assert_eq!(int_value.invoke(&[Value::Int(9)]).unwrap(), Value::Int(9));
        assert_eq!(
            integer.method("doubleValue", 0).unwrap().invoke(&[Value::Int(9)]).unwrap(),
            Value::Double(9.0)
        );
        assert!(integer.method("equals", 1).is_some());
    }

    #[test]
    fn functional_interfaces() {
        let catalog = CatalogBuilder::new().build().unwrap();
        let function = catalog.lookup_struct_by_name("Function").unwrap();
        assert_eq!(function.functional_method.as_ref().unwrap().name, "apply");
        let predicate = catalog.lookup_struct_by_name("Predicate").unwrap();
        assert_eq!(predicate.functional_method.as_ref().unwrap().name, "test");
    }

    #[test]
    fn predicate_negate() {
        let catalog = CatalogBuilder::new().build().unwrap();
        let predicate = catalog.lookup_struct_by_name("Predicate").unwrap();
        let is_even = Value::Function(FunctionValue {
            interface: predicate.hash,
            target: NativeFn::new(|args: &[Value]| {
                Ok(Value::Bool(arg(args, 0)?.as_i64()? % 2 == 0))
            }),
        });
        let negated = predicate.method("negate", 0).unwrap().invoke(&[is_even]).unwrap();
        let test = predicate.method("test", 1).unwrap();
        assert_eq!(test.invoke(&[negated.clone(), Value::Int(3)]).unwrap(), Value::Bool(true));
        assert_eq!(test.invoke(&[negated, Value::Int(4)]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn string_natives() {
        let catalog = CatalogBuilder::new().build().unwrap();
        let string = catalog.lookup_struct_by_name("String").unwrap();
        let s = Value::string("hello");
        let length = string.method("length", 0).unwrap();
        assert_eq!(length.invoke(&[s.clone()]).unwrap(), Value::Int(5));
        assert_eq!(
            string
                .method("substring", 2)
                .unwrap()
                .invoke(&[s.clone(), Value::Int(1), Value::Int(3)])
                .unwrap(),
            Value::string("el")
        );
        let substring = string.method("substring", 2).unwrap();
        assert!(substring.invoke(&[s, Value::Int(4), Value::Int(9)]).is_err());
        assert!(string.getters.contains_key("empty"));
    }

    #[test]
    fn parse_int_rejects_garbage() {
        let catalog = CatalogBuilder::new().build().unwrap();
        let parse = catalog
            .lookup_static_method(PrimitiveKind::Int.boxed_hash(), "parseInt", 1)
            .unwrap();
        assert_eq!(parse.invoke(&[Value::string(" 42 ")]).unwrap(), Value::Int(42));
        assert!(parse.invoke(&[Value::string("4x2")]).is_err());
    }

    #[test]
    fn string_hash_matches_java() {
        assert_eq!(string_hash("abc"), 96354);
        assert_eq!(string_hash(""), 0);
    }
}
