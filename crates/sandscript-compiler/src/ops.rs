//! Operator semantics shared by static and dynamic evaluation.
//!
//! Statically typed operators arrive with operands already cast to the promoted
//! type; dynamic operators arrive with whatever the receiver held. Both go
//! through the same promotion rules here.

use std::fmt;

use sandscript_core::{PrimitiveKind, ScriptFault, Value};

use crate::cast::promote_kinds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    /// Short-circuit conjunction.
    And,
    /// Short-circuit disjunction.
    Or,
}

impl BinaryOp {
    /// Synthetic operation name passed to the dispatch bootstrap.
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::BitAnd => "and",
            BinaryOp::BitOr => "or",
            BinaryOp::BitXor => "xor",
            BinaryOp::Shl => "lsh",
            BinaryOp::Shr => "rsh",
            BinaryOp::UShr => "ush",
            BinaryOp::And => "land",
            BinaryOp::Or => "lor",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "add" => BinaryOp::Add,
            "sub" => BinaryOp::Sub,
            "mul" => BinaryOp::Mul,
            "div" => BinaryOp::Div,
            "rem" => BinaryOp::Rem,
            "and" => BinaryOp::BitAnd,
            "or" => BinaryOp::BitOr,
            "xor" => BinaryOp::BitXor,
            "lsh" => BinaryOp::Shl,
            "rsh" => BinaryOp::Shr,
            "ush" => BinaryOp::UShr,
            "land" => BinaryOp::And,
            "lor" => BinaryOp::Or,
            _ => return None,
        })
    }

    pub fn is_shift(self) -> bool {
        matches!(self, BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr)
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::And | BinaryOp::Or)
    }

    pub fn is_bitwise(self) -> bool {
        matches!(self, BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Neg => "neg",
            UnaryOp::Plus => "plus",
            UnaryOp::Not => "not",
            UnaryOp::BitNot => "bwnot",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "neg" => UnaryOp::Neg,
            "plus" => UnaryOp::Plus,
            "not" => UnaryOp::Not,
            "bwnot" => UnaryOp::BitNot,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn name(self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "lte",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "gte",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => CompareOp::Eq,
            "ne" => CompareOp::Ne,
            "lt" => CompareOp::Lt,
            "lte" => CompareOp::Le,
            "gt" => CompareOp::Gt,
            "gte" => CompareOp::Ge,
            _ => return None,
        })
    }

    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

// ============================================================================
// Evaluation
// ============================================================================

fn numeric_kind(value: &Value, op: &str) -> Result<PrimitiveKind, ScriptFault> {
    match value.primitive_kind() {
        Some(kind) if kind.is_numeric() => Ok(kind),
        _ if value.is_null() => Err(ScriptFault::null_pointer(format!("null operand for [{op}]"))),
        _ => Err(ScriptFault::class_cast(value.type_label(), "number")),
    }
}

fn division_by_zero() -> ScriptFault {
    ScriptFault::arithmetic("/ by zero")
}

/// Evaluate a non-short-circuit binary operator.
pub fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptFault> {
    if op == BinaryOp::Add && (matches!(lhs, Value::Str(_)) || matches!(rhs, Value::Str(_))) {
        return Ok(Value::string(format!("{lhs}{rhs}")));
    }
    if op.is_logical() || (op.is_bitwise() && matches!(lhs, Value::Bool(_))) {
        let (a, b) = (lhs.as_bool()?, rhs.as_bool()?);
        return Ok(Value::Bool(match op {
            BinaryOp::And | BinaryOp::BitAnd => a && b,
            BinaryOp::Or | BinaryOp::BitOr => a || b,
            _ => a ^ b,
        }));
    }
    if op.is_shift() {
        return shift(op, lhs, rhs);
    }

    let kind = promote_kinds(numeric_kind(lhs, op.name())?, numeric_kind(rhs, op.name())?);
    match kind {
        PrimitiveKind::Int => {
            let (a, b) = (lhs.as_i64()? as i32, rhs.as_i64()? as i32);
            Ok(Value::Int(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(division_by_zero());
                    }
                    a.wrapping_div(b)
                }
                BinaryOp::Rem => {
                    if b == 0 {
                        return Err(division_by_zero());
                    }
                    a.wrapping_rem(b)
                }
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                _ => a ^ b,
            }))
        }
        PrimitiveKind::Long => {
            let (a, b) = (lhs.as_i64()?, rhs.as_i64()?);
            Ok(Value::Long(match op {
                BinaryOp::Add => a.wrapping_add(b),
                BinaryOp::Sub => a.wrapping_sub(b),
                BinaryOp::Mul => a.wrapping_mul(b),
                BinaryOp::Div => {
                    if b == 0 {
                        return Err(division_by_zero());
                    }
                    a.wrapping_div(b)
                }
                BinaryOp::Rem => {
                    if b == 0 {
                        return Err(division_by_zero());
                    }
                    a.wrapping_rem(b)
                }
                BinaryOp::BitAnd => a & b,
                BinaryOp::BitOr => a | b,
                _ => a ^ b,
            }))
        }
        _ => {
            if op.is_bitwise() {
                return Err(ScriptFault::class_cast(kind.name(), "integral type"));
            }
            let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                _ => a % b,
            };
            Ok(if kind == PrimitiveKind::Float {
                Value::Float(result as f32)
            } else {
                Value::Double(result)
            })
        }
    }
}

fn shift(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptFault> {
    let kind = numeric_kind(lhs, op.name())?;
    let distance = rhs.as_i64()?;
    if !kind.is_integral() || !numeric_kind(rhs, op.name())?.is_integral() {
        return Err(ScriptFault::class_cast(kind.name(), "integral type"));
    }
    if kind == PrimitiveKind::Long {
        let (a, d) = (lhs.as_i64()?, (distance & 63) as u32);
        Ok(Value::Long(match op {
            BinaryOp::Shl => a.wrapping_shl(d),
            BinaryOp::Shr => a.wrapping_shr(d),
            _ => ((a as u64) >> d) as i64,
        }))
    } else {
        let (a, d) = (lhs.as_i64()? as i32, (distance & 31) as u32);
        Ok(Value::Int(match op {
            BinaryOp::Shl => a.wrapping_shl(d),
            BinaryOp::Shr => a.wrapping_shr(d),
            _ => ((a as u32) >> d) as i32,
        }))
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, ScriptFault> {
    if op == UnaryOp::Not {
        return Ok(Value::Bool(!operand.as_bool()?));
    }
    let kind = promote_kinds(numeric_kind(operand, op.name())?, PrimitiveKind::Int);
    match (op, kind) {
        (UnaryOp::Plus, _) => operand.convert_to(kind),
        (UnaryOp::Neg, PrimitiveKind::Int) => {
            Ok(Value::Int((operand.as_i64()? as i32).wrapping_neg()))
        }
        (UnaryOp::Neg, PrimitiveKind::Long) => Ok(Value::Long(operand.as_i64()?.wrapping_neg())),
        (UnaryOp::Neg, PrimitiveKind::Float) => Ok(Value::Float(-(operand.as_f64()? as f32))),
        (UnaryOp::Neg, _) => Ok(Value::Double(-operand.as_f64()?)),
        (_, PrimitiveKind::Int) => Ok(Value::Int(!(operand.as_i64()? as i32))),
        (_, PrimitiveKind::Long) => Ok(Value::Long(!operand.as_i64()?)),
        (_, other) => Err(ScriptFault::class_cast(other.name(), "integral type")),
    }
}

pub fn compare(op: CompareOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptFault> {
    let numeric = |v: &Value| v.primitive_kind().is_some_and(PrimitiveKind::is_numeric);
    if numeric(lhs) && numeric(rhs) {
        let kind = promote_kinds(numeric_kind(lhs, op.name())?, numeric_kind(rhs, op.name())?);
        let ordering = if kind.is_integral() {
            lhs.as_i64()?.partial_cmp(&rhs.as_i64()?)
        } else {
            lhs.as_f64()?.partial_cmp(&rhs.as_f64()?)
        };
        return Ok(Value::Bool(match (op, ordering) {
            (CompareOp::Ne, None) => true,
            (_, None) => false,
            (CompareOp::Eq, Some(o)) => o.is_eq(),
            (CompareOp::Ne, Some(o)) => o.is_ne(),
            (CompareOp::Lt, Some(o)) => o.is_lt(),
            (CompareOp::Le, Some(o)) => o.is_le(),
            (CompareOp::Gt, Some(o)) => o.is_gt(),
            (CompareOp::Ge, Some(o)) => o.is_ge(),
        }));
    }
    match op {
        CompareOp::Eq => Ok(Value::Bool(lhs == rhs)),
        CompareOp::Ne => Ok(Value::Bool(lhs != rhs)),
        _ => match (lhs, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                _ => a >= b,
            })),
            _ => Err(ScriptFault::class_cast(lhs.type_label(), "comparable")),
        },
    }
}
