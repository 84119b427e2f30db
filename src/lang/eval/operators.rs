use std::cmp::Ordering;
use std::convert::TryFrom;
use std::sync::Arc;

use super::collection::CollectionInstance;
use super::error::{EvalError, EvalErrorKind};
use super::value::Value;
use crate::lang::ast::{BinaryOperator, UnaryOperator, ValueKind};

/// Coerces `value` to the representation of `kind`. Used both for operand
/// promotion and for argument/result conversion to primitive types.
pub fn coerce(value: &Value, kind: ValueKind) -> Result<Value, EvalError> {
    if value.kind() == kind {
        return Ok(value.clone());
    }
    if let Value::Collection(_) = value {
        return Err(EvalError::unsupported(format!("cannot convert a collection to {}", kind)));
    }

    let failed = || EvalError::unsupported(format!("cannot convert '{}' to {}", value, kind));
    let result = match kind {
        ValueKind::Void => Value::Void,
        ValueKind::Boolean => match value {
            Value::String(v) => match v.trim() {
                "true" => Value::Boolean(true),
                "false" | "" => Value::Boolean(false),
                _ => return Err(failed()),
            },
            other => Value::Boolean(other.is_truthy()),
        },
        ValueKind::Byte => match value {
            Value::Void => Value::Byte(0),
            other => Value::Byte(other.integral().ok_or_else(failed)? as u8),
        },
        ValueKind::Int => match value {
            Value::Void => Value::Int(0),
            other => Value::Int(other.integral().ok_or_else(failed)? as i32),
        },
        ValueKind::Long => match value {
            Value::Void => Value::Long(0),
            other => Value::Long(other.integral().ok_or_else(failed)?),
        },
        ValueKind::Double => match value {
            Value::Void => Value::Double(0.0),
            Value::Double(v) => Value::Double(*v),
            Value::String(v) => Value::Double(v.trim().parse().map_err(|_| failed())?),
            other => Value::Double(other.integral().ok_or_else(failed)? as f64),
        },
        ValueKind::Char => match value {
            Value::Void => Value::Char('\0'),
            Value::String(v) => {
                let mut chars = v.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => return Err(failed()),
                }
            },
            other => {
                let code = other.integral().ok_or_else(failed)?;
                let code = u32::try_from(code).map_err(|_| failed())?;
                Value::Char(std::char::from_u32(code).ok_or_else(failed)?)
            },
        },
        ValueKind::String => Value::string(value.to_string()),
        ValueKind::Collection => return Err(failed()),
    };
    Ok(result)
}

pub fn apply_binary_operator(lhs: &Value, op: BinaryOperator, rhs: &Value) -> Result<Value, EvalError> {
    use BinaryOperator as BO;

    if op.is_logical() {
        let result = match op {
            BO::LogicalAnd => lhs.is_truthy() && rhs.is_truthy(),
            _ => lhs.is_truthy() || rhs.is_truthy(),
        };
        return Ok(Value::Boolean(result));
    }

    if lhs.is_collection() || rhs.is_collection() {
        return apply_collection_operator(lhs, op, rhs);
    }

    let kind = std::cmp::max(lhs.kind(), rhs.kind());
    if kind == ValueKind::String && (op == BO::ShiftLeft || op == BO::ShiftRight) {
        // The shift amount keeps its numeric meaning for strings
        return apply_string_shift(&coerce(lhs, kind)?, op, rhs);
    }

    let lhs = coerce(lhs, kind)?;
    let rhs = coerce(rhs, kind)?;

    if op.is_relational() {
        return apply_relational_operator(&lhs, op, &rhs);
    }

    match (&lhs, &rhs) {
        (Value::Void, Value::Void) => Ok(Value::Void),
        (Value::Boolean(l), Value::Boolean(r)) => match op {
            BO::BitwiseAnd => Ok(Value::Boolean(*l & *r)),
            BO::BitwiseOr => Ok(Value::Boolean(*l | *r)),
            BO::BitwiseXor => Ok(Value::Boolean(*l ^ *r)),
            _ => Err(unsupported(op, kind)),
        },
        (Value::Byte(l), Value::Byte(r)) => apply_byte_operator(*l, op, *r),
        (Value::Int(l), Value::Int(r)) => apply_int_operator(*l, op, *r),
        (Value::Long(l), Value::Long(r)) => apply_long_operator(*l, op, *r),
        (Value::Double(l), Value::Double(r)) => apply_double_operator(*l, op, *r),
        (Value::Char(l), Value::Char(r)) => {
            let code = apply_long_operator(*l as i64, op, *r as i64)?;
            coerce(&code, ValueKind::Char)
        },
        (Value::String(l), Value::String(r)) => apply_string_operator(l, op, r),
        _ => Err(EvalError::new(
            EvalErrorKind::Internal,
            format!("operands of '{}' were not promoted to a common kind", op),
        )),
    }
}

fn unsupported(op: BinaryOperator, kind: ValueKind) -> EvalError {
    EvalError::unsupported(format!("operator '{}' is not defined for {} operands", op, kind))
}

fn apply_collection_operator(lhs: &Value, op: BinaryOperator, rhs: &Value) -> Result<Value, EvalError> {
    if op.is_relational() {
        return Err(EvalError::usage(format!("relational operator '{}' applied to a collection", op)));
    }
    if op != BinaryOperator::Add {
        return Err(unsupported(op, ValueKind::Collection));
    }

    let result = match (lhs, rhs) {
        (Value::Collection(l), Value::Collection(r)) => l.concat(r)?,
        (Value::Collection(l), scalar) => l.append(scalar.clone())?,
        (scalar, Value::Collection(r)) => {
            CollectionInstance::from_values(vec![scalar.clone()]).concat(r)?
        },
        _ => unreachable!(),
    };
    Ok(Value::Collection(Arc::new(result)))
}

fn apply_relational_operator(lhs: &Value, op: BinaryOperator, rhs: &Value) -> Result<Value, EvalError> {
    use BinaryOperator as BO;

    let ordering = match (lhs, rhs) {
        (Value::Void, Value::Void) => Some(Ordering::Equal),
        (Value::Boolean(l), Value::Boolean(r)) => Some(l.cmp(r)),
        (Value::Byte(l), Value::Byte(r)) => Some(l.cmp(r)),
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Long(l), Value::Long(r)) => Some(l.cmp(r)),
        (Value::Double(l), Value::Double(r)) => l.partial_cmp(r),
        (Value::Char(l), Value::Char(r)) => match op {
            BO::EqualIgnoreCase | BO::NotEqualIgnoreCase | BO::LessThanIgnoreCase |
            BO::LessThanEqualIgnoreCase | BO::GreaterThanIgnoreCase |
            BO::GreaterThanEqualIgnoreCase => {
                Some(l.to_lowercase().cmp(r.to_lowercase()))
            },
            _ => Some(l.cmp(r)),
        },
        (Value::String(l), Value::String(r)) => match op {
            BO::EqualIgnoreCase | BO::NotEqualIgnoreCase | BO::LessThanIgnoreCase |
            BO::LessThanEqualIgnoreCase | BO::GreaterThanIgnoreCase |
            BO::GreaterThanEqualIgnoreCase => {
                Some(l.to_lowercase().cmp(&r.to_lowercase()))
            },
            _ => Some(l.cmp(r)),
        },
        _ => return Err(EvalError::usage(format!("cannot compare '{}' and '{}'", lhs, rhs))),
    };

    let result = match (op, ordering) {
        (BO::NotEqual, None) | (BO::NotEqualIgnoreCase, None) => true,
        (_, None) => false,
        (BO::Equal, Some(o)) | (BO::EqualIgnoreCase, Some(o)) => o == Ordering::Equal,
        (BO::NotEqual, Some(o)) | (BO::NotEqualIgnoreCase, Some(o)) => o != Ordering::Equal,
        (BO::LessThan, Some(o)) | (BO::LessThanIgnoreCase, Some(o)) => o == Ordering::Less,
        (BO::LessThanEqual, Some(o)) | (BO::LessThanEqualIgnoreCase, Some(o)) => o != Ordering::Greater,
        (BO::GreaterThan, Some(o)) | (BO::GreaterThanIgnoreCase, Some(o)) => o == Ordering::Greater,
        (BO::GreaterThanEqual, Some(o)) | (BO::GreaterThanEqualIgnoreCase, Some(o)) => o != Ordering::Less,
        (op, _) => unreachable!("apply_relational_operator on non-relational {:?}", op),
    };
    Ok(Value::Boolean(result))
}

fn shift_amount(rhs: &Value) -> Result<u32, EvalError> {
    match rhs.integral() {
        Some(amount) if amount >= 0 => Ok(std::cmp::min(amount, u32::MAX as i64) as u32),
        _ => Err(EvalError::usage(format!("'{}' is not a valid shift amount", rhs))),
    }
}

fn apply_byte_operator(lhs: u8, op: BinaryOperator, rhs: u8) -> Result<Value, EvalError> {
    use BinaryOperator as BO;

    // Bytes are unsigned: mask before shifting and truncate the result again
    let masked = lhs as u32 & 0xff;
    let result = match op {
        BO::Add => lhs.wrapping_add(rhs),
        BO::Subtract => lhs.wrapping_sub(rhs),
        BO::Multiply => lhs.wrapping_mul(rhs),
        BO::Divide => lhs.checked_div(rhs).ok_or_else(division_by_zero)?,
        BO::Modulo => lhs.checked_rem(rhs).ok_or_else(division_by_zero)?,
        BO::Power => lhs.wrapping_pow(rhs as u32),
        BO::ShiftLeft => (masked.checked_shl(rhs as u32).unwrap_or(0) & 0xff) as u8,
        BO::ShiftRight | BO::UnsignedShiftRight => {
            (masked.checked_shr(rhs as u32).unwrap_or(0) & 0xff) as u8
        },
        BO::BitwiseAnd => lhs & rhs,
        BO::BitwiseOr => lhs | rhs,
        BO::BitwiseXor => lhs ^ rhs,
        _ => return Err(unsupported(op, ValueKind::Byte)),
    };
    Ok(Value::Byte(result))
}

fn apply_int_operator(lhs: i32, op: BinaryOperator, rhs: i32) -> Result<Value, EvalError> {
    use BinaryOperator as BO;

    let result = match op {
        BO::Add => lhs.wrapping_add(rhs),
        BO::Subtract => lhs.wrapping_sub(rhs),
        BO::Multiply => lhs.wrapping_mul(rhs),
        BO::Divide => lhs.checked_div(rhs).ok_or_else(division_by_zero)?,
        BO::Modulo => lhs.checked_rem(rhs).ok_or_else(division_by_zero)?,
        BO::Power => integer_power(lhs as i64, rhs as i64) as i32,
        BO::ShiftLeft => lhs.wrapping_shl(rhs as u32),
        BO::ShiftRight => lhs.wrapping_shr(rhs as u32),
        BO::UnsignedShiftRight => (lhs as u32).wrapping_shr(rhs as u32) as i32,
        BO::BitwiseAnd => lhs & rhs,
        BO::BitwiseOr => lhs | rhs,
        BO::BitwiseXor => lhs ^ rhs,
        _ => return Err(unsupported(op, ValueKind::Int)),
    };
    Ok(Value::Int(result))
}

fn apply_long_operator(lhs: i64, op: BinaryOperator, rhs: i64) -> Result<Value, EvalError> {
    use BinaryOperator as BO;

    let result = match op {
        BO::Add => lhs.wrapping_add(rhs),
        BO::Subtract => lhs.wrapping_sub(rhs),
        BO::Multiply => lhs.wrapping_mul(rhs),
        BO::Divide => lhs.checked_div(rhs).ok_or_else(division_by_zero)?,
        BO::Modulo => lhs.checked_rem(rhs).ok_or_else(division_by_zero)?,
        BO::Power => integer_power(lhs, rhs),
        BO::ShiftLeft => lhs.wrapping_shl(rhs as u32),
        BO::ShiftRight => lhs.wrapping_shr(rhs as u32),
        BO::UnsignedShiftRight => (lhs as u64).wrapping_shr(rhs as u32) as i64,
        BO::BitwiseAnd => lhs & rhs,
        BO::BitwiseOr => lhs | rhs,
        BO::BitwiseXor => lhs ^ rhs,
        _ => return Err(unsupported(op, ValueKind::Long)),
    };
    Ok(Value::Long(result))
}

fn integer_power(base: i64, exponent: i64) -> i64 {
    if exponent < 0 {
        return match base {
            1 => 1,
            -1 => if exponent % 2 == 0 { 1 } else { -1 },
            _ => 0,
        };
    }
    base.wrapping_pow(std::cmp::min(exponent, u32::MAX as i64) as u32)
}

fn division_by_zero() -> EvalError {
    EvalError::usage("division by zero")
}

fn apply_double_operator(lhs: f64, op: BinaryOperator, rhs: f64) -> Result<Value, EvalError> {
    use BinaryOperator as BO;

    let result = match op {
        BO::Add => lhs + rhs,
        BO::Subtract => lhs - rhs,
        BO::Multiply => lhs * rhs,
        BO::Divide => lhs / rhs,
        BO::Modulo => lhs % rhs,
        BO::Power => lhs.powf(rhs),
        _ => return Err(unsupported(op, ValueKind::Double)),
    };
    Ok(Value::Double(result))
}

fn apply_string_operator(lhs: &str, op: BinaryOperator, rhs: &str) -> Result<Value, EvalError> {
    use BinaryOperator as BO;

    match op {
        BO::Add => Ok(Value::from(format!("{}{}", lhs, rhs))),
        BO::Multiply => {
            let needs_space = match (lhs.chars().last(), rhs.chars().next()) {
                (Some(l), Some(r)) => !l.is_whitespace() && !r.is_whitespace(),
                _ => false,
            };
            let separator = if needs_space { " " } else { "" };
            Ok(Value::from(format!("{}{}{}", lhs, separator, rhs)))
        },
        BO::Subtract => {
            if rhs.is_empty() {
                return Ok(Value::string(lhs));
            }
            Ok(Value::from(lhs.replace(rhs, "")))
        },
        BO::UnsignedShiftRight => {
            Err(EvalError::usage("operator '>>>' is not defined for strings"))
        },
        _ => Err(unsupported(op, ValueKind::String)),
    }
}

fn apply_string_shift(lhs: &Value, op: BinaryOperator, rhs: &Value) -> Result<Value, EvalError> {
    let text = lhs.as_str().unwrap_or_default();
    let amount = shift_amount(rhs)? as usize;
    let num_chars = text.chars().count();
    let result: String = match op {
        BinaryOperator::ShiftLeft => text.chars().skip(amount).collect(),
        _ => text.chars().take(num_chars.saturating_sub(amount)).collect(),
    };
    Ok(Value::from(result))
}

pub fn apply_unary_operator(op: UnaryOperator, value: &Value) -> Result<Value, EvalError> {
    use UnaryOperator as UO;

    match op {
        UO::LogicalNot => match value {
            Value::Collection(_) => Err(EvalError::unsupported("operator '!' applied to a collection")),
            other => Ok(Value::Boolean(!other.is_truthy())),
        },
        UO::Negate => match value {
            Value::Void => Ok(Value::Void),
            Value::Byte(v) => Ok(Value::Byte(v.wrapping_neg())),
            Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
            Value::Long(v) => Ok(Value::Long(v.wrapping_neg())),
            Value::Double(v) => Ok(Value::Double(-v)),
            other => Err(EvalError::unsupported(
                format!("operator '-' is not defined for {} operands", other.kind()),
            )),
        },
        UO::BitFlip => bit_flip(value),
    }
}

fn bit_flip(value: &Value) -> Result<Value, EvalError> {
    match value {
        Value::Collection(collection) => {
            Ok(Value::Collection(Arc::new(collection.map_values(bit_flip)?)))
        },
        Value::Boolean(v) => Ok(Value::Boolean(!v)),
        Value::Byte(v) => Ok(Value::Byte(!v)),
        Value::Int(v) => Ok(Value::Int(!v)),
        Value::Long(v) => Ok(Value::Long(!v)),
        Value::Char(v) => {
            let flipped = !(*v as u32) & 0xffff;
            match std::char::from_u32(flipped) {
                Some(c) => Ok(Value::Char(c)),
                None => Err(EvalError::unsupported(
                    format!("complement of {:?} is not a valid character", v),
                )),
            }
        },
        other => Err(EvalError::unsupported(
            format!("operator '~' is not defined for {} operands", other.kind()),
        )),
    }
}
