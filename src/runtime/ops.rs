//! Operator semantics

use std::cmp::Ordering;

use super::value::{Exception, ExceptionKind, Value};
use crate::script::ast::{BinOp, UnaryOp};

fn overflow() -> Exception {
    Exception::new(ExceptionKind::OverflowError, "integer overflow")
}

fn unsupported(op: BinOp, left: &Value, right: &Value) -> Exception {
    Exception::type_error(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        _ => None,
    }
}

/// Largest sequence `seq * n` may build, in items (bytes for strings)
const MAX_REPEAT_LEN: usize = 1 << 28;

/// Repetition count for `seq * n`; negative counts give an empty sequence
fn repeat_count(len: usize, times: i64) -> Result<usize, Exception> {
    let times = usize::try_from(times).unwrap_or(0);
    if len == 0 {
        return Ok(0);
    }
    match len.checked_mul(times) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(times),
        _ => Err(Exception::new(ExceptionKind::OverflowError, "repeated sequence is too long")),
    }
}

fn repeat<T: Clone>(items: &[T], times: i64) -> Result<Vec<T>, Exception> {
    let times = repeat_count(items.len(), times)?;
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend_from_slice(items);
    }
    Ok(out)
}

/// Evaluate a non-short-circuit binary operator
pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, Exception> {
    use Value::*;
    match op {
        BinOp::Eq => return Ok(Bool(left == right)),
        BinOp::Ne => return Ok(Bool(left != right)),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let ordering = compare(op, left, right)?;
            let result = match (op, ordering) {
                (_, Option::None) => false,
                (BinOp::Lt, Some(o)) => o == Ordering::Less,
                (BinOp::Gt, Some(o)) => o == Ordering::Greater,
                (BinOp::Le, Some(o)) => o != Ordering::Greater,
                (_, Some(o)) => o != Ordering::Less,
            };
            return Ok(Bool(result));
        }
        BinOp::In => return contains(right, left).map(Bool),
        BinOp::NotIn => return contains(right, left).map(|found| Bool(!found)),
        _ => {}
    }

    match (op, left, right) {
        (BinOp::Add, Int(a), Int(b)) => a.checked_add(*b).map(Int).ok_or_else(overflow),
        (BinOp::Sub, Int(a), Int(b)) => a.checked_sub(*b).map(Int).ok_or_else(overflow),
        (BinOp::Mul, Int(a), Int(b)) => a.checked_mul(*b).map(Int).ok_or_else(overflow),
        (BinOp::FloorDiv, Int(a), Int(b)) => {
            if *b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let q = a.checked_div(*b).ok_or_else(overflow)?;
            Ok(Int(if (a % b != 0) && ((*a < 0) != (*b < 0)) { q - 1 } else { q }))
        }
        (BinOp::Mod, Int(a), Int(b)) => {
            if *b == 0 {
                return Err(zero_division("integer division or modulo by zero"));
            }
            let r = a.checked_rem(*b).ok_or_else(overflow)?;
            Ok(Int(if r != 0 && ((r < 0) != (*b < 0)) { r + b } else { r }))
        }
        (BinOp::Pow, Int(a), Int(b)) if *b >= 0 => {
            let exp = u32::try_from(*b).map_err(|_| overflow())?;
            a.checked_pow(exp).map(Int).ok_or_else(overflow)
        }
        (BinOp::Pow, Int(0), Int(_)) => {
            Err(zero_division("0 cannot be raised to a negative power"))
        }
        (BinOp::Add, Str(a), Str(b)) => Ok(Str(format!("{}{}", a, b))),
        (BinOp::Mul, Str(s), Int(n)) | (BinOp::Mul, Int(n), Str(s)) => {
            Ok(Str(s.repeat(repeat_count(s.len(), *n)?)))
        }
        (BinOp::Add, List(a), List(b)) => {
            let mut items = a.borrow().clone();
            items.extend(b.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Mul, List(items), Int(n)) | (BinOp::Mul, Int(n), List(items)) => {
            Ok(Value::list(repeat(items.borrow().as_slice(), *n)?))
        }
        (BinOp::Add, Tuple(a), Tuple(b)) => {
            let mut items = a.as_ref().clone();
            items.extend(b.iter().cloned());
            Ok(Value::tuple(items))
        }
        (BinOp::Mul, Tuple(items), Int(n)) | (BinOp::Mul, Int(n), Tuple(items)) => {
            Ok(Value::tuple(repeat(items.as_slice(), *n)?))
        }
        _ => {
            let (a, b) = match (as_float(left), as_float(right)) {
                (Some(a), Some(b)) => (a, b),
                _ => return Err(unsupported(op, left, right)),
            };
            float_binary(op, a, b).ok_or_else(|| unsupported(op, left, right))?
        }
    }
}

fn zero_division(message: &str) -> Exception {
    Exception::new(ExceptionKind::ZeroDivisionError, message)
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Option<Result<Value, Exception>> {
    let result = match op {
        BinOp::Add => Ok(a + b),
        BinOp::Sub => Ok(a - b),
        BinOp::Mul => Ok(a * b),
        BinOp::Div if b == 0.0 => Err(zero_division("division by zero")),
        BinOp::Div => Ok(a / b),
        BinOp::FloorDiv if b == 0.0 => Err(zero_division("float floor division by zero")),
        BinOp::FloorDiv => Ok((a / b).floor()),
        BinOp::Mod if b == 0.0 => Err(zero_division("float modulo")),
        BinOp::Mod => Ok(a - b * (a / b).floor()),
        BinOp::Pow if a == 0.0 && b < 0.0 => {
            Err(zero_division("0.0 cannot be raised to a negative power"))
        }
        BinOp::Pow => Ok(a.powf(b)),
        _ => return None,
    };
    Some(result.map(Value::Float))
}

/// Ordering used by `<`, `sorted`, `min` and `max`; `None` for unordered floats
pub fn compare(op: BinOp, left: &Value, right: &Value) -> Result<Option<Ordering>, Exception> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
        (Value::Bool(a), Value::Bool(b)) => Ok(Some(a.cmp(b))),
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (Value::Tuple(a), Value::Tuple(b)) => compare_seq(op, a, b),
        (Value::List(a), Value::List(b)) => compare_seq(op, &a.borrow(), &b.borrow()),
        _ => match (as_float(left), as_float(right)) {
            (Some(a), Some(b)) => Ok(a.partial_cmp(&b)),
            _ => Err(Exception::type_error(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                op.symbol(),
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn compare_seq(op: BinOp, a: &[Value], b: &[Value]) -> Result<Option<Ordering>, Exception> {
    for (x, y) in a.iter().zip(b) {
        if x != y {
            return compare(op, x, y);
        }
    }
    Ok(Some(a.len().cmp(&b.len())))
}

/// `needle in container`
pub fn contains(container: &Value, needle: &Value) -> Result<bool, Exception> {
    match container {
        Value::Str(haystack) => match needle {
            Value::Str(s) => Ok(haystack.contains(s.as_str())),
            other => Err(Exception::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
        },
        Value::List(items) => Ok(items.borrow().contains(needle)),
        Value::Tuple(items) => Ok(items.contains(needle)),
        Value::Dict(entries) => {
            check_hashable(needle)?;
            Ok(entries.borrow().contains_key(needle))
        }
        other => Err(Exception::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, Exception> {
    match (op, operand) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.is_truthy())),
        (UnaryOp::Neg, Value::Int(i)) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
        (UnaryOp::Pos, v @ (Value::Int(_) | Value::Float(_))) => Ok(v.clone()),
        (op, v) => Err(Exception::type_error(format!(
            "bad operand type for unary {}: '{}'",
            if op == UnaryOp::Neg { "-" } else { "+" },
            v.type_name()
        ))),
    }
}

pub fn check_hashable(value: &Value) -> Result<(), Exception> {
    if value.is_hashable() {
        Ok(())
    } else {
        Err(Exception::type_error(format!("unhashable type: '{}'", value.type_name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_division_and_modulo_follow_sign_of_divisor() {
        assert_eq!(binary(BinOp::FloorDiv, &Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(-4));
        assert_eq!(binary(BinOp::Mod, &Value::Int(-7), &Value::Int(2)).unwrap(), Value::Int(1));
        assert_eq!(binary(BinOp::Mod, &Value::Int(7), &Value::Int(-2)).unwrap(), Value::Int(-1));
        assert_eq!(binary(BinOp::Div, &Value::Int(7), &Value::Int(2)).unwrap(), Value::Float(3.5));
    }

    #[test]
    fn test_errors() {
        let err = binary(BinOp::Div, &Value::Int(1), &Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::ZeroDivisionError);
        let err = binary(BinOp::Mul, &Value::Int(i64::MAX), &Value::Int(2)).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);
        let err = binary(BinOp::Add, &Value::Int(1), &Value::str("a")).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: unsupported operand type(s) for +: 'int' and 'str'");
    }

    #[test]
    fn test_sequences() {
        let joined = binary(BinOp::Add, &Value::str("v"), &Value::str("1")).unwrap();
        assert_eq!(joined, Value::str("v1"));
        let t = Value::tuple(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(binary(BinOp::In, &Value::Int(2), &t).unwrap(), Value::Bool(true));
        let lt = binary(BinOp::Lt, &t, &Value::tuple(vec![Value::Int(1), Value::Int(3)])).unwrap();
        assert_eq!(lt, Value::Bool(true));
        assert_eq!(binary(BinOp::Pow, &Value::Int(2), &Value::Int(10)).unwrap(), Value::Int(1024));
    }

    #[test]
    fn test_oversized_repetition_raises() {
        let huge = Value::Int(i64::MAX);
        let err = binary(BinOp::Mul, &Value::str("ab"), &huge).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        let err = binary(BinOp::Mul, &list, &huge).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);
        let err = binary(BinOp::Mul, &Value::Int(1 << 62), &Value::tuple(vec![Value::None])).unwrap_err();
        assert_eq!(err.kind, ExceptionKind::OverflowError);

        assert_eq!(binary(BinOp::Mul, &Value::str("ab"), &Value::Int(3)).unwrap(), Value::str("ababab"));
        assert_eq!(binary(BinOp::Mul, &Value::str(""), &huge).unwrap(), Value::str(""));
        assert_eq!(binary(BinOp::Mul, &Value::str("ab"), &Value::Int(-1)).unwrap(), Value::str(""));
    }

    #[test]
    fn test_unordered_comparison_is_false() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(binary(BinOp::Lt, &nan, &Value::Int(1)).unwrap(), Value::Bool(false));
        assert_eq!(binary(BinOp::Ge, &nan, &Value::Int(1)).unwrap(), Value::Bool(false));
    }
}
