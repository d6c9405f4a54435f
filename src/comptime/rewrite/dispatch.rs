//! `match`-based bodies with a raising fallback case

use super::{literal_expr, return_stmt, RewriteStrategy, Variant};
use crate::runtime::Value;
use crate::script::ast::*;
use crate::utils::{Error, Result};

/// ```text
/// match (a, b):
///     case (1, True):
///         return ...
///     case _:
///         raise ValueError(f"Uncompiled variant a={a} b={b}")
/// ```
pub struct MatchStrategy;

impl RewriteStrategy for MatchStrategy {
    fn name(&self) -> &'static str {
        "match"
    }

    fn build_body(&self, function: &str, params: &[String], variants: &[Variant<'_>]) -> Result<Vec<Stmt>> {
        let mut cases = Vec::with_capacity(variants.len() + 1);
        for variant in variants {
            let values = variant.key.values();
            let pattern = match values {
                [single] if params.len() == 1 => literal_pattern(function, single)?,
                _ => Pattern::Sequence(
                    values.iter().map(|value| literal_pattern(function, value)).collect::<Result<_>>()?,
                ),
            };
            cases.push(MatchCase {
                pattern,
                body: vec![return_stmt(literal_expr(function, variant.value)?)],
            });
        }
        cases.push(MatchCase { pattern: Pattern::Wildcard, body: vec![fallback(params)] });

        Ok(vec![Stmt::Match(MatchStmt { subject: subject(params), cases, span: Default::default() })])
    }
}

/// The single parameter itself, or a tuple of all of them
pub(super) fn subject(params: &[String]) -> Expr {
    match params {
        [single] => Expr::name(single.as_str()),
        _ => Expr::tuple(params.iter().map(|p| Expr::name(p.as_str())).collect()),
    }
}

fn literal_pattern(function: &str, value: &Value) -> Result<Pattern> {
    Ok(match value {
        Value::Tuple(items) => Pattern::Sequence(
            items.iter().map(|item| literal_pattern(function, item)).collect::<Result<_>>()?,
        ),
        Value::List(items) => Pattern::Sequence(
            items.borrow().iter().map(|item| literal_pattern(function, item)).collect::<Result<_>>()?,
        ),
        Value::Dict(_) => {
            return Err(Error::Unrepresentable { function: function.to_string(), value: value.repr() })
        }
        scalar => Pattern::Value(literal_expr(function, scalar)?),
    })
}

/// `raise ValueError(f"Uncompiled variant a={a} b={b}")`
fn fallback(params: &[String]) -> Stmt {
    let mut parts = vec![FStringPart::Literal("Uncompiled variant".to_string())];
    for param in params {
        parts.push(FStringPart::Literal(format!(" {}=", param)));
        parts.push(FStringPart::Field { expr: Box::new(Expr::name(param.as_str())), repr: false });
    }
    let message = Expr::FString { parts, span: Default::default() };
    Stmt::Raise(RaiseStmt {
        exc: Some(Expr::call(Expr::name("ValueError"), vec![message])),
        span: Default::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comptime::expand::ArgKey;
    use crate::script::{print_module, PrintOptions};

    fn render(body: Vec<Stmt>) -> String {
        print_module(&Module { body }, &PrintOptions::default())
    }

    #[test]
    fn test_single_parameter_cases() {
        let keys = [ArgKey::Single(Value::Int(-1)), ArgKey::Single(Value::None)];
        let values = [Value::str("neg"), Value::Bool(false)];
        let variants: Vec<Variant<'_>> =
            keys.iter().zip(&values).map(|(key, value)| Variant { key, value }).collect();

        let body = MatchStrategy.build_body("sign", &["x".to_string()], &variants).unwrap();
        assert_eq!(
            render(body),
            "match x:\n    case -1:\n        return \"neg\"\n    case None:\n        return False\n    case _:\n        raise ValueError(f\"Uncompiled variant x={x}\")\n"
        );
    }

    #[test]
    fn test_tuple_valued_argument_becomes_sequence_pattern() {
        let key = ArgKey::Single(Value::tuple(vec![Value::Int(1), Value::Int(2)]));
        let value = Value::Int(3);
        let body = MatchStrategy
            .build_body("total", &["pair".to_string()], &[Variant { key: &key, value: &value }])
            .unwrap();
        assert!(render(body).contains("    case (1, 2):\n"));
    }

    #[test]
    fn test_dict_argument_is_unrepresentable() {
        let key = ArgKey::Single(Value::Dict(Default::default()));
        let value = Value::Int(0);
        let err = MatchStrategy
            .build_body("f", &["d".to_string()], &[Variant { key: &key, value: &value }])
            .unwrap_err();
        assert!(matches!(err, Error::Unrepresentable { .. }));
    }
}
