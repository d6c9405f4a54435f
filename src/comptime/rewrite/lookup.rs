//! Dict-lookup bodies: `return {key: value, ...}[subject]`
//!
//! Arguments outside the precomputed set raise `KeyError` at run time.

use super::dispatch::subject;
use super::{literal_expr, return_stmt, RewriteStrategy, Variant};
use crate::runtime::Value;
use crate::script::ast::*;
use crate::utils::{Error, Result};

pub struct DictStrategy;

impl RewriteStrategy for DictStrategy {
    fn name(&self) -> &'static str {
        "dict"
    }

    fn build_body(&self, function: &str, params: &[String], variants: &[Variant<'_>]) -> Result<Vec<Stmt>> {
        let entries = variants
            .iter()
            .map(|variant| {
                let values = variant.key.values();
                let key = match values {
                    [single] if params.len() == 1 => key_expr(function, single)?,
                    _ => Expr::tuple(values.iter().map(|v| key_expr(function, v)).collect::<Result<_>>()?),
                };
                Ok((key, literal_expr(function, variant.value)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let table = Expr::Dict { entries, span: Default::default() };
        Ok(vec![return_stmt(Expr::subscript(table, subject(params)))])
    }
}

fn key_expr(function: &str, value: &Value) -> Result<Expr> {
    if !value.is_hashable() {
        return Err(Error::Unrepresentable { function: function.to_string(), value: value.repr() });
    }
    literal_expr(function, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comptime::expand::ArgKey;
    use crate::script::printer::print_expr;

    fn returned(body: &[Stmt]) -> String {
        match body {
            [Stmt::Return(ReturnStmt { value: Some(value), .. })] => print_expr(value),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_tuple_keys() {
        let keys = [
            ArgKey::Tuple(vec![Value::Int(1), Value::Bool(true)]),
            ArgKey::Tuple(vec![Value::Int(2), Value::Bool(true)]),
        ];
        let values = [Value::Float(0.5), Value::None];
        let variants: Vec<Variant<'_>> =
            keys.iter().zip(&values).map(|(key, value)| Variant { key, value }).collect();

        let body = DictStrategy
            .build_body("f", &["n".to_string(), "flag".to_string()], &variants)
            .unwrap();
        assert_eq!(returned(&body), "{(1, True): 0.5, (2, True): None}[n, flag]");
    }

    #[test]
    fn test_list_argument_cannot_be_a_key() {
        let key = ArgKey::Single(Value::list(vec![Value::Int(1)]));
        let value = Value::Int(1);
        let err = DictStrategy
            .build_body("f", &["items".to_string()], &[Variant { key: &key, value: &value }])
            .unwrap_err();
        assert!(matches!(err, Error::Unrepresentable { function, .. } if function == "f"));
    }
}
