//! Expression evaluation.
//!
//! A tree-walking interpreter over [`Expr`] against a scope chain. All
//! failures are reported as [`EvalError`]; the renderer substitutes null
//! and keeps going, so a broken expression never aborts a render.

use crate::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::EvalError;
use crate::scope::Scope;
use crate::store::Store;
use crate::value::{self, Value};
use std::sync::Arc;

/// The context handed to expression evaluation and host callables:
/// the active scope plus the per-render store.
pub struct FnCtx<'a> {
    /// The active lexical scope.
    pub scope: &'a Arc<Scope>,
    /// The per-render shared store.
    pub store: &'a dyn Store,
}

impl<'a> FnCtx<'a> {
    /// Create an evaluation context.
    pub fn new(scope: &'a Arc<Scope>, store: &'a dyn Store) -> Self {
        Self { scope, store }
    }
}

/// Evaluate an expression against the given context.
pub fn eval(expr: &Expr, ctx: &FnCtx<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(n) => Ok(Value::Float(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Ident(name) => Ok(ctx.scope.get(name)),
        Expr::Member(target, name) => {
            let left = eval(target, ctx)?;
            Ok(left.get_key(name).unwrap_or(Value::Null))
        }
        Expr::Index(target, index) => {
            let left = eval(target, ctx)?;
            let key = match eval(index, ctx)? {
                Value::Str(s) => s,
                other => other.render_string(),
            };
            Ok(left.get_key(&key).unwrap_or(Value::Null))
        }
        Expr::Unary(op, operand) => {
            let v = eval(operand, ctx)?;
            Ok(match op {
                UnaryOp::Not => Value::Bool(!v.truthy()),
                UnaryOp::Neg => match v {
                    Value::Int(n) => Value::Int(-n),
                    other => Value::Float(-other.to_float()),
                },
            })
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, ctx),
        Expr::Ternary {
            cond,
            then,
            or_else,
        } => {
            if eval(cond, ctx)?.truthy() {
                eval(then, ctx)
            } else {
                eval(or_else, ctx)
            }
        }
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval(item, ctx)?);
            }
            Ok(Value::list(out))
        }
        Expr::Object(entries) => {
            if entries.is_empty() {
                return Ok(Value::Null);
            }
            let mut out = indexmap::IndexMap::with_capacity(entries.len());
            for (key, value_expr) in entries {
                out.insert(key.clone(), eval(value_expr, ctx)?);
            }
            Ok(Value::Map(Arc::new(crate::value::MapValue::new(out))))
        }
        Expr::Call { callee, args } => {
            let target = eval(callee, ctx)?;
            let Value::Func(f) = target else {
                return Err(EvalError::new(format!(
                    "`{:?}` is not callable",
                    callee
                )));
            };
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(eval(arg, ctx)?);
            }
            Ok(f.call(ctx, &evaluated))
        }
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &FnCtx<'_>,
) -> Result<Value, EvalError> {
    // && and || short-circuit; everything else evaluates both sides.
    match op {
        BinaryOp::And => {
            return Ok(Value::Bool(
                eval(lhs, ctx)?.truthy() && eval(rhs, ctx)?.truthy(),
            ));
        }
        BinaryOp::Or => {
            return Ok(Value::Bool(
                eval(lhs, ctx)?.truthy() || eval(rhs, ctx)?.truthy(),
            ));
        }
        _ => {}
    }

    let left = eval(lhs, ctx)?;
    let right = eval(rhs, ctx)?;
    Ok(match op {
        BinaryOp::Add => value::add(&left, &right),
        BinaryOp::Sub => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => match a.checked_sub(*b) {
                Some(n) => Value::Int(n),
                None => Value::Float(*a as f64 - *b as f64),
            },
            _ => Value::Float(left.to_float() - right.to_float()),
        },
        BinaryOp::Mul => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => match a.checked_mul(*b) {
                Some(n) => Value::Int(n),
                None => Value::Float(*a as f64 * *b as f64),
            },
            _ => Value::Float(left.to_float() * right.to_float()),
        },
        BinaryOp::Div => Value::Float(left.to_float() / right.to_float()),
        BinaryOp::Eq => Value::Bool(left == right),
        BinaryOp::Ne => Value::Bool(left != right),
        BinaryOp::Lt => Value::Bool(value::less(&left, &right)),
        BinaryOp::Gt => Value::Bool(value::greater(&left, &right)),
        BinaryOp::Le => Value::Bool(!value::greater(&left, &right)),
        BinaryOp::Ge => Value::Bool(!value::less(&left, &right)),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expr;
    use crate::store::MapStore;
    use crate::value::PropAccess;

    #[derive(Debug)]
    struct Getter;

    impl PropAccess for Getter {
        fn get_prop(&self, key: &str) -> Option<Value> {
            (key == "a").then(|| Value::Str("1".into()))
        }
    }

    fn test_scope() -> Arc<Scope> {
        let scope = Scope::new();
        scope.set("a", Value::Int(1));
        scope.set(
            "info",
            Value::map(vec![
                ("sex", Value::Int(26)),
                ("sexkey", Value::Str("sex".into())),
            ]),
        );
        scope.set("getter", Value::Object(Arc::new(Getter)));
        scope.set(
            "concat",
            Value::func(|_ctx, args| {
                Value::Str(format!(
                    "{}{}",
                    args[0].render_string(),
                    args[1].render_string()
                ))
            }),
        );
        scope
    }

    fn run(code: &str) -> Value {
        let scope = test_scope();
        let store = MapStore::new();
        let ctx = FnCtx::new(&scope, &store);
        eval(&parse_expr(code).unwrap(), &ctx).unwrap()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run("1+1"), Value::Int(2));
        assert_eq!(run("a+1"), Value::Int(2));
        assert_eq!(run("a-1"), Value::Int(0));
        assert_eq!(run("3/2"), Value::Float(1.5));
        assert_eq!(run("2*3"), Value::Int(6));
    }

    #[test]
    fn test_unary() {
        assert_eq!(run("-a"), Value::Int(-1));
        assert_eq!(run("!a"), Value::Bool(false));
        assert_eq!(run("!!a"), Value::Bool(true));
        assert_eq!(run("!0"), Value::Bool(true));
        assert_eq!(run("!(a+1)"), Value::Bool(false));
        assert_eq!(run("!(a-1)"), Value::Bool(true));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(run("2 > 1"), Value::Bool(true));
        assert_eq!(run("2 >= 1"), Value::Bool(true));
        assert_eq!(run("2 >= 2"), Value::Bool(true));
        assert_eq!(run("1 < 2"), Value::Bool(true));
        assert_eq!(run("1 <= 2"), Value::Bool(true));
        assert_eq!(run("'a' < 'b'"), Value::Bool(true));
    }

    #[test]
    fn test_member_and_index() {
        assert_eq!(run("info.sex"), Value::Int(26));
        assert_eq!(run("info.sex+1"), Value::Int(27));
        assert_eq!(run("info.sexkey"), Value::Str("sex".into()));
        assert_eq!(run("info[info.sexkey]"), Value::Int(26));
        assert_eq!(run("info.missing"), Value::Null);
        assert_eq!(run("missing.deep.path"), Value::Null);
    }

    #[test]
    fn test_object_and_array_literals() {
        assert_eq!(run("{'abc': 'abc'}['abc']"), Value::Str("abc".into()));
        assert_eq!(run("{2: 3}['2']"), Value::Int(3));
        assert_eq!(run("[1,2,3].length"), Value::Int(3));
        assert_eq!(run("[1,2,3][1]"), Value::Int(2));
        // An empty object literal reads as null.
        assert_eq!(run("{}"), Value::Null);
    }

    #[test]
    fn test_opaque_getter() {
        assert_eq!(run("getter.a"), Value::Str("1".into()));
        assert_eq!(run("getter.b"), Value::Null);
    }

    #[test]
    fn test_call() {
        assert_eq!(run("concat(1,2)"), Value::Str("12".into()));
    }

    #[test]
    fn test_call_non_callable_errors() {
        let scope = test_scope();
        let store = MapStore::new();
        let ctx = FnCtx::new(&scope, &store);
        let result = eval(&parse_expr("a(1)").unwrap(), &ctx);
        assert!(result.is_err());
    }

    #[test]
    fn test_equality_is_strict() {
        assert_eq!(run("1 == '1'"), Value::Bool(false));
        assert_eq!(run("'x' == 'x'"), Value::Bool(true));
        assert_eq!(run("'x' != 'y'"), Value::Bool(true));
        assert_eq!(run("null == null"), Value::Bool(true));
    }

    #[test]
    fn test_ternary_is_lazy() {
        let scope = test_scope();
        scope.set(
            "boom",
            Value::func(|_ctx, _args| panic!("must not be evaluated")),
        );
        let store = MapStore::new();
        let ctx = FnCtx::new(&scope, &store);
        let v = eval(&parse_expr("a ? 'yes' : boom()").unwrap(), &ctx).unwrap();
        assert_eq!(v, Value::Str("yes".into()));
    }

    #[test]
    fn test_logic_truthiness_strings() {
        assert_eq!(run("'false' && true"), Value::Bool(false));
        assert_eq!(run("'0' || false"), Value::Bool(false));
        assert_eq!(run("'yes' && 1"), Value::Bool(true));
    }

    #[test]
    fn test_function_sees_scope_and_store() {
        let scope = test_scope();
        scope.set(
            "remember",
            Value::func(|ctx, args| {
                ctx.store.set("k", args[0].clone());
                ctx.scope.set("seen", args[0].clone());
                Value::Str(String::new())
            }),
        );
        let store = MapStore::new();
        let ctx = FnCtx::new(&scope, &store);
        eval(&parse_expr("remember('v')").unwrap(), &ctx).unwrap();
        assert_eq!(store.get("k"), Some(Value::Str("v".into())));
        assert_eq!(scope.get("seen"), Value::Str("v".into()));
    }
}
