//! Client-side predicate compilation
//!
//! Compiles an expression tree (typically a client residual or combined
//! predicate from the twin filter) into a native boolean predicate over a
//! caller-chosen context type. Names resolve through a getter function and
//! graph predicates (`UNDER`, `IS_OF_MODEL`, ...) through an explicit
//! registry populated once at startup; nothing is resolved by reflection
//! or at call time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::expr::ast::{BinaryOp, Expr, ExprKind, Literal};
use crate::expr::error::{EvalError, EvalResult};
use crate::expr::eval::{apply_binary, apply_unary, Value};

type Getter<C> = dyn Fn(&C, &str) -> Option<Value> + Send + Sync;
type BoolFn<C> = dyn Fn(&C, &Value) -> bool + Send + Sync;
type Node<C> = Box<dyn Fn(&C) -> EvalResult<Value> + Send + Sync>;

/// Name resolution plus the named two-argument boolean functions a
/// compiled predicate may call
pub struct FunctionRegistry<C> {
    getter: Box<Getter<C>>,
    functions: HashMap<String, Box<BoolFn<C>>>,
}

impl<C> FunctionRegistry<C> {
    /// A registry resolving names through `getter`
    pub fn new(getter: impl Fn(&C, &str) -> Option<Value> + Send + Sync + 'static) -> Self {
        Self {
            getter: Box::new(getter),
            functions: HashMap::new(),
        }
    }

    /// Register a named boolean function of the context and one argument
    pub fn register(
        &mut self,
        name: &str,
        function: impl Fn(&C, &Value) -> bool + Send + Sync + 'static,
    ) {
        self.functions.insert(name.to_uppercase(), Box::new(function));
    }
}

/// A compiled boolean predicate over contexts of type `C`
///
/// Evaluation never panics; sub-expressions that fail at runtime (unbound
/// names, type mismatches) make the predicate false for that context.
pub struct TwinPredicate<C> {
    node: Node<C>,
}

impl<C> TwinPredicate<C> {
    /// Apply the predicate to one context
    pub fn matches(&self, context: &C) -> bool {
        match (self.node)(context) {
            Ok(value) => value.as_bool().unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Compile an expression into a predicate
///
/// Fails up front on constructs a predicate cannot carry (temporal
/// aggregates, failure markers, functions missing from the registry)
/// rather than at match time.
pub fn compile<C: 'static>(
    expr: &Expr,
    registry: &Arc<FunctionRegistry<C>>,
) -> EvalResult<TwinPredicate<C>> {
    let node = compile_node(expr, registry)?;
    Ok(TwinPredicate { node })
}

fn compile_node<C: 'static>(
    expr: &Expr,
    registry: &Arc<FunctionRegistry<C>>,
) -> EvalResult<Node<C>> {
    match &expr.kind {
        ExprKind::Constant(lit) => {
            let value = match lit {
                Literal::Number(n) => Value::Number(*n),
                Literal::Text(s) => Value::Text(s.clone()),
                Literal::Bool(b) => Value::Bool(*b),
                Literal::Null => Value::Null,
            };
            Ok(Box::new(move |_| Ok(value.clone())))
        }

        ExprKind::Variable(_) | ExprKind::Property { .. } => {
            let name = dotted_name(expr)
                .ok_or_else(|| EvalError::TypeMismatch(expr.serialize()))?;
            let registry = Arc::clone(registry);
            Ok(Box::new(move |context| {
                (registry.getter)(context, &name)
                    .ok_or_else(|| EvalError::UnboundVariable(name.clone()))
            }))
        }

        ExprKind::Array(items) => {
            let nodes: EvalResult<Vec<Node<C>>> = items
                .iter()
                .map(|item| compile_node(item, registry))
                .collect();
            let nodes = nodes?;
            Ok(Box::new(move |context| {
                let values: EvalResult<Vec<Value>> =
                    nodes.iter().map(|node| node(context)).collect();
                Ok(Value::Array(values?))
            }))
        }

        ExprKind::Function { name, args } => {
            let upper = name.to_uppercase();
            if !registry.functions.contains_key(&upper) {
                return Err(EvalError::UnknownFunction(name.clone()));
            }
            // Convention from the twin filter rewrite: the first argument
            // names the context object, the last carries the comparand
            let argument = match args.last() {
                Some(last) if args.len() >= 2 => compile_node(last, registry)?,
                _ => Box::new(|_: &C| Ok(Value::Null)) as Node<C>,
            };
            let registry = Arc::clone(registry);
            Ok(Box::new(move |context| {
                let function = registry
                    .functions
                    .get(&upper)
                    .expect("function checked at compile time");
                let value = argument(context)?;
                Ok(Value::Bool(function(context, &value)))
            }))
        }

        ExprKind::Unary { op, child } => {
            let op = *op;
            let child = compile_node(child, registry)?;
            Ok(Box::new(move |context| apply_unary(op, child(context)?)))
        }

        ExprKind::Binary { op, left, right } => {
            let op = *op;
            let left = compile_node(left, registry)?;
            let right = compile_node(right, registry)?;
            match op {
                BinaryOp::And => Ok(Box::new(move |context| {
                    if !truthy(left(context)?) {
                        return Ok(Value::Bool(false));
                    }
                    Ok(Value::Bool(truthy(right(context)?)))
                })),
                BinaryOp::Or => Ok(Box::new(move |context| {
                    if truthy(left(context)?) {
                        return Ok(Value::Bool(true));
                    }
                    Ok(Value::Bool(truthy(right(context)?)))
                })),
                _ => Ok(Box::new(move |context| {
                    apply_binary(op, left(context)?, right(context)?)
                })),
            }
        }

        ExprKind::Temporal { .. } | ExprKind::Failed(_) => Err(EvalError::TypeMismatch(
            format!("not a twin predicate: {}", expr.serialize()),
        )),
    }
}

fn truthy(value: Value) -> bool {
    value.as_bool().unwrap_or(false)
}

fn dotted_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Variable(name) => Some(name.clone()),
        ExprKind::Property { child, name } => Some(format!("{}.{}", dotted_name(child)?, name)),
        _ => None,
    }
}
