//! Expression evaluation
//!
//! A tree interpreter that binds variable nodes to scalar values or time
//! series and computes temporal functions over trailing windows via the
//! aggregation layer.
//!
//! # Evaluation pipeline
//!
//! ```text
//! Expr → bind variables → apply operators → aggregate windows → Value
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::expr::ast::{BinaryOp, Expr, ExprKind, Literal, TemporalFunc, UnaryOp};
use crate::expr::error::{EvalError, EvalResult};
use crate::expr::units::time_unit_millis;
use crate::temporal::aggregate;
use crate::temporal::types::{series_is_ordered, TimedValue, Window};

/// A runtime value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
    Array(Vec<Value>),
    Null,
}

impl Value {
    /// Numeric view; booleans project to 0/1
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Bool(true) => Some(1.0),
            Value::Bool(false) => Some(0.0),
            _ => None,
        }
    }

    /// Boolean view; numbers are true when non-zero
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => Some(*n != 0.0),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::Text(_) => "string",
            Value::Array(_) => "array",
            Value::Null => "null",
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
            Value::Array(items) => {
                let rendered: Vec<String> = items.iter().map(Value::to_string).collect();
                write!(f, "{{{}}}", rendered.join(","))
            }
            Value::Null => write!(f, "null"),
        }
    }
}

/// Supplies ordered time series for temporal functions
pub trait SeriesProvider {
    fn series(&self, name: &str) -> Option<&[TimedValue]>;
}

/// Everything an evaluation needs: the instant, scalar bindings, series
/// access and the optional monotonicity check
pub struct EvalContext<'a> {
    now: DateTime<Utc>,
    variables: HashMap<String, Value>,
    series: Option<&'a dyn SeriesProvider>,
    check_monotonic: bool,
}

impl<'a> EvalContext<'a> {
    /// A context evaluating at `now` with no bindings
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            variables: HashMap::new(),
            series: None,
            check_monotonic: false,
        }
    }

    /// Builder method: bind a scalar value to a name
    pub fn bind(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Builder method: attach a time-series provider
    pub fn with_series(mut self, provider: &'a dyn SeriesProvider) -> Self {
        self.series = Some(provider);
        self
    }

    /// Builder method: validate the ascending-timestamp precondition of
    /// every series before aggregating (see `TemporalConfig`)
    pub fn with_monotonic_check(mut self, enabled: bool) -> Self {
        self.check_monotonic = enabled;
        self
    }

    /// Scalar binding, falling back to the latest series value
    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        let series = self.series?.series(name)?;
        let last = series.last()?;
        Some(match last.bool_value {
            Some(b) => Value::Bool(b),
            None => Value::Number(last.value),
        })
    }

    fn resolve_series(&self, name: &str) -> EvalResult<&[TimedValue]> {
        let series = self
            .series
            .and_then(|provider| provider.series(name))
            .ok_or_else(|| EvalError::MissingSeries(name.to_string()))?;
        if self.check_monotonic && !series_is_ordered(series) {
            return Err(EvalError::UnorderedSeries(name.to_string()));
        }
        Ok(series)
    }
}

/// Evaluate an expression against a context
pub fn eval(expr: &Expr, ctx: &EvalContext) -> EvalResult<Value> {
    match &expr.kind {
        ExprKind::Constant(lit) => Ok(match lit {
            Literal::Number(n) => Value::Number(*n),
            Literal::Text(s) => Value::Text(s.clone()),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Null => Value::Null,
        }),

        ExprKind::Variable(name) => ctx
            .lookup(name)
            .ok_or_else(|| EvalError::UnboundVariable(name.clone())),

        ExprKind::Property { .. } => {
            let name = dotted_name(expr)
                .ok_or_else(|| EvalError::TypeMismatch(expr.serialize()))?;
            ctx.lookup(&name).ok_or(EvalError::UnboundVariable(name))
        }

        ExprKind::Array(items) => {
            let values: EvalResult<Vec<Value>> =
                items.iter().map(|item| eval(item, ctx)).collect();
            Ok(Value::Array(values?))
        }

        ExprKind::Failed(child) => Err(EvalError::FailedExpression(child.as_ref().serialize())),

        ExprKind::Unary { op, child } => apply_unary(*op, eval(child, ctx)?),

        ExprKind::Binary { op, left, right } => match op {
            // Short-circuit the logical operators
            BinaryOp::And => {
                if !boolean(eval(left, ctx)?)? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(boolean(eval(right, ctx)?)?))
            }
            BinaryOp::Or => {
                if boolean(eval(left, ctx)?)? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(boolean(eval(right, ctx)?)?))
            }
            _ => apply_binary(*op, eval(left, ctx)?, eval(right, ctx)?),
        },

        ExprKind::Function { name, args } => eval_function(name, args, ctx),

        ExprKind::Temporal {
            func,
            child,
            period,
        } => eval_temporal(*func, child, period.as_deref(), ctx),
    }
}

/// Flatten a `Variable`/`Property` chain to its dotted name
fn dotted_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Variable(name) => Some(name.clone()),
        ExprKind::Property { child, name } => {
            Some(format!("{}.{}", dotted_name(child)?, name))
        }
        _ => None,
    }
}

fn boolean(value: Value) -> EvalResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| EvalError::TypeMismatch(format!("expected bool, got {}", value.type_name())))
}

fn number(value: Value) -> EvalResult<f64> {
    value.as_number().ok_or_else(|| {
        EvalError::TypeMismatch(format!("expected number, got {}", value.type_name()))
    })
}

pub(crate) fn apply_unary(op: UnaryOp, value: Value) -> EvalResult<Value> {
    match op {
        UnaryOp::Minus => Ok(Value::Number(-number(value)?)),
        UnaryOp::Not => Ok(Value::Bool(!boolean(value)?)),
    }
}

pub(crate) fn apply_binary(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    match op {
        BinaryOp::Add => Ok(Value::Number(number(left)? + number(right)?)),
        BinaryOp::Subtract => Ok(Value::Number(number(left)? - number(right)?)),
        BinaryOp::Multiply => Ok(Value::Number(number(left)? * number(right)?)),
        BinaryOp::Divide => Ok(Value::Number(number(left)? / number(right)?)),
        BinaryOp::Power => Ok(Value::Number(number(left)?.powf(number(right)?))),
        BinaryOp::And => Ok(Value::Bool(boolean(left)? && boolean(right)?)),
        BinaryOp::Or => Ok(Value::Bool(boolean(left)? || boolean(right)?)),
        op => compare(op, left, right),
    }
}

fn compare(op: BinaryOp, left: Value, right: Value) -> EvalResult<Value> {
    // Equality tolerates mixed types; ordering requires a common one
    if let (Value::Text(a), Value::Text(b)) = (&left, &right) {
        return Ok(Value::Bool(match op {
            BinaryOp::Equal => a == b,
            BinaryOp::NotEqual => a != b,
            BinaryOp::Greater => a > b,
            BinaryOp::GreaterOrEqual => a >= b,
            BinaryOp::Less => a < b,
            BinaryOp::LessOrEqual => a <= b,
            _ => unreachable!(),
        }));
    }

    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => Ok(Value::Bool(match op {
            BinaryOp::Equal => (a - b).abs() < f64::EPSILON,
            BinaryOp::NotEqual => (a - b).abs() >= f64::EPSILON,
            BinaryOp::Greater => a > b,
            BinaryOp::GreaterOrEqual => a >= b,
            BinaryOp::Less => a < b,
            BinaryOp::LessOrEqual => a <= b,
            _ => unreachable!(),
        })),
        _ => match op {
            BinaryOp::Equal => Ok(Value::Bool(left == right)),
            BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
            _ => Err(EvalError::TypeMismatch(format!(
                "cannot order {} and {}",
                left.type_name(),
                right.type_name()
            ))),
        },
    }
}

fn eval_function(name: &str, args: &[Expr], ctx: &EvalContext) -> EvalResult<Value> {
    let upper = name.to_uppercase();

    // OPTION returns the first argument that evaluates cleanly, which is
    // how rule authors provide fallbacks for FAILED bindings
    if upper == "OPTION" {
        let mut last_error = EvalError::UnknownFunction("OPTION".to_string());
        for arg in args {
            match eval(arg, ctx) {
                Ok(value) => return Ok(value),
                Err(error) => last_error = error,
            }
        }
        return Err(last_error);
    }

    if upper == "IF" {
        if args.len() != 3 {
            return Err(EvalError::TypeMismatch(
                "IF takes a condition and two branches".to_string(),
            ));
        }
        return if boolean(eval(&args[0], ctx)?)? {
            eval(&args[1], ctx)
        } else {
            eval(&args[2], ctx)
        };
    }

    let unary_numeric = |f: fn(f64) -> f64| -> EvalResult<Value> {
        match args {
            [arg] => Ok(Value::Number(f(number(eval(arg, ctx)?)?))),
            _ => Err(EvalError::TypeMismatch(format!(
                "{} takes one numeric argument",
                upper
            ))),
        }
    };

    match upper.as_str() {
        "ABS" => unary_numeric(f64::abs),
        "SQRT" => unary_numeric(f64::sqrt),
        "FLOOR" => unary_numeric(f64::floor),
        "CEILING" => unary_numeric(f64::ceil),
        "ROUND" => unary_numeric(f64::round),
        "FAHRENHEIT" => unary_numeric(|c| c * 9.0 / 5.0 + 32.0),
        "CELSIUS" => unary_numeric(|f| (f - 32.0) * 5.0 / 9.0),
        _ => Err(EvalError::UnknownFunction(name.to_string())),
    }
}

fn eval_temporal(
    func: TemporalFunc,
    child: &Expr,
    period: Option<&Expr>,
    ctx: &EvalContext,
) -> EvalResult<Value> {
    // A series-backed child aggregates over time; otherwise the child
    // must evaluate to an array and the aggregate is a plain one
    if let Some(name) = dotted_name(child) {
        let series_known = ctx
            .series
            .map(|provider| provider.series(&name).is_some())
            .unwrap_or(false);
        if series_known {
            let series = ctx.resolve_series(&name)?;
            let window = match period {
                Some(period) => Window::trailing(ctx.now, eval_period(period, ctx)?),
                None => Window::new(
                    series.first().map(|p| p.timestamp).unwrap_or(ctx.now),
                    ctx.now,
                ),
            };
            return aggregate_series(func, &name, series, window, period, ctx);
        }
    }

    if period.is_some() {
        return Err(EvalError::MissingSeries(child.serialize()));
    }
    match eval(child, ctx)? {
        Value::Array(values) => aggregate_array(func, &values),
        other => Err(EvalError::TypeMismatch(format!(
            "{} needs a series or array, got {}",
            func.name(),
            other.type_name()
        ))),
    }
}

/// Evaluate a time-period expression (`5h`, `(5 + 5)h`) to a duration
fn eval_period(period: &Expr, ctx: &EvalContext) -> EvalResult<Duration> {
    let magnitude = number(eval(period, ctx)?)?;
    let unit = period
        .unit
        .as_deref()
        .ok_or_else(|| EvalError::BadTimePeriod(period.serialize()))?;
    let millis = time_unit_millis(unit)
        .ok_or_else(|| EvalError::BadTimePeriod(period.serialize()))?;
    Ok(Duration::milliseconds((magnitude * millis) as i64))
}

fn aggregate_series(
    func: TemporalFunc,
    name: &str,
    series: &[TimedValue],
    window: Window,
    period: Option<&Expr>,
    ctx: &EvalContext,
) -> EvalResult<Value> {
    let finite = |value: f64| -> EvalResult<Value> {
        if value.is_nan() {
            Err(EvalError::InsufficientData(name.to_string()))
        } else {
            Ok(Value::Number(value))
        }
    };

    let in_window = || series.iter().filter(|p| window.contains(p.timestamp));

    match func {
        TemporalFunc::Average => {
            let boolean_series = series.iter().any(|p| p.bool_value.is_some());
            if boolean_series {
                finite(aggregate::average_true(series, window, f64::NAN))
            } else {
                finite(aggregate::average(series, window, f64::NAN))
            }
        }
        TemporalFunc::Min => finite(aggregate::min(series, window, f64::NAN)),
        TemporalFunc::Max => finite(aggregate::max(series, window, f64::NAN)),
        TemporalFunc::Delta => Ok(Value::Number(aggregate::delta(series, window))),
        TemporalFunc::Slope => Ok(Value::Number(aggregate::slope(series, window))),
        TemporalFunc::StandardDeviation => {
            let points: Vec<TimedValue> = in_window().copied().collect();
            Ok(Value::Number(aggregate::standard_deviation(&points)))
        }
        TemporalFunc::Forecast => {
            let duration = match period {
                Some(period) => eval_period(period, ctx)?,
                None => Duration::zero(),
            };
            finite(aggregate::forecast(series, duration))
        }
        TemporalFunc::Count => Ok(Value::Number(in_window().count() as f64)),
        TemporalFunc::Sum => Ok(Value::Number(
            in_window().map(|p| p.numeric_value()).sum(),
        )),
        TemporalFunc::Any => Ok(Value::Bool(
            in_window().any(|p| p.numeric_value() > 0.0),
        )),
        TemporalFunc::All => Ok(Value::Bool(
            in_window().all(|p| p.numeric_value() > 0.0),
        )),
        TemporalFunc::CountLeading => Ok(Value::Number(aggregate::count_leading_edges(
            series, window,
        ))),
        TemporalFunc::DeltaTime => Ok(Value::Number(delta_time_seconds(series))),
    }
}

/// Seconds the current value has been held: newest sample minus the start
/// of its run. 0 when the series never changed.
fn delta_time_seconds(series: &[TimedValue]) -> f64 {
    let Some(last) = series.last() else {
        return 0.0;
    };
    let final_value = last.numeric_value();
    let mut run_start = last.timestamp;
    let mut changed = false;
    for point in series.iter().rev().skip(1) {
        if point.numeric_value() == final_value {
            run_start = point.timestamp;
        } else {
            changed = true;
            break;
        }
    }
    if !changed {
        return 0.0;
    }
    (last.timestamp - run_start).num_milliseconds() as f64 / 1000.0
}

fn aggregate_array(func: TemporalFunc, values: &[Value]) -> EvalResult<Value> {
    let numbers: EvalResult<Vec<f64>> =
        values.iter().map(|value| number(value.clone())).collect();
    let numbers = numbers?;

    if numbers.is_empty()
        && matches!(
            func,
            TemporalFunc::Average | TemporalFunc::Min | TemporalFunc::Max
        )
    {
        return Err(EvalError::InsufficientData(func.name().to_string()));
    }

    match func {
        TemporalFunc::Average => Ok(Value::Number(
            numbers.iter().sum::<f64>() / numbers.len() as f64,
        )),
        TemporalFunc::Min => Ok(Value::Number(
            numbers.iter().cloned().fold(f64::INFINITY, f64::min),
        )),
        TemporalFunc::Max => Ok(Value::Number(
            numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        )),
        TemporalFunc::Sum => Ok(Value::Number(numbers.iter().sum())),
        TemporalFunc::Count => Ok(Value::Number(numbers.len() as f64)),
        TemporalFunc::Any => Ok(Value::Bool(numbers.iter().any(|n| *n > 0.0))),
        TemporalFunc::All => Ok(Value::Bool(numbers.iter().all(|n| *n > 0.0))),
        TemporalFunc::StandardDeviation => Ok(Value::Number(
            crate::temporal::math::standard_deviation(numbers),
        )),
        other => Err(EvalError::TypeMismatch(format!(
            "{} requires a time series",
            other.name()
        ))),
    }
}
