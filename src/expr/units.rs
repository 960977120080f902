//! Unit analysis
//!
//! A tree-walking, stateless pass that maps every expression node to a
//! unit-of-measure string. Mismatched units are not errors in the
//! exception sense: the visitor always produces a value, and the public
//! boundary renders incompatibility as the literal sentinel `"error"` so
//! callers decide severity.
//!
//! Rules:
//! - `+`/`-` require matching units (an untyped side adopts the other)
//! - `*` with a dimensionless side takes the other side, otherwise units
//!   compose (`W * s` → `W.s`)
//! - `/` cancels equal units to `""`, otherwise forms a ratio (`km/h`)
//! - comparisons of matching units yield `bool`
//! - `&`/`|`/`!` always yield `bool`
//! - function results come from a per-name registry of passthrough, fixed
//!   or computed rules

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::expr::ast::{BinaryOp, Expr, ExprKind, Literal, TemporalFunc, UnaryOp};

/// The sentinel rendered for incompatible units
pub const ERROR_UNIT: &str = "error";

/// The unit of boolean-valued expressions
pub const BOOL_UNIT: &str = "bool";

/// One known unit: canonical name plus accepted spellings
struct UnitDef {
    name: &'static str,
    aliases: &'static [&'static str],
}

/// Units the lexer/parser canonicalize; anything else passes through as an
/// opaque tag
const UNITS: &[UnitDef] = &[
    UnitDef { name: "degC", aliases: &["°C", "celsius"] },
    UnitDef { name: "degF", aliases: &["°F", "fahrenheit"] },
    UnitDef { name: "degK", aliases: &["°K", "kelvin"] },
    UnitDef { name: "%", aliases: &["percent"] },
    UnitDef { name: "ms", aliases: &["millisecond", "milliseconds"] },
    UnitDef { name: "s", aliases: &["sec", "secs", "second", "seconds"] },
    UnitDef { name: "min", aliases: &["mins", "minute", "minutes"] },
    UnitDef { name: "h", aliases: &["hr", "hrs", "hour", "hours"] },
    UnitDef { name: "d", aliases: &["day", "days"] },
    UnitDef { name: "wk", aliases: &["week", "weeks"] },
    UnitDef { name: "W", aliases: &["watt", "watts"] },
    UnitDef { name: "kW", aliases: &["kilowatt", "kilowatts"] },
    UnitDef { name: "MW", aliases: &[] },
    UnitDef { name: "Wh", aliases: &[] },
    UnitDef { name: "kWh", aliases: &[] },
    UnitDef { name: "MWh", aliases: &[] },
    UnitDef { name: "J", aliases: &["joule", "joules"] },
    UnitDef { name: "V", aliases: &["volt", "volts"] },
    UnitDef { name: "A", aliases: &["amp", "amps", "ampere", "amperes"] },
    UnitDef { name: "Hz", aliases: &["hertz"] },
    UnitDef { name: "Pa", aliases: &["pascal", "pascals"] },
    UnitDef { name: "kPa", aliases: &[] },
    UnitDef { name: "psi", aliases: &[] },
    UnitDef { name: "bar", aliases: &[] },
    UnitDef { name: "m", aliases: &["meter", "meters", "metre", "metres"] },
    UnitDef { name: "mm", aliases: &[] },
    UnitDef { name: "km", aliases: &[] },
    UnitDef { name: "ft", aliases: &["feet", "foot"] },
    UnitDef { name: "m2", aliases: &["sqm"] },
    UnitDef { name: "m3", aliases: &[] },
    UnitDef { name: "L", aliases: &["liter", "liters", "litre", "litres"] },
    UnitDef { name: "cfm", aliases: &[] },
    UnitDef { name: "ppm", aliases: &[] },
    UnitDef { name: "lux", aliases: &[] },
    UnitDef { name: "kg", aliases: &[] },
    UnitDef { name: "g", aliases: &[] },
];

fn alias_table() -> &'static HashMap<String, &'static str> {
    static TABLE: OnceLock<HashMap<String, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = HashMap::new();
        for def in UNITS {
            table.insert(def.name.to_lowercase(), def.name);
            for alias in def.aliases {
                table.insert(alias.to_lowercase(), def.name);
            }
        }
        table
    })
}

/// Look up the canonical spelling of a recognized unit
pub fn canonical_unit(name: &str) -> Option<&'static str> {
    alias_table().get(&name.to_lowercase()).copied()
}

/// Canonicalize a recognized unit, pass anything else through verbatim
pub fn normalize_unit(name: &str) -> String {
    canonical_unit(name)
        .map(str::to_string)
        .unwrap_or_else(|| name.to_string())
}

/// Milliseconds per unit for the time units a temporal window accepts
pub fn time_unit_millis(unit: &str) -> Option<f64> {
    match canonical_unit(unit)? {
        "ms" => Some(1.0),
        "s" => Some(1_000.0),
        "min" => Some(60_000.0),
        "h" => Some(3_600_000.0),
        "d" => Some(86_400_000.0),
        "wk" => Some(7.0 * 86_400_000.0),
        _ => None,
    }
}

/// The outcome of unit analysis on one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    /// No unit information
    Untyped,
    /// A concrete unit; `""` is dimensionless
    Unit(String),
    /// Incompatible units somewhere beneath this node
    Mismatch,
}

impl UnitOutcome {
    fn unit(name: impl Into<String>) -> Self {
        UnitOutcome::Unit(name.into())
    }

    /// True when this side carries no distinguishing unit
    fn is_blank(&self) -> bool {
        matches!(self, UnitOutcome::Untyped) || matches!(self, UnitOutcome::Unit(u) if u.is_empty())
    }

    /// Render for external callers: mismatches become the `"error"`
    /// sentinel, untyped renders as the empty string
    pub fn render(&self) -> String {
        match self {
            UnitOutcome::Untyped => String::new(),
            UnitOutcome::Unit(u) => u.clone(),
            UnitOutcome::Mismatch => ERROR_UNIT.to_string(),
        }
    }
}

/// How a named function transforms its arguments' units
pub enum UnitRule {
    /// Result takes the first argument's unit
    Passthrough,
    /// Result is always `unit`; with `only_recognized_input`, an input
    /// carrying an unrecognized tag passes through unchanged instead
    Fixed {
        unit: &'static str,
        only_recognized_input: bool,
    },
    /// Custom function of the argument outcomes
    Computed(fn(&[UnitOutcome]) -> UnitOutcome),
}

/// Per-function unit rules, built once at startup
pub struct FunctionUnitRegistry {
    rules: HashMap<String, UnitRule>,
}

impl FunctionUnitRegistry {
    /// An empty registry; unknown functions default to passthrough
    pub fn new() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// The standard rule set for the built-in function library
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(
            "FAHRENHEIT",
            UnitRule::Fixed {
                unit: "degF",
                only_recognized_input: true,
            },
        );
        registry.register(
            "CELSIUS",
            UnitRule::Fixed {
                unit: "degC",
                only_recognized_input: true,
            },
        );
        for name in ["ABS", "FLOOR", "CEILING", "ROUND", "SQRT", "OPTION"] {
            registry.register(name, UnitRule::Passthrough);
        }
        // IF(cond, then, else) takes the branches' common unit
        registry.register("IF", UnitRule::Computed(|args| match args {
            [_, a, b] => merge_matching(a.clone(), b.clone()),
            _ => UnitOutcome::Untyped,
        }));
        // Twin graph predicates are boolean whatever their arguments
        for name in ["UNDER", "IS_OF_MODEL"] {
            registry.register(name, UnitRule::Computed(|_| UnitOutcome::unit(BOOL_UNIT)));
        }
        registry
    }

    /// Register a rule under an upper-cased name
    pub fn register(&mut self, name: &str, rule: UnitRule) {
        self.rules.insert(name.to_uppercase(), rule);
    }

    fn rule(&self, name: &str) -> Option<&UnitRule> {
        self.rules.get(&name.to_uppercase())
    }
}

impl Default for FunctionUnitRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_registry() -> &'static FunctionUnitRegistry {
    static REGISTRY: OnceLock<FunctionUnitRegistry> = OnceLock::new();
    REGISTRY.get_or_init(FunctionUnitRegistry::standard)
}

/// Unit of an expression under the standard function registry, rendered
/// as a string (`"error"` for mismatches)
pub fn unit_of(expr: &Expr) -> String {
    unit_outcome(expr, standard_registry()).render()
}

/// Unit analysis with a caller-supplied function registry
pub fn unit_outcome(expr: &Expr, registry: &FunctionUnitRegistry) -> UnitOutcome {
    if let Some(unit) = &expr.unit {
        return UnitOutcome::unit(unit.clone());
    }

    match &expr.kind {
        ExprKind::Constant(Literal::Bool(_)) => UnitOutcome::unit(BOOL_UNIT),
        ExprKind::Constant(_) => UnitOutcome::Untyped,
        ExprKind::Variable(_) | ExprKind::Property { .. } => UnitOutcome::Untyped,
        ExprKind::Array(items) => items.iter().fold(UnitOutcome::Untyped, |acc, item| {
            merge_matching(acc, unit_outcome(item, registry))
        }),
        ExprKind::Failed(child) => unit_outcome(child, registry),
        ExprKind::Unary { op, child } => match op {
            UnaryOp::Not => UnitOutcome::unit(BOOL_UNIT),
            UnaryOp::Minus => unit_outcome(child, registry),
        },
        ExprKind::Function { name, args } => {
            let outcomes: Vec<UnitOutcome> =
                args.iter().map(|arg| unit_outcome(arg, registry)).collect();
            apply_function_rule(registry, name, &outcomes)
        }
        ExprKind::Temporal { func, child, .. } => match func {
            TemporalFunc::Any | TemporalFunc::All => UnitOutcome::unit(BOOL_UNIT),
            TemporalFunc::Count | TemporalFunc::CountLeading => UnitOutcome::Untyped,
            TemporalFunc::DeltaTime => UnitOutcome::unit("s"),
            _ => unit_outcome(child, registry),
        },
        ExprKind::Binary { op, left, right } => {
            let l = unit_outcome(left, registry);
            let r = unit_outcome(right, registry);
            binary_outcome(*op, l, r)
        }
    }
}

fn binary_outcome(op: BinaryOp, l: UnitOutcome, r: UnitOutcome) -> UnitOutcome {
    match op {
        BinaryOp::And | BinaryOp::Or => UnitOutcome::unit(BOOL_UNIT),
        BinaryOp::Add | BinaryOp::Subtract => merge_matching(l, r),
        op if op.is_comparison() => match merge_matching(l, r) {
            UnitOutcome::Mismatch => UnitOutcome::Mismatch,
            _ => UnitOutcome::unit(BOOL_UNIT),
        },
        BinaryOp::Multiply => multiply_outcome(l, r),
        BinaryOp::Divide => divide_outcome(l, r),
        BinaryOp::Power => match (l, r) {
            (UnitOutcome::Mismatch, _) | (_, UnitOutcome::Mismatch) => UnitOutcome::Mismatch,
            (base, _) => base,
        },
        _ => unreachable!(),
    }
}

/// Units that must agree: an untyped side adopts the other side
fn merge_matching(l: UnitOutcome, r: UnitOutcome) -> UnitOutcome {
    match (l, r) {
        (UnitOutcome::Mismatch, _) | (_, UnitOutcome::Mismatch) => UnitOutcome::Mismatch,
        (UnitOutcome::Untyped, other) | (other, UnitOutcome::Untyped) => other,
        (UnitOutcome::Unit(a), UnitOutcome::Unit(b)) => {
            if a == b {
                UnitOutcome::Unit(a)
            } else {
                UnitOutcome::Mismatch
            }
        }
    }
}

fn multiply_outcome(l: UnitOutcome, r: UnitOutcome) -> UnitOutcome {
    if l == UnitOutcome::Mismatch || r == UnitOutcome::Mismatch {
        return UnitOutcome::Mismatch;
    }
    if l.is_blank() {
        return r;
    }
    if r.is_blank() {
        return l;
    }
    match (l, r) {
        (UnitOutcome::Unit(a), UnitOutcome::Unit(b)) => {
            UnitOutcome::Unit(format!("{}.{}", a, b))
        }
        _ => unreachable!(),
    }
}

fn divide_outcome(l: UnitOutcome, r: UnitOutcome) -> UnitOutcome {
    if l == UnitOutcome::Mismatch || r == UnitOutcome::Mismatch {
        return UnitOutcome::Mismatch;
    }
    if l == r {
        return UnitOutcome::unit("");
    }
    if r.is_blank() {
        return l;
    }
    match (l, r) {
        (UnitOutcome::Unit(a), UnitOutcome::Unit(b)) => {
            UnitOutcome::Unit(format!("{}/{}", a, b))
        }
        (_, UnitOutcome::Unit(b)) => UnitOutcome::Unit(format!("1/{}", b)),
        _ => unreachable!(),
    }
}

fn apply_function_rule(
    registry: &FunctionUnitRegistry,
    name: &str,
    args: &[UnitOutcome],
) -> UnitOutcome {
    let first = args.first().cloned().unwrap_or(UnitOutcome::Untyped);
    match registry.rule(name) {
        Some(UnitRule::Fixed {
            unit,
            only_recognized_input,
        }) => {
            if first == UnitOutcome::Mismatch {
                return UnitOutcome::Mismatch;
            }
            let unrecognized = matches!(
                &first,
                UnitOutcome::Unit(u) if !u.is_empty() && canonical_unit(u).is_none()
            );
            if *only_recognized_input && unrecognized {
                // Unrecognized tag: leave it alone rather than guess
                first
            } else {
                UnitOutcome::unit(*unit)
            }
        }
        Some(UnitRule::Computed(f)) => f(args),
        Some(UnitRule::Passthrough) | None => first,
    }
}
