//! Expression Abstract Syntax Tree
//!
//! Defines the AST for building-automation rule expressions and its
//! canonical serialized form.
//!
//! # Example Expressions
//!
//! ```text
//! [zone_temp] > 21.1[degC] & [damper_cmd] < 0.05
//! AVERAGE([supply_temp],15[min]) - [setpoint]
//! UNDER([MS-PS-B122]) | UNDER([MS-PS-B121])
//! ```
//!
//! Trees are immutable once built: every analysis (units, twin filtering,
//! evaluation) walks a borrowed tree and produces a new value. The
//! canonical form is a fixed point: re-parsing a serialized expression and
//! serializing it again yields the identical string.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Serializer priority bands, low binds loosest
const PRI_LOGICAL: u8 = 3;
const PRI_COMPARE: u8 = 4;
const PRI_ADDITIVE: u8 = 5;
const PRI_MULTIPLICATIVE: u8 = 6;
const PRI_UNARY: u8 = 7;
const PRI_POWER: u8 = 8;
const PRI_PROPERTY: u8 = 9;
const PRI_ATOM: u8 = 10;

/// A literal constant value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Numeric constant
    Number(f64),
    /// String constant; canonical form prints double quotes
    Text(String),
    /// Boolean constant
    Bool(bool),
    /// The null constant
    Null,
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Text(s) => {
                write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
            }
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// Binary operators, in the language's precedence order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinaryOp {
    /// Operator text in the canonical serialized form
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Power => "^",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterOrEqual => ">=",
            BinaryOp::Less => "<",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::And => "&",
            BinaryOp::Or => "|",
        }
    }

    /// Commutative operators may chain without parentheses
    pub fn is_commutative(&self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Multiply | BinaryOp::And | BinaryOp::Or
        )
    }

    /// True for `> >= < <= == !=`
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Greater
                | BinaryOp::GreaterOrEqual
                | BinaryOp::Less
                | BinaryOp::LessOrEqual
                | BinaryOp::Equal
                | BinaryOp::NotEqual
        )
    }

    fn priority(&self) -> u8 {
        match self {
            BinaryOp::Or | BinaryOp::And => PRI_LOGICAL,
            op if op.is_comparison() => PRI_COMPARE,
            BinaryOp::Add | BinaryOp::Subtract => PRI_ADDITIVE,
            BinaryOp::Multiply | BinaryOp::Divide => PRI_MULTIPLICATIVE,
            BinaryOp::Power => PRI_POWER,
            _ => unreachable!(),
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Numeric negation
    Minus,
    /// Logical not
    Not,
}

/// Temporal (and plain aggregate) function names
///
/// With a time period these aggregate a trailing window of a time series;
/// with no period they fall back to a plain aggregate over an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemporalFunc {
    Average,
    Min,
    Max,
    Count,
    Sum,
    Any,
    All,
    Delta,
    DeltaTime,
    StandardDeviation,
    Slope,
    Forecast,
    CountLeading,
}

impl TemporalFunc {
    /// Canonical (serialized) function name
    pub fn name(&self) -> &'static str {
        match self {
            TemporalFunc::Average => "AVERAGE",
            TemporalFunc::Min => "MIN",
            TemporalFunc::Max => "MAX",
            TemporalFunc::Count => "COUNT",
            TemporalFunc::Sum => "SUM",
            TemporalFunc::Any => "ANY",
            TemporalFunc::All => "ALL",
            TemporalFunc::Delta => "DELTA",
            TemporalFunc::DeltaTime => "DELTA_TIME",
            TemporalFunc::StandardDeviation => "STND",
            TemporalFunc::Slope => "SLOPE",
            TemporalFunc::Forecast => "FORECAST",
            TemporalFunc::CountLeading => "COUNTLEADING",
        }
    }

    /// Look up by upper-cased name
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "AVERAGE" => TemporalFunc::Average,
            "MIN" => TemporalFunc::Min,
            "MAX" => TemporalFunc::Max,
            "COUNT" => TemporalFunc::Count,
            "SUM" => TemporalFunc::Sum,
            "ANY" => TemporalFunc::Any,
            "ALL" => TemporalFunc::All,
            "DELTA" => TemporalFunc::Delta,
            "DELTA_TIME" => TemporalFunc::DeltaTime,
            "STND" => TemporalFunc::StandardDeviation,
            "SLOPE" => TemporalFunc::Slope,
            "FORECAST" => TemporalFunc::Forecast,
            "COUNTLEADING" => TemporalFunc::CountLeading,
            _ => return None,
        })
    }
}

impl std::fmt::Display for TemporalFunc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The shape of one expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// A literal constant
    Constant(Literal),
    /// A reference to a named point, twin or binding
    Variable(String),
    /// Property access `child.name`
    Property { child: Box<Expr>, name: String },
    /// A call to a named (non-temporal) function
    Function { name: String, args: Vec<Expr> },
    /// A temporal aggregate; `period` is the trailing-window duration
    /// expression, kept apart from the aggregated child
    Temporal {
        func: TemporalFunc,
        child: Box<Expr>,
        period: Option<Box<Expr>>,
    },
    /// Array literal `{a,b,c}`
    Array(Vec<Expr>),
    /// A wrapped failure marker `FAILED(expr)`
    Failed(Box<Expr>),
    /// Unary negation or logical not
    Unary { op: UnaryOp, child: Box<Expr> },
    /// A binary operation
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// One expression node: a shape plus an optional unit of measure tag
///
/// A unit is attached by the parser (`21.1kWh`, `(5 + 5)h`) or computed by
/// the units visitor; `None` means untyped, `""` means dimensionless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub unit: Option<String>,
}

impl Expr {
    fn new(kind: ExprKind) -> Self {
        Self { kind, unit: None }
    }

    /// Numeric constant
    pub fn number(value: f64) -> Self {
        Self::new(ExprKind::Constant(Literal::Number(value)))
    }

    /// String constant
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Constant(Literal::Text(value.into())))
    }

    /// Boolean constant
    pub fn boolean(value: bool) -> Self {
        Self::new(ExprKind::Constant(Literal::Bool(value)))
    }

    /// The null constant
    pub fn null() -> Self {
        Self::new(ExprKind::Constant(Literal::Null))
    }

    /// Variable reference
    pub fn variable(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Variable(name.into()))
    }

    /// Property access on a child expression
    pub fn property(child: Expr, name: impl Into<String>) -> Self {
        Self::new(ExprKind::Property {
            child: Box::new(child),
            name: name.into(),
        })
    }

    /// Function call
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Function {
            name: name.into(),
            args,
        })
    }

    /// Plain aggregate (no time period)
    pub fn aggregate(func: TemporalFunc, child: Expr) -> Self {
        Self::new(ExprKind::Temporal {
            func,
            child: Box::new(child),
            period: None,
        })
    }

    /// Temporal aggregate over a trailing window
    pub fn temporal(func: TemporalFunc, child: Expr, period: Expr) -> Self {
        Self::new(ExprKind::Temporal {
            func,
            child: Box::new(child),
            period: Some(Box::new(period)),
        })
    }

    /// Array literal
    pub fn array(items: Vec<Expr>) -> Self {
        Self::new(ExprKind::Array(items))
    }

    /// Failure marker
    pub fn failed(child: Expr) -> Self {
        Self::new(ExprKind::Failed(Box::new(child)))
    }

    /// Unary operation
    pub fn unary(op: UnaryOp, child: Expr) -> Self {
        Self::new(ExprKind::Unary {
            op,
            child: Box::new(child),
        })
    }

    /// Binary operation
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Conjunction
    pub fn and(self, other: Expr) -> Self {
        Self::binary(BinaryOp::And, self, other)
    }

    /// Disjunction
    pub fn or(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Or, self, other)
    }

    /// Equality comparison
    pub fn equals(self, other: Expr) -> Self {
        Self::binary(BinaryOp::Equal, self, other)
    }

    /// Attach a unit of measure tag
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Serializer priority; a unit-carrying node is self-delimiting
    fn priority(&self) -> u8 {
        if matches!(&self.unit, Some(u) if !u.is_empty()) {
            return PRI_ATOM;
        }
        match &self.kind {
            ExprKind::Binary { op, .. } => op.priority(),
            ExprKind::Unary { .. } => PRI_UNARY,
            ExprKind::Property { .. } => PRI_PROPERTY,
            _ => PRI_ATOM,
        }
    }

    /// Render the canonical form of this expression
    ///
    /// Parenthesization is minimal but stable: a child is wrapped when it
    /// binds looser than its parent, or equally without being the same
    /// commutative operator. `serialize(parse(s))` is a fixed point for
    /// every valid `s`.
    pub fn serialize(&self) -> String {
        let base = self.kind_string();
        match &self.unit {
            Some(unit) if !unit.is_empty() => {
                if kind_priority(&self.kind) == PRI_ATOM {
                    format!("{}[{}]", base, unit)
                } else {
                    format!("({})[{}]", base, unit)
                }
            }
            _ => base,
        }
    }

    fn kind_string(&self) -> String {
        match &self.kind {
            ExprKind::Constant(lit) => lit.to_string(),
            ExprKind::Variable(name) => render_name(name),
            ExprKind::Property { child, name } => format!(
                "{}.{}",
                wrap_child(child, PRI_PROPERTY, None),
                render_name(name)
            ),
            ExprKind::Function { name, args } => {
                format!("{}({})", name, join_serialized(args))
            }
            ExprKind::Temporal {
                func,
                child,
                period,
            } => match period {
                Some(period) => {
                    format!(
                        "{}({},{})",
                        func.name(),
                        child.as_ref().serialize(),
                        period.as_ref().serialize()
                    )
                }
                None => format!("{}({})", func.name(), child.as_ref().serialize()),
            },
            ExprKind::Array(items) => format!("{{{}}}", join_serialized(items)),
            ExprKind::Failed(child) => format!("FAILED({})", child.as_ref().serialize()),
            ExprKind::Unary { op, child } => {
                let symbol = match op {
                    UnaryOp::Minus => "-",
                    UnaryOp::Not => "!",
                };
                format!("{}{}", symbol, wrap_child(child, PRI_UNARY, None))
            }
            ExprKind::Binary { op, left, right } => {
                let l = wrap_child(left, op.priority(), Some(*op));
                let r = wrap_child(right, op.priority(), Some(*op));
                match op {
                    BinaryOp::Power => format!("{}^{}", l, r),
                    _ => format!("{} {} {}", l, op.symbol(), r),
                }
            }
        }
    }

    /// Root names of all variable and property-chain references,
    /// reachable transitively from this node
    pub fn unbound_variables(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.collect_unbound(&mut set);
        set
    }

    fn collect_unbound(&self, set: &mut BTreeSet<String>) {
        match &self.kind {
            ExprKind::Constant(_) => {}
            ExprKind::Variable(name) => {
                set.insert(name.clone());
            }
            ExprKind::Property { child, .. } => match self.root_name() {
                Some(root) => {
                    set.insert(root.to_string());
                }
                None => child.collect_unbound(set),
            },
            ExprKind::Function { args, .. } => {
                for arg in args {
                    arg.collect_unbound(set);
                }
            }
            ExprKind::Temporal { child, period, .. } => {
                child.collect_unbound(set);
                if let Some(period) = period {
                    period.collect_unbound(set);
                }
            }
            ExprKind::Array(items) => {
                for item in items {
                    item.collect_unbound(set);
                }
            }
            ExprKind::Failed(child) | ExprKind::Unary { child, .. } => {
                child.collect_unbound(set)
            }
            ExprKind::Binary { left, right, .. } => {
                left.collect_unbound(set);
                right.collect_unbound(set);
            }
        }
    }

    /// The root variable name of a `Variable` or `Property` chain
    pub fn root_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Variable(name) => Some(name),
            ExprKind::Property { child, .. } => child.root_name(),
            _ => None,
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.serialize())
    }
}

fn kind_priority(kind: &ExprKind) -> u8 {
    match kind {
        ExprKind::Binary { op, .. } => op.priority(),
        ExprKind::Unary { .. } => PRI_UNARY,
        ExprKind::Property { .. } => PRI_PROPERTY,
        _ => PRI_ATOM,
    }
}

fn join_serialized(items: &[Expr]) -> String {
    items
        .iter()
        .map(|item| item.serialize())
        .collect::<Vec<_>>()
        .join(",")
}

fn wrap_child(child: &Expr, parent_priority: u8, parent_op: Option<BinaryOp>) -> String {
    let child_priority = child.priority();
    let chains_bare = match (parent_op, &child.kind) {
        (Some(parent), ExprKind::Binary { op, .. }) => {
            *op == parent && parent.is_commutative()
        }
        _ => false,
    };
    if child_priority < parent_priority || (child_priority == parent_priority && !chains_bare)
    {
        format!("({})", child.serialize())
    } else {
        child.serialize()
    }
}

/// Names reserved by the grammar; a variable spelled like one must print
/// in brackets to survive re-parsing
const RESERVED_NAMES: &[&str] = &["and", "or", "not", "true", "false", "null", "pi"];

/// Would this name lex back as a single bare identifier?
pub(crate) fn is_simple_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = chars
        .next()
        .map(|c| c.is_alphabetic() || c == '_' || c == '$')
        .unwrap_or(false);
    starts_ok
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !RESERVED_NAMES.contains(&name.to_lowercase().as_str())
}

fn render_name(name: &str) -> String {
    if is_simple_name(name) {
        name.to_string()
    } else {
        format!("[{}]", name)
    }
}
