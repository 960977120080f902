//! Rule Expression Language
//!
//! The compiler front half: lexing, parsing, canonical serialization,
//! unit analysis and evaluation of building-automation rule expressions.
//!
//! # Expression Language
//!
//! ```text
//! [zone_temp] > 21.1degC & [damper_cmd] < 5%
//! AVERAGE([supply_temp], 15min) - [setpoint] > 2
//! UNDER([MS-PS-B122]) | [dtmi:com:example:AirHandlingUnit;1]
//! OPTION(FAILED([raw_sensor]), [fallback_sensor])
//! ```
//!
//! # Examples
//!
//! ## Parse and re-serialize
//!
//! ```rust
//! use twinscript::expr::parse;
//!
//! let expr = parse("1 + 5 * 6 / A - 2 * 3").unwrap();
//! assert_eq!(expr.serialize(), "(1 + (5 * 6) / A) - 2 * 3");
//! ```
//!
//! ## Unit analysis
//!
//! ```rust
//! use twinscript::expr::{parse, unit_of};
//!
//! assert_eq!(unit_of(&parse("5kWh + 3kWh").unwrap()), "kWh");
//! assert_eq!(unit_of(&parse("5kWh + 3km").unwrap()), "error");
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod parser;
pub mod token;
pub mod units;

pub use ast::{BinaryOp, Expr, ExprKind, Literal, TemporalFunc, UnaryOp};
pub use error::{EvalError, EvalResult, ParseError, ParseResult};
pub use eval::{eval, EvalContext, SeriesProvider, Value};
pub use parser::parse;
pub use token::{lex, Token};
pub use units::{
    canonical_unit, normalize_unit, time_unit_millis, unit_of, unit_outcome,
    FunctionUnitRegistry, UnitOutcome, UnitRule, BOOL_UNIT, ERROR_UNIT,
};
