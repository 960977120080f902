//! # Twinscript
//!
//! Building Automation Rule Intelligence - A Rust library for parsing,
//! analyzing, and compiling building-automation rule expressions over
//! digital twins.
//!
//! ## Features
//!
//! - **Expression compiler**: lexer and precedence-climbing parser with a
//!   stable canonical serialized form
//! - **Unit analysis**: physical-unit propagation and validation across
//!   expression trees
//! - **Twin filtering**: splits selection expressions into a server-side
//!   graph query and a client-side residual predicate
//! - **Temporal aggregation**: time-weighted statistics with boundary
//!   interpolation over irregular time series
//!
//! ## Modules
//!
//! - [`expr`]: the expression language (tokens, parser, AST, units,
//!   evaluation)
//! - [`twin`]: twin filter compilation and client predicates
//! - [`temporal`]: time-weighted aggregation
//! - [`config`]: TOML/environment configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use twinscript::expr::{parse, unit_of};
//! use twinscript::twin::{filter_twins, DefaultClassifier, FilterOptions, FilterStatus};
//!
//! // Parse a rule expression into its canonical form
//! let expr = parse("[zone_temp] > 21.1degC & [damper_cmd] < 5%").unwrap();
//! assert_eq!(expr.serialize(), "zone_temp > 21.1[degC] & damper_cmd < 5[%]");
//!
//! // Check the units line up
//! assert_eq!(unit_of(&expr), "bool");
//!
//! // Split a twin selection into server query and client residual
//! let filter = parse("[dtmi:com:example:AirHandlingUnit;1]").unwrap();
//! let result = filter_twins(&filter, &DefaultClassifier, &FilterOptions::default());
//! assert_eq!(result.status, FilterStatus::ServerSide);
//! ```

pub mod config;
pub mod expr;
pub mod temporal;
pub mod twin;

// Re-export top-level types for convenience
pub use expr::{
    eval, parse, unit_of, BinaryOp, EvalContext, EvalError, Expr, ExprKind, Literal, ParseError,
    SeriesProvider, TemporalFunc, UnaryOp, Value,
};

pub use temporal::{TimedValue, Window};

pub use twin::{
    filter_twins, DefaultClassifier, FilterOptions, FilterResult, FilterStatus, FunctionRegistry,
    TwinClassifier, TwinPredicate,
};

pub use config::{Config, ConfigError, LoggingConfig, TemporalConfig};
