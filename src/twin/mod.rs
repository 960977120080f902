//! Twin Filter Compilation
//!
//! The compiler back half for twin selection: classifies a boolean
//! expression over twin references into server-executable and
//! client-executable parts.
//!
//! - **model**: twin-id / model-id classification
//! - **filter**: the server/client splitting visitor and query assembly
//! - **predicate**: compiles residuals into native predicates over a
//!   caller-chosen context type
//!
//! # Example
//!
//! ```rust
//! use twinscript::expr::parse;
//! use twinscript::twin::{filter_twins, DefaultClassifier, FilterOptions, FilterStatus};
//!
//! let expr = parse("UNDER([MS-PS-B122]) | UNDER([MS-PS-B121])").unwrap();
//! let result = filter_twins(&expr, &DefaultClassifier, &FilterOptions::default());
//! assert_eq!(result.status, FilterStatus::ServerSide);
//! assert!(result.server_query.unwrap().contains("ancestor.$dtId IN"));
//! ```

pub mod filter;
pub mod model;
pub mod predicate;

pub use filter::{filter_twins, FilterOptions, FilterResult, FilterStatus};
pub use model::{safe_id, DefaultClassifier, TwinClassifier, TwinRefKind};
pub use predicate::{compile, FunctionRegistry, TwinPredicate};
