//! Expression error types
//!
//! Defines all error conditions that can occur while lexing, parsing and
//! evaluating rule expressions.

use thiserror::Error;

/// Errors raised while turning source text into an expression tree
///
/// Every variant carries the offending fragment of the input so rule
/// authors can see where validation failed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// Input ended inside a quoted string
    #[error("Unterminated string: {0}")]
    UnterminatedString(String),

    /// Input ended inside a bracketed reference
    #[error("Unterminated bracket: {0}")]
    UnterminatedBracket(String),

    /// A character no token can start with
    #[error("Unexpected character: {0}")]
    UnexpectedCharacter(String),

    /// A numeric literal that could not be read as a number
    #[error("Malformed number: {0}")]
    MalformedNumber(String),

    /// The parser expected a value and found something else
    #[error("Expected a value near: {0}")]
    ExpectedOperand(String),

    /// The parser expected an operator, comma or end of expression
    #[error("Unexpected token: {0}, expected an operator, comma, or end of expression")]
    UnexpectedToken(String),

    /// An opening parenthesis or brace with no matching close
    #[error("Parentheses mismatch near: {0}")]
    MismatchedParentheses(String),

    /// The expression ended where more input was required
    #[error("Incomplete expression after: {0}")]
    UnexpectedEnd(String),

    /// A built-in function called with the wrong number of arguments
    #[error("{name}() does not take {count} arguments")]
    BadArity { name: String, count: usize },

    /// A property access whose right-hand side is not a name
    #[error("Expected a property name after '.': {0}")]
    ExpectedPropertyName(String),

    /// Input remaining after a complete expression
    #[error("Unexpected input after expression: {0}")]
    TrailingInput(String),
}

/// Result type for parse operations
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors raised while evaluating an expression tree
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    /// A variable with no binding in the evaluation context
    #[error("Unbound variable: {0}")]
    UnboundVariable(String),

    /// A function with no entry in the registry
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// An operation applied to values of the wrong type
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// A FAILED(...) marker was reached during evaluation
    #[error("Expression wraps a failed binding: {0}")]
    FailedExpression(String),

    /// A temporal function referenced a name with no time series
    #[error("No time series bound for: {0}")]
    MissingSeries(String),

    /// A temporal function's time period did not evaluate to a duration
    #[error("Invalid time period: {0}")]
    BadTimePeriod(String),

    /// A temporal window had no data to aggregate
    #[error("Insufficient data in window for: {0}")]
    InsufficientData(String),

    /// A time series violated the ascending-timestamp precondition
    /// (only reported when the monotonicity check is enabled)
    #[error("Time series is not strictly ascending: {0}")]
    UnorderedSeries(String),
}

/// Result type for evaluation
pub type EvalResult<T> = Result<T, EvalError>;
