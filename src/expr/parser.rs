//! Expression Parser
//!
//! Parses rule-expression source text into an [`Expr`] tree using
//! precedence climbing over the token stream. No backtracking: cost is
//! linear in the token count, so long operator chains (dozens of `+`
//! terms) parse in well under the 100ms regression budget.
//!
//! Precedence, loosest to tightest:
//!
//! ```text
//! OR  <  AND  <  > >= < <= == !=  <  + -  <  * /  <  ! -(unary)  <  ^  <  .
//! ```
//!
//! `^` is right-associative; everything else associates left. `this.a.b`
//! parses as `((this.a).b)`.

use crate::expr::ast::{BinaryOp, Expr, TemporalFunc, UnaryOp};
use crate::expr::error::{ParseError, ParseResult};
use crate::expr::token::{lex, Token};
use crate::expr::units::{canonical_unit, normalize_unit};

/// Binding power of the unary operators: tighter than `* /`, looser
/// than `^`, so `-2^2` is `-(2^2)`
const UNARY_BP: u8 = 61;

/// Binding power of property access, the tightest operator
const PROPERTY_BP: u8 = 80;

/// Parse source text into an expression tree
///
/// Empty input parses to the constant `true`, matching the behavior rule
/// authors rely on for blank filter fields.
pub fn parse(input: &str) -> ParseResult<Expr> {
    let tokens = lex(input)?;
    if tokens.is_empty() {
        return Ok(Expr::boolean(true));
    }

    tracing::trace!(tokens = tokens.len(), "parsing expression");

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr(0)?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(ParseError::TrailingInput(token.to_string())),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    /// The most recently consumed token, for error context
    fn context(&self) -> String {
        if self.pos == 0 {
            "start of input".to_string()
        } else {
            self.tokens[self.pos - 1].to_string()
        }
    }

    fn parse_expr(&mut self, min_bp: u8) -> ParseResult<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some(token) = self.peek() else { break };

            match token {
                Token::RParen | Token::RBrace | Token::Comma => break,

                // A trailing semicolon is ignored; otherwise it conjoins
                Token::Semicolon => {
                    if self.pos + 1 == self.tokens.len() {
                        self.advance();
                        break;
                    }
                    if and_binding().0 < min_bp {
                        break;
                    }
                    self.advance();
                    let rhs = self.parse_expr(and_binding().1)?;
                    lhs = Expr::binary(BinaryOp::And, lhs, rhs);
                }

                Token::Dot => {
                    if PROPERTY_BP < min_bp {
                        break;
                    }
                    self.advance();
                    let name = match self.next() {
                        Some(Token::Ident(name)) | Some(Token::Bracketed(name)) => name,
                        Some(token) => {
                            return Err(ParseError::ExpectedPropertyName(token.to_string()))
                        }
                        None => return Err(ParseError::UnexpectedEnd(self.context())),
                    };
                    lhs = Expr::property(lhs, name);
                }

                // Word operators, or a unit of measure after an operand
                Token::Ident(word) => {
                    let (op, l_bp, r_bp) = match word.to_uppercase().as_str() {
                        "AND" => {
                            let (l, r) = and_binding();
                            (BinaryOp::And, l, r)
                        }
                        "OR" => (BinaryOp::Or, 10, 11),
                        _ => {
                            if canonical_unit(word).is_some() {
                                lhs.unit = Some(normalize_unit(word));
                                self.advance();
                                continue;
                            }
                            return Err(ParseError::UnexpectedToken(word.clone()));
                        }
                    };
                    if l_bp < min_bp {
                        break;
                    }
                    self.advance();
                    let rhs = self.parse_expr(r_bp)?;
                    lhs = Expr::binary(op, lhs, rhs);
                }

                // Serialized unit form `(5 + 5)[h]` re-attaches here
                Token::Bracketed(word) => {
                    if canonical_unit(word).is_some() {
                        lhs.unit = Some(normalize_unit(word));
                        self.advance();
                        continue;
                    }
                    return Err(ParseError::UnexpectedToken(format!("[{}]", word)));
                }

                _ => match symbol_binding(token) {
                    Some((op, l_bp, r_bp)) => {
                        if l_bp < min_bp {
                            break;
                        }
                        self.advance();
                        let rhs = self.parse_expr(r_bp)?;
                        lhs = Expr::binary(op, lhs, rhs);
                    }
                    None => return Err(ParseError::UnexpectedToken(token.to_string())),
                },
            }
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let token = self
            .next()
            .ok_or_else(|| ParseError::UnexpectedEnd(self.context()))?;

        match token {
            Token::Number(value) => Ok(self.attach_number_unit(Expr::number(value))),

            Token::Text(text) => Ok(Expr::text(text)),

            Token::Bracketed(name) => Ok(Expr::variable(name)),

            Token::Ident(word) => match word.to_uppercase().as_str() {
                "TRUE" => Ok(Expr::boolean(true)),
                "FALSE" => Ok(Expr::boolean(false)),
                "NULL" => Ok(Expr::null()),
                "PI" => Ok(Expr::number(std::f64::consts::PI)),
                "NOT" => Ok(Expr::unary(UnaryOp::Not, self.parse_expr(UNARY_BP)?)),
                "AND" | "OR" => Err(ParseError::ExpectedOperand(word)),
                _ => {
                    if self.peek() == Some(&Token::LParen) {
                        self.advance();
                        self.finish_call(word)
                    } else {
                        Ok(Expr::variable(word))
                    }
                }
            },

            Token::LParen => {
                let inner = self.parse_expr(0)?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(ParseError::MismatchedParentheses(self.context())),
                }
            }

            Token::LBrace => {
                let items = self.parse_sequence(Token::RBrace)?;
                Ok(Expr::array(items))
            }

            Token::Minus => Ok(Expr::unary(UnaryOp::Minus, self.parse_expr(UNARY_BP)?)),

            Token::Bang => Ok(Expr::unary(UnaryOp::Not, self.parse_expr(UNARY_BP)?)),

            other => Err(ParseError::ExpectedOperand(other.to_string())),
        }
    }

    /// A unit suffix directly after a numeric literal: any identifier
    /// attaches (unrecognized tags stay verbatim), as do `%` and the
    /// serialized `[unit]` form. Word operators do not.
    fn attach_number_unit(&mut self, mut expr: Expr) -> Expr {
        match self.peek() {
            Some(Token::Ident(word)) => {
                if matches!(word.to_uppercase().as_str(), "AND" | "OR" | "NOT") {
                    return expr;
                }
                expr.unit = Some(normalize_unit(word));
                self.advance();
            }
            Some(Token::Percent) => {
                expr.unit = Some("%".to_string());
                self.advance();
            }
            Some(Token::Bracketed(word)) => {
                expr.unit = Some(normalize_unit(word));
                self.advance();
            }
            _ => {}
        }
        expr
    }

    /// Arguments up to the closing token, commas between
    fn parse_sequence(&mut self, closer: Token) -> ParseResult<Vec<Expr>> {
        let mut items = Vec::new();
        if self.peek() == Some(&closer) {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr(0)?);
            match self.next() {
                Some(token) if token == closer => return Ok(items),
                Some(Token::Comma) => continue,
                Some(token) => return Err(ParseError::UnexpectedToken(token.to_string())),
                None => return Err(ParseError::MismatchedParentheses(closer.to_string())),
            }
        }
    }

    /// Build the node for `name(args...)`; temporal names route their
    /// final duration argument to the `period` slot
    fn finish_call(&mut self, name: String) -> ParseResult<Expr> {
        let args = self.parse_sequence(Token::RParen)?;
        let upper = name.to_uppercase();

        if upper == "FAILED" {
            if args.len() != 1 {
                return Err(ParseError::BadArity {
                    name: "FAILED".to_string(),
                    count: args.len(),
                });
            }
            let child = args.into_iter().next().expect("one argument");
            return Ok(Expr::failed(child));
        }

        if let Some(func) = TemporalFunc::from_name(&upper) {
            let count = args.len();
            let mut args = args.into_iter();
            return match (args.next(), args.next(), args.next()) {
                (Some(child), None, None) => Ok(Expr::aggregate(func, child)),
                (Some(child), Some(period), None) if func != TemporalFunc::Sum => {
                    Ok(Expr::temporal(func, child, period))
                }
                _ => Err(ParseError::BadArity {
                    name: func.name().to_string(),
                    count,
                }),
            };
        }

        Ok(Expr::function(name, args))
    }
}

/// `;` and `AND` share this slot
fn and_binding() -> (u8, u8) {
    (20, 21)
}

fn symbol_binding(token: &Token) -> Option<(BinaryOp, u8, u8)> {
    Some(match token {
        Token::Pipe => (BinaryOp::Or, 10, 11),
        Token::Amp => (BinaryOp::And, 20, 21),
        Token::Gt => (BinaryOp::Greater, 30, 31),
        Token::Ge => (BinaryOp::GreaterOrEqual, 30, 31),
        Token::Lt => (BinaryOp::Less, 30, 31),
        Token::Le => (BinaryOp::LessOrEqual, 30, 31),
        Token::EqEq => (BinaryOp::Equal, 30, 31),
        Token::Ne => (BinaryOp::NotEqual, 30, 31),
        Token::Plus => (BinaryOp::Add, 40, 41),
        Token::Minus => (BinaryOp::Subtract, 40, 41),
        Token::Star => (BinaryOp::Multiply, 50, 51),
        Token::Slash => (BinaryOp::Divide, 50, 51),
        // Right-associative: the right side climbs from the same power
        Token::Caret => (BinaryOp::Power, 70, 70),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::ast::ExprKind;

    fn canon(source: &str) -> String {
        parse(source).unwrap().serialize()
    }

    /// The canonical form must be a fixed point of parse-then-serialize
    fn assert_stable(source: &str) {
        let once = canon(source);
        let twice = canon(&once);
        assert_eq!(once, twice, "canonical form of {:?} is unstable", source);
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(canon("1"), "1");
        assert_eq!(canon("-200"), "-200");
        assert_eq!(canon("-202.2"), "-202.2");
    }

    #[test]
    fn test_parse_degree_character() {
        assert_eq!(canon("5°C"), "5[degC]");
        assert_stable("5°C");
    }

    #[test]
    fn test_parse_unidentified_unit() {
        assert_eq!(canon("(1occ) + 1occ + 5"), "1[occ] + 1[occ] + 5");
        assert_stable("(1occ) + 1occ + 5");
    }

    #[test]
    fn test_parse_percentages() {
        assert_eq!(canon("10%"), "10[%]");
        assert_eq!(canon("110%"), "110[%]");
        assert_stable("10%");
    }

    #[test]
    fn test_parse_variable_names() {
        for name in ["A", "Aa1234_", "_abcd", "$_abcd", "débit", "hôpital", "ancêtre", "août"]
        {
            let expr = parse(name).unwrap();
            assert!(matches!(&expr.kind, ExprKind::Variable(n) if n == name));
            assert_eq!(expr.serialize(), name);
        }
    }

    #[test]
    fn test_parse_bracketed_simple_names_drop_brackets() {
        for name in ["A", "Aa1234_", "_abcd"] {
            assert_eq!(canon(&format!("[{}]", name)), name);
        }
    }

    #[test]
    fn test_parse_bracketed_special_names_keep_brackets() {
        assert_eq!(canon("[foo bar]"), "[foo bar]");
        assert_eq!(canon("[A;1]"), "[A;1]");
        assert_eq!(canon("[Débitd'eau]"), "[Débitd'eau]");
        assert_stable("[foo bar]");
    }

    #[test]
    fn test_parse_strings_normalize_to_double_quotes() {
        assert_eq!(canon("\"A\""), "\"A\"");
        assert_eq!(canon("'B'"), "\"B\"");
        assert_stable("'B'");
    }

    #[test]
    fn test_parse_functions() {
        assert_eq!(canon("A(5)"), "A(5)");
        assert_eq!(canon("foo(2, 3)"), "foo(2,3)");
        assert_eq!(canon("bar(0, 'str', 5.4)"), "bar(0,\"str\",5.4)");
    }

    #[test]
    fn test_parse_failed_function() {
        let expr = parse("OPTION(FAILED([dtmi:com:example:AirHumiditySetpoint;1]))").unwrap();
        let ExprKind::Function { name, args } = &expr.kind else {
            panic!("expected function call, got {:?}", expr.kind);
        };
        assert_eq!(name, "OPTION");
        assert_eq!(args.len(), 1);
        assert!(matches!(&args[0].kind, ExprKind::Failed(_)));
        assert_eq!(
            expr.serialize(),
            "OPTION(FAILED([dtmi:com:example:AirHumiditySetpoint;1]))"
        );
    }

    #[test]
    fn test_parse_numeric_expressions() {
        assert_eq!(canon("1 + 2 + 3 + B"), "1 + 2 + 3 + B");
        assert_eq!(canon("1 + 5 * 6 / A - 2 * 3"), "(1 + (5 * 6) / A) - 2 * 3");
        assert_eq!(canon("1 + 2 - 3 * 4 / 5 ^ 6"), "(1 + 2) - (3 * 4) / 5^6");
        assert_stable("1 + 5 * 6 / A - 2 * 3");
        assert_stable("1 + 2 - 3 * 4 / 5 ^ 6");
    }

    #[test]
    fn test_parse_power_expression() {
        assert_eq!(canon("A^3"), "A^3");
        // Right-associative
        assert_eq!(canon("2^3^4"), "2^(3^4)");
        assert_stable("2^3^4");
    }

    #[test]
    fn test_parse_comparison_expressions() {
        assert_eq!(canon("A > 23"), "A > 23");
        assert_eq!(canon("B <= 27"), "B <= 27");
        assert_eq!(canon("'abc' >= 0.5"), "\"abc\" >= 0.5");
        assert_eq!(canon("a = 1"), "a == 1");
    }

    #[test]
    fn test_parse_logical_expressions() {
        let expr = parse("(A & B) OR !C").unwrap();
        assert_eq!(expr.unbound_variables().len(), 3);
        assert_eq!(expr.serialize(), "(A & B) | !C");

        let expr = parse("!( A OR !( B & C OR D))").unwrap();
        assert_eq!(expr.unbound_variables().len(), 4);
        assert_eq!(expr.serialize(), "!(A | !((B & C) | D))");

        let expr = parse("a < 5 AND b >= 6").unwrap();
        assert_eq!(expr.unbound_variables().len(), 2);
        assert_eq!(expr.serialize(), "a < 5 & b >= 6");
    }

    #[test]
    fn test_parse_not_keyword() {
        assert_eq!(canon("NOT a"), "!a");
        assert_eq!(canon("not (a | b)"), "!(a | b)");
    }

    #[test]
    fn test_parse_semicolon_conjunction() {
        assert_eq!(canon("a > 5; b < 3"), "a > 5 & b < 3");
        assert_eq!(canon("a > 5;"), "a > 5");
    }

    #[test]
    fn test_real_example_precedence() {
        let expr = parse("([air_flow_sp_ratio] > 1.1) & [damper_cmd] < 0.05").unwrap();
        assert_eq!(expr.unbound_variables().len(), 2);
        assert_eq!(
            expr.serialize(),
            "air_flow_sp_ratio > 1.1 & damper_cmd < 0.05"
        );
    }

    #[test]
    fn test_parse_arrays() {
        let expr = parse("{1, 2, 3}").unwrap();
        assert!(expr.unbound_variables().is_empty());
        assert_eq!(expr.serialize(), "{1,2,3}");
    }

    #[test]
    fn test_parse_aggregate_on_array() {
        assert_eq!(canon("AVERAGE({1, 2, 3})"), "AVERAGE({1,2,3})");
    }

    #[test]
    fn test_parse_temporal_with_period() {
        let expr = parse("AVERAGE({1, 2, 3}, 5h)").unwrap();
        let ExprKind::Temporal { func, period, .. } = &expr.kind else {
            panic!("expected temporal node");
        };
        assert_eq!(*func, TemporalFunc::Average);
        let period = period.as_ref().unwrap();
        assert!(matches!(
            &period.kind,
            ExprKind::Constant(crate::expr::ast::Literal::Number(n)) if *n == 5.0
        ));
        assert_eq!(period.unit.as_deref(), Some("h"));
        assert_eq!(expr.serialize(), "AVERAGE({1,2,3},5[h])");
        assert_stable("AVERAGE({1, 2, 3}, 5h)");
    }

    #[test]
    fn test_parse_temporal_with_period_expression() {
        let expr = parse("AVERAGE({1, 2, 3}, (5 + 5)h)").unwrap();
        let ExprKind::Temporal { period, .. } = &expr.kind else {
            panic!("expected temporal node");
        };
        let period = period.as_ref().unwrap();
        assert!(matches!(&period.kind, ExprKind::Binary { op: BinaryOp::Add, .. }));
        assert_eq!(period.unit.as_deref(), Some("h"));
        assert_eq!(expr.serialize(), "AVERAGE({1,2,3},(5 + 5)[h])");
        assert_stable("AVERAGE({1, 2, 3}, (5 + 5)h)");
    }

    #[test]
    fn test_parse_temporal_family() {
        for (source, name) in [
            ("DELTA({1, 2, 3}, 5h)", "DELTA"),
            ("STND({6, 2, 3, 1}, 5h)", "STND"),
            ("SLOPE({6, 2, 3, 1}, 5h)", "SLOPE"),
            ("FORECAST({6, 2, 3, 1}, 5h)", "FORECAST"),
        ] {
            let expr = parse(source).unwrap();
            let ExprKind::Temporal { func, period, .. } = &expr.kind else {
                panic!("expected temporal node for {}", source);
            };
            assert_eq!(func.name(), name);
            assert_eq!(period.as_ref().unwrap().unit.as_deref(), Some("h"));
        }
    }

    #[test]
    fn test_parse_dual_property_access() {
        let expr = parse("this.supplyFan.motorPower").unwrap();
        assert_eq!(expr.serialize(), "(this.supplyFan).motorPower");

        let ExprKind::Property { child, name } = &expr.kind else {
            panic!("expected property access");
        };
        assert_eq!(name, "motorPower");
        let ExprKind::Property { child: inner, name } = &child.kind else {
            panic!("expected nested property access");
        };
        assert_eq!(name, "supplyFan");
        assert_eq!(inner.serialize(), "this");
    }

    #[test]
    fn test_parse_complex_property_access() {
        assert_eq!(
            canon("this.supplyFan.motorPower * [fan_speed]^3"),
            "(this.supplyFan).motorPower * fan_speed^3"
        );
        assert_eq!(
            canon("(this.supplyFan).motorPower * [fan_speed]^3"),
            "(this.supplyFan).motorPower * fan_speed^3"
        );
    }

    #[test]
    fn test_parse_multiple_multipliers() {
        assert_eq!(canon("a * b * c + 2"), "a * b * c + 2");
    }

    #[test]
    fn test_parse_constants() {
        assert_eq!(canon("true"), "true");
        assert_eq!(canon("FALSE"), "false");
        assert_eq!(canon("null"), "null");
        assert_eq!(canon(""), "true");
    }

    #[test]
    fn test_parse_unary_minus_binds_below_power() {
        assert_eq!(canon("-2^2"), "-2^2");
        let expr = parse("-2^2").unwrap();
        assert!(matches!(
            &expr.kind,
            ExprKind::Unary { op: UnaryOp::Minus, .. }
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("INVALID mood"),
            Err(ParseError::UnexpectedToken(_))
        ));
        assert!(matches!(
            parse("(a + b"),
            Err(ParseError::MismatchedParentheses(_))
        ));
        assert!(matches!(parse("a +"), Err(ParseError::UnexpectedEnd(_))));
        assert!(matches!(parse("AND b"), Err(ParseError::ExpectedOperand(_))));
        assert!(matches!(
            parse("FAILED(a, b, c)"),
            Err(ParseError::BadArity { .. })
        ));
    }

    #[test]
    fn test_parse_many_plus_in_timely_fashion() {
        let source = "[p1] + [p2] + [p3] + [p4] + [p5] + [p6] + [p7] + [p8] + [p9] + [p10] \
                      + [p11] + [p12] + [p13] + [p14] + [p15] + [p16] + [p17] + [p18] + [p19]";
        let started = std::time::Instant::now();
        let expr = parse(source).unwrap();
        assert!(
            started.elapsed() < std::time::Duration::from_millis(100),
            "parse took {:?}",
            started.elapsed()
        );
        assert_eq!(
            expr.serialize(),
            "p1 + p2 + p3 + p4 + p5 + p6 + p7 + p8 + p9 + p10 + p11 + p12 + p13 + p14 \
             + p15 + p16 + p17 + p18 + p19"
        );
    }

    #[test]
    fn test_unit_reattaches_from_serialized_form() {
        assert_eq!(canon("5[kWh]"), "5[kWh]");
        assert_eq!(canon("5 kWh"), "5[kWh]");
        assert_eq!(canon("(5 + 5)[h]"), "(5 + 5)[h]");
    }
}
