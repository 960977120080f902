//! Expression lexer
//!
//! Converts rule-expression source text into a token stream. Numeric
//! literals, quoted strings (single or double), bracketed references that
//! preserve arbitrary interior characters (`[dtmi:com:example:Zone;1]`,
//! `[foo bar]`), Unicode identifiers, and the operator set
//! `+ - * / ^ ( ) { } , . ! & | > >= < <= == != = ;`.
//!
//! Unit suffixes are not resolved here: `5h` lexes as `Number(5)` followed
//! by `Ident("h")` and the parser decides whether the identifier attaches
//! as a unit. The degree sign starts an identifier so `5°C` lexes as
//! `Number(5)`, `Ident("°C")`.

use nom::{
    bytes::complete::{take_while, take_while_m_n},
    character::complete::{char, digit1},
    combinator::{opt, recognize},
    sequence::{pair, preceded},
    IResult,
};

use crate::expr::error::{ParseError, ParseResult};

/// A single lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Numeric literal
    Number(f64),
    /// Quoted string literal (quotes removed, escapes resolved)
    Text(String),
    /// Bracketed reference `[...]` with the raw interior preserved
    Bracketed(String),
    /// Bare identifier (also carries the word operators AND/OR/NOT)
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Bang,
    Amp,
    Pipe,
    Gt,
    Ge,
    Lt,
    Le,
    EqEq,
    Ne,
    Semicolon,
    Percent,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{}", n),
            Token::Text(s) => write!(f, "\"{}\"", s),
            Token::Bracketed(s) => write!(f, "[{}]", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Caret => write!(f, "^"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::Comma => write!(f, ","),
            Token::Dot => write!(f, "."),
            Token::Bang => write!(f, "!"),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::Gt => write!(f, ">"),
            Token::Ge => write!(f, ">="),
            Token::Lt => write!(f, "<"),
            Token::Le => write!(f, "<="),
            Token::EqEq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Semicolon => write!(f, ";"),
            Token::Percent => write!(f, "%"),
        }
    }
}

/// Truncate an input fragment for inclusion in an error message
fn fragment(input: &str) -> String {
    let mut end = input.len().min(32);
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    input[..end].to_string()
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$' || c == '°'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Bare identifier: Unicode letters, digits, underscore; may start with
/// `_`, `$` or the degree sign
fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while_m_n(1, 1, is_ident_start),
        take_while(is_ident_continue),
    ))(input)
}

/// Numeric literal: digits with an optional fractional part
fn number(input: &str) -> IResult<&str, &str> {
    recognize(pair(digit1, opt(preceded(char('.'), digit1))))(input)
}

/// Scan a quoted string starting at `input` (which begins with the quote)
fn scan_quoted(input: &str, quote: char) -> ParseResult<(usize, String)> {
    let mut out = String::new();
    let mut chars = input.char_indices().skip(1);
    // Double-quoted strings support \" and \\ escapes; single-quoted are raw
    let escapes = quote == '"';

    while let Some((i, c)) = chars.next() {
        if c == quote {
            return Ok((i + c.len_utf8(), out));
        }
        if escapes && c == '\\' {
            match chars.next() {
                Some((_, e @ ('"' | '\\'))) => out.push(e),
                Some((_, e)) => {
                    out.push('\\');
                    out.push(e);
                }
                None => break,
            }
            continue;
        }
        out.push(c);
    }

    Err(ParseError::UnterminatedString(fragment(input)))
}

/// Convert source text to tokens
pub fn lex(input: &str) -> ParseResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let (consumed, token) = scan_token(rest)?;
        tokens.push(token);
        rest = rest[consumed..].trim_start();
    }

    Ok(tokens)
}

/// Scan one token from the front of `rest`, returning bytes consumed
fn scan_token(rest: &str) -> ParseResult<(usize, Token)> {
    // Two-character operators first
    for (text, token) in [
        (">=", Token::Ge),
        ("<=", Token::Le),
        ("==", Token::EqEq),
        ("!=", Token::Ne),
        ("&&", Token::Amp),
        ("||", Token::Pipe),
    ] {
        if rest.starts_with(text) {
            return Ok((text.len(), token));
        }
    }

    let first = rest.chars().next().expect("rest is non-empty");

    let single = match first {
        '+' => Some(Token::Plus),
        '-' => Some(Token::Minus),
        '*' => Some(Token::Star),
        '/' => Some(Token::Slash),
        '^' => Some(Token::Caret),
        '(' => Some(Token::LParen),
        ')' => Some(Token::RParen),
        '{' => Some(Token::LBrace),
        '}' => Some(Token::RBrace),
        ',' => Some(Token::Comma),
        '.' => Some(Token::Dot),
        '!' => Some(Token::Bang),
        '&' => Some(Token::Amp),
        '|' => Some(Token::Pipe),
        '>' => Some(Token::Gt),
        '<' => Some(Token::Lt),
        '=' => Some(Token::EqEq),
        ';' => Some(Token::Semicolon),
        '%' => Some(Token::Percent),
        _ => None,
    };
    if let Some(token) = single {
        return Ok((first.len_utf8(), token));
    }

    if first == '\'' || first == '"' {
        let (consumed, text) = scan_quoted(rest, first)?;
        return Ok((consumed, Token::Text(text)));
    }

    if let Some(interior) = rest.strip_prefix('[') {
        return match interior.find(']') {
            Some(end) => Ok((end + 2, Token::Bracketed(interior[..end].to_string()))),
            None => Err(ParseError::UnterminatedBracket(fragment(rest))),
        };
    }

    if first.is_ascii_digit() {
        let (remaining, text) = number(rest)
            .map_err(|_| ParseError::MalformedNumber(fragment(rest)))?;
        let value: f64 = text
            .parse()
            .map_err(|_| ParseError::MalformedNumber(fragment(rest)))?;
        return Ok((rest.len() - remaining.len(), Token::Number(value)));
    }

    if is_ident_start(first) {
        let (remaining, text) = identifier(rest)
            .map_err(|_| ParseError::UnexpectedCharacter(fragment(rest)))?;
        return Ok((rest.len() - remaining.len(), Token::Ident(text.to_string())));
    }

    Err(ParseError::UnexpectedCharacter(fragment(rest)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lex_numbers() {
        assert_eq!(lex("1").unwrap(), vec![Token::Number(1.0)]);
        assert_eq!(lex("202.5").unwrap(), vec![Token::Number(202.5)]);
        assert_eq!(
            lex("-200").unwrap(),
            vec![Token::Minus, Token::Number(200.0)]
        );
    }

    #[test]
    fn test_lex_number_with_unit_suffix() {
        assert_eq!(
            lex("21.1kWh").unwrap(),
            vec![Token::Number(21.1), Token::Ident("kWh".to_string())]
        );
        assert_eq!(
            lex("10%").unwrap(),
            vec![Token::Number(10.0), Token::Percent]
        );
        assert_eq!(
            lex("5°C").unwrap(),
            vec![Token::Number(5.0), Token::Ident("°C".to_string())]
        );
    }

    #[test]
    fn test_lex_strings_both_quote_styles() {
        assert_eq!(lex("'abc'").unwrap(), vec![Token::Text("abc".to_string())]);
        assert_eq!(
            lex("\"abc\"").unwrap(),
            vec![Token::Text("abc".to_string())]
        );
    }

    #[test]
    fn test_lex_string_escapes() {
        assert_eq!(
            lex(r#""a\"b""#).unwrap(),
            vec![Token::Text("a\"b".to_string())]
        );
    }

    #[test]
    fn test_lex_unterminated_string() {
        assert!(matches!(
            lex("'abc"),
            Err(ParseError::UnterminatedString(_))
        ));
    }

    #[test]
    fn test_lex_bracketed_preserves_interior() {
        assert_eq!(
            lex("[dtmi:com:example:Zone;1]").unwrap(),
            vec![Token::Bracketed("dtmi:com:example:Zone;1".to_string())]
        );
        assert_eq!(
            lex("[foo bar]").unwrap(),
            vec![Token::Bracketed("foo bar".to_string())]
        );
        assert_eq!(
            lex("[Débitd'eau]").unwrap(),
            vec![Token::Bracketed("Débitd'eau".to_string())]
        );
    }

    #[test]
    fn test_lex_unterminated_bracket() {
        assert!(matches!(
            lex("[abc"),
            Err(ParseError::UnterminatedBracket(_))
        ));
    }

    #[test]
    fn test_lex_unicode_identifiers() {
        for name in ["débit", "hôpital", "ancêtre", "août", "_abcd", "$_abcd"] {
            assert_eq!(lex(name).unwrap(), vec![Token::Ident(name.to_string())]);
        }
    }

    #[test]
    fn test_lex_operators() {
        assert_eq!(
            lex("a >= 1 & b != 2").unwrap(),
            vec![
                Token::Ident("a".to_string()),
                Token::Ge,
                Token::Number(1.0),
                Token::Amp,
                Token::Ident("b".to_string()),
                Token::Ne,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_lex_single_equals_is_comparison() {
        assert_eq!(
            lex("a = 1").unwrap(),
            vec![Token::Ident("a".to_string()), Token::EqEq, Token::Number(1.0)]
        );
    }

    #[test]
    fn test_lex_unexpected_character() {
        assert!(matches!(
            lex("a @ b"),
            Err(ParseError::UnexpectedCharacter(_))
        ));
    }

    #[test]
    fn test_lex_empty_input() {
        assert!(lex("").unwrap().is_empty());
        assert!(lex("   ").unwrap().is_empty());
    }
}
