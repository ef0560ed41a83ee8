//! `eval` subcommand: parse a prefix expression, send it as one pipelined
//! request chain and print the result.
//!
//! Accepted syntax is a number or `(OP ARG ARG ...)` where `OP` is any
//! operator name or symbol the server knows, for example `(+ 1 (* 2 3))`.
//! Parentheses nest at most [`MAX_DEPTH`] levels deep.

use anyhow::Context;
use calculator_sdk::{CalculatorClient, Expression};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Deepest accepted nesting of parenthesised applications.
pub const MAX_DEPTH: usize = 128;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected ')' at offset {0}")]
    UnexpectedClose(usize),
    #[error("missing ')' for '(' at offset {0}")]
    Unclosed(usize),
    #[error("missing operator after '(' at offset {0}")]
    MissingOperator(usize),
    #[error("'{token}' at offset {offset} is not a number")]
    NotANumber { token: String, offset: usize },
    #[error("trailing input at offset {0}")]
    Trailing(usize),
    #[error("'(' at offset {0} nests deeper than {max} levels", max = MAX_DEPTH)]
    TooDeep(usize),
}

/// Parsed prefix expression, independent of any connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Number(f64),
    Apply { op: String, args: Vec<Term> },
}

impl Term {
    /// Build the request tree. Every operator lookup is pipelined, so no
    /// call here waits for the server.
    pub fn to_expression(&self, calculator: &CalculatorClient) -> Expression {
        match self {
            Self::Number(value) => Expression::Literal(*value),
            Self::Apply { op, args } => Expression::call(
                calculator.get_operator_by_symbol(op).pipeline(),
                args.iter().map(|arg| arg.to_expression(calculator)).collect(),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token<'a> {
    Open,
    Close,
    Atom(&'a str),
}

fn tokenize(source: &str) -> Vec<(usize, Token<'_>)> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (offset, ch) in source.char_indices() {
        if ch == '(' || ch == ')' || ch.is_whitespace() {
            if let Some(begin) = start.take() {
                tokens.push((begin, Token::Atom(&source[begin..offset])));
            }
            match ch {
                '(' => tokens.push((offset, Token::Open)),
                ')' => tokens.push((offset, Token::Close)),
                _ => {}
            }
        } else if start.is_none() {
            start = Some(offset);
        }
    }
    if let Some(begin) = start {
        tokens.push((begin, Token::Atom(&source[begin..])));
    }
    tokens
}

/// Parse `source` into a [`Term`].
///
/// # Errors
/// Returns the first syntax error found.
pub fn parse(source: &str) -> Result<Term, ParseError> {
    let tokens = tokenize(source);
    let mut pos = 0;
    let term = parse_term(&tokens, &mut pos, 0)?;
    match tokens.get(pos) {
        Some((offset, _)) => Err(ParseError::Trailing(*offset)),
        None => Ok(term),
    }
}

fn parse_term(
    tokens: &[(usize, Token<'_>)],
    pos: &mut usize,
    depth: usize,
) -> Result<Term, ParseError> {
    let Some(&(offset, token)) = tokens.get(*pos) else {
        return Err(ParseError::Empty);
    };
    *pos += 1;
    match token {
        Token::Close => Err(ParseError::UnexpectedClose(offset)),
        Token::Atom(text) => number(text, offset),
        Token::Open => {
            if depth >= MAX_DEPTH {
                return Err(ParseError::TooDeep(offset));
            }
            let op = match tokens.get(*pos) {
                Some((_, Token::Atom(text))) => (*text).to_owned(),
                _ => return Err(ParseError::MissingOperator(offset)),
            };
            *pos += 1;
            let mut args = Vec::new();
            loop {
                match tokens.get(*pos) {
                    None => return Err(ParseError::Unclosed(offset)),
                    Some((_, Token::Close)) => {
                        *pos += 1;
                        return Ok(Term::Apply { op, args });
                    }
                    Some(_) => args.push(parse_term(tokens, pos, depth + 1)?),
                }
            }
        }
    }
}

fn number(text: &str, offset: usize) -> Result<Term, ParseError> {
    text.parse::<f64>()
        .map(Term::Number)
        .map_err(|_| ParseError::NotANumber {
            token: text.to_owned(),
            offset,
        })
}

/// Connect to `addr`, evaluate `source` and return the number it reads to.
///
/// Must run inside a `tokio::task::LocalSet`.
///
/// # Errors
/// Fails on a syntax error, a connection failure or any error raised by
/// the server while evaluating.
pub async fn run(addr: &str, source: &str) -> anyhow::Result<f64> {
    let term = parse(source).context("invalid expression")?;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to calculator at '{addr}'"))?;
    stream.set_nodelay(true)?;
    let (calculator, rpc_system) = calculator_sdk::connect(stream, false);
    let disconnector = rpc_system.get_disconnector();

    let expression = term.to_expression(&calculator);
    let read = calculator.evaluate(&expression).pipeline().read();
    debug!(%addr, "request chain queued");

    let driver = tokio::task::spawn_local(rpc_system);
    let value = read.await;
    if let Err(e) = disconnector.await {
        debug!(error = %e, "disconnect failed");
    }
    match driver.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "connection closed"),
        Err(e) => debug!(error = %e, "connection task failed"),
    }

    let value = value.context("evaluation failed")?;
    info!(%addr, value, "expression evaluated");
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn apply(op: &str, args: Vec<Term>) -> Term {
        Term::Apply {
            op: op.to_owned(),
            args,
        }
    }

    #[test]
    fn parses_a_bare_number() {
        assert_eq!(parse(" 123 ").unwrap(), Term::Number(123.0));
        assert_eq!(parse("-2.5").unwrap(), Term::Number(-2.5));
    }

    #[test]
    fn parses_nested_applications() {
        let term = parse("(+ 1 (* 2 3))").unwrap();
        assert_eq!(
            term,
            apply(
                "+",
                vec![
                    Term::Number(1.0),
                    apply("*", vec![Term::Number(2.0), Term::Number(3.0)])
                ]
            )
        );
    }

    #[test]
    fn operators_are_passed_through_verbatim() {
        let term = parse("(divide 1 0)").unwrap();
        assert_eq!(
            term,
            apply("divide", vec![Term::Number(1.0), Term::Number(0.0)])
        );
        assert_eq!(parse("(- 3)").unwrap(), apply("-", vec![Term::Number(3.0)]));
    }

    #[test]
    fn reports_syntax_errors() {
        assert_eq!(parse("").unwrap_err(), ParseError::Empty);
        assert_eq!(parse("   ").unwrap_err(), ParseError::Empty);
        assert_eq!(parse(")").unwrap_err(), ParseError::UnexpectedClose(0));
        assert_eq!(parse("(+ 1 2").unwrap_err(), ParseError::Unclosed(0));
        assert_eq!(parse("()").unwrap_err(), ParseError::MissingOperator(0));
        assert_eq!(parse("(+ 1 2) 3").unwrap_err(), ParseError::Trailing(8));
        assert_eq!(
            parse("(+ x 2)").unwrap_err(),
            ParseError::NotANumber {
                token: "x".to_owned(),
                offset: 3
            }
        );
    }

    fn nested(levels: usize) -> String {
        format!("{}1{}", "(+ ".repeat(levels), ")".repeat(levels))
    }

    #[test]
    fn nesting_is_capped() {
        assert!(parse(&nested(MAX_DEPTH)).is_ok());
        assert_eq!(
            parse(&nested(MAX_DEPTH + 1)).unwrap_err(),
            ParseError::TooDeep(MAX_DEPTH * 3)
        );
    }

    #[test]
    fn very_deep_input_is_rejected_without_recursing() {
        assert_eq!(
            parse(&nested(1_000_000)).unwrap_err(),
            ParseError::TooDeep(MAX_DEPTH * 3)
        );
    }
}
