//! Minimal expression language supported by engines: integer literals, global variables,
//! assignments and (in)equality checks.
//!
//! ```text
//! do_loop
//! do_loop = 1
//! exit_code == 0x2
//! ```

use crate::engine::EngineError;
use chumsky::error::Rich;
use chumsky::prelude::{choice, end, just};
use chumsky::{extra, text, Parser};

type Err<'a> = extra::Err<Rich<'a, char>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(i64),
    Variable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Operand(Operand),
    Assign(String, Operand),
    Equal(Operand, Operand),
    NotEqual(Operand, Operand),
}

fn operand<'a>() -> impl Parser<'a, &'a str, Operand, Err<'a>> + Clone {
    let hex = just("0x")
        .or(just("0X"))
        .ignore_then(text::digits(16).at_least(1).to_slice())
        .try_map(|s: &str, span| i64::from_str_radix(s, 16).map_err(|e| Rich::custom(span, e)));
    let dec = just('-')
        .or_not()
        .then(text::int(10))
        .to_slice()
        .try_map(|s: &str, span| s.parse::<i64>().map_err(|e| Rich::custom(span, e)));
    let variable = text::ascii::ident().map(|s: &str| Operand::Variable(s.to_string()));

    choice((hex.map(Operand::Literal), dec.map(Operand::Literal), variable))
        .padded()
        .labelled("operand")
}

impl Expression {
    pub fn parse(input: &str) -> Result<Expression, EngineError> {
        Self::parser()
            .parse(input)
            .into_result()
            .map_err(|e| EngineError::Evaluation(format!("invalid expression: {}", e[0])))
    }

    fn parser<'a>() -> impl Parser<'a, &'a str, Expression, Err<'a>> {
        let equal = operand()
            .then_ignore(just("=="))
            .then(operand())
            .map(|(l, r)| Expression::Equal(l, r));
        let not_equal = operand()
            .then_ignore(just("!="))
            .then(operand())
            .map(|(l, r)| Expression::NotEqual(l, r));
        let assign = text::ascii::ident()
            .padded()
            .then_ignore(just('='))
            .then(operand())
            .map(|(name, value): (&str, Operand)| Expression::Assign(name.to_string(), value));
        let single = operand().map(Expression::Operand);

        choice((
            equal.then_ignore(end()),
            not_equal.then_ignore(end()),
            assign.then_ignore(end()),
            single.then_ignore(end()),
        ))
    }

    /// Evaluate expression using `read` and `write` as an access to variables.
    pub fn evaluate<R, W>(&self, mut read: R, mut write: W) -> Result<String, EngineError>
    where
        R: FnMut(&str) -> Result<i64, EngineError>,
        W: FnMut(&str, i64) -> Result<(), EngineError>,
    {
        let mut value_of = |operand: &Operand| match operand {
            Operand::Literal(v) => Ok(*v),
            Operand::Variable(name) => read(name),
        };

        let value = match self {
            Expression::Operand(op) => value_of(op)?,
            Expression::Equal(l, r) => (value_of(l)? == value_of(r)?) as i64,
            Expression::NotEqual(l, r) => (value_of(l)? != value_of(r)?) as i64,
            Expression::Assign(name, op) => {
                let value = value_of(op)?;
                write(name, value)?;
                value
            }
        };
        Ok(value.to_string())
    }
}

pub fn undeclared(name: &str) -> EngineError {
    EngineError::Evaluation(format!("use of undeclared identifier '{name}'"))
}
