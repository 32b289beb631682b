//! Integer arithmetic evaluator served by `replsock demo`.

use std::iter::Peekable;
use std::str::Chars;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("unexpected end of input")]
    UnexpectedEnd,

    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),

    #[error("number too large")]
    NumberTooLarge,

    #[error("division by zero")]
    DivisionByZero,

    #[error("overflow")]
    Overflow,
}

/// Evaluate `+ - * / %` over `i64` with the usual precedence and
/// parentheses.
pub fn evaluate(input: &str) -> Result<i64, ArithmeticError> {
    let mut parser = Parser {
        chars: input.chars().peekable(),
    };
    let value = parser.expr()?;
    parser.skip_whitespace();
    match parser.chars.next() {
        None => Ok(value),
        Some(c) => Err(ArithmeticError::UnexpectedChar(c)),
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn peek_op(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().copied()
    }

    fn expr(&mut self) -> Result<i64, ArithmeticError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek_op() {
            self.chars.next();
            let rhs = self.term()?;
            value = match op {
                '+' => value.checked_add(rhs),
                _ => value.checked_sub(rhs),
            }
            .ok_or(ArithmeticError::Overflow)?;
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<i64, ArithmeticError> {
        let mut value = self.factor()?;
        while let Some(op @ ('*' | '/' | '%')) = self.peek_op() {
            self.chars.next();
            let rhs = self.factor()?;
            if op != '*' && rhs == 0 {
                return Err(ArithmeticError::DivisionByZero);
            }
            value = match op {
                '*' => value.checked_mul(rhs),
                '/' => value.checked_div(rhs),
                _ => value.checked_rem(rhs),
            }
            .ok_or(ArithmeticError::Overflow)?;
        }
        Ok(value)
    }

    fn factor(&mut self) -> Result<i64, ArithmeticError> {
        self.skip_whitespace();
        match self.chars.next() {
            Some('-') => self
                .factor()?
                .checked_neg()
                .ok_or(ArithmeticError::Overflow),
            Some('(') => {
                let value = self.expr()?;
                self.skip_whitespace();
                match self.chars.next() {
                    Some(')') => Ok(value),
                    Some(c) => Err(ArithmeticError::UnexpectedChar(c)),
                    None => Err(ArithmeticError::UnexpectedEnd),
                }
            }
            Some(c) if c.is_ascii_digit() => {
                let mut digits = String::from(c);
                while let Some(d) = self.chars.next_if(char::is_ascii_digit) {
                    digits.push(d);
                }
                digits
                    .parse()
                    .map_err(|_| ArithmeticError::NumberTooLarge)
            }
            Some(c) => Err(ArithmeticError::UnexpectedChar(c)),
            None => Err(ArithmeticError::UnexpectedEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_and_parentheses() {
        assert_eq!(evaluate("2+2"), Ok(4));
        assert_eq!(evaluate("2 + 3 * 4"), Ok(14));
        assert_eq!(evaluate("(2 + 3) * 4"), Ok(20));
        assert_eq!(evaluate("10 - 4 - 3"), Ok(3));
        assert_eq!(evaluate("-3 * -(2 + 1)"), Ok(9));
        assert_eq!(evaluate("17 % 5"), Ok(2));
    }

    #[test]
    fn test_errors() {
        assert_eq!(evaluate("1 / 0"), Err(ArithmeticError::DivisionByZero));
        assert_eq!(evaluate("2 +"), Err(ArithmeticError::UnexpectedEnd));
        assert_eq!(evaluate("2 x 3"), Err(ArithmeticError::UnexpectedChar('x')));
        assert_eq!(evaluate("(1"), Err(ArithmeticError::UnexpectedEnd));
        assert_eq!(
            evaluate("9223372036854775807 + 1"),
            Err(ArithmeticError::Overflow)
        );
        assert_eq!(
            evaluate("99999999999999999999"),
            Err(ArithmeticError::NumberTooLarge)
        );
    }
}
