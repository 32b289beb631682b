//! Bridge between session input and the host's evaluation function.

use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct EvalError {
    message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for EvalError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for EvalError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Evaluates one line of session input in the host process's context.
///
/// Implemented for any `Fn(&str) -> Result<T, E>` where both sides are
/// `Display`, so plain closures work:
///
/// ```
/// use replsock_server::Evaluator;
///
/// let eval = |input: &str| input.trim().parse::<i64>().map(|n| n * 2);
/// assert_eq!(eval.evaluate("21").unwrap(), "42");
/// assert!(eval.evaluate("x").is_err());
/// ```
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, input: &str) -> Result<String, EvalError>;
}

impl<F, T, E> Evaluator for F
where
    F: Fn(&str) -> Result<T, E> + Send + Sync,
    T: Display,
    E: Display,
{
    fn evaluate(&self, input: &str) -> Result<String, EvalError> {
        self(input)
            .map(|value| value.to_string())
            .map_err(|e| EvalError::new(e.to_string()))
    }
}

/// Run the evaluator, turning a panic into an ordinary `EvalError`.
pub(crate) fn evaluate_guarded(evaluator: &dyn Evaluator, input: &str) -> Result<String, EvalError> {
    match panic::catch_unwind(AssertUnwindSafe(|| evaluator.evaluate(input))) {
        Ok(result) => result,
        Err(payload) => Err(EvalError::new(format!(
            "evaluator panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
