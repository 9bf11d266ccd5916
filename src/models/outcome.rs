//! Outcome signals raised by test bodies and hooks
//!
//! Bodies report their verdict by returning a [`TestOutcome`]. A plain
//! `Ok(())` means the body ran to completion; every other verdict travels as a
//! [`TestSignal`] and is classified where the engine catches it.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;

/// Result type returned by test bodies, setup and teardown hooks
pub type TestOutcome = Result<(), TestSignal>;

/// Fault kind recorded for panics caught inside a body or hook
pub const PANIC_KIND: &str = "panic";

/// An unexpected error raised while running user code
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fault {
    /// Kind of the fault, usually the Rust type name of the error
    pub kind: String,
    pub message: String,
    pub stack_trace: Option<String>,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack_trace: None,
        }
    }

    /// Build a fault from any error value, using its type name as the kind
    pub fn from_error<E: std::error::Error>(error: &E) -> Self {
        Self::new(std::any::type_name::<E>(), error.to_string())
    }

    /// Build a fault from a caught panic payload
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };

        let backtrace = Backtrace::capture();
        let stack_trace = match backtrace.status() {
            BacktraceStatus::Captured => Some(backtrace.to_string()),
            _ => None,
        };

        Self {
            kind: PANIC_KIND.to_string(),
            message,
            stack_trace,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.kind, self.message)
    }
}

/// Verdict signalled by user code instead of running to completion
#[derive(Clone, Debug, PartialEq)]
pub enum TestSignal {
    /// Explicit early success
    Success(Option<String>),
    /// An assertion or explicit failure
    Failure {
        message: String,
        stack_trace: Option<String>,
    },
    /// The test asked to be ignored
    Ignored(String),
    /// The test could not reach a conclusion
    Inconclusive(String),
    /// The test was aborted, by a stop request or a timeout
    Cancelled(String),
    /// Any other unexpected error
    Error(Fault),
}

impl TestSignal {
    pub fn pass() -> Self {
        TestSignal::Success(None)
    }

    pub fn fail(message: impl Into<String>) -> Self {
        TestSignal::Failure {
            message: message.into(),
            stack_trace: None,
        }
    }

    pub fn ignore(reason: impl Into<String>) -> Self {
        TestSignal::Ignored(reason.into())
    }

    pub fn inconclusive(reason: impl Into<String>) -> Self {
        TestSignal::Inconclusive(reason.into())
    }

    pub fn cancel(reason: impl Into<String>) -> Self {
        TestSignal::Cancelled(reason.into())
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        TestSignal::Error(Fault::new(kind, message))
    }

    /// Human readable message carried by the signal
    pub fn message(&self) -> Option<String> {
        match self {
            TestSignal::Success(msg) => msg.clone(),
            TestSignal::Failure { message, .. } => Some(message.clone()),
            TestSignal::Ignored(msg)
            | TestSignal::Inconclusive(msg)
            | TestSignal::Cancelled(msg) => Some(msg.clone()),
            TestSignal::Error(fault) => Some(fault.to_string()),
        }
    }

    pub fn stack_trace(&self) -> Option<String> {
        match self {
            TestSignal::Failure { stack_trace, .. } => stack_trace.clone(),
            TestSignal::Error(fault) => fault.stack_trace.clone(),
            _ => None,
        }
    }
}

impl fmt::Display for TestSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TestSignal::Success(_) => "success",
            TestSignal::Failure { .. } => "failure",
            TestSignal::Ignored(_) => "ignored",
            TestSignal::Inconclusive(_) => "inconclusive",
            TestSignal::Cancelled(_) => "cancelled",
            TestSignal::Error(_) => "error",
        };
        match self.message() {
            Some(msg) => write!(f, "{label}: {msg}"),
            None => write!(f, "{label}"),
        }
    }
}

impl From<Fault> for TestSignal {
    fn from(fault: Fault) -> Self {
        TestSignal::Error(fault)
    }
}

/// Lets bodies use `?` on ordinary fallible calls
impl<E: std::error::Error> From<E> for TestSignal {
    fn from(error: E) -> Self {
        TestSignal::Error(Fault::from_error(&error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_number(s: &str) -> TestOutcome {
        let _n: i32 = s.parse()?;
        Ok(())
    }

    #[test]
    fn test_question_mark_converts_errors() {
        let outcome = parse_number("not a number");
        match outcome {
            Err(TestSignal::Error(fault)) => {
                assert!(fault.kind.ends_with("ParseIntError"));
                assert!(fault.message.contains("invalid digit"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(parse_number("42").is_ok());
    }

    #[test]
    fn test_fault_from_panic_payload() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        let fault = Fault::from_panic(payload.as_ref());
        assert_eq!(fault.kind, PANIC_KIND);
        assert_eq!(fault.message, "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(Fault::from_panic(payload.as_ref()).message, "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(Fault::from_panic(payload.as_ref()).message, "Unknown panic");
    }

    #[test]
    fn test_signal_messages() {
        assert_eq!(TestSignal::pass().message(), None);
        assert_eq!(TestSignal::fail("nope").message().as_deref(), Some("nope"));
        assert_eq!(
            TestSignal::error("io", "disk gone").message().as_deref(),
            Some("io : disk gone")
        );
        assert_eq!(TestSignal::ignore("later").to_string(), "ignored: later");
    }
}
