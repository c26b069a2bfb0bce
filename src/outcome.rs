//! Success/failure container for database operations.
//!
//! Every public operation in this crate resolves to an [`Outcome`] instead of
//! surfacing a raw error to the call site. An outcome is constructed exactly
//! once, at the point an operation completes, and is then consumed by a chain
//! continuation ([`Outcome::then`], [`Outcome::then_async`]) or a terminal
//! handler ([`Outcome::finalize`], [`Outcome::consume`]).
//!
//! There is intentionally no default construction path: an `Outcome` is always
//! either `Success` or `Failure`, never an uninitialized in-between state.

use std::future::Future;

use crate::error::{CopyError, Result};

/// The result of a database operation: exactly one of a value or a fault.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation completed and produced a value.
    Success(T),
    /// The operation faulted; the error describes what went wrong.
    Failure(CopyError),
}

impl<T> Outcome<T> {
    /// Wrap a value in a successful outcome.
    pub fn from_success(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Wrap a fault in a failed outcome.
    pub fn from_failure(error: CopyError) -> Self {
        Outcome::Failure(error)
    }

    /// Build a failed outcome from a plain message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Outcome::Failure(CopyError::Operation(message.into()))
    }

    /// Run `producer`, capturing a fault as a failed outcome.
    ///
    /// This is the single point where fallible code enters the outcome
    /// domain: a returned `Err` becomes `Failure`, a returned value `Success`.
    pub fn new(producer: impl FnOnce() -> Result<T>) -> Self {
        match producer() {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::Failure(error),
        }
    }

    /// Whether this outcome carries a value.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Borrow the success value, if any.
    #[must_use]
    pub fn success(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// Borrow the fault, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&CopyError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(error) => Some(error),
        }
    }

    /// Convert into the crate's plain `Result`.
    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(error) => Err(error),
        }
    }

    /// Chain a continuation onto a successful outcome.
    ///
    /// On success, runs `on_success` and captures any fault it raises into a
    /// failed outcome. On failure, propagates the existing fault untouched
    /// without invoking `on_success`: no step in a chain executes once an
    /// earlier step has failed.
    pub fn then<U>(self, on_success: impl FnOnce(T) -> Result<U>) -> Outcome<U> {
        match self {
            Outcome::Success(value) => match on_success(value) {
                Ok(next) => Outcome::Success(next),
                Err(error) => Outcome::Failure(error),
            },
            Outcome::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Chain an asynchronous continuation onto a successful outcome.
    ///
    /// Short-circuit semantics are preserved across suspension: the
    /// continuation runs only if this outcome is a success, and a fault
    /// raised anywhere inside it resolves to a failed outcome rather than
    /// propagating out of the chain.
    pub async fn then_async<U, Fut>(self, on_success: impl FnOnce(T) -> Fut) -> Outcome<U>
    where
        Fut: Future<Output = Result<U>>,
    {
        match self {
            Outcome::Success(value) => match on_success(value).await {
                Ok(next) => Outcome::Success(next),
                Err(error) => Outcome::Failure(error),
            },
            Outcome::Failure(error) => Outcome::Failure(error),
        }
    }

    /// Produce a terminal value from either branch.
    ///
    /// On the failure path, `on_failure` converts the fault into a value. On
    /// the success path, a fault raised while computing `on_success` is the
    /// one place in the crate that surfaces as an `Err`, wrapped in
    /// [`CopyError::FinalExtraction`] with the original cause attached,
    /// since there is no further outcome to return into.
    pub fn finalize<U>(
        self,
        on_success: impl FnOnce(T) -> Result<U>,
        on_failure: impl FnOnce(CopyError) -> U,
    ) -> Result<U> {
        match self {
            Outcome::Success(value) => on_success(value).map_err(|error| {
                CopyError::FinalExtraction {
                    message: "fault raised while computing the final value".to_string(),
                    source: Box::new(error),
                }
            }),
            Outcome::Failure(error) => Ok(on_failure(error)),
        }
    }

    /// Consume the outcome with side effects; exactly one callback runs.
    pub fn consume(self, on_success: impl FnOnce(T), on_failure: impl FnOnce(CopyError)) {
        match self {
            Outcome::Success(value) => on_success(value),
            Outcome::Failure(error) => on_failure(error),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::Failure(error),
        }
    }
}
