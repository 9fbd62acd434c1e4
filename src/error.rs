//! Error types and the [`Error`] trait.
//!
//! Every error surfaced by an exchange implements [`Error`], which extends
//! [`std::error::Error`] with retry semantics. The exchange itself never
//! retries; the flag is there so the dispatcher (or whoever owns the retry
//! policy) can tell a flaky provider apart from a refused grant.
//!
//! Collaborators plug their own error types in through the same trait.
//! [`BoxedError`] is available when a collaborator wants to erase its error
//! type but keep retryability.

use std::convert::Infallible;

use snafu::{AsErrorSource, Snafu};

use crate::platform::MaybeSendSync;

/// Errors that may occur in the library or in its collaborators.
pub trait Error: std::error::Error + AsErrorSource + MaybeSendSync + 'static {
    /// If true, repeating the same request may succeed.
    fn is_retryable(&self) -> bool;
}

impl Error for Infallible {
    fn is_retryable(&self) -> bool {
        match *self {}
    }
}

/// A boxed error that can be used without type parameters.
#[derive(Debug, Snafu)]
#[snafu(transparent)]
pub struct BoxedError {
    source: Box<dyn Error>,
}

impl BoxedError {
    /// Boxes any [`Error`].
    pub fn from_err<E: Error>(err: E) -> Self {
        Self {
            source: Box::new(err),
        }
    }
}

impl Error for BoxedError {
    fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}
