//! Token endpoint exchanges.
//!
//! An exchange turns a validated grant into an issued token. Dispatchers hold
//! exchanges behind the [`Exchange`] trait and pick one per grant type; this
//! crate provides the social exchange, built with [`SocialExchange`], which
//! trusts a social provider's verification of the user's account.

mod error;
mod options;
mod response;
mod scope;
mod social;

use bytes::Bytes;
use http::Response;

use crate::platform::{MaybeSend, MaybeSendSync};

pub use error::{AuthorizationError, ConfigurationError, ErrorCode, ExchangeError};
pub use options::{
    DEFAULT_SCOPE_SEPARATOR, DEFAULT_USER_PROPERTY, ExchangeOptions, ScopeSeparator,
    ScopeSeparators,
};
pub use response::{DEFAULT_TOKEN_TYPE, IssuedToken, TokenResponseBody};
pub use scope::{normalize_scope, split_scope};
pub use social::{
    SocialAccountVerifier, SocialExchange, SocialExchangeError, SocialExchangeHandler,
    SocialRequestParser, TokenIssuer,
};

/// A grant-type-specific token endpoint handler.
///
/// On success the exchange has produced the complete response and the
/// dispatcher should send it as is. On failure nothing was written; the
/// dispatcher's error handling owns the error response.
pub trait Exchange<R>: MaybeSendSync {
    /// The error type returned when the exchange fails.
    type Error: crate::Error;

    /// Runs the exchange for one request.
    fn exchange(
        &self,
        request: &R,
    ) -> impl Future<Output = Result<Response<Bytes>, Self::Error>> + MaybeSend;
}
