//! Implements the social account exchange for `OAuth2` token endpoints.
//!
//! A client that signed a user in with a social provider sends the provider's
//! credentials to the token endpoint. The exchange checks them with the
//! provider and answers with this server's own access token:
//!
//! 1. a [`SocialRequestParser`](exchange::SocialRequestParser) extracts the
//!    social credentials from the request,
//! 2. a [`SocialAccountVerifier`](exchange::SocialAccountVerifier) confirms
//!    them with the provider,
//! 3. a [`TokenIssuer`](exchange::TokenIssuer) mints tokens for the verified
//!    profile.
//!
//! The resulting [`SocialExchangeHandler`](exchange::SocialExchangeHandler)
//! implements [`Exchange`](exchange::Exchange), the interface a grant-type
//! dispatcher holds its handlers behind.

#![forbid(unsafe_code)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod error;
pub mod exchange;
pub mod platform;
pub mod prelude;
pub mod request;
pub mod token;

pub use error::{BoxedError, Error};

/// Re-export of parts of the `secrecy` crate.
pub mod secrecy {
    pub use ::secrecy::{ExposeSecret, SecretString};
}

pub use bytes::Bytes;
