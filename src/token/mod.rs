//! Tokens handed back by the issuer.
//!
//! Both token types wrap a [`SecretString`](secrecy::SecretString), so their
//! `Debug` output is redacted and they never show up in logs by accident.
//! Serializing them writes the raw value; that only happens when the response
//! body is built.

mod access_token;
mod refresh_token;

pub use access_token::AccessToken;
pub use refresh_token::RefreshToken;
