use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

/// An `OAuth2` access token minted by a [`TokenIssuer`](crate::exchange::TokenIssuer).
#[derive(Debug, Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    /// Exposes the token as a string.
    #[must_use]
    pub fn expose_token(&self) -> &str {
        self.0.expose_secret()
    }

    /// Returns `true` if the token is the empty string.
    ///
    /// An empty token is treated the same as no token at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.expose_token().is_empty()
    }
}

impl Serialize for AccessToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.expose_token())
    }
}

impl From<&str> for AccessToken {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for AccessToken {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<SecretString> for AccessToken {
    fn from(value: SecretString) -> Self {
        Self(value)
    }
}

impl ExposeSecret<str> for AccessToken {
    fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}
