use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

/// An `OAuth2` refresh token minted alongside an access token.
#[derive(Debug, Clone)]
pub struct RefreshToken(SecretString);

impl RefreshToken {
    /// Exposes the token as a string.
    #[must_use]
    pub fn expose_token(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Serialize for RefreshToken {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.expose_token())
    }
}

impl From<&str> for RefreshToken {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

impl From<String> for RefreshToken {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl From<SecretString> for RefreshToken {
    fn from(value: SecretString) -> Self {
        Self(value)
    }
}
