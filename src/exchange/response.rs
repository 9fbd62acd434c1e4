//! The token endpoint success response.

use bon::Builder;
use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue, Response, StatusCode,
    header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
};
use serde_json::{Map, Value};

use crate::token::{AccessToken, RefreshToken};

/// The `token_type` written when the issuer does not set one.
pub const DEFAULT_TOKEN_TYPE: &str = "bearer";

/// What a [`TokenIssuer`](crate::exchange::TokenIssuer) produced.
///
/// A missing or empty access token means the grant was refused.
#[derive(Debug, Clone, Default, Builder)]
pub struct IssuedToken {
    /// The minted access token.
    #[builder(into)]
    pub access_token: Option<AccessToken>,
    /// The minted refresh token, if any.
    #[builder(into)]
    pub refresh_token: Option<RefreshToken>,
    /// Extra response parameters such as `expires_in`. These may override
    /// any other key, `token_type` and `access_token` included.
    pub params: Option<Map<String, Value>>,
}

impl IssuedToken {
    /// A result with no access token: the grant was not given.
    #[must_use]
    pub fn denied() -> Self {
        Self::default()
    }
}

/// A token response body, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenResponseBody(Map<String, Value>);

impl TokenResponseBody {
    /// Builds the body from an issued token, or returns `None` if no access
    /// token was granted.
    ///
    /// The body is merged in three layers, later keys overriding earlier
    /// ones in place: `access_token`, then `refresh_token` (when non-empty),
    /// then `params`. `token_type` is set to `"bearer"` last unless the
    /// merge already gave it a truthy value.
    #[must_use]
    pub fn from_issued(issued: IssuedToken) -> Option<Self> {
        let IssuedToken {
            access_token,
            refresh_token,
            params,
        } = issued;

        let access_token = access_token.filter(|token| !token.is_empty())?;

        let base = std::iter::once((
            "access_token".to_string(),
            Value::String(access_token.expose_token().to_string()),
        ));
        let refresh = refresh_token
            .filter(|token| !token.expose_token().is_empty())
            .map(|token| {
                (
                    "refresh_token".to_string(),
                    Value::String(token.expose_token().to_string()),
                )
            });

        let mut fields = base
            .chain(refresh)
            .chain(params.into_iter().flatten())
            .collect::<Map<_, _>>();

        if !fields.get("token_type").is_some_and(is_truthy) {
            fields.insert(
                "token_type".to_string(),
                Value::String(DEFAULT_TOKEN_TYPE.to_string()),
            );
        }

        Some(Self(fields))
    }

    /// Returns a field of the body.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Serializes the body into a `200 OK` response.
    ///
    /// `headers` are copied onto the response first; `Content-Type`,
    /// `Cache-Control` and `Pragma` are then always set to the bearer token
    /// values (RFC 6749 §5.1).
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be serialized.
    pub fn into_response(self, headers: HeaderMap) -> Result<Response<Bytes>, serde_json::Error> {
        let body = serde_json::to_vec(&self.0)?;

        let mut response = Response::new(Bytes::from(body));
        *response.status_mut() = StatusCode::OK;
        *response.headers_mut() = headers;

        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        Ok(response)
    }
}

/// JavaScript-style truthiness, which is what token issuers written against
/// loosely typed stacks expect from `token_type`.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
