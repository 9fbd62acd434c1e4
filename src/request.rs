//! Token endpoint requests.
//!
//! The exchange only needs two things from an incoming request: the parsed
//! body, and the principal an upstream layer authenticated (for the token
//! endpoint, the `OAuth2` client). [`ExchangeRequest`] captures exactly that,
//! so any web framework can be adapted by implementing it.
//!
//! [`TokenRequest`] is a ready-made implementation built from an
//! [`http::Request`]. Its body is parsed from `application/x-www-form-urlencoded`
//! or `application/json`; any other content type leaves the body unparsed.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method, Uri, header::CONTENT_TYPE, request::Parts};
use serde_json::{Map, Value};
use snafu::prelude::*;

use crate::platform::MaybeSendSync;

/// A request as seen by an exchange.
pub trait ExchangeRequest: MaybeSendSync {
    /// The authenticated principal attached upstream, usually the `OAuth2` client.
    type Client: MaybeSendSync;

    /// Returns the parsed body, or `None` if no body-parsing layer ran.
    fn body(&self) -> Option<&TokenRequestBody>;

    /// Returns the principal stored under `property`, if any.
    fn principal(&self, property: &str) -> Option<&Self::Client>;
}

/// The `scope` parameter as it arrived on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawScope {
    /// A single string, possibly holding several separator-joined scopes.
    Joined(String),
    /// A scope list that was already split upstream (a JSON array, or a
    /// form key that was repeated).
    List(Vec<String>),
}

/// A parsed token request body.
///
/// Values keep the shape they had on the wire: form fields are strings, or
/// arrays of strings when a key was repeated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenRequestBody {
    fields: Map<String, Value>,
}

impl TokenRequestBody {
    /// Wraps already-parsed fields.
    #[must_use]
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Parses an `application/x-www-form-urlencoded` body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid form encoding.
    pub fn from_form(body: &[u8]) -> Result<Self, BodyParseError> {
        let pairs: Vec<(String, String)> =
            serde_html_form::from_bytes(body).context(FormSnafu)?;

        let mut fields = Map::new();
        for (key, value) in pairs {
            match fields.get_mut(&key) {
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
                None => {
                    fields.insert(key, Value::String(value));
                }
            }
        }

        Ok(Self { fields })
    }

    /// Parses an `application/json` body. The top level must be an object.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON object.
    pub fn from_json(body: &[u8]) -> Result<Self, BodyParseError> {
        let fields: Map<String, Value> = serde_json::from_slice(body).context(JsonSnafu)?;
        Ok(Self { fields })
    }

    /// Returns a raw field.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a field if it is a single string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns the `scope` field.
    ///
    /// Strings, numbers and `true` are read as a joined scope string.
    /// Arrays are read as an already-split list. `null`, `false`, zero and
    /// objects count as no scope.
    #[must_use]
    pub fn scope(&self) -> Option<RawScope> {
        match self.fields.get("scope")? {
            Value::String(s) => Some(RawScope::Joined(s.clone())),
            Value::Array(values) => Some(RawScope::List(values.iter().map(scope_token).collect())),
            Value::Number(n) if n.as_f64().is_some_and(|n| n == 0.0) => None,
            scalar @ (Value::Number(_) | Value::Bool(true)) => {
                Some(RawScope::Joined(scalar.to_string()))
            }
            Value::Null | Value::Bool(false) | Value::Object(_) => None,
        }
    }
}

/// Errors that occur when parsing a token request body.
#[derive(Debug, Snafu)]
pub enum BodyParseError {
    /// The form body could not be decoded.
    #[snafu(display("Failed to decode form-encoded token request body"))]
    Form {
        /// The underlying error.
        source: serde_html_form::de::Error,
    },
    /// The JSON body could not be decoded, or was not an object.
    #[snafu(display("Failed to decode JSON token request body"))]
    Json {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl crate::Error for BodyParseError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// A token endpoint request built from an [`http::Request`].
#[derive(Debug)]
pub struct TokenRequest<C> {
    head: Parts,
    body: Option<TokenRequestBody>,
    principals: HashMap<String, C>,
}

impl<C> TokenRequest<C> {
    /// Creates a `POST` request with the given body and no principals.
    #[must_use]
    pub fn new(body: Option<TokenRequestBody>) -> Self {
        let (mut head, ()) = http::Request::new(()).into_parts();
        head.method = Method::POST;
        Self {
            head,
            body,
            principals: HashMap::new(),
        }
    }

    /// Converts an [`http::Request`], parsing the body according to its
    /// `Content-Type`.
    ///
    /// Bodies of any other content type are left unparsed.
    ///
    /// # Errors
    ///
    /// Returns an error if a form or JSON body is malformed.
    pub fn from_http(request: http::Request<Bytes>) -> Result<Self, BodyParseError> {
        let (head, bytes) = request.into_parts();

        let body = match media_type(&head.headers).as_deref() {
            Some("application/x-www-form-urlencoded") => {
                Some(TokenRequestBody::from_form(&bytes)?)
            }
            Some("application/json") => Some(TokenRequestBody::from_json(&bytes)?),
            other => {
                tracing::debug!(content_type = ?other, "token request body left unparsed");
                None
            }
        };

        Ok(Self {
            head,
            body,
            principals: HashMap::new(),
        })
    }

    /// Attaches a principal under `property`.
    #[must_use]
    pub fn with_principal(mut self, property: impl Into<String>, client: C) -> Self {
        self.principals.insert(property.into(), client);
        self
    }

    /// Attaches a principal under `property`, replacing any previous one.
    pub fn set_principal(&mut self, property: impl Into<String>, client: C) {
        self.principals.insert(property.into(), client);
    }

    /// The request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.head.method
    }

    /// The request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.head.uri
    }

    /// The request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.head.headers
    }
}

impl<C: MaybeSendSync> ExchangeRequest for TokenRequest<C> {
    type Client = C;

    fn body(&self) -> Option<&TokenRequestBody> {
        self.body.as_ref()
    }

    fn principal(&self, property: &str) -> Option<&C> {
        self.principals.get(property)
    }
}

fn scope_token(value: &Value) -> String {
    value.as_str().map_or_else(|| value.to_string(), str::to_string)
}

/// The lowercased media type of the `Content-Type` header, without parameters.
fn media_type(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(CONTENT_TYPE)?.to_str().ok()?;
    let essence = value.split(';').next().unwrap_or_default().trim();
    Some(essence.to_ascii_lowercase())
}
