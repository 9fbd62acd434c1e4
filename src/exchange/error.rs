use bytes::Bytes;
use http::{
    HeaderValue, Response, StatusCode,
    header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
};
use serde::Serialize;
use snafu::Snafu;

/// A setup error. These are never fixed by retrying the request.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigurationError {
    /// The scope separator list was empty.
    #[snafu(display("OAuth 2.0 social exchange middleware requires at least one scope separator"))]
    EmptySeparatorList,
    /// One of the listed scope separators was an empty string.
    #[snafu(display("OAuth 2.0 social exchange middleware does not accept empty scope separators"))]
    EmptySeparator,
    /// The handler ran before the request body was parsed.
    #[snafu(display("Request body not parsed before the OAuth 2.0 social exchange middleware ran"))]
    BodyNotParsed,
}

impl crate::Error for ConfigurationError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// `OAuth2` token endpoint error codes (RFC 6749 §5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is missing a parameter or is otherwise malformed.
    InvalidRequest,
    /// Client authentication failed.
    InvalidClient,
    /// The grant is invalid, expired, revoked, or was not granted.
    InvalidGrant,
    /// The client may not use this grant type.
    UnauthorizedClient,
    /// The grant type is not supported by the server.
    UnsupportedGrantType,
    /// The requested scope is invalid or exceeds what was granted.
    InvalidScope,
    /// The resource owner or server denied the request.
    AccessDenied,
    /// The server hit an unexpected condition.
    ServerError,
    /// The server is temporarily unable to handle the request.
    TemporarilyUnavailable,
}

impl ErrorCode {
    /// The wire value of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
            Self::TemporarilyUnavailable => "temporarily_unavailable",
        }
    }

    /// The HTTP status a token endpoint responds with for this code.
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::InvalidClient => StatusCode::UNAUTHORIZED,
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::TemporarilyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnauthorizedClient
            | Self::UnsupportedGrantType
            | Self::InvalidScope => StatusCode::BAD_REQUEST,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol-level refusal, as opposed to a system fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationError {
    code: ErrorCode,
    message: String,
}

impl AuthorizationError {
    /// Creates an authorization error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Creates an `invalid_grant` error.
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidGrant, message)
    }

    /// The error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// The human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Renders the standard `OAuth2` error response.
    ///
    /// The exchange never writes error responses itself; this is for the
    /// dispatcher's error handling.
    #[must_use]
    pub fn to_response(&self) -> Response<Bytes> {
        let body = serde_json::json!({
            "error": self.code,
            "error_description": self.message,
        });

        let mut response = Response::new(Bytes::from(body.to_string()));
        *response.status_mut() = self.code.status();

        let headers = response.headers_mut();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        response
    }
}

impl std::fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code)
    }
}

impl std::error::Error for AuthorizationError {}

impl crate::Error for AuthorizationError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Errors that end a social exchange without a response.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExchangeError<ParseErr: crate::Error, VerifyErr: crate::Error, IssueErr: crate::Error> {
    /// The exchange is not set up correctly.
    #[snafu(display("Social exchange is misconfigured"))]
    Configuration {
        /// The underlying error.
        source: ConfigurationError,
    },
    /// The social auth data could not be read from the request.
    #[snafu(display("Failed to parse social auth data from the request"))]
    Parse {
        /// The parser's error.
        source: ParseErr,
    },
    /// The social provider did not confirm the account.
    #[snafu(display("Failed to verify social account"))]
    Verify {
        /// The verifier's error.
        source: VerifyErr,
    },
    /// The token issuer failed.
    #[snafu(display("Failed to issue token"))]
    Issue {
        /// The issuer's error.
        source: IssueErr,
    },
    /// The issuer completed without granting an access token.
    #[snafu(display("Token grant denied"))]
    Denied {
        /// The refusal.
        source: AuthorizationError,
    },
    /// The token response body could not be serialized.
    #[snafu(display("Failed to serialize token response"))]
    SerializeBody {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl<ParseErr: crate::Error, VerifyErr: crate::Error, IssueErr: crate::Error>
    ExchangeError<ParseErr, VerifyErr, IssueErr>
{
    /// Returns the refusal if this error is a grant denial.
    #[must_use]
    pub fn authorization_error(&self) -> Option<&AuthorizationError> {
        match self {
            Self::Denied { source } => Some(source),
            _ => None,
        }
    }

    /// Returns the configuration problem, if this is a setup error.
    #[must_use]
    pub fn configuration_error(&self) -> Option<&ConfigurationError> {
        match self {
            Self::Configuration { source } => Some(source),
            _ => None,
        }
    }
}

impl<ParseErr: crate::Error, VerifyErr: crate::Error, IssueErr: crate::Error> crate::Error
    for ExchangeError<ParseErr, VerifyErr, IssueErr>
{
    fn is_retryable(&self) -> bool {
        match self {
            Self::Configuration { .. } | Self::Denied { .. } | Self::SerializeBody { .. } => false,
            Self::Parse { source } => source.is_retryable(),
            Self::Verify { source } => source.is_retryable(),
            Self::Issue { source } => source.is_retryable(),
        }
    }
}
