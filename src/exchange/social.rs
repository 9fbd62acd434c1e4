//! The social account exchange.
//!
//! The client sends credentials it obtained from a social provider (an
//! access token, an ID token, ...). A [`SocialRequestParser`] pulls them out of
//! the request, a [`SocialAccountVerifier`] checks them with the provider, and
//! a [`TokenIssuer`] mints this server's tokens for the verified profile.

use bytes::Bytes;
use http::{HeaderMap, Response};
use snafu::prelude::*;

use crate::{
    exchange::{
        Exchange,
        error::{
            AuthorizationError, BodyNotParsedSnafu, ConfigurationError, ConfigurationSnafu,
            DeniedSnafu, ExchangeError, IssueSnafu, ParseSnafu, SerializeBodySnafu, VerifySnafu,
        },
        options::{ExchangeOptions, ResolvedOptions},
        response::{IssuedToken, TokenResponseBody},
        scope::normalize_scope,
    },
    platform::{MaybeSend, MaybeSendSync},
    request::ExchangeRequest,
};

const DENIED_MESSAGE: &str = "Permissions were not granted.";

/// Extracts social auth data from a request.
///
/// Runs synchronously before any I/O. `response_headers` become part of the
/// success response; the bearer token headers are applied afterwards and
/// always win.
pub trait SocialRequestParser<R>: MaybeSendSync {
    /// The extracted data, passed to the verifier and then to the issuer.
    type AuthData: MaybeSendSync;

    /// The error returned when the request does not carry usable data.
    type Error: crate::Error;

    /// Extracts the social auth data.
    ///
    /// # Errors
    ///
    /// Returns an error if the request does not carry usable social auth
    /// data. The exchange stops before any I/O.
    fn parse_social_request(
        &self,
        request: &R,
        response_headers: &mut HeaderMap,
    ) -> Result<Self::AuthData, Self::Error>;
}

/// Verifies social auth data with the provider.
pub trait SocialAccountVerifier<D>: MaybeSendSync {
    /// The verified account, passed to the issuer.
    type Profile: MaybeSendSync;

    /// The error returned when verification fails.
    type Error: crate::Error;

    /// Verifies the data, returning the account profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider does not confirm the account or
    /// cannot be reached.
    fn verify_social_account(
        &self,
        auth_data: &D,
    ) -> impl Future<Output = Result<Self::Profile, Self::Error>> + MaybeSend;
}

/// Mints tokens for a verified social account.
///
/// Returning an [`IssuedToken`] without an access token refuses the grant.
pub trait TokenIssuer<C, D, P>: MaybeSendSync {
    /// The error returned when issuing fails.
    type Error: crate::Error;

    /// Issues tokens.
    ///
    /// `client` is the principal found under the configured user property.
    /// `scope` is `None` when the request carried no scope, and otherwise
    /// non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if tokens could not be minted. Refusing the grant is
    /// not an error; return an [`IssuedToken`] without an access token.
    fn issue(
        &self,
        client: Option<&C>,
        profile: &P,
        auth_data: &D,
        scope: Option<&[String]>,
    ) -> impl Future<Output = Result<IssuedToken, Self::Error>> + MaybeSend;
}

type RequestClient<R> = <R as ExchangeRequest>::Client;
type ParsedData<R, P> = <P as SocialRequestParser<R>>::AuthData;
type VerifiedProfile<R, P, V> = <V as SocialAccountVerifier<ParsedData<R, P>>>::Profile;

/// The error a [`SocialExchangeHandler`] returns for requests of type `R`.
pub type SocialExchangeError<R, P, V, I> = ExchangeError<
    <P as SocialRequestParser<R>>::Error,
    <V as SocialAccountVerifier<ParsedData<R, P>>>::Error,
    <I as TokenIssuer<RequestClient<R>, ParsedData<R, P>, VerifiedProfile<R, P, V>>>::Error,
>;

/// Binds a request parser and an account verifier.
///
/// Build one per social provider, then call [`handler`](Self::handler) or
/// [`handler_with_options`](Self::handler_with_options) with a token issuer.
#[derive(Debug, Clone)]
pub struct SocialExchange<P, V> {
    parser: P,
    verifier: V,
}

impl<P, V> SocialExchange<P, V> {
    /// Binds the collaborators.
    #[must_use]
    pub fn new(parser: P, verifier: V) -> Self {
        Self { parser, verifier }
    }

    /// Builds a handler with default options.
    ///
    /// Identical to `handler_with_options(ExchangeOptions::default(), issuer)`.
    ///
    /// # Errors
    ///
    /// Never fails with the default options; the `Result` matches
    /// [`handler_with_options`](Self::handler_with_options).
    pub fn handler<I>(
        self,
        issuer: I,
    ) -> Result<SocialExchangeHandler<P, V, I>, ConfigurationError> {
        self.handler_with_options(ExchangeOptions::default(), issuer)
    }

    /// Builds a handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the scope separator configuration is invalid.
    pub fn handler_with_options<I>(
        self,
        options: ExchangeOptions,
        issuer: I,
    ) -> Result<SocialExchangeHandler<P, V, I>, ConfigurationError> {
        let options = options.resolve()?;

        tracing::debug!(
            user_property = %options.user_property,
            separators = ?options.separators.as_slice(),
            "social exchange handler built"
        );

        Ok(SocialExchangeHandler {
            parser: self.parser,
            verifier: self.verifier,
            issuer,
            options,
        })
    }
}

/// A configured social exchange, ready to serve requests.
#[derive(Debug, Clone)]
pub struct SocialExchangeHandler<P, V, I> {
    parser: P,
    verifier: V,
    issuer: I,
    options: ResolvedOptions,
}

impl<P, V, I> SocialExchangeHandler<P, V, I> {
    /// The request property the client is read from.
    #[must_use]
    pub fn user_property(&self) -> &str {
        &self.options.user_property
    }

    /// Handles one token request.
    ///
    /// Verification finishes before the issuer is called. Every failure is
    /// returned as an error and nothing is written; on success the returned
    /// response is complete.
    ///
    /// # Errors
    ///
    /// See [`ExchangeError`].
    #[tracing::instrument(name = "social_exchange", skip_all)]
    pub async fn handle<R>(
        &self,
        request: &R,
    ) -> Result<Response<Bytes>, SocialExchangeError<R, P, V, I>>
    where
        R: ExchangeRequest,
        P: SocialRequestParser<R>,
        V: SocialAccountVerifier<P::AuthData>,
        I: TokenIssuer<R::Client, P::AuthData, V::Profile>,
    {
        let Some(body) = request.body() else {
            tracing::warn!("token request body was not parsed");
            return BodyNotParsedSnafu.fail().context(ConfigurationSnafu);
        };

        let client = request.principal(&self.options.user_property);
        let raw_scope = body.scope();

        let mut response_headers = HeaderMap::new();
        let auth_data = self
            .parser
            .parse_social_request(request, &mut response_headers)
            .inspect_err(|err| {
                tracing::debug!(error = %err, "social request rejected");
            })
            .context(ParseSnafu)?;

        let profile = self
            .verifier
            .verify_social_account(&auth_data)
            .await
            .inspect_err(|err| {
                tracing::warn!(
                    error = %err,
                    retryable = crate::Error::is_retryable(err),
                    "social account verification failed"
                );
            })
            .context(VerifySnafu)?;

        let scope = normalize_scope(raw_scope, &self.options.separators);
        tracing::debug!(
            client_present = client.is_some(),
            scope = ?scope,
            "social account verified, issuing token"
        );

        let issued = self
            .issuer
            .issue(client, &profile, &auth_data, scope.as_deref())
            .await
            .inspect_err(|err| tracing::warn!(error = %err, "token issuer failed"))
            .context(IssueSnafu)?;

        let Some(body) = TokenResponseBody::from_issued(issued) else {
            tracing::info!("token issuer refused the grant");
            return Err(AuthorizationError::invalid_grant(DENIED_MESSAGE)).context(DeniedSnafu);
        };

        let response = body
            .into_response(response_headers)
            .context(SerializeBodySnafu)?;

        tracing::debug!("token issued");
        Ok(response)
    }
}

impl<R, P, V, I> Exchange<R> for SocialExchangeHandler<P, V, I>
where
    R: ExchangeRequest,
    P: SocialRequestParser<R>,
    V: SocialAccountVerifier<P::AuthData>,
    I: TokenIssuer<R::Client, P::AuthData, V::Profile>,
{
    type Error = SocialExchangeError<R, P, V, I>;

    fn exchange(
        &self,
        request: &R,
    ) -> impl Future<Output = Result<Response<Bytes>, Self::Error>> + MaybeSend {
        self.handle(request)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use http::{
        HeaderValue,
        header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::{
        Error as _,
        exchange::{ErrorCode, ScopeSeparator},
        request::{TokenRequest, TokenRequestBody},
    };

    #[derive(Debug, Snafu)]
    #[snafu(display("missing social access token"))]
    struct MissingToken;

    impl crate::Error for MissingToken {
        fn is_retryable(&self) -> bool {
            false
        }
    }

    #[derive(Debug, Snafu)]
    #[snafu(display("provider rejected token"))]
    struct ProviderError {
        retryable: bool,
    }

    impl crate::Error for ProviderError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }
    }

    #[derive(Debug, Snafu)]
    #[snafu(display("token store unavailable"))]
    struct StoreError;

    impl crate::Error for StoreError {
        fn is_retryable(&self) -> bool {
            true
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct SocialToken(String);

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Profile {
        id: String,
    }

    #[derive(Debug, Default)]
    struct Parser {
        calls: AtomicUsize,
    }

    impl SocialRequestParser<TokenRequest<&'static str>> for Parser {
        type AuthData = SocialToken;
        type Error = MissingToken;

        fn parse_social_request(
            &self,
            request: &TokenRequest<&'static str>,
            response_headers: &mut HeaderMap,
        ) -> Result<SocialToken, MissingToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            response_headers.insert("x-social-provider", HeaderValue::from_static("github"));
            request
                .body()
                .and_then(|body| body.get_str("social_token"))
                .map(|token| SocialToken(token.to_string()))
                .context(MissingTokenSnafu)
        }
    }

    #[derive(Debug, Default)]
    struct Verifier {
        calls: AtomicUsize,
        fail: Option<bool>,
    }

    impl SocialAccountVerifier<SocialToken> for Verifier {
        type Profile = Profile;
        type Error = ProviderError;

        async fn verify_social_account(
            &self,
            auth_data: &SocialToken,
        ) -> Result<Profile, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail {
                Some(retryable) => ProviderSnafu { retryable }.fail(),
                None => Ok(Profile {
                    id: format!("profile-for-{}", auth_data.0),
                }),
            }
        }
    }

    #[derive(Debug, Default)]
    struct Issuer {
        outcome: Option<IssuedToken>,
        fail: bool,
        seen: Mutex<Vec<(Option<&'static str>, Profile, SocialToken, Option<Vec<String>>)>>,
    }

    impl Issuer {
        fn granting(issued: IssuedToken) -> Self {
            Self {
                outcome: Some(issued),
                ..Self::default()
            }
        }

        fn seen_scope(&self) -> Option<Vec<String>> {
            self.seen.lock().unwrap()[0].3.clone()
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    impl TokenIssuer<&'static str, SocialToken, Profile> for Issuer {
        type Error = StoreError;

        async fn issue(
            &self,
            client: Option<&&'static str>,
            profile: &Profile,
            auth_data: &SocialToken,
            scope: Option<&[String]>,
        ) -> Result<IssuedToken, StoreError> {
            self.seen.lock().unwrap().push((
                client.copied(),
                profile.clone(),
                auth_data.clone(),
                scope.map(<[String]>::to_vec),
            ));
            if self.fail {
                return StoreSnafu.fail();
            }
            Ok(self.outcome.clone().unwrap_or_default())
        }
    }

    impl<I> SocialExchangeHandler<Parser, Verifier, I> {
        fn parser_calls(&self) -> usize {
            self.parser.calls.load(Ordering::SeqCst)
        }

        fn verifier_calls(&self) -> usize {
            self.verifier.calls.load(Ordering::SeqCst)
        }
    }

    fn granted() -> IssuedToken {
        let Value::Object(params) = json!({"extra": "x"}) else {
            unreachable!()
        };
        IssuedToken::builder()
            .access_token("tok123")
            .refresh_token("ref456")
            .params(params)
            .build()
    }

    fn request(fields: Value) -> TokenRequest<&'static str> {
        let Value::Object(fields) = fields else {
            unreachable!()
        };
        TokenRequest::new(Some(TokenRequestBody::from_fields(fields)))
            .with_principal("user", "client-1")
    }

    fn exchange<I>(issuer: I) -> SocialExchangeHandler<Parser, Verifier, I> {
        SocialExchange::new(Parser::default(), Verifier::default())
            .handler(issuer)
            .unwrap()
    }

    #[tokio::test]
    async fn issues_token_response() {
        let handler = exchange(Issuer::granting(granted()));

        let req = request(json!({"social_token": "fb-abc", "scope": "read write"}));
        let response = handler.handle(&req).await.unwrap();

        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[PRAGMA], "no-cache");
        assert_eq!(response.headers()["x-social-provider"], "github");
        assert_eq!(
            &response.body()[..],
            br#"{"access_token":"tok123","refresh_token":"ref456","extra":"x","token_type":"bearer"}"#
        );

        let seen = handler.issuer.seen.lock().unwrap();
        let (client, profile, auth_data, scope) = &seen[0];
        assert_eq!(*client, Some("client-1"));
        assert_eq!(profile.id, "profile-for-fb-abc");
        assert_eq!(auth_data, &SocialToken("fb-abc".into()));
        assert_eq!(
            scope.as_deref(),
            Some(&["read".to_string(), "write".to_string()][..])
        );
    }

    #[tokio::test]
    async fn missing_access_token_is_invalid_grant() {
        let handler = exchange(Issuer::granting(IssuedToken::denied()));

        let err = handler
            .handle(&request(json!({"social_token": "fb-abc"})))
            .await
            .unwrap_err();

        let denial = err.authorization_error().unwrap();
        assert_eq!(denial.code(), ErrorCode::InvalidGrant);
        assert_eq!(denial.message(), "Permissions were not granted.");
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn unparsed_body_fails_before_collaborators_run() {
        let handler = exchange(Issuer::granting(granted()));

        let err = handler
            .handle(&TokenRequest::<&'static str>::new(None))
            .await
            .unwrap_err();

        assert_eq!(
            err.configuration_error(),
            Some(&ConfigurationError::BodyNotParsed)
        );
        assert_eq!(handler.parser_calls(), 0);
        assert_eq!(handler.verifier_calls(), 0);
        assert_eq!(handler.issuer.calls(), 0);
    }

    #[tokio::test]
    async fn parse_failure_stops_the_exchange() {
        let handler = exchange(Issuer::granting(granted()));

        let err = handler.handle(&request(json!({}))).await.unwrap_err();

        assert!(matches!(err, ExchangeError::Parse { .. }));
        assert_eq!(handler.verifier_calls(), 0);
        assert_eq!(handler.issuer.calls(), 0);
    }

    #[tokio::test]
    async fn verification_failure_skips_issuer() {
        let verifier = Verifier {
            fail: Some(true),
            ..Verifier::default()
        };
        let handler = SocialExchange::new(Parser::default(), verifier)
            .handler(Issuer::granting(granted()))
            .unwrap();

        let err = handler
            .handle(&request(json!({"social_token": "fb-abc"})))
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Verify { .. }));
        assert!(err.is_retryable());
        assert_eq!(handler.issuer.calls(), 0);
    }

    #[tokio::test]
    async fn issuer_failure_is_passed_through() {
        let handler = exchange(Issuer {
            fail: true,
            ..Issuer::default()
        });

        let err = handler
            .handle(&request(json!({"social_token": "fb-abc"})))
            .await
            .unwrap_err();

        assert!(matches!(err, ExchangeError::Issue { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn absent_scope_is_none() {
        let handler = exchange(Issuer::granting(granted()));

        handler
            .handle(&request(json!({"social_token": "fb-abc"})))
            .await
            .unwrap();

        assert_eq!(handler.issuer.seen_scope(), None);
    }

    #[tokio::test]
    async fn falsy_scope_values_are_none() {
        for scope in [json!(false), json!(0), json!(null), json!("")] {
            let handler = exchange(Issuer::granting(granted()));

            let req = request(json!({"social_token": "t", "scope": scope}));
            handler.handle(&req).await.unwrap();

            assert_eq!(handler.issuer.seen_scope(), None);
        }
    }

    #[tokio::test]
    async fn prioritized_separators() {
        let options = ExchangeOptions::builder()
            .scope_separator([" ", ","])
            .build();

        for (raw, expected) in [
            ("a,b c,d", vec!["a,b", "c,d"]),
            ("a,b,c", vec!["a", "b", "c"]),
            ("single", vec!["single"]),
        ] {
            let handler = SocialExchange::new(Parser::default(), Verifier::default())
                .handler_with_options(options.clone(), Issuer::granting(granted()))
                .unwrap();

            handler
                .handle(&request(json!({"social_token": "t", "scope": raw})))
                .await
                .unwrap();

            let seen = handler.issuer.seen_scope().unwrap();
            assert_eq!(seen, expected, "scope {raw:?}");
        }
    }

    #[tokio::test]
    async fn pre_split_scope_is_not_split_again() {
        let handler = exchange(Issuer::granting(granted()));

        let req = request(json!({"social_token": "t", "scope": ["a b", "c"]}));
        handler.handle(&req).await.unwrap();

        assert_eq!(handler.issuer.seen_scope().unwrap(), vec!["a b", "c"]);
    }

    #[tokio::test]
    async fn client_is_read_from_configured_property() {
        let options = ExchangeOptions::builder().user_property("client").build();
        let handler = SocialExchange::new(Parser::default(), Verifier::default())
            .handler_with_options(options, Issuer::granting(granted()))
            .unwrap();
        assert_eq!(handler.user_property(), "client");

        let req = request(json!({"social_token": "t"}));
        let req = req.with_principal("client", "client-2");
        handler.handle(&req).await.unwrap();

        assert_eq!(handler.issuer.seen.lock().unwrap()[0].0, Some("client-2"));
    }

    #[tokio::test]
    async fn missing_client_is_passed_as_none() {
        let handler = exchange(Issuer::granting(granted()));
        let mut fields = serde_json::Map::new();
        fields.insert("social_token".to_string(), json!("t"));
        let req = TokenRequest::<&'static str>::new(Some(TokenRequestBody::from_fields(fields)));

        handler.handle(&req).await.unwrap();

        assert_eq!(handler.issuer.seen.lock().unwrap()[0].0, None);
    }

    #[tokio::test]
    async fn default_handler_matches_explicit_default_options() {
        let implicit = exchange(Issuer::granting(granted()));
        let explicit = SocialExchange::new(Parser::default(), Verifier::default())
            .handler_with_options(ExchangeOptions::default(), Issuer::granting(granted()))
            .unwrap();

        let req = request(json!({"social_token": "t", "scope": "a,b c"}));
        let implicit_response = implicit.handle(&req).await.unwrap();
        let explicit_response = explicit.handle(&req).await.unwrap();

        assert_eq!(implicit_response.body(), explicit_response.body());
        assert_eq!(implicit_response.headers(), explicit_response.headers());
        assert_eq!(implicit.issuer.seen_scope(), explicit.issuer.seen_scope());
        assert_eq!(implicit.issuer.seen_scope().unwrap(), vec!["a,b", "c"]);
    }

    #[tokio::test]
    async fn runs_through_the_exchange_trait() {
        async fn dispatch<R, E: Exchange<R>>(
            exchange: &E,
            request: &R,
        ) -> Result<Response<Bytes>, E::Error> {
            exchange.exchange(request).await
        }

        let handler = exchange(Issuer::granting(granted()));
        let response = dispatch(&handler, &request(json!({"social_token": "t"})))
            .await
            .unwrap();
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[test]
    fn invalid_separators_fail_at_build_time() {
        let options = ExchangeOptions::builder()
            .scope_separator(ScopeSeparator::Many(vec![]))
            .build();

        let err = SocialExchange::new(Parser::default(), Verifier::default())
            .handler_with_options(options, Issuer::default())
            .unwrap_err();

        assert_eq!(err, ConfigurationError::EmptySeparatorList);
    }

    #[test]
    fn infallible_collaborator_errors_are_never_retryable() {
        let err: ExchangeError<Infallible, Infallible, Infallible> = ExchangeError::Denied {
            source: AuthorizationError::invalid_grant(DENIED_MESSAGE),
        };
        assert!(!err.is_retryable());
    }
}
