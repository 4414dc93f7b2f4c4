//! OAuth 2.0 Authorization Code Flow with PKCE
//!
//! Implements the client side of RFC 6749 (authorization code and refresh
//! grants) and RFC 7636 (PKCE, S256) against a Cognito-style identity
//! provider.
//!
//! # Overview
//!
//! - [`OAuthConfig`]: provider endpoints and client registration
//! - [`PkceVerifier`]: per-attempt code verifier and CSRF state
//! - [`OAuthClient`]: builds the authorize and logout URLs and talks to the
//!   token endpoint
//!
//! # Security
//!
//! - Token-endpoint calls are never retried at the HTTP layer: an
//!   authorization code is single-use and replaying it would fail or, worse,
//!   trip the provider's replay detection
//! - Codes, verifiers, tokens and the client secret are never logged
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthClient, OAuthConfig, PkceVerifier};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(http_client: Arc<dyn bridge_traits::HttpClient>) -> core_auth::Result<()> {
//! let config = OAuthConfig::cognito(
//!     "auth.example.com",
//!     "console-client",
//!     "https://console.example.com/callback",
//! );
//! let client = OAuthClient::new(config, http_client, Duration::from_secs(30));
//!
//! let pkce = PkceVerifier::new();
//! let url = client.authorization_url(&pkce)?;
//! // Redirect the browser to `url`...
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::types::TokenResponse;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use core_runtime::logging::strip_query;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

const DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];

/// Identity provider endpoints and client registration.
#[derive(Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Present for confidential clients; sent as HTTP Basic credentials
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    /// Where the provider sends the browser after logout
    pub logout_redirect_uri: Option<String>,
    pub scopes: Vec<String>,
    pub authorize_url: String,
    pub token_url: String,
    pub logout_url: String,
}

impl OAuthConfig {
    /// Configuration for a Cognito hosted-UI domain.
    ///
    /// `domain` may be a bare host (`auth.example.com`) or a full origin
    /// (`http://localhost:9229` for local emulators).
    pub fn cognito(
        domain: impl AsRef<str>,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        let domain = domain.as_ref().trim_end_matches('/');
        let base = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        };

        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            logout_redirect_uri: None,
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            authorize_url: format!("{}/oauth2/authorize", base),
            token_url: format!("{}/oauth2/token", base),
            logout_url: format!("{}/logout", base),
        }
    }

    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    pub fn with_logout_redirect(mut self, uri: impl Into<String>) -> Self {
        self.logout_redirect_uri = Some(uri.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Read the configuration from `COGNITO_*` environment variables.
    ///
    /// | Variable                | Required |
    /// |-------------------------|----------|
    /// | `COGNITO_DOMAIN`        | yes      |
    /// | `COGNITO_CLIENT_ID`     | yes      |
    /// | `COGNITO_REDIRECT_URI`  | yes      |
    /// | `COGNITO_CLIENT_SECRET` | no       |
    /// | `COGNITO_LOGOUT_URI`    | no       |
    /// | `COGNITO_SCOPES`        | no (space separated) |
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &str| {
            get(name).ok_or_else(|| AuthError::InvalidConfig(format!("{} is not set", name)))
        };

        let mut config = Self::cognito(
            require("COGNITO_DOMAIN")?,
            require("COGNITO_CLIENT_ID")?,
            require("COGNITO_REDIRECT_URI")?,
        );

        if let Some(secret) = get("COGNITO_CLIENT_SECRET") {
            config = config.with_client_secret(secret);
        }
        if let Some(uri) = get("COGNITO_LOGOUT_URI") {
            config = config.with_logout_redirect(uri);
        }
        if let Some(scopes) = get("COGNITO_SCOPES") {
            config = config.with_scopes(scopes.split_whitespace());
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that every URL parses and the client id is set.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfig("client_id is empty".to_string()));
        }

        let urls = [
            ("authorize_url", Some(&self.authorize_url)),
            ("token_url", Some(&self.token_url)),
            ("logout_url", Some(&self.logout_url)),
            ("redirect_uri", Some(&self.redirect_uri)),
            ("logout_redirect_uri", self.logout_redirect_uri.as_ref()),
        ];

        for (name, value) in urls {
            if let Some(value) = value {
                Url::parse(value).map_err(|e| {
                    AuthError::InvalidConfig(format!("{} '{}' is not a valid URL: {}", name, value, e))
                })?;
            }
        }

        if self.scopes.is_empty() {
            return Err(AuthError::InvalidConfig(
                "at least one scope is required".to_string(),
            ));
        }

        Ok(())
    }
}

impl fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .field("redirect_uri", &self.redirect_uri)
            .field("logout_redirect_uri", &self.logout_redirect_uri)
            .field("scopes", &self.scopes)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .finish()
    }
}

/// PKCE code verifier plus the CSRF `state` for one authorization attempt.
///
/// Only the challenge derived from the verifier is sent to the authorize
/// endpoint; the verifier itself goes to the token endpoint.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generate a 32-byte verifier and a 16-byte state from the OS RNG,
    /// both base64url without padding.
    pub fn new() -> Self {
        Self {
            verifier: random_token(32),
            state: random_token(16),
        }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// S256 challenge: BASE64URL(SHA256(verifier))
    pub fn challenge(&self) -> String {
        code_challenge(&self.verifier)
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PkceVerifier { .. }")
    }
}

fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Error body of a failed token-endpoint call (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// RFC 6749 error codes that point at the client registration rather than
/// the refresh token.
const CLIENT_CONFIGURATION_ERRORS: &[&str] = &["invalid_client", "unauthorized_client"];

fn error_code(response: &HttpResponse) -> Option<String> {
    response.json::<TokenErrorBody>().ok().map(|body| body.error)
}

fn describe_failure(response: &HttpResponse) -> String {
    match response.json::<TokenErrorBody>() {
        Ok(body) => match body.error_description {
            Some(description) => format!(
                "token endpoint returned {} {}: {}",
                response.status, body.error, description
            ),
            None => format!("token endpoint returned {} {}", response.status, body.error),
        },
        Err(_) => format!("token endpoint returned HTTP {}", response.status),
    }
}

/// Client for the identity provider's authorize, token and logout
/// endpoints.
pub struct OAuthClient {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    exchange_timeout: Duration,
}

impl OAuthClient {
    pub fn new(
        config: OAuthConfig,
        http_client: Arc<dyn HttpClient>,
        exchange_timeout: Duration,
    ) -> Self {
        Self {
            config,
            http_client,
            exchange_timeout,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the authorize URL carrying `pkce`'s state and challenge.
    #[instrument(skip(self, pkce))]
    pub fn authorization_url(&self, pkce: &PkceVerifier) -> Result<String> {
        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid authorize URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", pkce.state())
            .append_pair("code_challenge", &pkce.challenge())
            .append_pair("code_challenge_method", "S256");

        let url: String = url.into();
        debug!(endpoint = strip_query(&url), "Built authorization URL");
        Ok(url)
    }

    /// Provider logout URL, when a logout redirect is configured.
    pub fn logout_url(&self) -> Option<String> {
        let logout_redirect = self.config.logout_redirect_uri.as_ref()?;
        let mut url = Url::parse(&self.config.logout_url).ok()?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("logout_uri", logout_redirect);
        Some(url.into())
    }

    /// Exchange an authorization code for tokens.
    ///
    /// Exactly one request is sent. Any failure, including a rejection by
    /// the provider, is an [`AuthError::ExchangeFailure`].
    #[instrument(skip(self, code, code_verifier))]
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self.post_token(&form).await?;

        if !response.is_success() {
            let message = describe_failure(&response);
            warn!(status = response.status, "Authorization code exchange rejected");
            return Err(AuthError::ExchangeFailure(message));
        }

        let tokens: TokenResponse = response
            .json()
            .map_err(|e| AuthError::ExchangeFailure(format!("invalid token response: {}", e)))?;

        info!(expires_in = tokens.expires_in, "Exchanged authorization code");
        Ok(tokens)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// A 4xx rejection (other than 429) means the refresh token is no longer
    /// usable and maps to [`AuthError::ReauthenticationRequired`], unless the
    /// provider blames the client itself (`invalid_client`,
    /// `unauthorized_client`). Those, transport failures, timeouts, 429 and
    /// 5xx map to [`AuthError::ExchangeFailure`].
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
        ];

        let response = self.post_token(&form).await?;

        if response.is_client_error() && response.status != 429 {
            if let Some(code) = error_code(&response)
                .filter(|code| CLIENT_CONFIGURATION_ERRORS.contains(&code.as_str()))
            {
                error!(
                    status = response.status,
                    error_code = %code,
                    "Token endpoint rejected the client; check client id and secret"
                );
                return Err(AuthError::ExchangeFailure(describe_failure(&response)));
            }

            warn!(
                status = response.status,
                detail = %describe_failure(&response),
                "Refresh token rejected"
            );
            return Err(AuthError::ReauthenticationRequired);
        }

        if !response.is_success() {
            let message = describe_failure(&response);
            warn!(status = response.status, "Token refresh failed");
            return Err(AuthError::ExchangeFailure(message));
        }

        let tokens: TokenResponse = response
            .json()
            .map_err(|e| AuthError::ExchangeFailure(format!("invalid token response: {}", e)))?;

        info!(
            expires_in = tokens.expires_in,
            rotated = tokens.refresh_token.is_some(),
            "Refreshed access token"
        );
        Ok(tokens)
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> Result<HttpResponse> {
        let body = serde_urlencoded::to_string(form).map_err(|e| {
            AuthError::ExchangeFailure(format!("failed to encode token request: {}", e))
        })?;

        let mut request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .header("Accept", "application/json")
            .form(body)
            .timeout(self.exchange_timeout);

        if let Some(secret) = &self.config.client_secret {
            let credentials = STANDARD.encode(format!("{}:{}", self.config.client_id, secret));
            request = request.header("Authorization", format!("Basic {}", credentials));
        }

        let call = self
            .http_client
            .execute_with_retry(request, RetryPolicy::none());

        match tokio::time::timeout(self.exchange_timeout, call).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => {
                warn!(error = %e, "Token endpoint unreachable");
                Err(AuthError::ExchangeFailure(e.to_string()))
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.exchange_timeout.as_millis() as u64,
                    "Token endpoint timed out"
                );
                Err(AuthError::ExchangeFailure(format!(
                    "token endpoint did not respond within {:?}",
                    self.exchange_timeout
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ScriptedHttpClient, CODE_GRANT_RESPONSE};
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_with_retry(
                &self,
                request: HttpRequest,
                policy: RetryPolicy,
            ) -> BridgeResult<HttpResponse>;
        }
    }

    fn config() -> OAuthConfig {
        OAuthConfig::cognito(
            "auth.example.com",
            "console-client",
            "https://console.example.com/callback",
        )
    }

    fn client_with(http: Arc<dyn HttpClient>, config: OAuthConfig) -> OAuthClient {
        OAuthClient::new(config, http, Duration::from_secs(5))
    }

    fn query_of(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn test_pkce_verifier_generation() {
        let first = PkceVerifier::new();
        let second = PkceVerifier::new();

        assert_eq!(first.verifier().len(), 43);
        assert_eq!(first.state().len(), 22);
        assert_ne!(first.verifier(), second.verifier());
        assert_ne!(first.state(), second.state());
        assert_eq!(first.challenge(), first.challenge());
        assert!(!format!("{:?}", first).contains(first.verifier()));
    }

    #[test]
    fn test_pkce_challenge_matches_rfc7636_vector() {
        // RFC 7636 Appendix B
        assert_eq!(
            code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_cognito_endpoints() {
        let config = config();
        assert_eq!(config.authorize_url, "https://auth.example.com/oauth2/authorize");
        assert_eq!(config.token_url, "https://auth.example.com/oauth2/token");
        assert_eq!(config.logout_url, "https://auth.example.com/logout");
        assert_eq!(config.scopes, vec!["openid", "email", "profile"]);

        let local = OAuthConfig::cognito("http://localhost:9229/", "id", "http://localhost/cb");
        assert_eq!(local.token_url, "http://localhost:9229/oauth2/token");
    }

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("COGNITO_DOMAIN", "auth.example.com"),
            ("COGNITO_CLIENT_ID", "console-client"),
            ("COGNITO_REDIRECT_URI", "https://console.example.com/callback"),
            ("COGNITO_CLIENT_SECRET", "s3cret"),
            ("COGNITO_LOGOUT_URI", "https://console.example.com/"),
            ("COGNITO_SCOPES", "openid  aws.cognito.signin.user.admin"),
        ]
        .into_iter()
        .collect();

        let config = OAuthConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.client_secret.as_deref(), Some("s3cret"));
        assert_eq!(
            config.logout_redirect_uri.as_deref(),
            Some("https://console.example.com/")
        );
        assert_eq!(config.scopes, vec!["openid", "aws.cognito.signin.user.admin"]);
        assert!(!format!("{:?}", config).contains("s3cret"));
    }

    #[test]
    fn test_config_from_lookup_requires_domain() {
        let err = OAuthConfig::from_lookup(|k| match k {
            "COGNITO_CLIENT_ID" => Some("id".to_string()),
            "COGNITO_REDIRECT_URI" => Some("https://console.example.com/cb".to_string()),
            _ => None,
        })
        .unwrap_err();

        assert_eq!(
            err,
            AuthError::InvalidConfig("COGNITO_DOMAIN is not set".to_string())
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut bad = config();
        bad.redirect_uri = "not a url".to_string();
        assert!(matches!(bad.validate(), Err(AuthError::InvalidConfig(_))));

        let bad = OAuthConfig::cognito("auth.example.com", " ", "https://c.example.com/cb");
        assert!(matches!(bad.validate(), Err(AuthError::InvalidConfig(_))));

        let bad = config().with_scopes(Vec::<String>::new());
        assert!(matches!(bad.validate(), Err(AuthError::InvalidConfig(_))));

        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_authorization_url() {
        let client = client_with(Arc::new(ScriptedHttpClient::default()), config());
        let pkce = PkceVerifier::new();

        let url = client.authorization_url(&pkce).unwrap();
        assert!(url.starts_with("https://auth.example.com/oauth2/authorize?"));

        let query = query_of(&url);
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "console-client");
        assert_eq!(query["redirect_uri"], "https://console.example.com/callback");
        assert_eq!(query["scope"], "openid email profile");
        assert_eq!(query["state"], pkce.state());
        assert_eq!(query["code_challenge"], pkce.challenge());
        assert_eq!(query["code_challenge_method"], "S256");
        assert!(!url.contains(pkce.verifier()));
    }

    #[test]
    fn test_logout_url() {
        let http: Arc<dyn HttpClient> = Arc::new(ScriptedHttpClient::default());
        assert_eq!(client_with(http.clone(), config()).logout_url(), None);

        let client = client_with(
            http,
            config().with_logout_redirect("https://console.example.com/"),
        );
        let url = client.logout_url().unwrap();
        let query = query_of(&url);

        assert!(url.starts_with("https://auth.example.com/logout?"));
        assert_eq!(query["client_id"], "console-client");
        assert_eq!(query["logout_uri"], "https://console.example.com/");
    }

    #[tokio::test]
    async fn test_exchange_code_sends_single_form_post() {
        let mut http = MockHttp::new();
        http.expect_execute_with_retry()
            .withf(|request, policy| {
                let form: HashMap<String, String> =
                    serde_urlencoded::from_bytes(request.body.as_deref().unwrap_or_default())
                        .unwrap();
                policy.max_attempts == 1
                    && request.method == HttpMethod::Post
                    && request.url == "https://auth.example.com/oauth2/token"
                    && request.header_value("content-type")
                        == Some("application/x-www-form-urlencoded")
                    && request.header_value("authorization").is_none()
                    && form["grant_type"] == "authorization_code"
                    && form["code"] == "the-code"
                    && form["code_verifier"] == "the-verifier"
                    && form["client_id"] == "console-client"
                    && form["redirect_uri"] == "https://console.example.com/callback"
            })
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(200, CODE_GRANT_RESPONSE)));

        let client = client_with(Arc::new(http), config());
        let tokens = client.exchange_code("the-code", "the-verifier").await.unwrap();

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.id_token.as_deref(), Some("id-1"));
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn test_confidential_client_uses_basic_auth() {
        let http = Arc::new(ScriptedHttpClient::default());
        http.push_json(200, CODE_GRANT_RESPONSE);

        let client = client_with(http.clone(), config().with_client_secret("s3cret"));
        client.exchange_code("c", "v").await.unwrap();

        let (request, _) = http.requests().pop().unwrap();
        let expected = format!("Basic {}", STANDARD.encode("console-client:s3cret"));
        assert_eq!(request.header_value("authorization"), Some(expected.as_str()));
        assert!(!http.last_form().contains_key("client_secret"));
    }

    #[tokio::test]
    async fn test_exchange_code_rejection_is_exchange_failure() {
        let http = Arc::new(ScriptedHttpClient::default());
        http.push_json(
            400,
            r#"{"error":"invalid_grant","error_description":"Code expired"}"#,
        );

        let client = client_with(http.clone(), config());
        let err = client.exchange_code("c", "v").await.unwrap_err();

        match err {
            AuthError::ExchangeFailure(message) => {
                assert!(message.contains("invalid_grant"));
                assert!(message.contains("Code expired"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(http.calls(), 1);
    }

    #[tokio::test]
    async fn test_exchange_code_transport_failure() {
        let http = Arc::new(ScriptedHttpClient::default());
        http.push_error(BridgeError::OperationFailed("connection reset".to_string()));

        let client = client_with(http, config());
        assert!(matches!(
            client.exchange_code("c", "v").await,
            Err(AuthError::ExchangeFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_timeout() {
        let http = Arc::new(ScriptedHttpClient::default());
        http.set_delay(Duration::from_millis(200));
        http.push_json(200, CODE_GRANT_RESPONSE);

        let client = OAuthClient::new(config(), http, Duration::from_millis(20));
        let err = client.exchange_code("c", "v").await.unwrap_err();

        assert!(matches!(err, AuthError::ExchangeFailure(ref m) if m.contains("did not respond")));
    }

    #[tokio::test]
    async fn test_refresh_request_shape() {
        let http = Arc::new(ScriptedHttpClient::default());
        http.push_json(200, r#"{"access_token":"access-2","expires_in":60}"#);

        let client = client_with(http.clone(), config());
        let tokens = client.refresh("refresh-1").await.unwrap();

        assert_eq!(tokens.access_token, "access-2");
        let form = http.last_form();
        assert_eq!(form["grant_type"], "refresh_token");
        assert_eq!(form["refresh_token"], "refresh-1");
        assert_eq!(form["client_id"], "console-client");
        assert_eq!(http.requests()[0].1, RetryPolicy::none());
    }

    #[tokio::test]
    async fn test_refresh_classifies_failures() {
        let http = Arc::new(ScriptedHttpClient::default());
        http.push_json(400, r#"{"error":"invalid_grant"}"#);
        http.push_json(401, r#"{"error":"invalid_token"}"#);
        http.push_json(429, "");
        http.push_json(503, "unavailable");
        http.push_error(BridgeError::Timeout("token".to_string()));

        let client = client_with(http, config());

        assert_eq!(
            client.refresh("r").await.unwrap_err(),
            AuthError::ReauthenticationRequired
        );
        assert_eq!(
            client.refresh("r").await.unwrap_err(),
            AuthError::ReauthenticationRequired
        );
        assert!(matches!(
            client.refresh("r").await,
            Err(AuthError::ExchangeFailure(_))
        ));
        assert!(matches!(
            client.refresh("r").await,
            Err(AuthError::ExchangeFailure(ref m)) if m.contains("503")
        ));
        assert!(matches!(
            client.refresh("r").await,
            Err(AuthError::ExchangeFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_client_misconfiguration_keeps_session() {
        let http = Arc::new(ScriptedHttpClient::default());
        http.push_json(
            401,
            r#"{"error":"invalid_client","error_description":"Client secret mismatch"}"#,
        );
        http.push_json(400, r#"{"error":"unauthorized_client"}"#);

        let client = client_with(http, config().with_client_secret("wrong"));

        assert!(matches!(
            client.refresh("r").await,
            Err(AuthError::ExchangeFailure(ref m)) if m.contains("invalid_client")
        ));
        assert!(matches!(
            client.refresh("r").await,
            Err(AuthError::ExchangeFailure(ref m)) if m.contains("unauthorized_client")
        ));
    }
}
