//! Prompt Shield client: an HTTP prompt-injection classifier wrapper.
//!
//! Deliberately duplicates the HTTPS client construction used by
//! `agent-adapters`'s provider adapters (that helper is `pub(crate)` there
//! and not reusable from this crate) rather than introducing a new
//! dependency for a handful of lines of boilerplate.

use std::sync::Arc;
use std::time::Duration;

use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Request, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::warn;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::error::GovernanceError;

type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

fn build_https_client() -> HyperClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));
    Client::builder().build::<_, Body>(connector)
}

/// Supplies the bearer token attached to outbound Prompt Shield requests.
///
/// A trait seam rather than a plain string so deployments backed by a
/// rotating credential (e.g. Azure AD) can refresh it per call; no
/// production implementation ships in this crate.
#[async_trait::async_trait]
pub trait BearerTokenProvider: Send + Sync {
    /// Returns the current bearer token.
    async fn token(&self) -> String;
}

/// A [`BearerTokenProvider`] that always returns the same token.
pub struct StaticToken(String);

impl StaticToken {
    /// Wraps a fixed token value.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait::async_trait]
impl BearerTokenProvider for StaticToken {
    async fn token(&self) -> String {
        self.0.clone()
    }
}

/// Outcome of a shield classification call. Deliberately has no `Err`
/// variant that reaches the caller: transport failures and timeouts
/// collapse into [`ShieldOutcome::Unavailable`], letting the caller decide
/// whether that means fail-open (pre-check) or fail-closed (explicit
/// `filter` strategy).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShieldOutcome {
    /// No attack detected.
    Clear,
    /// The classifier flagged the text as a likely prompt injection.
    Flagged,
    /// The service could not be reached or returned an unexpected response.
    Unavailable,
}

impl ShieldOutcome {
    /// Resolves to a boolean "should block" decision, treating
    /// [`Self::Unavailable`] as fail-open (never blocks).
    #[must_use]
    pub const fn blocks_fail_open(self) -> bool {
        matches!(self, Self::Flagged)
    }

    /// Resolves to a boolean "should block" decision, treating
    /// [`Self::Unavailable`] as fail-closed (always blocks).
    #[must_use]
    pub const fn blocks_fail_closed(self) -> bool {
        !matches!(self, Self::Clear)
    }
}

/// HTTP client for a Prompt Shield-style text classification service.
pub struct PromptShieldClient {
    client: HyperClient,
    endpoint: Uri,
    token_provider: Arc<dyn BearerTokenProvider>,
    timeout: Duration,
}

impl PromptShieldClient {
    /// Builds a client against the supplied classification endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceError::Configuration`] if `endpoint` doesn't
    /// parse as a URI.
    pub fn new(
        endpoint: impl AsRef<str>,
        token_provider: Arc<dyn BearerTokenProvider>,
    ) -> Result<Self, GovernanceError> {
        let endpoint = endpoint
            .as_ref()
            .parse::<Uri>()
            .map_err(|err| GovernanceError::configuration(format!("invalid shield endpoint: {err}")))?;

        Ok(Self {
            client: build_https_client(),
            endpoint,
            token_provider,
            timeout: Duration::from_secs(5),
        })
    }

    /// Overrides the request timeout (default 5s).
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classifies `text`, never returning an error: any failure resolves to
    /// [`ShieldOutcome::Unavailable`].
    pub async fn classify(&self, text: &str) -> ShieldOutcome {
        let token = self.token_provider.token().await;
        let payload = ShieldRequest {
            documents: vec![text.to_owned()],
        };

        let body = match serde_json::to_vec(&payload) {
            Ok(body) => body,
            Err(err) => {
                warn!(error = %err, "prompt shield request failed to encode");
                return ShieldOutcome::Unavailable;
            }
        };

        let request = match Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(hyper::header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from(body))
        {
            Ok(request) => request,
            Err(err) => {
                warn!(error = %err, "prompt shield request failed to build");
                return ShieldOutcome::Unavailable;
            }
        };

        let response = match timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                warn!(error = %err, "prompt shield request failed in transit");
                return ShieldOutcome::Unavailable;
            }
            Err(_) => {
                warn!("prompt shield request timed out");
                return ShieldOutcome::Unavailable;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "prompt shield returned non-success status");
            return ShieldOutcome::Unavailable;
        }

        let bytes = match hyper::body::to_bytes(response.into_body()).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "prompt shield response body read failed");
                return ShieldOutcome::Unavailable;
            }
        };

        match serde_json::from_slice::<ShieldResponse>(&bytes) {
            Ok(response) if response.results.iter().any(|r| r.attack_detected) => {
                ShieldOutcome::Flagged
            }
            Ok(_) => ShieldOutcome::Clear,
            Err(err) => {
                warn!(error = %err, "prompt shield response failed to decode");
                ShieldOutcome::Unavailable
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ShieldRequest {
    documents: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ShieldResponse {
    #[serde(default)]
    results: Vec<ShieldResult>,
}

#[derive(Debug, Deserialize)]
struct ShieldResult {
    #[serde(rename = "attackDetected", default)]
    attack_detected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_endpoint() {
        let provider: Arc<dyn BearerTokenProvider> = Arc::new(StaticToken::new("tok"));
        let err = PromptShieldClient::new("not a uri", provider).unwrap_err();
        assert!(matches!(err, GovernanceError::Configuration { .. }));
    }

    #[test]
    fn fail_open_ignores_unavailable() {
        assert!(!ShieldOutcome::Unavailable.blocks_fail_open());
        assert!(ShieldOutcome::Flagged.blocks_fail_open());
        assert!(!ShieldOutcome::Clear.blocks_fail_open());
    }

    #[test]
    fn fail_closed_blocks_unavailable() {
        assert!(ShieldOutcome::Unavailable.blocks_fail_closed());
        assert!(ShieldOutcome::Flagged.blocks_fail_closed());
        assert!(!ShieldOutcome::Clear.blocks_fail_closed());
    }

    #[tokio::test]
    async fn static_token_returns_fixed_value() {
        let provider = StaticToken::new("abc123");
        assert_eq!(provider.token().await, "abc123");
    }
}
