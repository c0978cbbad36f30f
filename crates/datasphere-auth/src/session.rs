//! OAuth token state machine
//!
//! Two paths end in an authenticated session:
//! - silent: a persisted refresh credential is exchanged at the token
//!   endpoint (preferred — no browser involved)
//! - interactive: the callback listener captures an authorization code,
//!   the code is exchanged, and the new refresh credential is persisted
//!
//! The refresh path is tried first; any failure there (missing, revoked,
//! or expired credential, unreachable endpoint) falls through to the
//! interactive path. Only when both fail is the session unobtainable.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::callback::{self, DEFAULT_AUTHORIZATION_TIMEOUT};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::store::TokenStore;
use crate::token;

/// Snapshot of the current access token handed out for request signing.
///
/// The generation ties the snapshot to the session state it came from:
/// reauthentication bumps it, which lets the session tell whether a failed
/// request was signed with a token that has already been replaced.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: String,
    generation: u64,
}

impl AccessToken {
    /// The raw bearer token value.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

/// Current token state, owned exclusively by the session and replaced
/// wholesale on reauthentication.
struct TokenState {
    access: String,
    generation: u64,
}

/// Owns the OAuth2 token lifecycle for one client configuration.
pub struct AuthSession {
    config: Arc<ClientConfig>,
    http: reqwest::Client,
    store: TokenStore,
    state: Mutex<TokenState>,
    authorization_timeout: Duration,
}

impl AuthSession {
    /// Authenticate and return a ready session, or fail if neither the
    /// refresh path nor the interactive path can produce a token.
    pub async fn initialize(config: Arc<ClientConfig>, http: reqwest::Client) -> Result<Self> {
        Self::initialize_with_timeout(config, http, DEFAULT_AUTHORIZATION_TIMEOUT).await
    }

    /// `initialize` with an explicit interactive-flow timeout.
    pub async fn initialize_with_timeout(
        config: Arc<ClientConfig>,
        http: reqwest::Client,
        authorization_timeout: Duration,
    ) -> Result<Self> {
        let store = TokenStore::new(config.refresh_token_file.clone());
        let access = acquire(&config, &http, &store, authorization_timeout).await?;
        Ok(Self {
            config,
            http,
            store,
            state: Mutex::new(TokenState {
                access,
                generation: 0,
            }),
            authorization_timeout,
        })
    }

    /// Current access token for signing outbound requests.
    pub async fn access_token(&self) -> AccessToken {
        let state = self.state.lock().await;
        AccessToken {
            secret: state.access.clone(),
            generation: state.generation,
        }
    }

    /// Re-run the acquisition flow, discarding the current token state.
    ///
    /// Single-flight: the state lock is held across the whole exchange, and
    /// if `observed` no longer matches the current generation a concurrent
    /// caller already reauthenticated — the call returns without touching
    /// the token endpoint. A burst of rejected requests therefore costs one
    /// reauthentication, not one per request.
    pub async fn reauthenticate(&self, observed: &AccessToken) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.generation != observed.generation {
            debug!("token already replaced by a concurrent reauthentication");
            return Ok(());
        }

        info!("reauthenticating after a rejected request");
        let access = acquire(
            &self.config,
            &self.http,
            &self.store,
            self.authorization_timeout,
        )
        .await?;
        *state = TokenState {
            access,
            generation: state.generation + 1,
        };
        Ok(())
    }
}

/// Run the two-path acquisition flow and return the new access token.
///
/// The refresh credential is re-persisted only after a code exchange: a
/// rotation returned by the refresh grant serves this run, while the file
/// keeps the credential that last came out of an interactive authorization.
async fn acquire(
    config: &ClientConfig,
    http: &reqwest::Client,
    store: &TokenStore,
    authorization_timeout: Duration,
) -> Result<String> {
    if let Some(refresh) = store.load().await {
        info!("refresh credential found, requesting a new access token");
        match token::refresh_token(http, config, &refresh).await {
            Ok(response) => {
                info!("access token renewed from the refresh credential");
                return Ok(response.access_token);
            }
            Err(e) => {
                warn!(error = %e, "refresh credential did not work, falling back to interactive authorization");
            }
        }
    } else {
        info!(
            file = %store.path().display(),
            "no refresh credential found, interactive authorization required"
        );
    }

    let code = callback::await_authorization_code(config, authorization_timeout).await?;
    let response = token::exchange_code(http, config, &code).await?;
    info!("authorization code exchanged for an access token");

    match &response.refresh_token {
        Some(refresh) => {
            store.save(refresh).await?;
            info!(file = %store.path().display(), "refresh credential stored");
        }
        None => warn!(
            "token endpoint returned no refresh credential, the next run will be interactive again"
        ),
    }

    Ok(response.access_token)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicU64, Ordering};

    use axum::extract::Form;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use common::Secret;

    use super::*;

    /// Counters for the two grant types a mock token endpoint saw.
    struct GrantCounts {
        refresh: Arc<AtomicU64>,
        exchange: Arc<AtomicU64>,
    }

    /// Mock token endpoint. Refresh grants succeed or 401 depending on
    /// `accept_refresh`; code exchanges always succeed with `rt_new`.
    async fn mock_token_endpoint(accept_refresh: bool) -> (String, GrantCounts) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let counts = GrantCounts {
            refresh: Arc::new(AtomicU64::new(0)),
            exchange: Arc::new(AtomicU64::new(0)),
        };
        let refresh = counts.refresh.clone();
        let exchange = counts.exchange.clone();

        tokio::spawn(async move {
            let app = axum::Router::new().route(
                "/oauth/token",
                axum::routing::post(move |Form(form): Form<HashMap<String, String>>| {
                    let refresh = refresh.clone();
                    let exchange = exchange.clone();
                    async move {
                        match form.get("grant_type").map(String::as_str) {
                            Some("refresh_token") => {
                                refresh.fetch_add(1, Ordering::SeqCst);
                                if accept_refresh {
                                    axum::Json(serde_json::json!({
                                        "access_token": "at_refreshed",
                                        "refresh_token": "rt_rotated",
                                    }))
                                    .into_response()
                                } else {
                                    (
                                        StatusCode::UNAUTHORIZED,
                                        axum::Json(serde_json::json!({"error": "invalid_grant"})),
                                    )
                                        .into_response()
                                }
                            }
                            Some("authorization_code") => {
                                exchange.fetch_add(1, Ordering::SeqCst);
                                axum::Json(serde_json::json!({
                                    "access_token": "at_exchanged",
                                    "refresh_token": "rt_new",
                                }))
                                .into_response()
                            }
                            _ => StatusCode::BAD_REQUEST.into_response(),
                        }
                    }
                }),
            );
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/oauth/token"), counts)
    }

    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    fn test_config(token_url: &str, redirect_port: u16, refresh_file: &Path) -> Arc<ClientConfig> {
        Arc::new(
            ClientConfig::new(
                "https://dsp.example/api",
                "https://auth.example/oauth/authorize",
                token_url,
                &format!("http://localhost:{redirect_port}/callback"),
                "sb-client",
                Secret::new("s3cr3t".into()),
                refresh_file,
            )
            .unwrap(),
        )
    }

    /// Simulate the browser redirect: poll the callback listener until it
    /// accepts, then deliver the code.
    fn drive_callback(port: u16, code: &str) -> tokio::task::JoinHandle<()> {
        let url = format!("http://127.0.0.1:{port}/callback?code={code}");
        tokio::spawn(async move {
            let client = reqwest::Client::new();
            for _ in 0..100 {
                tokio::time::sleep(Duration::from_millis(25)).await;
                if let Ok(response) = client.get(&url).send().await
                    && response.status().is_success()
                {
                    return;
                }
            }
            panic!("callback listener never accepted {url}");
        })
    }

    #[tokio::test]
    async fn valid_refresh_credential_skips_the_interactive_flow() {
        let dir = tempfile::tempdir().unwrap();
        let refresh_file = dir.path().join("refresh.txt");
        tokio::fs::write(&refresh_file, "rt_seed").await.unwrap();

        let (token_url, counts) = mock_token_endpoint(true).await;
        let config = test_config(&token_url, free_port(), &refresh_file);

        let session = AuthSession::initialize(config, reqwest::Client::new())
            .await
            .unwrap();

        assert_eq!(session.access_token().await.secret(), "at_refreshed");
        assert_eq!(counts.refresh.load(Ordering::SeqCst), 1);
        assert_eq!(
            counts.exchange.load(Ordering::SeqCst),
            0,
            "a valid refresh credential must never trigger the interactive flow"
        );
    }

    #[tokio::test]
    async fn missing_credential_runs_interactive_flow_once_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let refresh_file = dir.path().join("refresh.txt");

        let (token_url, counts) = mock_token_endpoint(true).await;
        let port = free_port();
        let config = test_config(&token_url, port, &refresh_file);

        let driver = drive_callback(port, "the-code");
        let session = AuthSession::initialize_with_timeout(
            config,
            reqwest::Client::new(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        driver.await.unwrap();

        assert_eq!(session.access_token().await.secret(), "at_exchanged");
        assert_eq!(counts.refresh.load(Ordering::SeqCst), 0);
        assert_eq!(counts.exchange.load(Ordering::SeqCst), 1);
        let persisted = tokio::fs::read_to_string(&refresh_file).await.unwrap();
        assert_eq!(persisted, "rt_new");
    }

    #[tokio::test]
    async fn rejected_refresh_credential_falls_back_to_interactive() {
        let dir = tempfile::tempdir().unwrap();
        let refresh_file = dir.path().join("refresh.txt");
        tokio::fs::write(&refresh_file, "rt_revoked").await.unwrap();

        let (token_url, counts) = mock_token_endpoint(false).await;
        let port = free_port();
        let config = test_config(&token_url, port, &refresh_file);

        let driver = drive_callback(port, "fallback-code");
        let session = AuthSession::initialize_with_timeout(
            config,
            reqwest::Client::new(),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        driver.await.unwrap();

        assert_eq!(session.access_token().await.secret(), "at_exchanged");
        assert_eq!(counts.refresh.load(Ordering::SeqCst), 1);
        assert_eq!(counts.exchange.load(Ordering::SeqCst), 1);

        // The revoked credential is replaced on disk
        let persisted = tokio::fs::read_to_string(&refresh_file).await.unwrap();
        assert_eq!(persisted, "rt_new");
    }

    #[tokio::test]
    async fn concurrent_reauthentication_is_single_flight() {
        let dir = tempfile::tempdir().unwrap();
        let refresh_file = dir.path().join("refresh.txt");
        tokio::fs::write(&refresh_file, "rt_seed").await.unwrap();

        let (token_url, counts) = mock_token_endpoint(true).await;
        let config = test_config(&token_url, free_port(), &refresh_file);

        let session = AuthSession::initialize(config, reqwest::Client::new())
            .await
            .unwrap();
        assert_eq!(counts.refresh.load(Ordering::SeqCst), 1);

        // Two requests fail with the same token and both demand a new one
        let observed_a = session.access_token().await;
        let observed_b = observed_a.clone();
        let (a, b) = tokio::join!(
            session.reauthenticate(&observed_a),
            session.reauthenticate(&observed_b),
        );
        a.unwrap();
        b.unwrap();

        assert_eq!(
            counts.refresh.load(Ordering::SeqCst),
            2,
            "a burst of rejected requests must cost exactly one reauthentication"
        );
    }

    #[tokio::test]
    async fn reauthenticate_replaces_the_token_state() {
        let dir = tempfile::tempdir().unwrap();
        let refresh_file = dir.path().join("refresh.txt");
        tokio::fs::write(&refresh_file, "rt_seed").await.unwrap();

        let (token_url, _counts) = mock_token_endpoint(true).await;
        let config = test_config(&token_url, free_port(), &refresh_file);

        let session = AuthSession::initialize(config, reqwest::Client::new())
            .await
            .unwrap();

        let before = session.access_token().await;
        session.reauthenticate(&before).await.unwrap();
        let after = session.access_token().await;

        assert_ne!(before.generation, after.generation);
    }
}
