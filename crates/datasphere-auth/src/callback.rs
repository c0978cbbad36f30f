//! Authorization-code capture via a transient local HTTP listener
//!
//! The identity provider delivers the authorization code by redirecting
//! the user's browser to a locally bound address. The listener accepts
//! exactly one qualifying request, hands the code to the waiting flow
//! through a oneshot channel, and is then shut down gracefully by that
//! flow — never from inside its own request handler, so the confirmation
//! response always flushes before the server goes away.
//!
//! Ordering matters: the listener is bound and accepting before the
//! browser is opened, so a fast redirect can never race the bind.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, oneshot};
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// How long to wait for the browser round trip before giving up.
pub const DEFAULT_AUTHORIZATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Static page shown in the browser once the code is captured.
const CONFIRMATION_PAGE: &str = r#"<!DOCTYPE html>
<html>
    <head>
        <title>Authorization received</title>
    </head>
    <body style="font-family: system-ui; text-align: center; padding-top: 80px;">
        <h2>Authorization code received</h2>
        <p>You can close this tab and return to the terminal.</p>
    </body>
</html>"#;

/// Build the URL the user authorizes at. Pipes appear in XSUAA client ids
/// and must be percent-encoded; everything else passes through unchanged.
pub fn build_authorization_url(config: &ClientConfig) -> String {
    format!(
        "{}?response_type=code&client_id={}",
        config.authorization_url, config.client_id
    )
    .replace('|', "%7C")
}

/// Run the full interactive capture: bind the listener, open the browser,
/// wait for the redirect.
pub async fn await_authorization_code(
    config: &ClientConfig,
    timeout: Duration,
) -> Result<String> {
    let listener = CallbackListener::bind(config).await?;
    open_browser(&build_authorization_url(config));
    listener.capture(timeout).await
}

/// Fire-and-forget browser launch. A failure is never fatal: the URL is
/// logged so the user can open it by hand.
fn open_browser(url: &str) {
    info!(%url, "opening browser for authorization");
    if let Err(e) = open::that_detached(url) {
        warn!(error = %e, %url, "could not open a browser, visit the URL manually");
    }
}

/// A single-use local HTTP endpoint for the authorization redirect.
pub struct CallbackListener {
    listener: TcpListener,
    redirect_path: String,
}

impl CallbackListener {
    /// Bind on the configured redirect port. Must complete before the
    /// browser is pointed at the authorization URL.
    pub async fn bind(config: &ClientConfig) -> Result<Self> {
        Self::bind_addr(("0.0.0.0", config.redirect_port), &config.redirect_path).await
    }

    async fn bind_addr(
        addr: impl tokio::net::ToSocketAddrs,
        redirect_path: &str,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Callback(format!("failed to bind authorization listener: {e}")))?;
        Ok(Self {
            listener,
            redirect_path: redirect_path.to_string(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::Callback(format!("listener has no local address: {e}")))
    }

    /// Serve until one qualifying redirect arrives, then shut down.
    ///
    /// Qualifying means a GET on the redirect path with a `code` query
    /// parameter. Other paths get a benign 404 and the wait continues.
    /// The shutdown signal is sent from here after the code (or timeout)
    /// resolves the wait; graceful shutdown lets the in-flight
    /// confirmation response finish first.
    pub async fn capture(self, timeout: Duration) -> Result<String> {
        let Self {
            listener,
            redirect_path,
        } = self;

        let (code_tx, code_rx) = oneshot::channel::<String>();
        let code_tx = Arc::new(Mutex::new(Some(code_tx)));
        let app = build_router(&redirect_path, code_tx);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(path = %redirect_path, "waiting for authorization redirect");

        let result = tokio::select! {
            code = code_rx => code.map_err(|_| {
                Error::Callback("listener closed before an authorization code arrived".into())
            }),
            _ = tokio::time::sleep(timeout) => Err(Error::Callback(format!(
                "no authorization redirect within {}s",
                timeout.as_secs()
            ))),
        };

        let _ = shutdown_tx.send(());
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "authorization listener error during shutdown"),
            Err(e) => warn!(error = %e, "authorization listener task failed"),
        }

        result
    }
}

fn build_router(
    redirect_path: &str,
    code_tx: Arc<Mutex<Option<oneshot::Sender<String>>>>,
) -> Router {
    Router::new()
        .route(
            redirect_path,
            get(move |Query(params): Query<HashMap<String, String>>| {
                let code_tx = code_tx.clone();
                async move {
                    let Some(code) = params.get("code") else {
                        return (StatusCode::BAD_REQUEST, "missing code parameter")
                            .into_response();
                    };
                    if let Some(sender) = code_tx.lock().await.take() {
                        info!("authorization code received");
                        let _ = sender.send(code.clone());
                    }
                    Html(CONFIRMATION_PAGE).into_response()
                }
            }),
        )
        .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
}
