//! Collaborators injected into [`ApiClient`](super::ApiClient) at construction.

use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::errors::{ClientError, ClientResult};
use super::response::read_envelope;
use crate::types::{RefreshTokenRequest, TokenPair};

/// Exchanges a refresh token for a new token pair.
pub trait TokenRefresher: Send + Sync {
    fn refresh(&self, refresh_token: String) -> BoxFuture<'static, ClientResult<TokenPair>>;
}

/// Invoked once the refresh flow has given up and the session was cleared.
pub trait SessionExpiredHandler: Send + Sync {
    fn session_expired(&self);
}

/// Where the host application currently is, and how to move it.
pub trait Navigator: Send + Sync {
    fn current_route(&self) -> String;
    fn navigate(&self, route: &str);
}

/// Sends the host to the login route unless it is already there.
pub struct RedirectToLogin<N> {
    navigator: N,
    login_route: String,
}

impl<N: Navigator> RedirectToLogin<N> {
    pub fn new(navigator: N, login_route: impl Into<String>) -> Self {
        Self {
            navigator,
            login_route: login_route.into(),
        }
    }

    pub fn navigator(&self) -> &N {
        &self.navigator
    }
}

impl<N: Navigator> SessionExpiredHandler for RedirectToLogin<N> {
    fn session_expired(&self) {
        let current = self.navigator.current_route();
        let current_path = current.split(['?', '#']).next().unwrap_or_default();
        if current_path.trim_end_matches('/') == self.login_route.trim_end_matches('/') {
            info!(route = %current, "Session expired while already on the login route");
            return;
        }
        info!(from = %current, to = %self.login_route, "Session expired, redirecting to login");
        self.navigator.navigate(&self.login_route);
    }
}

/// Navigator that only tracks the route in memory. Used by the CLI, which has
/// no page to move, and by embedders that poll the route themselves.
#[derive(Debug, Default)]
pub struct RouteTracker {
    route: Mutex<String>,
    history: Mutex<Vec<String>>,
}

impl RouteTracker {
    pub fn at(route: impl Into<String>) -> Self {
        Self {
            route: Mutex::new(route.into()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Routes navigated to, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().map(|h| h.clone()).unwrap_or_default()
    }
}

impl Navigator for RouteTracker {
    fn current_route(&self) -> String {
        self.route.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn navigate(&self, route: &str) {
        if let Ok(mut current) = self.route.lock() {
            *current = route.to_string();
        }
        if let Ok(mut history) = self.history.lock() {
            history.push(route.to_string());
        }
    }
}

impl<N: Navigator + ?Sized> Navigator for Arc<N> {
    fn current_route(&self) -> String {
        (**self).current_route()
    }

    fn navigate(&self, route: &str) {
        (**self).navigate(route)
    }
}

/// Default refresher: POSTs `{ refreshToken }` to the refresh endpoint with a
/// plain transport, bypassing the client's own 401 handling.
#[derive(Clone)]
pub struct HttpRefresher {
    http: reqwest::Client,
    url: String,
}

impl HttpRefresher {
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

impl TokenRefresher for HttpRefresher {
    fn refresh(&self, refresh_token: String) -> BoxFuture<'static, ClientResult<TokenPair>> {
        let http = self.http.clone();
        let url = self.url.clone();
        Box::pin(async move {
            let response = http
                .post(&url)
                .json(&RefreshTokenRequest { refresh_token })
                .send()
                .await
                .map_err(|e| ClientError::network(e.to_string()))?;

            let envelope = read_envelope(response).await.map_err(|f| f.translate())?;
            if !envelope.success {
                let reason = envelope.message().unwrap_or("success: false").to_string();
                warn!(%reason, "Refresh endpoint rejected the refresh token");
                return Err(ClientError::refresh_failed(reason));
            }

            let pair = envelope
                .decode::<TokenPair>()
                .ok()
                .and_then(|e| e.into_data())
                .filter(TokenPair::is_complete)
                .ok_or_else(|| ClientError::refresh_failed("invalid refresh response"))?;
            Ok(pair)
        })
    }
}
