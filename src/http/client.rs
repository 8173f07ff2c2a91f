use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use super::errors::{ClientError, ClientResult};
use super::hooks::{HttpRefresher, SessionExpiredHandler, TokenRefresher};
use super::refresh::{RefreshCoordinator, Ticket};
use super::request::{build_form, Body, RequestSpec};
use super::response::{read_envelope, Failure};
use crate::config::ClientConfig;
use crate::session::{CredentialStore, MemoryStore};
use crate::types::{Envelope, TokenPair};

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub type LogoutFn = Arc<dyn Fn() + Send + Sync>;

/// HTTP client for the backend API.
///
/// Attaches the stored access token to every request and, when the backend
/// answers 401, refreshes the token once on behalf of every request that hit
/// the same expiry, then replays each of them. Cheap to clone; clones share
/// credentials and refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    session_expired: Arc<dyn SessionExpiredHandler>,
    logout: LogoutFn,
    default_headers: RwLock<HeaderMap>,
    refresh: RefreshCoordinator,
}

struct LogSessionExpired;

impl SessionExpiredHandler for LogSessionExpired {
    fn session_expired(&self) {
        warn!("Session expired; sign in again");
    }
}

pub struct ApiClientBuilder {
    config: ClientConfig,
    http: Option<reqwest::Client>,
    store: Option<Arc<dyn CredentialStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    session_expired: Option<Arc<dyn SessionExpiredHandler>>,
    logout: Option<LogoutFn>,
}

impl ApiClientBuilder {
    /// Use a preconfigured transport. Its own timeout applies instead of
    /// `config.timeout_secs`.
    pub fn http_client(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn on_session_expired(mut self, handler: Arc<dyn SessionExpiredHandler>) -> Self {
        self.session_expired = Some(handler);
        self
    }

    /// Replace the default logout action (clearing the store's session keys).
    pub fn on_logout(mut self, logout: impl Fn() + Send + Sync + 'static) -> Self {
        self.logout = Some(Arc::new(logout));
        self
    }

    pub fn build(self) -> ClientResult<ApiClient> {
        let http = match self.http {
            Some(http) => http,
            None => reqwest::Client::builder()
                .timeout(self.config.timeout())
                .build()
                .map_err(|e| ClientError::Validation(format!("cannot build HTTP client: {e}")))?,
        };

        let store: Arc<dyn CredentialStore> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };

        let refresher: Arc<dyn TokenRefresher> = match self.refresher {
            Some(refresher) => refresher,
            None => {
                let url = self.config.url_for(&self.config.endpoints.refresh);
                Arc::new(HttpRefresher::new(http.clone(), url))
            }
        };

        let logout: LogoutFn = match self.logout {
            Some(logout) => logout,
            None => {
                let store = store.clone();
                Arc::new(move || store.clear_session())
            }
        };

        let session_expired: Arc<dyn SessionExpiredHandler> = match self.session_expired {
            Some(handler) => handler,
            None => Arc::new(LogSessionExpired),
        };

        let mut default_headers = HeaderMap::new();
        default_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(ApiClient {
            inner: Arc::new(Inner {
                http,
                config: self.config,
                store,
                refresher,
                session_expired,
                logout,
                default_headers: RwLock::new(default_headers),
                refresh: RefreshCoordinator::new(),
            }),
        })
    }
}

fn bearer(token: &str) -> ClientResult<HeaderValue> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ClientError::Validation("access token contains invalid characters".to_string()))
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            http: None,
            store: None,
            refresher: None,
            session_expired: None,
            logout: None,
        }
    }

    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> ClientResult<Self> {
        Self::builder(config).store(store).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    pub fn refresher(&self) -> &Arc<dyn TokenRefresher> {
        &self.inner.refresher
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    pub fn pending_refresh_waiters(&self) -> usize {
        self.inner.refresh.pending()
    }

    /// Current value of a default header (sent with every request unless
    /// overridden).
    pub fn default_header(&self, name: &HeaderName) -> Option<HeaderValue> {
        self.inner
            .default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn default_headers(&self) -> HeaderMap {
        self.inner
            .default_headers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_default_authorization(&self, token: Option<&str>) {
        let mut headers = self
            .inner
            .default_headers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        match token.map(bearer) {
            Some(Ok(value)) => {
                headers.insert(AUTHORIZATION, value);
            }
            Some(Err(e)) => warn!(error = %e, "Not storing default authorization header"),
            None => {
                headers.remove(AUTHORIZATION);
            }
        }
    }

    /// Persist a freshly issued pair (login, explicit refresh) and use it for
    /// future requests.
    pub fn install_tokens(&self, tokens: &TokenPair) {
        self.inner
            .store
            .store_tokens(&tokens.access_token, &tokens.refresh_token);
        self.set_default_authorization(Some(&tokens.access_token));
    }

    /// Full local logout: run the logout action and drop the default
    /// authorization header. Does not contact the backend.
    pub fn logout(&self) {
        (self.inner.logout)();
        self.set_default_authorization(None);
    }

    /// Send a request and return the raw envelope.
    ///
    /// `success: false` is returned as-is for auth endpoints and converted to
    /// [`ClientError::Application`] everywhere else.
    pub async fn send(&self, spec: RequestSpec) -> ClientResult<Envelope<Value>> {
        let request_id = Uuid::new_v4();
        let span = tracing::debug_span!(
            "api_request",
            %request_id,
            method = %spec.method,
            path = %spec.path,
        );
        async move {
            let token = self.inner.store.access_token();
            match self.dispatch(&spec, token.as_deref(), request_id).await {
                Ok(envelope) => self.check_envelope(&spec, envelope),
                Err(failure) => self.recover(spec, failure, request_id).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Send a request and decode the envelope's `data` as `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, spec: RequestSpec) -> ClientResult<Envelope<T>> {
        self.send(spec)
            .await?
            .decode()
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send a request and return only its `data`, which must be present.
    pub async fn fetch<T: DeserializeOwned>(&self, spec: RequestSpec) -> ClientResult<T> {
        self.send_as::<T>(spec)
            .await?
            .into_data()
            .ok_or_else(|| ClientError::Decode("response has no data".to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        self.fetch(RequestSpec::get(path)).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> ClientResult<T> {
        self.fetch(RequestSpec::post(path).json_value(body)).await
    }

    pub async fn put<T: DeserializeOwned>(&self, path: &str, body: Value) -> ClientResult<T> {
        self.fetch(RequestSpec::put(path).json_value(body)).await
    }

    pub async fn delete(&self, path: &str) -> ClientResult<Envelope<Value>> {
        self.send(RequestSpec::delete(path)).await
    }

    async fn dispatch(
        &self,
        spec: &RequestSpec,
        token: Option<&str>,
        request_id: Uuid,
    ) -> Result<Envelope<Value>, Failure> {
        let url = self.inner.config.url_for(&spec.path);

        let mut headers = self.default_headers();
        if let Some(token) = token {
            headers.insert(AUTHORIZATION, bearer(token).map_err(Failure::Rejected)?);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            headers.insert(REQUEST_ID, value);
        }
        if spec.is_multipart() {
            // reqwest sets the multipart type together with its boundary
            headers.remove(CONTENT_TYPE);
        }

        let mut builder = self
            .inner
            .http
            .request(spec.method.clone(), &url)
            .headers(headers);
        if !spec.query.is_empty() {
            builder = builder.query(&spec.query);
        }
        builder = match &spec.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(value),
            Body::Multipart(parts) => builder.multipart(build_form(parts).map_err(Failure::Rejected)?),
        };

        debug!(%url, authorized = token.is_some(), retried = spec.retried, "Dispatching request");
        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Request did not reach the server");
            Failure::from(e)
        })?;
        debug!(status = response.status().as_u16(), "Response received");

        read_envelope(response).await
    }

    fn check_envelope(
        &self,
        spec: &RequestSpec,
        envelope: Envelope<Value>,
    ) -> ClientResult<Envelope<Value>> {
        if envelope.success || self.inner.config.endpoints.is_auth(&spec.path) {
            return Ok(envelope);
        }
        let message = envelope.message().map(str::to_string);
        debug!(message = ?message, "Backend reported success: false");
        Err(ClientError::application(
            message.as_deref(),
            spec.fallback_message.as_deref(),
            envelope.errors,
        ))
    }

    async fn recover(
        &self,
        mut spec: RequestSpec,
        failure: Failure,
        request_id: Uuid,
    ) -> ClientResult<Envelope<Value>> {
        // Login/register failures must never trigger a refresh or a logout
        if self.inner.config.endpoints.is_refresh_exempt(&spec.path) {
            debug!(status = ?failure.status(), "Auth endpoint failed; not refreshing");
            return Err(failure.translate());
        }

        if failure.status() != Some(401) || spec.retried {
            let error = failure.translate();
            debug!(error = %error, retried = spec.retried, "Request failed");
            return Err(error);
        }

        spec.retried = true;
        let token = self.refreshed_access_token().await?;

        debug!("Replaying request with refreshed token");
        match self.dispatch(&spec, Some(&token), request_id).await {
            Ok(envelope) => self.check_envelope(&spec, envelope),
            Err(failure) => Err(failure.translate()),
        }
    }

    /// Refresh the session now, joining any refresh already in flight.
    /// Failure ends the session exactly as a failed automatic refresh does.
    pub async fn refresh_session(&self) -> ClientResult<String> {
        self.refreshed_access_token().await
    }

    /// Obtain a refreshed access token, either by leading the refresh or by
    /// waiting for the one already in flight.
    async fn refreshed_access_token(&self) -> ClientResult<String> {
        let lease = match self.inner.refresh.acquire_or_wait() {
            Ticket::Lead(lease) => lease,
            Ticket::Wait(waiter) => {
                debug!(
                    pending = self.inner.refresh.pending(),
                    "Refresh already in flight; queued"
                );
                return waiter.wait().await;
            }
        };

        info!("Access token rejected; refreshing");
        match self.run_refresh().await {
            Ok(tokens) => {
                self.install_tokens(&tokens);
                let drained = lease.settle(Ok(tokens.access_token.clone()));
                info!(drained, "Access token refreshed");
                Ok(tokens.access_token)
            }
            Err(error) => {
                warn!(error = %error, "Token refresh failed; ending session");
                self.logout();
                // queued requests see why the refresh failed; the leader reports the expiry
                let drained = lease.settle(Err(error));
                debug!(drained, "Queued requests rejected");
                self.inner.session_expired.session_expired();
                Err(ClientError::SessionExpired)
            }
        }
    }

    async fn run_refresh(&self) -> ClientResult<TokenPair> {
        let refresh_token = self
            .inner
            .store
            .refresh_token()
            .ok_or_else(|| ClientError::refresh_failed("no refresh token stored"))?;
        let tokens = self.inner.refresher.refresh(refresh_token).await?;
        if !tokens.is_complete() {
            return Err(ClientError::refresh_failed("refresh returned an empty token"));
        }
        Ok(tokens)
    }
}
