use garde::Validate;
use serde_json::Value;
use tracing::{info, warn};

use crate::http::{ApiClient, ClientError, ClientResult, RequestSpec};
use crate::session::{self, CredentialStore};
use crate::types::{
    AuthPayload, ChangePasswordRequest, Envelope, LoginRequest, RefreshTokenRequest,
    RegisterRequest, UserProfile,
};

/// Login, registration and session lifecycle on top of [`ApiClient`].
///
/// Login, register and change-password return the backend envelope even when
/// it reports `success: false`; callers decide how to present it.
#[derive(Clone)]
pub struct AuthService {
    client: ApiClient,
}

/// Keep the status fields of a failure envelope but drop a payload that
/// does not have the success shape.
fn without_data<T>(envelope: Envelope<Value>) -> Envelope<T> {
    Envelope {
        success: envelope.success,
        message: envelope.message,
        status_code: envelope.status_code,
        data: None,
        errors: envelope.errors,
    }
}

impl AuthService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub async fn login(&self, request: &LoginRequest) -> ClientResult<Envelope<AuthPayload>> {
        request.validate()?;
        let path = &self.client.config().endpoints.login;
        let raw = self.client.send(RequestSpec::post(path).json(request)?).await?;
        if !raw.success {
            return Ok(without_data(raw));
        }

        let envelope: Envelope<AuthPayload> = raw
            .decode()
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        match &envelope.data {
            Some(payload) => {
                self.persist(payload);
                info!(username = %request.username, "Logged in");
            }
            None => warn!("Login succeeded without a token payload"),
        }
        Ok(envelope)
    }

    /// Register an account. When the backend signs the new user in directly
    /// (token payload in `data`), the session is stored as for a login.
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<Envelope<Value>> {
        request.validate()?;
        let path = &self.client.config().endpoints.register;
        let envelope = self.client.send(RequestSpec::post(path).json(request)?).await?;
        if envelope.success {
            if let Some(payload) = envelope
                .data
                .clone()
                .and_then(|data| serde_json::from_value::<AuthPayload>(data).ok())
            {
                self.persist(&payload);
            }
        }
        Ok(envelope)
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
    ) -> ClientResult<Envelope<Value>> {
        request.validate()?;
        let path = &self.client.config().endpoints.change_password;
        self.client
            .send(RequestSpec::post(path).json(request)?)
            .await
    }

    /// Exchange the stored refresh token for a new pair. Joins an automatic
    /// refresh if one is already running.
    pub async fn refresh_token(&self) -> ClientResult<String> {
        self.client.refresh_session().await
    }

    /// Tell the backend to revoke the refresh token, then clear the local
    /// session regardless of the outcome.
    pub async fn logout(&self) {
        let store = self.client.store();
        if let Some(refresh_token) = store.refresh_token() {
            let path = &self.client.config().endpoints.logout;
            let spec = RequestSpec::post(path).json(&RefreshTokenRequest { refresh_token });
            let result = match spec {
                Ok(spec) => self.client.send(spec).await.map(|_| ()),
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(error = %e, "Backend logout failed; clearing local session anyway");
            }
        }
        self.client.logout();
        info!("Logged out");
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.store().access_token().is_some()
    }

    /// Profile of the signed-in user as stored at login.
    pub fn current_user(&self) -> Option<UserProfile> {
        let store = self.client.store();
        store.access_token()?;
        Some(UserProfile {
            id: store.get(session::USER_ID),
            username: store.get(session::USERNAME),
            email: store.get(session::EMAIL),
            role: store.get(session::ROLE),
        })
    }

    pub fn logged_in_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        let raw = self.client.store().get(session::LOGGED_IN_AT)?;
        chrono::DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc))
    }

    fn persist(&self, payload: &AuthPayload) {
        self.client.install_tokens(&payload.tokens());

        let store = self.client.store();
        let user = payload.user.clone().unwrap_or_default();
        let fields = [
            (session::USER_ID, user.id),
            (session::USERNAME, user.username),
            (session::EMAIL, user.email),
            (session::ROLE, user.role),
        ];
        for (key, value) in fields {
            match value {
                Some(value) => store.set(key, &value),
                None => store.remove(key),
            }
        }
        store.set(session::LOGGED_IN_AT, &chrono::Utc::now().to_rfc3339());
    }
}
