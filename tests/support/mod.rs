//! In-process mock of the haulage backend, served by axum on an ephemeral port.
#![allow(dead_code)]

use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use haulage_lib::config::ClientConfig;
use haulage_lib::http::{ApiClient, RedirectToLogin, RouteTracker};
use haulage_lib::session::{CredentialStore, MemoryStore};

pub const INITIAL_ACCESS: &str = "access-0";
pub const INITIAL_REFRESH: &str = "refresh-0";
pub const WRONG_CREDENTIALS: &str = "Tên đăng nhập hoặc mật khẩu không đúng";

/// How the refresh endpoint answers a presented refresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Rotate the pair when the presented token matches.
    Rotate,
    /// HTTP 401 with a failure envelope.
    Reject,
    /// HTTP 200 with `success: false`.
    SoftReject,
    /// HTTP 200 with `success: true` but an empty access token.
    Malformed,
}

pub struct MockState {
    tokens: Mutex<(String, String)>,
    refresh_calls: AtomicUsize,
    unauthorized: AtomicUsize,
    expect_unauthorized: AtomicUsize,
    refresh_mode: Mutex<RefreshMode>,
    hits: Mutex<HashMap<&'static str, usize>>,
    request_ids: Mutex<Vec<String>>,
    revoked: Mutex<Vec<String>>,
}

impl MockState {
    fn new() -> Self {
        Self {
            tokens: Mutex::new((INITIAL_ACCESS.to_string(), INITIAL_REFRESH.to_string())),
            refresh_calls: AtomicUsize::new(0),
            unauthorized: AtomicUsize::new(0),
            expect_unauthorized: AtomicUsize::new(0),
            refresh_mode: Mutex::new(RefreshMode::Rotate),
            hits: Mutex::new(HashMap::new()),
            request_ids: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
        }
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn hits(&self, route: &str) -> usize {
        self.hits.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    pub fn access_token(&self) -> String {
        self.tokens.lock().unwrap().0.clone()
    }

    pub fn refresh_token(&self) -> String {
        self.tokens.lock().unwrap().1.clone()
    }

    pub fn request_ids(&self) -> Vec<String> {
        self.request_ids.lock().unwrap().clone()
    }

    /// Refresh tokens received by the logout endpoint.
    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }

    /// Hold refresh responses until this many 401s have been sent, so
    /// concurrent requests all observe the same expiry.
    pub fn expect_unauthorized(&self, count: usize) {
        self.expect_unauthorized.store(count, Ordering::SeqCst);
    }

    pub fn reject_refresh(&self, reject: bool) {
        let mode = if reject { RefreshMode::Reject } else { RefreshMode::Rotate };
        self.refresh_mode(mode);
    }

    pub fn refresh_mode(&self, mode: RefreshMode) {
        *self.refresh_mode.lock().unwrap() = mode;
    }

    /// Invalidate the current access token server-side.
    pub fn expire_access(&self) {
        self.tokens.lock().unwrap().0 = "expired".to_string();
    }

    fn hit(&self, route: &'static str, headers: &HeaderMap) {
        *self.hits.lock().unwrap().entry(route).or_default() += 1;
        if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
            self.request_ids.lock().unwrap().push(id.to_string());
        }
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.access_token());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }

    fn unauthorized(&self) -> Response {
        self.unauthorized.fetch_add(1, Ordering::SeqCst);
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Token không hợp lệ" })),
        )
            .into_response()
    }

    async fn wait_for_unauthorized(&self) {
        let expected = self.expect_unauthorized.load(Ordering::SeqCst);
        if expected <= 1 {
            return;
        }
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while self.unauthorized.load(Ordering::SeqCst) < expected
            && tokio::time::Instant::now() < deadline
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // let the last 401 reach its client and join the queue
        tokio::time::sleep(Duration::from_millis(150)).await;
    }
}

type Shared = Arc<MockState>;

fn ok(data: Value) -> Response {
    Json(json!({ "success": true, "statusCode": 200, "data": data })).into_response()
}

async fn login(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("login", &headers);
    match (body["username"].as_str(), body["password"].as_str()) {
        (Some("admin"), Some("secret")) => {
            let (access, refresh) = s.tokens.lock().unwrap().clone();
            ok(json!({
                "accessToken": access,
                "refreshToken": refresh,
                "user": { "id": 1, "username": "admin", "email": "admin@haulage.vn", "role": "ADMIN" }
            }))
        }
        (Some("locked"), _) => Json(json!({
            "success": false,
            "message": "Tài khoản đã bị khóa",
            "statusCode": 403
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": WRONG_CREDENTIALS })),
        )
            .into_response(),
    }
}

async fn register(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("register", &headers);
    if body["username"] == "admin" {
        return (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "message": "Tên đăng nhập đã tồn tại",
                "errors": { "username": "Tên đăng nhập đã tồn tại" }
            })),
        )
            .into_response();
    }
    ok(json!({ "id": 2, "username": body["username"] }))
}

async fn refresh(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("refresh", &headers);
    let call = s.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
    s.wait_for_unauthorized().await;

    let presented = body["refreshToken"].as_str().unwrap_or_default().to_string();
    let mode = *s.refresh_mode.lock().unwrap();
    match mode {
        RefreshMode::SoftReject => {
            return Json(json!({ "success": false, "message": "Phiên làm mới đã bị thu hồi" }))
                .into_response();
        }
        RefreshMode::Malformed => {
            return ok(json!({ "accessToken": "", "refreshToken": "refresh-x" }));
        }
        RefreshMode::Rotate | RefreshMode::Reject => {}
    }
    let mut tokens = s.tokens.lock().unwrap();
    if mode == RefreshMode::Reject || presented != tokens.1 {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "message": "Refresh token không hợp lệ hoặc đã hết hạn" })),
        )
            .into_response();
    }
    *tokens = (format!("access-{call}"), format!("refresh-{call}"));
    ok(json!({ "accessToken": tokens.0, "refreshToken": tokens.1 }))
}

async fn logout(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("logout", &headers);
    if let Some(token) = body["refreshToken"].as_str() {
        s.revoked.lock().unwrap().push(token.to_string());
    }
    ok(Value::Null)
}

async fn list_orders(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("orders", &headers);
    if !s.authorized(&headers) {
        return s.unauthorized();
    }
    ok(json!([
        { "id": 1, "code": "DH-001", "status": "PENDING" },
        { "id": 2, "code": "DH-002", "status": "DELIVERED" }
    ]))
}

async fn get_order(State(s): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    s.hit("order", &headers);
    if !s.authorized(&headers) {
        return s.unauthorized();
    }
    if id == "404" {
        return (StatusCode::NOT_FOUND, Json(json!({ "success": false }))).into_response();
    }
    ok(json!({ "id": id, "code": format!("DH-{id}"), "status": "PENDING" }))
}

async fn create_order(State(s): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    s.hit("create_order", &headers);
    if !s.authorized(&headers) {
        return s.unauthorized();
    }
    let mut order = body;
    order["id"] = json!(99);
    (StatusCode::CREATED, Json(json!({ "success": true, "data": order }))).into_response()
}

async fn always_unauthorized(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("always_401", &headers);
    s.unauthorized()
}

async fn boom(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("boom", &headers);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}

async fn conflict(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("conflict", &headers);
    (
        StatusCode::CONFLICT,
        Json(json!({
            "success": false,
            "message": "Biển số xe đã tồn tại",
            "errors": { "licensePlate": ["Biển số xe đã tồn tại"] }
        })),
    )
        .into_response()
}

async fn slow(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("slow", &headers);
    tokio::time::sleep(Duration::from_secs(5)).await;
    ok(json!({ "late": true }))
}

async fn teapot(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("teapot", &headers);
    StatusCode::IM_A_TEAPOT.into_response()
}

async fn soft_failure(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("soft_failure", &headers);
    Json(json!({ "success": false, "message": "Đơn hàng đã bị hủy", "statusCode": 400 })).into_response()
}

async fn silent_failure(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("silent_failure", &headers);
    Json(json!({ "success": false })).into_response()
}

async fn no_content(State(s): State<Shared>, headers: HeaderMap) -> Response {
    s.hit("no_content", &headers);
    StatusCode::NO_CONTENT.into_response()
}

async fn upload(State(s): State<Shared>, headers: HeaderMap, mut multipart: Multipart) -> Response {
    s.hit("upload", &headers);
    if !s.authorized(&headers) {
        return s.unauthorized();
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let mut fields = serde_json::Map::new();
    let mut file = Value::Null;
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let mime = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.unwrap_or_default();
                file = json!({ "field": name, "fileName": file_name, "mime": mime, "size": bytes.len() });
            }
            None => {
                let value = field.text().await.unwrap_or_default();
                fields.insert(name, Value::String(value));
            }
        }
    }
    ok(json!({ "contentType": content_type, "file": file, "fields": fields }))
}

pub struct Backend {
    pub state: Shared,
    pub base_url: String,
    handle: JoinHandle<()>,
}

impl Backend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::new());
        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/auth/register", post(register))
            .route("/auth/refresh-token", post(refresh))
            .route("/auth/logout", post(logout))
            .route("/orders", get(list_orders).post(create_order))
            .route("/orders/{id}", get(get_order))
            .route("/always-401", get(always_unauthorized))
            .route("/boom", get(boom))
            .route("/conflict", get(conflict))
            .route("/teapot", get(teapot))
            .route("/slow", get(slow))
            .route("/soft-failure", get(soft_failure))
            .route("/silent-failure", get(silent_failure))
            .route("/no-content", get(no_content))
            .route("/uploads", post(upload))
            .with_state(state.clone());
        let app = Router::new().nest("/api", api);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            state,
            base_url: format!("http://{addr}/api"),
            handle,
        }
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::with_base_url(&self.base_url)
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A client talking to the mock backend, plus handles on its collaborators.
pub struct Harness {
    pub client: ApiClient,
    pub store: Arc<MemoryStore>,
    pub navigator: Arc<RouteTracker>,
}

impl Harness {
    /// Client whose host app currently shows `route`.
    pub fn at(backend: &Backend, route: &str) -> Self {
        let config = backend.config();
        let store = Arc::new(MemoryStore::new());
        let navigator = Arc::new(RouteTracker::at(route));
        let redirect = RedirectToLogin::new(navigator.clone(), config.login_route.clone());
        let client = ApiClient::builder(config)
            .store(store.clone())
            .on_session_expired(Arc::new(redirect))
            .build()
            .unwrap();
        Self {
            client,
            store,
            navigator,
        }
    }

    pub fn new(backend: &Backend) -> Self {
        Self::at(backend, "/orders")
    }

    /// Seed the store as if a login happened earlier.
    pub fn signed_in(self, access: &str, refresh: &str) -> Self {
        self.store.store_tokens(access, refresh);
        self.store.set(haulage_lib::session::ROLE, "ADMIN");
        self.store.set(haulage_lib::session::USERNAME, "admin");
        self
    }
}
