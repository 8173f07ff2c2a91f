pub mod client;
pub mod endpoints;
pub mod errors;
pub mod hooks;
pub mod refresh;
pub mod request;
mod response;

pub use client::{ApiClient, ApiClientBuilder, LogoutFn};
pub use errors::{ClientError, ClientResult};
pub use hooks::{HttpRefresher, Navigator, RedirectToLogin, RouteTracker, SessionExpiredHandler, TokenRefresher};
pub use request::{Body, FormPart, RequestSpec};
