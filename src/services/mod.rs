pub mod auth;
pub mod resource;

pub use auth::AuthService;
pub use resource::{Resource, Upload};
