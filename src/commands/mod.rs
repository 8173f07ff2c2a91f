pub mod auth;
pub mod config_cmd;
pub mod request;

use anyhow::{Context, Result};
use colored::Colorize;
use std::sync::Arc;

use crate::config;
use crate::http::{ApiClient, ClientError, SessionExpiredHandler};
use crate::session::FileStore;

/// Tells the terminal user to sign in again once the stored session is gone.
struct PromptLogin;

impl SessionExpiredHandler for PromptLogin {
    fn session_expired(&self) {
        eprintln!(
            "{} {}",
            "Session expired.".yellow().bold(),
            "Run `haulage login` to sign in again.".bright_black()
        );
    }
}

/// Client wired to the resolved config and the on-disk session file.
pub fn client() -> Result<ApiClient> {
    let config = config::load();
    let store = FileStore::open(FileStore::default_path()?);
    tracing::debug!(base_url = %config.base_url, session = %store.path().display(), "Building client");

    ApiClient::builder(config)
        .store(Arc::new(store))
        .on_session_expired(Arc::new(PromptLogin))
        .build()
        .context("Failed to build API client")
}

/// Print field-level validation errors returned by the backend, if any.
pub(crate) fn print_field_errors(error: &ClientError) {
    let Some(errors) = error.field_errors() else {
        return;
    };
    for (field, messages) in &errors.0 {
        for message in messages {
            eprintln!("  {} {}", format!("{field}:").bright_black(), message);
        }
    }
}
