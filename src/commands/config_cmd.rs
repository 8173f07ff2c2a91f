use anyhow::{bail, Result};
use colored::Colorize;

use crate::config::{self, ConfigFile};

pub fn show() -> Result<()> {
    let resolved = config::load();

    println!("{}", "Resolved configuration".bright_cyan().bold());
    println!();
    println!("  Base URL:    {}", resolved.base_url.bright_white());
    println!("  Timeout:     {}s", resolved.timeout_secs);
    println!("  Login route: {}", resolved.login_route);
    println!();
    println!("{}", "Auth endpoints".bright_cyan());
    let endpoints = &resolved.endpoints;
    for (label, path) in [
        ("login", &endpoints.login),
        ("register", &endpoints.register),
        ("refresh", &endpoints.refresh),
        ("change-password", &endpoints.change_password),
        ("logout", &endpoints.logout),
    ] {
        println!("  {:<16} {}", label, path.bright_black());
    }

    if std::env::var("HAULAGE_API_URL").is_ok() {
        println!();
        println!("{}", "HAULAGE_API_URL is set and overrides config files".yellow());
    }
    Ok(())
}

/// Persist the API base URL, locally (`.haulage/config.json`) or globally.
pub fn set_url(url: String, global: bool) -> Result<()> {
    let url = url.trim().trim_end_matches('/').to_string();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("Base URL must start with http:// or https://");
    }

    let (mut file, scope) = if global {
        (config::load_global_config().unwrap_or_default(), "global")
    } else {
        (config::load_local_config().unwrap_or_default(), "local")
    };
    file.base_url = Some(url.clone());
    save(&file, global)?;

    println!("{} {} ({})", "✓ Base URL set to".green().bold(), url.bright_cyan(), scope);
    Ok(())
}

fn save(file: &ConfigFile, global: bool) -> Result<()> {
    if global {
        config::save_global_config(file)
    } else {
        config::save_local_config(file)
    }
}
