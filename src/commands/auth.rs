use anyhow::{bail, Result};
use colored::Colorize;
use dialoguer::{Input, Password};

use crate::http::ClientError;
use crate::services::AuthService;
use crate::types::{ChangePasswordRequest, Envelope, LoginRequest, RegisterRequest};

fn prompt_username(username: Option<String>) -> Result<String> {
    match username {
        Some(name) => Ok(name),
        None => Ok(Input::<String>::new().with_prompt("Username").interact_text()?),
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    Ok(Password::new().with_prompt(prompt).interact()?)
}

/// Report a `success: false` envelope from an auth endpoint as an error.
fn rejected<T>(envelope: &Envelope<T>, fallback: &str) -> anyhow::Error {
    for (field, messages) in &envelope.errors.0 {
        eprintln!("  {} {}", format!("{field}:").bright_black(), messages.join(", "));
    }
    anyhow::anyhow!("{}", envelope.message().unwrap_or(fallback))
}

fn report(error: ClientError) -> anyhow::Error {
    super::print_field_errors(&error);
    error.into()
}

pub async fn login(username: Option<String>, password: Option<String>) -> Result<()> {
    let username = prompt_username(username)?;
    let password = match password {
        Some(p) => p,
        None => prompt_password("Password")?,
    };

    let auth = AuthService::new(super::client()?);
    let envelope = auth
        .login(&LoginRequest { username, password })
        .await
        .map_err(report)?;
    if !envelope.success {
        return Err(rejected(&envelope, "Đăng nhập thất bại."));
    }

    let user = envelope.data.and_then(|d| d.user).unwrap_or_default();
    println!(
        "{} {}",
        "✓ Signed in as".green().bold(),
        user.username.as_deref().unwrap_or("(unknown)").bright_cyan()
    );
    if let Some(role) = user.role {
        println!("  Role: {}", role.bright_white());
    }
    Ok(())
}

pub async fn register(
    username: String,
    email: String,
    full_name: Option<String>,
    phone: Option<String>,
) -> Result<()> {
    let password = Password::new()
        .with_prompt("Password")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()?;

    let auth = AuthService::new(super::client()?);
    let envelope = auth
        .register(&RegisterRequest {
            username: username.clone(),
            email,
            password,
            full_name,
            phone,
        })
        .await
        .map_err(report)?;
    if !envelope.success {
        return Err(rejected(&envelope, "Đăng ký thất bại."));
    }

    println!("{} {}", "✓ Registered".green().bold(), username.bright_cyan());
    if auth.is_authenticated() {
        println!("  {}", "Signed in with the new account".bright_black());
    }
    Ok(())
}

pub async fn change_password() -> Result<()> {
    let auth = AuthService::new(super::client()?);
    if !auth.is_authenticated() {
        bail!("Not signed in. Run `haulage login` first.");
    }

    let current_password = prompt_password("Current password")?;
    let new_password = Password::new()
        .with_prompt("New password")
        .with_confirmation("Confirm new password", "Passwords do not match")
        .interact()?;

    let envelope = auth
        .change_password(&ChangePasswordRequest {
            current_password,
            new_password,
        })
        .await
        .map_err(report)?;
    if !envelope.success {
        return Err(rejected(&envelope, "Đổi mật khẩu thất bại."));
    }

    println!("{}", "✓ Password changed".green().bold());
    Ok(())
}

pub async fn logout() -> Result<()> {
    let auth = AuthService::new(super::client()?);
    if !auth.is_authenticated() {
        println!("{}", "Not signed in".yellow());
        return Ok(());
    }
    auth.logout().await;
    println!("{}", "✓ Signed out".green().bold());
    Ok(())
}

pub async fn whoami() -> Result<()> {
    let auth = AuthService::new(super::client()?);
    let Some(user) = auth.current_user() else {
        println!("{}", "Not signed in".yellow());
        println!("\nRun 'haulage login' to sign in");
        return Ok(());
    };

    println!("{}", "Current session".bright_cyan().bold());
    println!();
    let rows = [
        ("Username", user.username),
        ("User id", user.id),
        ("Email", user.email),
        ("Role", user.role),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("  {:<10} {}", format!("{label}:"), value.bright_white());
        }
    }
    if let Some(at) = auth.logged_in_at() {
        println!(
            "  {:<10} {}",
            "Since:",
            at.format("%Y-%m-%d %H:%M UTC").to_string().bright_black()
        );
    }
    println!("  {:<10} {}", "API:", auth.client().config().base_url.bright_black());
    Ok(())
}

/// Refresh the access token now.
pub async fn refresh() -> Result<()> {
    let auth = AuthService::new(super::client()?);
    auth.refresh_token().await?;
    println!("{}", "✓ Session refreshed".green().bold());
    Ok(())
}
