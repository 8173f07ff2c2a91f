use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;
use std::path::Path;

use crate::http::{ClientError, RequestSpec};
use crate::services::{Resource, Upload};
use crate::types::Envelope;

/// Split `key=value` pairs given on the command line.
fn parse_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .with_context(|| format!("Expected key=value, got '{pair}'"))
        })
        .collect()
}

/// Body argument: inline JSON, `@file.json`, or `-` for stdin.
fn parse_body(body: Option<String>) -> Result<Value> {
    let Some(raw) = body else {
        return Ok(Value::Object(Default::default()));
    };
    let text = if raw == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read body from stdin")?
    } else if let Some(path) = raw.strip_prefix('@') {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))?
    } else {
        raw
    };
    serde_json::from_str(&text).context("Body is not valid JSON")
}

fn print_envelope(envelope: &Envelope<Value>, raw: bool) -> Result<()> {
    if raw {
        println!("{}", serde_json::to_string_pretty(envelope)?);
        return Ok(());
    }
    if let Some(message) = envelope.message() {
        eprintln!("{}", message.bright_black());
    }
    match &envelope.data {
        Some(Value::Null) | None => println!("{}", "(no data)".bright_black()),
        Some(data) => println!("{}", serde_json::to_string_pretty(data)?),
    }
    Ok(())
}

async fn run(spec: RequestSpec, raw: bool) -> Result<()> {
    let client = super::client()?;
    match client.send(spec).await {
        Ok(envelope) => print_envelope(&envelope, raw),
        Err(error) => {
            super::print_field_errors(&error);
            if let ClientError::Network { detail, .. } = &error {
                tracing::debug!(%detail, "Transport error");
            }
            Err(error.into())
        }
    }
}

pub async fn get(path: String, query: Vec<String>, raw: bool) -> Result<()> {
    let mut spec = RequestSpec::get(path);
    for (key, value) in parse_pairs(&query)? {
        spec = spec.query(key, value);
    }
    run(spec, raw).await
}

pub async fn post(path: String, body: Option<String>, raw: bool) -> Result<()> {
    run(RequestSpec::post(path).json_value(parse_body(body)?), raw).await
}

pub async fn put(path: String, body: Option<String>, raw: bool) -> Result<()> {
    run(RequestSpec::put(path).json_value(parse_body(body)?), raw).await
}

pub async fn delete(path: String, raw: bool) -> Result<()> {
    run(RequestSpec::delete(path), raw).await
}

/// Upload a file as multipart form data to `path`.
pub async fn upload(path: String, file: &Path, field: String, fields: Vec<String>) -> Result<()> {
    let mut upload = Upload::from_path(field, file).await?;
    for (name, value) in parse_pairs(&fields)? {
        upload = upload.field(name, value);
    }
    let file_name = upload.file_name.clone();

    let resource = Resource::new(super::client()?, path);
    let data = resource.upload(None, "", upload).await.map_err(|e| {
        super::print_field_errors(&e);
        anyhow::Error::from(e)
    })?;

    println!(
        "{} {} → {}",
        "✓ Uploaded".green().bold(),
        file_name.bright_cyan(),
        resource.path().bright_white()
    );
    if let Some(data) = data {
        println!("{}", serde_json::to_string_pretty(&data)?);
    }
    Ok(())
}
