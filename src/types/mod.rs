use garde::Validate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Uniform response wrapper returned by every backend endpoint:
/// `{ success, message, statusCode, data }`, optionally with a field-level
/// error map on failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    /// Missing `success` counts as success; only an explicit `false` is a failure.
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "FieldErrors::is_empty")]
    pub errors: FieldErrors,
}

fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    /// Envelope used for 2xx responses with an empty body.
    pub fn empty() -> Self {
        Self {
            success: true,
            message: None,
            status_code: None,
            data: None,
            errors: FieldErrors::default(),
        }
    }

    /// Backend message, ignoring blank strings.
    pub fn message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

impl Envelope<serde_json::Value> {
    /// Re-type the `data` payload.
    pub fn decode<U: DeserializeOwned>(self) -> Result<Envelope<U>, serde_json::Error> {
        let data = match self.data {
            Some(serde_json::Value::Null) | None => None,
            Some(value) => Some(serde_json::from_value(value)?),
        };
        Ok(Envelope {
            success: self.success,
            message: self.message,
            status_code: self.status_code,
            data,
            errors: self.errors,
        })
    }
}

/// Field name → validation messages. The backend sends either a single string
/// or a list per field; both decode to a list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(pub BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }
}

impl<'de> Deserialize<'de> for FieldErrors {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Messages {
            One(String),
            Many(Vec<String>),
        }

        let raw = Option::<BTreeMap<String, Messages>>::deserialize(deserializer)?;
        let map = raw
            .unwrap_or_default()
            .into_iter()
            .map(|(field, messages)| {
                let messages = match messages {
                    Messages::One(m) => vec![m],
                    Messages::Many(ms) => ms,
                };
                (field, messages)
            })
            .collect();
        Ok(FieldErrors(map))
    }
}

// ── Auth DTOs ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn is_complete(&self) -> bool {
        !self.access_token.trim().is_empty() && !self.refresh_token.trim().is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
pub struct LoginRequest {
    #[garde(length(min = 1, max = 128))]
    pub username: String,
    #[garde(length(min = 1, max = 256))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[garde(length(min = 3, max = 64))]
    pub username: String,
    #[garde(email)]
    pub email: String,
    #[garde(length(min = 6, max = 256))]
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 1, max = 128))]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[garde(length(min = 8, max = 20))]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[garde(length(min = 1))]
    pub current_password: String,
    #[garde(length(min = 6, max = 256))]
    pub new_password: String,
}

/// `data` of a successful login/register response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

impl AuthPayload {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// User ids arrive as numbers from some endpoints and strings from others.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
