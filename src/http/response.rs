use reqwest::StatusCode;
use serde_json::Value;

use super::errors::ClientError;
use crate::types::Envelope;

/// Why a dispatched request did not produce an envelope.
#[derive(Debug)]
pub(crate) enum Failure {
    /// No response reached the client (includes timeouts).
    Transport(String),
    /// Non-2xx status, with whatever envelope the body carried.
    Status {
        status: u16,
        envelope: Option<Envelope<Value>>,
    },
    /// 2xx response whose body is not an envelope.
    Decode(String),
    /// The request could not be built (bad header value, bad multipart part).
    Rejected(ClientError),
}

impl Failure {
    pub(crate) fn status(&self) -> Option<u16> {
        match self {
            Failure::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Generic error-mapping policy: one translation at the client boundary.
    pub(crate) fn translate(self) -> ClientError {
        match self {
            Failure::Transport(detail) => ClientError::network(detail),
            Failure::Status { status, envelope } => match envelope {
                Some(envelope) => {
                    let message = envelope.message().map(str::to_string);
                    ClientError::from_status(status, message.as_deref(), envelope.errors)
                }
                None => ClientError::from_status(status, None, Default::default()),
            },
            Failure::Decode(detail) => ClientError::Decode(detail),
            Failure::Rejected(err) => err,
        }
    }
}

impl From<reqwest::Error> for Failure {
    fn from(err: reqwest::Error) -> Self {
        Failure::Transport(err.to_string())
    }
}

/// Read a response into an envelope, classifying non-2xx statuses as failures.
pub(crate) async fn read_envelope(response: reqwest::Response) -> Result<Envelope<Value>, Failure> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if !status.is_success() {
        return Err(Failure::Status {
            status: status.as_u16(),
            envelope: serde_json::from_slice(&bytes).ok(),
        });
    }

    if bytes.iter().all(u8::is_ascii_whitespace) || status == StatusCode::NO_CONTENT {
        return Ok(Envelope::empty());
    }

    serde_json::from_slice(&bytes).map_err(|e| Failure::Decode(e.to_string()))
}
