use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

use crate::http::{ApiClient, ClientResult, RequestSpec};
use crate::types::Envelope;

/// A file to send as multipart form data, plus any plain form fields.
#[derive(Debug, Clone)]
pub struct Upload {
    pub field: String,
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
    pub fields: Vec<(String, String)>,
}

impl Upload {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        Self {
            field: field.into(),
            mime: guess_mime(&file_name).map(str::to_string),
            file_name,
            bytes,
            fields: Vec::new(),
        }
    }

    pub async fn from_path(field: impl Into<String>, path: &Path) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Reading {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        Ok(Self::new(field, file_name, bytes))
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    fn into_spec(self, path: String) -> RequestSpec {
        let mut spec = RequestSpec::post(path);
        for (name, value) in self.fields {
            spec = spec.text_part(name, value);
        }
        spec.file_part(self.field, self.file_name, self.mime, self.bytes)
    }
}

fn guess_mime(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "csv" => "text/csv",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime)
}

/// CRUD wrapper over one backend collection (`/orders`, `/vehicles`,
/// `/contracts`, ...). Every call unwraps the envelope's `data`.
#[derive(Clone)]
pub struct Resource {
    client: ApiClient,
    path: String,
}

impl Resource {
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn item_path(&self, id: &str) -> String {
        format!(
            "{}/{}",
            self.path.trim_end_matches('/'),
            urlencoding::encode(id)
        )
    }

    /// List the collection. A response without `data` is an empty list.
    pub async fn list<T: DeserializeOwned>(&self, query: &[(&str, &str)]) -> ClientResult<Vec<T>> {
        let mut spec = RequestSpec::get(self.path.as_str());
        for (key, value) in query {
            spec = spec.query(*key, *value);
        }
        let envelope: Envelope<Vec<T>> = self.client.send_as(spec).await?;
        Ok(envelope.into_data().unwrap_or_default())
    }

    pub async fn get<T: DeserializeOwned>(&self, id: &str) -> ClientResult<T> {
        self.client.fetch(RequestSpec::get(self.item_path(id))).await
    }

    pub async fn create<T: DeserializeOwned, B: Serialize + ?Sized>(&self, body: &B) -> ClientResult<T> {
        self.client
            .fetch(RequestSpec::post(self.path.as_str()).json(body)?)
            .await
    }

    pub async fn update<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        id: &str,
        body: &B,
    ) -> ClientResult<T> {
        self.client
            .fetch(RequestSpec::put(self.item_path(id)).json(body)?)
            .await
    }

    pub async fn delete(&self, id: &str) -> ClientResult<()> {
        self.client.send(RequestSpec::delete(self.item_path(id))).await?;
        Ok(())
    }

    /// Upload a file to `<collection>/<id>/<suffix>` (or the collection
    /// itself when `id` is `None`). Returns whatever `data` the backend sent.
    pub async fn upload(
        &self,
        id: Option<&str>,
        suffix: &str,
        upload: Upload,
    ) -> ClientResult<Option<Value>> {
        let base = match id {
            Some(id) => self.item_path(id),
            None => self.path.trim_end_matches('/').to_string(),
        };
        let path = if suffix.is_empty() {
            base
        } else {
            format!("{base}/{}", suffix.trim_start_matches('/'))
        };
        let envelope = self.client.send(upload.into_spec(path)).await?;
        Ok(envelope.into_data().filter(|d| !d.is_null()))
    }
}
