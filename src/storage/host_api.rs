// src/storage/host_api.rs
//! Backend over the host application's file API
//! (`/api/file/putFile`, `/api/file/readDir`, `/api/file/removeFile`).
//! Every JSON answer carries `code`; anything but `0` is a failure.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use serde_json::{json, Value};

use super::{base_name, AssetStore, DirEntry};
use crate::error::StorageError;
use crate::transport::HostEndpoint;

pub struct HostApiStore {
    host: HostEndpoint,
    client: Client,
}

impl HostApiStore {
    pub fn new(host: HostEndpoint) -> Self {
        Self {
            host,
            client: Client::new(),
        }
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, StorageError> {
        if !self.host.is_configured() {
            return Err(StorageError::Api("no host base url configured".into()));
        }
        let mut builder = self.client.post(self.host.url(path));
        if let Some(auth) = self.host.auth_header() {
            builder = builder.header("Authorization", auth);
        }
        Ok(builder)
    }

    async fn call(&self, builder: RequestBuilder) -> Result<Value, StorageError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| StorageError::Api(e.to_string()))?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let msg = body
            .get("msg")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        if !status.is_success() {
            return Err(StorageError::Api(
                msg.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
            ));
        }
        if body.get("code").and_then(Value::as_i64) != Some(0) {
            return Err(StorageError::Api(
                msg.unwrap_or_else(|| "file api returned a failure code".into()),
            ));
        }
        Ok(body)
    }
}

fn parse_entries(body: &Value) -> Vec<DirEntry> {
    body.get("data")
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| {
                    let raw = row
                        .get("name")
                        .or_else(|| row.get("path"))
                        .and_then(Value::as_str)?;
                    let is_dir = match row.get("isDir") {
                        Some(Value::Bool(b)) => *b,
                        Some(Value::String(s)) => s == "true",
                        _ => false,
                    };
                    Some(DirEntry {
                        name: base_name(raw).to_string(),
                        is_dir,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl AssetStore for HostApiStore {
    fn name(&self) -> &'static str {
        "host_api"
    }

    async fn write_file(&self, path: &str, bytes: &[u8], mime: &str) -> Result<(), StorageError> {
        let mod_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let part = multipart::Part::bytes(bytes.to_vec())
            .file_name(base_name(path).to_string())
            .mime_str(mime)
            .map_err(|e| StorageError::Api(e.to_string()))?;
        let form = multipart::Form::new()
            .text("path", path.to_string())
            .text("isDir", "false")
            .text("modTime", mod_time.to_string())
            .part("file", part);
        self.call(self.post("/api/file/putFile")?.multipart(form))
            .await
            .map(|_| ())
    }

    async fn remove_file_if_exists(&self, path: &str) -> Result<(), StorageError> {
        let full = path.trim();
        let Some(idx) = full.rfind(['/', '\\']).filter(|i| *i > 0) else {
            return Ok(());
        };
        let (dir, name) = (&full[..idx], &full[idx + 1..]);
        if name.is_empty() {
            return Ok(());
        }
        let exists = self
            .list_directory(dir)
            .await
            .unwrap_or_default()
            .iter()
            .any(|e| e.name == name && !e.is_dir);
        if !exists {
            return Ok(());
        }
        self.call(self.post("/api/file/removeFile")?.json(&json!({ "path": full })))
            .await
            .map(|_| ())
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<DirEntry>, StorageError> {
        let body = self
            .call(self.post("/api/file/readDir")?.json(&json!({ "path": path })))
            .await?;
        Ok(parse_entries(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_accept_name_or_path() {
        let body = json!({"code": 0, "data": [
            {"name": "a.svg", "isDir": false},
            {"path": "/data/emojis/iconfont/b.meta.json"},
            {"name": "sub", "isDir": "true"},
            {"size": 1}
        ]});
        let rows = parse_entries(&body);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].name, "b.meta.json");
        assert!(rows[2].is_dir);
    }

    #[tokio::test]
    async fn unconfigured_host_fails_fast() {
        let store = HostApiStore::new(HostEndpoint::default());
        assert!(matches!(
            store.write_file("/data/emojis/a/b.svg", b"x", "image/svg+xml").await,
            Err(StorageError::Api(_))
        ));
    }
}
