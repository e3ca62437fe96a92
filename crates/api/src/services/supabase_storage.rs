//! Supabase Storage client.
//!
//! Uploads go to `POST /storage/v1/object/{bucket}/{path}` authenticated with
//! the service role key; objects are served from the bucket's public URL.

use async_trait::async_trait;
use bytes::Bytes;
use domain::services::storage::{object_path, object_path_from_public_url, public_url};
use domain::services::{ObjectStorage, StorageError, StoredObject};
use serde_json::json;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::middleware::metrics::record_storage_operation;

/// Object storage backed by a Supabase Storage bucket.
pub struct SupabaseStorageClient {
    http_client: reqwest::Client,
    api_url: String,
    public_base_url: String,
    bucket: String,
    service_role_key: String,
}

impl SupabaseStorageClient {
    pub fn new(
        api_url: &str,
        public_base_url: &str,
        bucket: &str,
        service_role_key: &str,
        timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.api_url, self.bucket, path)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_role_key)
            .header("apikey", &self.service_role_key)
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorageClient {
    async fn upload(
        &self,
        user_id: Uuid,
        folder: &str,
        file_name: Option<&str>,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let path = object_path(user_id, folder, file_name, content_type);

        let result = self
            .authorized(self.http_client.post(self.object_url(&path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                record_storage_operation("upload", false);
                return Err(StorageError::Upload(e.to_string()));
            }
        };

        if !response.status().is_success() {
            record_storage_operation("upload", false);
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .or_else(|| v.get("error"))
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| status.to_string());
            return Err(StorageError::Upload(message));
        }

        record_storage_operation("upload", true);
        Ok(StoredObject {
            public_url: public_url(&self.public_base_url, &self.bucket, &path),
            path,
        })
    }

    async fn delete(&self, url: &str) -> bool {
        let Some(path) = object_path_from_public_url(&self.public_base_url, &self.bucket, url)
        else {
            warn!(url = %url, "Not an object URL of this bucket, skipping delete");
            return false;
        };

        let result = self
            .authorized(
                self.http_client
                    .delete(format!("{}/storage/v1/object/{}", self.api_url, self.bucket)),
            )
            .json(&json!({ "prefixes": [path] }))
            .send()
            .await;

        let removed = match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                warn!(path = %path, status = %response.status(), "Storage delete rejected");
                false
            }
            Err(e) => {
                warn!(path = %path, error = %e, "Storage delete failed");
                false
            }
        };
        record_storage_operation("delete", removed);
        removed
    }
}
