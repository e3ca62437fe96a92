//! Object storage abstraction for uploaded media.
//!
//! Objects are addressed as `{user_id}/{folder}/{file_name}` inside a single
//! public bucket, and exposed through a public URL of the form
//! `{base_url}/storage/v1/object/public/{bucket}/{path}`.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use uuid::Uuid;

use crate::models::image::extension_for;

/// Folder for gallery images.
pub const GALLERY_FOLDER: &str = "gallery";

/// Folder for event cover images.
pub const EVENTS_FOLDER: &str = "events";

/// Storage operation errors.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("Failed to upload image to storage: {0}")]
    Upload(String),

    #[error("Storage service unavailable: {0}")]
    Unavailable(String),
}

/// A stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub public_url: String,
}

/// Object storage used for images.
#[async_trait::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Uploads `data` under `{user_id}/{folder}/{file_name}`.
    ///
    /// When `file_name` is `None` a `{uuid}.{ext}` name is generated from the
    /// content type.
    async fn upload(
        &self,
        user_id: Uuid,
        folder: &str,
        file_name: Option<&str>,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Deletes the object behind a public URL. Never fails; returns whether the
    /// object was removed.
    async fn delete(&self, public_url: &str) -> bool;
}

/// Builds the object path for a tenant upload.
pub fn object_path(user_id: Uuid, folder: &str, file_name: Option<&str>, content_type: &str) -> String {
    let file_name = match file_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("{}.{}", Uuid::new_v4(), extension_for(content_type)),
    };
    format!("{}/{}/{}", user_id, folder, file_name)
}

/// Builds the public URL of an object.
pub fn public_url(base_url: &str, bucket: &str, path: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        path
    )
}

/// Recovers the object path from a public URL produced by [`public_url`].
pub fn object_path_from_public_url(base_url: &str, bucket: &str, url: &str) -> Option<String> {
    let prefix = public_url(base_url, bucket, "");
    url.strip_prefix(&prefix)
        .map(|path| path.split(['?', '#']).next().unwrap_or_default())
        .filter(|path| !path.is_empty())
        .map(str::to_string)
}

/// In-process object storage for development and testing.
///
/// Keeps objects in memory and serves them under a fake public base URL.
#[derive(Debug)]
pub struct InMemoryStorage {
    base_url: String,
    bucket: String,
    objects: RwLock<HashMap<String, (Bytes, String)>>,
    /// Whether uploads should fail, for exercising error paths.
    pub simulate_failure: bool,
}

impl InMemoryStorage {
    pub fn new(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
            simulate_failure: false,
        }
    }

    /// A storage whose uploads always fail.
    pub fn failing(base_url: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            simulate_failure: true,
            ..Self::new(base_url, bucket)
        }
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl ObjectStorage for InMemoryStorage {
    async fn upload(
        &self,
        user_id: Uuid,
        folder: &str,
        file_name: Option<&str>,
        data: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        if self.simulate_failure {
            return Err(StorageError::Upload("Simulated failure".to_string()));
        }

        let path = object_path(user_id, folder, file_name, content_type);
        let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
        if objects.contains_key(&path) {
            return Err(StorageError::Upload(format!(
                "The resource already exists: {}",
                path
            )));
        }
        objects.insert(path.clone(), (data, content_type.to_string()));

        Ok(StoredObject {
            public_url: public_url(&self.base_url, &self.bucket, &path),
            path,
        })
    }

    async fn delete(&self, url: &str) -> bool {
        let Some(path) = object_path_from_public_url(&self.base_url, &self.bucket, url) else {
            return false;
        };
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&path)
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://project.supabase.co";

    #[test]
    fn test_object_path_with_name() {
        let user = Uuid::new_v4();
        assert_eq!(
            object_path(user, GALLERY_FOLDER, Some("easter.png"), "image/png"),
            format!("{}/gallery/easter.png", user)
        );
    }

    #[test]
    fn test_object_path_generated_name() {
        let user = Uuid::new_v4();
        let path = object_path(user, EVENTS_FOLDER, None, "image/webp");
        assert!(path.starts_with(&format!("{}/events/", user)));
        assert!(path.ends_with(".webp"));
    }

    #[test]
    fn test_public_url_roundtrip() {
        let url = public_url(&format!("{}/", BASE), "images", "u/gallery/a.jpg");
        assert_eq!(
            url,
            "https://project.supabase.co/storage/v1/object/public/images/u/gallery/a.jpg"
        );
        assert_eq!(
            object_path_from_public_url(BASE, "images", &url).as_deref(),
            Some("u/gallery/a.jpg")
        );
    }

    #[test]
    fn test_object_path_from_foreign_url() {
        assert!(object_path_from_public_url(BASE, "images", "https://other.host/a.jpg").is_none());
        assert!(object_path_from_public_url(BASE, "other", &public_url(BASE, "images", "a.jpg")).is_none());
    }

    #[tokio::test]
    async fn test_in_memory_upload_and_delete() {
        let storage = InMemoryStorage::new(BASE, "images");
        let user = Uuid::new_v4();

        let stored = storage
            .upload(user, GALLERY_FOLDER, Some("fair.jpg"), Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert!(storage.contains(&stored.path));
        assert_eq!(storage.len(), 1);

        assert!(storage.delete(&stored.public_url).await);
        assert!(!storage.delete(&stored.public_url).await);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_in_memory_rejects_duplicate_path() {
        let storage = InMemoryStorage::new(BASE, "images");
        let user = Uuid::new_v4();
        let data = Bytes::from_static(b"png");
        storage
            .upload(user, GALLERY_FOLDER, Some("a.png"), data.clone(), "image/png")
            .await
            .unwrap();
        assert!(storage
            .upload(user, GALLERY_FOLDER, Some("a.png"), data, "image/png")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_in_memory_failing() {
        let storage = InMemoryStorage::failing(BASE, "images");
        let result = storage
            .upload(Uuid::new_v4(), GALLERY_FOLDER, None, Bytes::new(), "image/png")
            .await;
        assert!(matches!(result, Err(StorageError::Upload(_))));
    }
}
