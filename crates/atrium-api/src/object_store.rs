use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::ports::ObjectStore;

/// Longest file extension carried over from the client's file name.
const MAX_EXTENSION_LEN: usize = 8;

/// Flat-directory object store.
///
/// Each upload is written once to `{dir}/{uuid}[.ext]` and never modified.
/// The directory is served back under `{public_base_url}/files/`.
pub struct LocalObjectStore {
    dir: PathBuf,
    public_base_url: String,
}

impl LocalObjectStore {
    pub async fn new(dir: PathBuf, public_base_url: &str) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Path on disk for an object key.
    pub fn file_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/files/{}", self.public_base_url, key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload(&self, data: Bytes, file_name: Option<&str>) -> Result<String> {
        let key = match file_name.and_then(extension_of) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        let path = self.file_path(&key);
        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        info!(key = %key, size = data.len(), "Stored upload");
        Ok(self.url_for(&key))
    }
}

/// Lowercased extension of a client-supplied file name, if it is short and
/// purely alphanumeric. Anything else is dropped so keys stay path-safe.
fn extension_of(file_name: &str) -> Option<String> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
