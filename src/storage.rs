//! Photo uploads. Files are stored under random names and served back from `/media`.
use crate::error::{AppError, AppResult};
use crate::settings::StorageSettings;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use uuid::Uuid;

static PLAIN_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap());
static EXTENSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{1,8}$").unwrap());

/// A stored object and the content type it is served with.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` under `bucket/folder/` with a fresh random name and return its public URL.
    async fn upload(
        &self,
        bucket: &str,
        folder: &str,
        filename: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> AppResult<String>;

    /// Read an object by its path relative to the storage root (`bucket/folder/name.ext`).
    async fn read(&self, path: &str) -> AppResult<StoredObject>;
}

/// Check a bucket or folder name. Only letters, digits, `-` and `_`.
pub fn check_plain_name(kind: &str, name: &str) -> AppResult<()> {
    if PLAIN_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!("Nombre de {} inválido.", kind)))
    }
}

/// The file extension to store under: the uploaded name's, else one derived from the type.
pub fn extension_for(filename: &str, content_type: &str) -> String {
    let from_name = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| EXTENSION_RE.is_match(e))
        .map(str::to_lowercase);
    from_name.unwrap_or_else(|| {
        match content_type {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        }
        .to_string()
    })
}

pub fn content_type_for(path: &str) -> &'static str {
    match Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

/// Filesystem-backed storage rooted at `settings.root`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    root: PathBuf,
    public_base: String,
    max_bytes: usize,
}

impl LocalStorage {
    pub fn new(settings: &StorageSettings) -> Self {
        LocalStorage {
            root: PathBuf::from(&settings.root),
            public_base: settings.public_base.trim_end_matches('/').to_string(),
            max_bytes: settings.max_upload_bytes,
        }
    }

    fn check_upload(&self, bytes: &[u8], content_type: &str) -> AppResult<()> {
        if !content_type.starts_with("image/") {
            return Err(AppError::InvalidInput("Solo se aceptan imágenes.".into()));
        }
        if bytes.is_empty() {
            return Err(AppError::InvalidInput("El archivo está vacío.".into()));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::InvalidInput(format!(
                "La imagen supera el máximo de {} MB.",
                self.max_bytes / (1024 * 1024)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn upload(
        &self,
        bucket: &str,
        folder: &str,
        filename: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> AppResult<String> {
        check_plain_name("bucket", bucket)?;
        check_plain_name("carpeta", folder)?;
        self.check_upload(bytes, content_type)?;

        let name = format!("{}.{}", Uuid::new_v4().simple(), extension_for(filename, content_type));
        let dir = self.root.join(bucket).join(folder);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(&name), bytes).await?;

        log::info!(
            "Stored upload {}/{}/{} ({} bytes)",
            bucket,
            folder,
            name,
            bytes.len()
        );
        Ok(format!("{}/{}/{}/{}", self.public_base, bucket, folder, name))
    }

    async fn read(&self, path: &str) -> AppResult<StoredObject> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let Some((file, dirs)) = segments.split_last() else {
            return Err(AppError::NotFound(path.to_string()));
        };
        for dir in dirs {
            check_plain_name("carpeta", dir).map_err(|_| AppError::NotFound(path.to_string()))?;
        }
        let (stem, ext) = file.rsplit_once('.').unwrap_or((file, ""));
        if !PLAIN_NAME_RE.is_match(stem) || !EXTENSION_RE.is_match(ext) {
            return Err(AppError::NotFound(path.to_string()));
        }

        let full = dirs
            .iter()
            .fold(self.root.clone(), |acc, d| acc.join(d))
            .join(file);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(StoredObject {
                bytes,
                content_type: content_type_for(file).to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
