//! Local filesystem blob store: one directory per module type under a common root.

use crate::domain::error::{CdnError, Result};
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// A stored file that exists and may be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub kind: String,
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `kind/name` under the root, rejecting anything that is not a plain name.
    pub fn path(&self, kind: &str, name: &str) -> Result<PathBuf> {
        validate_component("type", kind)?;
        validate_component("filename", name)?;
        Ok(self.root.join(kind).join(name))
    }

    /// Whether a regular file is stored under `kind/name`. Invalid names never exist.
    pub async fn exists(&self, kind: &str, name: &str) -> Result<bool> {
        let Ok(path) = self.path(kind, name) else {
            return Ok(false);
        };
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `bytes` under a unique name derived from `desired_name` and returns that name.
    ///
    /// The name keeps the original stem and extension around a
    /// `-{unix_millis}-{random}` suffix so repeated uploads never overwrite each other.
    pub async fn store(&self, kind: &str, desired_name: &str, bytes: &[u8]) -> Result<String> {
        validate_component("type", kind)?;
        validate_component("filename", desired_name)?;

        let dir = self.root.join(kind);
        fs::create_dir_all(&dir).await?;

        let actual_name = unique_name(desired_name);
        let path = dir.join(&actual_name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(kind, filename = %actual_name, size = bytes.len(), "stored file");
        Ok(actual_name)
    }

    pub async fn delete(&self, kind: &str, name: &str) -> Result<()> {
        let path = self.path(kind, name)?;
        fs::remove_file(&path).await?;
        debug!(kind, filename = name, "deleted file");
        Ok(())
    }

    /// Moves `name` from the `from_kind` directory to `to_kind`, keeping its name.
    /// Refuses to overwrite an existing file at the destination.
    pub async fn relocate(&self, from_kind: &str, to_kind: &str, name: &str) -> Result<()> {
        let from = self.path(from_kind, name)?;
        let to = self.path(to_kind, name)?;
        if from == to {
            return Ok(());
        }
        if self.exists(to_kind, name).await? {
            return Err(CdnError::validation(format!(
                "{}/{} already exists",
                to_kind, name
            )));
        }

        fs::create_dir_all(self.root.join(to_kind)).await?;
        fs::rename(&from, &to).await?;
        debug!(from = from_kind, to = to_kind, filename = name, "relocated file");
        Ok(())
    }

    /// Stored file names under `kind` with the given extension, sorted. A missing
    /// directory lists as empty.
    pub async fn list(&self, kind: &str, extension: &str) -> Result<Vec<String>> {
        validate_component("type", kind)?;
        let mut entries = match fs::read_dir(self.root.join(kind)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(extension) && !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Looks up a stored file for serving.
    pub async fn open(&self, kind: &str, name: &str) -> Result<FileHandle> {
        let not_found = || CdnError::FileNotFound {
            kind: kind.to_string(),
            filename: name.to_string(),
        };
        let path = self.path(kind, name).map_err(|_| not_found())?;
        let meta = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta,
            Ok(_) => return Err(not_found()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };
        Ok(FileHandle {
            kind: kind.to_string(),
            filename: name.to_string(),
            path,
            size: meta.len(),
        })
    }
}

fn validate_component(what: &str, value: &str) -> Result<()> {
    let mut components = Path::new(value).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    let ok = single_normal
        && !value.starts_with('.')
        && !value.contains(['/', '\\', '\0']);
    if ok {
        Ok(())
    } else {
        Err(CdnError::validation(format!("invalid {}: {:?}", what, value)))
    }
}

fn unique_name(desired_name: &str) -> String {
    let path = Path::new(desired_name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(desired_name);
    let millis = chrono::Utc::now().timestamp_millis();
    let nonce: u32 = rand::thread_rng().gen_range(0..1_000_000_000);

    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}-{}-{}.{}", stem, millis, nonce, ext),
        None => format!("{}-{}-{}", stem, millis, nonce),
    }
}
