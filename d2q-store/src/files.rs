//! Uploaded document storage.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::store::Store;

/// An upload that was just written
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredFile {
    /// Name the client sent
    pub filename: String,
    /// Location relative to the store root, e.g. `file/report_1.pdf`
    pub file_path: String,
    pub file_size: u64,
}

impl StoredFile {
    /// Name the upload was stored under, e.g. `report_1.pdf`
    pub fn stored_name(&self) -> &str {
        self.file_path.rsplit('/').next().unwrap_or(&self.file_path)
    }
}

/// Listing entry for a stored document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub filename: String,
    pub file_path: String,
    pub file_size: u64,
    /// Seconds since the Unix epoch
    pub modified_time: f64,
}

/// Reduce a client-supplied name to a bare file name.
fn sanitize_file_name(name: &str) -> StoreResult<String> {
    let normalized = name.replace('\\', "/");
    let base = normalized.rsplit('/').next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        return Err(StoreError::InvalidPath(format!("Unusable file name '{name}'")));
    }
    Ok(base.to_string())
}

/// `stem_N.ext` for the N-th collision.
fn numbered(name: &str, n: u32) -> String {
    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{n}.{ext}"),
        None => format!("{stem}_{n}"),
    }
}

/// Uploaded file repository
pub struct FileRepository;

impl FileRepository {
    fn display_path(store: &Store, path: &Path) -> String {
        path.strip_prefix(store.root())
            .unwrap_or(path)
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect::<PathBuf>()
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Write an upload under a name no other upload uses.
    pub async fn save_upload(
        store: &Store,
        original_name: &str,
        bytes: &[u8],
    ) -> StoreResult<StoredFile> {
        let base = sanitize_file_name(original_name)?;
        tokio::fs::create_dir_all(store.file_dir()).await?;

        let mut candidate = base.clone();
        let mut n = 0;
        let (path, file) = loop {
            let path = store.file_dir().join(&candidate);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => break (path, file),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    n += 1;
                    candidate = numbered(&base, n);
                }
                Err(e) => return Err(e.into()),
            }
        };
        write_or_discard(&path, file, bytes).await?;

        info!("Stored upload {} at {}", original_name, path.display());
        Ok(StoredFile {
            filename: original_name.to_string(),
            file_path: Self::display_path(store, &path),
            file_size: bytes.len() as u64,
        })
    }

    /// Every regular file in the upload directory, by name.
    pub async fn list(store: &Store) -> StoreResult<Vec<FileInfo>> {
        let mut entries = match tokio::fs::read_dir(store.file_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified_time = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs_f64())
                .unwrap_or_default();
            files.push(FileInfo {
                filename: entry.file_name().to_string_lossy().into_owned(),
                file_path: Self::display_path(store, &entry.path()),
                file_size: metadata.len(),
                modified_time,
            });
        }
        files.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(files)
    }

    /// Resolve a client-supplied path to a stored document.
    ///
    /// Accepts the `file_path` returned on upload, a bare file name, or an
    /// absolute path; the result must be a regular file inside the upload
    /// directory.
    pub async fn resolve(store: &Store, file_path: &str) -> StoreResult<PathBuf> {
        let requested = Path::new(file_path.trim());
        if requested.as_os_str().is_empty() {
            return Err(StoreError::InvalidPath("Empty file path".to_string()));
        }

        let candidates = if requested.is_absolute() {
            vec![requested.to_path_buf()]
        } else {
            vec![store.root().join(requested), store.file_dir().join(requested)]
        };

        let file_dir = tokio::fs::canonicalize(store.file_dir()).await?;
        for candidate in candidates {
            let resolved = match tokio::fs::canonicalize(&candidate).await {
                Ok(resolved) => resolved,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !resolved.starts_with(&file_dir) {
                return Err(StoreError::InvalidPath(format!(
                    "{file_path} is outside the upload directory"
                )));
            }
            if !tokio::fs::metadata(&resolved).await?.is_file() {
                return Err(StoreError::InvalidPath(format!("{file_path} is not a file")));
            }
            return Ok(resolved);
        }

        Err(StoreError::NotFound(format!("File {file_path}")))
    }
}

/// Write `bytes` to a freshly created file; a partial file is removed again.
async fn write_or_discard<W>(path: &Path, mut file: W, bytes: &[u8]) -> StoreResult<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await
    }
    .await;
    if let Err(e) = written {
        drop(file);
        if let Err(remove_err) = tokio::fs::remove_file(path).await {
            warn!("Could not remove partial upload {}: {}", path.display(), remove_err);
        }
        return Err(e.into());
    }
    Ok(())
}
