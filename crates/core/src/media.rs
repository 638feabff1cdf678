//! Media source resolution.
//!
//! Turns the opaque [`SourceRef`] stored on a job into something the encoder
//! can consume: an absolute path into the asset library for a single asset,
//! or a generated concat list file for a playlist.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use thiserror::Error;

use crate::job::SourceRef;

/// Asset names are library-relative file names, no directories.
static ASSET_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 ._-]*$").unwrap());

/// Whether `name` is acceptable as a library asset file name.
pub fn is_valid_asset_name(name: &str) -> bool {
    ASSET_NAME_RE.is_match(name)
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("asset not found: {0}")]
    NotFound(String),

    #[error("invalid asset name: {0}")]
    InvalidName(String),

    #[error("playlist is empty")]
    EmptyPlaylist,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source the encoder can open directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// Single media file.
    File(PathBuf),
    /// ffmpeg concat demuxer list file.
    ConcatList(PathBuf),
}

impl ResolvedSource {
    pub fn path(&self) -> &Path {
        match self {
            ResolvedSource::File(p) => p,
            ResolvedSource::ConcatList(p) => p,
        }
    }
}

/// Resolves job source references into encoder inputs.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    async fn resolve(&self, job_id: &str, source: &SourceRef) -> Result<ResolvedSource, MediaError>;
}

/// Resolver backed by a flat on-disk asset library.
///
/// Playlist concat files are written into `work_dir`, keyed by job id so a
/// restart of the same job overwrites the previous list.
pub struct LibraryMediaResolver {
    library_root: PathBuf,
    work_dir: PathBuf,
}

impl LibraryMediaResolver {
    pub fn new(library_root: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
            work_dir: work_dir.into(),
        }
    }

    async fn asset_path(&self, name: &str) -> Result<PathBuf, MediaError> {
        if !ASSET_NAME_RE.is_match(name) {
            return Err(MediaError::InvalidName(name.to_string()));
        }

        let path = self.library_root.join(name);
        if !tokio::fs::try_exists(&path).await? {
            return Err(MediaError::NotFound(name.to_string()));
        }
        Ok(path)
    }
}

#[async_trait]
impl MediaResolver for LibraryMediaResolver {
    async fn resolve(&self, job_id: &str, source: &SourceRef) -> Result<ResolvedSource, MediaError> {
        match source {
            SourceRef::Asset { name } => {
                let path = self.asset_path(name).await?;
                Ok(ResolvedSource::File(path))
            }
            SourceRef::Playlist { names } => {
                if names.is_empty() {
                    return Err(MediaError::EmptyPlaylist);
                }

                let mut lines = String::new();
                for name in names {
                    let path = self.asset_path(name).await?;
                    // Concat demuxer escaping: ' becomes '\''.
                    let escaped = path.display().to_string().replace('\'', r"'\''");
                    lines.push_str(&format!("file '{}'\n", escaped));
                }

                tokio::fs::create_dir_all(&self.work_dir).await?;
                let list_path = self.work_dir.join(format!("{}.playlist.txt", job_id));
                tokio::fs::write(&list_path, lines).await?;

                Ok(ResolvedSource::ConcatList(list_path))
            }
        }
    }
}
