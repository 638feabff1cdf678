//! Mock media resolver for testing.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::job::SourceRef;
use crate::media::{MediaError, MediaResolver, ResolvedSource};

/// Mock implementation of [`MediaResolver`].
///
/// Resolves every asset name to a path under `/mock/library` unless a
/// failure is queued with [`fail_next`](MockMediaResolver::fail_next).
pub struct MockMediaResolver {
    resolved: Mutex<Vec<SourceRef>>,
    fail_next: Mutex<Option<String>>,
}

impl Default for MockMediaResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockMediaResolver {
    pub fn new() -> Self {
        Self {
            resolved: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
        }
    }

    /// Sources passed to `resolve` so far.
    pub fn resolved_sources(&self) -> Vec<SourceRef> {
        self.resolved.lock().unwrap().clone()
    }

    /// Make the next `resolve` call fail as a missing asset.
    pub fn fail_next(&self, asset_name: impl Into<String>) {
        *self.fail_next.lock().unwrap() = Some(asset_name.into());
    }
}

#[async_trait]
impl MediaResolver for MockMediaResolver {
    async fn resolve(
        &self,
        job_id: &str,
        source: &SourceRef,
    ) -> Result<ResolvedSource, MediaError> {
        if let Some(name) = self.fail_next.lock().unwrap().take() {
            return Err(MediaError::NotFound(name));
        }

        self.resolved.lock().unwrap().push(source.clone());

        match source {
            SourceRef::Asset { name } => {
                Ok(ResolvedSource::File(PathBuf::from("/mock/library").join(name)))
            }
            SourceRef::Playlist { names } => {
                if names.is_empty() {
                    return Err(MediaError::EmptyPlaylist);
                }
                Ok(ResolvedSource::ConcatList(PathBuf::from(format!(
                    "/mock/work/{}.playlist.txt",
                    job_id
                ))))
            }
        }
    }
}
