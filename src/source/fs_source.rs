//! Filesystem-backed image source.
//!
//! Identifiers are relative paths under a root directory. When the identifier
//! has no file of its own, the usual JPEG 2000 extensions are tried in turn.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::error::SourceError;

use super::ImageSource;

/// Extensions tried when an identifier does not name a file directly.
pub const CANDIDATE_EXTENSIONS: [&str; 3] = ["jp2", "j2k", "jpx"];

/// Maps identifiers to files under a root directory.
///
/// # Example
///
/// ```ignore
/// use jp2_streamer::source::{FsImageSource, ImageSource};
///
/// let source = FsImageSource::new("/data/images");
///
/// // "maps/1850" resolves to /data/images/maps/1850.jp2 if that exists
/// let path = source.locate("maps/1850").await?;
/// ```
#[derive(Debug, Clone)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject identifiers that are empty, absolute, or climb out of the root.
    fn relative_path(identifier: &str) -> Result<PathBuf, SourceError> {
        if identifier.is_empty() || identifier.contains('\0') {
            return Err(SourceError::InvalidIdentifier(identifier.to_string()));
        }

        let path = Path::new(identifier);
        let safe = path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !safe {
            return Err(SourceError::InvalidIdentifier(identifier.to_string()));
        }
        Ok(path.to_path_buf())
    }
}

#[async_trait]
impl ImageSource for FsImageSource {
    async fn locate(&self, identifier: &str) -> Result<PathBuf, SourceError> {
        let relative = Self::relative_path(identifier)?;
        let direct = self.root.join(&relative);

        if is_file(&direct).await {
            return Ok(direct);
        }

        for ext in CANDIDATE_EXTENSIONS {
            let mut name = direct.clone().into_os_string();
            name.push(".");
            name.push(ext);
            let candidate = PathBuf::from(name);
            if is_file(&candidate).await {
                return Ok(candidate);
            }
        }

        Err(SourceError::NotFound(identifier.to_string()))
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
