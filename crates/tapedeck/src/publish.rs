//! Getting a finished recording somewhere durable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[cfg(feature = "upload")]
pub use http::HttpPublisher;

/// Errors from publishing a recording.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to store artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[cfg(feature = "upload")]
    #[error("upload request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "upload")]
    #[error("upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Somewhere recordings can go.
///
/// `publish` hands back a URL for the stored copy. What a URL means is up
/// to the implementation: the HTTP publisher returns whatever the server
/// says, the archive publisher returns a `file://` path.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(&self, file: &Path) -> Result<String, PublishError>;
}

/// Moves recordings into a local directory and calls that published.
pub struct ArchivePublisher {
    dir: PathBuf,
}

impl ArchivePublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ArtifactPublisher for ArchivePublisher {
    async fn publish(&self, file: &Path) -> Result<String, PublishError> {
        fs::create_dir_all(&self.dir).map_err(|e| PublishError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        let name = match file.file_name() {
            Some(name) => name,
            None => {
                return Err(PublishError::Io {
                    path: file.to_path_buf(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "no file name"),
                })
            }
        };

        let dest = self.dir.join(name);
        move_file(file, &dest).map_err(|e| PublishError::Io {
            path: dest.clone(),
            source: e,
        })?;

        let dest = fs::canonicalize(&dest).unwrap_or(dest);
        info!(artifact.path = %dest.display(), "recording archived");
        Ok(format!("file://{}", dest.display()))
    }
}

/// Rename when possible, copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)
}

#[cfg(feature = "upload")]
mod http {
    use std::path::Path;

    use async_trait::async_trait;
    use tracing::info;

    use super::{ArtifactPublisher, PublishError};

    /// Uploads recordings to an HTTP endpoint as multipart form data.
    ///
    /// The server is expected to answer 2xx with the stored URL as the
    /// response body.
    pub struct HttpPublisher {
        client: reqwest::Client,
        endpoint: String,
    }

    impl HttpPublisher {
        pub fn new(endpoint: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                endpoint: endpoint.into(),
            }
        }
    }

    #[async_trait]
    impl ArtifactPublisher for HttpPublisher {
        async fn publish(&self, file: &Path) -> Result<String, PublishError> {
            let bytes = std::fs::read(file).map_err(|e| PublishError::Io {
                path: file.to_path_buf(),
                source: e,
            })?;
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "recording.mp4".to_string());

            let part = reqwest::multipart::Part::bytes(bytes)
                .file_name(name)
                .mime_str("video/mp4")?;
            let form = reqwest::multipart::Form::new()
                .text("type", "recordFiles")
                .part("file", part);

            let response = self.client.post(&self.endpoint).multipart(form).send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(PublishError::Rejected {
                    status: status.as_u16(),
                    body,
                });
            }

            let url = body.trim().to_string();
            info!(artifact.url = %url, "recording uploaded");
            Ok(url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn archive_moves_the_file_and_returns_a_file_url() {
        let source_dir = tempfile::tempdir().unwrap();
        let archive_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("clip.mp4");
        fs::write(&source, b"video bytes").unwrap();

        let publisher = ArchivePublisher::new(archive_dir.path());
        let url = publisher.publish(&source).await.unwrap();

        assert!(!source.exists());
        let archived = archive_dir.path().join("clip.mp4");
        assert!(archived.exists());
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("clip.mp4"));
    }

    #[tokio::test]
    async fn archive_creates_missing_directories() {
        let source_dir = tempfile::tempdir().unwrap();
        let archive_root = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("clip.mp4");
        fs::write(&source, b"video bytes").unwrap();

        let nested = archive_root.path().join("by-device/emulator");
        let publisher = ArchivePublisher::new(&nested);
        publisher.publish(&source).await.unwrap();

        assert!(nested.join("clip.mp4").exists());
    }

    #[tokio::test]
    async fn archiving_a_missing_file_is_an_io_error() {
        let archive_dir = tempfile::tempdir().unwrap();
        let publisher = ArchivePublisher::new(archive_dir.path());

        let err = publisher
            .publish(Path::new("/nonexistent/clip.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, PublishError::Io { .. }));
    }
}
