//! Provisioning of the service binary.
//!
//! The binary ships as a `.tar.gz` release asset. A version stamp file next
//! to the installed binary decides whether the cached install is current;
//! anything else triggers a fresh download and extraction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use tracing::info;

use crate::error::{Error, Result};
use crate::service::platform;

/// Fetches a release artifact by URL.
///
/// Abstracted so provisioning logic can be exercised without network
/// access.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Default fetcher backed by `reqwest`.
#[derive(Debug, Default)]
pub struct HttpFetcher {
    http: reqwest::Client,
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let wrap = |source: reqwest::Error| Error::Download {
            url: url.to_owned(),
            source,
        };
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(wrap)?
            .error_for_status()
            .map_err(wrap)?;
        Ok(response.bytes().await.map_err(wrap)?.to_vec())
    }
}

/// Installs the service binary for one pinned version.
pub struct BinaryProvisioner {
    install_dir: PathBuf,
    version: String,
    asset_url: String,
    fetcher: Arc<dyn ArtifactFetcher>,
}

impl BinaryProvisioner {
    pub fn new(
        install_dir: PathBuf,
        version: String,
        asset_url: String,
        fetcher: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        BinaryProvisioner {
            install_dir,
            version,
            asset_url,
            fetcher,
        }
    }

    /// Path the installed binary lives at.
    pub fn binary_path(&self) -> PathBuf {
        self.install_dir.join(platform::binary_name())
    }

    fn stamp_path(&self) -> PathBuf {
        self.install_dir.join(platform::STAMP_FILE_NAME)
    }

    /// True when the installed binary exists and its stamp matches the
    /// pinned version.
    pub fn is_current(&self) -> bool {
        if !self.binary_path().is_file() {
            return false;
        }
        match std::fs::read_to_string(self.stamp_path()) {
            Ok(stamp) => stamp.trim() == self.version,
            Err(_) => false,
        }
    }

    /// Ensures the pinned version is installed, downloading and extracting
    /// the release asset if needed. Returns the binary path.
    pub async fn ensure(&self) -> Result<PathBuf> {
        if self.is_current() {
            return Ok(self.binary_path());
        }

        info!(version = %self.version, url = %self.asset_url, "provisioning service binary");
        std::fs::create_dir_all(&self.install_dir)?;

        let archive = self.fetcher.fetch(&self.asset_url).await?;
        let install_dir = self.install_dir.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive, &install_dir))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        let binary = self.binary_path();
        if !binary.is_file() {
            return Err(Error::Extract {
                archive: PathBuf::from(&self.asset_url),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("archive did not contain {}", platform::binary_name()),
                ),
            });
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755))?;
        }

        std::fs::write(self.stamp_path(), &self.version)?;
        Ok(binary)
    }
}

fn extract_archive(bytes: &[u8], dest: &Path) -> Result<()> {
    let decoder = GzDecoder::new(bytes);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(dest).map_err(|source| Error::Extract {
        archive: dest.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingFetcher {
        payload: Vec<u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ArtifactFetcher for CountingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.payload.clone())
        }
    }

    fn release_archive(binary: &str, contents: &[u8]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        let mut builder = tar::Builder::new(encoder);
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o755);
        header.set_cksum();
        builder.append_data(&mut header, binary, contents).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    fn provisioner(dir: &Path, fetcher: Arc<dyn ArtifactFetcher>) -> BinaryProvisioner {
        BinaryProvisioner::new(
            dir.to_path_buf(),
            "0.1.5".to_owned(),
            "http://localhost/unused".to_owned(),
            fetcher,
        )
    }

    #[tokio::test]
    async fn ensure_installs_binary_and_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            payload: release_archive(platform::binary_name(), b"#!bin"),
            calls: AtomicUsize::new(0),
        });
        let prov = provisioner(dir.path(), fetcher.clone());

        let binary = prov.ensure().await.unwrap();
        assert!(binary.is_file());
        assert_eq!(
            std::fs::read_to_string(dir.path().join(platform::STAMP_FILE_NAME)).unwrap(),
            "0.1.5"
        );
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn current_install_is_not_refetched() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            payload: release_archive(platform::binary_name(), b"#!bin"),
            calls: AtomicUsize::new(0),
        });
        let prov = provisioner(dir.path(), fetcher.clone());

        prov.ensure().await.unwrap();
        prov.ensure().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_stamp_triggers_reinstall() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            payload: release_archive(platform::binary_name(), b"#!bin"),
            calls: AtomicUsize::new(0),
        });
        let prov = provisioner(dir.path(), fetcher.clone());

        prov.ensure().await.unwrap();
        std::fs::write(dir.path().join(platform::STAMP_FILE_NAME), "0.0.1").unwrap();
        assert!(!prov.is_current());
        prov.ensure().await.unwrap();
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn archive_without_the_binary_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(CountingFetcher {
            payload: release_archive("README.md", b"nope"),
            calls: AtomicUsize::new(0),
        });
        let prov = provisioner(dir.path(), fetcher);

        match prov.ensure().await {
            Err(Error::Extract { .. }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
