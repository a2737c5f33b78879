//! Kernel package management.
//!
//! A kernel ships as a package file. Before a launch the package must be
//! present in the packages directory (downloading it if not) and staged into
//! its own directory under the kernels directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::config::MinerConfig;
use crate::error::{MinerError, Result};

/// Resolves, downloads and stages kernel packages.
#[async_trait]
pub trait KernelPackages: Send + Sync {
    /// Returns true if the package file exists locally.
    async fn is_present(&self, package: &str) -> bool;

    /// Download the package file.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Download` if the transfer fails.
    async fn download(&self, package: &str) -> Result<()>;

    /// Stage the package for launching and return its directory.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Package` if the package cannot be staged.
    async fn prepare(&self, package: &str) -> Result<PathBuf>;
}

/// Directory a package is staged into: the file name without extension.
#[must_use]
pub fn kernel_dir(kernels_dir: &Path, package: &str) -> PathBuf {
    let stem = Path::new(package)
        .file_stem()
        .map_or_else(|| package.to_string(), |s| s.to_string_lossy().into_owned());
    kernels_dir.join(stem)
}

fn check_package_name(package: &str) -> Result<()> {
    if package.is_empty()
        || package.contains('/')
        || package.contains('\\')
        || package.contains("..")
    {
        return Err(MinerError::Package(format!(
            "invalid package name: {package}"
        )));
    }
    Ok(())
}

/// Filesystem packages with HTTP downloads.
#[derive(Debug, Clone)]
pub struct FsKernelPackages {
    client: reqwest::Client,
    base_url: String,
    packages_dir: PathBuf,
    kernels_dir: PathBuf,
}

const MARKER_FILE: &str = ".package";

impl FsKernelPackages {
    /// Create a package manager from the miner config.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Internal` if the HTTP client cannot be created.
    pub fn new(config: &MinerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.download_timeout())
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| MinerError::Internal(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.package_base_url.trim_end_matches('/').to_string(),
            packages_dir: config.packages_dir.clone(),
            kernels_dir: config.kernels_dir.clone(),
        })
    }

    /// Full path of a package file.
    #[must_use]
    pub fn package_path(&self, package: &str) -> PathBuf {
        self.packages_dir.join(package)
    }
}

#[async_trait]
impl KernelPackages for FsKernelPackages {
    async fn is_present(&self, package: &str) -> bool {
        if check_package_name(package).is_err() {
            return false;
        }
        tokio::fs::metadata(self.package_path(package))
            .await
            .is_ok_and(|m| m.is_file() && m.len() > 0)
    }

    async fn download(&self, package: &str) -> Result<()> {
        check_package_name(package)?;
        let url = format!("{}/{}", self.base_url, package);
        tracing::info!(package, url = %url, "Downloading kernel package");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| MinerError::Download(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!(package, status = %status, "Kernel package download failed");
            return Err(MinerError::Download(format!("server returned status {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MinerError::Download(format!("failed to read body: {e}")))?;
        if bytes.is_empty() {
            return Err(MinerError::Download("empty package".to_string()));
        }

        tokio::fs::create_dir_all(&self.packages_dir).await?;
        let target = self.package_path(package);
        let partial = target.with_extension("part");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &target).await?;

        tracing::info!(package, size = bytes.len(), "Kernel package downloaded");
        Ok(())
    }

    async fn prepare(&self, package: &str) -> Result<PathBuf> {
        check_package_name(package)?;
        if !self.is_present(package).await {
            return Err(MinerError::Package(format!("{package} is not present")));
        }

        let dir = kernel_dir(&self.kernels_dir, package);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(MARKER_FILE), package.as_bytes()).await?;

        tracing::debug!(package, dir = %dir.display(), "Kernel package staged");
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn packages(server: &MockServer, dir: &TempDir) -> FsKernelPackages {
        let config = MinerConfig {
            package_base_url: format!("{}/packages/", server.uri()),
            ..MinerConfig::with_data_dir(dir.path())
        };
        FsKernelPackages::new(&config).unwrap()
    }

    #[test]
    fn kernel_dir_strips_extension() {
        assert_eq!(
            kernel_dir(Path::new("/k"), "gminer-2.75.zip"),
            PathBuf::from("/k/gminer-2.75")
        );
    }

    #[tokio::test]
    async fn download_then_prepare() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/packages/gminer.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-fake".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let packages = packages(&server, &dir);

        assert!(!packages.is_present("gminer.zip").await);
        packages.download("gminer.zip").await.unwrap();
        assert!(packages.is_present("gminer.zip").await);

        let staged = packages.prepare("gminer.zip").await.unwrap();
        assert!(staged.ends_with("kernels/gminer"));
        let marker = tokio::fs::read_to_string(staged.join(MARKER_FILE)).await.unwrap();
        assert_eq!(marker, "gminer.zip");
    }

    #[tokio::test]
    async fn download_not_found_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/packages/missing.zip"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let packages = packages(&server, &dir);
        let result = packages.download("missing.zip").await;
        assert!(matches!(result, Err(MinerError::Download(_))));
        assert!(!packages.is_present("missing.zip").await);
    }

    #[tokio::test]
    async fn prepare_requires_the_package() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let packages = packages(&server, &dir);
        assert!(matches!(
            packages.prepare("absent.zip").await,
            Err(MinerError::Package(_))
        ));
    }

    #[tokio::test]
    async fn path_traversal_is_rejected() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let packages = packages(&server, &dir);
        assert!(matches!(
            packages.download("../etc/passwd").await,
            Err(MinerError::Package(_))
        ));
    }
}
