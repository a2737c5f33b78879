//! Work files.
//!
//! A node can mine from its own profile or from a work definition pushed by
//! the fleet. A work definition is two JSON files in the data directory: the
//! local profile and the server catalog it was written against.

use std::path::{Path, PathBuf};

use hashfleet_core::WorkType;

use crate::catalog::Catalog;
use crate::error::{MinerError, Result};
use crate::profile::MinerProfile;

/// Work files under a data directory.
#[derive(Debug, Clone)]
pub struct WorkFiles {
    data_dir: PathBuf,
}

impl WorkFiles {
    /// Work files rooted at `data_dir`.
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// The data directory.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Paths of the local and server files for a work type.
    #[must_use]
    pub fn paths(&self, work_type: WorkType) -> Option<(PathBuf, PathBuf)> {
        work_type
            .file_names()
            .map(|(local, server)| (self.data_dir.join(local), self.data_dir.join(server)))
    }

    /// Name of the first required file that is absent, if any.
    pub async fn missing(&self, work_type: WorkType) -> Option<String> {
        let (local, server) = work_type.file_names()?;
        for name in [local, server] {
            if !tokio::fs::try_exists(self.data_dir.join(name))
                .await
                .unwrap_or(false)
            {
                return Some(name.to_string());
            }
        }
        None
    }

    /// Load the profile and catalog of a work type.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Internal` for `WorkType::None`, `MinerError::Io`
    /// if a file cannot be read and `MinerError::Json` if it cannot be parsed.
    pub async fn load(&self, work_type: WorkType) -> Result<(MinerProfile, Catalog)> {
        let (local, server) = self
            .paths(work_type)
            .ok_or_else(|| MinerError::Internal("no work files for work type none".to_string()))?;
        let profile = read_json(&local).await?;
        let catalog = read_json(&server).await?;
        Ok((profile, catalog))
    }

    /// Write both files of a work type after checking they parse.
    ///
    /// # Errors
    ///
    /// Returns `MinerError::Json` if either document is malformed and
    /// `MinerError::Io` if a write fails.
    pub async fn write(&self, work_type: WorkType, local_json: &str, server_json: &str) -> Result<()> {
        let (local, server) = self
            .paths(work_type)
            .ok_or_else(|| MinerError::Internal("no work files for work type none".to_string()))?;
        parse_json::<MinerProfile>(&local, local_json)?;
        parse_json::<Catalog>(&server, server_json)?;

        tokio::fs::create_dir_all(&self.data_dir).await?;
        tokio::fs::write(&local, local_json).await?;
        tokio::fs::write(&server, server_json).await?;
        tracing::info!(work_type = ?work_type, dir = %self.data_dir.display(), "Work files written");
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_json(path, &text)
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path, text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| MinerError::Json {
        file: path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn none_needs_no_files() {
        let dir = TempDir::new().unwrap();
        let files = WorkFiles::new(dir.path());
        assert_eq!(files.missing(WorkType::None).await, None);
    }

    #[tokio::test]
    async fn reports_first_missing_file() {
        let dir = TempDir::new().unwrap();
        let files = WorkFiles::new(dir.path());
        assert_eq!(
            files.missing(WorkType::MineWork).await.as_deref(),
            Some("mine-work-local.json")
        );

        tokio::fs::write(dir.path().join("mine-work-local.json"), "{}")
            .await
            .unwrap();
        assert_eq!(
            files.missing(WorkType::MineWork).await.as_deref(),
            Some("mine-work-server.json")
        );
    }

    #[tokio::test]
    async fn write_then_load() {
        let dir = TempDir::new().unwrap();
        let files = WorkFiles::new(dir.path());
        files
            .write(WorkType::SelfWork, r#"{"worker_name":"w1"}"#, r#"{"coins":[]}"#)
            .await
            .unwrap();

        assert_eq!(files.missing(WorkType::SelfWork).await, None);
        let (profile, catalog) = files.load(WorkType::SelfWork).await.unwrap();
        assert_eq!(profile.worker_name, "w1");
        assert!(catalog.coins.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected_before_writing() {
        let dir = TempDir::new().unwrap();
        let files = WorkFiles::new(dir.path());
        let result = files.write(WorkType::MineWork, "not json", "{}").await;
        assert!(matches!(result, Err(MinerError::Json { .. })));
        assert!(files.missing(WorkType::MineWork).await.is_some());
    }
}
