//! ReportStore — the storage writer for accepted crash reports.
//!
//! Each accepted upload becomes two sibling files under the dump directory,
//! `{id}.json` (metadata) and `{id}.dmp` (raw minidump), both owner-only.
//! A successful symbolication later adds `{id}.trace`. The shared identifier
//! is the only join between the three; there is no index or database.

use crate::models::report::{ReportId, ReportMetadata};
use bytes::Bytes;
use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{fs::OpenOptions, io::AsyncWriteExt};
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not serialize report metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Writes report artifacts beneath a configured dump directory.
///
/// Many request handlers share one store; this is safe without locking
/// because every write targets a filename unique to its upload.
#[derive(Clone)]
pub struct ReportStore {
    base_path: PathBuf,
}

impl ReportStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn metadata_path(&self, id: &ReportId) -> PathBuf {
        self.base_path.join(format!("{}.json", id))
    }

    pub fn dump_path(&self, id: &ReportId) -> PathBuf {
        self.base_path.join(format!("{}.dmp", id))
    }

    pub fn trace_path(&self, id: &ReportId) -> PathBuf {
        self.base_path.join(format!("{}.trace", id))
    }

    /// Persist one upload and return its fresh identifier.
    ///
    /// Writes the metadata document first, then the dump payload. A failure
    /// between the two leaves an orphaned metadata file behind; no identifier
    /// is returned in that case, so nothing downstream ever sees it.
    pub async fn store(
        &self,
        dump: Bytes,
        fields: &HashMap<String, Vec<String>>,
    ) -> StoreResult<ReportId> {
        let metadata = ReportMetadata::from_fields(fields);
        let encoded = metadata.to_json_line()?;

        let id = ReportId::generate();
        write_private(&self.metadata_path(&id), &encoded).await?;
        write_private(&self.dump_path(&id), &dump).await?;

        debug!("stored report {} ({} dump bytes)", id, dump.len());
        Ok(id)
    }

    /// Write a symbolicated stack trace verbatim.
    pub async fn write_trace(&self, id: &ReportId, trace: &[u8]) -> io::Result<()> {
        write_private(&self.trace_path(id), trace).await
    }
}

/// Write a file readable and writable only by the owning user.
async fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_fields() -> HashMap<String, Vec<String>> {
        let mut fields = HashMap::new();
        fields.insert("prod".to_string(), vec!["MyApp".to_string()]);
        fields.insert("ver".to_string(), vec!["1.0".to_string()]);
        fields
    }

    #[tokio::test]
    async fn store_writes_metadata_and_dump() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());

        let id = store
            .store(Bytes::from_static(b"I am a minidump"), &sample_fields())
            .await
            .unwrap();

        let metadata = tokio::fs::read_to_string(store.metadata_path(&id))
            .await
            .unwrap();
        assert_eq!(
            metadata,
            "{\"Prod\":\"MyApp\",\"Ver\":\"1.0\",\"Guid\":\"\",\"Ptime\":\"\",\"Ctime\":\"\",\"Email\":\"\",\"Comments\":\"\"}\n"
        );

        let dump = tokio::fs::read(store.dump_path(&id)).await.unwrap();
        assert_eq!(dump, b"I am a minidump");
    }

    #[tokio::test]
    async fn identical_uploads_get_distinct_identifiers() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let fields = sample_fields();

        let first = store
            .store(Bytes::from_static(b"same bytes"), &fields)
            .await
            .unwrap();
        let second = store
            .store(Bytes::from_static(b"same bytes"), &fields)
            .await
            .unwrap();

        assert_ne!(first, second);
        assert!(store.dump_path(&first).exists());
        assert!(store.dump_path(&second).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn artifacts_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path());
        let id = store
            .store(Bytes::from_static(b"dump"), &HashMap::new())
            .await
            .unwrap();
        store.write_trace(&id, b"trace").await.unwrap();

        for path in [
            store.metadata_path(&id),
            store.dump_path(&id),
            store.trace_path(&id),
        ] {
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "unexpected mode on {}", path.display());
        }
    }

    #[tokio::test]
    async fn store_fails_without_visible_identifier_when_directory_missing() {
        let dir = tempdir().unwrap();
        let store = ReportStore::new(dir.path().join("does-not-exist"));

        let result = store
            .store(Bytes::from_static(b"dump"), &HashMap::new())
            .await;
        assert!(matches!(result, Err(StoreError::Io(_))));
    }
}
