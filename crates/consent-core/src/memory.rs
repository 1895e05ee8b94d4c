//! In-process adapters
//!
//! Used by tests and by deployments that run without persistence. Both keep
//! the same semantics as the durable backends: the index accepts repeated
//! MRNs and the artifact store refuses to overwrite a path.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::{IndexError, StorageError};
use crate::ports::{ArtifactStore, SubmissionIndex};
use crate::record::CommittedSubmission;

#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    pub async fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.objects.read().await.keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        objects.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct MemoryIndex {
    rows: RwLock<Vec<CommittedSubmission>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count_for(&self, mrn: &str) -> usize {
        self.rows
            .read()
            .await
            .iter()
            .filter(|r| r.medical_record_number == mrn)
            .count()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl SubmissionIndex for MemoryIndex {
    async fn find_by_mrn(&self, mrn: &str) -> Result<Vec<CommittedSubmission>, IndexError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .filter(|r| r.medical_record_number == mrn)
            .cloned()
            .collect())
    }

    async fn insert(&self, row: &CommittedSubmission) -> Result<(), IndexError> {
        self.rows.write().await.push(row.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::committed;

    #[tokio::test]
    async fn artifact_paths_are_write_once() {
        let store = MemoryArtifactStore::new();
        store.put("a/b.pdf", b"one").await.unwrap();
        let err = store.put("a/b.pdf", b"two").await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
        assert_eq!(store.get("a/b.pdf").await.unwrap(), b"one");
        assert!(matches!(
            store.get("missing.pdf").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn index_keeps_repeated_mrns() {
        let index = MemoryIndex::new();
        index.insert(&committed("55", Some("01/01/2024"), None)).await.unwrap();
        index.insert(&committed("55", Some("02/01/2024"), None)).await.unwrap();
        index.insert(&committed("56", None, Some("02/01/2024"))).await.unwrap();

        assert_eq!(index.find_by_mrn("55").await.unwrap().len(), 2);
        assert_eq!(index.count_for("56").await, 1);
        assert_eq!(index.len().await, 3);
    }
}
