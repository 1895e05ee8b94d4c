//! HTTP object store client
//!
//! Objects live at `{base_url}/storage/v1/object/{bucket}/{path}` and are
//! written with `PUT`, read with `GET`, authenticated with a bearer key.
//! Uploads never upsert, so an existing path is reported as a conflict.

use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};

use consent_core::{ArtifactStore, StorageError};

use super::path_segments;

#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: Client,
    base_url: Url,
    bucket: String,
    key: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        base_url: &str,
        bucket: impl Into<String>,
        key: Option<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let parsed = Url::parse(base_url)
            .with_context(|| format!("invalid object store url {}", base_url))?;
        if parsed.cannot_be_a_base() {
            bail!("object store url {} cannot hold object paths", base_url);
        }
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: parsed,
            bucket: bucket.into(),
            key,
        })
    }

    /// URL of one object; each path name is percent-encoded as a single
    /// segment so the request cannot leave the bucket
    fn object_url(&self, path: &str) -> Result<Url, StorageError> {
        let segments = path_segments(path)?;
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::InvalidPath(path.to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "object", self.bucket.as_str()])
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

fn transport_error(e: reqwest::Error) -> StorageError {
    if e.is_timeout() {
        StorageError::Timeout
    } else {
        StorageError::Io(e.to_string())
    }
}

async fn rejected(path: &str, response: reqwest::Response) -> StorageError {
    let status = response.status();
    match status {
        StatusCode::CONFLICT => StorageError::AlreadyExists(path.to_string()),
        StatusCode::NOT_FOUND => StorageError::NotFound(path.to_string()),
        _ => StorageError::Rejected {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        },
    }
}

#[async_trait]
impl ArtifactStore for HttpObjectStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let request = self
            .client
            .put(self.object_url(path)?)
            .header("content-type", "application/pdf")
            .header("x-upsert", "false")
            .body(bytes.to_vec());
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(rejected(path, response).await);
        }
        tracing::debug!(path, bytes = bytes.len(), "Uploaded artifact");
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let request = self.client.get(self.object_url(path)?);
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(rejected(path, response).await);
        }
        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn create_store() -> HttpObjectStore {
        HttpObjectStore::new(
            "https://storage.example.org/",
            "consent-forms",
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn object_url_joins_bucket_and_path() {
        let store = create_store();
        assert_eq!(
            store
                .object_url("consent-forms/Doe_Jane_4412_abc12345.pdf")
                .unwrap()
                .as_str(),
            "https://storage.example.org/storage/v1/object/consent-forms/consent-forms/Doe_Jane_4412_abc12345.pdf"
        );
    }

    #[test]
    fn object_url_rejects_paths_leaving_the_bucket() {
        let store = create_store();
        for path in ["../../bucket", "../other-bucket/secret.pdf", "/etc/passwd", ""] {
            assert!(
                matches!(store.object_url(path), Err(StorageError::InvalidPath(_))),
                "{:?} should be rejected",
                path
            );
        }
    }

    #[test]
    fn object_url_encodes_url_syntax_in_names() {
        let store = create_store();
        let url = store.object_url("consent-forms/%2e%2e/a?b#c.pdf").unwrap();
        assert_eq!(
            url.path(),
            "/storage/v1/object/consent-forms/consent-forms/%252e%252e/a%3Fb%23c.pdf"
        );
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[tokio::test]
    async fn get_refuses_traversal_before_any_request() {
        let store = create_store();
        let err = store.get("../other-bucket/secret.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));
    }

    #[test]
    fn base_url_must_parse() {
        assert!(HttpObjectStore::new("not a url", "b", None, Duration::from_secs(1)).is_err());
    }

    proptest! {
        #[test]
        fn object_urls_stay_inside_the_bucket(path in "[a-zA-Z0-9_./%?#\\\\-]{0,40}") {
            let store = create_store();
            if let Ok(url) = store.object_url(&path) {
                prop_assert!(url.path().starts_with("/storage/v1/object/consent-forms/"));
                prop_assert_eq!(url.host_str(), Some("storage.example.org"));
                prop_assert!(url.query().is_none());
            }
        }
    }
}
