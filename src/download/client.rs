//! Artifact retrieval: moving resolved bytes into the destination directory.
//!
//! Index artifacts are streamed into a hidden `.part` file next to their final
//! location, checked against the published sha256, and renamed into place
//! without clobbering. Package-manager artifacts are already on disk in a
//! staging directory and only need the rename. The temporary file is removed
//! on every failure path when its handle drops.

use std::path::{Path, PathBuf};

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::locks::FilenameLocks;
use super::retry::{RetryDecision, RetryPolicy, classify_error};
use crate::artifact::{ArtifactRef, ArtifactSource};

/// Prefix of in-flight download files inside the destination.
pub const PART_PREFIX: &str = ".wheelfetch-";

/// Suffix of in-flight download files inside the destination.
pub const PART_SUFFIX: &str = ".part";

/// Result of committing an artifact to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The artifact was written to this path.
    Committed(PathBuf),
    /// A file with the final name was already present; nothing was written.
    AlreadyExists(PathBuf),
}

/// Fetches resolved artifacts into a destination directory.
///
/// Cheap to clone; clones share the HTTP connection pool and the lock table.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: Option<Client>,
    retry: RetryPolicy,
    locks: FilenameLocks,
}

impl ArtifactFetcher {
    /// Creates a fetcher. `client` may be `None` when only package-manager
    /// artifacts will be committed.
    #[must_use]
    pub fn new(client: Option<Client>, max_attempts: u32) -> Self {
        Self {
            client,
            retry: RetryPolicy::immediate(max_attempts),
            locks: FilenameLocks::new(),
        }
    }

    /// Lock table shared by all commits through this fetcher.
    #[must_use]
    pub fn locks(&self) -> &FilenameLocks {
        &self.locks
    }

    /// Writes `artifact` into `dest` under its final filename.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] when the transfer fails after all permitted
    /// attempts, the digest does not match, or the destination is not writable.
    #[instrument(skip_all, fields(filename = %artifact.filename))]
    pub async fn commit(
        &self,
        artifact: &ArtifactRef,
        dest: &Path,
    ) -> Result<CommitOutcome, DownloadError> {
        let final_path = artifact.destination_in(dest);
        let _guard = self.locks.acquire(&artifact.filename).await;

        if final_path.exists() {
            debug!(path = %final_path.display(), "already present");
            return Ok(CommitOutcome::AlreadyExists(final_path));
        }

        match &artifact.source {
            ArtifactSource::Url { url, sha256 } => {
                let part = self
                    .download_with_retry(url, sha256.as_deref(), &artifact.filename, dest)
                    .await?;
                persist_part(part, &final_path)
            }
            ArtifactSource::Staged { path, .. } => commit_staged(path, &final_path).await,
        }
    }

    async fn download_with_retry(
        &self,
        url: &str,
        sha256: Option<&str>,
        filename: &str,
        dest: &Path,
    ) -> Result<NamedTempFile, DownloadError> {
        let mut attempt = 1;
        loop {
            match self.download_once(url, sha256, filename, dest).await {
                Ok(part) => return Ok(part),
                Err(error) => match self.retry.should_retry(classify_error(&error), attempt) {
                    RetryDecision::Retry { attempt: next } => {
                        warn!(url, attempt, error = %error, "fetch failed; retrying");
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { reason } => {
                        debug!(url, attempt, reason = %reason, "giving up");
                        return Err(error);
                    }
                },
            }
        }
    }

    async fn download_once(
        &self,
        url: &str,
        sha256: Option<&str>,
        filename: &str,
        dest: &Path,
    ) -> Result<NamedTempFile, DownloadError> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| DownloadError::no_http_client(url))?;
        let parsed = url::Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = client.get(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        let owned_url = url.to_string();
        let body = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                if e.is_timeout() {
                    DownloadError::timeout(owned_url.clone())
                } else {
                    DownloadError::interrupted(owned_url.clone(), e.to_string())
                }
            })
        });

        download_into(body, dest, filename, sha256).await
    }
}

/// Streams `body` into a fresh `.part` file in `dest`, verifying `expected_sha256`.
///
/// On error the partially written file is removed before returning.
pub(crate) async fn download_into<S, B>(
    body: S,
    dest: &Path,
    filename: &str,
    expected_sha256: Option<&str>,
) -> Result<NamedTempFile, DownloadError>
where
    S: Stream<Item = Result<B, DownloadError>>,
    B: AsRef<[u8]>,
{
    let part = tempfile::Builder::new()
        .prefix(PART_PREFIX)
        .suffix(PART_SUFFIX)
        .tempfile_in(dest)
        .map_err(|e| DownloadError::io(dest, e))?;

    let handle = part
        .as_file()
        .try_clone()
        .map_err(|e| DownloadError::io(part.path(), e))?;
    let mut writer = BufWriter::new(tokio::fs::File::from_std(handle));
    let mut hasher = Sha256::new();
    let mut bytes_written: u64 = 0;

    let mut body = std::pin::pin!(body);
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        hasher.update(chunk);
        writer
            .write_all(chunk)
            .await
            .map_err(|e| DownloadError::io(part.path(), e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(part.path(), e))?;
    drop(writer);

    let actual = format!("{:x}", hasher.finalize());
    if let Some(expected) = expected_sha256 {
        if !expected.eq_ignore_ascii_case(&actual) {
            return Err(DownloadError::integrity(filename, expected, actual));
        }
    }

    debug!(bytes = bytes_written, sha256 = %actual, "transfer complete");
    Ok(part)
}

fn persist_part(part: NamedTempFile, final_path: &Path) -> Result<CommitOutcome, DownloadError> {
    match part.persist_noclobber(final_path) {
        Ok(_) => {
            info!(path = %final_path.display(), "saved");
            Ok(CommitOutcome::Committed(final_path.to_path_buf()))
        }
        // The rejected temp file is dropped with the error, which deletes it.
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
            Ok(CommitOutcome::AlreadyExists(final_path.to_path_buf()))
        }
        Err(e) => Err(DownloadError::io(final_path, e.error)),
    }
}

/// Moves a staged file into place without replacing an existing one.
///
/// A hard link refuses to overwrite; filesystems without hard links fall back
/// to a plain rename, which is safe here because the caller holds the
/// filename lock.
async fn commit_staged(staged: &Path, final_path: &Path) -> Result<CommitOutcome, DownloadError> {
    match tokio::fs::hard_link(staged, final_path).await {
        Ok(()) => {
            if let Err(e) = tokio::fs::remove_file(staged).await {
                debug!(path = %staged.display(), error = %e, "could not remove staged file");
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            return Ok(CommitOutcome::AlreadyExists(final_path.to_path_buf()));
        }
        Err(e) => {
            debug!(error = %e, "hard link unavailable; renaming");
            tokio::fs::rename(staged, final_path)
                .await
                .map_err(|e| DownloadError::io(final_path, e))?;
        }
    }
    info!(path = %final_path.display(), "saved");
    Ok(CommitOutcome::Committed(final_path.to_path_buf()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::artifact::ArtifactKind;
    use crate::package::Version;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    const BODY: &[u8] = b"wheel bytes";

    fn body_sha256() -> String {
        format!("{:x}", Sha256::digest(BODY))
    }

    fn url_artifact(url: String, sha256: Option<String>) -> ArtifactRef {
        ArtifactRef {
            filename: "pkg-1.0-py3-none-any.whl".to_string(),
            kind: ArtifactKind::Wheel,
            version: "1.0".parse::<Version>().unwrap(),
            source: ArtifactSource::Url { url, sha256 },
        }
    }

    fn dir_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    fn http_fetcher(max_attempts: u32) -> ArtifactFetcher {
        ArtifactFetcher::new(Some(Client::new()), max_attempts)
    }

    #[test]
    fn test_body_digest_is_lowercase_hex() {
        let digest = body_sha256();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[tokio::test]
    async fn test_commit_url_artifact_verifies_digest() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let dest = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/files/pkg.whl"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let artifact = url_artifact(
            format!("{}/files/pkg.whl", mock_server.uri()),
            Some(body_sha256().to_uppercase()),
        );
        let outcome = http_fetcher(2).commit(&artifact, dest.path()).await.unwrap();

        let expected = dest.path().join("pkg-1.0-py3-none-any.whl");
        assert_eq!(outcome, CommitOutcome::Committed(expected.clone()));
        assert_eq!(std::fs::read(expected).unwrap(), BODY);
        assert_eq!(dir_names(dest.path()), ["pkg-1.0-py3-none-any.whl"]);
    }

    #[tokio::test]
    async fn test_digest_mismatch_leaves_nothing() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let dest = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let artifact = url_artifact(format!("{}/pkg.whl", mock_server.uri()), Some("00".repeat(32)));
        let result = http_fetcher(2).commit(&artifact, dest.path()).await;

        assert!(matches!(result, Err(DownloadError::Integrity { .. })));
        assert!(dir_names(dest.path()).is_empty());
    }

    #[tokio::test]
    async fn test_404_is_not_retried() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let dest = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&mock_server)
            .await;

        let artifact = url_artifact(format!("{}/gone.whl", mock_server.uri()), None);
        let result = http_fetcher(3).commit(&artifact, dest.path()).await;

        match result {
            Err(DownloadError::HttpStatus { status, .. }) => assert_eq!(status, 404),
            other => panic!("Expected HttpStatus error, got: {other:?}"),
        }
        assert!(dir_names(dest.path()).is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_retried_once() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let dest = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let artifact = url_artifact(format!("{}/flaky.whl", mock_server.uri()), None);
        let outcome = http_fetcher(2).commit(&artifact, dest.path()).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::Committed(_)));
    }

    #[tokio::test]
    async fn test_persistent_server_error_fails_after_max_attempts() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let dest = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&mock_server)
            .await;

        let artifact = url_artifact(format!("{}/broken.whl", mock_server.uri()), None);
        let error = http_fetcher(2).commit(&artifact, dest.path()).await.unwrap_err();
        assert_eq!(error.kind(), crate::failure::ErrorKind::Network);
        assert!(dir_names(dest.path()).is_empty());
    }

    #[tokio::test]
    async fn test_existing_file_skips_request() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        let dest = TempDir::new().unwrap();
        std::fs::write(dest.path().join("pkg-1.0-py3-none-any.whl"), b"old").unwrap();

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
            .expect(0)
            .mount(&mock_server)
            .await;

        let artifact = url_artifact(format!("{}/pkg.whl", mock_server.uri()), None);
        let outcome = http_fetcher(2).commit(&artifact, dest.path()).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::AlreadyExists(_)));
        assert_eq!(
            std::fs::read(dest.path().join("pkg-1.0-py3-none-any.whl")).unwrap(),
            b"old"
        );
    }

    #[tokio::test]
    async fn test_interrupted_stream_removes_part_file() {
        let dest = TempDir::new().unwrap();
        let body = futures_util::stream::iter(vec![
            Ok(b"first half".to_vec()),
            Err(DownloadError::interrupted("https://files.example/pkg.whl", "connection reset")),
        ]);

        let result = download_into(body, dest.path(), "pkg-1.0-py3-none-any.whl", None).await;
        assert!(matches!(result, Err(DownloadError::Interrupted { .. })));
        assert!(dir_names(dest.path()).is_empty());
    }

    #[tokio::test]
    async fn test_part_file_is_hidden_until_persisted() {
        let dest = TempDir::new().unwrap();
        let body = futures_util::stream::iter(vec![Ok::<_, DownloadError>(BODY.to_vec())]);

        let part = download_into(body, dest.path(), "pkg.whl", Some(&body_sha256()))
            .await
            .unwrap();
        let names = dir_names(dest.path());
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with(PART_PREFIX) && names[0].ends_with(PART_SUFFIX));

        drop(part);
        assert!(dir_names(dest.path()).is_empty());
    }

    #[test]
    fn test_url_artifact_without_client_fails() {
        let dest = TempDir::new().unwrap();
        let artifact = url_artifact("https://files.example/pkg.whl".to_string(), None);
        let fetcher = ArtifactFetcher::new(None, 2);
        let result = tokio_test::block_on(fetcher.commit(&artifact, dest.path()));
        assert!(matches!(result, Err(DownloadError::NoHttpClient { .. })));
    }

    #[test]
    fn test_invalid_url_is_permanent() {
        let dest = TempDir::new().unwrap();
        let artifact = url_artifact("not-a-valid-url".to_string(), None);
        let result = tokio_test::block_on(http_fetcher(3).commit(&artifact, dest.path()));
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }

    #[tokio::test]
    async fn test_commit_staged_moves_file() {
        let dest = TempDir::new().unwrap();
        let staging = tempfile::Builder::new()
            .prefix(".wheelfetch-staging-")
            .tempdir_in(dest.path())
            .unwrap();
        let staged = staging.path().join("pkg-1.0.tar.gz");
        std::fs::write(&staged, b"sdist").unwrap();

        let artifact = ArtifactRef {
            filename: "pkg-1.0.tar.gz".to_string(),
            kind: ArtifactKind::SourceDist,
            version: "1.0".parse::<Version>().unwrap(),
            source: ArtifactSource::Staged {
                path: staged.clone(),
                args: Vec::new(),
                staging: Arc::new(staging),
            },
        };

        let outcome = ArtifactFetcher::new(None, 1)
            .commit(&artifact, dest.path())
            .await
            .unwrap();
        let final_path = dest.path().join("pkg-1.0.tar.gz");
        assert_eq!(outcome, CommitOutcome::Committed(final_path.clone()));
        assert_eq!(std::fs::read(final_path).unwrap(), b"sdist");
        assert!(!staged.exists());

        drop(artifact);
        assert_eq!(dir_names(dest.path()), ["pkg-1.0.tar.gz"]);
    }

    #[tokio::test]
    async fn test_commit_staged_does_not_clobber() {
        let dest = TempDir::new().unwrap();
        let final_path = dest.path().join("pkg-1.0.tar.gz");
        std::fs::write(&final_path, b"original").unwrap();

        let staging = TempDir::new_in(dest.path()).unwrap();
        let staged = staging.path().join("pkg-1.0.tar.gz");
        std::fs::write(&staged, b"replacement").unwrap();

        let outcome = commit_staged(&staged, &final_path).await.unwrap();
        assert!(matches!(outcome, CommitOutcome::AlreadyExists(_)));
        assert_eq!(std::fs::read(final_path).unwrap(), b"original");
    }
}
