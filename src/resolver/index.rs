//! Index client resolver (PEP 691 JSON simple API).

use async_trait::async_trait;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::artifact::{ArtifactRef, ArtifactSource};
use crate::config::{DEFAULT_MAX_FETCH_ATTEMPTS, Strategy, VersionPreference};
use crate::download::{RetryDecision, RetryPolicy, classify_resolve_error};
use crate::package::PackageSpec;

use super::select::{ProjectPage, Selected, select_sdist, select_wheel};
use super::{ArtifactForm, ResolveError, Resolver};

/// Accept header requesting the JSON form of the simple API.
pub const INDEX_ACCEPT: &str = "application/vnd.pypi.simple.v1+json";

/// Resolves artifacts by querying the package index directly.
#[derive(Debug, Clone)]
pub struct IndexClientResolver {
    client: Client,
    index_url: Url,
    preference: VersionPreference,
    retry: RetryPolicy,
}

impl IndexClientResolver {
    /// Creates a resolver over `index_url` using `client`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ClientUnavailable`] when `index_url` is not an
    /// absolute http(s) URL.
    pub fn new(
        client: Client,
        index_url: &str,
        preference: VersionPreference,
    ) -> Result<Self, ResolveError> {
        let mut url = Url::parse(index_url.trim())
            .map_err(|e| ResolveError::client_unavailable("index", format!("invalid index URL '{index_url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ResolveError::client_unavailable(
                "index",
                format!("index URL '{index_url}' must be an http(s) URL"),
            ));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(Self {
            client,
            index_url: url,
            preference,
            retry: RetryPolicy::immediate(DEFAULT_MAX_FETCH_ATTEMPTS),
        })
    }

    /// Sets how many times a project page query is attempted on transport errors.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry = RetryPolicy::immediate(max_attempts);
        self
    }

    /// HTTP client used for index and artifact requests.
    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Project page URL for a normalized name.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::ResolutionFailed`] if the name cannot form a URL.
    pub fn project_url(&self, normalized_name: &str) -> Result<Url, ResolveError> {
        self.index_url
            .join(&format!("{normalized_name}/"))
            .map_err(|e| ResolveError::resolution_failed(normalized_name, &e.to_string()))
    }

    async fn fetch_page_with_retry(
        &self,
        package: &PackageSpec,
        form: &ArtifactForm,
    ) -> Result<(Url, ProjectPage), ResolveError> {
        let url = self.project_url(package.normalized_name())?;
        let mut attempt = 1;
        loop {
            match self.fetch_page(&url, package, form).await {
                Ok(page) => return Ok((url, page)),
                Err(error) => match self.retry.should_retry(classify_resolve_error(&error), attempt) {
                    RetryDecision::Retry { attempt: next } => {
                        warn!(url = %url, attempt, error = %error, "index query failed; retrying");
                        attempt = next;
                    }
                    RetryDecision::DoNotRetry { .. } => return Err(error),
                },
            }
        }
    }

    async fn fetch_page(
        &self,
        url: &Url,
        package: &PackageSpec,
        form: &ArtifactForm,
    ) -> Result<ProjectPage, ResolveError> {
        let requirement = package.requirement();
        debug!(url = %url, "querying index");

        let response = self
            .client
            .get(url.clone())
            .header(header::ACCEPT, INDEX_ACCEPT)
            .send()
            .await
            .map_err(|e| ResolveError::network(&requirement, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ResolveError::no_artifact(
                &requirement,
                &form.to_string(),
                "project not found on the index",
            ));
        }
        if !status.is_success() {
            return Err(ResolveError::resolution_failed(
                &requirement,
                &format!("index returned HTTP {}", status.as_u16()),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ResolveError::network(&requirement, e))?;
        let page: ProjectPage = serde_json::from_slice(&body).map_err(|e| {
            ResolveError::resolution_failed(
                &requirement,
                &format!("index response is not a JSON project page: {e}"),
            )
        })?;
        Ok(page)
    }
}

#[async_trait]
impl Resolver for IndexClientResolver {
    fn name(&self) -> &str {
        "index"
    }

    fn strategy(&self) -> Strategy {
        Strategy::IndexClient
    }

    #[instrument(skip_all, fields(package = %package, form = %form))]
    async fn resolve(
        &self,
        package: &PackageSpec,
        form: &ArtifactForm,
    ) -> Result<ArtifactRef, ResolveError> {
        let requirement = package.requirement();
        let (page_url, page) = self.fetch_page_with_retry(package, form).await?;

        let selected: Option<Selected<'_>> = match form {
            ArtifactForm::Wheel(target) => select_wheel(&page.files, package, target, self.preference),
            ArtifactForm::SourceDist => select_sdist(&page.files, package, self.preference),
        };
        let Some(Selected { file, version }) = selected else {
            return Err(ResolveError::no_artifact(
                &requirement,
                &form.to_string(),
                &format!("none of {} listed file(s) match", page.files.len()),
            ));
        };

        let url = page_url.join(&file.url).map_err(|e| {
            ResolveError::resolution_failed(&requirement, &format!("bad file URL '{}': {e}", file.url))
        })?;
        debug!(filename = %file.filename, version = %version, "selected artifact");

        Ok(ArtifactRef {
            filename: file.filename.clone(),
            kind: form.kind(),
            version,
            source: ArtifactSource::Url {
                url: url.to_string(),
                sha256: file.sha256(),
            },
        })
    }
}
