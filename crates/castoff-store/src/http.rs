//! HTTP release host client and webhook channel.
//!
//! Speaks a GitHub-Releases-shaped API: create release by tag, upload
//! assets to a separate upload endpoint, list releases/assets by tag.
//! An HTTP 422 from the create endpoint is treated as "already exists"
//! and resolved with a fetch by tag, keeping the create step idempotent.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::artifact::Artifact;
use crate::error::{StoreError, StoreResult};
use crate::release_api::{AttachedAsset, DistChannel, ReleaseApi, ReleaseIdentity, ReleaseRef};

/// Release host configuration
#[derive(Debug, Clone)]
pub struct ReleaseApiConfig {
    /// API base URL (e.g. `https://api.github.com`)
    pub api_base: String,
    /// Repository slug (`owner/name`)
    pub repo: String,
    /// Authentication token (optional for public hosts)
    pub token: Option<String>,
}

impl ReleaseApiConfig {
    /// Create config for a specific host and repo
    pub fn new(api_base: &str, repo: &str) -> Self {
        ReleaseApiConfig {
            api_base: api_base.trim_end_matches('/').to_string(),
            repo: repo.to_string(),
            token: None,
        }
    }

    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        ReleaseApiConfig {
            api_base: std::env::var("CASTOFF_API_BASE")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            repo: std::env::var("CASTOFF_REPO").unwrap_or_default(),
            token: std::env::var("CASTOFF_TOKEN").ok(),
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn releases_url(&self) -> String {
        format!("{}/repos/{}/releases", self.api_base, self.repo)
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    id: u64,
    upload_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetResponse {
    name: String,
    browser_download_url: String,
}

/// Release host client for the primary publish path
pub struct HttpReleaseApi {
    config: ReleaseApiConfig,
    client: reqwest::Client,
}

impl HttpReleaseApi {
    /// Create a new client
    pub fn new(config: ReleaseApiConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("castoff/0.2.0")
            .build()
            .expect("Failed to create HTTP client");

        HttpReleaseApi { config, client }
    }

    /// Create client from environment variables
    pub fn from_env() -> Self {
        Self::new(ReleaseApiConfig::from_env())
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn fetch_by_tag(&self, tag: &str) -> StoreResult<ReleaseRef> {
        let url = format!("{}/tags/{}", self.config.releases_url(), tag);
        let response = self.authed(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Err(StoreError::ReleaseApi(format!(
                "fetch release by tag {tag} failed: HTTP {}",
                response.status()
            )));
        }
        let body: ReleaseResponse = response.json().await?;
        Ok(release_ref(tag, body))
    }

    async fn find_existing_asset(
        &self,
        release: &ReleaseRef,
        file_name: &str,
    ) -> StoreResult<Option<AttachedAsset>> {
        let url = format!(
            "{}/{}/assets",
            self.config.releases_url(),
            release.release_id
        );
        let response = self.authed(self.client.get(&url)).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let assets: Vec<AssetResponse> = response.json().await?;
        Ok(assets.into_iter().find(|a| a.name == file_name).map(|a| {
            AttachedAsset {
                file_name: a.name,
                download_ref: a.browser_download_url,
            }
        }))
    }
}

/// Asset upload URL with the file name percent-encoded in the query.
fn upload_url(upload_base: &str, file_name: &str) -> StoreResult<reqwest::Url> {
    let mut url = reqwest::Url::parse(upload_base).map_err(|e| {
        StoreError::ReleaseApi(format!("invalid upload endpoint {upload_base}: {e}"))
    })?;
    url.query_pairs_mut().append_pair("name", file_name);
    Ok(url)
}

fn release_ref(tag: &str, body: ReleaseResponse) -> ReleaseRef {
    // GitHub upload URLs are RFC 6570 templates ("…{?name,label}").
    let upload_url = body
        .upload_url
        .map(|u| u.split('{').next().unwrap_or(&u).to_string());
    ReleaseRef {
        tag: tag.to_string(),
        release_id: body.id.to_string(),
        upload_url,
    }
}

#[async_trait]
impl ReleaseApi for HttpReleaseApi {
    async fn create_or_fetch(&self, identity: &ReleaseIdentity) -> StoreResult<ReleaseRef> {
        let response = self
            .authed(self.client.post(self.config.releases_url()))
            .json(&json!({
                "tag_name": identity.tag,
                "name": identity.display_name,
                "body": identity.notes,
            }))
            .send()
            .await?;

        // 422 = a release for this tag already exists; resolve it instead.
        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            debug!(tag = %identity.tag, "Release already exists, fetching by tag");
            return self.fetch_by_tag(&identity.tag).await;
        }

        if !response.status().is_success() {
            return Err(StoreError::ReleaseApi(format!(
                "create release for tag {} failed: HTTP {}",
                identity.tag,
                response.status()
            )));
        }

        let body: ReleaseResponse = response.json().await?;
        info!(tag = %identity.tag, release_id = body.id, "Created release");
        Ok(release_ref(&identity.tag, body))
    }

    async fn attach_asset(
        &self,
        release: &ReleaseRef,
        artifact: &Artifact,
    ) -> StoreResult<AttachedAsset> {
        let upload_base = release.upload_url.as_deref().ok_or_else(|| {
            StoreError::ReleaseApi(format!(
                "release {} has no upload endpoint",
                release.release_id
            ))
        })?;

        let url = upload_url(upload_base, &artifact.file_name)?;
        let response = self
            .authed(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, &artifact.content_type)
            .body(artifact.payload.clone())
            .send()
            .await?;

        // 422 = an asset with this name is already attached.
        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            debug!(file_name = %artifact.file_name, "Asset already attached, reusing");
            if let Some(existing) = self
                .find_existing_asset(release, &artifact.file_name)
                .await?
            {
                return Ok(existing);
            }
            return Err(StoreError::ReleaseApi(format!(
                "asset {} reported as duplicate but not listed",
                artifact.file_name
            )));
        }

        if !response.status().is_success() {
            return Err(StoreError::ReleaseApi(format!(
                "attach asset {} failed: HTTP {}",
                artifact.file_name,
                response.status()
            )));
        }

        let asset: AssetResponse = response.json().await?;
        Ok(AttachedAsset {
            file_name: asset.name,
            download_ref: asset.browser_download_url,
        })
    }
}

/// Secondary channel that POSTs a JSON payload to a configured webhook URL.
pub struct WebhookChannel {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new(name: &str, url: &str) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("castoff/0.2.0")
            .build()
            .expect("Failed to create HTTP client");

        WebhookChannel {
            name: name.to_string(),
            url: url.to_string(),
            client,
        }
    }
}

#[async_trait]
impl DistChannel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn notify(&self, release: &ReleaseRef, assets: &[AttachedAsset]) -> StoreResult<()> {
        let payload = json!({
            "tag": release.tag,
            "release_id": release.release_id,
            "assets": assets,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StoreError::Channel(format!("{}: {e}", self.name)))?;

        if !response.status().is_success() {
            warn!(channel = %self.name, status = %response.status(), "Channel webhook rejected notification");
            return Err(StoreError::Channel(format!(
                "{}: HTTP {}",
                self.name,
                response.status()
            )));
        }

        debug!(channel = %self.name, tag = %release.tag, "Channel notified");
        Ok(())
    }
}
