//! Background check for newer releases of the CLI.
//!
//! The check consults a small cache file first and only asks the release feed when the cache is
//! stale (24 hours) or was written by a different version of the binary.  [`UpdateChecker::spawn`]
//! runs the check as a detached task; the caller polls the returned [`UpdateHandle`] once, without
//! waiting, and simply shows nothing if the check has not finished.

use std::path::{Path, PathBuf};

use futures::FutureExt;
use reqwest::{Client as ReqwestClient, header};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::config_dir;
use crate::error::{Error, Result};
use crate::observability::{UPDATE_CACHE_HITS, UPDATE_CACHE_WRITE_FAILURES, UPDATE_CHECKS};

/// The release feed consulted when the cache is stale.
pub const RELEASES_URL: &str =
    "https://api.github.com/repos/nerveband/beeper-api-cli/releases/latest";

/// Name of the update cache file, next to the config file.
pub const CACHE_FILE_NAME: &str = "update-cache.json";

/// How long a cached check stays valid.
pub const CACHE_TTL: time::Duration = time::Duration::hours(24);

/// Timeout for the release feed request.
pub const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Version reported by unreleased builds; never considered outdated.
pub const DEV_VERSION: &str = "dev";

/// The persisted result of the last check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateCache {
    /// When the feed was last consulted.
    #[serde(with = "crate::utils::time")]
    pub last_check: OffsetDateTime,
    /// Latest released version, without the `v` prefix.
    pub latest_version: String,
    /// Web page of the latest release.
    pub release_url: String,
    /// Version of the binary that wrote this record.
    pub current_version: String,
}

impl UpdateCache {
    /// Whether the record can stand in for a feed request at `now`.
    pub fn is_fresh(&self, current_version: &str, now: OffsetDateTime) -> bool {
        self.current_version == current_version && now - self.last_check < CACHE_TTL
    }
}

/// The outcome of a check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateInfo {
    /// Version of the running binary.
    pub current_version: String,
    /// Latest released version.
    pub latest_version: String,
    /// Web page of the latest release.
    pub release_url: String,
    /// Whether `latest_version` is newer than `current_version`.
    pub update_available: bool,
}

impl UpdateInfo {
    fn new(current_version: &str, latest_version: &str, release_url: &str) -> Self {
        Self {
            current_version: current_version.to_string(),
            latest_version: latest_version.to_string(),
            release_url: release_url.to_string(),
            update_available: is_newer(current_version, latest_version),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    html_url: String,
}

/// Strips a leading `v` from a version tag.
pub fn normalize_version(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

/// Returns true if `latest` is newer than `current`.
///
/// Versions are compared as plain strings, so multi-digit components order wrongly:
/// `1.10.0` does not count as newer than `1.2.0`.  Development builds are never outdated.
pub fn is_newer(current: &str, latest: &str) -> bool {
    let current = normalize_version(current);
    let latest = normalize_version(latest);
    if current == DEV_VERSION || current.is_empty() {
        return false;
    }
    latest > current
}

/// Formats the trailing notice shown after command output, if an update is available.
pub fn format_update_notice(info: &UpdateInfo) -> Option<String> {
    if !info.update_available {
        return None;
    }
    Some(format!(
        "\nUpdate available: {} -> {}\nRun 'beeper upgrade' to update, or visit:\n{}\n",
        info.current_version, info.latest_version, info.release_url
    ))
}

/// Checks the release feed, backed by the update cache.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    current_version: String,
    cache_path: Option<PathBuf>,
    feed_url: String,
}

impl UpdateChecker {
    /// Creates a checker using the per-user cache file and the public release feed.
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            cache_path: config_dir().map(|dir| dir.join(CACHE_FILE_NAME)),
            feed_url: RELEASES_URL.to_string(),
        }
    }

    /// Uses a different cache file.
    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// Uses a different release feed.
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    /// The cache file, if a home directory could be found.
    pub fn cache_path(&self) -> Option<&Path> {
        self.cache_path.as_deref()
    }

    /// Reads the cache; any failure reads as no cache.
    pub async fn load_cache(&self) -> Option<UpdateCache> {
        let path = self.cache_path.as_ref()?;
        let data = fs::read(path).await.ok()?;
        match serde_json::from_slice(&data) {
            Ok(cache) => Some(cache),
            Err(err) => {
                debug!(path = %path.display(), "ignoring unreadable update cache: {err}");
                None
            }
        }
    }

    /// Writes the cache, creating its directory.
    pub async fn save_cache(&self, cache: &UpdateCache) -> Result<()> {
        let path = self
            .cache_path
            .as_ref()
            .ok_or_else(|| Error::config("could not determine cache path"))?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await.map_err(|err| {
                Error::config(format!("failed to create cache directory: {err}")).with_source(err)
            })?;
        }
        let data = serde_json::to_vec_pretty(cache).map_err(|err| {
            Error::unknown(format!("failed to serialize update cache: {err}")).with_source(err)
        })?;
        fs::write(path, data).await.map_err(|err| {
            Error::config(format!("failed to write update cache: {err}")).with_source(err)
        })
    }

    async fn fetch_latest_release(&self) -> Result<Release> {
        let client = ReqwestClient::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::config(format!("failed to build HTTP client: {e}")).with_source(e)
            })?;
        let response = client
            .get(&self.feed_url)
            .header(header::ACCEPT, "application/vnd.github.v3+json")
            .header(header::USER_AGENT, "beeper-api-cli")
            .send()
            .await
            .map_err(|e| Error::from_network_failure(e, Some("check_update")))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::network(format!("failed to read release feed: {e}"))
                .with_operation("check_update")
                .with_source(e)
        })?;
        if status != reqwest::StatusCode::OK {
            return Err(Error::from_status(status.as_u16(), &body, Some("check_update")));
        }
        serde_json::from_str(&body).map_err(|e| {
            Error::server(format!("failed to decode release feed: {e}"))
                .with_operation("check_update")
                .with_source(e)
        })
    }

    /// Runs the check as of `now`.
    pub async fn check_at(&self, now: OffsetDateTime) -> Result<UpdateInfo> {
        UPDATE_CHECKS.click();
        if let Some(cache) = self.load_cache().await {
            if cache.is_fresh(&self.current_version, now) {
                UPDATE_CACHE_HITS.click();
                return Ok(UpdateInfo::new(
                    &self.current_version,
                    &cache.latest_version,
                    &cache.release_url,
                ));
            }
        }

        let release = self.fetch_latest_release().await?;
        debug!(
            tag = %release.tag_name,
            name = ?release.name,
            published_at = ?release.published_at,
            "fetched latest release"
        );
        let latest = normalize_version(&release.tag_name);
        let info = UpdateInfo::new(&self.current_version, latest, &release.html_url);

        let cache = UpdateCache {
            last_check: now,
            latest_version: info.latest_version.clone(),
            release_url: info.release_url.clone(),
            current_version: self.current_version.clone(),
        };
        if let Err(err) = self.save_cache(&cache).await {
            UPDATE_CACHE_WRITE_FAILURES.click();
            debug!("could not save update cache: {err}");
        }
        Ok(info)
    }

    /// Runs the check now.
    pub async fn check(&self) -> Result<UpdateInfo> {
        self.check_at(OffsetDateTime::now_utc()).await
    }

    /// Starts the check as a detached task on the current tokio runtime.
    pub fn spawn(self) -> UpdateHandle {
        let handle = tokio::spawn(async move {
            match self.check().await {
                Ok(info) => Some(info),
                Err(err) => {
                    debug!("update check failed: {err}");
                    None
                }
            }
        });
        UpdateHandle { handle }
    }
}

/// Handle to a background update check.
///
/// The result may never be observed: polling does not wait, and dropping the handle leaves the
/// task to finish or be torn down with the runtime.
#[derive(Debug)]
pub struct UpdateHandle {
    handle: JoinHandle<Option<UpdateInfo>>,
}

impl UpdateHandle {
    /// Whether the check has completed.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Takes the result if the check already finished successfully; never blocks.
    pub fn try_take(self) -> Option<UpdateInfo> {
        if !self.handle.is_finished() {
            return None;
        }
        self.handle.now_or_never()?.ok().flatten()
    }
}
