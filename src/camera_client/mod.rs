//! CameraDirectory - External Camera System Adapter
//!
//! ## Responsibilities
//!
//! - Guest login against the camera directory service (session cookie)
//! - Camera list retrieval and snapshot link resolution
//! - Image fetch with a bounded timeout
//!
//! Every call is bounded by the HTTP client timeout so a hung camera
//! service fails only its own pipeline run.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Browser-style UA; some camera firmwares refuse unknown clients.
const IMAGE_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 6.1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/41.0.2228.0 Safari/537.36";

/// One camera known to the directory service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: String,
    /// Opaque stream descriptor used for snapshot link resolution
    pub stream_locator: String,
}

/// Authenticated session marker
///
/// The directory keeps session state in cookies; this token only proves a
/// login happened within the current run. Sessions are never cached across
/// runs — each pipeline run logs in afresh.
#[derive(Debug, Clone, Default)]
pub struct CameraSession {
    pub login_id: String,
}

/// External camera system capability
#[async_trait]
pub trait CameraDirectory: Send + Sync {
    /// Authenticate; must precede directory calls
    async fn login(&self) -> Result<CameraSession>;

    /// Cameras currently known to the directory
    async fn list_cameras(&self, session: &CameraSession) -> Result<Vec<CameraInfo>>;

    /// Resolve a fetchable snapshot URL from a stream descriptor
    async fn resolve_snapshot_link(
        &self,
        session: &CameraSession,
        locator: &str,
    ) -> Result<String>;

    /// Fetch raw image bytes
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Debug, Deserialize)]
struct CameraEntry {
    id: serde_json::Value,
    data: CameraStreams,
}

#[derive(Debug, Deserialize)]
struct CameraStreams {
    #[serde(rename = "streamHigh")]
    stream_high: String,
}

impl CameraEntry {
    /// Camera ids arrive as numbers or strings depending on directory
    /// version; normalize to string for matching.
    fn into_info(self) -> CameraInfo {
        CameraInfo {
            id: self
                .id
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| self.id.to_string()),
            stream_locator: self.data.stream_high,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CameraListResponse {
    #[serde(rename = "P")]
    cameras: Vec<CameraEntry>,
}

#[derive(Debug, Deserialize)]
struct SnapshotLinkResponse {
    #[serde(rename = "P")]
    url: String,
}

/// HTTP implementation of the camera directory protocol
pub struct HydraClient {
    http: Client,
    base_url: String,
    login_id: String,
}

impl HydraClient {
    pub fn new(base_url: String, login_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            // Directory session lives in cookies
            .cookie_store(true)
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            http,
            base_url,
            login_id,
        })
    }
}

#[async_trait]
impl CameraDirectory for HydraClient {
    async fn login(&self) -> Result<CameraSession> {
        let url = format!("{}/guest?login_id={}", self.base_url, self.login_id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Authentication(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Authentication(format!(
                "login returned {}",
                resp.status()
            )));
        }

        tracing::debug!(login_id = %self.login_id, "camera directory login ok");
        Ok(CameraSession {
            login_id: self.login_id.clone(),
        })
    }

    async fn list_cameras(&self, _session: &CameraSession) -> Result<Vec<CameraInfo>> {
        let url = format!("{}/readCamera", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Directory(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Directory(format!(
                "camera list returned {}",
                resp.status()
            )));
        }

        let list: CameraListResponse = resp
            .json()
            .await
            .map_err(|e| Error::Directory(e.to_string()))?;

        Ok(list.cameras.into_iter().map(CameraEntry::into_info).collect())
    }

    async fn resolve_snapshot_link(
        &self,
        _session: &CameraSession,
        locator: &str,
    ) -> Result<String> {
        let url = format!("{}/snapshot?streamID={}", self.base_url, locator);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::LinkResolution(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::LinkResolution(format!(
                "snapshot link returned {}",
                resp.status()
            )));
        }

        let link: SnapshotLinkResponse = resp
            .json()
            .await
            .map_err(|e| Error::LinkResolution(e.to_string()))?;

        Ok(link.url)
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .get(url)
            .header(reqwest::header::USER_AGENT, IMAGE_USER_AGENT)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Error::Fetch(format!("image fetch returned {}", resp.status())));
        }

        let bytes = resp.bytes().await.map_err(|e| Error::Fetch(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
