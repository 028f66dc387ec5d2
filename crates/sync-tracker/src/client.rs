use std::sync::OnceLock;

use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("tracker API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("connectivity probe failed: {0}")]
    Connectivity(String),
}

pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<TrackerError> for sync_core::error::SyncError {
    fn from(e: TrackerError) -> Self {
        match e {
            TrackerError::Connectivity(msg) => sync_core::error::SyncError::ConnectivityFailure(msg),
            other => sync_core::error::SyncError::ConnectivityFailure(other.to_string()),
        }
    }
}

/// The TLS protocol versions the connectivity probe attempts, in order.
/// Modern TLS stacks no longer negotiate SSL 3.0, so the probe stops at
/// TLS 1.0 — a deliberate narrowing rather than a silent omission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsVersion {
    Tls12,
    Tls11,
    Tls10,
}

impl TlsVersion {
    fn as_reqwest(self) -> reqwest::tls::Version {
        match self {
            TlsVersion::Tls12 => reqwest::tls::Version::TLS_1_2,
            TlsVersion::Tls11 => reqwest::tls::Version::TLS_1_1,
            TlsVersion::Tls10 => reqwest::tls::Version::TLS_1_0,
        }
    }

    const PREFERENCE_ORDER: [TlsVersion; 3] = [TlsVersion::Tls12, TlsVersion::Tls11, TlsVersion::Tls10];
}

/// Process-wide "init-once, read-many" latch for the TLS version that first
/// succeeded against the permissions probe.
static NEGOTIATED_TLS: OnceLock<TlsVersion> = OnceLock::new();

pub fn negotiated_tls_version() -> Option<TlsVersion> {
    NEGOTIATED_TLS.get().copied()
}

#[derive(Debug, Clone)]
pub struct TrackerClient {
    http: reqwest::Client,
    base_url: String,
    auth_header: String,
    accept_self_signed: bool,
}

impl TrackerClient {
    pub fn new(base_url: impl Into<String>, user: &str, pass: &str, accept_self_signed: bool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_self_signed)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            auth_header: Self::basic_auth(user, pass),
            accept_self_signed,
        })
    }

    fn basic_auth(user: &str, pass: &str) -> String {
        let raw = format!("{user}:{pass}");
        format!("Basic {}", base64::engine::general_purpose::STANDARD.encode(raw))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/rest/api/2/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("Authorization", &self.auth_header)
            .header("Content-Type", "application/json")
    }

    /// Connectivity/authorization probe. Attempts TLS 1.2, then 1.1, then
    /// 1.0, keeping the first protocol that succeeds; a response with no
    /// permissions or a network error on every attempt is a connectivity
    /// failure.
    pub async fn get_permissions(&self) -> Result<serde_json::Value> {
        if let Some(version) = negotiated_tls_version() {
            return self.get_permissions_with(version).await;
        }

        let mut last_err = None;
        for version in TlsVersion::PREFERENCE_ORDER {
            match self.get_permissions_with(version).await {
                Ok(value) => {
                    let _ = NEGOTIATED_TLS.set(version);
                    return Ok(value);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(TrackerError::Connectivity(
            last_err.map(|e| e.to_string()).unwrap_or_else(|| "no TLS version negotiated".into()),
        ))
    }

    async fn get_permissions_with(&self, version: TlsVersion) -> Result<serde_json::Value> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(self.accept_self_signed)
            .min_tls_version(version.as_reqwest())
            .max_tls_version(version.as_reqwest())
            .build()?;

        let resp = client
            .get(self.url("mypermissions"))
            .header("Authorization", &self.auth_header)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TrackerError::Api {
                status: resp.status().as_u16(),
                body: resp.text().await.unwrap_or_default(),
            });
        }

        let value: serde_json::Value = resp.json().await?;
        if value.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            return Err(TrackerError::Connectivity("empty permissions response".into()));
        }
        Ok(value)
    }
}
