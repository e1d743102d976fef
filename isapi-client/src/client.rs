use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use reqwest::{Method, Response, StatusCode};
use tracing::{debug, warn};
use url::Url;

use isapi_parser::{decode_device_info, DeviceInfo};

use crate::digest::DigestAuth;
use crate::error::{ClientError, Result};

/// Well-known ISAPI endpoints
pub mod paths {
    pub const DEVICE_INFO: &str = "/ISAPI/System/deviceInfo";
    pub const VIDEO_INPUT_CHANNELS: &str = "/ISAPI/System/Video/inputs/channels";
    pub const INPUT_PROXY_CHANNELS: &str = "/ISAPI/ContentMgmt/InputProxy/channels";
    pub const ALERT_STREAM: &str = "/ISAPI/Event/notification/alertStream";
}

/// Characters of an error body kept in [`ClientError::UnexpectedStatus`]
const EXCERPT_CHARS: usize = 200;

/// Connection settings for one recorder
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    /// Certificate verification; `None` follows `use_ssl`
    pub verify_tls: Option<bool>,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
    /// Deadline for [`IsapiClient::fetch_text`], retry included
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 80,
            use_ssl: false,
            verify_tls: None,
            username: username.into(),
            password: password.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(15),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = Some(verify);
        self
    }

    /// Whether server certificates are checked
    pub fn verifies_tls(&self) -> bool {
        self.verify_tls.unwrap_or(self.use_ssl)
    }

    /// `http[s]://host:port/`
    pub fn base_url(&self) -> Result<Url> {
        let scheme = if self.use_ssl { "https" } else { "http" };
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ClientError::InvalidUrl("empty host".to_string()));
        }
        let url = if host.contains(':') && !host.starts_with('[') {
            format!("{}://[{}]:{}/", scheme, host, self.port)
        } else {
            format!("{}://{}:{}/", scheme, host, self.port)
        };
        Ok(Url::parse(&url)?)
    }
}

/// Digest-authenticated HTTP client for one recorder.
///
/// Shared between session setup and the stream supervisor; the digest state
/// sits behind a mutex that is never held across an await.
#[derive(Debug)]
pub struct IsapiClient {
    http: reqwest::Client,
    base_url: Url,
    auth: Mutex<DigestAuth>,
    request_timeout: Duration,
}

impl IsapiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(!config.verifies_tls())
            .build()?;

        Ok(Self {
            http,
            base_url,
            auth: Mutex::new(DigestAuth::new(&config.username, &config.password)),
            request_timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue an authenticated request.
    ///
    /// A `401` refreshes the digest challenge from every `WWW-Authenticate`
    /// header and the request is retried once. A second `401` is returned
    /// as-is for the caller to judge.
    pub async fn request(&self, method: Method, path: &str) -> Result<Response> {
        let url = self.base_url.join(path)?;
        let uri = request_uri(&url);

        let response = self.send_once(&method, &url, &uri).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let refreshed = {
            let mut auth = self.auth.lock();
            response
                .headers()
                .get_all(WWW_AUTHENTICATE)
                .iter()
                .filter_map(|value| value.to_str().ok())
                .fold(false, |found, value| auth.update_challenge(value) || found)
        };
        debug!("{} {} got 401 (new challenge: {}), retrying", method, uri, refreshed);

        self.send_once(&method, &url, &uri).await
    }

    async fn send_once(&self, method: &Method, url: &Url, uri: &str) -> Result<Response> {
        let authorization = self.auth.lock().build_authorization(method.as_str(), uri);

        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request.send().await?;
        debug!("{} {} -> {}", method, uri, response.status());
        Ok(response)
    }

    /// GET `path` and return status and body text within the request timeout.
    pub async fn fetch_text(&self, path: &str) -> Result<(StatusCode, String)> {
        let fetch = async {
            let response = self.request(Method::GET, path).await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, ClientError>((status, body))
        };

        match tokio::time::timeout(self.request_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(ClientError::Timeout),
        }
    }

    /// True only when the device info endpoint answers 200
    pub async fn validate_device_info(&self) -> bool {
        match self.fetch_text(paths::DEVICE_INFO).await {
            Ok((StatusCode::OK, _)) => true,
            Ok((status, _)) => {
                warn!("Device info probe returned HTTP {}", status);
                false
            }
            Err(e) => {
                warn!("Device info probe failed: {}", e);
                false
            }
        }
    }

    /// Parsed device info, `None` on any failure
    pub async fn fetch_device_info(&self) -> Option<DeviceInfo> {
        match self.fetch_text(paths::DEVICE_INFO).await {
            Ok((StatusCode::OK, body)) => decode_device_info(&body),
            Ok((status, _)) => {
                debug!("Device info returned HTTP {}", status);
                None
            }
            Err(e) => {
                debug!("Device info request failed: {}", e);
                None
            }
        }
    }

    /// Open the never-ending notification stream at `path`.
    ///
    /// Any status other than 200 fails; credentials rejected after the retry
    /// give [`ClientError::Unauthorized`].
    pub async fn open_event_stream(&self, path: &str) -> Result<EventStream> {
        let response = self.request(Method::GET, path).await?;
        match response.status() {
            StatusCode::OK => Ok(EventStream {
                response,
                bytes_read: 0,
            }),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            status => {
                let excerpt = self.read_excerpt(response).await;
                Err(ClientError::UnexpectedStatus {
                    status: status.as_u16(),
                    excerpt,
                })
            }
        }
    }

    /// Leading characters of an error body, bounded in both size and time
    async fn read_excerpt(&self, mut response: Response) -> String {
        let mut raw = Vec::new();
        let read = async {
            while let Ok(Some(chunk)) = response.chunk().await {
                raw.extend_from_slice(&chunk);
                if raw.len() >= EXCERPT_CHARS * 4 {
                    break;
                }
            }
        };
        let _ = tokio::time::timeout(self.request_timeout, read).await;
        String::from_utf8_lossy(&raw).chars().take(EXCERPT_CHARS).collect()
    }
}

/// An open `alertStream` response body
#[derive(Debug)]
pub struct EventStream {
    response: Response,
    bytes_read: u64,
}

impl EventStream {
    /// Next body chunk; `Ok(None)` once the device closes the stream.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        let chunk = self.response.chunk().await?;
        if let Some(bytes) = &chunk {
            self.bytes_read += bytes.len() as u64;
        }
        Ok(chunk)
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

/// Request-URI used in the digest computation: path plus query
fn request_uri(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
