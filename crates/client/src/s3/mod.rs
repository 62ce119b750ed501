//! Durable snapshot store on an S3-compatible bucket.
//!
//! Objects are addressed path-style as `{endpoint}/{bucket}/{key}` with the
//! key percent-encoded. Every request is signed with AWS SigV4.
//!
//! - **HEAD** checks existence; 404 means absent, anything else unexpected
//!   makes the store unavailable.
//! - **PUT** writes the JPEG with a fixed content type.
//! - **DELETE** treats an already missing object as success.
//! - Hits are answered with a redirect to the public object URL, so image
//!   bytes never flow back through this service.

pub mod error;
pub mod sign;

pub use error::S3Error;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ogsnap_core::{AppConfig, ContentStore, Error, Key, Presence, ServeInstruction, Snapshot};
use reqwest::{Method, StatusCode, header};
use url::Url;

use sign::{CanonicalRequest, Credentials, EMPTY_PAYLOAD_HASH};

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "ogsnap/0.1";

/// S3 client configuration.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint: Url,
    pub bucket: String,
    pub region: String,
    pub credentials: Credentials,
    /// Base of redirect URLs; the endpoint when unset.
    pub public_url: Option<Url>,
    pub timeout: Duration,
}

impl S3Config {
    /// Extract the durable store settings from the application config.
    pub fn from_app(config: &AppConfig) -> Result<Self, S3Error> {
        let endpoint = config.s3_endpoint.as_deref().ok_or(S3Error::MissingSetting("s3_endpoint"))?;
        let bucket = config.bucket_name.clone().ok_or(S3Error::MissingSetting("bucket_name"))?;
        let access_key_id = config.s3_access_key_id.clone().ok_or(S3Error::MissingSetting("s3_access_key_id"))?;
        let secret_access_key =
            config.s3_secret_access_key.clone().ok_or(S3Error::MissingSetting("s3_secret_access_key"))?;

        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            bucket,
            region: config.s3_region.clone(),
            credentials: Credentials { access_key_id, secret_access_key },
            public_url: config.public_url.as_deref().map(parse_endpoint).transpose()?,
            timeout: DEFAULT_TIMEOUT,
        })
    }
}

fn parse_endpoint(input: &str) -> Result<Url, S3Error> {
    let url = Url::parse(input.trim()).map_err(|e| S3Error::InvalidEndpoint(format!("{input}: {e}")))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(S3Error::InvalidEndpoint(input.to_string())),
    }
}

/// Joins a base URL, bucket and encoded key.
fn object_location(base: &Url, bucket: &str, key: &Key) -> String {
    format!("{}/{bucket}/{}", base.as_str().trim_end_matches('/'), urlencoding::encode(key.as_str()))
}

/// S3-backed [`ContentStore`].
#[derive(Debug, Clone)]
pub struct DurableStore {
    http: reqwest::Client,
    config: S3Config,
}

impl DurableStore {
    /// Create a new store client with the given configuration.
    pub fn new(config: S3Config) -> Result<Self, S3Error> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(S3Error::from)?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &S3Config {
        &self.config
    }

    /// URL the client is redirected to on a hit.
    pub fn public_url(&self, key: &Key) -> String {
        let base = self.config.public_url.as_ref().unwrap_or(&self.config.endpoint);
        object_location(base, &self.config.bucket, key)
    }

    fn object_url(&self, key: &Key) -> String {
        object_location(&self.config.endpoint, &self.config.bucket, key)
    }

    fn host_header(&self) -> String {
        let endpoint = &self.config.endpoint;
        let host = endpoint.host_str().unwrap_or_default();
        match endpoint.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Send a signed request for `key`.
    async fn send(&self, method: Method, key: &Key, body: Option<Bytes>) -> Result<reqwest::Response, S3Error> {
        if !key.is_storable() {
            return Err(S3Error::InvalidEndpoint(format!("unaddressable key {key:?}")));
        }

        let url = Url::parse(&self.object_url(key)).map_err(|e| S3Error::InvalidEndpoint(e.to_string()))?;
        let now = chrono::Utc::now();
        let payload_hash = match &body {
            Some(bytes) => sign::sha256_hex(bytes),
            None => EMPTY_PAYLOAD_HASH.to_string(),
        };

        let headers = BTreeMap::from([
            ("host".to_string(), self.host_header()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), sign::amz_date(&now)),
        ]);
        let canonical =
            CanonicalRequest { method: method.as_str(), uri: url.path(), headers: &headers, payload_hash: &payload_hash };
        let authorization = sign::authorization(&self.config.credentials, &self.config.region, &canonical, &now);

        let mut request = self
            .http
            .request(method, url.clone())
            .header(header::AUTHORIZATION, authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &headers["x-amz-date"]);

        if let Some(bytes) = body {
            request = request.header(header::CONTENT_TYPE, Snapshot::CONTENT_TYPE).body(bytes);
        }

        let response = request.send().await?;
        tracing::debug!(url = %url, status = response.status().as_u16(), "s3 request complete");
        Ok(response)
    }

    /// Metadata-only existence check.
    pub async fn head_object(&self, key: &Key) -> Result<(), S3Error> {
        let response = self.send(Method::HEAD, key, None).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(S3Error::from_status(status.as_u16())),
        }
    }

    pub async fn put_object(&self, key: &Key, bytes: Bytes) -> Result<(), S3Error> {
        let response = self.send(Method::PUT, key, Some(bytes)).await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(S3Error::from_status(status.as_u16())),
        }
    }

    pub async fn delete_object(&self, key: &Key) -> Result<(), S3Error> {
        let response = self.send(Method::DELETE, key, None).await?;
        match response.status() {
            status if status.is_success() || status == StatusCode::NOT_FOUND => Ok(()),
            status => Err(S3Error::from_status(status.as_u16())),
        }
    }
}

#[async_trait]
impl ContentStore for DurableStore {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn lookup(&self, key: &Key) -> Presence {
        if !key.is_storable() {
            return Presence::NotFound;
        }

        match self.head_object(key).await {
            Ok(()) => Presence::Found,
            Err(S3Error::NotFound) => Presence::NotFound,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "s3 existence check failed");
                Presence::Unavailable(e.to_string())
            }
        }
    }

    async fn write(&self, key: &Key, snapshot: &Snapshot) -> Result<(), Error> {
        if !key.is_storable() {
            return Err(Error::InvalidKey(key.to_string()));
        }

        self.put_object(key, snapshot.bytes.clone()).await?;
        tracing::debug!(key = %key, size = snapshot.len(), bucket = %self.config.bucket, "stored snapshot in bucket");
        Ok(())
    }

    async fn read_or_serve(&self, key: &Key) -> Result<ServeInstruction, Error> {
        Ok(ServeInstruction::RedirectTo(self.public_url(key)))
    }

    async fn delete(&self, key: &Key) -> Result<(), Error> {
        if !key.is_storable() {
            return Ok(());
        }

        self.delete_object(key).await?;
        tracing::info!(key = %key, bucket = %self.config.bucket, "deleted snapshot");
        Ok(())
    }

    fn supports_delete(&self) -> bool {
        true
    }
}
