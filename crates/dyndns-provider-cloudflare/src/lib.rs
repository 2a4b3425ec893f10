// # Cloudflare DNS Backend
//
// This crate provides a Cloudflare implementation of `dyndns_core::DnsBackend`.
//
// ## Behavior
//
// - Zone resolution: one `GET /zones?name=...`
// - Upsert: one `GET` of the `A` records for the name, then
//   - `POST` when none exist
//   - `PUT` on the first one when it differs, and `DELETE` for any extras
//   - nothing when the single record already matches
// - Record reads use the trait's default (system resolver)
// - NO retry logic (owned by the monitor's retry-by-waiting)
// - NO caching: every upsert starts from a fresh read
//
// ## Security Requirements
//
// - API token NEVER appears in logs
// - API token is read from the environment (`CLOUDFLARE_API_TOKEN`)
// - Backend construction fails fast if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?type=A&name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - Delete DNS Record: DELETE `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use dyndns_core::traits::{DnsBackend, RECORD_TTL_SECS, RECORD_TYPE};
use dyndns_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Environment variable holding the API token
pub const API_TOKEN_ENV: &str = "CLOUDFLARE_API_TOKEN";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const BACKEND: &str = "cloudflare";

/// Standard Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecordEntry {
    id: String,
    content: String,
    #[serde(default)]
    ttl: Option<u32>,
}

/// Cloudflare DNS backend
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the backend will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended writes
/// - **NOT** actually modify DNS records
pub struct CloudflareBackend {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// API base URL (overridable for tests)
    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: if true, perform GET requests but skip writes
    dry_run: bool,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareBackend")
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareBackend {
    /// Create a new Cloudflare backend
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:Read and DNS:Edit permissions
    /// - `dry_run`: If true, perform GET requests but skip writes
    ///
    /// # Errors
    ///
    /// `Error::Config` if the token is empty or the HTTP client cannot be built.
    pub fn new(api_token: impl Into<String>, dry_run: bool) -> Result<Self> {
        Self::with_base_url(api_token, CLOUDFLARE_API_BASE, dry_run)
    }

    /// Create a backend talking to a custom API base URL
    pub fn with_base_url(
        api_token: impl Into<String>,
        base_url: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.trim().is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_token,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            dry_run,
        })
    }

    /// Create a backend from ambient credentials (`CLOUDFLARE_API_TOKEN`)
    pub fn from_env(dry_run: bool) -> Result<Self> {
        let token = std::env::var(API_TOKEN_ENV)
            .map_err(|_| Error::config(format!("{API_TOKEN_ENV} is required for the cloudflare backend")))?;

        if dry_run {
            tracing::warn!("Cloudflare backend running in DRY-RUN mode - no changes will be made");
        }

        Self::new(token, dry_run)
    }

    /// Whether writes are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Send a request and unwrap the Cloudflare envelope
    async fn execute<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::backend(BACKEND, format!("{context}: HTTP request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, &error_text, context));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::backend(BACKEND, format!("{context}: failed to parse response: {e}")))?;

        if !envelope.success {
            let messages = envelope
                .errors
                .iter()
                .map(|m| format!("{} ({})", m.message, m.code))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::backend(BACKEND, format!("{context}: {messages}")));
        }

        envelope
            .result
            .ok_or_else(|| Error::backend(BACKEND, format!("{context}: response has no result")))
    }

    fn records_url(&self, zone_id: &str) -> String {
        format!("{}/zones/{}/dns_records", self.base_url, zone_id)
    }

    async fn list_a_records(&self, zone_id: &str, name: &str) -> Result<Vec<RecordEntry>> {
        tracing::debug!(name, "Listing A records");
        let request = self
            .client
            .get(self.records_url(zone_id))
            .query(&[("type", RECORD_TYPE), ("name", name)]);
        self.execute(request, &format!("cannot list records for {name}"))
            .await
    }
}

/// Map an HTTP failure status to a backend error
fn status_error(status: reqwest::StatusCode, error_text: &str, context: &str) -> Error {
    let message = match status.as_u16() {
        401 | 403 => format!(
            "Authentication failed: Invalid API token or insufficient permissions. Status: {status}"
        ),
        404 => format!("Not found. Status: {status}"),
        409 => format!("Conflict: Record is being updated by another process. Status: {status}"),
        429 => format!("Rate limit exceeded. Please retry later. Status: {status}"),
        500..=599 => format!("Cloudflare server error (transient): {status} - {error_text}"),
        _ => format!("Request failed: {status} - {error_text}"),
    };
    Error::backend(BACKEND, format!("{context}: {message}"))
}

#[async_trait]
impl DnsBackend for CloudflareBackend {
    async fn resolve_zone(&self, domain: &str) -> Result<String> {
        let zone_name = domain.trim_end_matches('.').to_ascii_lowercase();
        tracing::debug!(zone = %zone_name, "Looking up zone ID");

        let request = self
            .client
            .get(format!("{}/zones", self.base_url))
            .query(&[("name", zone_name.as_str())]);
        let zones: Vec<Zone> = self
            .execute(request, &format!("cannot look up zone {zone_name}"))
            .await?;

        let zone = zones
            .into_iter()
            .find(|zone| zone.name.eq_ignore_ascii_case(&zone_name))
            .ok_or_else(|| Error::zone_not_found(format!("domain {zone_name} not found")))?;

        tracing::debug!(zone_id = %zone.id, "Found zone ID");
        Ok(zone.id)
    }

    async fn upsert(&self, fqdn: &str, zone_id: &str, ip: Ipv4Addr) -> Result<()> {
        let name = fqdn.trim_end_matches('.');
        let content = ip.to_string();
        let payload = serde_json::json!({
            "type": RECORD_TYPE,
            "name": name,
            "content": content,
            "ttl": RECORD_TTL_SECS,
            "proxied": false,
        });
        let mode = if self.dry_run { "DRY-RUN" } else { "LIVE" };

        let existing = self.list_a_records(zone_id, name).await?;

        let Some((first, extras)) = existing.split_first() else {
            tracing::info!(name, ip = %ip, mode, "Creating DNS record");
            if self.dry_run {
                tracing::info!("[DRY-RUN] Would POST {} with payload: {}", self.records_url(zone_id), payload);
                return Ok(());
            }
            let request = self.client.post(self.records_url(zone_id)).json(&payload);
            let _: serde_json::Value = self
                .execute(request, &format!("cannot upsert {name}"))
                .await?;
            return Ok(());
        };

        if extras.is_empty() && first.content == content && first.ttl == Some(RECORD_TTL_SECS) {
            tracing::info!(name, ip = %ip, "DNS record already has correct IP");
            return Ok(());
        }

        let record_url = format!("{}/{}", self.records_url(zone_id), first.id);
        tracing::info!(name, ip = %ip, previous = %first.content, mode, "Updating DNS record");
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would PUT {} with payload: {}", record_url, payload);
        } else {
            let request = self.client.put(&record_url).json(&payload);
            let _: serde_json::Value = self
                .execute(request, &format!("cannot upsert {name}"))
                .await?;
        }

        for extra in extras {
            let extra_url = format!("{}/{}", self.records_url(zone_id), extra.id);
            tracing::warn!(name, stale = %extra.content, mode, "Removing duplicate A record");
            if self.dry_run {
                tracing::info!("[DRY-RUN] Would DELETE {}", extra_url);
                continue;
            }
            let _: serde_json::Value = self
                .execute(
                    self.client.delete(&extra_url),
                    &format!("cannot remove duplicate record for {name}"),
                )
                .await?;
        }

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ZONE: &str = "023e105f4ecef8ad9ca31a8372d0c353";
    const FQDN: &str = "home.example.com.";

    async fn setup(dry_run: bool) -> (MockServer, CloudflareBackend) {
        let server = MockServer::start().await;
        let backend = CloudflareBackend::with_base_url("secret_token_12345", server.uri(), dry_run)
            .unwrap();
        (server, backend)
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": result,
        }))
    }

    async fn mount_listing(server: &MockServer, records: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("/zones/{ZONE}/dns_records")))
            .and(query_param("type", "A"))
            .and(query_param("name", "home.example.com"))
            .respond_with(ok(records))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_resolve_zone_matches_by_name() {
        let (server, backend) = setup(false).await;

        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("name", "example.com"))
            .and(header("authorization", "Bearer secret_token_12345"))
            .respond_with(ok(json!([{ "id": ZONE, "name": "example.com" }])))
            .mount(&server)
            .await;

        assert_eq!(backend.resolve_zone("example.com.").await.unwrap(), ZONE);
    }

    #[tokio::test]
    async fn test_resolve_zone_not_found() {
        let (server, backend) = setup(false).await;

        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ok(json!([])))
            .mount(&server)
            .await;

        let err = backend.resolve_zone("example.com").await.unwrap_err();
        assert!(matches!(err, Error::ZoneNotFound(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_upsert_creates_missing_record() {
        let (server, backend) = setup(false).await;
        mount_listing(&server, json!([])).await;

        Mock::given(method("POST"))
            .and(path(format!("/zones/{ZONE}/dns_records")))
            .and(body_partial_json(json!({
                "type": "A",
                "name": "home.example.com",
                "content": "203.0.113.9",
                "ttl": 60,
            })))
            .respond_with(ok(json!({ "id": "new-record" })))
            .expect(1)
            .mount(&server)
            .await;

        backend
            .upsert(FQDN, ZONE, Ipv4Addr::new(203, 0, 113, 9))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_replaces_stale_record() {
        let (server, backend) = setup(false).await;
        mount_listing(
            &server,
            json!([{ "id": "r1", "content": "198.51.100.1", "ttl": 300 }]),
        )
        .await;

        Mock::given(method("PUT"))
            .and(path(format!("/zones/{ZONE}/dns_records/r1")))
            .and(body_partial_json(json!({ "content": "203.0.113.9", "ttl": 60 })))
            .respond_with(ok(json!({ "id": "r1" })))
            .expect(1)
            .mount(&server)
            .await;

        backend
            .upsert(FQDN, ZONE, Ipv4Addr::new(203, 0, 113, 9))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_removes_duplicates() {
        let (server, backend) = setup(false).await;
        mount_listing(
            &server,
            json!([
                { "id": "r1", "content": "203.0.113.9", "ttl": 60 },
                { "id": "r2", "content": "198.51.100.1", "ttl": 60 },
            ]),
        )
        .await;

        Mock::given(method("PUT"))
            .and(path(format!("/zones/{ZONE}/dns_records/r1")))
            .respond_with(ok(json!({ "id": "r1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path(format!("/zones/{ZONE}/dns_records/r2")))
            .respond_with(ok(json!({ "id": "r2" })))
            .expect(1)
            .mount(&server)
            .await;

        backend
            .upsert(FQDN, ZONE, Ipv4Addr::new(203, 0, 113, 9))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upsert_is_noop_when_current() {
        let (server, backend) = setup(false).await;
        mount_listing(
            &server,
            json!([{ "id": "r1", "content": "203.0.113.9", "ttl": 60 }]),
        )
        .await;

        Mock::given(method("PUT"))
            .respond_with(ok(json!({ "id": "r1" })))
            .expect(0)
            .mount(&server)
            .await;

        let ip = Ipv4Addr::new(203, 0, 113, 9);
        backend.upsert(FQDN, ZONE, ip).await.unwrap();
        backend.upsert(FQDN, ZONE, ip).await.unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_skips_writes() {
        let (server, backend) = setup(true).await;
        mount_listing(&server, json!([])).await;

        Mock::given(method("POST"))
            .respond_with(ok(json!({ "id": "new-record" })))
            .expect(0)
            .mount(&server)
            .await;

        assert!(backend.is_dry_run());
        backend
            .upsert(FQDN, ZONE, Ipv4Addr::new(203, 0, 113, 9))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_auth_failure_is_backend_error() {
        let (server, backend) = setup(false).await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let err = backend
            .upsert(FQDN, ZONE, Ipv4Addr::new(203, 0, 113, 9))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
        assert!(err.to_string().contains("Authentication failed"));
        assert!(!err.to_string().contains("secret_token"));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_backend_error() {
        let (server, backend) = setup(false).await;

        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 9109, "message": "Invalid access token" }],
                "result": null,
            })))
            .mount(&server)
            .await;

        let err = backend.resolve_zone("example.com").await.unwrap_err();
        assert!(err.to_string().contains("Invalid access token (9109)"));
    }

    #[test]
    fn test_empty_token_is_rejected() {
        let err = CloudflareBackend::new("  ", false).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_api_token_not_exposed_in_debug() {
        let backend = CloudflareBackend::new("secret_token_12345", false).unwrap();

        let debug_str = format!("{backend:?}");
        assert!(!debug_str.contains("secret_token"));
        assert!(debug_str.contains("CloudflareBackend"));
    }

    #[test]
    fn test_backend_name() {
        let backend = CloudflareBackend::new("token", false).unwrap();
        assert_eq!(backend.backend_name(), "cloudflare");
    }
}
