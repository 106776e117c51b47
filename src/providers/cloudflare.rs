//! Cloudflare zone/record API binding.

use super::{Credentials, DnsProvider, DnsRecord, RecordSet, RecordType, UpdateOutcome, Zone};
use crate::config::DEFAULT_API_BASE_URL;
use crate::error::{DdnsError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const ZONES_PER_PAGE: u32 = 50;

/// Cloudflare DNS provider.
pub struct CloudflareProvider {
    client: reqwest::Client,
    credentials: Credentials,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: Option<bool>,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<Value>,
    #[serde(default)]
    messages: Vec<Value>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    total_pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ZoneEntry {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecordEntry {
    id: String,
    #[serde(rename = "type")]
    record_type: String,
    name: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
}

/// HTTP status plus the body, when it parsed as a Cloudflare envelope.
struct Reply<T> {
    status: StatusCode,
    body: Option<CloudflareResponse<T>>,
}

impl<T> Reply<T> {
    fn succeeded(&self) -> bool {
        self.status.is_success()
            && self
                .body
                .as_ref()
                .is_some_and(|b| b.success.unwrap_or(true))
    }

    fn first_error(&self) -> String {
        self.body
            .as_ref()
            .and_then(|b| render_entries(&b.errors).into_iter().next())
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_base_url(credentials, DEFAULT_API_BASE_URL.to_string())
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(credentials: Credentials, base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Auth-Email", &self.credentials.email)
            .header("X-Auth-Key", &self.credentials.api_key)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<Reply<T>> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = match serde_json::from_str(&text) {
            Ok(body) => Some(body),
            Err(e) => {
                tracing::debug!("Unparseable Cloudflare response (HTTP {}): {}", status, e);
                None
            }
        };

        Ok(Reply { status, body })
    }

    fn provider_error(&self, message: String) -> DdnsError {
        DdnsError::Provider {
            provider: self.name().to_string(),
            message,
        }
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    fn name(&self) -> &'static str {
        "cloudflare"
    }

    async fn find_zone(&self, apex: &str) -> Result<Option<Zone>> {
        let mut page: u32 = 1;

        loop {
            let reply: Reply<Vec<ZoneEntry>> = self
                .send(self.request(reqwest::Method::GET, "/zones").query(&[
                    ("page", page.to_string()),
                    ("per_page", ZONES_PER_PAGE.to_string()),
                ]))
                .await?;

            if !reply.status.is_success() {
                return Err(DdnsError::Auth(reply.first_error()));
            }

            // A 2xx reply that is not a zone listing says nothing about the
            // credentials.
            let Some(body) = reply.body else {
                return Err(self.provider_error(format!(
                    "unreadable zone listing (HTTP {})",
                    reply.status
                )));
            };

            if body.success == Some(false) {
                let message = render_entries(&body.errors)
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| format!("HTTP {}", reply.status));
                return Err(DdnsError::Auth(message));
            }

            if let Some(zone) = body
                .result
                .unwrap_or_default()
                .into_iter()
                .find(|z| z.name.eq_ignore_ascii_case(apex))
            {
                tracing::debug!("Zone {} has id {}", zone.name, zone.id);
                return Ok(Some(Zone {
                    id: zone.id,
                    name: zone.name,
                }));
            }

            let total_pages = body
                .result_info
                .and_then(|info| info.total_pages)
                .unwrap_or(1);
            if page >= total_pages {
                return Ok(None);
            }
            page += 1;
        }
    }

    async fn find_records(&self, zone_id: &str, domain: &str) -> Result<RecordSet> {
        let path = format!("/zones/{}/dns_records", zone_id);
        let reply: Reply<Vec<RecordEntry>> = self
            .send(
                self.request(reqwest::Method::GET, &path)
                    .query(&[("name", domain)]),
            )
            .await?;

        if !reply.succeeded() {
            return Err(self.provider_error(format!(
                "record lookup for {} failed: {}",
                domain,
                reply.first_error()
            )));
        }

        let entries = reply.body.and_then(|b| b.result).unwrap_or_default();

        Ok(RecordSet::from_records(
            entries
                .into_iter()
                .filter(|r| r.name.eq_ignore_ascii_case(domain))
                .filter_map(|r| {
                    let record_type = match r.record_type.as_str() {
                        "A" => RecordType::A,
                        "AAAA" => RecordType::AAAA,
                        _ => return None,
                    };
                    Some(DnsRecord {
                        id: r.id,
                        record_type,
                        name: r.name,
                        content: r.content,
                    })
                }),
        ))
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
        content: &str,
    ) -> Result<UpdateOutcome> {
        let path = format!("/zones/{}/dns_records/{}", zone_id, record.id);
        let request = UpdateRequest {
            record_type: record.record_type.as_str(),
            name: &record.name,
            content,
        };

        let reply: Reply<Value> = self
            .send(self.request(reqwest::Method::PUT, &path).json(&request))
            .await?;

        let Some(body) = reply.body else {
            return Err(self.provider_error(format!(
                "unreadable update response (HTTP {})",
                reply.status
            )));
        };

        if body.success == Some(true) && reply.status.is_success() {
            Ok(UpdateOutcome::Updated)
        } else {
            let mut errors = render_entries(&body.errors);
            if errors.is_empty() && !reply.status.is_success() {
                errors.push(format!("HTTP {}", reply.status));
            }
            Ok(UpdateOutcome::Rejected {
                errors,
                messages: render_entries(&body.messages),
            })
        }
    }
}

/// Render Cloudflare `errors`/`messages` entries, which are usually
/// `{code, message}` objects but may be plain strings.
fn render_entries(entries: &[Value]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match entry {
            Value::String(s) => s.clone(),
            Value::Object(obj) => {
                match (obj.get("code"), obj.get("message").and_then(Value::as_str)) {
                    (Some(code), Some(message)) => format!("{}: {}", code, message),
                    (None, Some(message)) => message.to_string(),
                    _ => entry.to_string(),
                }
            }
            other => other.to_string(),
        })
        .collect()
}
