use log::{debug, warn};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};

use super::{DnsRecord, RecordLookup};
use crate::config::CloudflareConfig;
use crate::error::{Error, Result};

/// Cloudflare API v4 client bound to one zone and one credential.
pub struct CloudflareClient {
    client: Client,
    api_base: String,
    api_token: String,
    zone_id: String,
}

impl CloudflareClient {
    pub fn new(client: Client, config: &CloudflareConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            zone_id: config.zone_id.clone(),
        }
    }

    fn records_url(&self) -> String {
        format!("{}/zones/{}/dns_records", self.api_base, self.zone_id)
    }

    /// Looks up the first A record called `name` in the zone.
    pub async fn fetch_record(&self, name: &str) -> Result<RecordLookup> {
        let request = self
            .client
            .get(self.records_url())
            .query(&[("type", "A"), ("name", name)]);

        let response: CloudflareResponse<Vec<DnsRecord>> = self.send(request, "lookup").await?;

        if !response.success {
            return Ok(RecordLookup::ProviderError(describe_errors(&response.errors)));
        }

        match response.result.unwrap_or_default().into_iter().next() {
            Some(record) => {
                debug!(
                    "Found record {} ({} {} -> {}, ttl={}, proxied={})",
                    record.id, record.record_type, record.name, record.content, record.ttl, record.proxied
                );
                Ok(RecordLookup::Found(record))
            }
            None => Ok(RecordLookup::NotFound),
        }
    }

    /// Overwrites the record's content. Returns the provider's success flag.
    pub async fn update_record(&self, record_id: &str, name: &str, content: &str) -> Result<bool> {
        let body = UpdateRecordRequest {
            record_type: "A",
            name,
            content,
            ttl: 1,
            proxied: false,
            id: record_id,
        };

        let request = self
            .client
            .put(format!("{}/{}", self.records_url(), record_id))
            .json(&body);

        let response: CloudflareResponse<IgnoredAny> = self.send(request, "update").await?;

        if !response.success {
            warn!(
                "Cloudflare rejected update of {}: {}",
                name,
                describe_errors(&response.errors)
            );
        }

        Ok(response.success)
    }

    /// Sends an authenticated request and decodes the response envelope.
    ///
    /// 401/403 map to [`Error::Auth`]. Any other status is accepted as long as
    /// the body is a Cloudflare envelope, so provider-reported failures reach
    /// the caller as `success: false` rather than as errors.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        action: &str,
    ) -> Result<CloudflareResponse<T>> {
        let response = request
            .header("Authorization", format!("Bearer {}", self.api_token))
            .send()
            .await
            .map_err(|e| Error::network(format!("failed to send {} request to Cloudflare: {}", action, e)))?;

        let status = response.status();
        debug!("Cloudflare {} request returned HTTP {}", action, status);

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("failed to read Cloudflare {} response: {}", action, e)))?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let detail = serde_json::from_str::<CloudflareResponse<IgnoredAny>>(&body)
                .map(|r| describe_errors(&r.errors))
                .unwrap_or_else(|_| format!("HTTP {}", status));
            return Err(Error::auth(detail));
        }

        match serde_json::from_str(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) if status.is_success() => Err(Error::network(format!(
                "failed to parse Cloudflare {} response: {}",
                action, e
            ))),
            Err(_) => Err(Error::network(format!(
                "Cloudflare {} request failed with HTTP {}",
                action, status
            ))),
        }
    }
}

fn describe_errors(errors: &[CloudflareError]) -> String {
    if errors.is_empty() {
        return "no error details provided".to_string();
    }

    errors
        .iter()
        .map(|e| format!("{}: {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join(", ")
}

// Cloudflare API types

#[derive(Debug, Serialize)]
struct UpdateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CloudflareResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<CloudflareError>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CloudflareError {
    code: i32,
    message: String,
}
