use log::debug;
use reqwest::Client;
use std::net::Ipv4Addr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Builds the HTTP client shared by the IP resolver and the DNS client.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::network(format!("failed to build HTTP client: {}", e)))
}

/// Asks a public "what is my IP" service for the caller's address.
pub struct IpResolver {
    client: Client,
    url: String,
}

impl IpResolver {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Returns the trimmed response body, which must be an IPv4 address.
    pub async fn resolve(&self) -> Result<String> {
        debug!("Resolving external IP via {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::network(format!("IP service request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::network(format!("IP service returned HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(format!("failed to read IP service response: {}", e)))?;

        let ip = body.trim();
        if ip.parse::<Ipv4Addr>().is_err() {
            return Err(Error::network(format!(
                "IP service returned something other than an IPv4 address: {:?}",
                ip
            )));
        }

        Ok(ip.to_string())
    }
}
