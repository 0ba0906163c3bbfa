pub mod cloudflare;

use serde::Deserialize;

/// An A record as the provider reports it. Held only for the duration of a
/// single reconciliation cycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub record_type: String,
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub ttl: u32,
    #[serde(default)]
    pub proxied: bool,
}

/// Outcome of looking up the managed record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordLookup {
    Found(DnsRecord),
    NotFound,
    /// The provider answered but reported `success: false`.
    ProviderError(String),
}
