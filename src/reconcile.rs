use log::{debug, error, info, warn};
use reqwest::Client;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::ip::IpResolver;
use crate::provider::cloudflare::CloudflareClient;
use crate::provider::RecordLookup;

/// What a single poll-compare-update cycle ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Unchanged { ip: String },
    Updated { previous: String, ip: String },
    UpdateRejected { ip: String },
    RecordMissing { ip: String },
    LookupFailed { reason: String },
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged { ip } => write!(f, "unchanged at {}", ip),
            Self::Updated { previous, ip } => write!(f, "updated {} -> {}", previous, ip),
            Self::UpdateRejected { ip } => write!(f, "update to {} rejected", ip),
            Self::RecordMissing { ip } => write!(f, "record missing (current IP {})", ip),
            Self::LookupFailed { reason } => write!(f, "lookup failed: {}", reason),
        }
    }
}

pub struct Reconciler {
    resolver: IpResolver,
    dns: CloudflareClient,
    record_name: String,
}

impl Reconciler {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            resolver: IpResolver::new(client.clone(), config.daemon.ip_service_url.clone()),
            dns: CloudflareClient::new(client, &config.cloudflare),
            record_name: config.cloudflare.record_name.clone(),
        }
    }

    /// Resolves the external IP, looks up the record and rewrites it when the
    /// two disagree. Records are never created.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let current_ip = self.resolver.resolve().await?;
        debug!("External IP is {}", current_ip);

        let record = match self.dns.fetch_record(&self.record_name).await? {
            RecordLookup::Found(record) => record,
            RecordLookup::NotFound => {
                warn!(
                    "No A record named {} exists in the zone, nothing to update (current IP {})",
                    self.record_name, current_ip
                );
                return Ok(CycleOutcome::RecordMissing { ip: current_ip });
            }
            RecordLookup::ProviderError(reason) => {
                warn!("Cloudflare could not look up {}: {}", self.record_name, reason);
                return Ok(CycleOutcome::LookupFailed { reason });
            }
        };

        if record.content == current_ip {
            info!("No IP change detected. Current IP: {}", current_ip);
            return Ok(CycleOutcome::Unchanged { ip: current_ip });
        }

        info!(
            "IP change detected for {}: {} -> {}, updating DNS record",
            self.record_name, record.content, current_ip
        );

        if self
            .dns
            .update_record(&record.id, &self.record_name, &current_ip)
            .await?
        {
            info!("DNS record updated successfully. New IP: {}", current_ip);
            Ok(CycleOutcome::Updated {
                previous: record.content,
                ip: current_ip,
            })
        } else {
            warn!("Failed to update DNS record {}", self.record_name);
            Ok(CycleOutcome::UpdateRejected { ip: current_ip })
        }
    }

    /// Runs one cycle and logs how it ended.
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let outcome = self.run_cycle().await?;
        info!("Cycle finished: {}", outcome);
        Ok(outcome)
    }

    /// Runs cycles back to back, `interval` apart, until `shutdown` resolves.
    ///
    /// A failed cycle is logged and the next one runs after the usual wait.
    /// Shutdown is observed between cycles and while sleeping; an in-flight
    /// cycle always runs to completion.
    pub async fn run<F>(&self, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Watching {} every {:?}", self.record_name, interval);

        loop {
            if let Err(e) = self.run_once().await {
                error!("Cycle failed, retrying in {:?}: {}", interval, e);
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Stopping DNS reconciliation");
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
