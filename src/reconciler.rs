//! Per-domain reconciliation of desired addresses against provider records.

use crate::providers::{DnsProvider, DnsRecord, RecordType, UpdateOutcome};
use std::fmt;

/// The address(es) a run wants recorded for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredState {
    pub domain: String,
    pub ipv4: Option<String>,
    pub ipv6: Option<String>,
}

impl DesiredState {
    fn address(&self, record_type: RecordType) -> Option<&str> {
        match record_type {
            RecordType::A => self.ipv4.as_deref(),
            RecordType::AAAA => self.ipv6.as_deref(),
        }
    }
}

/// Terminal state of one record type for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Record already holds the desired address.
    SkippedNoOp,
    /// No record of this type exists for the domain.
    SkippedNoRecord,
    /// Discovery produced no address of this family.
    SkippedNoAddress,
    Updated {
        previous: String,
        current: String,
    },
    /// The provider answered the update with `success: false`.
    Rejected {
        errors: Vec<String>,
        messages: Vec<String>,
    },
    /// The update call itself failed (transport or unreadable reply).
    Failed(String),
}

impl RecordOutcome {
    pub fn is_update(&self) -> bool {
        matches!(self, RecordOutcome::Updated { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RecordOutcome::Rejected { .. } | RecordOutcome::Failed(_)
        )
    }
}

impl fmt::Display for RecordOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordOutcome::SkippedNoOp => write!(f, "already current"),
            RecordOutcome::SkippedNoRecord => write!(f, "no record"),
            RecordOutcome::SkippedNoAddress => write!(f, "no address"),
            RecordOutcome::Updated { previous, current } => {
                write!(f, "updated ({} -> {})", previous, current)
            }
            RecordOutcome::Rejected { errors, messages } => {
                write!(f, "rejected: {}", errors.join("; "))?;
                if !messages.is_empty() {
                    write!(f, " ({})", messages.join("; "))?;
                }
                Ok(())
            }
            RecordOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// What happened to one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainStatus {
    Reconciled {
        a: RecordOutcome,
        aaaa: RecordOutcome,
    },
    /// No zone for the apex is visible to these credentials.
    NotManaged { apex: String },
    /// The name has no registrable apex (e.g. a bare public suffix).
    InvalidDomain,
    /// Zone listing was unreadable or record lookup failed; nothing was
    /// updated for this domain.
    LookupFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainReport {
    pub domain: String,
    pub status: DomainStatus,
}

impl DomainReport {
    /// Outcomes per record type, if the domain got that far.
    pub fn outcomes(&self) -> Option<[(RecordType, &RecordOutcome); 2]> {
        match &self.status {
            DomainStatus::Reconciled { a, aaaa } => {
                Some([(RecordType::A, a), (RecordType::AAAA, aaaa)])
            }
            _ => None,
        }
    }
}

/// The zone listing failed; no further domain can be processed with these
/// credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAborted {
    pub domain: String,
    pub reason: String,
}

impl fmt::Display for RunAborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "authentication failed while looking up {}: {}",
            self.domain, self.reason
        )
    }
}

/// Lowercase `domain` and strip surrounding whitespace and the root dot.
pub fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Registrable apex of `domain` according to the public suffix list.
pub fn apex_domain(domain: &str) -> Option<String> {
    let name = normalize_domain(domain);
    if name.is_empty() {
        return None;
    }
    psl::domain_str(&name).map(str::to_string)
}

/// Drives a provider to bring one domain's records in line with the
/// desired addresses.
pub struct Reconciler<'a, P: DnsProvider + ?Sized> {
    provider: &'a P,
}

impl<'a, P: DnsProvider + ?Sized> Reconciler<'a, P> {
    pub fn new(provider: &'a P) -> Self {
        Self { provider }
    }

    /// Reconcile one domain. `Err` means the whole run must stop.
    pub async fn reconcile(
        &self,
        desired: &DesiredState,
    ) -> std::result::Result<DomainReport, RunAborted> {
        let domain = normalize_domain(&desired.domain);
        let report = |status| DomainReport {
            domain: domain.clone(),
            status,
        };

        let Some(apex) = apex_domain(&domain) else {
            tracing::warn!("{} has no registrable apex domain, skipping", domain);
            return Ok(report(DomainStatus::InvalidDomain));
        };

        let zone = match self.provider.find_zone(&apex).await {
            Ok(Some(zone)) => zone,
            Ok(None) => {
                tracing::warn!("{} is not managed by this account (apex {})", domain, apex);
                return Ok(report(DomainStatus::NotManaged { apex }));
            }
            Err(e) if e.is_payload() => {
                tracing::warn!("Zone listing for {} returned an unusable payload: {}", apex, e);
                return Ok(report(DomainStatus::LookupFailed(e.to_string())));
            }
            Err(e) => {
                if e.is_transport() {
                    tracing::error!("Zone listing for {} failed in transport: {}", apex, e);
                } else {
                    tracing::error!("Zone listing for {} was refused: {}", apex, e);
                }
                return Err(RunAborted {
                    domain: domain.clone(),
                    reason: e.to_string(),
                });
            }
        };

        let records = match self.provider.find_records(&zone.id, &domain).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Record lookup for {} failed: {}", domain, e);
                return Ok(report(DomainStatus::LookupFailed(e.to_string())));
            }
        };

        let a = self
            .reconcile_record(
                &zone.id,
                records.get(RecordType::A),
                desired.address(RecordType::A),
            )
            .await;
        let aaaa = self
            .reconcile_record(
                &zone.id,
                records.get(RecordType::AAAA),
                desired.address(RecordType::AAAA),
            )
            .await;

        Ok(report(DomainStatus::Reconciled { a, aaaa }))
    }

    async fn reconcile_record(
        &self,
        zone_id: &str,
        record: Option<&DnsRecord>,
        desired: Option<&str>,
    ) -> RecordOutcome {
        let Some(address) = desired else {
            return RecordOutcome::SkippedNoAddress;
        };
        let Some(record) = record else {
            return RecordOutcome::SkippedNoRecord;
        };

        // Exact string comparison, no address canonicalization.
        if record.content == address {
            tracing::info!(
                "{} {} already current ({})",
                record.record_type,
                record.name,
                address
            );
            return RecordOutcome::SkippedNoOp;
        }

        match self.provider.update_record(zone_id, record, address).await {
            Ok(UpdateOutcome::Updated) => {
                tracing::info!(
                    "{} {} updated: {} -> {}",
                    record.record_type,
                    record.name,
                    record.content,
                    address
                );
                RecordOutcome::Updated {
                    previous: record.content.clone(),
                    current: address.to_string(),
                }
            }
            Ok(UpdateOutcome::Rejected { errors, messages }) => {
                tracing::warn!(
                    "{} {} update rejected: {:?} {:?}",
                    record.record_type,
                    record.name,
                    errors,
                    messages
                );
                RecordOutcome::Rejected { errors, messages }
            }
            Err(e) => {
                tracing::warn!("{} {} update failed: {}", record.record_type, record.name, e);
                RecordOutcome::Failed(e.to_string())
            }
        }
    }
}
