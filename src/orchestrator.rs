//! One update run over the configured domains.

use crate::detector::AddressSource;
use crate::providers::DnsProvider;
use crate::reconciler::{DesiredState, DomainReport, DomainStatus, Reconciler, RunAborted};
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Aggregated outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    /// Domains processed, in configuration order.
    pub domains: Vec<DomainReport>,
    /// Set when the run stopped early on a zone-listing failure.
    pub aborted: Option<RunAborted>,
    /// Domains left unprocessed because of the abort.
    pub not_processed: usize,
}

impl RunReport {
    pub fn updated_count(&self) -> usize {
        self.domains
            .iter()
            .filter_map(DomainReport::outcomes)
            .flatten()
            .filter(|(_, outcome)| outcome.is_update())
            .count()
    }

    /// Domains or records that could not be brought up to date.
    pub fn failed_count(&self) -> usize {
        self.domains
            .iter()
            .map(|report| match &report.status {
                DomainStatus::Reconciled { a, aaaa } => {
                    usize::from(a.is_failure()) + usize::from(aaaa.is_failure())
                }
                _ => 1,
            })
            .sum::<usize>()
            + usize::from(self.aborted.is_some())
    }
}

fn fmt_addr<T: fmt::Display>(addr: &Option<T>) -> String {
    addr.as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unavailable".to_string())
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.started_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "IPv4: {}", fmt_addr(&self.ipv4))?;
        writeln!(f, "IPv6: {}", fmt_addr(&self.ipv6))?;
        writeln!(f)?;

        for report in &self.domains {
            match &report.status {
                DomainStatus::Reconciled { a, aaaa } => {
                    writeln!(f, "{}", report.domain)?;
                    writeln!(f, "  A     {}", a)?;
                    writeln!(f, "  AAAA  {}", aaaa)?;
                }
                DomainStatus::NotManaged { apex } => writeln!(
                    f,
                    "{}: domain not managed by this account (zone {} not found)",
                    report.domain, apex
                )?,
                DomainStatus::InvalidDomain => {
                    writeln!(f, "{}: not a registrable domain name", report.domain)?
                }
                DomainStatus::LookupFailed(reason) => {
                    writeln!(f, "{}: record lookup failed: {}", report.domain, reason)?
                }
            }
        }

        if let Some(aborted) = &self.aborted {
            writeln!(f)?;
            writeln!(f, "Aborted: {}", aborted)?;
            writeln!(
                f,
                "Check the email and API key in your configuration ({} domain(s) not processed)",
                self.not_processed
            )?;
        }

        writeln!(f)?;
        write!(
            f,
            "{} record(s) updated, {} failure(s)",
            self.updated_count(),
            self.failed_count()
        )
    }
}

/// Discover addresses once, then reconcile each domain in order. A
/// zone-listing failure stops the run; every other failure is local to its
/// domain or record.
pub async fn run<S, P>(domains: &[String], source: &S, provider: &P) -> RunReport
where
    S: AddressSource + ?Sized,
    P: DnsProvider + ?Sized,
{
    let started_at = Utc::now();
    let ipv4 = source.discover_ipv4().await;
    let ipv6 = source.discover_ipv6().await;

    tracing::info!(
        "Starting run for {} domain(s), IPv4 {}, IPv6 {}",
        domains.len(),
        fmt_addr(&ipv4),
        fmt_addr(&ipv6)
    );

    let reconciler = Reconciler::new(provider);
    let mut reports = Vec::with_capacity(domains.len());
    let mut aborted = None;
    let mut not_processed = 0;

    for (index, domain) in domains.iter().enumerate() {
        let desired = DesiredState {
            domain: domain.clone(),
            ipv4: ipv4.map(|ip| ip.to_string()),
            ipv6: ipv6.map(|ip| ip.to_string()),
        };

        match reconciler.reconcile(&desired).await {
            Ok(report) => reports.push(report),
            Err(abort) => {
                not_processed = domains.len() - index - 1;
                aborted = Some(abort);
                break;
            }
        }
    }

    RunReport {
        started_at,
        ipv4,
        ipv6,
        domains: reports,
        aborted,
        not_processed,
    }
}
