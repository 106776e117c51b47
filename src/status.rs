//! Read-only view of the provider state for the configured domains.

use crate::detector::AddressSource;
use crate::providers::{DnsProvider, RecordType};
use crate::reconciler::{apex_domain, normalize_domain, RunAborted};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// One record type as it stands and as a run would leave it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordView {
    pub current: Option<String>,
    pub desired: Option<String>,
}

impl RecordView {
    /// Whether `update` would issue a PUT for this record.
    pub fn would_update(&self) -> bool {
        matches!((&self.current, &self.desired), (Some(c), Some(d)) if c != d)
    }
}

impl fmt::Display for RecordView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.current, &self.desired) {
            (None, _) => write!(f, "(no record)"),
            (Some(current), _) if self.would_update() => write!(
                f,
                "{} (would update to {})",
                current,
                self.desired.as_deref().unwrap_or_default()
            ),
            (Some(current), _) => write!(f, "{}", current),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainState {
    Found {
        zone: String,
        a: RecordView,
        aaaa: RecordView,
    },
    NotManaged {
        apex: String,
    },
    InvalidDomain,
    LookupFailed(String),
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
    pub domains: Vec<(String, DomainState)>,
    pub aborted: Option<RunAborted>,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ipv4 {
            Some(ip) => writeln!(f, "Current IPv4: {}", ip)?,
            None => writeln!(f, "Current IPv4: unavailable")?,
        }
        match self.ipv6 {
            Some(ip) => writeln!(f, "Current IPv6: {}", ip)?,
            None => writeln!(f, "Current IPv6: unavailable")?,
        }

        writeln!(f, "\nDomains:")?;
        writeln!(f, "--------")?;

        for (domain, state) in &self.domains {
            match state {
                DomainState::Found { zone, a, aaaa } => {
                    writeln!(f, "  {} (zone {})", domain, zone)?;
                    writeln!(f, "    A     {}", a)?;
                    writeln!(f, "    AAAA  {}", aaaa)?;
                }
                DomainState::NotManaged { apex } => {
                    writeln!(f, "  {}: not managed by this account ({})", domain, apex)?
                }
                DomainState::InvalidDomain => {
                    writeln!(f, "  {}: not a registrable domain name", domain)?
                }
                DomainState::LookupFailed(reason) => writeln!(f, "  {}: error: {}", domain, reason)?,
            }
        }

        if let Some(aborted) = &self.aborted {
            writeln!(f, "\nAborted: {}", aborted)?;
        }
        Ok(())
    }
}

/// Look up every domain without changing anything.
pub async fn status<S, P>(domains: &[String], source: &S, provider: &P) -> StatusReport
where
    S: AddressSource + ?Sized,
    P: DnsProvider + ?Sized,
{
    let ipv4 = source.discover_ipv4().await;
    let ipv6 = source.discover_ipv6().await;
    let desired_v4 = ipv4.map(|ip| ip.to_string());
    let desired_v6 = ipv6.map(|ip| ip.to_string());

    let mut report = StatusReport {
        ipv4,
        ipv6,
        domains: Vec::with_capacity(domains.len()),
        aborted: None,
    };

    for domain in domains.iter().map(|d| normalize_domain(d)) {
        let Some(apex) = apex_domain(&domain) else {
            report.domains.push((domain.clone(), DomainState::InvalidDomain));
            continue;
        };

        let zone = match provider.find_zone(&apex).await {
            Ok(Some(zone)) => zone,
            Ok(None) => {
                report
                    .domains
                    .push((domain.clone(), DomainState::NotManaged { apex }));
                continue;
            }
            Err(e) if e.is_payload() => {
                report
                    .domains
                    .push((domain.clone(), DomainState::LookupFailed(e.to_string())));
                continue;
            }
            Err(e) => {
                report.aborted = Some(RunAborted {
                    domain: domain.clone(),
                    reason: e.to_string(),
                });
                break;
            }
        };

        let state = match provider.find_records(&zone.id, &domain).await {
            Ok(records) => {
                let view = |record_type: RecordType, desired: &Option<String>| RecordView {
                    current: records.get(record_type).map(|r| r.content.clone()),
                    desired: desired.clone(),
                };
                DomainState::Found {
                    zone: zone.name.clone(),
                    a: view(RecordType::A, &desired_v4),
                    aaaa: view(RecordType::AAAA, &desired_v6),
                }
            }
            Err(e) => DomainState::LookupFailed(e.to_string()),
        };
        report.domains.push((domain, state));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::MockAddressSource;
    use crate::error::DdnsError;
    use crate::providers::{DnsRecord, MockDnsProvider, RecordSet, Zone};
    use mockall::predicate::eq;

    fn source() -> MockAddressSource {
        let mut source = MockAddressSource::new();
        source
            .expect_discover_ipv4()
            .return_const(Some(Ipv4Addr::new(203, 0, 113, 9)));
        source.expect_discover_ipv6().return_const(None::<Ipv6Addr>);
        source
    }

    #[tokio::test]
    async fn test_status_never_updates() {
        let mut provider = MockDnsProvider::new();
        provider.expect_find_zone().returning(|apex| {
            Ok(Some(Zone {
                id: "zone-1".to_string(),
                name: apex.to_string(),
            }))
        });
        provider.expect_find_records().returning(|_, domain| {
            Ok(RecordSet {
                a: Some(DnsRecord {
                    id: "rec-a".to_string(),
                    record_type: RecordType::A,
                    name: domain.to_string(),
                    content: "203.0.113.5".to_string(),
                }),
                aaaa: None,
            })
        });
        provider.expect_update_record().never();

        let report = status(&["home.example.com".to_string()], &source(), &provider).await;

        let DomainState::Found { zone, a, aaaa } = &report.domains[0].1 else {
            panic!("expected a found domain");
        };
        assert_eq!(zone, "example.com");
        assert!(a.would_update());
        assert!(!aaaa.would_update());
        assert!(report
            .to_string()
            .contains("203.0.113.5 (would update to 203.0.113.9)"));
    }

    #[tokio::test]
    async fn test_status_normalizes_domain_before_lookup() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_find_zone()
            .with(eq("example.com"))
            .times(1)
            .returning(|apex| {
                Ok(Some(Zone {
                    id: "zone-1".to_string(),
                    name: apex.to_string(),
                }))
            });
        provider
            .expect_find_records()
            .with(eq("zone-1"), eq("home.example.com"))
            .times(1)
            .returning(|_, domain| {
                Ok(RecordSet {
                    a: Some(DnsRecord {
                        id: "rec-a".to_string(),
                        record_type: RecordType::A,
                        name: domain.to_string(),
                        content: "203.0.113.9".to_string(),
                    }),
                    aaaa: None,
                })
            });

        let report = status(&["Home.Example.com.".to_string()], &source(), &provider).await;

        let (domain, state) = &report.domains[0];
        assert_eq!(domain, "home.example.com");
        let DomainState::Found { a, .. } = state else {
            panic!("expected a found domain, got {:?}", state);
        };
        assert_eq!(a.current.as_deref(), Some("203.0.113.9"));
        assert!(!a.would_update());
    }

    #[tokio::test]
    async fn test_status_unreadable_zone_listing_continues() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_find_zone()
            .with(eq("example.org"))
            .times(1)
            .returning(|_| {
                Err(DdnsError::Provider {
                    provider: "cloudflare".to_string(),
                    message: "unreadable zone listing (HTTP 200 OK)".to_string(),
                })
            });
        provider
            .expect_find_zone()
            .with(eq("example.com"))
            .times(1)
            .returning(|_| Ok(None));

        let domains = vec!["example.org".to_string(), "example.com".to_string()];
        let report = status(&domains, &source(), &provider).await;

        assert!(report.aborted.is_none());
        assert!(matches!(report.domains[0].1, DomainState::LookupFailed(_)));
        assert!(matches!(report.domains[1].1, DomainState::NotManaged { .. }));
    }

    #[tokio::test]
    async fn test_status_stops_on_auth_error() {
        let mut provider = MockDnsProvider::new();
        provider
            .expect_find_zone()
            .times(1)
            .returning(|_| Err(DdnsError::Auth("HTTP 403 Forbidden".to_string())));

        let domains = vec!["example.com".to_string(), "example.org".to_string()];
        let report = status(&domains, &source(), &provider).await;

        assert!(report.domains.is_empty());
        assert!(report.aborted.is_some());
    }
}
