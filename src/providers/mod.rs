//! DNS provider bindings.

mod cloudflare;


pub use cloudflare::CloudflareProvider;

use crate::error::Result;
use async_trait::async_trait;
use std::fmt;

/// Provider authentication, passed through as request headers.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Record types this tool keeps current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    AAAA,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-side zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: String,
    /// Apex domain.
    pub name: String,
}

/// A provider-side A or AAAA record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    pub record_type: RecordType,
    pub name: String,
    pub content: String,
}

/// The records held for one name: at most one of each type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    pub a: Option<DnsRecord>,
    pub aaaa: Option<DnsRecord>,
}

impl RecordSet {
    /// Keep the first record seen per type.
    pub fn from_records(records: impl IntoIterator<Item = DnsRecord>) -> Self {
        let mut set = Self::default();
        for record in records {
            let slot = match record.record_type {
                RecordType::A => &mut set.a,
                RecordType::AAAA => &mut set.aaaa,
            };
            match slot {
                Some(kept) => tracing::warn!(
                    "Duplicate {} record for {} (id {}), keeping {}",
                    record.record_type,
                    record.name,
                    record.id,
                    kept.id
                ),
                None => *slot = Some(record),
            }
        }
        set
    }

    pub fn get(&self, record_type: RecordType) -> Option<&DnsRecord> {
        match record_type {
            RecordType::A => self.a.as_ref(),
            RecordType::AAAA => self.aaaa.as_ref(),
        }
    }
}

/// Result of an update call the provider answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Rejected {
        errors: Vec<String>,
        messages: Vec<String>,
    },
}

/// Zone/record API of a DNS provider.
///
/// `find_zone` distinguishes a missing zone (`Ok(None)`) from credentials the
/// provider refused (`Err(DdnsError::Auth)`) and transport failures
/// (`Err(DdnsError::Network)`).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Look up the zone for an apex domain.
    async fn find_zone(&self, apex: &str) -> Result<Option<Zone>>;

    /// Look up the A/AAAA records for an exact name within a zone.
    async fn find_records(&self, zone_id: &str, domain: &str) -> Result<RecordSet>;

    /// Point `record` at `content`. Type and name are taken from `record`.
    async fn update_record(
        &self,
        zone_id: &str,
        record: &DnsRecord,
        content: &str,
    ) -> Result<UpdateOutcome>;
}
