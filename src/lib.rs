//! # cfddns
//!
//! Keeps Cloudflare A/AAAA records pointed at the host's current public
//! addresses.
//!
//! ## Features
//!
//! - IPv4 discovery through an echo service, IPv6 from local interfaces
//! - Public-suffix aware zone lookup (`home.example.co.uk` lives in `example.co.uk`)
//! - Updates only records whose content differs from the discovered address
//! - Best effort over many domains; only rejected credentials stop a run
//!
//! ## Usage
//!
//! ```bash
//! # Store credentials and domains
//! cfddns setup
//!
//! # Update all domains now (run it from cron or a systemd timer)
//! cfddns update
//!
//! # Show current records without changing them
//! cfddns status
//! ```

pub mod config;
pub mod detector;
pub mod error;
pub mod orchestrator;
pub mod providers;
pub mod reconciler;
pub mod status;

pub use config::Config;
pub use detector::{AddressSource, IpDetector};
pub use error::{DdnsError, Result};
pub use orchestrator::{run, RunReport};
pub use providers::{CloudflareProvider, DnsProvider};
pub use reconciler::{DesiredState, Reconciler};
