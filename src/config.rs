//! Configuration management for cfddns.
//!
//! The configuration file is plain `key=value` lines:
//!
//! ```text
//! email=me@example.com
//! api_key=0123456789abcdef
//! domains=example.com,home.example.co.uk
//! ```

use crate::error::{DdnsError, Result};
use crate::providers::Credentials;
use std::path::{Path, PathBuf};

/// Default Cloudflare API root.
pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

/// Default IPv4 echo service. Answers `{"ip":"203.0.113.5"}`.
pub const DEFAULT_IPV4_SERVICE_URL: &str = "https://api.ipify.org?format=json";

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Cloudflare account email.
    pub email: String,

    /// Cloudflare global API key.
    pub api_key: String,

    /// Hostnames to keep current.
    pub domains: Vec<String>,

    /// Provider API root.
    pub api_base_url: String,

    /// IPv4 echo service.
    pub ipv4_service_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email: String::new(),
            api_key: String::new(),
            domains: Vec::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            ipv4_service_url: DEFAULT_IPV4_SERVICE_URL.to_string(),
        }
    }
}

impl Config {
    /// Get the default config file path.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| DdnsError::Config("Could not find config directory".to_string()))?;

        Ok(config_dir.join("cfddns").join("config"))
    }

    /// Parse the `key=value` representation.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config = Self::default();

        for (lineno, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| {
                DdnsError::Config(format!("line {}: expected key=value", lineno + 1))
            })?;
            let value = value.trim();

            match key.trim() {
                "email" => config.email = value.to_string(),
                "api_key" => config.api_key = value.to_string(),
                "domains" => config.domains = parse_domains(value),
                "api_base_url" => config.api_base_url = value.trim_end_matches('/').to_string(),
                "ipv4_service_url" => config.ipv4_service_url = value.to_string(),
                other => tracing::warn!("Ignoring unknown config key {:?}", other),
            }
        }

        Ok(config)
    }

    /// Render the `key=value` representation.
    pub fn to_file_string(&self) -> String {
        let mut out = format!(
            "email={}\napi_key={}\ndomains={}\n",
            self.email,
            self.api_key,
            self.domains.join(",")
        );
        if self.api_base_url != DEFAULT_API_BASE_URL {
            out.push_str(&format!("api_base_url={}\n", self.api_base_url));
        }
        if self.ipv4_service_url != DEFAULT_IPV4_SERVICE_URL {
            out.push_str(&format!("ipv4_service_url={}\n", self.ipv4_service_url));
        }
        out
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DdnsError::Config(format!(
                "{} not found, run `cfddns setup` first",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, self.to_file_string())?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    /// Check that everything a run needs is present.
    pub fn validate(&self) -> Result<()> {
        if self.email.is_empty() {
            return Err(DdnsError::Config("email is not set".to_string()));
        }
        if self.api_key.is_empty() {
            return Err(DdnsError::Config("api_key is not set".to_string()));
        }
        if self.domains.is_empty() {
            return Err(DdnsError::Config("no domains configured".to_string()));
        }
        Ok(())
    }

    /// Provider credentials.
    pub fn credentials(&self) -> Credentials {
        Credentials {
            email: self.email.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

/// Split a comma-delimited domain list into normalized hostnames.
pub fn parse_domains(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|d| d.trim().trim_end_matches('.').to_ascii_lowercase())
        .filter(|d| !d.is_empty())
        .collect()
}
