//! Configuration for the compression cache

use crate::codec::{CodecOptions, MethodRegistry};
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use warnish_core::{Error, Result};
use warnish_store::StoreConfig;

/// Compression cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Namespace of every store key
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Lifetime of newly created entries, in seconds
    #[serde(default = "default_cache_expires", rename = "cache_expires")]
    pub cache_expires_secs: u64,

    /// HTTP methods whose responses are compressed but never cached
    #[serde(default = "default_ignore_verbs")]
    pub ignore_verbs: Vec<String>,

    /// Registered compression methods, in negotiation order
    #[serde(default = "default_methods")]
    pub methods: Vec<String>,

    /// Codec parameters
    #[serde(default)]
    pub codec: CodecOptions,

    /// Store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Value stamped into X-Powered-By
    #[serde(default = "default_powered_by")]
    pub powered_by: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            cache_expires_secs: default_cache_expires(),
            ignore_verbs: default_ignore_verbs(),
            methods: default_methods(),
            codec: CodecOptions::default(),
            store: StoreConfig::default(),
            powered_by: default_powered_by(),
        }
    }
}

fn default_prefix() -> String {
    "warnish".to_string()
}

fn default_cache_expires() -> u64 {
    3600
}

fn default_ignore_verbs() -> Vec<String> {
    ["PUT", "DELETE", "HEAD", "POST"]
        .iter()
        .map(|v| v.to_string())
        .collect()
}

fn default_methods() -> Vec<String> {
    vec!["gzip".to_string(), "deflate".to_string()]
}

fn default_powered_by() -> String {
    "Warnish".to_string()
}

impl CacheConfig {
    /// Time-to-live of newly created entries
    pub fn cache_expires(&self) -> Duration {
        Duration::from_secs(self.cache_expires_secs)
    }

    /// Ignored verbs, uppercased
    pub fn normalized_ignore_verbs(&self) -> HashSet<String> {
        self.ignore_verbs
            .iter()
            .map(|v| v.trim().to_ascii_uppercase())
            .filter(|v| !v.is_empty())
            .collect()
    }

    /// Method table for [`CacheConfig::methods`]
    pub fn registry(&self) -> Result<MethodRegistry> {
        MethodRegistry::from_names(&self.methods)
    }

    /// Check the configuration before any filter is built
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(Error::Config("prefix must not be empty".to_string()));
        }
        if self.cache_expires_secs == 0 {
            return Err(Error::Config(
                "cache_expires must be at least one second".to_string(),
            ));
        }
        if self.methods.is_empty() {
            return Err(Error::Config(
                "at least one compression method is required".to_string(),
            ));
        }
        if HeaderValue::from_str(&self.powered_by).is_err() {
            return Err(Error::Config(format!(
                "powered_by is not a valid header value: {:?}",
                self.powered_by
            )));
        }

        self.codec.validate()?;
        self.registry()?;

        Ok(())
    }
}
