//! Configuration for store backends

use serde::{Deserialize, Serialize};

/// Which store the cache talks to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-process store (single instance, tests and development)
    Memory,

    /// Redis server
    Redis(RedisConfig),
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Redis(RedisConfig::default())
    }
}

/// Redis connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Server host
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Password sent with AUTH on connect
    #[serde(default)]
    pub pass: Option<String>,

    /// Logical database index
    #[serde(default)]
    pub db: i64,

    /// Full connection URL; overrides host, port, pass and db
    #[serde(default)]
    pub url: Option<String>,

    /// Return values as raw bytes
    ///
    /// Compressed bodies are binary, so this is forced on by
    /// [`RedisConfig::normalized`] whatever the configuration says.
    #[serde(default = "default_detect_buffers")]
    pub detect_buffers: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            pass: None,
            db: 0,
            url: None,
            detect_buffers: true,
        }
    }
}

impl RedisConfig {
    /// Copy of this configuration with the binary-safe flag forced on
    pub fn normalized(&self) -> Self {
        Self {
            detect_buffers: true,
            ..self.clone()
        }
    }

    /// Connection URL for the redis client
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        match &self.pass {
            Some(pass) => format!("redis://:{}@{}:{}/{}", pass, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }

    /// Address for log lines, never includes the password
    pub fn display_addr(&self) -> String {
        match &self.url {
            Some(_) => "<url>".to_string(),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_detect_buffers() -> bool {
    true
}
