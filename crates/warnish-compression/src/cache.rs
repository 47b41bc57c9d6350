//! Building the filter pair

use crate::codec::MethodRegistry;
use crate::config::CacheConfig;
use crate::reader::AccelerateMiddleware;
use crate::writer::{CompressMiddleware, RequestHead, ResponseFilter};
use http::response::Parts;
use http::Method;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use warnish_core::{Error, Middleware, Result};
use warnish_store::CacheStore;

/// State resolved once and shared by both filters
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: CacheConfig,
    pub(crate) registry: MethodRegistry,
    pub(crate) store: Arc<dyn CacheStore>,
    ignore_verbs: HashSet<String>,
}

impl Shared {
    pub(crate) fn is_ignored_verb(&self, method: &Method) -> bool {
        self.ignore_verbs
            .contains(&method.as_str().to_ascii_uppercase())
    }
}

/// The compress/accelerate filter pair sharing one store
#[derive(Debug, Clone)]
pub struct Warnish {
    accelerate: Arc<AccelerateMiddleware>,
    compress: Arc<CompressMiddleware>,
}

impl Warnish {
    /// Start building from `config`
    pub fn builder(config: CacheConfig) -> WarnishBuilder {
        WarnishBuilder {
            config,
            client: None,
            filter: None,
            registry: None,
        }
    }

    /// The cache-read filter
    pub fn accelerate(&self) -> Arc<dyn Middleware> {
        self.accelerate.clone()
    }

    /// The compress-and-cache-write filter
    pub fn compress(&self) -> Arc<dyn Middleware> {
        self.compress.clone()
    }

    /// Both filters in pipeline order: accelerate, then compress
    pub fn layers(&self) -> Vec<Arc<dyn Middleware>> {
        vec![self.accelerate(), self.compress()]
    }
}

/// Builder for [`Warnish`]
pub struct WarnishBuilder {
    config: CacheConfig,
    client: Option<Arc<dyn CacheStore>>,
    filter: Option<ResponseFilter>,
    registry: Option<MethodRegistry>,
}

impl WarnishBuilder {
    /// Use an existing store client instead of connecting from `config.store`
    pub fn client(mut self, client: Arc<dyn CacheStore>) -> Self {
        self.client = Some(client);
        self
    }

    /// Only compress responses for which `filter` returns true
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&RequestHead, &Parts) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// Replace the method table built from `config.methods`
    pub fn registry(mut self, registry: MethodRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Validate the configuration and resolve the store
    ///
    /// Without a client the store is connected here, and a connection
    /// failure is returned as [`Error::StoreConnection`].
    pub async fn build(self) -> Result<Warnish> {
        self.config.validate()?;

        let registry = match self.registry {
            Some(registry) if registry.is_empty() => {
                return Err(Error::Config(
                    "at least one compression method is required".to_string(),
                ))
            }
            Some(registry) => registry,
            None => self.config.registry()?,
        };

        let store = match self.client {
            Some(client) => {
                info!("Using caller-supplied cache store client");
                client
            }
            None => warnish_store::connect(&self.config.store)
                .await
                .map_err(|e| Error::StoreConnection(e.to_string()))?,
        };

        let shared = Arc::new(Shared {
            ignore_verbs: self.config.normalized_ignore_verbs(),
            config: self.config,
            registry,
            store,
        });

        Ok(Warnish {
            accelerate: Arc::new(AccelerateMiddleware::new(Arc::clone(&shared))),
            compress: Arc::new(CompressMiddleware::new(shared, self.filter)),
        })
    }
}

impl fmt::Debug for WarnishBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarnishBuilder")
            .field("config", &self.config)
            .field("client", &self.client)
            .field("filter", &self.filter.is_some())
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warnish_store::{InMemoryStore, StoreConfig};

    #[tokio::test]
    async fn test_build_with_client() {
        let warnish = Warnish::builder(CacheConfig::default())
            .client(Arc::new(InMemoryStore::new()))
            .build()
            .await
            .unwrap();
        assert_eq!(warnish.layers().len(), 2);
    }

    #[tokio::test]
    async fn test_build_with_memory_store() {
        let config = CacheConfig {
            store: StoreConfig::Memory,
            ..Default::default()
        };
        assert!(Warnish::builder(config).build().await.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = CacheConfig {
            methods: vec!["compress".to_string()],
            ..Default::default()
        };
        let result = Warnish::builder(config)
            .client(Arc::new(InMemoryStore::new()))
            .build()
            .await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_empty_registry_rejected() {
        let result = Warnish::builder(CacheConfig::default())
            .client(Arc::new(InMemoryStore::new()))
            .registry(MethodRegistry::new())
            .build()
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_ignored_verbs() {
        let shared = Shared {
            config: CacheConfig::default(),
            registry: MethodRegistry::standard(),
            store: Arc::new(InMemoryStore::new()),
            ignore_verbs: CacheConfig::default().normalized_ignore_verbs(),
        };
        assert!(shared.is_ignored_verb(&Method::POST));
        assert!(shared.is_ignored_verb(&Method::from_bytes(b"delete").unwrap()));
        assert!(!shared.is_ignored_verb(&Method::GET));
    }
}
