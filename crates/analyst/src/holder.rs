// Copyright (c) 2025 woxQAQ
//
// Licensed under the MIT License or Apache License 2.0
// See LICENSE files for details

//! # Adapter holder
//!
//! Owns the single active [`DataStoreAdapter`] of the process.
//!
//! The adapter is created on first use. Initialization goes through a
//! [`tokio::sync::OnceCell`], so concurrent first callers wait for one
//! construction instead of racing to build their own. A failed construction
//! leaves the holder empty and the next caller tries again.

use async_trait::async_trait;
use data_analyst_adapter::{
    AdapterError, AdapterResult, ConnectionConfig, DataStoreAdapter, factory,
};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Builds the adapter on first use
#[async_trait]
pub trait AdapterFactory: Send + Sync {
    async fn create(&self) -> AdapterResult<Arc<dyn DataStoreAdapter>>;
}

/// Factory connecting to the engine described by a [`ConnectionConfig`]
#[derive(Debug, Clone)]
pub struct ConfigAdapterFactory {
    config: ConnectionConfig,
}

impl ConfigAdapterFactory {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AdapterFactory for ConfigAdapterFactory {
    async fn create(&self) -> AdapterResult<Arc<dyn DataStoreAdapter>> {
        factory::connect(&self.config).await
    }
}

#[async_trait]
impl<F, Fut> AdapterFactory for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = AdapterResult<Arc<dyn DataStoreAdapter>>> + Send + 'static,
{
    async fn create(&self) -> AdapterResult<Arc<dyn DataStoreAdapter>> {
        (self)().await
    }
}

/// Lazily initialized, shared adapter slot
pub struct AdapterHolder {
    factory: Box<dyn AdapterFactory>,
    adapter: OnceCell<Arc<dyn DataStoreAdapter>>,
}

impl AdapterHolder {
    /// Create an empty holder that builds its adapter with `factory`
    pub fn new(factory: impl AdapterFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            adapter: OnceCell::new(),
        }
    }

    /// Create a holder that connects with `config` on first use
    pub fn from_config(config: ConnectionConfig) -> Self {
        Self::new(ConfigAdapterFactory::new(config))
    }

    /// Create a holder around an adapter that is already open
    pub fn with_adapter(adapter: Arc<dyn DataStoreAdapter>) -> Self {
        let fallback = Arc::clone(&adapter);
        Self {
            factory: Box::new(move || {
                let adapter = Arc::clone(&fallback);
                async move { Ok::<_, AdapterError>(adapter) }
            }),
            adapter: OnceCell::new_with(Some(adapter)),
        }
    }

    /// The active adapter, creating it if this is the first call
    ///
    /// # Errors
    ///
    /// Returns the factory's error. The holder stays empty in that case.
    pub async fn get(&self) -> AdapterResult<Arc<dyn DataStoreAdapter>> {
        let adapter = self
            .adapter
            .get_or_try_init(|| async {
                let adapter = self.factory.create().await?;
                info!(engine = %adapter.engine(), "Data store adapter ready");
                Ok::<_, AdapterError>(adapter)
            })
            .await?;
        Ok(Arc::clone(adapter))
    }

    /// The adapter if it has been created
    pub fn current(&self) -> Option<Arc<dyn DataStoreAdapter>> {
        self.adapter.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.adapter.initialized()
    }

    /// Close the adapter if one was ever created
    ///
    /// Returns whether there was an adapter to close.
    pub async fn shutdown(&self) -> AdapterResult<bool> {
        let Some(adapter) = self.adapter.get() else {
            return Ok(false);
        };

        info!(engine = %adapter.engine(), "Closing data store adapter");
        if let Err(error) = adapter.close().await {
            warn!(%error, "Adapter did not close cleanly");
            return Err(error);
        }
        Ok(true)
    }
}

impl std::fmt::Debug for AdapterHolder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterHolder")
            .field("engine", &self.adapter.get().map(|a| a.engine()))
            .finish()
    }
}
