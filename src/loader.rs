// src/loader.rs
//! Asynchronous guest runtime loading

use crate::runtime::{RuntimeDistribution, RuntimeHandle};
use crate::BridgeError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// What to load and from where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Runtime distribution location (URL or local path)
    pub distribution_url: String,

    /// Extension packages to preload before the handle becomes Ready
    #[serde(default)]
    pub packages: Vec<String>,
}

impl LoaderConfig {
    pub fn new(distribution_url: impl Into<String>) -> Self {
        Self {
            distribution_url: distribution_url.into(),
            packages: Vec::new(),
        }
    }

    pub fn with_package(mut self, name: impl Into<String>) -> Self {
        self.packages.push(name.into());
        self
    }
}

/// Fetches and initializes guest runtimes from a distribution source
pub struct RuntimeLoader {
    distribution: Arc<dyn RuntimeDistribution>,
}

impl RuntimeLoader {
    pub fn new(distribution: Arc<dyn RuntimeDistribution>) -> Self {
        Self { distribution }
    }

    /// Load and initialize a guest runtime.
    ///
    /// Suspends while the distribution is fetched and while preload
    /// packages install; never blocks the caller's scheduler. On
    /// success the returned handle is Ready. On any failure the handle
    /// transitions to Failed, becomes unusable for execution, and the
    /// error is [`BridgeError::Initialization`].
    pub async fn load(&self, config: LoaderConfig) -> Result<RuntimeHandle, BridgeError> {
        let handle = RuntimeHandle::new_loading();

        info!(url = %config.distribution_url, "fetching guest runtime distribution");
        let runtime = match self.distribution.fetch(&config.distribution_url).await {
            Ok(runtime) => runtime,
            Err(e) => {
                handle.mark_failed();
                warn!(url = %config.distribution_url, error = %e, "distribution fetch failed");
                return Err(BridgeError::Initialization {
                    reason: format!("distribution fetch failed: {}", e),
                });
            }
        };
        handle.install(runtime);

        for name in &config.packages {
            if let Err(e) = handle.preload_package(name).await {
                handle.mark_failed();
                return Err(match e {
                    BridgeError::Initialization { .. } => e,
                    other => BridgeError::Initialization {
                        reason: other.to_string(),
                    },
                });
            }
        }

        handle.mark_ready();
        Ok(handle)
    }
}
