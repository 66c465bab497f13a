//! Publish-and-swap holder for the active [`CompiledConfig`].
//!
//! Readers take an `Arc` snapshot and keep it for the whole call, so a
//! concurrent publish never changes the configuration under an in-flight
//! extraction. A failed compile leaves the active snapshot untouched.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::{CompiledConfig, ConfigSource};
use crate::error::ConfigError;

struct Published {
    epoch: u64,
    config: Arc<CompiledConfig>,
}

pub struct ConfigRegistry {
    current: RwLock<Published>,
}

impl ConfigRegistry {
    pub fn new(config: CompiledConfig) -> Self {
        Self {
            current: RwLock::new(Published {
                epoch: 0,
                config: Arc::new(config),
            }),
        }
    }

    /// Compile `source` and hold it as epoch 0.
    pub fn from_source(source: &ConfigSource) -> Result<Self, ConfigError> {
        Ok(Self::new(CompiledConfig::compile(source)?))
    }

    /// The configuration new calls should use.
    pub fn snapshot(&self) -> Arc<CompiledConfig> {
        Arc::clone(&self.current.read().config)
    }

    /// Number of successful publishes since construction.
    pub fn epoch(&self) -> u64 {
        self.current.read().epoch
    }

    /// Compile and atomically publish a new configuration.
    ///
    /// Compilation happens outside the lock; only the pointer swap is
    /// guarded.
    pub fn publish(&self, source: &ConfigSource) -> Result<Arc<CompiledConfig>, ConfigError> {
        let compiled = match CompiledConfig::compile(source) {
            Ok(compiled) => Arc::new(compiled),
            Err(e) => {
                warn!(error = %e, epoch = self.epoch(), "rejected configuration; keeping active snapshot");
                return Err(e);
            }
        };

        let epoch = {
            let mut current = self.current.write();
            current.epoch += 1;
            current.config = Arc::clone(&compiled);
            current.epoch
        };
        info!(epoch, "published entity configuration");
        Ok(compiled)
    }
}
