//! Persisted configuration store with atomic snapshot semantics.

use crate::config::{Config, ConfigUpdate, legacy};
use crate::db::Database;
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Validated extraction settings backed by the settings table
///
/// Readers take cheap `Arc<Config>` snapshots; [`update`](Self::update)
/// persists first and swaps the snapshot only after the write succeeds, so a
/// half-applied configuration is never observable.
pub struct ConfigStore {
    db: Arc<Database>,
    current: RwLock<Arc<Config>>,
}

impl ConfigStore {
    /// Load the configuration from the database
    ///
    /// An empty settings table means first startup and yields the defaults
    /// (which are persisted so later sessions see an explicit record).
    /// Corrupt stored values are reported as a warning and replaced with
    /// defaults; startup never fails on bad settings.
    pub async fn load(db: Arc<Database>) -> Result<Self> {
        let settings = db.load_settings().await?;

        let config = if settings.is_empty() {
            let defaults = Config::default();
            db.save_settings(&legacy::to_settings(&defaults)).await?;
            info!("no persisted configuration found, wrote defaults");
            defaults
        } else {
            match legacy::from_settings(&settings) {
                Ok(config) => config.normalized(),
                Err(e) => {
                    warn!(error = %e, "substituting default configuration");
                    Config::default()
                }
            }
        };

        Ok(Self {
            db,
            current: RwLock::new(Arc::new(config)),
        })
    }

    /// Get the current configuration snapshot
    pub async fn current(&self) -> Arc<Config> {
        self.current.read().await.clone()
    }

    /// Apply a partial update
    ///
    /// Merges the update into the current configuration, normalizes
    /// out-of-range values, validates, persists, and finally swaps the
    /// snapshot. On any error the previous snapshot stays in effect.
    pub async fn update(&self, update: ConfigUpdate) -> Result<Arc<Config>> {
        let mut guard = self.current.write().await;

        let candidate = guard.apply(&update);
        candidate.validate()?;
        let candidate = candidate.normalized();

        self.db
            .save_settings(&legacy::to_settings(&candidate))
            .await?;

        let next = Arc::new(candidate);
        *guard = next.clone();
        info!("configuration updated");
        Ok(next)
    }
}
