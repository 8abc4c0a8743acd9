//! Tracks the app version last seen on this device.
//!
//! The record lives in `appSettings` under the id `version`. A differing
//! stored version means an update was installed since the last check; the
//! record is then rewritten to the running version.

use crate::collection::Collection;
use crate::error::StorageResult;
use crate::store::{PersistentStore, StoreExt};
use chrono::Utc;
use kramar_types::AppVersion;
use std::sync::Arc;
use tracing::{info, warn};

/// Id of the version record in `appSettings`.
pub const VERSION_RECORD_ID: &str = "version";

/// Compares the running version against the stored one.
pub struct VersionTracker {
    store: Arc<dyn PersistentStore>,
}

impl VersionTracker {
    /// Creates a tracker over `store`.
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    /// Returns the stored version record, if any.
    ///
    /// Read failures are logged and reported as "nothing stored".
    pub async fn stored(&self) -> Option<AppVersion> {
        let stored: StorageResult<Option<AppVersion>> = self
            .store
            .get_record(Collection::AppSettings, VERSION_RECORD_ID)
            .await;
        match stored {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to read stored version info: {}", e);
                None
            }
        }
    }

    /// Returns true when `current` differs from the stored version.
    ///
    /// The first check stores `current` and reports no update. A detected
    /// update is recorded right away, so it is reported exactly once.
    pub async fn check_for_update(&self, current: &str, build_date: &str) -> StorageResult<bool> {
        let Some(stored) = self.stored().await else {
            self.write(AppVersion {
                id: VERSION_RECORD_ID.to_string(),
                version: current.to_string(),
                build_date: build_date.to_string(),
                last_checked: Some(Utc::now()),
                update_available: None,
            })
            .await?;
            return Ok(false);
        };

        if stored.version == current {
            return Ok(false);
        }
        info!("App updated from {} to {}", stored.version, current);
        self.write(AppVersion {
            version: current.to_string(),
            build_date: build_date.to_string(),
            last_checked: Some(Utc::now()),
            update_available: Some(false),
            ..stored
        })
        .await?;
        Ok(true)
    }

    async fn write(&self, version: AppVersion) -> StorageResult<()> {
        self.store
            .store_record(Collection::AppSettings, &version)
            .await
    }
}
