//! Activation: reclaim superseded namespaces and start intercepting.

use super::{OfflineWorker, WorkerState};
use crate::error::Result;
use serde::Serialize;
use tracing::{info, warn};

/// Outcome of activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Namespaces deleted because a newer version replaced them.
    pub deleted: Vec<String>,
}

impl OfflineWorker {
    /// Delete namespaces of an owned family whose version is not current,
    /// then begin intercepting requests.
    ///
    /// Namespaces outside the owned families are untouched, as are the
    /// secondary image namespaces read by the image route (they belong to
    /// the bundler's worker even when their name shares a family prefix).
    ///
    /// Cleanup is best-effort: storage failures are logged and the worker
    /// still ends up `Activated`.
    pub async fn activate(&self) -> Result<ActivationReport> {
        self.set_state(WorkerState::Activating);
        info!("Activating - cleaning up old caches...");

        let foreign: Vec<&str> = self
            .config
            .media_images
            .iter()
            .flat_map(|media| media.fallback_namespaces.iter().map(String::as_str))
            .collect();

        let existing = match self.storage.namespaces() {
            Ok(names) => names,
            Err(e) => {
                warn!("Failed to list caches, skipping cleanup: {}", e);
                Vec::new()
            }
        };

        let mut report = ActivationReport::default();
        for name in existing {
            if foreign.contains(&name.as_str()) {
                continue;
            }
            let superseded = self
                .config
                .namespaces
                .all()
                .iter()
                .any(|spec| spec.is_superseded(&name));
            if !superseded {
                continue;
            }

            info!("Deleting old cache: {}", name);
            match self.storage.delete_namespace(&name) {
                Ok(true) => report.deleted.push(name),
                Ok(false) => {}
                Err(e) => warn!("Failed to delete old cache {}: {}", name, e),
            }
        }

        self.set_state(WorkerState::Activated);
        info!("Activated, intercepting requests");
        Ok(report)
    }
}
