use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;

use stockrecon_core::{ConfigurationError, ReconError};
use stockrecon_infra::config::ReconcileConfig;
use stockrecon_infra::remote::RecordStore;
use stockrecon_infra::{RunOptions, RunReport, StockReconciler};

/// Why a trigger did not produce a report.
#[derive(Debug)]
pub enum TriggerError {
    /// Another pass holds the run lock.
    Busy,
    Failed(ReconError),
}

/// State shared by every handler.
pub struct AppServices {
    reconciler: StockReconciler<Arc<dyn RecordStore>>,
    running: Mutex<()>,
    last: RwLock<Option<RunReport>>,
}

impl AppServices {
    pub fn new(
        remote: Arc<dyn RecordStore>,
        config: ReconcileConfig,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            reconciler: StockReconciler::new(remote, config)?,
            running: Mutex::new(()),
            last: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &ReconcileConfig {
        self.reconciler.config()
    }

    /// Run one pass unless one is already running.
    ///
    /// Passes never overlap: the lock is only tried, never waited on.
    pub async fn trigger(&self, options: RunOptions) -> Result<RunReport, TriggerError> {
        let _guard = self.running.try_lock().map_err(|_| TriggerError::Busy)?;

        let report = self
            .reconciler
            .run_with(options)
            .await
            .map_err(TriggerError::Failed)?;

        if let Ok(mut last) = self.last.write() {
            *last = Some(report.clone());
        }
        Ok(report)
    }

    /// Report of the most recent successful pass.
    pub fn last_report(&self) -> Option<RunReport> {
        self.last.read().ok().and_then(|last| last.clone())
    }

    pub fn is_running(&self) -> bool {
        self.running.try_lock().is_err()
    }
}
