//! Scoped volume override: raise every channel to maximum for the duration of
//! an alarm episode and put the captured levels back afterwards.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::volume::{SetReport, VolumeControl, VolumeSnapshot};

/// Holds the snapshot taken on entry until it has been restored.
///
/// Prefer [`VolumeOverrideScope::run`], which restores on every exit path of
/// the body: success, error, cancellation and panic. If a scope is dropped
/// without [`exit`](Self::exit) (its future was dropped mid-episode), the
/// restore is handed to the runtime instead.
pub struct VolumeOverrideScope {
    control: Arc<dyn VolumeControl>,
    snapshot: Option<VolumeSnapshot>,
}

impl VolumeOverrideScope {
    /// Capture the current levels and raise every channel to its maximum.
    ///
    /// A failed query means nothing was changed and no scope exists.
    pub async fn enter(control: Arc<dyn VolumeControl>) -> Result<Self> {
        let snapshot = control.get().await?;
        // Armed before the raise so a partially applied raise is still undone.
        let scope = Self {
            control,
            snapshot: Some(snapshot),
        };
        if let Some(snapshot) = &scope.snapshot {
            let report = scope.control.set(&snapshot.maximized()).await;
            debug!(
                applied = report.applied,
                failed = report.failed.len(),
                "Raised volume to maximum"
            );
        }
        Ok(scope)
    }

    /// Restore the captured levels. Runs at most once per scope.
    pub async fn exit(mut self) -> SetReport {
        match self.snapshot.take() {
            Some(snapshot) => restore(self.control.as_ref(), &snapshot).await,
            None => SetReport::default(),
        }
    }

    /// Run `body` with volume overridden, restoring before its result (or
    /// panic) propagates.
    pub async fn run<F, T>(control: Arc<dyn VolumeControl>, body: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let scope = Self::enter(control).await?;
        let outcome = AssertUnwindSafe(body).catch_unwind().await;
        scope.exit().await;
        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

async fn restore(control: &dyn VolumeControl, snapshot: &VolumeSnapshot) -> SetReport {
    let report = control.set(&snapshot.baseline()).await;
    if report.is_complete() {
        info!(channels = report.applied, "Restored volume");
    } else {
        warn!(
            applied = report.applied,
            failed = ?report.failed,
            "Volume only partially restored"
        );
    }
    report
}

impl Drop for VolumeOverrideScope {
    fn drop(&mut self) {
        let Some(snapshot) = self.snapshot.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Volume override dropped before exit, restoring in background");
                let control = Arc::clone(&self.control);
                handle.spawn(async move {
                    restore(control.as_ref(), &snapshot).await;
                });
            }
            Err(_) => error!("Volume override dropped outside a runtime, volume not restored"),
        }
    }
}
