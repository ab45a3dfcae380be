//! Waiting on asynchronous hypervisor tasks.

use crate::api::ProgressApi;
use crate::error::{VBoxError, VBoxResult};
use log::{debug, warn};
use std::time::Duration;

/// How long a progress wait may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitTimeout {
    Indefinite,
    After(Duration),
}

impl WaitTimeout {
    /// `None` (the default configuration) waits forever.
    pub fn from_millis(ms: Option<u64>) -> Self {
        match ms {
            Some(ms) => Self::After(Duration::from_millis(ms)),
            None => Self::Indefinite,
        }
    }

    /// Value handed to `waitForCompletion`; `-1` means no limit.
    pub fn as_api_millis(&self) -> i64 {
        match self {
            Self::Indefinite => -1,
            Self::After(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        }
    }
}

impl Default for WaitTimeout {
    fn default() -> Self {
        Self::Indefinite
    }
}

/// Tracks one progress handle to completion.
pub struct ProgressTracker;

impl ProgressTracker {
    /// Wait for `progress` and turn its outcome into a result.
    ///
    /// A completed task succeeds when its result code is `0` or not exposed at
    /// all; any other code fails with `HypervisorTaskFailed`, even if the wait
    /// call itself reported an error. An incomplete task surfaces the wait
    /// error if there was one, `Timeout` otherwise.
    pub async fn wait(
        progress: &dyn ProgressApi,
        timeout: WaitTimeout,
        operation: &str,
    ) -> VBoxResult<()> {
        debug!(
            "Waiting on '{}' ({}), timeout {:?}",
            operation,
            progress.description(),
            timeout
        );

        let waited = match timeout {
            WaitTimeout::Indefinite => progress.wait_for_completion(-1).await,
            WaitTimeout::After(limit) => {
                match tokio::time::timeout(
                    limit,
                    progress.wait_for_completion(timeout.as_api_millis()),
                )
                .await
                {
                    Ok(r) => r,
                    Err(_) => Err(VBoxError::timeout(operation)),
                }
            }
        };

        let completed = match progress.completed().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Could not read completion of '{}': {}", operation, e);
                false
            }
        };

        if !completed {
            waited?;
            return Err(VBoxError::timeout(operation));
        }

        if let Err(e) = &waited {
            debug!("'{}' completed despite wait error: {}", operation, e);
        }

        match progress.result_code().await? {
            None | Some(0) => {
                debug!("'{}' completed", operation);
                Ok(())
            }
            Some(code) => {
                warn!("'{}' failed with result code {:#x}", operation, code);
                Err(VBoxError::task_failed(code))
            }
        }
    }
}
