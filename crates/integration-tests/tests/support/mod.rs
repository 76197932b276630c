#![allow(dead_code)]

pub mod backend_mock;

use std::time::Duration;

use backend_mock::{BackendState, SharedBackendState};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves once `condition` holds for the mock backend's state; panics after
/// a few seconds.
pub async fn wait_until<F>(state: &SharedBackendState, condition: F)
where
    F: Fn(&BackendState) -> bool,
{
    let waited = tokio::time::timeout(WAIT_TIMEOUT, async {
        loop {
            if condition(&*state.lock().await) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "mock backend condition not reached in time");
}
