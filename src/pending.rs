//! Handle for a command that runs while the caller does other work

use anyhow::{anyhow, Context, Result};
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::rpc::RpcError;

enum CallState<T> {
    InFlight(JoinHandle<Result<T, RpcError>>),
    Done(T),
    Failed,
}

/// An in-flight asynchronous command
///
/// The call starts running as soon as the handle is created, but it only
/// counts as complete once [`join`](Self::join) has been awaited.
pub struct PendingCall<T> {
    label: &'static str,
    state: CallState<T>,
}

impl<T> PendingCall<T>
where
    T: Clone + Send + 'static,
{
    /// Start `call` on the runtime
    pub fn spawn<F>(label: &'static str, call: F) -> Self
    where
        F: Future<Output = Result<T, RpcError>> + Send + 'static,
    {
        debug!("Started {}", label);
        Self {
            label,
            state: CallState::InFlight(tokio::spawn(call)),
        }
    }

    /// True only after a successful [`join`](Self::join)
    pub fn is_complete(&self) -> bool {
        matches!(self.state, CallState::Done(_))
    }

    /// Wait for the call to finish; later joins return the same result
    pub async fn join(&mut self) -> Result<T> {
        let handle = match &mut self.state {
            CallState::Done(value) => return Ok(value.clone()),
            CallState::Failed => return Err(anyhow!("{} already failed", self.label)),
            CallState::InFlight(handle) => handle,
        };

        let outcome = handle.await;
        match outcome {
            Ok(Ok(value)) => {
                debug!("Joined {}", self.label);
                self.state = CallState::Done(value.clone());
                Ok(value)
            }
            Ok(Err(e)) => {
                self.state = CallState::Failed;
                Err(e).with_context(|| format!("{} failed", self.label))
            }
            Err(e) => {
                self.state = CallState::Failed;
                Err(anyhow!("{} task did not finish: {}", self.label, e))
            }
        }
    }
}

impl<T> Drop for PendingCall<T> {
    fn drop(&mut self) {
        if matches!(self.state, CallState::InFlight(_)) {
            warn!("{} dropped without being joined", self.label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_not_complete_until_joined() {
        let mut call = PendingCall::spawn("takeoff", async { Ok(true) });

        // Let the task run to completion before anyone joins
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!call.is_complete());

        assert!(call.join().await.expect("join failed"));
        assert!(call.is_complete());
    }

    #[tokio::test]
    async fn test_second_join_returns_cached_value() {
        let mut call = PendingCall::spawn("land", async { Ok(7u32) });
        assert_eq!(call.join().await.expect("join failed"), 7);
        assert_eq!(call.join().await.expect("join failed"), 7);
    }

    #[tokio::test]
    async fn test_failed_call_never_completes() {
        let mut call: PendingCall<bool> = PendingCall::spawn("takeoff", async {
            Err(RpcError::Disconnected("multirotor".into()))
        });

        let err = call.join().await.expect_err("join should fail");
        assert!(err.to_string().contains("takeoff failed"));
        assert!(!call.is_complete());
        assert!(call.join().await.is_err());
    }

    #[tokio::test]
    async fn test_join_waits_for_slow_call() {
        let mut call = PendingCall::spawn("hover", async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(true)
        });
        assert!(!call.is_complete());
        assert!(call.join().await.expect("join failed"));
    }
}
