//! Stack managers
//!
//! hubctl supports two backends:
//! - **Aws**: CloudFormation through the `aws` CLI
//! - **Memory**: in-process stacks with scripted outputs and faults, for tests
//!
//! Every mutating call blocks until the stack reaches a terminal status or the
//! [`WaitPolicy`] deadline passes.

mod aws;
mod memory;

pub use aws::AwsStackManager;
pub use memory::{MemoryStackManager, OperationCounts, StackOperation};

use async_trait::async_trait;
use hubctl_core::{Capability, Stack, StackStatus};
use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use crate::error::{CloudError, Result};

/// Stack parameters, name to value
pub type Parameters = BTreeMap<String, String>;

/// Bounds of a blocking wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl WaitPolicy {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
        }
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_secs(15),
        }
    }
}

/// Provider-agnostic facade over stack creation and deletion
#[async_trait]
pub trait StackManager: Send + Sync {
    /// Create a stack and wait for a terminal status
    ///
    /// Fails with [`CloudError::AlreadyExists`] if the name is taken. A stack
    /// that ends `Failed` is returned, not raised.
    async fn create(
        &self,
        name: &str,
        template_body: &str,
        parameters: &Parameters,
        capabilities: &[Capability],
    ) -> Result<Stack>;

    /// Current state of a stack, [`CloudError::NotFound`] if absent
    async fn describe(&self, name: &str) -> Result<Stack>;

    /// Delete a stack and wait until it is gone; no-op if absent
    async fn delete(&self, name: &str) -> Result<()>;

    /// Wait for a stack an earlier run left in progress
    ///
    /// Returns the first terminal state, `Absent` if the stack went away.
    async fn wait(&self, name: &str) -> Result<Stack>;

    /// Whether a stack occupies `name`
    async fn exists(&self, name: &str) -> Result<bool> {
        match self.describe(name).await {
            Ok(stack) => Ok(stack.status.is_present()),
            Err(CloudError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Poll `probe` until the stack is terminal or `policy.timeout` elapses
pub(crate) async fn wait_until_terminal<F, Fut>(
    name: &str,
    policy: &WaitPolicy,
    mut probe: F,
) -> Result<Stack>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Stack>>,
{
    let started = tokio::time::Instant::now();
    loop {
        let stack = probe().await?;
        if stack.status.is_terminal() {
            return Ok(stack);
        }

        let waited = started.elapsed();
        if waited >= policy.timeout {
            return Err(CloudError::Timeout {
                stack: name.to_string(),
                waited,
                status: stack.status,
            });
        }
        tracing::debug!("stack {} is {}, polling again", name, stack.status);
        tokio::time::sleep(policy.poll_interval.min(policy.timeout - waited)).await;
    }
}

/// Poll `probe` until the stack is gone or `policy.timeout` elapses
///
/// The first polls after a delete request may still report the status the
/// stack had before it, so `Failed` only counts once `Deleting` was seen.
pub(crate) async fn wait_until_deleted<F, Fut>(
    name: &str,
    policy: &WaitPolicy,
    mut probe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Stack>>,
{
    let started = tokio::time::Instant::now();
    let mut deleting_seen = false;
    loop {
        let status = absent_if_missing(name, probe().await)?.status;
        match status {
            StackStatus::Absent | StackStatus::DeleteComplete => return Ok(()),
            StackStatus::Deleting => deleting_seen = true,
            StackStatus::Failed if deleting_seen => return Err(deletion_failed(name)),
            _ => {}
        }

        let waited = started.elapsed();
        if waited >= policy.timeout {
            if status == StackStatus::Failed {
                return Err(deletion_failed(name));
            }
            return Err(CloudError::Timeout {
                stack: name.to_string(),
                waited,
                status,
            });
        }
        tracing::debug!("stack {} is {}, waiting for deletion", name, status);
        tokio::time::sleep(policy.poll_interval.min(policy.timeout - waited)).await;
    }
}

fn deletion_failed(name: &str) -> CloudError {
    CloudError::Provider {
        resource: name.to_string(),
        message: "stack deletion ended in DELETE_FAILED".to_string(),
    }
}

/// Describe that reports a vanished stack as `Absent` instead of an error
pub(crate) fn absent_if_missing(name: &str, described: Result<Stack>) -> Result<Stack> {
    match described {
        Err(CloudError::NotFound { .. }) => Ok(Stack::new(name, StackStatus::Absent)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_returns_first_terminal_status() {
        let polls = AtomicUsize::new(0);
        let policy = WaitPolicy::new(Duration::from_secs(5), Duration::from_millis(1));

        let stack = wait_until_terminal("demo-vpc", &policy, || {
            let n = polls.fetch_add(1, Ordering::SeqCst);
            async move {
                let status = if n < 2 {
                    StackStatus::Creating
                } else {
                    StackStatus::CreateComplete
                };
                Ok::<_, CloudError>(Stack::new("demo-vpc", status))
            }
        })
        .await
        .unwrap();

        assert!(stack.is_complete());
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let policy = WaitPolicy::new(Duration::from_millis(20), Duration::from_millis(5));
        let err = wait_until_terminal("demo-vpc", &policy, || async {
            Ok::<_, CloudError>(Stack::new("demo-vpc", StackStatus::Deleting))
        })
        .await
        .unwrap_err();

        match err {
            CloudError::Timeout { stack, status, .. } => {
                assert_eq!(stack, "demo-vpc");
                assert_eq!(status, StackStatus::Deleting);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    fn scripted(statuses: Vec<StackStatus>) -> impl FnMut() -> std::future::Ready<Result<Stack>> {
        let mut remaining = statuses.into_iter();
        move || {
            let reply = match remaining.next() {
                Some(status) => Ok(Stack::new("demo-vpc", status)),
                None => Err(CloudError::NotFound {
                    name: "demo-vpc".to_string(),
                }),
            };
            std::future::ready(reply)
        }
    }

    #[tokio::test]
    async fn test_deletion_waits_out_stale_statuses() {
        let policy = WaitPolicy::new(Duration::from_secs(5), Duration::from_millis(1));
        wait_until_deleted(
            "demo-vpc",
            &policy,
            scripted(vec![
                StackStatus::CreateComplete,
                StackStatus::Failed,
                StackStatus::Deleting,
            ]),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_deletion_failure_after_deleting() {
        let policy = WaitPolicy::new(Duration::from_secs(5), Duration::from_millis(1));
        let err = wait_until_deleted(
            "demo-vpc",
            &policy,
            scripted(vec![StackStatus::Deleting, StackStatus::Failed]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CloudError::Provider { .. }));
    }

    #[tokio::test]
    async fn test_deletion_of_lingering_stack_times_out() {
        let policy = WaitPolicy::new(Duration::from_millis(20), Duration::from_millis(5));
        let err = wait_until_deleted("demo-vpc", &policy, || async {
            Ok::<_, CloudError>(Stack::new("demo-vpc", StackStatus::CreateComplete))
        })
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            CloudError::Timeout {
                status: StackStatus::CreateComplete,
                ..
            }
        ));
    }
}
