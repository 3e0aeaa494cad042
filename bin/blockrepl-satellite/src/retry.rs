//! Retry policy for external replication tools

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Outcome of one external command run
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Retries a command while the device reports busy
///
/// Any other failure is returned right away.
#[derive(Debug, Clone, Copy)]
pub struct RetryIfDeviceBusy {
    max_retries: u32,
    delay: Duration,
}

impl RetryIfDeviceBusy {
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Whether a failed run should be attempted again
    pub fn should_retry(&self, retries_so_far: u32, output: &CommandOutput) -> bool {
        !output.success && retries_so_far < self.max_retries && output.stderr.contains("busy")
    }

    /// Run `attempt` until it succeeds, fails for another reason or the
    /// retries are used up; returns the last output
    pub async fn run<F, Fut>(&self, mut attempt: F) -> std::io::Result<CommandOutput>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::io::Result<CommandOutput>>,
    {
        let mut retries = 0;
        loop {
            let output = attempt().await?;
            if !self.should_retry(retries, &output) {
                return Ok(output);
            }
            retries += 1;
            warn!(
                retry = retries,
                max_retries = self.max_retries,
                stderr = %output.stderr.trim(),
                "Device busy, retrying"
            );
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl Default for RetryIfDeviceBusy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn output(success: bool, stderr: &str) -> CommandOutput {
        CommandOutput {
            success,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryIfDeviceBusy::default();
        assert!(policy.should_retry(0, &output(false, "Device is busy")));
        assert!(policy.should_retry(2, &output(false, "busy")));
        assert!(!policy.should_retry(3, &output(false, "busy")));
        assert!(!policy.should_retry(0, &output(false, "no such resource")));
        assert!(!policy.should_retry(0, &output(true, "busy")));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let policy = RetryIfDeviceBusy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(output(false, "State change failed: Device is held open by someone (busy)")) }
            })
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_stops_on_success() {
        let policy = RetryIfDeviceBusy::new(3, Duration::from_millis(1));
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(output(n >= 1, if n >= 1 { "" } else { "busy" })) }
            })
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_other_failures_are_not_retried() {
        let policy = RetryIfDeviceBusy::default();
        let calls = AtomicU32::new(0);
        let result = policy
            .run(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(output(false, "invalid configuration")) }
            })
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
