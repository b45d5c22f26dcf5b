#[cfg(test)]
#[path = "retry_test.rs"]
mod tests;

use std::future::Future;

use anyhow::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryOutcome {
    pub attempts: u32,
    pub succeeded: bool,
}

/// Bounded retry without backoff. An attempt resolves to `Ok(true)` when it
/// verified, `Ok(false)` when it should be tried again. Errors stop the
/// policy immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        return RetryPolicy { max_attempts: 2 };
    }
}

impl RetryPolicy {
    pub async fn run<F, Fut>(&self, mut op: F) -> Result<RetryOutcome>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<bool>>,
    {
        let mut attempts = 0;
        while attempts < self.max_attempts {
            attempts += 1;
            if op(attempts).await? {
                return Ok(RetryOutcome {
                    attempts,
                    succeeded: true,
                });
            }

            tracing::debug!(attempt = attempts, max = self.max_attempts, "Attempt did not verify");
        }

        return Ok(RetryOutcome {
            attempts,
            succeeded: false,
        });
    }
}
