use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded retry over a fallible async operation. The operation receives the
/// 1-based attempt number. Errors for which `is_retryable` returns false are
/// returned immediately; otherwise the last error is returned once the
/// attempt budget is spent.
pub async fn retry<T, E, F, Fut>(
    max_attempts: u32,
    backoff: Duration,
    is_retryable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retryable(&err) || attempt >= max_attempts {
                    return Err(err);
                }
                warn!("Attempt {}/{} failed: {}", attempt, max_attempts, err);
                if !backoff.is_zero() {
                    tokio::time::sleep(backoff).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = retry(3, Duration::ZERO, |_| true, |attempt| {
            calls.set(calls.get() + 1);
            async move { Ok(attempt) }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let result: Result<u32, String> = retry(3, Duration::ZERO, |_| true, |attempt| async move {
            if attempt < 3 {
                Err(format!("fail {}", attempt))
            } else {
                Ok(attempt)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_exhausts_budget() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = retry(3, Duration::ZERO, |_| true, |attempt| {
            calls.set(calls.get() + 1);
            async move { Err(format!("fail {}", attempt)) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "fail 3");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_returns_immediately() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = retry(
            5,
            Duration::ZERO,
            |e: &String| e.starts_with("soft"),
            |_| {
                calls.set(calls.get() + 1);
                async move { Err("hard failure".to_string()) }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }
}
