// ABOUTME: Bounded exponential backoff for StoreError, applied by the caller rather
// ABOUTME: than the store itself: the store only reports failure.
use codegraph_core::{CodeGraphError, Result, StoreRetryConfig};
use std::future::Future;
use tracing::warn;

pub async fn with_retry<T, F, Fut>(config: &StoreRetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut delay_ms = config.base_delay_ms;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= config.max_attempts {
                    return Err(CodeGraphError::StoreError(format!(
                        "exhausted {attempt} attempt(s): {err}"
                    )));
                }
                warn!("store operation failed (attempt {attempt}/{}): {err}", config.max_attempts);
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                delay_ms = (delay_ms * 2).min(config.max_delay_ms);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_works() {
        let config = StoreRetryConfig { max_attempts: 3, base_delay_ms: 1, max_delay_ms: 2 };
        let result: Result<u32> = with_retry(&config, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let config = StoreRetryConfig { max_attempts: 5, base_delay_ms: 1, max_delay_ms: 2 };
        let calls = AtomicU32::new(0);
        let result: Result<u32> = with_retry(&config, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CodeGraphError::StoreError("transient".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let config = StoreRetryConfig { max_attempts: 2, base_delay_ms: 1, max_delay_ms: 2 };
        let result: Result<u32> = with_retry(&config, || async {
            Err(CodeGraphError::StoreError("down".into()))
        })
        .await;
        assert!(result.is_err());
    }
}
