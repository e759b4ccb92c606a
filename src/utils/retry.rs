//! 重试工具
//!
//! 只重试 [`AppError::is_retryable`](crate::error::AppError::is_retryable) 为真的错误，每次等待时间翻倍。

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::error::AppResult;

/// 重试策略
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 最多尝试次数（含第一次）
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: 2,
        }
    }

    /// 第 `attempt` 次失败后的等待时间（attempt 从 1 开始）
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// 执行 `op`，可重试的错误按策略重试
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_after(attempt);
                warn!(
                    "{} 失败 (尝试 {}/{}): {}，{:?} 后重试...",
                    label, attempt, policy.max_attempts, e, delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 1 {
                    warn!("{} 已尝试 {} 次仍然失败", label, attempt);
                }
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, AppError, ConfigError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn rate_limited() -> AppError {
        AppError::Api(ApiError::RateLimited {
            endpoint: "search".to_string(),
        })
    }

    #[test]
    fn test_delay_doubles() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result = with_retry(&policy, "search", move || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(rate_limited())
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result: AppResult<()> = with_retry(&policy, "search", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(rate_limited())
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_non_retryable_fails_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let result: AppResult<()> = tokio_test::block_on(with_retry(&policy, "config", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::Config(ConfigError::Missing {
                name: "google_cx".to_string(),
            }))
        }));

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
