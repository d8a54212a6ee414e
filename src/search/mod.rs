//! 外部搜尋モジュール
//!
//! 回答 API（1 人 × 1 欄位）と画像搜尋 API の境界トレイト、
//! および一時的な失敗に対する再試行処理。

pub mod perplexity;
pub mod serpapi;

use crate::error::Result;
use exec_cv_common::ImageHit;
use std::future::Future;
use std::time::Duration;

pub use perplexity::PerplexityClient;
pub use serpapi::{SerpApiClient, UsageLedger};

/// 回答 API
#[allow(async_fn_in_trait)]
pub trait AnswerSource {
    /// プロンプトを送り、回答本文を返す
    async fn ask(&self, prompt: &str) -> Result<String>;
}

/// 画像搜尋 API
#[allow(async_fn_in_trait)]
pub trait PhotoSource {
    async fn search_images(&self, query: &str) -> Result<Vec<ImageHit>>;
}

/// 再試行方針
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 初回に加えて再試行する回數
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// 一時的な失敗のみ再試行する
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %e, "transient failure, retrying");
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecCvError;
    use std::cell::Cell;

    fn no_delay(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = Cell::new(0);
        let result = no_delay(1)
            .run(|| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n == 1 {
                        Err(ExecCvError::Timeout("60s".into()))
                    } else {
                        Ok("ok")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_attempted_once() {
        let calls = Cell::new(0);
        let result: Result<()> = no_delay(3)
            .run(|| {
                calls.set(calls.get() + 1);
                async { Err(ExecCvError::QuotaExceeded { used: 60, quota: 60 }) }
            })
            .await;
        assert!(matches!(result, Err(ExecCvError::QuotaExceeded { .. })));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let calls = Cell::new(0);
        let result: Result<()> = no_delay(1)
            .run(|| {
                calls.set(calls.get() + 1);
                async { Err(ExecCvError::Http { status: 502, message: "bad gateway".into() }) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }
}
