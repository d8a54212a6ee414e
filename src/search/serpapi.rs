//! SerpAPI Google Images クライアント
//!
//! 無料枠は月 60 回。使用回數を `.serpapi_usage.json` に記録し、
//! 枠を超える呼び出しは通信せずに QuotaExceeded を返す。

use super::perplexity::{classify_status, classify_transport_error};
use super::PhotoSource;
use crate::error::{ExecCvError, Result};
use chrono::Local;
use exec_cv_common::ImageHit;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://serpapi.com/search.json";
const RESULTS_PER_QUERY: &str = "10";

/// 月間使用量の記録
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageLedger {
    /// "YYYY-MM"
    pub month: String,
    pub count: u32,
    pub quota: u32,
    #[serde(default)]
    pub last_used: Option<String>,
}

impl UsageLedger {
    pub fn new(month: String, quota: u32) -> Self {
        Self {
            month,
            count: 0,
            quota,
            last_used: None,
        }
    }

    pub fn current_month() -> String {
        Local::now().format("%Y-%m").to_string()
    }

    /// 読み込み（無い・壊れている場合は新規、月が変わっていればリセット）
    pub fn load(path: &Path, month: &str, quota: u32) -> Self {
        let stored: Option<UsageLedger> = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok());

        match stored {
            Some(mut ledger) if ledger.month == month => {
                ledger.quota = quota;
                ledger
            }
            Some(_) => {
                tracing::info!(month, "serpapi usage reset for new month");
                Self::new(month.to_string(), quota)
            }
            None => Self::new(month.to_string(), quota),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn remaining(&self) -> u32 {
        self.quota.saturating_sub(self.count)
    }

    pub fn check(&self) -> Result<()> {
        if self.remaining() == 0 {
            Err(ExecCvError::QuotaExceeded {
                used: self.count,
                quota: self.quota,
            })
        } else {
            Ok(())
        }
    }

    pub fn record_use(&mut self) {
        self.count += 1;
        self.last_used = Some(Local::now().to_rfc3339());
    }

    /// 帳戶側で額度切れと言われたら今月はもう呼ばない
    pub fn exhaust(&mut self) {
        self.count = self.count.max(self.quota);
    }
}

/// 帳戶の搜尋回數切れを示す SerpAPI のエラー文
const OUT_OF_SEARCHES: &str = "run out of searches";

/// SerpAPI の失敗応答を分類
///
/// 429 と「run out of searches」は額度切れ（再試行しない）。他は共通の分類に従う。
pub(crate) fn classify_serpapi_status(
    status: reqwest::StatusCode,
    body: String,
    ledger: &UsageLedger,
) -> ExecCvError {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains(OUT_OF_SEARCHES) {
        ExecCvError::QuotaExceeded {
            used: ledger.count.max(ledger.quota),
            quota: ledger.quota,
        }
    } else {
        classify_status(status, body)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    images_results: Vec<ImageResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ImageResult {
    #[serde(default)]
    original: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    original_width: u32,
    #[serde(default)]
    original_height: u32,
}

impl From<ImageResult> for ImageHit {
    fn from(r: ImageResult) -> Self {
        ImageHit {
            image: r.original,
            source: r.link,
            title: r.title,
            width: r.original_width,
            height: r.original_height,
        }
    }
}

pub struct SerpApiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
    usage_path: PathBuf,
    ledger: Mutex<UsageLedger>,
}

impl SerpApiClient {
    pub fn new(api_key: String, timeout: Duration, usage_path: PathBuf, quota: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecCvError::Config(format!("HTTP client: {}", e)))?;
        let ledger = UsageLedger::load(&usage_path, &UsageLedger::current_month(), quota);

        Ok(Self {
            http,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            usage_path,
            ledger: Mutex::new(ledger),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn usage(&self) -> Option<UsageLedger> {
        self.ledger.lock().ok().map(|l| l.clone())
    }

    /// 失敗応答を分類。額度切れなら帳簿にも記録する
    fn classify_failure(&self, status: reqwest::StatusCode, body: String) -> ExecCvError {
        let Ok(mut ledger) = self.ledger.lock() else {
            return classify_status(status, body);
        };
        let err = classify_serpapi_status(status, body, &ledger);
        if matches!(err, ExecCvError::QuotaExceeded { .. }) {
            ledger.exhaust();
            if let Err(e) = ledger.save(&self.usage_path) {
                tracing::warn!(error = %e, "failed to save serpapi usage");
            }
        }
        err
    }

    fn reserve(&self) -> Result<()> {
        let mut ledger = self
            .ledger
            .lock()
            .map_err(|_| ExecCvError::Fetch("usage ledger poisoned".into()))?;
        ledger.check()?;
        ledger.record_use();
        if let Err(e) = ledger.save(&self.usage_path) {
            tracing::warn!(error = %e, "failed to save serpapi usage");
        }
        Ok(())
    }
}

impl PhotoSource for SerpApiClient {
    async fn search_images(&self, query: &str) -> Result<Vec<ImageHit>> {
        self.reserve()?;

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("engine", "google_images"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
                ("num", RESULTS_PER_QUERY),
            ])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.classify_failure(status, body));
        }

        let parsed: SearchResponse = response.json().await.map_err(classify_transport_error)?;
        if let Some(error) = parsed.error {
            // 結果 0 件も error として返ってくる
            if error.contains(OUT_OF_SEARCHES) {
                return Err(self.classify_failure(status, error));
            }
            if parsed.images_results.is_empty() && !error.contains("hasn't returned any results") {
                return Err(ExecCvError::Fetch(error));
            }
        }

        tracing::debug!(query, hits = parsed.images_results.len(), "serpapi search done");
        Ok(parsed.images_results.into_iter().map(ImageHit::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ledger_resets_on_new_month() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".serpapi_usage.json");
        let mut ledger = UsageLedger::new("2026-09".into(), 60);
        ledger.count = 42;
        ledger.save(&path).unwrap();

        let same = UsageLedger::load(&path, "2026-09", 60);
        assert_eq!(same.count, 42);

        let next = UsageLedger::load(&path, "2026-10", 60);
        assert_eq!(next.count, 0);
        assert_eq!(next.month, "2026-10");
    }

    #[test]
    fn test_ledger_corrupt_file_starts_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".serpapi_usage.json");
        std::fs::write(&path, "not json").unwrap();
        let ledger = UsageLedger::load(&path, "2026-10", 60);
        assert_eq!(ledger.count, 0);
    }

    #[test]
    fn test_ledger_quota_check() {
        let mut ledger = UsageLedger::new("2026-10".into(), 2);
        assert!(ledger.check().is_ok());
        ledger.record_use();
        ledger.record_use();
        assert_eq!(ledger.remaining(), 0);
        assert!(matches!(
            ledger.check(),
            Err(ExecCvError::QuotaExceeded { used: 2, quota: 2 })
        ));
        assert!(ledger.last_used.is_some());
    }

    #[tokio::test]
    async fn test_exhausted_quota_skips_network() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".serpapi_usage.json");
        let mut ledger = UsageLedger::new(UsageLedger::current_month(), 1);
        ledger.count = 1;
        ledger.save(&path).unwrap();

        // 到達不能な endpoint。通信すれば Network/Timeout になる
        let client = SerpApiClient::new("key".into(), Duration::from_secs(1), path, 1)
            .unwrap()
            .with_endpoint("http://127.0.0.1:9/search.json");
        let result = client.search_images("王大明").await;
        assert!(matches!(result, Err(ExecCvError::QuotaExceeded { .. })));
        assert_eq!(client.usage().unwrap().count, 1);
    }

    #[test]
    fn test_account_out_of_searches_is_quota_error() {
        let ledger = UsageLedger::new("2026-10".into(), 60);
        let body = r#"{"error":"Your account has run out of searches."}"#.to_string();

        let err = classify_serpapi_status(reqwest::StatusCode::TOO_MANY_REQUESTS, body, &ledger);
        assert!(matches!(err, ExecCvError::QuotaExceeded { used: 60, quota: 60 }));
        assert!(!err.is_retryable());

        // 200 で error 欄に入ってくる場合も同じ
        let err = classify_serpapi_status(
            reqwest::StatusCode::OK,
            "Your account has run out of searches.".into(),
            &ledger,
        );
        assert!(matches!(err, ExecCvError::QuotaExceeded { .. }));

        let err = classify_serpapi_status(reqwest::StatusCode::BAD_GATEWAY, "upstream".into(), &ledger);
        assert!(matches!(err, ExecCvError::Http { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_exhaust_blocks_further_calls() {
        let mut ledger = UsageLedger::new("2026-10".into(), 60);
        ledger.count = 12;
        ledger.exhaust();
        assert_eq!(ledger.remaining(), 0);
        assert!(ledger.check().is_err());
    }

    #[test]
    fn test_response_mapping() {
        let body = r#"{"images_results":[{"original":"https://a.com/1.jpg","link":"https://www.linkedin.com/in/x","title":"X","original_width":400,"original_height":400}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();
        let hits: Vec<ImageHit> = parsed.images_results.into_iter().map(ImageHit::from).collect();
        assert_eq!(hits[0].image, "https://a.com/1.jpg");
        assert_eq!(hits[0].source, "https://www.linkedin.com/in/x");
        assert_eq!(hits[0].width, 400);
    }
}
