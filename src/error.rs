use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecCvError {
    #[error(transparent)]
    Common(#[from] exec_cv_common::Error),

    #[error("設定錯誤: {0}")]
    Config(String),

    #[error("尚未設定 API 金鑰 {0}。請執行 `exec-cv config --set-perplexity-key KEY` 或 `--set-serpapi-key KEY`")]
    MissingApiKey(String),

    #[error("API 認證失敗: {0}")]
    Auth(String),

    #[error("API 請求逾時: {0}")]
    Timeout(String),

    #[error("網路連線錯誤: {0}")]
    Network(String),

    #[error("API 回應錯誤 (HTTP {status}): {message}")]
    Http { status: u16, message: String },

    #[error("API 呼叫錯誤: {0}")]
    Fetch(String),

    #[error("SerpAPI 本月額度已用完 ({used}/{quota})")]
    QuotaExceeded { used: u32, quota: u32 },

    #[error("找不到資料: {0}")]
    NotFound(String),

    #[error("Excel 讀取錯誤: {0}")]
    Workbook(String),

    #[error("儲存失敗: {0}")]
    Persistence(String),

    #[error("簡報生成錯誤: {0}")]
    Render(String),

    #[error("找不到檔案: {0}")]
    FileNotFound(String),

    #[error("互動輸入錯誤: {0}")]
    Interaction(String),

    #[error("JSON解析錯誤: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

impl ExecCvError {
    /// 一時的な失敗（再試行で回復しうる）か
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecCvError::Timeout(_) | ExecCvError::Network(_) => true,
            ExecCvError::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// 1 件の失敗で処理全体を止めるべきか
    pub fn is_fatal(&self) -> bool {
        matches!(self, ExecCvError::Persistence(_))
    }
}

pub type Result<T> = std::result::Result<T, ExecCvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ExecCvError::Timeout("60s".into()).is_retryable());
        assert!(ExecCvError::Network("reset".into()).is_retryable());
        assert!(ExecCvError::Http { status: 429, message: String::new() }.is_retryable());
        assert!(ExecCvError::Http { status: 503, message: String::new() }.is_retryable());

        assert!(!ExecCvError::Http { status: 400, message: String::new() }.is_retryable());
        assert!(!ExecCvError::Auth("401".into()).is_retryable());
        assert!(!ExecCvError::QuotaExceeded { used: 60, quota: 60 }.is_retryable());
        assert!(!ExecCvError::NotFound("學歷".into()).is_retryable());
    }

    #[test]
    fn test_only_persistence_is_fatal() {
        assert!(ExecCvError::Persistence("disk full".into()).is_fatal());
        assert!(!ExecCvError::Fetch("x".into()).is_fatal());
    }

    #[test]
    fn test_common_error_is_transparent() {
        let err: ExecCvError = exec_cv_common::Error::invalid_range("5-2").into();
        assert_eq!(err.to_string(), "範圍格式錯誤: 5-2");
    }
}
