//! エラー型定義

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("範圍格式錯誤: {0}")]
    InvalidRange(String),

    #[error("無法識別欄位: '{0}'")]
    UnknownField(String),

    #[error("回應解析錯誤: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
