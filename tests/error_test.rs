//! エラーケーステスト
//!
//! 各種エラー条件でのエラーハンドリングを検証

use exec_cv_common::{parse_cells, parse_rows, FieldCatalog};
use exec_cv_rust::config::Config;
use exec_cv_rust::error::ExecCvError;
use exec_cv_rust::workbook::XlsxSheet;
use tempfile::tempdir;

/// 存在しない試算表を開いた場合
#[test]
fn test_open_nonexistent_workbook() {
    let dir = tempdir().expect("Failed to create temp dir");
    let missing = dir.path().join("nothing.xlsx");
    let result = XlsxSheet::open(&missing, &missing);

    assert!(matches!(result, Err(ExecCvError::FileNotFound(_))));
}

/// xlsx ではないファイルを開いた場合
#[test]
fn test_open_invalid_workbook() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, "not a spreadsheet").unwrap();

    let result = XlsxSheet::open(&path, &path);
    assert!(matches!(result, Err(ExecCvError::Workbook(_))));
}

/// 逆順範圍は fetch 前に InvalidRange
#[test]
fn test_reversed_range_rejected() {
    let err: ExecCvError = parse_rows("5-2").unwrap_err().into();
    assert!(matches!(err, ExecCvError::Common(exec_cv_common::Error::InvalidRange(_))));
    assert!(err.to_string().contains("範圍格式錯誤"));
}

/// 未知の欄位は UnknownField
#[test]
fn test_unknown_field_rejected() {
    let catalog = FieldCatalog::default();
    let err: ExecCvError = parse_cells("Z5", &catalog).unwrap_err().into();
    assert!(matches!(err, ExecCvError::Common(exec_cv_common::Error::UnknownField(_))));
}

/// 不正な設定ファイル
#[test]
fn test_invalid_config_file() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "{ invalid").unwrap();

    assert!(matches!(Config::load_from(&path), Err(ExecCvError::Config(_))));
}

/// 欄位代號が重複した目錄は設定エラー
#[test]
fn test_duplicate_catalog_column_rejected() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("config.json");
    let mut config = Config::default();
    config.catalog.fields[0].column = "H".into();
    std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

    let result = Config::load_from(&path);
    assert!(matches!(
        result,
        Err(ExecCvError::Common(exec_cv_common::Error::Config(_)))
    ));
}

/// ExecCvErrorのDisplay実装確認
#[test]
fn test_error_display() {
    let errors = vec![
        ExecCvError::Config("テスト設定エラー".to_string()),
        ExecCvError::FileNotFound("data.xlsx".to_string()),
        ExecCvError::Auth("HTTP 401".to_string()),
        ExecCvError::Timeout("60s".to_string()),
        ExecCvError::QuotaExceeded { used: 60, quota: 60 },
        ExecCvError::NotFound("學歷".to_string()),
        ExecCvError::Persistence("disk full".to_string()),
        ExecCvError::Render("exit 1".to_string()),
    ];

    for err in errors {
        let display = format!("{}", err);
        assert!(!display.is_empty(), "エラーメッセージが空: {:?}", err);
    }
}

/// MissingApiKeyエラーのメッセージ確認
#[test]
fn test_missing_api_key_message() {
    let err = ExecCvError::MissingApiKey("PERPLEXITY_API_KEY".into());
    let display = format!("{}", err);

    assert!(display.contains("PERPLEXITY_API_KEY"));
    assert!(display.contains("exec-cv config"));
}

/// IOエラーからの変換
#[test]
fn test_io_error_conversion() {
    let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let err: ExecCvError = io_err.into();

    assert!(matches!(err, ExecCvError::Io(_)));
    assert!(!err.is_retryable());
}

/// JSONエラーからの変換
#[test]
fn test_json_error_conversion() {
    let json_err = serde_json::from_str::<serde_json::Value>("{ invalid }").unwrap_err();
    let err: ExecCvError = json_err.into();

    assert!(matches!(err, ExecCvError::JsonParse(_)));
}
