//! exec-cv: 高階主管履歷の補全と CV 簡報生成
//!
//! 純粋な処理（欄位目錄・範圍解析・合併方針など）は `exec_cv_common` に、
//! 試算表・外部 API・描画器との入出力はこの crate に置く。

pub mod cli;
pub mod config;
pub mod error;
pub mod generate;
pub mod orchestrator;
pub mod progress;
pub mod review;
pub mod search;
pub mod workbook;

/// `-v` の回數に応じてログ出力を初期化（RUST_LOG があればそちらを優先）
pub fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbose {
        0 => "exec_cv_rust=warn,exec_cv=warn",
        1 => "exec_cv_rust=debug,exec_cv=debug",
        _ => "exec_cv_rust=trace,exec_cv=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
