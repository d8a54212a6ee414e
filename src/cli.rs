use crate::error::{ExecCvError, Result};
use clap::{ArgAction, Parser, Subcommand};
use dialoguer::Input;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "exec-cv")]
#[command(about = "高階主管履歷資料補全・CV 簡報生成ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力（-v: debug, -vv: trace）
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// 設定ファイルのパス（省略時: ~/.config/exec-cv/config.json）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 搜尋 API で空欄を補全
    Enrich {
        /// 列號範圍（例: "2, 5-10, 15"）
        #[arg(short, long)]
        rows: Option<String>,

        /// 儲存格範圍（例: "H26-H30", "學歷:26-30"）
        #[arg(short, long, conflicts_with_all = ["rows", "photos_only", "field"])]
        cell: Option<String>,

        /// 單一欄位のみ（編號・中文名稱・欄位代號・欄位鍵）。--rows と併用
        #[arg(short, long, requires = "rows")]
        field: Option<String>,

        /// 既存の資料も上書き
        #[arg(long)]
        force: bool,

        /// 照片のみ搜尋
        #[arg(long, conflicts_with = "field")]
        photos_only: bool,
    },

    /// 試算表から CV 簡報を生成
    Generate {
        /// 列號範圍（例: "2-20"）
        #[arg(short, long)]
        rows: Option<String>,
    },

    /// 欄位目錄を表示
    Fields,

    /// 設定を表示/編集
    Config {
        /// Perplexity APIキーを設定
        #[arg(long)]
        set_perplexity_key: Option<String>,

        /// SerpAPI キーを設定
        #[arg(long)]
        set_serpapi_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}

/// 範圍を対話入力（空入力は再入力）
pub fn prompt_range(prompt: &str) -> Result<String> {
    let input: String = Input::new()
        .with_prompt(prompt)
        .validate_with(|s: &String| {
            if s.trim().is_empty() {
                Err("請輸入範圍")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .map_err(|e| ExecCvError::Interaction(e.to_string()))?;
    Ok(input.trim().to_string())
}
