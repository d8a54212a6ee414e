use crate::error::{ExecCvError, Result};
use exec_cv_common::photo::DEFAULT_CONFIDENCE_THRESHOLD;
use exec_cv_common::{FieldCatalog, DEFAULT_PLACEHOLDERS, PROFESSIONAL_CATEGORIES};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const PERPLEXITY_KEY_VAR: &str = "PERPLEXITY_API_KEY";
pub const SERPAPI_KEY_VAR: &str = "SERPAPI_API_KEY";

/// 外部描画器の設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RendererConfig {
    /// 実行コマンド（先頭がプログラム、残りは引數）
    pub command: Vec<String>,
    pub template: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            command: vec!["python".into(), "render_cv.py".into()],
            template: PathBuf::from("templates/cv_template.pptx"),
            output_dir: PathBuf::from("output/ppt"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub perplexity_api_key: Option<String>,
    pub serpapi_api_key: Option<String>,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    /// 外部呼び出し間の待機（ミリ秒）
    pub request_pause_ms: u64,
    pub input_workbook: PathBuf,
    pub output_workbook: PathBuf,
    pub catalog: FieldCatalog,
    pub placeholders: Vec<String>,
    pub valid_categories: Vec<String>,
    pub photo_threshold: i32,
    pub serpapi_quota: u32,
    pub serpapi_usage_path: PathBuf,
    pub candidates_path: PathBuf,
    pub review_html_path: PathBuf,
    pub selection_paths: Vec<PathBuf>,
    pub renderer: RendererConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut selection_paths = vec![
            PathBuf::from("output/data/photo_selections.json"),
            PathBuf::from("photo_selections.json"),
        ];
        if let Some(home) = dirs::home_dir() {
            selection_paths.push(home.join("Downloads").join("photo_selections.json"));
        }

        Self {
            perplexity_api_key: None,
            serpapi_api_key: None,
            model: "sonar-pro".into(),
            timeout_seconds: 60,
            max_retries: 1,
            request_pause_ms: 2000,
            input_workbook: PathBuf::from("data/executives.xlsx"),
            output_workbook: PathBuf::from("output/data/executives_enriched.xlsx"),
            catalog: FieldCatalog::default(),
            placeholders: DEFAULT_PLACEHOLDERS.iter().map(|s| s.to_string()).collect(),
            valid_categories: PROFESSIONAL_CATEGORIES.iter().map(|s| s.to_string()).collect(),
            photo_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            serpapi_quota: 60,
            serpapi_usage_path: PathBuf::from(".serpapi_usage.json"),
            candidates_path: PathBuf::from("output/data/photo_candidates.json"),
            review_html_path: PathBuf::from("output/data/photo_review.html"),
            selection_paths,
            renderer: RendererConfig::default(),
        }
    }
}

impl Config {
    /// 既定の場所から読み込み（無ければ既定値）
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)
                .map_err(|e| ExecCvError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| ExecCvError::Config("找不到使用者主目錄".into()))?;
        Ok(home.join(".config").join("exec-cv").join("config.json"))
    }

    pub fn validate(&self) -> Result<()> {
        self.catalog.validate()?;
        if self.renderer.command.is_empty() {
            return Err(ExecCvError::Config("renderer.command 不可為空".into()));
        }
        if self.timeout_seconds == 0 {
            return Err(ExecCvError::Config("timeout_seconds 必須大於 0".into()));
        }
        Ok(())
    }

    pub fn perplexity_key(&self) -> Result<String> {
        resolve_key(PERPLEXITY_KEY_VAR, self.perplexity_api_key.as_deref())
    }

    pub fn serpapi_key(&self) -> Result<String> {
        resolve_key(SERPAPI_KEY_VAR, self.serpapi_api_key.as_deref())
    }

    /// 補全結果があればそちらを、無ければ入力檔を読む
    pub fn working_workbook(&self) -> &Path {
        if self.output_workbook.exists() {
            &self.output_workbook
        } else {
            &self.input_workbook
        }
    }
}

fn resolve_key(var: &str, configured: Option<&str>) -> Result<String> {
    // 環境変数を優先
    if let Ok(key) = std::env::var(var) {
        if !key.trim().is_empty() {
            return Ok(key.trim().to_string());
        }
    }

    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ExecCvError::MissingApiKey(var.to_string()))
}

/// 金鑰の表示用マスク（先頭 4 文字のみ）
pub fn mask_key(key: Option<&str>) -> String {
    match key {
        Some(k) if k.chars().count() > 4 => {
            let head: String = k.chars().take(4).collect();
            format!("{}****", head)
        }
        Some(_) => "****".into(),
        None => "未設定".into(),
    }
}
