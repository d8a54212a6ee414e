//! 照片審核モジュール
//!
//! 照片候補の保存（列ごとに合併）、審核用 HTML の出力、
//! 審核結果（選択檔）の読み込みと試算表への反映。

mod html;

pub use html::render_review_html;

use crate::error::{ExecCvError, Result};
use crate::workbook::{SheetView, Spreadsheet};
use exec_cv_common::photo::STATUS_CONFIRMED;
use exec_cv_common::{CellAddress, FieldKey, PhotoCandidate, PhotoOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// 1 人分の審核項目
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoReviewEntry {
    pub name: String,
    pub company: String,
    #[serde(default)]
    pub best_url: String,
    #[serde(default)]
    pub best_score: i32,
    pub status: String,
    #[serde(default)]
    pub candidates: Vec<PhotoCandidate>,
    #[serde(default)]
    pub searched_at: Option<String>,
}

impl PhotoReviewEntry {
    pub fn from_outcome(name: &str, company: &str, outcome: PhotoOutcome, searched_at: String) -> Self {
        Self {
            name: name.to_string(),
            company: company.to_string(),
            best_url: outcome.best_url,
            best_score: outcome.best_score,
            status: outcome.status,
            candidates: outcome.candidates,
            searched_at: Some(searched_at),
        }
    }
}

/// 列號 → 審核項目
pub type CandidateStore = BTreeMap<u32, PhotoReviewEntry>;

pub fn load_candidates(path: &Path) -> Result<CandidateStore> {
    if !path.exists() {
        return Ok(CandidateStore::new());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// 読めない候補檔の退避先（"photo_candidates.json.bak"）
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// 既存の候補檔に合併して保存（同じ列は新しい方で上書き）
///
/// 既存檔が読めなければ `.bak` に退避してから新規に書く。
pub fn merge_candidates(path: &Path, fresh: CandidateStore) -> Result<CandidateStore> {
    let mut store = match load_candidates(path) {
        Ok(store) => store,
        Err(e) => {
            let backup = backup_path(path);
            std::fs::rename(path, &backup)?;
            tracing::warn!(
                path = %path.display(),
                backup = %backup.display(),
                error = %e,
                "candidate file unreadable, moved aside"
            );
            CandidateStore::new()
        }
    };
    store.extend(fresh);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(&store)?)?;
    Ok(store)
}

pub fn write_review_html(path: &Path, store: &CandidateStore, generated_at: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, render_review_html(store, generated_at))?;
    Ok(())
}

/// 選択檔の 1 項目から (URL, 狀態) を取り出す
///
/// 値は URL 文字列か `{"selected_url": ..., "status": ...}`。それ以外（null・數値など）は使わない。
fn selection_entry(value: &serde_json::Value) -> Option<(String, Option<String>)> {
    match value {
        serde_json::Value::String(url) => Some((url.clone(), None)),
        serde_json::Value::Object(fields) => {
            let url = fields.get("selected_url")?.as_str()?.to_string();
            let status = fields.get("status").and_then(|s| s.as_str()).map(str::to_string);
            Some((url, status))
        }
        _ => None,
    }
}

/// 審核で確定した 1 件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSelection {
    pub row: u32,
    pub url: String,
    pub status: String,
}

/// 候補パスのうち最初に存在するもの
pub fn find_selection_file(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|p| p.is_file()).cloned()
}

/// 選択檔を読む。URL が空・値の形が不正・列號が不正な項目は除外
pub fn load_selections(path: &Path) -> Result<Vec<PhotoSelection>> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ExecCvError::FileNotFound(path.display().to_string()))?;
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)?;

    let mut selections: Vec<PhotoSelection> = raw
        .into_iter()
        .filter_map(|(key, value)| {
            let row = match key.trim().parse::<u32>() {
                Ok(row) if row > 0 => row,
                _ => {
                    tracing::warn!(key = %key, "ignoring selection with invalid row");
                    return None;
                }
            };
            let Some((url, status)) = selection_entry(&value) else {
                tracing::warn!(key = %key, "ignoring selection with unusable value");
                return None;
            };
            let url = url.trim().to_string();
            if url.is_empty() {
                return None;
            }
            let status = status
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| STATUS_CONFIRMED.to_string());
            Some(PhotoSelection { row, url, status })
        })
        .collect();

    selections.sort_by_key(|s| s.row);
    Ok(selections)
}

/// 選択を照片欄と照片狀態欄に書き込み、反映件數を返す
pub fn apply_selections<S: Spreadsheet>(
    view: &mut SheetView<'_, S>,
    selections: &[PhotoSelection],
) -> usize {
    let mut applied = 0;
    for selection in selections {
        if !view.is_data_row(selection.row) {
            tracing::warn!(row = selection.row, "selection row outside data range");
            continue;
        }
        view.write_cell(&CellAddress::new(FieldKey::Photo, selection.row), &selection.url);
        view.write_photo_status(selection.row, &selection.status);
        applied += 1;
    }
    applied
}
