//! CV 簡報生成（CLI版）
//!
//! 審核結果を照片欄に反映し、列ごとに簡報資料を組み立てて
//! 外部の描画器（python-pptx スクリプト等）に渡す。

use crate::error::{ExecCvError, Result};
use crate::review::{apply_selections, find_selection_file, load_selections};
use crate::workbook::{SheetView, Spreadsheet};
use exec_cv_common::slide::{build_payload, cv_file_name, SectionSpec, SlidePayload};
use exec_cv_common::RowSelector;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

/// 簡報 1 份の描画
pub trait SlideRenderer {
    fn render(&self, payload: &SlidePayload, output: &Path) -> Result<()>;
}

/// 外部コマンドによる描画: `<command...> <payload.json> <template> <output.pptx>`
pub struct CommandRenderer {
    command: Vec<String>,
    template: PathBuf,
}

impl CommandRenderer {
    pub fn new(command: Vec<String>, template: PathBuf) -> Result<Self> {
        if command.is_empty() {
            return Err(ExecCvError::Config("renderer.command 不可為空".into()));
        }
        Ok(Self { command, template })
    }
}

impl SlideRenderer for CommandRenderer {
    fn render(&self, payload: &SlidePayload, output: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(payload)
            .map_err(|e| ExecCvError::Render(format!("JSON生成錯誤: {}", e)))?;
        let mut payload_file = tempfile::Builder::new()
            .prefix("exec-cv-slide-")
            .suffix(".json")
            .tempfile()
            .map_err(|e| ExecCvError::Render(format!("JSON保存錯誤: {}", e)))?;
        payload_file
            .write_all(&json)
            .map_err(|e| ExecCvError::Render(format!("JSON寫入錯誤: {}", e)))?;

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| ExecCvError::Config("renderer.command 不可為空".into()))?;

        let result = Command::new(program)
            .args(args)
            .arg(payload_file.path())
            .arg(&self.template)
            .arg(output)
            .output()
            .map_err(|e| ExecCvError::Render(format!("描畫器啟動錯誤 ({}): {}", program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(ExecCvError::Render(format!("描畫器失敗: {}", stderr.trim())));
        }

        Ok(())
    }
}

/// 選択檔があれば照片欄に反映して保存。反映件數を返す
pub fn finalize_photos<S: Spreadsheet>(
    view: &mut SheetView<'_, S>,
    selection_paths: &[PathBuf],
) -> Result<(Option<PathBuf>, usize)> {
    let Some(path) = find_selection_file(selection_paths) else {
        return Ok((None, 0));
    };

    let selections = load_selections(&path)?;
    let applied = apply_selections(view, &selections);
    if applied > 0 {
        view.sheet.save()?;
    }
    tracing::info!(path = %path.display(), applied, "photo selections applied");
    Ok((Some(path), applied))
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlideState {
    Rendered(PathBuf),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlideOutcome {
    pub row: u32,
    pub name: String,
    pub state: SlideState,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateSummary {
    pub outcomes: Vec<SlideOutcome>,
}

impl GenerateSummary {
    pub fn rendered(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, SlideState::Rendered(_)))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, SlideState::Failed(_)))
            .count()
    }

    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == self.outcomes.len()
    }
}

/// 簡報生成の設定
pub struct SlidePlan<'a> {
    pub sections: &'a [SectionSpec],
    pub valid_categories: &'a [String],
    pub output_dir: &'a Path,
}

impl SlidePlan<'_> {
    /// 出力先: `<output_dir>/<分類>/<檔名>`
    pub fn output_path(&self, payload: &SlidePayload) -> PathBuf {
        self.output_dir
            .join(&payload.category)
            .join(cv_file_name(&payload.name, &payload.company))
    }
}

/// 指定列の簡報を生成。1 列の失敗では止まらない
pub fn generate_slides<S, R, F>(
    view: &SheetView<'_, S>,
    rows: &RowSelector,
    plan: &SlidePlan<'_>,
    renderer: &R,
    mut on_row: F,
) -> GenerateSummary
where
    S: Spreadsheet,
    R: SlideRenderer,
    F: FnMut(&SlideOutcome),
{
    let mut summary = GenerateSummary::default();

    for row in rows.rows() {
        let outcome = if !view.is_data_row(row) {
            SlideOutcome {
                row,
                name: String::new(),
                state: SlideState::Skipped("超出資料範圍".into()),
            }
        } else {
            let record = view.record(row);
            if record.name.is_empty() {
                SlideOutcome {
                    row,
                    name: String::new(),
                    state: SlideState::Skipped("沒有姓名".into()),
                }
            } else {
                let payload = build_payload(&record, plan.sections, plan.valid_categories);
                let output = plan.output_path(&payload);
                let state = match render_one(renderer, &payload, &output) {
                    Ok(()) => SlideState::Rendered(output),
                    Err(e) => {
                        tracing::warn!(row, error = %e, "slide render failed");
                        SlideState::Failed(e.to_string())
                    }
                };
                SlideOutcome {
                    row,
                    name: payload.name,
                    state,
                }
            }
        };

        on_row(&outcome);
        summary.outcomes.push(outcome);
    }

    summary
}

fn render_one<R: SlideRenderer>(renderer: &R, payload: &SlidePayload, output: &Path) -> Result<()> {
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    renderer.render(payload, output)
}
