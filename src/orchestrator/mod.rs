//! 補全処理の本体
//!
//! 処理対象を順番に 1 件ずつ処理する。1 件の失敗では止まらず、
//! 儲存失敗（Persistence）のみ全体を中断する。試算表は最後に一度だけ保存。

use crate::error::{ExecCvError, Result};
use crate::review::{merge_candidates, write_review_html, CandidateStore, PhotoReviewEntry};
use crate::search::{AnswerSource, PhotoSource, RetryPolicy};
use crate::workbook::{SheetView, Spreadsheet};
use exec_cv_common::{
    build_field_prompt, parse_field_answer, photo_queries, rank_candidates, validate_answer,
    AnswerContext, CellAddress, Decision, EnrichmentTarget, FieldCatalog, FieldKey, ImageHit,
    MergePolicy, Person,
};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// SKIPPED の理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyFilled,
    OutOfRange,
    NoName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyFilled => write!(f, "已有資料"),
            SkipReason::OutOfRange => write!(f, "超出資料範圍"),
            SkipReason::NoName => write!(f, "沒有姓名"),
        }
    }
}

/// 1 件の最終狀態
#[derive(Debug, Clone, PartialEq)]
pub enum TargetState {
    Skipped(SkipReason),
    Written(String),
    Failed(String),
    /// 照片候補を記録済み。値は照片狀態欄に書いた狀態
    PendingReview(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetOutcome {
    pub target: EnrichmentTarget,
    /// "H26" 形式
    pub label: String,
    pub name: String,
    pub state: TargetState,
}

/// 実行結果の集計
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<TargetOutcome>,
    pub photo_reviews: CandidateStore,
}

impl RunSummary {
    fn count(&self, pred: impl Fn(&TargetState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.state)).count()
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, TargetState::Skipped(_)))
    }

    pub fn written(&self) -> usize {
        self.count(|s| matches!(s, TargetState::Written(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, TargetState::Failed(_)))
    }

    pub fn pending_review(&self) -> usize {
        self.count(|s| matches!(s, TargetState::PendingReview(_)))
    }

    /// 失敗した (儲存格, 理由) の一覧
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.state {
                TargetState::Failed(reason) => Some((o.label.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// 対象が 1 件以上あり、すべて失敗した場合のみ true
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.failed() == self.outcomes.len()
    }
}

/// 進捗通知
pub trait ProgressReporter {
    fn start(&self, total: usize);
    fn target_started(&self, label: &str, name: &str, current: usize, total: usize);
    fn target_finished(&self, outcome: &TargetOutcome);
    fn done(&self, summary: &RunSummary);
}

/// テスト・非対話用の何もしない実装
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn start(&self, _total: usize) {}
    fn target_started(&self, _label: &str, _name: &str, _current: usize, _total: usize) {}
    fn target_finished(&self, _outcome: &TargetOutcome) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// 照片審核ファイルの出力先
#[derive(Debug, Clone)]
pub struct ReviewPaths {
    pub candidates: PathBuf,
    pub html: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RunSettings {
    /// 外部呼び出し間の待機
    pub pause: Duration,
    pub retry: RetryPolicy,
    pub photo_threshold: i32,
    pub current_year: i32,
    /// 專業分類の正規化先
    pub valid_categories: Vec<String>,
    pub review: Option<ReviewPaths>,
}

pub struct Orchestrator<'a, A, P> {
    catalog: &'a FieldCatalog,
    policy: &'a MergePolicy,
    answers: Option<&'a A>,
    photos: Option<&'a P>,
    settings: RunSettings,
}

impl<'a, A: AnswerSource, P: PhotoSource> Orchestrator<'a, A, P> {
    pub fn new(
        catalog: &'a FieldCatalog,
        policy: &'a MergePolicy,
        answers: Option<&'a A>,
        photos: Option<&'a P>,
        settings: RunSettings,
    ) -> Self {
        Self {
            catalog,
            policy,
            answers,
            photos,
            settings,
        }
    }

    pub async fn run<S: Spreadsheet>(
        &self,
        sheet: &mut S,
        targets: &[EnrichmentTarget],
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary> {
        let mut view = SheetView::new(sheet, self.catalog);
        let mut summary = RunSummary::default();
        let mut called_before = false;
        let total = targets.len();

        progress.start(total);

        for (i, target) in targets.iter().enumerate() {
            let cell = target.cell;
            let label = cell.label(self.catalog);
            let name = if view.is_data_row(cell.row) {
                view.name(cell.row)
            } else {
                String::new()
            };
            progress.target_started(&label, &name, i + 1, total);

            let state = match self.precheck(&view, target, &name) {
                Some(reason) => TargetState::Skipped(reason),
                None => {
                    if called_before && !self.settings.pause.is_zero() {
                        tokio::time::sleep(self.settings.pause).await;
                    }
                    called_before = true;

                    let person = Person {
                        name: name.clone(),
                        company: view.company(cell.row),
                        current_position: view
                            .read_cell(&CellAddress::new(FieldKey::CurrentPosition, cell.row))
                            .filter(|v| !v.trim().is_empty()),
                    };

                    let result = if cell.key.is_photo() {
                        self.fetch_photo(&mut view, &person, cell, &mut summary.photo_reviews).await
                    } else {
                        self.fetch_text(&mut view, &person, cell).await
                    };

                    match result {
                        Ok(state) => state,
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => {
                            tracing::warn!(cell = %label, error = %e, "target failed");
                            TargetState::Failed(e.to_string())
                        }
                    }
                }
            };

            let outcome = TargetOutcome {
                target: *target,
                label,
                name,
                state,
            };
            progress.target_finished(&outcome);
            summary.outcomes.push(outcome);
        }

        if summary.written() > 0 || summary.pending_review() > 0 {
            view.sheet.save()?;
        }

        if !summary.photo_reviews.is_empty() {
            if let Some(paths) = &self.settings.review {
                self.persist_reviews(paths, &summary.photo_reviews)?;
            }
        }

        progress.done(&summary);
        Ok(summary)
    }

    fn precheck<S: Spreadsheet>(
        &self,
        view: &SheetView<'_, S>,
        target: &EnrichmentTarget,
        name: &str,
    ) -> Option<SkipReason> {
        if !view.is_data_row(target.cell.row) {
            return Some(SkipReason::OutOfRange);
        }
        if name.is_empty() {
            return Some(SkipReason::NoName);
        }
        let current = view.read_cell(&target.cell);
        let state = self.policy.cell_state(current.as_deref());
        match self.policy.decide(target, &state) {
            Decision::Skip => Some(SkipReason::AlreadyFilled),
            Decision::Fetch => None,
        }
    }

    async fn fetch_text<S: Spreadsheet>(
        &self,
        view: &mut SheetView<'_, S>,
        person: &Person,
        cell: CellAddress,
    ) -> Result<TargetState> {
        let answers = self
            .answers
            .ok_or_else(|| ExecCvError::MissingApiKey(crate::config::PERPLEXITY_KEY_VAR.into()))?;
        let display_name = self.catalog.display_name(cell.key).to_string();
        let prompt = build_field_prompt(person, cell.key, &display_name, self.settings.current_year);

        let response = self.settings.retry.run(|| answers.ask(&prompt)).await?;
        let cleaned = parse_field_answer(&response, cell.key, &display_name)?
            .and_then(|v| self.policy.clean(&v))
            .ok_or_else(|| ExecCvError::NotFound(display_name.clone()))?;

        let background = view
            .read_cell(&CellAddress::new(FieldKey::ProfessionalBackground, cell.row))
            .and_then(|v| self.policy.clean(&v));
        let ctx = AnswerContext {
            background: background.as_deref(),
            valid_categories: &self.settings.valid_categories,
        };
        let value = match validate_answer(cell.key, &cleaned, &ctx) {
            Some(v) => v,
            None => {
                tracing::debug!(cell = %cell.label(self.catalog), answer = %cleaned, "answer rejected");
                let excerpt: String = cleaned.chars().take(40).collect();
                return Err(ExecCvError::NotFound(format!("{}（回答不合理: {}）", display_name, excerpt)));
            }
        };

        view.write_cell(&cell, &value);
        tracing::debug!(cell = %cell.label(self.catalog), "value written");
        Ok(TargetState::Written(value))
    }

    async fn fetch_photo<S: Spreadsheet>(
        &self,
        view: &mut SheetView<'_, S>,
        person: &Person,
        cell: CellAddress,
        reviews: &mut CandidateStore,
    ) -> Result<TargetState> {
        let photos = self
            .photos
            .ok_or_else(|| ExecCvError::MissingApiKey(crate::config::SERPAPI_KEY_VAR.into()))?;

        let mut hits: Vec<ImageHit> = Vec::new();
        let mut last_error = None;

        for (i, query) in photo_queries(person).iter().enumerate() {
            if i > 0 && !self.settings.pause.is_zero() {
                tokio::time::sleep(self.settings.pause).await;
            }
            match self.settings.retry.run(|| photos.search_images(query)).await {
                Ok(found) => hits.extend(found),
                Err(e @ (ExecCvError::QuotaExceeded { .. } | ExecCvError::Auth(_) | ExecCvError::MissingApiKey(_))) => {
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::debug!(query = %query, error = %e, "photo query failed");
                    last_error = Some(e);
                    continue;
                }
            }

            // 額度節約のため、十分な候補が見つかった時点で打ち切る
            let ranked = rank_candidates(&hits, &person.name, self.settings.photo_threshold);
            if !ranked.best_url.is_empty() {
                break;
            }
        }

        if hits.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        let outcome = rank_candidates(&hits, &person.name, self.settings.photo_threshold);
        let status = outcome.status.clone();
        view.write_photo_status(cell.row, &status);

        let searched_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        reviews.insert(
            cell.row,
            PhotoReviewEntry::from_outcome(&person.name, &person.company, outcome, searched_at),
        );
        Ok(TargetState::PendingReview(status))
    }

    fn persist_reviews(&self, paths: &ReviewPaths, fresh: &CandidateStore) -> Result<()> {
        let persist_err = |e: ExecCvError| ExecCvError::Persistence(e.to_string());
        let merged = merge_candidates(&paths.candidates, fresh.clone()).map_err(persist_err)?;
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
        write_review_html(&paths.html, &merged, &generated_at).map_err(persist_err)?;
        tracing::info!(rows = merged.len(), path = %paths.html.display(), "review page updated");
        Ok(())
    }
}

/// 出力欄位と列から処理対象を作る
pub fn targets_for(cells: &[CellAddress], force: bool) -> Vec<EnrichmentTarget> {
    cells.iter().map(|&c| EnrichmentTarget::new(c, force)).collect()
}
