//! 合併方針モジュール
//!
//! 既存の儲存格內容と force 旗標から、外部搜尋を行うか（FETCH）
//! 既存資料を保持するか（SKIP）を決定する。

use crate::range::CellAddress;
use serde::{Deserialize, Serialize};

/// 空白とみなすプレースホルダー値（大小寫不區分）
pub const DEFAULT_PLACEHOLDERS: &[&str] = &[
    "null", "none", "nan", "n/a", "na", "undefined",
    "已略過", "待補充", "(待補充)", "（待補充）",
    "無", "無資料", "找不到", "未知", "不明",
    "暫無", "尚無", "缺", "空", "nil",
];

/// この語で始まる回答も空白とみなす（「無法確認」「查無資料」など）
pub const PLACEHOLDER_PREFIXES: &[&str] = &["無法", "找不到", "查無", "尚未", "暫無法"];

/// 処理単位: 儲存格 + 強制更新旗標
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentTarget {
    pub cell: CellAddress,
    pub force: bool,
}

impl EnrichmentTarget {
    pub fn new(cell: CellAddress, force: bool) -> Self {
        Self { cell, force }
    }
}

/// 既存儲存格の狀態
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellState {
    /// 試算表の範圍外
    Absent,
    /// 空白・空白字元のみ・プレースホルダー
    Blank,
    Filled(String),
}

impl CellState {
    pub fn is_filled(&self) -> bool {
        matches!(self, CellState::Filled(_))
    }
}

/// 判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Fetch,
    Skip,
}

#[derive(Debug, Clone)]
pub struct MergePolicy {
    placeholders: Vec<String>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDERS.iter().copied())
    }
}

impl MergePolicy {
    pub fn new<I, S>(placeholders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            placeholders: placeholders
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .collect(),
        }
    }

    fn is_placeholder(&self, value: &str) -> bool {
        let lowered = value.to_lowercase();
        self.placeholders.iter().any(|p| *p == lowered)
            || PLACEHOLDER_PREFIXES.iter().any(|p| value.starts_with(p))
    }

    /// 値を整形。空白・プレースホルダーは None
    pub fn clean(&self, value: &str) -> Option<String> {
        let trimmed = value.trim();
        if trimmed.is_empty() || self.is_placeholder(trimmed) {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// 生の儲存格値を狀態に分類
    pub fn cell_state(&self, raw: Option<&str>) -> CellState {
        match raw {
            None => CellState::Absent,
            Some(value) => match self.clean(value) {
                Some(v) => CellState::Filled(v),
                None => CellState::Blank,
            },
        }
    }

    /// 既存資料があり force でなければ SKIP、それ以外は FETCH
    pub fn decide(&self, target: &EnrichmentTarget, state: &CellState) -> Decision {
        if state.is_filled() && !target.force {
            Decision::Skip
        } else {
            Decision::Fetch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FieldKey;

    fn target(force: bool) -> EnrichmentTarget {
        EnrichmentTarget::new(CellAddress::new(FieldKey::Education, 5), force)
    }

    #[test]
    fn test_filled_not_forced_is_skipped() {
        let policy = MergePolicy::default();
        let state = policy.cell_state(Some("國立台灣大學 電機系 學士"));
        assert_eq!(policy.decide(&target(false), &state), Decision::Skip);
    }

    #[test]
    fn test_forced_is_always_fetched() {
        let policy = MergePolicy::default();
        for raw in [Some("已有資料"), Some(""), Some("待補充"), None] {
            let state = policy.cell_state(raw);
            assert_eq!(policy.decide(&target(true), &state), Decision::Fetch, "raw: {:?}", raw);
        }
    }

    #[test]
    fn test_blank_and_absent_are_fetched() {
        let policy = MergePolicy::default();
        for raw in [None, Some(""), Some("   "), Some("N/A"), Some("（待補充）"), Some("NaN")] {
            let state = policy.cell_state(raw);
            assert!(!state.is_filled());
            assert_eq!(policy.decide(&target(false), &state), Decision::Fetch, "raw: {:?}", raw);
        }
    }

    #[test]
    fn test_cell_state_classification() {
        let policy = MergePolicy::default();
        assert_eq!(policy.cell_state(None), CellState::Absent);
        assert_eq!(policy.cell_state(Some(" 無 ")), CellState::Blank);
        assert_eq!(
            policy.cell_state(Some(" 55歲 ")),
            CellState::Filled("55歲".to_string())
        );
    }

    #[test]
    fn test_placeholder_prefixes() {
        let policy = MergePolicy::default();
        for raw in ["無法確認", "查無此人", "尚未公開", "暫無法取得", "找不到相關資料", "NIL", "暫無"] {
            assert_eq!(policy.clean(raw), None, "raw: {:?}", raw);
        }
        assert_eq!(policy.clean("國立台灣大學 無機化學"), Some("國立台灣大學 無機化學".to_string()));
    }

    #[test]
    fn test_clean_custom_placeholders() {
        let policy = MergePolicy::new(["TBD"]);
        assert_eq!(policy.clean("tbd"), None);
        assert_eq!(policy.clean("待補充"), Some("待補充".to_string()));
    }
}
