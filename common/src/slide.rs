//! 簡報內容の整形モジュール
//!
//! 試算表 1 列分の値から、CV 簡報 1 份の描画データ・
//! 分類資料夾名・檔名を組み立てる。描画そのものは外部の描画器に任せる。

use crate::catalog::FieldKey;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 分類できなかった場合の資料夾名
pub const UNCATEGORIZED: &str = "未分類";
const EMPTY_TEXT: &str = "(待補充)";
const INVALID_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

/// 簡報上の區塊定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub label: String,
    pub key: FieldKey,
    pub side: Side,
    pub multiline: bool,
    pub empty_text: String,
}

impl SectionSpec {
    fn new(label: &str, key: FieldKey, side: Side, multiline: bool, empty_text: &str) -> Self {
        Self {
            label: label.into(),
            key,
            side,
            multiline,
            empty_text: empty_text.into(),
        }
    }
}

/// 標準 CV 範本の區塊配置
pub fn default_sections() -> Vec<SectionSpec> {
    vec![
        SectionSpec::new("專業背景", FieldKey::ProfessionalBackground, Side::Left, false, EMPTY_TEXT),
        SectionSpec::new("學歷", FieldKey::Education, Side::Left, true, EMPTY_TEXT),
        SectionSpec::new("主要經歷", FieldKey::Experience, Side::Left, true, EMPTY_TEXT),
        SectionSpec::new("現任", FieldKey::CurrentPosition, Side::Right, true, EMPTY_TEXT),
        SectionSpec::new("個人特質", FieldKey::PersonalTraits, Side::Right, true, EMPTY_TEXT),
        SectionSpec::new("現擔任獨董家數", FieldKey::BoardSeatsCount, Side::Right, false, "0"),
        SectionSpec::new("擔任獨董年資", FieldKey::BoardTenureYears, Side::Right, false, "0"),
    ]
}

/// 描画器に渡す區塊
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSection {
    pub label: String,
    pub text: String,
    pub multiline: bool,
    /// 値が空で empty_text を使った場合 true
    pub placeholder: bool,
}

/// 1 列分の人物資料
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    pub row: u32,
    pub name: String,
    pub company: String,
    pub values: BTreeMap<FieldKey, String>,
}

impl PersonRecord {
    pub fn value(&self, key: FieldKey) -> Option<&str> {
        self.values
            .get(&key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

/// 描画器へ渡す簡報資料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidePayload {
    pub row: u32,
    pub name: String,
    pub company: String,
    pub age: String,
    pub photo_url: Option<String>,
    pub category: String,
    pub left: Vec<SlideSection>,
    pub right: Vec<SlideSection>,
}

impl SlidePayload {
    /// 複数行の區塊数
    pub fn multiline_count(&self) -> usize {
        self.left
            .iter()
            .chain(self.right.iter())
            .filter(|s| !s.placeholder && s.text.contains('\n'))
            .count()
    }
}

pub fn format_section(spec: &SectionSpec, raw: Option<&str>) -> SlideSection {
    let value = raw.map(str::trim).filter(|v| !v.is_empty());
    SlideSection {
        label: spec.label.clone(),
        text: value.unwrap_or(&spec.empty_text).to_string(),
        multiline: spec.multiline,
        placeholder: value.is_none(),
    }
}

/// 專業分類から資料夾名を決定（有効な分類以外は「未分類」、"/" は "_"）
pub fn category_folder(raw: Option<&str>, valid_categories: &[String]) -> String {
    let category = raw
        .map(str::trim)
        .filter(|c| valid_categories.iter().any(|v| v == c))
        .unwrap_or(UNCATEGORIZED);
    category.replace('/', "_")
}

/// 檔名に使えない文字を除去
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .filter(|c| !INVALID_FILENAME_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn contains_cjk(s: &str) -> bool {
    s.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

/// 簡報檔名（"王大明_台積電_CV.pptx"）
pub fn cv_file_name(name: &str, company: &str) -> String {
    let person = name.split_whitespace().next().unwrap_or(name);

    let tokens: Vec<&str> = company.split_whitespace().collect();
    let company_name = match tokens.last() {
        Some(last) if contains_cjk(last) => last,
        _ => tokens.first().copied().unwrap_or(company),
    };

    sanitize_filename(&format!("{}_{}_CV.pptx", person, company_name))
}

/// 人物資料から簡報資料を組み立てる
pub fn build_payload(
    record: &PersonRecord,
    sections: &[SectionSpec],
    valid_categories: &[String],
) -> SlidePayload {
    let mut left = Vec::new();
    let mut right = Vec::new();
    for spec in sections {
        let section = format_section(spec, record.value(spec.key));
        match spec.side {
            Side::Left => left.push(section),
            Side::Right => right.push(section),
        }
    }

    let photo_url = record
        .value(FieldKey::Photo)
        .filter(|u| u.to_lowercase().starts_with("http"))
        .map(str::to_string);

    SlidePayload {
        row: record.row,
        name: record.name.trim().to_string(),
        company: record.company.trim().to_string(),
        age: record.value(FieldKey::Age).unwrap_or_default().to_string(),
        photo_url,
        category: category_folder(record.value(FieldKey::ProfessionalCategory), valid_categories),
        left,
        right,
    }
}
