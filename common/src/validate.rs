//! 回答検証モジュール
//!
//! 整形済みの回答を欄位ごとに検査し、儲存格に書く値を決める。
//! 不合理な値（年齡と年資の矛盾、新聞片段の學歷、代表信箱など）は `None`。

use crate::catalog::FieldKey;
use regex::Regex;

lazy_static::lazy_static! {
    static ref FIRST_NUMBER_RE: Regex = Regex::new(r"(\d+)").unwrap();
    static ref EXPERIENCE_RE: Regex = Regex::new(r"約\s*(\d+)\s*年").unwrap();
    static ref PHONE_DIGITS_RE: Regex = Regex::new(r"\d{6,}").unwrap();
    static ref EDUCATION_GARBAGE_RE: Regex = Regex::new(
        r"(?i)\d+\s*(day|hour|minute|second)s?\s*ago|\d+\s*(天|小時|分鐘)前|[·》《]|https?://|申請來港|虛報|涉|被捕|起訴|判刑|詐騙|偽造|總經理|董事長|執行長|CEO|請培養|- (星島|蘋果|Yahoo|ETtoday|聯合|中時|自由)"
    )
    .unwrap();
}

/// 高階主管として妥当な年齡
pub const MIN_AGE: u32 = 35;
pub const MAX_AGE: u32 = 85;

/// 就業開始年齡の想定
const CAREER_START_AGE: u32 = 22;

const MAX_EDUCATION_CHARS: usize = 100;
const MIN_EDUCATION_CHARS: usize = 5;

const EDUCATION_KEYWORDS: &[&str] = &[
    "大學", "學院", "研究所", "學系", "系", "學士", "碩士", "博士", "畢業",
    "University", "College", "Institute", "School",
    "Bachelor", "Master", "MBA", "EMBA", "PhD", "Doctor",
    "B.S.", "M.S.", "B.A.", "M.A.", "B.B.A.", "M.B.A.",
];

const GENERIC_MAILBOXES: &[&str] = &["info@", "contact@", "service@", "support@", "admin@", "hello@"];

/// 検証に使う同じ列の情報
#[derive(Debug, Clone, Copy, Default)]
pub struct AnswerContext<'a> {
    /// 同じ列の專業背景（「約 N 年...」）
    pub background: Option<&'a str>,
    pub valid_categories: &'a [String],
}

/// 專業背景から年資を取り出す
pub fn experience_years(background: &str) -> Option<u32> {
    EXPERIENCE_RE
        .captures(background)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// 年齡の妥当性（35-85 歲、年資と矛盾しない）
pub fn is_valid_age(age: &str, background: Option<&str>) -> bool {
    let Some(age) = FIRST_NUMBER_RE
        .captures(age)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
    else {
        return false;
    };

    if !(MIN_AGE..=MAX_AGE).contains(&age) {
        return false;
    }

    match background.and_then(experience_years) {
        Some(years) => age >= CAREER_START_AGE + years,
        None => true,
    }
}

/// 學歷 1 項目の妥当性
pub fn is_valid_education_entry(text: &str) -> bool {
    let text = text.trim();
    let chars = text.chars().count();
    if !(MIN_EDUCATION_CHARS..=MAX_EDUCATION_CHARS).contains(&chars) {
        return false;
    }
    if EDUCATION_GARBAGE_RE.is_match(text) {
        return false;
    }
    EDUCATION_KEYWORDS.iter().any(|k| text.contains(k))
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '/' | '／' | '、' | '・'))
        .collect()
}

/// 專業分類を有効な分類名に正規化
///
/// 完全一致 → 部分一致 → 區隔符號を除いた比較の順に試す。
pub fn normalize_category(raw: &str, valid: &[String]) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(hit) = valid.iter().find(|v| v.as_str() == raw) {
        return Some(hit.clone());
    }
    if let Some(hit) = valid
        .iter()
        .find(|v| raw.contains(v.as_str()) || v.contains(raw))
    {
        return Some(hit.clone());
    }

    let squashed = squash(raw);
    valid
        .iter()
        .find(|v| {
            let candidate = squash(v);
            squashed == candidate || squashed.contains(&candidate)
        })
        .cloned()
}

fn is_personal_email(email: &str) -> bool {
    let lowered = email.to_lowercase();
    lowered.contains('@') && !GENERIC_MAILBOXES.iter().any(|g| lowered.contains(g))
}

fn has_phone_digits(phone: &str) -> bool {
    let digits: String = phone.chars().filter(|c| *c != '-' && *c != ' ').collect();
    PHONE_DIGITS_RE.is_match(&digits)
}

/// 欄位ごとの検証。採用する値、または `None`
pub fn validate_answer(key: FieldKey, value: &str, ctx: &AnswerContext<'_>) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    match key {
        FieldKey::Age => is_valid_age(value, ctx.background).then(|| value.to_string()),
        FieldKey::ProfessionalCategory => normalize_category(value, ctx.valid_categories),
        FieldKey::Education => {
            let entries: Vec<&str> = value
                .lines()
                .map(str::trim)
                .filter(|l| is_valid_education_entry(l))
                .collect();
            (!entries.is_empty()).then(|| entries.join("\n"))
        }
        FieldKey::Email => is_personal_email(value).then(|| value.to_string()),
        FieldKey::Phone => has_phone_digits(value).then(|| value.to_string()),
        _ => Some(value.to_string()),
    }
}
