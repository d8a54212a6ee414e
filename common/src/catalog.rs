//! 欄位目錄モジュール
//!
//! 欄位識別子（編號・中文名稱・Excel 欄位代號・內部鍵）を
//! 標準欄位鍵 [`FieldKey`] に解決する。
//!
//! 目錄本身は設定データ。起動時に一度だけ構築し、
//! 以降は不変の値として各處理へ明示的に渡す。

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// 標準欄位鍵
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    Age,
    ProfessionalCategory,
    ProfessionalBackground,
    Education,
    Experience,
    CurrentPosition,
    PersonalTraits,
    BoardSeatsCount,
    BoardTenureYears,
    Email,
    Phone,
    Photo,
}

impl FieldKey {
    pub const ALL: [FieldKey; 12] = [
        FieldKey::Age,
        FieldKey::ProfessionalCategory,
        FieldKey::ProfessionalBackground,
        FieldKey::Education,
        FieldKey::Experience,
        FieldKey::CurrentPosition,
        FieldKey::PersonalTraits,
        FieldKey::BoardSeatsCount,
        FieldKey::BoardTenureYears,
        FieldKey::Email,
        FieldKey::Phone,
        FieldKey::Photo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKey::Age => "age",
            FieldKey::ProfessionalCategory => "professional_category",
            FieldKey::ProfessionalBackground => "professional_background",
            FieldKey::Education => "education",
            FieldKey::Experience => "experience",
            FieldKey::CurrentPosition => "current_position",
            FieldKey::PersonalTraits => "personal_traits",
            FieldKey::BoardSeatsCount => "board_seats_count",
            FieldKey::BoardTenureYears => "board_tenure_years",
            FieldKey::Email => "email",
            FieldKey::Phone => "phone",
            FieldKey::Photo => "photo",
        }
    }

    pub fn is_photo(&self) -> bool {
        matches!(self, FieldKey::Photo)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FieldKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::UnknownField(s.to_string()))
    }
}

/// 可搜尋欄位の定義
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: FieldKey,
    /// 使用者輸入用の編號（1 起算）
    pub index: u32,
    /// 試算表標題列の名稱
    pub display_name: String,
    /// Excel 欄位代號（"H" など）
    pub column: String,
}

/// 識別用欄位（姓名・公司・照片狀態）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub display_name: String,
    pub column: String,
}

impl ColumnSpec {
    fn new(display_name: &str, column: &str) -> Self {
        Self {
            display_name: display_name.into(),
            column: column.into(),
        }
    }

    pub fn column_index(&self) -> Option<usize> {
        column_index(&self.column)
    }
}

/// 欄位目錄
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub fields: Vec<FieldSpec>,
    pub name_column: ColumnSpec,
    pub company_column: ColumnSpec,
    pub photo_status_column: ColumnSpec,
}

impl Default for FieldCatalog {
    fn default() -> Self {
        let table: [(FieldKey, u32, &str, &str); 12] = [
            (FieldKey::Age, 1, "年齡", "C"),
            (FieldKey::ProfessionalCategory, 2, "專業分類", "F"),
            (FieldKey::ProfessionalBackground, 3, "專業背景", "G"),
            (FieldKey::Education, 4, "學歷", "H"),
            (FieldKey::Experience, 5, "主要經歷", "I"),
            (FieldKey::CurrentPosition, 6, "現職/任", "J"),
            (FieldKey::PersonalTraits, 7, "個人特質", "K"),
            (FieldKey::BoardSeatsCount, 8, "現擔任獨董家數(年)", "L"),
            (FieldKey::BoardTenureYears, 9, "擔任獨董年資(年)", "M"),
            (FieldKey::Email, 10, "電子郵件", "N"),
            (FieldKey::Phone, 11, "公司電話", "O"),
            (FieldKey::Photo, 12, "照片", "D"),
        ];

        Self {
            fields: table
                .iter()
                .map(|&(key, index, name, column)| FieldSpec {
                    key,
                    index,
                    display_name: name.into(),
                    column: column.into(),
                })
                .collect(),
            name_column: ColumnSpec::new("姓名（中英）", "A"),
            company_column: ColumnSpec::new("所屬公司", "B"),
            photo_status_column: ColumnSpec::new("照片狀態", "E"),
        }
    }
}

impl FieldCatalog {
    /// 設定から読み込んだ目錄の整合性を檢查
    pub fn validate(&self) -> Result<()> {
        let mut keys = HashSet::new();
        let mut indices = HashSet::new();
        let mut names = HashSet::new();
        let mut columns = HashSet::new();

        let identity = [&self.name_column, &self.company_column, &self.photo_status_column];
        let all_columns = self
            .fields
            .iter()
            .map(|f| f.column.as_str())
            .chain(identity.iter().map(|c| c.column.as_str()));

        for column in all_columns {
            if column_index(column).is_none() {
                return Err(Error::Config(format!("無效的欄位代號: '{}'", column)));
            }
            if !columns.insert(column.to_ascii_uppercase()) {
                return Err(Error::Config(format!("欄位代號重複: '{}'", column)));
            }
        }

        for field in &self.fields {
            if !keys.insert(field.key) {
                return Err(Error::Config(format!("欄位鍵重複: {}", field.key)));
            }
            if field.index == 0 || !indices.insert(field.index) {
                return Err(Error::Config(format!("欄位編號無效或重複: {}", field.index)));
            }
            if field.display_name.trim().is_empty() || !names.insert(field.display_name.as_str()) {
                return Err(Error::Config(format!(
                    "欄位名稱無效或重複: '{}'",
                    field.display_name
                )));
            }
        }

        Ok(())
    }

    /// 欄位識別子を標準欄位鍵に解決
    ///
    /// 解決順序: 編號 → 中文名稱 → 欄位代號（不分大小寫）→ 內部鍵
    pub fn resolve(&self, input: &str) -> Result<FieldKey> {
        let id = input.trim();
        if id.is_empty() {
            return Err(Error::UnknownField(input.to_string()));
        }

        if let Ok(index) = id.parse::<u32>() {
            if let Some(spec) = self.fields.iter().find(|f| f.index == index) {
                return Ok(spec.key);
            }
        }

        if let Some(spec) = self.fields.iter().find(|f| f.display_name == id) {
            return Ok(spec.key);
        }

        if let Some(key) = self.key_for_column(id) {
            return Ok(key);
        }

        match id.parse::<FieldKey>() {
            Ok(key) if self.spec(key).is_some() => Ok(key),
            _ => Err(Error::UnknownField(id.to_string())),
        }
    }

    /// 欄位代號から欄位鍵を取得（不分大小寫）
    pub fn key_for_column(&self, column: &str) -> Option<FieldKey> {
        self.fields
            .iter()
            .find(|f| f.column.eq_ignore_ascii_case(column))
            .map(|f| f.key)
    }

    pub fn spec(&self, key: FieldKey) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn column_of(&self, key: FieldKey) -> Option<&str> {
        self.spec(key).map(|f| f.column.as_str())
    }

    pub fn display_name(&self, key: FieldKey) -> &str {
        self.spec(key)
            .map(|f| f.display_name.as_str())
            .unwrap_or_else(|| key.as_str())
    }

    /// 排序用の順位（編號順）
    pub fn order_of(&self, key: FieldKey) -> u32 {
        self.spec(key).map(|f| f.index).unwrap_or(u32::MAX)
    }

    /// 編號順の欄位一覽
    pub fn fields_by_index(&self) -> Vec<&FieldSpec> {
        let mut fields: Vec<&FieldSpec> = self.fields.iter().collect();
        fields.sort_by_key(|f| f.index);
        fields
    }

    /// 照片以外の可搜尋欄位（編號順）
    pub fn text_fields(&self) -> Vec<FieldKey> {
        self.fields_by_index()
            .into_iter()
            .map(|f| f.key)
            .filter(|k| !k.is_photo())
            .collect()
    }
}

/// 欄位代號を 0 起算の欄位位置に変換（"A" → 0, "AA" → 26）
pub fn column_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    let mut index = 0usize;
    for c in letters.chars() {
        let digit = (c.to_ascii_uppercase() as u8 - b'A') as usize + 1;
        index = index * 26 + digit;
    }
    Some(index - 1)
}

/// 0 起算の欄位位置を欄位代號に変換
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}
