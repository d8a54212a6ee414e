//! 範圍指定パーサー
//!
//! 使用者が入力する列號範圍（"2, 5-10, 15"）と
//! 儲存格範圍（"H26-H30", "學歷:26-30"）を具体的な処理対象に展開する。
//!
//! 出力は常に昇順・重複なし。入力の順序には依存しない。

use crate::catalog::{FieldCatalog, FieldKey};
use crate::error::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

lazy_static::lazy_static! {
    static ref CELL_RE: Regex = Regex::new(r"^([A-Za-z]{1,3})\s*(\d+)$").unwrap();
}

/// xlsx の最大列號
pub const MAX_ROW: u32 = 1_048_576;

/// 1 項目の範圍で展開できる最大列數
pub const MAX_SPAN: u32 = 10_000;

/// 全形の區隔符號を半形に正規化
fn normalize(input: &str) -> String {
    input.replace('，', ",").replace('：', ":")
}

/// 列號の集合（1 起算、昇順）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSelector {
    rows: BTreeSet<u32>,
}

impl RowSelector {
    pub fn rows(&self) -> impl Iterator<Item = u32> + '_ {
        self.rows.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<u32> {
        self.rows.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, row: u32) -> bool {
        self.rows.contains(&row)
    }
}

/// 標準形式で出力（"2, 5-10, 15"）。再度パースすると同じ集合になる
impl fmt::Display for RowSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut runs: Vec<(u32, u32)> = Vec::new();
        for row in self.rows() {
            match runs.last_mut() {
                Some((_, end)) if *end + 1 == row => *end = row,
                _ => runs.push((row, row)),
            }
        }

        let parts: Vec<String> = runs
            .iter()
            .map(|&(start, end)| {
                if start == end {
                    start.to_string()
                } else {
                    format!("{}-{}", start, end)
                }
            })
            .collect();
        f.write_str(&parts.join(", "))
    }
}

/// 儲存格位置（欄位鍵 + 列號）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellAddress {
    pub key: FieldKey,
    pub row: u32,
}

impl CellAddress {
    pub fn new(key: FieldKey, row: u32) -> Self {
        Self { key, row }
    }

    /// Excel 形式の表示（"H26"）
    pub fn label(&self, catalog: &FieldCatalog) -> String {
        format!("{}{}", catalog.column_of(self.key).unwrap_or("?"), self.row)
    }
}

/// 展開前に列號の上限と範圍の幅を検査
fn check_bounds(token: &str, start: u32, end: u32) -> Result<()> {
    if start > end {
        return Err(Error::invalid_range(format!(
            "'{}' 起始列大於結束列",
            token
        )));
    }
    if end > MAX_ROW {
        return Err(Error::invalid_range(format!(
            "'{}' 超過最大列號 {}",
            token, MAX_ROW
        )));
    }
    if end - start >= MAX_SPAN {
        return Err(Error::invalid_range(format!(
            "'{}' 一次最多 {} 列",
            token, MAX_SPAN
        )));
    }
    Ok(())
}

/// 單一項目 "n" または "start-end" を解析
fn parse_row_token(token: &str) -> Result<(u32, u32)> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::invalid_range("範圍中有空白的項目"));
    }

    let parse = |s: &str| -> Result<u32> {
        let s = s.trim();
        s.parse::<u32>()
            .map_err(|_| Error::invalid_range(format!("無法解析數字 '{}'", s)))
    };

    match token.split_once('-') {
        Some((start, end)) => {
            let (start, end) = (parse(start)?, parse(end)?);
            check_bounds(token, start, end)?;
            Ok((start, end))
        }
        None => {
            let row = parse(token)?;
            check_bounds(token, row, row)?;
            Ok((row, row))
        }
    }
}

/// 列號範圍を解析
///
/// # Examples
/// ```
/// use exec_cv_common::parse_rows;
///
/// let rows = parse_rows("2, 5-10, 15").unwrap();
/// assert_eq!(rows.to_vec(), vec![2, 5, 6, 7, 8, 9, 10, 15]);
/// ```
pub fn parse_rows(input: &str) -> Result<RowSelector> {
    let input = normalize(input);
    let mut rows = BTreeSet::new();

    for token in input.split(',') {
        let (start, end) = parse_row_token(token)?;
        rows.extend((start..=end).filter(|&r| r > 0));
    }

    Ok(RowSelector { rows })
}

/// "H26" 形式を (欄位代號, 列號) に分解
fn split_cell(part: &str) -> Result<(&str, u32)> {
    let caps = CELL_RE
        .captures(part)
        .ok_or_else(|| Error::invalid_range(format!("無法解析儲存格 '{}'", part)))?;
    let letters = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    let row = caps
        .get(2)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .parse::<u32>()
        .map_err(|_| Error::invalid_range(format!("列號超出範圍 '{}'", part)))?;
    Ok((letters, row))
}

fn resolve_letters(catalog: &FieldCatalog, letters: &str) -> Result<FieldKey> {
    catalog
        .key_for_column(letters)
        .ok_or_else(|| Error::UnknownField(letters.to_uppercase()))
}

/// 單一儲存格項目を解析して追加
fn parse_cell_token(
    catalog: &FieldCatalog,
    token: &str,
    out: &mut Vec<CellAddress>,
) -> Result<()> {
    let token = token.trim();
    if token.is_empty() {
        return Err(Error::invalid_range("範圍中有空白的項目"));
    }

    // 欄位名稱:列號範圍（"學歷:26-30"）
    if let Some((field, rows)) = token.split_once(':') {
        let key = catalog.resolve(field)?;
        let (start, end) = parse_row_token(rows)?;
        out.extend((start..=end).map(|row| CellAddress::new(key, row)));
        return Ok(());
    }

    // 欄位代號範圍（"H26-H30"）
    if let Some((first, last)) = token.split_once('-') {
        let (first_letters, start) = split_cell(first.trim())?;
        let (last_letters, end) = split_cell(last.trim())?;
        if !first_letters.eq_ignore_ascii_case(last_letters) {
            return Err(Error::invalid_range(format!(
                "'{}' 範圍的欄位代號不一致",
                token
            )));
        }
        check_bounds(token, start, end)?;
        let key = resolve_letters(catalog, first_letters)?;
        out.extend((start..=end).map(|row| CellAddress::new(key, row)));
        return Ok(());
    }

    // 單一儲存格（"H26"）
    let (letters, row) = split_cell(token)?;
    check_bounds(token, row, row)?;
    let key = resolve_letters(catalog, letters)?;
    out.push(CellAddress::new(key, row));
    Ok(())
}

/// 儲存格範圍を解析
///
/// 對應格式: "H26", "H26-H30", "H26,I27", "學歷:26", "4:26-30"
/// 出力は列號 → 欄位編號の順に並び、重複は除去される。
pub fn parse_cells(input: &str, catalog: &FieldCatalog) -> Result<Vec<CellAddress>> {
    let input = normalize(input);
    let mut cells = Vec::new();

    for token in input.split(',') {
        parse_cell_token(catalog, token, &mut cells)?;
    }

    cells.retain(|c| c.row > 0);
    cells.sort_by_key(|c| (c.row, catalog.order_of(c.key)));
    cells.dedup();
    Ok(cells)
}

/// 欄位 × 列號の組み合わせを展開
pub fn cells_for_rows(keys: &[FieldKey], rows: &RowSelector) -> Vec<CellAddress> {
    rows.rows()
        .flat_map(|row| keys.iter().map(move |&key| CellAddress::new(key, row)))
        .collect()
}
