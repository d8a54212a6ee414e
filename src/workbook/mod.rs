//! 試算表モジュール
//!
//! xlsx を calamine で記憶體に読み込み、儲存格単位で読み書きし、
//! rust_xlsxwriter で書き出して一時檔經由で原子的に置き換える。
//!
//! 読み書きするのは 1 枚目のワークシート。他のワークシートと數式はそのまま書き戻す。

use crate::error::{ExecCvError, Result};
use calamine::{open_workbook_auto, Data, Range, Reader, SheetType, SheetVisible};
use exec_cv_common::slide::PersonRecord;
use exec_cv_common::{CellAddress, FieldCatalog, FieldKey};
use rust_xlsxwriter::{Format, Formula, Workbook, Worksheet, XlsxError};
use std::io::Write;
use std::path::{Path, PathBuf};

/// 標題列の列號
pub const HEADER_ROW: u32 = 1;

/// 儲存格の値
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// 數式と最後に計算された値
    Formula { formula: String, cached: String },
}

impl CellValue {
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            // 整數値は小數點なしで表示（"55" であって "55.0" ではない）
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            CellValue::Number(n) => n.to_string(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Formula { cached, .. } => cached.clone(),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty => CellValue::Empty,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Float(f) => CellValue::Number(*f),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::Error(_) => CellValue::Empty,
            other => CellValue::Text(other.to_string()),
        }
    }
}

/// 試算表の読み書き境界
///
/// 列號は 1 起算、欄號は 0 起算（A = 0）。
pub trait Spreadsheet {
    /// 資料範圍外の位置は `None`、範圍內の空儲存格は `Some("")`
    fn read(&self, row: u32, column: usize) -> Option<String>;
    fn write(&mut self, row: u32, column: usize, value: &str);
    /// 最終資料列（標題列のみなら 1）
    fn last_row(&self) -> u32;
    fn save(&mut self) -> Result<()>;
}

/// 1 枚のワークシート
#[derive(Debug, Clone)]
struct SheetData {
    name: String,
    hidden: bool,
    rows: Vec<Vec<CellValue>>,
}

/// 値と數式の 2 つの範圍を 1 つの格子にまとめる（位置は絶対座標）
fn load_grid(values: &Range<Data>, formulas: Option<&Range<String>>) -> Vec<Vec<CellValue>> {
    let ends = [values.end(), formulas.and_then(|f| f.end())];
    let Some((end_row, end_col)) = ends
        .iter()
        .flatten()
        .copied()
        .reduce(|a, b| (a.0.max(b.0), a.1.max(b.1)))
    else {
        return Vec::new();
    };

    (0..=end_row)
        .map(|r| {
            (0..=end_col)
                .map(|c| {
                    let value = values
                        .get_value((r, c))
                        .map(CellValue::from)
                        .unwrap_or(CellValue::Empty);
                    match formulas.and_then(|f| f.get_value((r, c))) {
                        Some(formula) if !formula.is_empty() => CellValue::Formula {
                            formula: formula.clone(),
                            cached: value.as_text(),
                        },
                        _ => value,
                    }
                })
                .collect()
        })
        .collect()
}

/// 記憶體上の試算表
#[derive(Debug, Clone)]
pub struct XlsxSheet {
    /// 先頭が読み書き対象
    sheets: Vec<SheetData>,
    /// 書き戻せないシート（グラフシートなど）
    unsupported: Vec<String>,
    destination: PathBuf,
    dirty: bool,
}

impl XlsxSheet {
    /// 既存の xlsx を読み込む。保存先は `destination`
    pub fn open(source: &Path, destination: &Path) -> Result<Self> {
        if !source.exists() {
            return Err(ExecCvError::FileNotFound(source.display().to_string()));
        }

        let mut workbook = open_workbook_auto(source)
            .map_err(|e| ExecCvError::Workbook(format!("{}: {}", source.display(), e)))?;
        let metadata: Vec<(String, bool, bool)> = workbook
            .sheets_metadata()
            .iter()
            .map(|s| {
                (
                    s.name.clone(),
                    matches!(s.typ, SheetType::WorkSheet),
                    !matches!(s.visible, SheetVisible::Visible),
                )
            })
            .collect();

        let mut sheets = Vec::new();
        let mut unsupported = Vec::new();
        for (name, is_worksheet, hidden) in metadata {
            if !is_worksheet {
                unsupported.push(name);
                continue;
            }
            let values = workbook
                .worksheet_range(&name)
                .map_err(|e| ExecCvError::Workbook(format!("{}: {}", name, e)))?;
            let formulas = match workbook.worksheet_formula(&name) {
                Ok(f) => Some(f),
                Err(e) => {
                    tracing::debug!(sheet = %name, error = %e, "formulas unavailable");
                    None
                }
            };
            sheets.push(SheetData {
                rows: load_grid(&values, formulas.as_ref()),
                name,
                hidden,
            });
        }

        if sheets.is_empty() {
            return Err(ExecCvError::Workbook("工作表不存在".into()));
        }
        if !unsupported.is_empty() {
            tracing::warn!(sheets = ?unsupported, "workbook contains sheets that cannot be rewritten");
        }
        tracing::debug!(
            path = %source.display(),
            sheets = sheets.len(),
            rows = sheets[0].rows.len(),
            "workbook loaded"
        );

        Ok(Self {
            sheets,
            unsupported,
            destination: destination.to_path_buf(),
            dirty: false,
        })
    }

    /// 文字列の 2 次元配列から作成（1 行目が標題列）
    pub fn from_rows<S: AsRef<str>>(rows: &[Vec<S>], destination: &Path) -> Self {
        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| match v.as_ref() {
                        "" => CellValue::Empty,
                        s => CellValue::Text(s.to_string()),
                    })
                    .collect()
            })
            .collect();

        Self {
            sheets: vec![SheetData {
                name: "Sheet1".into(),
                hidden: false,
                rows,
            }],
            unsupported: Vec::new(),
            destination: destination.to_path_buf(),
            dirty: true,
        }
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    fn rows(&self) -> &[Vec<CellValue>] {
        &self.sheets[0].rows
    }

    fn rows_mut(&mut self) -> &mut Vec<Vec<CellValue>> {
        &mut self.sheets[0].rows
    }

    fn to_xlsx_buffer(&self) -> Result<Vec<u8>> {
        let xlsx_err = |e: XlsxError| ExecCvError::Persistence(e.to_string());

        let mut workbook = Workbook::new();
        for (i, sheet) in self.sheets.iter().enumerate() {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(&sheet.name).map_err(xlsx_err)?;
            if sheet.hidden && i > 0 {
                worksheet.set_hidden(true);
            }
            write_rows(worksheet, &sheet.rows, i == 0).map_err(xlsx_err)?;
        }

        workbook.save_to_buffer().map_err(xlsx_err)
    }
}

/// 1 枚分の儲存格を書く。`working` なら標題列を太字にする
fn write_rows(
    worksheet: &mut Worksheet,
    rows: &[Vec<CellValue>],
    working: bool,
) -> std::result::Result<(), XlsxError> {
    let wrap = Format::new().set_text_wrap();
    let header = Format::new().set_bold();

    for (r, row) in rows.iter().enumerate() {
        let r = r as u32;
        for (c, value) in row.iter().enumerate() {
            let c = c as u16;
            match value {
                CellValue::Empty => {}
                CellValue::Text(s) if working && r == 0 => {
                    worksheet.write_string_with_format(r, c, s, &header)?;
                }
                CellValue::Text(s) if s.contains('\n') => {
                    worksheet.write_string_with_format(r, c, s, &wrap)?;
                }
                CellValue::Text(s) => {
                    worksheet.write_string(r, c, s)?;
                }
                CellValue::Number(n) => {
                    worksheet.write_number(r, c, *n)?;
                }
                CellValue::Bool(b) => {
                    worksheet.write_boolean(r, c, *b)?;
                }
                CellValue::Formula { formula, cached } => {
                    worksheet.write_formula(r, c, Formula::new(formula).set_result(cached))?;
                }
            }
        }
    }
    Ok(())
}

impl Spreadsheet for XlsxSheet {
    fn read(&self, row: u32, column: usize) -> Option<String> {
        if row == 0 || row > self.last_row() {
            return None;
        }
        let cells = &self.rows()[(row - 1) as usize];
        Some(cells.get(column).map(CellValue::as_text).unwrap_or_default())
    }

    fn write(&mut self, row: u32, column: usize, value: &str) {
        if row == 0 {
            return;
        }
        let r = (row - 1) as usize;
        let rows = self.rows_mut();
        if rows.len() <= r {
            rows.resize(r + 1, Vec::new());
        }
        let cells = &mut rows[r];
        if cells.len() <= column {
            cells.resize(column + 1, CellValue::Empty);
        }
        cells[column] = if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value.to_string())
        };
        self.dirty = true;
    }

    fn last_row(&self) -> u32 {
        self.rows().len() as u32
    }

    /// 同じ資料夾の一時檔に書いてから rename する
    fn save(&mut self) -> Result<()> {
        if !self.unsupported.is_empty() {
            return Err(ExecCvError::Persistence(format!(
                "無法保留工作表 {}（圖表等），請另存為只含工作表的活頁簿",
                self.unsupported.join(", ")
            )));
        }
        let buffer = self.to_xlsx_buffer()?;
        let persist_err = |e: std::io::Error| {
            ExecCvError::Persistence(format!("{}: {}", self.destination.display(), e))
        };

        let dir = match self.destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(persist_err)?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(persist_err)?;
        temp.write_all(&buffer).map_err(persist_err)?;
        temp.as_file().sync_all().map_err(persist_err)?;
        temp.persist(&self.destination).map_err(|e| persist_err(e.error))?;

        self.dirty = false;
        tracing::info!(path = %self.destination.display(), "workbook saved");
        Ok(())
    }
}

/// 欄位目錄を通した試算表アクセス
pub struct SheetView<'a, S: Spreadsheet> {
    pub sheet: &'a mut S,
    pub catalog: &'a FieldCatalog,
}

impl<'a, S: Spreadsheet> SheetView<'a, S> {
    pub fn new(sheet: &'a mut S, catalog: &'a FieldCatalog) -> Self {
        Self { sheet, catalog }
    }

    fn column(&self, key: FieldKey) -> Option<usize> {
        self.catalog.spec(key).and_then(|s| exec_cv_common::column_index(&s.column))
    }

    pub fn read_cell(&self, cell: &CellAddress) -> Option<String> {
        self.sheet.read(cell.row, self.column(cell.key)?)
    }

    pub fn write_cell(&mut self, cell: &CellAddress, value: &str) {
        if let Some(column) = self.column(cell.key) {
            self.sheet.write(cell.row, column, value);
        }
    }

    pub fn name(&self, row: u32) -> String {
        self.identity(row, self.catalog.name_column.column_index())
    }

    pub fn company(&self, row: u32) -> String {
        self.identity(row, self.catalog.company_column.column_index())
    }

    fn identity(&self, row: u32, column: Option<usize>) -> String {
        column
            .and_then(|c| self.sheet.read(row, c))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    pub fn write_photo_status(&mut self, row: u32, status: &str) {
        if let Some(column) = self.catalog.photo_status_column.column_index() {
            self.sheet.write(row, column, status);
        }
    }

    pub fn photo_status(&self, row: u32) -> String {
        self.identity(row, self.catalog.photo_status_column.column_index())
    }

    /// 資料列（標題列を除く）に含まれるか
    pub fn is_data_row(&self, row: u32) -> bool {
        row > HEADER_ROW && row <= self.sheet.last_row()
    }

    /// 1 列分の全欄位を読む
    pub fn record(&self, row: u32) -> PersonRecord {
        let values = FieldKey::ALL
            .iter()
            .filter_map(|&key| {
                self.read_cell(&CellAddress::new(key, row))
                    .map(|v| (key, v))
            })
            .collect();

        PersonRecord {
            row,
            name: self.name(row),
            company: self.company(row),
            values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(dest: &Path) -> XlsxSheet {
        XlsxSheet::from_rows(
            &[
                vec!["姓名（中英）", "所屬公司", "年齡"],
                vec!["王大明", "台積電", ""],
                vec!["李小華", "鴻海", "61歲"],
            ],
            dest,
        )
    }

    #[test]
    fn test_read_bounds() {
        let sheet = sample(Path::new("x.xlsx"));
        assert_eq!(sheet.last_row(), 3);
        assert_eq!(sheet.read(0, 0), None);
        assert_eq!(sheet.read(4, 0), None);
        assert_eq!(sheet.read(2, 2).as_deref(), Some(""));
        assert_eq!(sheet.read(2, 15).as_deref(), Some(""));
        assert_eq!(sheet.read(3, 2).as_deref(), Some("61歲"));
    }

    #[test]
    fn test_write_extends_row() {
        let mut sheet = sample(Path::new("x.xlsx"));
        sheet.write(2, 7, "國立台灣大學");
        assert_eq!(sheet.read(2, 7).as_deref(), Some("國立台灣大學"));
        assert_eq!(sheet.read(2, 6).as_deref(), Some(""));
    }

    #[test]
    fn test_number_as_text() {
        assert_eq!(CellValue::Number(55.0).as_text(), "55");
        assert_eq!(CellValue::Number(2.5).as_text(), "2.5");
    }

    #[test]
    fn test_save_and_reopen() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("out").join("enriched.xlsx");
        let mut sheet = sample(&dest);
        sheet.write(2, 7, "台大 學士\nMIT 碩士");
        sheet.save().unwrap();
        assert!(!sheet.is_dirty());

        let reopened = XlsxSheet::open(&dest, &dest).unwrap();
        assert_eq!(reopened.last_row(), 3);
        assert_eq!(reopened.read(1, 0).as_deref(), Some("姓名（中英）"));
        assert_eq!(reopened.read(2, 7).as_deref(), Some("台大 學士\nMIT 碩士"));
        assert_eq!(reopened.read(3, 2).as_deref(), Some("61歲"));
    }

    #[test]
    fn test_other_sheets_and_formulas_survive_save() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("executives.xlsx");

        let mut source = Workbook::new();
        let first = source.add_worksheet();
        first.set_name("Sheet1").unwrap();
        first.write_string(0, 0, "姓名（中英）").unwrap();
        first.write_string(1, 0, "王大明").unwrap();
        first.write_number(1, 2, 55).unwrap();
        first
            .write_formula(1, 3, Formula::new("=C2+1").set_result("56"))
            .unwrap();
        let notes = source.add_worksheet();
        notes.set_name("Notes").unwrap();
        notes.write_string(0, 0, "審核備註").unwrap();
        notes.write_number(1, 0, 3).unwrap();
        source.save(&path).unwrap();

        let mut sheet = XlsxSheet::open(&path, &path).unwrap();
        assert_eq!(sheet.sheet_names(), vec!["Sheet1", "Notes"]);
        assert_eq!(sheet.read(2, 3).as_deref(), Some("56"));
        sheet.write(2, 7, "國立台灣大學 電機系 學士");
        sheet.save().unwrap();

        let mut reopened = open_workbook_auto(&path).unwrap();
        assert_eq!(reopened.sheet_names(), vec!["Sheet1".to_string(), "Notes".to_string()]);
        let notes = reopened.worksheet_range("Notes").unwrap();
        assert_eq!(notes.get_value((0, 0)), Some(&Data::String("審核備註".into())));
        assert_eq!(notes.get_value((1, 0)), Some(&Data::Float(3.0)));
        let formulas = reopened.worksheet_formula("Sheet1").unwrap();
        assert_eq!(formulas.get_value((1, 3)).map(String::as_str), Some("C2+1"));

        let again = XlsxSheet::open(&path, &path).unwrap();
        assert_eq!(again.read(2, 7).as_deref(), Some("國立台灣大學 電機系 學士"));
        assert_eq!(again.read(2, 2).as_deref(), Some("55"));
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing.xlsx");
        assert!(matches!(
            XlsxSheet::open(&missing, &missing),
            Err(ExecCvError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_sheet_view_identity_and_record() {
        let catalog = FieldCatalog::default();
        let mut sheet = sample(Path::new("x.xlsx"));
        let view = SheetView::new(&mut sheet, &catalog);

        assert_eq!(view.name(2), "王大明");
        assert_eq!(view.company(3), "鴻海");
        assert!(!view.is_data_row(1));
        assert!(view.is_data_row(3));
        assert!(!view.is_data_row(4));

        let record = view.record(3);
        assert_eq!(record.value(FieldKey::Age), Some("61歲"));
        assert_eq!(record.value(FieldKey::Education), None);
    }
}
