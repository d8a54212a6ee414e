//! 結合テスト用の共有ヘルパー

#![allow(dead_code)]

use exec_cv_common::ImageHit;
use exec_cv_rust::error::{ExecCvError, Result};
use exec_cv_rust::search::{AnswerSource, PhotoSource};
use exec_cv_rust::workbook::XlsxSheet;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;

pub const HEADER: [&str; 8] = [
    "姓名（中英）", "所屬公司", "年齡", "照片", "照片狀態", "專業分類", "專業背景", "學歷",
];

/// 標題列 + 指定した人物の試算表（學歷は H 欄）
pub fn sheet_with(people: &[(&str, &str, &str)], dest: &Path) -> XlsxSheet {
    let mut rows: Vec<Vec<String>> = vec![HEADER.iter().map(|s| s.to_string()).collect()];
    for (name, company, education) in people {
        let mut row = vec![String::new(); HEADER.len()];
        row[0] = name.to_string();
        row[1] = company.to_string();
        row[7] = education.to_string();
        rows.push(row);
    }
    XlsxSheet::from_rows(&rows, dest)
}

/// 台本どおりに回答する AnswerSource
pub struct ScriptedAnswers {
    script: RefCell<VecDeque<Result<String>>>,
    pub calls: Cell<usize>,
}

impl ScriptedAnswers {
    pub fn new(script: Vec<Result<String>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            calls: Cell::new(0),
        }
    }
}

impl AnswerSource for ScriptedAnswers {
    async fn ask(&self, _prompt: &str) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        self.script
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(ExecCvError::Fetch("script exhausted".into())))
    }
}

/// 台本どおりに画像を返す PhotoSource
pub struct ScriptedPhotos {
    script: RefCell<VecDeque<Result<Vec<ImageHit>>>>,
    pub calls: Cell<usize>,
}

impl ScriptedPhotos {
    pub fn new(script: Vec<Result<Vec<ImageHit>>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            calls: Cell::new(0),
        }
    }
}

impl PhotoSource for ScriptedPhotos {
    async fn search_images(&self, _query: &str) -> Result<Vec<ImageHit>> {
        self.calls.set(self.calls.get() + 1);
        self.script.borrow_mut().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn hit(image: &str, source: &str, size: u32) -> ImageHit {
    ImageHit {
        image: image.into(),
        source: source.into(),
        title: String::new(),
        width: size,
        height: size,
    }
}
