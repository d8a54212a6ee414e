//! 簡報生成の結合テスト
//!
//! 照片選択の反映、簡報資料の組み立て、描画器の呼び出しを検証

mod common;

use common::sheet_with;
use exec_cv_common::slide::{default_sections, SlidePayload};
use exec_cv_common::{parse_rows, FieldCatalog};
use exec_cv_rust::error::{ExecCvError, Result};
use exec_cv_rust::generate::{
    finalize_photos, generate_slides, CommandRenderer, SlidePlan, SlideRenderer, SlideState,
};
use exec_cv_rust::workbook::{SheetView, Spreadsheet, XlsxSheet};
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// 呼び出しを記録する描画器。名前に "失敗" を含む人物は失敗させる
#[derive(Default)]
struct RecordingRenderer {
    rendered: RefCell<Vec<(SlidePayload, PathBuf)>>,
}

impl SlideRenderer for RecordingRenderer {
    fn render(&self, payload: &SlidePayload, output: &Path) -> Result<()> {
        if payload.name.contains("失敗") {
            return Err(ExecCvError::Render("template missing".into()));
        }
        self.rendered
            .borrow_mut()
            .push((payload.clone(), output.to_path_buf()));
        Ok(())
    }
}

fn valid_categories() -> Vec<String> {
    exec_cv_common::PROFESSIONAL_CATEGORIES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// 選択檔の照片 URL が照片欄・照片狀態欄に書かれ、保存される
#[test]
fn test_selection_file_applied() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("enriched.xlsx");
    let selection = dir.path().join("photo_selections.json");
    std::fs::write(
        &selection,
        r#"{"2": {"selected_url": "https://a.com/wang.jpg", "status": "已確認"}, "3": "", "40": "https://a.com/x.jpg"}"#,
    )
    .unwrap();

    let catalog = FieldCatalog::default();
    let mut sheet = sheet_with(&[("王大明", "台積電", ""), ("李小華", "鴻海", "")], &dest);
    sheet.write(3, 4, "待補充");
    let mut view = SheetView::new(&mut sheet, &catalog);

    let paths = vec![dir.path().join("missing.json"), selection.clone()];
    let (found, applied) = finalize_photos(&mut view, &paths).unwrap();

    assert_eq!(found, Some(selection));
    assert_eq!(applied, 1);

    let reopened = XlsxSheet::open(&dest, &dest).unwrap();
    assert_eq!(reopened.read(2, 3).as_deref(), Some("https://a.com/wang.jpg"));
    assert_eq!(reopened.read(2, 4).as_deref(), Some("已確認"));
    assert_eq!(reopened.read(3, 3).as_deref(), Some(""));
    assert_eq!(reopened.read(3, 4).as_deref(), Some("待補充"));
}

/// 選択檔が無ければ何もしない
#[test]
fn test_no_selection_file() {
    let dir = tempdir().unwrap();
    let catalog = FieldCatalog::default();
    let mut sheet = sheet_with(&[("王大明", "台積電", "")], &dir.path().join("out.xlsx"));
    let mut view = SheetView::new(&mut sheet, &catalog);

    let (found, applied) = finalize_photos(&mut view, &[dir.path().join("none.json")]).unwrap();
    assert_eq!(found, None);
    assert_eq!(applied, 0);
    assert!(!dir.path().join("out.xlsx").exists());
}

/// null などの使えない項目は飛ばし、残りは反映する
#[test]
fn test_selection_file_with_null_entries() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("enriched.xlsx");
    let selection = dir.path().join("photo_selections.json");
    std::fs::write(&selection, r#"{"2": "https://a.com/wang.jpg", "3": null}"#).unwrap();

    let catalog = FieldCatalog::default();
    let mut sheet = sheet_with(&[("王大明", "台積電", ""), ("李小華", "鴻海", "")], &dest);
    let mut view = SheetView::new(&mut sheet, &catalog);

    let (found, applied) = finalize_photos(&mut view, &[selection.clone()]).unwrap();
    assert_eq!(found, Some(selection));
    assert_eq!(applied, 1);
    assert_eq!(sheet.read(2, 3).as_deref(), Some("https://a.com/wang.jpg"));
    assert_eq!(sheet.read(3, 3).as_deref(), Some(""));
}

/// 壊れた選択檔は中断すべきエラーではなく、試算表も書き換えない
#[test]
fn test_corrupt_selection_file_is_not_fatal() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("enriched.xlsx");
    let selection = dir.path().join("photo_selections.json");
    std::fs::write(&selection, "{\"2\": \"https://a.com/wang.jpg\"").unwrap();

    let catalog = FieldCatalog::default();
    let mut sheet = sheet_with(&[("王大明", "台積電", "")], &dest);
    let mut view = SheetView::new(&mut sheet, &catalog);

    let err = finalize_photos(&mut view, &[selection]).unwrap_err();
    assert!(!err.is_fatal());
    assert!(!dest.exists());
}

/// 1 列の描画失敗では止まらず、出力先は分類資料夾/檔名
#[test]
fn test_generate_continues_past_failure() {
    let dir = tempdir().unwrap();
    let catalog = FieldCatalog::default();
    let mut sheet = sheet_with(
        &[
            ("王大明 David Wang", "TSMC 台積電", "國立台灣大學 電機系 學士"),
            ("失敗太郎", "鴻海", ""),
            ("", "無名公司", ""),
        ],
        &dir.path().join("out.xlsx"),
    );
    // 專業分類（F 欄）
    sheet.write(2, 5, "會計/財務類");
    sheet.write(3, 5, "醫師");
    let view = SheetView::new(&mut sheet, &catalog);

    let sections = default_sections();
    let categories = valid_categories();
    let output_dir = dir.path().join("ppt");
    let plan = SlidePlan {
        sections: &sections,
        valid_categories: &categories,
        output_dir: &output_dir,
    };
    let renderer = RecordingRenderer::default();
    let mut seen = Vec::new();

    let summary = generate_slides(&view, &parse_rows("2-5").unwrap(), &plan, &renderer, |o| {
        seen.push(o.row)
    });

    assert_eq!(seen, vec![2, 3, 4, 5]);
    assert_eq!(summary.rendered(), 1);
    assert_eq!(summary.failed(), 1);
    assert!(!summary.all_failed());
    assert!(matches!(summary.outcomes[2].state, SlideState::Skipped(_)));
    assert!(matches!(summary.outcomes[3].state, SlideState::Skipped(_)));

    let rendered = renderer.rendered.borrow();
    let (payload, path) = &rendered[0];
    assert_eq!(path, &output_dir.join("會計_財務類").join("王大明_台積電_CV.pptx"));
    assert_eq!(payload.left[1].label, "學歷");
    assert_eq!(payload.left[1].text, "國立台灣大學 電機系 學士");
    assert_eq!(payload.right[2].text, "0");
    assert!(output_dir.join("會計_財務類").is_dir());
    // 失敗した列の分類資料夾も作られている
    assert!(output_dir.join("未分類").is_dir());
}

/// 外部コマンドに (payload, template, output) の順で引數が渡る
#[cfg(unix)]
#[test]
fn test_command_renderer_arguments() {
    let dir = tempdir().unwrap();
    let template = dir.path().join("template.pptx");
    std::fs::write(&template, "tpl").unwrap();
    let output = dir.path().join("out.pptx");

    let renderer = CommandRenderer::new(
        vec!["sh".into(), "-c".into(), r#"cat "$1" > "$2" && cat "$0" >> "$2""#.into()],
        template,
    )
    .unwrap();
    let payload = SlidePayload {
        row: 2,
        name: "王大明".into(),
        company: "台積電".into(),
        age: "55歲".into(),
        photo_url: None,
        category: "未分類".into(),
        left: vec![],
        right: vec![],
    };

    renderer.render(&payload, &output).unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("tpl"));
    assert!(written.contains("\"name\": \"王大明\""));
}

/// 描画コマンドの異常終了は Render エラー
#[cfg(unix)]
#[test]
fn test_command_renderer_failure() {
    let dir = tempdir().unwrap();
    let renderer = CommandRenderer::new(
        vec!["sh".into(), "-c".into(), "echo broken >&2; exit 3".into()],
        dir.path().join("t.pptx"),
    )
    .unwrap();
    let payload = SlidePayload {
        row: 2,
        name: "x".into(),
        company: "y".into(),
        age: String::new(),
        photo_url: None,
        category: "未分類".into(),
        left: vec![],
        right: vec![],
    };

    let err = renderer.render(&payload, &dir.path().join("o.pptx")).unwrap_err();
    assert!(matches!(err, ExecCvError::Render(ref msg) if msg.contains("broken")));
}
