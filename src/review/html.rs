//! 照片審核 HTML
//!
//! 外部資源に依存しない 1 枚の頁面。選択結果は
//! photo_selections.json としてダウンロードさせる。

use super::CandidateStore;
use std::fmt::Write;

const STYLE: &str = r#"
body { font-family: "Microsoft JhengHei", "PingFang TC", sans-serif; background: #f4f5f7; margin: 0; padding: 24px; }
h1 { margin: 0 0 4px; }
.meta { color: #666; margin-bottom: 20px; }
.person-card { background: #fff; border-radius: 8px; padding: 16px; margin-bottom: 16px; box-shadow: 0 1px 3px rgba(0,0,0,.12); }
.person-header { display: flex; justify-content: space-between; align-items: center; }
.status-badge { padding: 2px 10px; border-radius: 12px; font-size: .85em; }
.status-confirm { background: #fff3cd; }
.status-pending { background: #f8d7da; }
.status-selected { background: #d4edda; }
.candidates-grid { display: flex; flex-wrap: wrap; gap: 12px; margin: 12px 0; }
.candidate, .no-select { width: 160px; border: 3px solid transparent; border-radius: 6px; cursor: pointer; background: #fafafa; }
.candidate img { width: 100%; height: 160px; object-fit: cover; border-radius: 4px 4px 0 0; }
.no-select { display: flex; align-items: center; justify-content: center; min-height: 160px; }
.selected { border-color: #2e7d32; }
.candidate-info { padding: 6px; font-size: .8em; word-break: break-all; }
.score-high { color: #2e7d32; font-weight: bold; }
.score-medium { color: #f57c00; font-weight: bold; }
.score-low { color: #c62828; }
.url-input { width: 60%; padding: 4px; }
.save-section { position: sticky; bottom: 0; background: #f4f5f7; padding: 12px 0; }
.btn { padding: 8px 20px; border: none; border-radius: 4px; background: #2e7d32; color: #fff; cursor: pointer; font-size: 1em; }
"#;

const SCRIPT: &str = r#"
const selections = {};
document.querySelectorAll('.person-card').forEach(card => {
  const chosen = card.querySelector('.candidate.selected');
  if (chosen) { selections[card.dataset.row] = chosen.dataset.url; }
});

function selectCandidate(element) {
  const card = element.closest('.person-card');
  const row = card.dataset.row;
  card.querySelectorAll('.candidate, .no-select').forEach(c => c.classList.remove('selected'));
  element.classList.add('selected');
  selections[row] = element.dataset.url;
  const badge = card.querySelector('.status-badge');
  badge.textContent = element.dataset.url ? '已選擇' : '待補充';
  badge.className = 'status-badge ' + (element.dataset.url ? 'status-selected' : 'status-pending');
  if (element.dataset.url) { card.querySelector('.url-input').value = ''; }
}

function updateManualUrl(input) {
  const card = input.closest('.person-card');
  const url = input.value.trim();
  if (!url) { return; }
  card.querySelectorAll('.candidate, .no-select').forEach(c => c.classList.remove('selected'));
  selections[card.dataset.row] = url;
  const badge = card.querySelector('.status-badge');
  badge.textContent = '已手動輸入';
  badge.className = 'status-badge status-selected';
}

function saveSelections() {
  const output = {};
  document.querySelectorAll('.person-card').forEach(card => {
    const row = card.dataset.row;
    const manual = card.querySelector('.url-input').value.trim();
    const url = manual || selections[row] || '';
    output[row] = { selected_url: url, status: url ? '已確認' : '待補充' };
  });
  const blob = new Blob([JSON.stringify(output, null, 2)], { type: 'application/json' });
  const link = document.createElement('a');
  link.href = URL.createObjectURL(blob);
  link.download = 'photo_selections.json';
  link.click();
  URL.revokeObjectURL(link.href);
  alert('已下載 photo_selections.json\n請執行 exec-cv generate 套用選擇');
}
"#;

/// HTML 特殊文字のエスケープ
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn score_class(score: i32) -> &'static str {
    if score >= 40 {
        "score-high"
    } else if score >= 20 {
        "score-medium"
    } else {
        "score-low"
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

pub fn render_review_html(store: &CandidateStore, generated_at: &str) -> String {
    let mut html = String::new();
    // String への書き込みは失敗しない
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html lang=\"zh-TW\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>照片審核</title>\n<style>{}</style>\n</head>\n<body>\n\
         <h1>照片審核</h1>\n<div class=\"meta\">產生時間: {} ・ 共 {} 人</div>\n<div id=\"cards\">\n",
        STYLE,
        escape(generated_at),
        store.len()
    );

    for (row, entry) in store {
        let status_class = if entry.status == exec_cv_common::photo::STATUS_TO_CONFIRM {
            "status-confirm"
        } else {
            "status-pending"
        };
        let _ = write!(
            html,
            "<div class=\"person-card\" data-row=\"{row}\">\n\
             <div class=\"person-header\"><h2>[列 {row}] {} - {}</h2>\
             <span class=\"status-badge {status_class}\">{}</span></div>\n\
             <div class=\"candidates-grid\">\n",
            escape(&entry.name),
            escape(&entry.company),
            escape(&entry.status),
        );

        for (i, candidate) in entry.candidates.iter().enumerate() {
            let selected = if !entry.best_url.is_empty() && candidate.url == entry.best_url {
                " selected"
            } else {
                ""
            };
            let url = escape(&candidate.url);
            let _ = write!(
                html,
                "<div class=\"candidate{selected}\" data-url=\"{url}\" onclick=\"selectCandidate(this)\">\
                 <img src=\"{url}\" alt=\"候選照片 {}\" loading=\"lazy\">\
                 <div class=\"candidate-info\"><span class=\"{}\">分數: {}</span><br>{}</div></div>\n",
                i + 1,
                score_class(candidate.score),
                candidate.score,
                escape(&truncate(&candidate.source, 50)),
            );
        }

        let _ = write!(
            html,
            "<div class=\"no-select\" data-url=\"\" onclick=\"selectCandidate(this)\">❌ 都不正確</div>\n\
             </div>\n<label>手動輸入照片 URL：</label>\
             <input type=\"text\" class=\"url-input\" placeholder=\"貼上正確的照片 URL...\" onchange=\"updateManualUrl(this)\">\n\
             </div>\n"
        );
    }

    let _ = write!(
        html,
        "</div>\n<div class=\"save-section\"><button class=\"btn\" onclick=\"saveSelections()\">💾 儲存選擇（下載 JSON）</button></div>\n\
         <script>{}</script>\n</body>\n</html>\n",
        SCRIPT
    );
    html
}
