//! 照片候補の評分モジュール
//!
//! 画像搜尋の結果を來源・尺寸・檔名で評分し、
//! 人手審核用の候補リストを作る。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 照片狀態: 高分候補あり（人手確認待ち）
pub const STATUS_TO_CONFIRM: &str = "待確認";
/// 照片狀態: 適切な候補なし
pub const STATUS_MISSING: &str = "待補充";
/// 照片狀態: 審核で確定済み
pub const STATUS_CONFIRMED: &str = "已確認";

/// 自動選定の門檻（この分數以上で best_url に採用）
pub const DEFAULT_CONFIDENCE_THRESHOLD: i32 = 30;
/// 保存する候補の上限
pub const MAX_CANDIDATES: usize = 5;
/// これ以下の分數は候補から除外
const DROP_BELOW: i32 = -50;

const CORPORATE_HINTS: &[&str] = &["company", "corporate", "about", "team", "leadership", "management"];

const NEWS_SITES: &[&str] = &[
    "reuters", "bloomberg", "forbes", "businessweek", "cna.com", "udn.com",
    "ltn.com", "chinatimes", "ettoday", "setn.com", "bnext", "technews",
];

const BAD_KEYWORDS: &[&str] = &[
    "logo", "icon", "banner", "placeholder", "avatar", "default",
    "stock", "shutterstock", "istockphoto", "gettyimages", "dreamstime",
    "thumbnail", "sprite", "emoji", "badge", "button",
];

/// 画像搜尋の生結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageHit {
    /// 画像本体の URL
    pub image: String,
    /// 掲載ページの URL
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// 評分済みの照片候補
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoCandidate {
    pub url: String,
    pub score: i32,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
}

/// 1 人分の照片搜尋結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoOutcome {
    pub best_url: String,
    pub best_score: i32,
    pub status: String,
    pub candidates: Vec<PhotoCandidate>,
}

/// 画像 1 枚を評分
pub fn score_image(hit: &ImageHit, name: &str) -> i32 {
    let image_url = hit.image.to_lowercase();
    let source_url = hit.source.to_lowercase();
    let title = hit.title.to_lowercase();
    let mut score = 0;

    if source_url.contains("linkedin.com") || image_url.contains("linkedin") {
        score += 50;
    }
    if CORPORATE_HINTS.iter().any(|h| source_url.contains(h)) {
        score += 40;
    }
    if NEWS_SITES.iter().any(|s| source_url.contains(s)) {
        score += 20;
    }

    if hit.width > 0 && hit.height > 0 {
        if hit.width >= 150 && hit.height >= 150 {
            score += 15;
        }
        let aspect = hit.width as f64 / hit.height as f64;
        if (0.6..=1.2).contains(&aspect) {
            score += 10;
        }
        if aspect > 2.0 {
            score -= 20;
        }
    }

    let lowered_name = name.to_lowercase();
    for part in lowered_name.split_whitespace() {
        if part.chars().count() <= 1 {
            continue;
        }
        if image_url.contains(part) {
            score += 10;
            break;
        }
        if title.contains(part) {
            score += 5;
            break;
        }
    }

    if BAD_KEYWORDS.iter().any(|k| image_url.contains(k)) {
        score -= 100;
    }
    if image_url.contains("default") && (image_url.contains("profile") || image_url.contains("avatar")) {
        score -= 100;
    }

    score
}

/// 搜尋結果を評分・重複除去・並べ替えして結果をまとめる
pub fn rank_candidates(hits: &[ImageHit], name: &str, threshold: i32) -> PhotoOutcome {
    let mut seen = HashSet::new();
    let mut candidates: Vec<PhotoCandidate> = hits
        .iter()
        .filter(|h| !h.image.is_empty() && seen.insert(h.image.clone()))
        .map(|h| PhotoCandidate {
            url: h.image.clone(),
            score: score_image(h, name),
            source: h.source.clone(),
            title: h.title.clone(),
            width: h.width,
            height: h.height,
        })
        .filter(|c| c.score > DROP_BELOW)
        .collect();

    // 同分は搜尋順を保つ
    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates.truncate(MAX_CANDIDATES);

    match candidates.first() {
        Some(best) if best.score >= threshold => PhotoOutcome {
            best_url: best.url.clone(),
            best_score: best.score,
            status: STATUS_TO_CONFIRM.to_string(),
            candidates,
        },
        Some(best) => PhotoOutcome {
            best_url: String::new(),
            best_score: best.score,
            status: STATUS_MISSING.to_string(),
            candidates,
        },
        None => PhotoOutcome {
            status: STATUS_MISSING.to_string(),
            ..Default::default()
        },
    }
}
