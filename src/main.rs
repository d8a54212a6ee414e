use anyhow::Context;
use clap::Parser;
use exec_cv_common::slide::default_sections;
use exec_cv_common::{
    cells_for_rows, parse_cells, parse_rows, CellAddress, FieldCatalog, FieldKey, MergePolicy,
};
use exec_cv_rust::generate::{finalize_photos, generate_slides, CommandRenderer, SlidePlan, SlideState};
use exec_cv_rust::orchestrator::{targets_for, Orchestrator, ReviewPaths, RunSettings, RunSummary};
use exec_cv_rust::progress::CliProgress;
use exec_cv_rust::search::{PerplexityClient, RetryPolicy, SerpApiClient, UsageLedger};
use exec_cv_rust::workbook::{SheetView, XlsxSheet};
use exec_cv_rust::{cli, config, error, init_tracing};
use chrono::Datelike;
use cli::{Cli, Commands};
use config::{mask_key, Config};
use error::ExecCvError;
use std::path::Path;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    let config = Config::load_from(&config_path)
        .with_context(|| format!("設定檔讀取失敗: {}", config_path.display()))?;

    match cli.command {
        Commands::Enrich { rows, cell, field, force, photos_only } => {
            println!("🔎 exec-cv - 資料補全\n");

            // 1. 範圍解析（fetch 前にすべて検証）
            println!("[1/3] 解析範圍...");
            let cells = match resolve_cells(&config, rows, cell, field, photos_only) {
                Ok(cells) => cells,
                Err(e) => {
                    if matches!(e, ExecCvError::Common(exec_cv_common::Error::UnknownField(_))) {
                        print_fields(&config.catalog);
                    }
                    return Err(e.into());
                }
            };
            let targets = targets_for(&cells, force);
            println!("✔ {}個の儲存格を処理対象に\n", targets.len());

            // 2. 外部搜尋
            println!("[2/3] 搜尋中...{}", if force { " (強制更新)" } else { "" });
            let source = config.working_workbook().to_path_buf();
            let mut sheet = XlsxSheet::open(&source, &config.output_workbook)
                .with_context(|| format!("Excel 讀取失敗: {}", source.display()))?;

            let timeout = Duration::from_secs(config.timeout_seconds);
            let answers = match config.perplexity_key() {
                Ok(key) => Some(PerplexityClient::new(key, config.model.clone(), timeout)?),
                Err(e) => {
                    if cells.iter().any(|c| !c.key.is_photo()) {
                        println!("⚠ {}", e);
                    }
                    None
                }
            };
            let photos = match config.serpapi_key() {
                Ok(key) => Some(SerpApiClient::new(
                    key,
                    timeout,
                    config.serpapi_usage_path.clone(),
                    config.serpapi_quota,
                )?),
                Err(e) => {
                    if cells.iter().any(|c| c.key.is_photo()) {
                        println!("⚠ {}", e);
                    }
                    None
                }
            };

            let policy = MergePolicy::new(&config.placeholders);
            let settings = RunSettings {
                pause: Duration::from_millis(config.request_pause_ms),
                retry: RetryPolicy {
                    max_retries: config.max_retries,
                    delay: Duration::from_millis(config.request_pause_ms),
                },
                photo_threshold: config.photo_threshold,
                current_year: chrono::Local::now().year(),
                valid_categories: config.valid_categories.clone(),
                review: Some(ReviewPaths {
                    candidates: config.candidates_path.clone(),
                    html: config.review_html_path.clone(),
                }),
            };
            let orchestrator = Orchestrator::new(
                &config.catalog,
                &policy,
                answers.as_ref(),
                photos.as_ref(),
                settings,
            );
            let summary = orchestrator
                .run(&mut sheet, &targets, &CliProgress::new())
                .await
                .context("補全処理が中断されました")?;
            println!("✔ 搜尋完了\n");

            // 3. 結果
            println!("[3/3] 結果");
            print_run_summary(&summary);
            if summary.written() > 0 || summary.pending_review() > 0 {
                println!("✔ 結果を保存: {}", config.output_workbook.display());
            }
            if summary.pending_review() > 0 {
                println!("📷 照片審核: {}", config.review_html_path.display());
            }
            if let Some(ledger) = photos.as_ref().and_then(|p| p.usage()) {
                println!("  SerpAPI 本月剩餘: {}/{}", ledger.remaining(), ledger.quota);
            }

            if summary.all_failed() {
                println!("\n❌ すべての対象が失敗しました");
                std::process::exit(1);
            }
            println!("\n✅ 補全完了");
        }

        Commands::Generate { rows } => {
            println!("📄 exec-cv - CV 簡報生成\n");

            let rows = match rows {
                Some(rows) => rows,
                None => cli::prompt_range("要生成的列號範圍 (例: 2-20)")?,
            };
            let selector = parse_rows(&rows).map_err(ExecCvError::from)?;

            let source = config.working_workbook().to_path_buf();
            let mut sheet = XlsxSheet::open(&source, &config.output_workbook)
                .with_context(|| format!("Excel 讀取失敗: {}", source.display()))?;
            let mut view = SheetView::new(&mut sheet, &config.catalog);

            // 1. 照片選択の反映
            println!("[1/2] 照片選擇を確認中...");
            match finalize_photos(&mut view, &config.selection_paths) {
                Ok((Some(path), applied)) => {
                    println!("✔ {} から {}件の照片を反映\n", path.display(), applied)
                }
                Ok((None, _)) => println!("- 照片選擇檔なし\n"),
                Err(e) if e.is_fatal() => return Err(e.into()),
                // 選択檔が壊れていても簡報生成は続ける
                Err(e) => println!("⚠ 照片選擇檔を読めませんでした: {}\n", e),
            }

            // 2. 簡報生成
            println!("[2/2] 簡報生成中...");
            let renderer = CommandRenderer::new(
                config.renderer.command.clone(),
                config.renderer.template.clone(),
            )?;
            let sections = default_sections();
            let plan = SlidePlan {
                sections: &sections,
                valid_categories: &config.valid_categories,
                output_dir: &config.renderer.output_dir,
            };
            let summary = generate_slides(&view, &selector, &plan, &renderer, |outcome| {
                match &outcome.state {
                    SlideState::Rendered(path) => println!("  ✔ [列 {}] {} → {}", outcome.row, outcome.name, path.display()),
                    SlideState::Skipped(reason) => println!("  - [列 {}] 略過: {}", outcome.row, reason),
                    SlideState::Failed(reason) => println!("  ✘ [列 {}] {} {}", outcome.row, outcome.name, reason),
                }
            });

            println!("\n生成: {}件 / 失敗: {}件", summary.rendered(), summary.failed());
            if summary.all_failed() {
                println!("\n❌ すべての簡報生成が失敗しました");
                std::process::exit(1);
            }
            println!("\n✅ 生成完了: {}", config.renderer.output_dir.display());
        }

        Commands::Fields => {
            print_fields(&config.catalog);
        }

        Commands::Config { set_perplexity_key, set_serpapi_key, show } => {
            let mut config = config;
            let mut changed = false;

            if let Some(key) = set_perplexity_key {
                config.perplexity_api_key = Some(key);
                changed = true;
                println!("✔ Perplexity APIキーを設定しました");
            }
            if let Some(key) = set_serpapi_key {
                config.serpapi_api_key = Some(key);
                changed = true;
                println!("✔ SerpAPI キーを設定しました");
            }
            if changed {
                config.save_to(&config_path)?;
            }

            if show || !changed {
                print_config(&config, &config_path);
            }
        }
    }

    Ok(())
}

/// CLI 引數から処理対象の儲存格を決定
fn resolve_cells(
    config: &Config,
    rows: Option<String>,
    cell: Option<String>,
    field: Option<String>,
    photos_only: bool,
) -> error::Result<Vec<CellAddress>> {
    let catalog = &config.catalog;

    if let Some(cell) = cell {
        return Ok(parse_cells(&cell, catalog)?);
    }

    let rows = match rows {
        Some(rows) => rows,
        None => cli::prompt_range("要補全的列號範圍 (例: 2, 5-10, 15)")?,
    };
    let selector = parse_rows(&rows)?;

    let keys: Vec<FieldKey> = if let Some(field) = field {
        vec![catalog.resolve(&field)?]
    } else if photos_only {
        vec![FieldKey::Photo]
    } else {
        let mut keys = catalog.text_fields();
        if config.serpapi_key().is_ok() {
            keys.push(FieldKey::Photo);
        } else {
            println!("- SerpAPI キー未設定のため照片搜尋を省略");
        }
        keys.sort_by_key(|k| catalog.order_of(*k));
        keys
    };

    Ok(cells_for_rows(&keys, &selector))
}

fn print_run_summary(summary: &RunSummary) {
    println!(
        "  寫入: {} / 略過: {} / 失敗: {} / 照片待審核: {}",
        summary.written(),
        summary.skipped(),
        summary.failed(),
        summary.pending_review()
    );
    let failures = summary.failures();
    if !failures.is_empty() {
        println!("  失敗一覧:");
        for (cell, reason) in failures {
            println!("    {} : {}", cell, reason);
        }
    }
}

fn print_fields(catalog: &FieldCatalog) {
    println!("欄位一覧:");
    println!("  {:>3}  {:<4} {:<24} 名稱", "編號", "欄位", "鍵");
    for spec in catalog.fields_by_index() {
        println!(
            "  {:>3}  {:<4} {:<24} {}",
            spec.index, spec.column, spec.key.as_str(), spec.display_name
        );
    }
    println!(
        "  識別欄位: 姓名 {} / 公司 {} / 照片狀態 {}",
        catalog.name_column.column, catalog.company_column.column, catalog.photo_status_column.column
    );
}

fn print_config(config: &Config, path: &Path) {
    println!("設定: {}", path.display());
    println!("  モデル: {}", config.model);
    println!("  タイムアウト: {}秒 (再試行 {}回)", config.timeout_seconds, config.max_retries);
    println!("  Perplexity APIキー: {}", mask_key(config.perplexity_api_key.as_deref()));
    println!("  SerpAPI キー: {}", mask_key(config.serpapi_api_key.as_deref()));
    println!("  入力: {}", config.input_workbook.display());
    println!("  出力: {}", config.output_workbook.display());
    println!("  描畫器: {}", config.renderer.command.join(" "));

    let ledger = UsageLedger::load(
        &config.serpapi_usage_path,
        &UsageLedger::current_month(),
        config.serpapi_quota,
    );
    println!(
        "  SerpAPI 使用量 ({}): {}/{}",
        ledger.month, ledger.count, ledger.quota
    );
}
