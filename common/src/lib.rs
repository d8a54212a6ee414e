//! Executive CV Common Library
//!
//! CLI と描画處理で共有される欄位目錄・範圍解析・合併方針・回答解析

pub mod catalog;
pub mod error;
pub mod merge;
pub mod parser;
pub mod photo;
pub mod prompts;
pub mod range;
pub mod slide;
pub mod validate;

pub use catalog::{column_index, column_letter, ColumnSpec, FieldCatalog, FieldKey, FieldSpec};
pub use error::{Error, Result};
pub use merge::{CellState, Decision, EnrichmentTarget, MergePolicy, DEFAULT_PLACEHOLDERS, PLACEHOLDER_PREFIXES};
pub use parser::{extract_json, parse_field_answer};
pub use photo::{rank_candidates, score_image, ImageHit, PhotoCandidate, PhotoOutcome};
pub use prompts::{build_field_prompt, photo_queries, Person, PROFESSIONAL_CATEGORIES, SYSTEM_PROMPT};
pub use range::{cells_for_rows, parse_cells, parse_rows, CellAddress, RowSelector, MAX_ROW, MAX_SPAN};
pub use slide::{build_payload, cv_file_name, default_sections, PersonRecord, SectionSpec, SlidePayload};
pub use validate::{validate_answer, AnswerContext};
