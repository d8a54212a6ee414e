//! APIレスポンスパーサー
//!
//! 搜尋 API の回答本文から JSON 物件を抽出し、
//! 指定欄位の値を取り出す。

use crate::catalog::FieldKey;
use crate::error::{Error, Result};
use serde_json::Value;

/// 回答本文から JSON 物件部分を抽出
///
/// 抽出優先順位:
/// 1. ```json ... ``` ブロック
/// 2. 生の {...} 物件
/// 3. エラー
///
/// # Examples
/// ```
/// use exec_cv_common::extract_json;
///
/// let response = "結果如下 {\"age\": \"55歲\"} 以上";
/// assert_eq!(extract_json(response).unwrap(), "{\"age\": \"55歲\"}");
/// ```
pub fn extract_json(response: &str) -> Result<&str> {
    if let Some(start_marker) = response.find("```json") {
        let start = start_marker + 7;
        if let Some(end_offset) = response[start..].find("```") {
            let end = start + end_offset;
            return Ok(response[start..end].trim());
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end >= start {
                return Ok(&response[start..=end]);
            }
        }
    }

    Err(Error::Parse("找不到 JSON".into()))
}

fn value_to_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(_) => value.to_string(),
    };

    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text)
    }
}

/// 單一欄位の回答をパース
///
/// JSON の鍵は欄位鍵（"education"）または中文名稱（"學歷"）を受け付ける。
/// 陣列は改行で連結し、null・空字串は `None` を返す。
pub fn parse_field_answer(
    response: &str,
    key: FieldKey,
    display_name: &str,
) -> Result<Option<String>> {
    let json_str = extract_json(response)?;

    let parsed: Value = match serde_json::from_str(json_str) {
        Ok(v) => v,
        // 單引號の JSON がよく返ってくるため一度だけ補正を試みる
        Err(first) => serde_json::from_str(&json_str.replace('\'', "\""))
            .map_err(|_| Error::Parse(format!("JSON 解析錯誤: {}", first)))?,
    };

    let object = parsed
        .as_object()
        .ok_or_else(|| Error::Parse("回應不是 JSON 物件".into()))?;

    let value = object.get(key.as_str()).or_else(|| object.get(display_name));
    Ok(value.and_then(value_to_text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_with_block() {
        let response = "Here:\n```json\n{\"age\": \"55歲\"}\n```\nDone.";
        assert_eq!(extract_json(response).unwrap(), "{\"age\": \"55歲\"}");
    }

    #[test]
    fn test_extract_json_error() {
        let result = extract_json("No JSON here");
        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn test_parse_array_joined_with_newline() {
        let response = r#"{"education": ["國立台灣大學 電機系 學士", "", "MIT EECS 碩士"]}"#;
        let value = parse_field_answer(response, FieldKey::Education, "學歷").unwrap();
        assert_eq!(value.as_deref(), Some("國立台灣大學 電機系 學士\nMIT EECS 碩士"));
    }

    #[test]
    fn test_parse_null_is_none() {
        let response = r#"{"email": null}"#;
        assert_eq!(parse_field_answer(response, FieldKey::Email, "電子郵件").unwrap(), None);
        let response = r#"{"email": "null"}"#;
        assert_eq!(parse_field_answer(response, FieldKey::Email, "電子郵件").unwrap(), None);
    }

    #[test]
    fn test_parse_display_name_key() {
        let response = r#"```json
{"現擔任獨董家數(年)": 3}
```"#;
        let value = parse_field_answer(response, FieldKey::BoardSeatsCount, "現擔任獨董家數(年)").unwrap();
        assert_eq!(value.as_deref(), Some("3"));
    }

    #[test]
    fn test_parse_single_quotes_fallback() {
        let response = "{'age': '61歲'}";
        let value = parse_field_answer(response, FieldKey::Age, "年齡").unwrap();
        assert_eq!(value.as_deref(), Some("61歲"));
    }

    #[test]
    fn test_parse_missing_key_is_none() {
        let response = r#"{"phone": "02-1234-5678"}"#;
        assert_eq!(parse_field_answer(response, FieldKey::Age, "年齡").unwrap(), None);
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_field_answer("{not json at all}", FieldKey::Age, "年齡");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
