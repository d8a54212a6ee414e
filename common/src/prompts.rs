//! プロンプト生成モジュール
//!
//! 1 人 × 1 欄位ずつ搜尋する集中型プロンプトを組み立てる。
//! 回答は `{"<欄位鍵>": <值 or null>}` 形式の JSON を要求する。

use crate::catalog::FieldKey;

/// 專業分類の選択肢
pub const PROFESSIONAL_CATEGORIES: &[&str] = &[
    "會計/財務類",
    "法務類",
    "商務/管理類",
    "產業專業類",
    "其他專門職業",
];

/// システムプロンプト
pub const SYSTEM_PROMPT: &str = "You are an elite Executive Search Researcher specializing in finding specific information about executives.
Your task is to find ONLY the requested information with 100% accuracy.
If you cannot verify the information, return null.
Respond ONLY with valid JSON. No markdown, no explanations.";

/// 搜尋対象の人物
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Person {
    pub name: String,
    pub company: String,
    /// 現職（照片搜尋の精度向上用、任意）
    pub current_position: Option<String>,
}

fn field_instruction(key: FieldKey, person: &Person, current_year: i32) -> String {
    let name = &person.name;
    let company = &person.company;

    match key {
        FieldKey::Age => format!(
            r#"Search specifically for the person's AGE or BIRTH YEAR.

Strategy:
1. Search for graduation year -> Add 22 to estimate birth year -> Calculate age
2. Search for "born in YYYY" or "出生於"
3. Search for news mentioning age (e.g., "45歲的{name}")
4. Current year is {current_year}

Output: Return age as "XX歲" format (e.g., "55歲") or null if not found."#
        ),
        FieldKey::Education => format!(
            r#"Search specifically for EDUCATION background.

Strategy:
1. Search: "{name}" "{company}" 學歷 OR 畢業 OR alumni
2. Search: "{name}" LinkedIn education
3. Look for: University name, Department/Major, Degree level

Output format:
- Each degree on separate line
- Format: "學校名稱 科系 學位" (e.g., "國立台灣大學 電機系 學士")
- Return as array of strings"#
        ),
        FieldKey::ProfessionalBackground => r#"Search specifically for PROFESSIONAL BACKGROUND summary.

Output format (REQUIRED):
"約 X 年在[產業1]、[產業2]等領域經歷，專長於[專業領域]，長期在[公司類型]擔任[職位層級]職務。"

Must be a single paragraph in Traditional Chinese."#
            .to_string(),
        FieldKey::Experience => r#"Search specifically for KEY CAREER EXPERIENCE.

Strategy:
1. Search for past positions and companies
2. Look for notable achievements at each role
3. Include years/duration if available

Output format:
- Each position on separate line
- Format: "公司名稱: 職位 (成就/年份)"
- Return as array of strings"#
            .to_string(),
        FieldKey::CurrentPosition => r#"Search specifically for CURRENT POSITIONS.

Look for:
- Current job title and company
- Board positions
- Advisory roles
- Other concurrent positions

Output: Array of current positions."#
            .to_string(),
        FieldKey::PersonalTraits => r#"Search specifically for PERSONAL TRAITS and leadership style.

Strategy:
1. Search for interviews and speeches
2. Look for media descriptions of personality
3. Find quotes from colleagues

Output format:
"1.[特質名稱]\n- [具體描述]\n2.[特質名稱]\n- [具體描述]\n3.[特質名稱]\n- [具體描述]"

Must include 3-5 traits with specific examples."#
            .to_string(),
        FieldKey::ProfessionalCategory => {
            let options = PROFESSIONAL_CATEGORIES
                .iter()
                .map(|c| format!("- \"{}\"", c))
                .collect::<Vec<_>>()
                .join("\n");
            format!(
                "Classify into ONE of these categories based on PRIMARY expertise:\n{options}\n\nOutput: Return ONLY the category name."
            )
        }
        FieldKey::BoardSeatsCount => format!(
            r#"Search for number of INDEPENDENT DIRECTOR positions currently held.

Search: "{name}" 獨立董事 OR 獨董

Output: Integer number or null."#
        ),
        FieldKey::BoardTenureYears => r#"Search for total years of INDEPENDENT DIRECTOR experience.

Output: "X年" format or null."#
            .to_string(),
        FieldKey::Email => r#"Search for VERIFIED EMAIL address.

CRITICAL: Only return if 100% verified from official source.
DO NOT guess or construct emails.
Ignore generic emails like info@, contact@, service@.

Output: Verified email string or null."#
            .to_string(),
        FieldKey::Phone => r#"Search for VERIFIED PHONE number.

CRITICAL: Only return if 100% verified from official source.
Must be a direct/office phone, not general company switchboard.

Output: Verified phone string or null."#
            .to_string(),
        FieldKey::Photo => format!(
            r#"Suggest the best search query to find a professional photo.

Output: A search query string like "{name} {company} headshot portrait""#
        ),
    }
}

/// 欄位集中型の搜尋プロンプトを生成
///
/// # Arguments
/// * `person` - 搜尋対象
/// * `key` - 取得したい欄位
/// * `display_name` - 欄位の中文名稱（說明用）
/// * `current_year` - 年齡推定に使う西暦年
pub fn build_field_prompt(
    person: &Person,
    key: FieldKey,
    display_name: &str,
    current_year: i32,
) -> String {
    let instruction = field_instruction(key, person, current_year);
    let json_key = key.as_str();

    format!(
        r#"# Target Executive
Name: {name}
Company: {company}

# Task
Find ONLY the following information: {display_name}

# Instructions
{instruction}

# Output Format
Return ONLY a JSON object:
{{
  "{json_key}": <value or null>
}}

CRITICAL:
- Return null if information cannot be verified
- Use Traditional Chinese (繁體中文)
- No markdown, no explanations, ONLY the JSON object
"#,
        name = person.name,
        company = person.company,
    )
}

/// 照片搜尋クエリ（優先順）
pub fn photo_queries(person: &Person) -> Vec<String> {
    let name = &person.name;
    let company = &person.company;
    let mut queries = vec![format!(r#"site:linkedin.com "{name}" {company}"#)];

    let first_title = person
        .current_position
        .as_deref()
        .and_then(|p| p.lines().next())
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(title) = first_title {
        queries.push(format!(r#""{name}" "{title}" photo OR portrait"#));
    }

    queries.push(format!(r#""{name}" {company} 照片 OR headshot OR portrait"#));
    queries.push(format!("{name} {company} profile photo"));
    queries
}
