//! Response parsing for planner outputs.
//!
//! Extracts SQL from model replies that may wrap it in markdown code blocks.

/// Result of parsing a model reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    /// Any explanatory text before or after the SQL.
    pub text: String,
    /// Extracted SQL query, if found.
    pub sql: Option<String>,
}

impl ParsedResponse {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sql: None,
        }
    }

    fn with_sql(text: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sql: Some(sql.into()),
        }
    }
}

/// Keywords a bare (unfenced) reply may start with to count as SQL.
const BARE_SQL_KEYWORDS: [&str; 2] = ["SELECT", "WITH"];

/// Parses a reply to extract SQL.
///
/// Looks, in order, for a ```` ```sql ```` block, a bare ```` ``` ```` block,
/// and finally a reply that is itself a `SELECT`/`WITH` statement. Only the
/// first matching block is used.
pub fn parse_llm_response(response: &str) -> ParsedResponse {
    for lang in ["sql", ""] {
        if let Some((sql, rest)) = split_code_block(response, lang) {
            let sql = sql.trim();
            if !sql.is_empty() {
                return ParsedResponse::with_sql(rest.trim(), sql);
            }
        }
    }

    let trimmed = response.trim();
    let first_word = trimmed
        .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
        .next()
        .unwrap_or_default();
    if BARE_SQL_KEYWORDS
        .iter()
        .any(|keyword| first_word.eq_ignore_ascii_case(keyword))
    {
        return ParsedResponse::with_sql("", trimmed);
    }

    ParsedResponse::text_only(trimmed)
}

/// Finds the first fenced block tagged `lang` (empty = untagged) and returns
/// its content plus the surrounding text with the block removed.
fn split_code_block<'a>(text: &'a str, lang: &str) -> Option<(&'a str, String)> {
    let mut search_from = 0;

    while let Some(offset) = text[search_from..].find("```") {
        let fence_start = search_from + offset;
        let after_fence = fence_start + 3;
        let line_end = after_fence + text[after_fence..].find('\n')?;
        let tag = text[after_fence..line_end].trim();

        if tag.eq_ignore_ascii_case(lang) {
            let content_start = line_end + 1;
            let content_end = content_start + text[content_start..].find("```")?;
            let block_end = content_end + 3;
            let rest = format!("{}{}", &text[..fence_start], &text[block_end..]);
            return Some((&text[content_start..content_end], rest));
        }

        // Skip over this block entirely (opening and closing fence)
        let content_start = line_end + 1;
        let close = content_start + text[content_start..].find("```")?;
        search_from = close + 3;
    }

    None
}
