// src/sql/normalize.rs — Generated SQL cleanup

const FENCE: &str = "```";
const LANGUAGE_TAGS: &[&str] = &["sql", "sqlite", "postgresql", "postgres", "mysql"];

/// Strip surrounding whitespace and markdown code fences (plain or
/// language-tagged) from model output. Nothing else is validated; the
/// database decides whether the result is valid SQL.
pub fn normalize_sql(raw: &str) -> String {
    let mut sql = raw.trim();

    if let Some(rest) = sql.strip_prefix(FENCE) {
        sql = strip_language_tag(rest);
    }
    if let Some(rest) = sql.strip_suffix(FENCE) {
        sql = rest;
    }

    sql.trim().to_string()
}

fn strip_language_tag(after_fence: &str) -> &str {
    let first_line_end = after_fence.find('\n').unwrap_or(after_fence.len());
    let tag = after_fence[..first_line_end].trim();

    if tag.is_empty() {
        return &after_fence[first_line_end..];
    }
    if LANGUAGE_TAGS.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
        return &after_fence[first_line_end..];
    }
    // ```sql SELECT ... on a single line
    for t in LANGUAGE_TAGS {
        if let Some(prefix) = after_fence.get(..t.len()) {
            let rest = &after_fence[t.len()..];
            if prefix.eq_ignore_ascii_case(t) && rest.starts_with(char::is_whitespace) {
                return rest;
            }
        }
    }
    after_fence
}
