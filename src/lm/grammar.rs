//! Line-level helpers for the reply grammars.
//!
//! Collaborator replies are free text. Each call site looks for a tagged line
//! (`OPERATION:`, `ARGUMENTS:`, `ANSWER:`) and falls back to a positional line.
use serde::Deserialize;
use serde_json::Value;

/// Remove a surrounding Markdown code fence, if any.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let mut lines: Vec<&str> = trimmed.lines().collect();
    if let Some(first) = lines.first() {
        if first.trim_start().starts_with("```") {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if last.trim_start().starts_with("```") {
            lines.pop();
        }
    }
    lines.join("\n").trim().to_string()
}

/// Text after `tag` on the first line that has non-empty content after it.
pub fn tagged_value(text: &str, tag: &str) -> Option<String> {
    text.lines().find_map(|line| {
        let idx = line.rfind(tag)?;
        let value = line[idx + tag.len()..].trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

pub fn last_nonempty_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rfind(|line| !line.is_empty())
}

/// The reply itself, when it is a single non-empty line.
pub fn single_line(text: &str) -> Option<&str> {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let first = lines.next()?;
    lines.next().is_none().then_some(first)
}

/// First line that opens like a JSON literal (`[` or `"`).
pub fn literal_line(text: &str) -> Option<&str> {
    text.lines()
        .map(str::trim)
        .find(|line| line.len() > 1 && (line.starts_with('[') || line.starts_with('"')))
}

/// Parse the first JSON value that starts at a `[`, `{`, or `"` in `raw`.
pub fn leading_json(raw: &str) -> Option<Value> {
    for (idx, ch) in raw.char_indices() {
        if !matches!(ch, '[' | '{' | '"') {
            continue;
        }
        let mut deserializer = serde_json::Deserializer::from_str(&raw[idx..]);
        if let Ok(value) = Value::deserialize(&mut deserializer) {
            return Some(value);
        }
    }
    None
}

/// Trim whitespace and one layer of matching quotes.
pub fn unquote(raw: &str) -> &str {
    let trimmed = raw.trim();
    for quote in ['"', '\'', '`'] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("  plain "), "plain");
    }

    #[test]
    fn tagged_value_skips_empty_tags() {
        let reply = "OPERATION:\nthinking...\nOPERATION: f_group_by";
        assert_eq!(
            tagged_value(reply, "OPERATION:").as_deref(),
            Some("f_group_by")
        );
        assert_eq!(tagged_value("nothing here", "ANSWER:"), None);
    }

    #[test]
    fn positional_lines() {
        assert_eq!(last_nonempty_line("a\nb\n\n"), Some("b"));
        assert_eq!(single_line("\n  only \n"), Some("only"));
        assert_eq!(single_line("a\nb"), None);
        assert_eq!(literal_line("reason\n[1, 2]\n"), Some("[1, 2]"));
    }

    #[test]
    fn leading_json_skips_prose() {
        assert_eq!(
            leading_json("args are [\"Count\", false] ok"),
            Some(serde_json::json!(["Count", false]))
        );
        assert_eq!(leading_json("no json"), None);
    }

    #[test]
    fn unquote_strips_one_layer() {
        assert_eq!(unquote(" \"Country\" "), "Country");
        assert_eq!(unquote("'Rank'"), "Rank");
        assert_eq!(unquote("Rank"), "Rank");
    }
}
