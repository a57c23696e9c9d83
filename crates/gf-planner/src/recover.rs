//! Recover a JSON value from free-form language-model output.
//!
//! Models wrap JSON in Markdown fences, add prose before and after it, or
//! swap in typographic quotes. [`recover_json`] undoes those habits and never
//! fails loudly: anything unrecoverable yields `None`.

use serde_json::Value;

/// Recover a JSON value from raw model text.
///
/// Steps: normalize smart quotes and non-breaking spaces, strip one Markdown
/// fence, try a direct parse, then fall back to the first balanced `{ ... }`
/// span (braces inside string literals are ignored).
pub fn recover_json(raw: Option<&str>) -> Option<Value> {
    let raw = raw?;
    if raw.trim().is_empty() {
        return None;
    }

    let normalized = normalize_typography(raw);
    let clean = strip_markdown_fence(&normalized);

    if let Ok(value) = serde_json::from_str::<Value>(clean) {
        return Some(value);
    }

    let fragment = first_balanced_object(clean)?;
    serde_json::from_str::<Value>(fragment).ok()
}

/// Replace smart quotes with ASCII quotes and non-breaking spaces with spaces.
pub fn normalize_typography(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{00A0}' => ' ',
            other => other,
        })
        .collect()
}

/// Strip a single leading and trailing Markdown code fence (optionally
/// tagged `json`) and trim what is inside.
pub fn strip_markdown_fence(text: &str) -> &str {
    let mut clean = text.trim();
    if let Some(rest) = clean.strip_prefix("```") {
        clean = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = clean.strip_suffix("```") {
        clean = rest;
    }
    clean.trim()
}

/// Find the first top-level `{ ... }` span, tracking string literals so that
/// braces inside strings (and escaped quotes) do not affect the depth count.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = start + offset + c.len_utf8();
                    return Some(&text[start..end]);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_input_is_none() {
        assert_eq!(recover_json(None), None);
        assert_eq!(recover_json(Some("")), None);
        assert_eq!(recover_json(Some("   \n")), None);
    }

    #[test]
    fn direct_json_parses() {
        let value = recover_json(Some(r#"{"childGoals": []}"#)).unwrap();
        assert_eq!(value, json!({"childGoals": []}));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(recover_json(Some(raw)), Some(json!({"a": 1})));

        let raw = "```JSON\n{\"a\": 2}\n```";
        assert_eq!(recover_json(Some(raw)), Some(json!({"a": 2})));

        let raw = "```\n{\"a\": 3}\n```";
        assert_eq!(recover_json(Some(raw)), Some(json!({"a": 3})));
    }

    #[test]
    fn smart_quotes_are_normalized() {
        let raw = "{\u{201C}title\u{201D}:\u{00A0}\u{201C}Login\u{201D}}";
        assert_eq!(recover_json(Some(raw)), Some(json!({"title": "Login"})));
    }

    #[test]
    fn object_is_extracted_from_prose() {
        let raw = "Sure! Here is the plan:\n{\"parentTitle\": \"Auth\", \"childGoals\": [{\"prompt\": \"a\"}]}\nLet me know if you need more.";
        let value = recover_json(Some(raw)).unwrap();
        assert_eq!(value["parentTitle"], json!("Auth"));
    }

    #[test]
    fn braces_inside_strings_are_ignored() {
        let raw = r#"Plan: {"prompt": "use {curly} braces and a \"quoted } brace\"", "n": 1} trailing {"second": true}"#;
        let value = recover_json(Some(raw)).unwrap();
        assert_eq!(value["n"], json!(1));
        assert_eq!(value["prompt"], json!("use {curly} braces and a \"quoted } brace\""));
        assert!(value.get("second").is_none());
    }

    #[test]
    fn fenced_block_inside_prose_is_found() {
        let raw = "Here you go:\n```json\n{\"ok\": true}\n```\nThanks";
        assert_eq!(recover_json(Some(raw)), Some(json!({"ok": true})));
    }

    #[test]
    fn unbalanced_or_garbage_is_none() {
        assert_eq!(recover_json(Some("no json here")), None);
        assert_eq!(recover_json(Some("{\"a\": 1")), None);
        assert_eq!(recover_json(Some("prefix {not: valid} suffix")), None);
    }
}
